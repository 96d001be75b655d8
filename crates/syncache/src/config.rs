use std::time::Duration;

/// Unit for expressing a maximum acceptable cache age.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgeUnit {
    Seconds,
    Minutes,
    Hours,
    Days,
    Weeks,
    /// Calendar-agnostic month of 30 days.
    Months,
    /// Calendar-agnostic year of 365 days.
    Years,
}

impl AgeUnit {
    /// Length of one unit in seconds.
    pub fn as_secs(self) -> u64 {
        match self {
            AgeUnit::Seconds => 1,
            AgeUnit::Minutes => 60,
            AgeUnit::Hours => 60 * 60,
            AgeUnit::Days => 24 * 60 * 60,
            AgeUnit::Weeks => 7 * 24 * 60 * 60,
            AgeUnit::Months => 30 * 24 * 60 * 60,
            AgeUnit::Years => 365 * 24 * 60 * 60,
        }
    }
}

/// Maximum acceptable age of a cached value before it is considered stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgeThreshold {
    pub quantity: u64,
    pub unit: AgeUnit,
}

impl AgeThreshold {
    /// Create a threshold of `quantity` times `unit`.
    pub fn new(quantity: u64, unit: AgeUnit) -> Self {
        Self { quantity, unit }
    }

    /// The threshold as a `Duration`, saturating on overflow.
    pub fn as_duration(&self) -> Duration {
        Duration::from_secs(self.quantity.saturating_mul(self.unit.as_secs()))
    }

    /// The threshold in milliseconds, saturating to `i64::MAX`.
    pub fn as_millis(&self) -> i64 {
        self.as_duration()
            .as_millis()
            .min(i64::MAX as u128) as i64
    }
}

/// Configurable options for a repository engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Maximum acceptable cache age before a bound pipeline revalidates.
    pub max_age: AgeThreshold,

    /// Human-readable label for this engine, used in log output.
    pub label: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_age: AgeThreshold::new(1, AgeUnit::Hours),
            label: None,
        }
    }
}

impl EngineConfig {
    pub fn builder() -> crate::builder::EngineConfigBuilder {
        crate::builder::EngineConfigBuilder::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threshold_conversions() {
        assert_eq!(
            AgeThreshold::new(90, AgeUnit::Seconds).as_duration(),
            Duration::from_secs(90)
        );
        assert_eq!(
            AgeThreshold::new(2, AgeUnit::Hours).as_duration(),
            Duration::from_secs(7200)
        );
        assert_eq!(
            AgeThreshold::new(1, AgeUnit::Years).as_duration(),
            Duration::from_secs(365 * 24 * 60 * 60)
        );
        assert_eq!(AgeThreshold::new(1, AgeUnit::Minutes).as_millis(), 60_000);
    }

    #[test]
    fn threshold_saturates_instead_of_overflowing() {
        let huge = AgeThreshold::new(u64::MAX, AgeUnit::Years);
        assert_eq!(huge.as_duration(), Duration::from_secs(u64::MAX));
        assert_eq!(huge.as_millis(), i64::MAX);
    }

    #[test]
    fn default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.max_age, AgeThreshold::new(1, AgeUnit::Hours));
        assert!(config.label.is_none());
    }
}
