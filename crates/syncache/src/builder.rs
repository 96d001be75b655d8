//! # Builder for EngineConfig
//!
//! This module provides a builder pattern implementation for creating and
//! customizing EngineConfig instances with a fluent API.
//!
//! # Example
//!
//! ```
//! use syncache_engine::{AgeThreshold, AgeUnit, EngineConfig};
//!
//! let config = EngineConfig::builder()
//!     .with_max_age(AgeThreshold::new(15, AgeUnit::Minutes))
//!     .with_label("user-profile")
//!     .build();
//!
//! assert_eq!(config.max_age.quantity, 15);
//! ```

use crate::config::{AgeThreshold, AgeUnit, EngineConfig};

/// Builder for creating EngineConfig instances with a fluent API
#[derive(Debug, Clone)]
pub struct EngineConfigBuilder {
    /// Internal config being built
    config: EngineConfig,
}

impl EngineConfigBuilder {
    /// Create a new builder with default configuration
    pub fn new() -> Self {
        Self {
            config: EngineConfig::default(),
        }
    }

    /// Set the maximum acceptable cache age
    pub fn with_max_age(mut self, max_age: AgeThreshold) -> Self {
        self.config.max_age = max_age;
        self
    }

    /// Set the maximum acceptable cache age from quantity and unit
    pub fn with_max_age_of(mut self, quantity: u64, unit: AgeUnit) -> Self {
        self.config.max_age = AgeThreshold::new(quantity, unit);
        self
    }

    /// Set a label for this engine, used in log output
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.config.label = Some(label.into());
        self
    }

    /// Build the EngineConfig instance
    pub fn build(self) -> EngineConfig {
        self.config
    }
}

impl Default for EngineConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
