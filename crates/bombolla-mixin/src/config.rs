//! Engine configuration
//!
//! Loadable from TOML:
//!
//! ```toml
//! name_separator = "+"
//! max_depth = 64
//! warn_unsatisfied_interfaces = false
//! ```

use crate::error::{MixinError, MixinResult};
use serde::{Deserialize, Serialize};

/// Mixin engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Joins base and mixin names in auto-generated composite names
    pub name_separator: String,

    /// Maximum nesting of dependency resolution
    pub max_depth: usize,

    /// Log unsatisfied interface requirements of abstract composites at
    /// `warn` instead of `debug`
    pub warn_unsatisfied_interfaces: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            name_separator: "+".to_string(),
            max_depth: 64,
            warn_unsatisfied_interfaces: false,
        }
    }
}

impl EngineConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(source: &str) -> MixinResult<Self> {
        let config: EngineConfig =
            toml::from_str(source).map_err(|e| MixinError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check the configuration for values the engine cannot work with
    pub fn validate(&self) -> MixinResult<()> {
        if self.name_separator.is_empty() {
            return Err(MixinError::InvalidConfig(
                "name_separator must not be empty".to_string(),
            ));
        }
        if self.max_depth == 0 {
            return Err(MixinError::InvalidConfig(
                "max_depth must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.name_separator, "+");
        assert_eq!(config.max_depth, 64);
        assert!(!config.warn_unsatisfied_interfaces);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_toml_partial() {
        let config = EngineConfig::from_toml_str("warn_unsatisfied_interfaces = true\n").unwrap();
        assert!(config.warn_unsatisfied_interfaces);
        assert_eq!(config.name_separator, "+");
    }

    #[test]
    fn test_from_toml_full() {
        let config = EngineConfig::from_toml_str(
            "name_separator = \"::\"\nmax_depth = 8\nwarn_unsatisfied_interfaces = false\n",
        )
        .unwrap();
        assert_eq!(config.name_separator, "::");
        assert_eq!(config.max_depth, 8);
    }

    #[test]
    fn test_rejects_invalid() {
        assert!(matches!(
            EngineConfig::from_toml_str("name_separator = \"\""),
            Err(MixinError::InvalidConfig(_))
        ));
        assert!(matches!(
            EngineConfig::from_toml_str("max_depth = 0"),
            Err(MixinError::InvalidConfig(_))
        ));
        assert!(matches!(
            EngineConfig::from_toml_str("max_depth = \"deep\""),
            Err(MixinError::InvalidConfig(_))
        ));
    }
}
