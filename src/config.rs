use serde::{Deserialize, Serialize};

/// Cascade pipeline configuration
///
/// # Examples
///
/// ```
/// use onsoftdelete::CascadeConfig;
///
/// let config = CascadeConfig::new()
///     .max_depth(8)
///     .validate_on_startup(false);
/// assert_eq!(config.max_depth, 8);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CascadeConfig {
    /// Deepest nested cascade allowed before the delete is aborted
    pub max_depth: usize,

    /// Run relationship discovery when the listener is created
    pub validate_on_startup: bool,

    /// Skip rows that are already being cascaded instead of descending again
    pub detect_cycles: bool,
}

impl CascadeConfig {
    pub fn new() -> Self {
        Self {
            max_depth: 32,
            validate_on_startup: true,
            detect_cycles: true,
        }
    }

    /// Set maximum cascade depth
    pub fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    /// Enable or disable startup validation
    pub fn validate_on_startup(mut self, enabled: bool) -> Self {
        self.validate_on_startup = enabled;
        self
    }

    /// Enable or disable cycle detection
    pub fn detect_cycles(mut self, enabled: bool) -> Self {
        self.detect_cycles = enabled;
        self
    }
}

impl Default for CascadeConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CascadeConfig::default();
        assert_eq!(config.max_depth, 32);
        assert!(config.validate_on_startup);
        assert!(config.detect_cycles);
    }

    #[test]
    fn test_partial_config_from_json() {
        let config: CascadeConfig = serde_json::from_str(r#"{"max_depth": 4}"#).unwrap();
        assert_eq!(config.max_depth, 4);
        assert!(config.validate_on_startup);
    }
}
