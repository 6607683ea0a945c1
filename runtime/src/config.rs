/*!
Router configuration loaded from the process environment
*/

use crate::level::Severity;

/// Environment variable holding the initial severity threshold
/// (a level name or its ordinal)
pub const LEVEL_ENV: &str = "INTEROP_LOG_LEVEL";

/// Settings the log router starts with and returns to on reset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LogConfig {
    pub threshold: Severity,
}

impl LogConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup. Missing or unparsable
    /// values fall back to the defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let threshold = lookup(LEVEL_ENV)
            .and_then(|raw| raw.parse().ok())
            .unwrap_or_default();
        Self { threshold }
    }

    pub fn with_threshold(mut self, threshold: Severity) -> Self {
        self.threshold = threshold;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_threshold_is_fine() {
        assert_eq!(LogConfig::default().threshold, Severity::Fine);
    }

    #[test]
    fn test_lookup_by_name_and_ordinal() {
        let by_name = LogConfig::from_lookup(|key| {
            assert_eq!(key, LEVEL_ENV);
            Some("Warning".to_string())
        });
        assert_eq!(by_name.threshold, Severity::Warning);

        let by_ordinal = LogConfig::from_lookup(|_| Some("4".to_string()));
        assert_eq!(by_ordinal.threshold, Severity::Fatal);
    }

    #[test]
    fn test_invalid_value_falls_back() {
        let config = LogConfig::from_lookup(|_| Some("chatty".to_string()));
        assert_eq!(config, LogConfig::default());

        let missing = LogConfig::from_lookup(|_| None);
        assert_eq!(missing, LogConfig::default());
    }
}
