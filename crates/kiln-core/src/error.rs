use thiserror::Error;

/// A missing or invalid configuration setting.
///
/// Raised at validate time, before any cycle runs; the message always names
/// the offending attribute so a misconfigured project fails loudly.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("'{attribute}' is required for {plugin}")]
    Required {
        plugin: &'static str,
        attribute: &'static str,
    },
    #[error("value for '{attribute}' must be one of {allowed}, got \"{got}\"")]
    OneOf {
        attribute: &'static str,
        allowed: &'static str,
        got: String,
    },
    #[error("value for '{attribute}' on {plugin} is invalid: {reason}")]
    Invalid {
        plugin: &'static str,
        attribute: &'static str,
        reason: String,
    },
}

impl ConfigError {
    pub fn required(plugin: &'static str, attribute: &'static str) -> Self {
        ConfigError::Required { plugin, attribute }
    }

    pub fn one_of(attribute: &'static str, allowed: &'static str, got: impl Into<String>) -> Self {
        ConfigError::OneOf {
            attribute,
            allowed,
            got: got.into(),
        }
    }

    pub fn invalid(
        plugin: &'static str,
        attribute: &'static str,
        reason: impl Into<String>,
    ) -> Self {
        ConfigError::Invalid {
            plugin,
            attribute,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn required_message_names_attribute_and_plugin() {
        let err = ConfigError::required("journal", "journal_file");
        assert_eq!(err.to_string(), "'journal_file' is required for journal");
    }

    #[test]
    fn one_of_message_lists_allowed_values() {
        let err = ConfigError::one_of("report_success", "always, fixes, never", "sometimes");
        assert_eq!(
            err.to_string(),
            "value for 'report_success' must be one of always, fixes, never, got \"sometimes\""
        );
    }

    #[test]
    fn invalid_message_carries_reason() {
        let err = ConfigError::invalid("webhook", "url", "not an http(s) URL");
        assert_eq!(
            err.to_string(),
            "value for 'url' on webhook is invalid: not an http(s) URL"
        );
    }
}
