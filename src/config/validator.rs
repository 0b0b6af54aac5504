//! Configuration validator

use log::warn;

use super::types::ProxyConfig;
use crate::common::{ProxyError, Result};

/// Retry counts beyond this would cycle the 1-byte sequence space within one request
const MAX_RETRY_COUNT: u32 = 255;

impl ProxyConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        validate_network_settings(self)?;
        validate_retry_settings(self)?;
        validate_general_settings(self);
        Ok(())
    }
}

/// Validate network settings
fn validate_network_settings(config: &ProxyConfig) -> Result<()> {
    if config.destination_host.trim().is_empty() {
        return Err(invalid("destination_host", "Destination host must not be empty"));
    }

    if config.destination_port == 0 {
        return Err(invalid("destination_port", "Destination port must be greater than 0"));
    }

    if config.buffer_size == 0 {
        return Err(invalid("buffer_size", "Buffer size must be greater than 0"));
    }

    if config.connect_timeout == 0 {
        return Err(invalid("connect_timeout", "Connect timeout must be greater than 0"));
    }

    Ok(())
}

/// Validate retry settings
fn validate_retry_settings(config: &ProxyConfig) -> Result<()> {
    if config.retry_count > MAX_RETRY_COUNT {
        return Err(invalid(
            "retry_count",
            &format!("Retry count must be at most {}", MAX_RETRY_COUNT),
        ));
    }

    if config.reply_timeout == 0 {
        return Err(invalid("reply_timeout", "Reply timeout must be greater than 0"));
    }

    if !config.use_retry && config.retry_count != super::defaults::retry_count() {
        warn!("retry_count is set but retry mode is off; it will be ignored");
    }

    Ok(())
}

/// Validate general settings
fn validate_general_settings(config: &ProxyConfig) {
    match config.log_level.as_str() {
        "error" | "warn" | "info" | "debug" | "trace" => {}
        level => warn!("Unrecognised log level '{}', it is passed to the logger as a filter", level),
    }
}

fn invalid(field: &str, message: &str) -> ProxyError {
    ProxyError::Config(format!("Invalid value for '{}': {}", field, message))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> ProxyConfig {
        ProxyConfig {
            destination_host: "127.0.0.1".to_string(),
            ..ProxyConfig::default()
        }
    }

    #[test]
    fn test_valid_config() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_empty_destination() {
        let config = ProxyConfig::default();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("destination_host"));
    }

    #[test]
    fn test_zero_values_rejected() {
        let mut config = valid_config();
        config.destination_port = 0;
        assert!(config.validate().is_err());

        let mut config = valid_config();
        config.buffer_size = 0;
        assert!(config.validate().is_err());

        let mut config = valid_config();
        config.connect_timeout = 0;
        assert!(config.validate().is_err());

        let mut config = valid_config();
        config.reply_timeout = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_retry_count_limit() {
        let mut config = valid_config();
        config.use_retry = true;
        config.retry_count = 255;
        assert!(config.validate().is_ok());

        config.retry_count = 256;
        assert!(config.validate().is_err());
    }
}
