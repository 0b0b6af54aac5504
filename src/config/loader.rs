//! Configuration loading
//!
//! Two sources, applied in order: an optional JSON file, then the launcher's
//! positional arguments `sourcePort destIP destPort [yes|no] [retryCount]
//! [timeoutSeconds] [privateKeyFilePath]`.

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, warn};

use super::types::ProxyConfig;
use crate::common::{ProxyError, Result};

/// Positional arguments required when no configuration file is given
pub const REQUIRED_POSITIONALS: usize = 3;

impl ProxyConfig {
    /// Load configuration from a JSON file
    ///
    /// Missing fields take their defaults; unknown fields are rejected.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        debug!("Loading configuration from file: {}", path.display());

        let contents = fs::read_to_string(path).map_err(|e| {
            ProxyError::Config(format!(
                "Failed to read configuration file {}: {}",
                path.display(),
                e
            ))
        })?;

        serde_json::from_str(&contents).map_err(|e| {
            ProxyError::Config(format!("Error parsing {}: {}", path.display(), e))
        })
    }

    /// Build configuration from positional arguments alone
    ///
    /// Fewer than three arguments is a usage error.
    pub fn from_positional(args: &[String]) -> Result<Self> {
        if args.len() < REQUIRED_POSITIONALS {
            return Err(ProxyError::Config(format!(
                "Missing arguments: expected at least {} (sourcePort destIP destPort), got {}",
                REQUIRED_POSITIONALS,
                args.len()
            )));
        }

        Self::default().with_positional(args)
    }

    /// Overlay positional arguments on this configuration
    ///
    /// Arguments are taken in launcher order; any trailing subset may be
    /// omitted. Counts, timeouts and ports that are not positive keep their
    /// current value, as the launcher treats `0` as "not given".
    pub fn with_positional(mut self, args: &[String]) -> Result<Self> {
        let mut args = args.iter();

        if let Some(port) = args.next() {
            if let Some(port) = parse_positive::<u16>("sourcePort", port)? {
                self.source_port = port;
            }
        }

        if let Some(host) = args.next() {
            self.destination_host = host.clone();
        }

        if let Some(port) = args.next() {
            if let Some(port) = parse_positive::<u16>("destPort", port)? {
                self.destination_port = port;
            }
        }

        if let Some(flag) = args.next() {
            self.use_retry = flag.eq_ignore_ascii_case("yes");
        }

        if let Some(count) = args.next() {
            if let Some(count) = parse_positive::<u32>("retryCount", count)? {
                self.retry_count = count;
            }
        }

        if let Some(timeout) = args.next() {
            if let Some(timeout) = parse_positive::<u64>("timeoutSeconds", timeout)? {
                self.reply_timeout = timeout;
            }
        }

        if let Some(key) = args.next() {
            if !key.is_empty() {
                self.private_key_path = Some(PathBuf::from(key));
            }
        }

        for extra in args {
            warn!("Ignoring extra argument: {}", extra);
        }

        Ok(self)
    }
}

/// Parse a numeric argument; `Ok(None)` for zero or negative values
fn parse_positive<T: TryFrom<i64>>(name: &str, value: &str) -> Result<Option<T>> {
    let parsed: i64 = value.trim().parse().map_err(|_| {
        ProxyError::Config(format!("Invalid value for {}: '{}' is not a number", name, value))
    })?;

    if parsed <= 0 {
        warn!("{} is {}, keeping the default", name, parsed);
        return Ok(None);
    }

    T::try_from(parsed)
        .map(Some)
        .map_err(|_| ProxyError::Config(format!("Invalid value for {}: {} is out of range", name, parsed)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_minimal_positionals() {
        let config = ProxyConfig::from_positional(&args(&["9000", "10.1.1.1", "9100"])).unwrap();

        assert_eq!(config.source_port, 9000);
        assert_eq!(config.destination_host, "10.1.1.1");
        assert_eq!(config.destination_port, 9100);
        assert!(!config.use_retry);
        assert_eq!(config.retry_count, 2);
        assert_eq!(config.reply_timeout, 10);
        assert!(config.private_key_path.is_none());
    }

    #[test]
    fn test_all_positionals() {
        let config = ProxyConfig::from_positional(&args(&[
            "9000", "dest.local", "9100", "YES", "5", "3", "/etc/relay/key.pem",
        ]))
        .unwrap();

        assert!(config.use_retry);
        assert_eq!(config.retry_count, 5);
        assert_eq!(config.reply_timeout, 3);
        assert_eq!(config.private_key_path, Some(PathBuf::from("/etc/relay/key.pem")));
    }

    #[test]
    fn test_too_few_positionals() {
        let result = ProxyConfig::from_positional(&args(&["9000", "10.1.1.1"]));
        assert!(matches!(result, Err(ProxyError::Config(_))));
    }

    #[test]
    fn test_non_positive_values_keep_defaults() {
        let config =
            ProxyConfig::from_positional(&args(&["9000", "h", "9100", "yes", "0", "-4"])).unwrap();

        assert_eq!(config.retry_count, 2);
        assert_eq!(config.reply_timeout, 10);
    }

    #[test]
    fn test_retry_flag_other_than_yes() {
        let config = ProxyConfig::from_positional(&args(&["9000", "h", "9100", "true"])).unwrap();
        assert!(!config.use_retry);
    }

    #[test]
    fn test_invalid_numbers() {
        assert!(ProxyConfig::from_positional(&args(&["abc", "h", "9100"])).is_err());
        assert!(ProxyConfig::from_positional(&args(&["9000", "h", "70000"])).is_err());
        assert!(ProxyConfig::from_positional(&args(&["9000", "h", "9100", "yes", "two"])).is_err());
    }

    #[test]
    fn test_file_then_positionals() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{ "destination_host": "file-host", "use_retry": true, "retry_count": 4, "buffer_size": 1024 }}"#
        )
        .unwrap();

        let config = ProxyConfig::from_file(file.path())
            .unwrap()
            .with_positional(&args(&["9001"]))
            .unwrap();

        assert_eq!(config.source_port, 9001);
        assert_eq!(config.destination_host, "file-host");
        assert!(config.use_retry);
        assert_eq!(config.retry_count, 4);
        assert_eq!(config.buffer_size, 1024);
    }

    #[test]
    fn test_missing_file() {
        let result = ProxyConfig::from_file("does/not/exist.json");
        assert!(matches!(result, Err(ProxyError::Config(_))));
    }
}
