//! Configuration types

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::defaults;

/// Relay configuration
///
/// Built once at startup from an optional JSON file and the launcher
/// arguments, then shared read-only as `Arc<ProxyConfig>`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
#[serde(default)]
pub struct ProxyConfig {
    // --- Network settings ---

    /// Interface the proxy listens on
    pub listen_host: String,

    /// Port the source connects to
    pub source_port: u16,

    /// Destination host name or IP address
    pub destination_host: String,

    /// Destination port
    pub destination_port: u16,

    /// Destination connect timeout in seconds
    pub connect_timeout: u64,

    /// Read chunk size for both stream readers (in bytes)
    pub buffer_size: usize,

    /// Reuse a live destination connection instead of reconnecting per attempt
    pub reuse_destination: bool,

    // --- Retry settings ---

    /// Add sequence numbers and resend until a matching reply arrives
    pub use_retry: bool,

    /// Resends allowed after the first attempt
    pub retry_count: u32,

    /// How long to wait for a reply before resending, in seconds
    pub reply_timeout: u64,

    // --- Decryption settings ---

    /// PEM private key used to decrypt replies (decryption is off when unset)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub private_key_path: Option<PathBuf>,

    // --- General settings ---

    /// Log level (error, warn, info, debug, trace)
    pub log_level: String,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            listen_host: defaults::listen_host(),
            source_port: defaults::source_port(),
            destination_host: String::new(),
            destination_port: defaults::destination_port(),
            connect_timeout: defaults::connect_timeout(),
            buffer_size: defaults::buffer_size(),
            reuse_destination: defaults::reuse_destination(),
            use_retry: defaults::use_retry(),
            retry_count: defaults::retry_count(),
            reply_timeout: defaults::reply_timeout(),
            private_key_path: None,
            log_level: defaults::log_level(),
        }
    }
}

impl ProxyConfig {
    /// `host:port` the proxy listens on
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.listen_host, self.source_port)
    }

    /// `host:port` of the destination
    pub fn destination_addr(&self) -> String {
        format!("{}:{}", self.destination_host, self.destination_port)
    }

    /// Reply wait per attempt
    pub fn reply_timeout_duration(&self) -> Duration {
        Duration::from_secs(self.reply_timeout)
    }

    /// Destination connect timeout
    pub fn connect_timeout_duration(&self) -> Duration {
        Duration::from_secs(self.connect_timeout)
    }

    /// Total send attempts for one request (first send plus resends)
    pub fn max_attempts(&self) -> u32 {
        if self.use_retry {
            self.retry_count.saturating_add(1)
        } else {
            1
        }
    }
}

/// Log the effective configuration
pub fn log_config(config: &ProxyConfig) {
    use log::info;

    if !log::log_enabled!(log::Level::Info) {
        return;
    }

    info!("=== Relay Configuration ===");
    info!("  Listen address: {}", config.listen_addr());
    info!("  Destination: {}", config.destination_addr());
    info!("  Connect timeout: {} seconds", config.connect_timeout);
    info!("  Buffer size: {} bytes", config.buffer_size);
    info!("  Reuse destination connection: {}", config.reuse_destination);
    if config.use_retry {
        info!("  Retry: yes ({} resends, {} seconds per reply)", config.retry_count, config.reply_timeout);
    } else {
        info!("  Retry: no");
    }
    match &config.private_key_path {
        Some(path) => info!("  Private key: {}", path.display()),
        None => info!("  Private key: none (decryption disabled)"),
    }
    info!("===========================");
}
