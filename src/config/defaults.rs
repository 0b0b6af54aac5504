//! Default configuration values
//!
//! Single source of truth for defaults, shared by `ProxyConfig::default()`
//! and the serde field defaults.

/// Default log level as string
pub const LOG_LEVEL_STR: &str = "info";

/// Default listen host (all interfaces)
pub fn listen_host() -> String {
    "0.0.0.0".to_string()
}

/// Default source (listening) port
pub fn source_port() -> u16 {
    9530
}

/// Default destination port
pub fn destination_port() -> u16 {
    9530
}

/// Retry mode is off unless asked for
pub fn use_retry() -> bool {
    false
}

/// Default number of resends after the first attempt
pub fn retry_count() -> u32 {
    2
}

/// Default wait for a destination reply, in seconds
pub fn reply_timeout() -> u64 {
    10
}

/// Default destination connect timeout, in seconds
pub fn connect_timeout() -> u64 {
    10
}

/// Default read chunk size (4KB)
pub fn buffer_size() -> usize {
    4096
}

/// A fresh destination connection is opened for every send attempt by default
pub fn reuse_destination() -> bool {
    false
}

/// Default log level
pub fn log_level() -> String {
    LOG_LEVEL_STR.to_string()
}
