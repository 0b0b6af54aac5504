//! Retry Relay: a length-prefixed TCP relay for unreliable destinations
//!
//! The relay accepts a single source connection at a time and forwards each
//! 2-byte length-prefixed frame to a configured destination. Replies travel
//! back the same way.
//!
//! # Main Features
//!
//! - Frame reassembly across arbitrary TCP segmentation
//! - Optional sequence-numbered requests with timed resends
//! - Optional RSA decryption of replies in 256-byte blocks
//! - A new source connection supersedes the previous one
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use retry_relay::{Proxy, Result};
//! use retry_relay::config::ProxyConfig;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let args: Vec<String> = ["9530", "10.0.0.7", "9531", "yes", "3", "5"]
//!         .iter()
//!         .map(|s| s.to_string())
//!         .collect();
//!
//!     let config = ProxyConfig::from_positional(&args)?;
//!     config.validate()?;
//!
//!     let proxy = Proxy::new(Arc::new(config), None);
//!     proxy.run().await
//! }
//! ```

// Public modules
pub mod common;
pub mod config;
pub mod crypto;
pub mod protocol;
pub mod proxy;
pub mod retry;

// Re-export commonly used structures and functions for convenience
pub use common::{ProxyError, Result};
pub use config::ProxyConfig;
pub use crypto::RsaDecryptor;
pub use proxy::Proxy;

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
