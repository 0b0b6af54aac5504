//! Configuration module
//!
//! This module handles relay configuration: defaults, loading from a JSON
//! file and the launcher's positional arguments, and validation.

mod defaults;
mod loader;
mod types;
mod validator;

pub use self::defaults::LOG_LEVEL_STR;
pub use self::loader::REQUIRED_POSITIONALS;
pub use self::types::{log_config, ProxyConfig};
