//! Common module
//!
//! This module contains shared errors and utility functions used throughout the application.

pub mod error;
pub mod fs;
pub mod hex;
pub mod log;
pub mod net;

// Re-export commonly used types and functions
pub use error::{ProxyError, Result};
pub use fs::read_file;
pub use hex::HexDump;
pub use log::init_logger;
pub use net::{bind_listener, configure_stream, connect_with_timeout, parse_socket_addr};
