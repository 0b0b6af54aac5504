//! Proxy service module
//!
//! This module implements the relay core: the accept loop, the per-source
//! session, and the stream readers that feed frames into it.

pub mod server;
mod forwarder;
mod session;

pub use forwarder::Side;
pub use server::Proxy;
pub use session::{RelayContext, Session, MAX_RETIRED_LINKS};
