//! Wire protocol module
//!
//! Both links (source to proxy, proxy to destination) carry the same
//! length-prefixed frames; see [`frame`].

pub mod frame;

pub use frame::{decode, encode, encode_sequenced, EMPTY_FRAME, HEADER_LEN, MAX_PAYLOAD_LEN};
