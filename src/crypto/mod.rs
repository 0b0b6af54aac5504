//! Cryptography module
//!
//! Decryption of RSA-encrypted destination replies.

pub mod rsa;

// Re-export commonly used types and functions
pub use rsa::{decrypt_blocks, BlockDecrypt, RsaDecryptor, RSA_BLOCK_SIZE};
