//! Block-wise RSA decryption of destination replies
//!
//! Replies are a concatenation of independent RSA blocks, each exactly one
//! modulus (256 bytes, i.e. a 2048-bit key) long. Each block is decrypted on its
//! own with PKCS#1 v1.5 padding and the plaintexts are concatenated in order.
//! A trailing partial block is skipped, so the key size is a hard constraint of
//! the wire format rather than a tunable.

use log::{debug, info, trace, warn};
use openssl::pkey::{PKey, Private};
use openssl::rsa::{Padding, Rsa};

use crate::common::{HexDump, ProxyError, Result};

/// Ciphertext block size in bytes (RSA-2048 modulus)
pub const RSA_BLOCK_SIZE: usize = 256;

/// Decrypts a single ciphertext block
#[cfg_attr(test, mockall::automock)]
pub trait BlockDecrypt: Send + Sync {
    /// Decrypt one `RSA_BLOCK_SIZE` block and return its plaintext
    fn decrypt_block(&self, block: &[u8]) -> Result<Vec<u8>>;
}

/// Run `engine` over every whole block of `ciphertext`
///
/// Blocks that fail to decrypt contribute nothing to the output.
pub fn decrypt_blocks<D: BlockDecrypt + ?Sized>(engine: &D, ciphertext: &[u8]) -> Vec<u8> {
    let mut plaintext = Vec::with_capacity(ciphertext.len());
    let blocks = ciphertext.chunks_exact(RSA_BLOCK_SIZE);

    let trailing = blocks.remainder().len();
    if trailing > 0 {
        debug!("Skipping {} trailing bytes (not a whole RSA block)", trailing);
    }

    for (index, block) in blocks.enumerate() {
        match engine.decrypt_block(block) {
            Ok(out) => plaintext.extend_from_slice(&out),
            Err(e) => warn!("Failed to decrypt RSA block #{}: {}", index, e),
        }
    }

    plaintext
}

/// Private key ready for PKCS#1 decryption
struct RsaKey {
    rsa: Rsa<Private>,
}

impl BlockDecrypt for RsaKey {
    fn decrypt_block(&self, block: &[u8]) -> Result<Vec<u8>> {
        let mut out = vec![0u8; self.rsa.size() as usize];
        let len = self.rsa.private_decrypt(block, &mut out, Padding::PKCS1)?;
        out.truncate(len);
        Ok(out)
    }
}

/// RSA decryption engine
///
/// Starts without a key; [`RsaDecryptor::load_key`] enables it. Loading again
/// replaces the key, and a failed load leaves the engine disabled.
#[derive(Default)]
pub struct RsaDecryptor {
    key: Option<RsaKey>,
}

impl RsaDecryptor {
    /// Create a decryptor with no key loaded
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a decryptor from PEM key material
    ///
    /// Returns `None` when the key cannot be used; the relay then forwards
    /// replies as plaintext.
    pub fn from_pem(pem: &[u8]) -> Option<Self> {
        let mut decryptor = Self::new();
        decryptor.load_key(pem).then_some(decryptor)
    }

    /// Load a PEM-encoded RSA private key (PKCS#1 or PKCS#8)
    ///
    /// Returns `false` and disables decryption on any failure.
    pub fn load_key(&mut self, pem: &[u8]) -> bool {
        self.key = None;

        match parse_private_key(pem) {
            Ok(rsa) => {
                info!("RSA private key loaded ({} bits)", rsa.size() * 8);
                self.key = Some(RsaKey { rsa });
                true
            }
            Err(e) => {
                warn!("Failed to load RSA private key: {}", e);
                false
            }
        }
    }

    /// Whether a key is loaded
    pub fn is_enabled(&self) -> bool {
        self.key.is_some()
    }

    /// Decrypt `ciphertext` block by block
    ///
    /// Returns an empty vector when no key is loaded.
    pub fn decrypt(&self, ciphertext: &[u8]) -> Vec<u8> {
        let Some(key) = &self.key else {
            warn!("Decryption requested but no RSA key is loaded");
            return Vec::new();
        };

        trace!("Decrypting {}", HexDump::from(ciphertext));
        let plaintext = decrypt_blocks(key, ciphertext);
        trace!("Decrypted {}", HexDump::from(plaintext.as_slice()));

        plaintext
    }
}

impl std::fmt::Debug for RsaDecryptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RsaDecryptor")
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

/// PEM → PKCS#8 DER → RSA private key
fn parse_private_key(pem: &[u8]) -> Result<Rsa<Private>> {
    let pkey = PKey::private_key_from_pem(pem)?;
    let pkcs8 = pkey.private_key_to_pkcs8()?;
    let rsa = PKey::private_key_from_pkcs8(&pkcs8)?
        .rsa()
        .map_err(|_| ProxyError::KeyLoad("Key is not an RSA key".to_string()))?;

    let modulus = rsa.size() as usize;
    if modulus != RSA_BLOCK_SIZE {
        return Err(ProxyError::KeyLoad(format!(
            "RSA modulus is {} bytes, replies are framed in {}-byte blocks",
            modulus, RSA_BLOCK_SIZE
        )));
    }

    Ok(rsa)
}

#[cfg(test)]
mod tests {
    use super::*;
    use openssl::rsa::Rsa;

    fn generate_pem(bits: u32) -> (Vec<u8>, Rsa<Private>) {
        let rsa = Rsa::generate(bits).unwrap();
        (rsa.private_key_to_pem().unwrap(), rsa)
    }

    fn encrypt_block(rsa: &Rsa<Private>, plaintext: &[u8]) -> Vec<u8> {
        let mut out = vec![0u8; rsa.size() as usize];
        let len = rsa.public_encrypt(plaintext, &mut out, Padding::PKCS1).unwrap();
        out.truncate(len);
        out
    }

    #[test]
    fn test_load_pkcs1_and_pkcs8() {
        let (pkcs1_pem, rsa) = generate_pem(2048);
        let mut decryptor = RsaDecryptor::new();
        assert!(!decryptor.is_enabled());
        assert!(decryptor.load_key(&pkcs1_pem));
        assert!(decryptor.is_enabled());

        let pkcs8_pem = PKey::from_rsa(rsa).unwrap().private_key_to_pem_pkcs8().unwrap();
        assert!(RsaDecryptor::from_pem(&pkcs8_pem).is_some());
    }

    #[test]
    fn test_load_garbage_disables() {
        let (pem, _) = generate_pem(2048);
        let mut decryptor = RsaDecryptor::new();
        assert!(decryptor.load_key(&pem));

        // A failed reload must not leave the old key active
        assert!(!decryptor.load_key(b"not a key"));
        assert!(!decryptor.is_enabled());
        assert!(decryptor.decrypt(&[0u8; RSA_BLOCK_SIZE]).is_empty());
    }

    #[test]
    fn test_wrong_key_size_rejected() {
        let (pem, _) = generate_pem(1024);
        assert!(RsaDecryptor::from_pem(&pem).is_none());
    }

    #[test]
    fn test_decrypt_two_blocks() {
        let (pem, rsa) = generate_pem(2048);
        let decryptor = RsaDecryptor::from_pem(&pem).unwrap();

        let mut ciphertext = encrypt_block(&rsa, b"hello ");
        ciphertext.extend(encrypt_block(&rsa, b"world"));
        assert_eq!(ciphertext.len(), 2 * RSA_BLOCK_SIZE);

        assert_eq!(decryptor.decrypt(&ciphertext), b"hello world");
    }

    #[test]
    fn test_decrypt_ignores_trailing_partial_block() {
        let (pem, rsa) = generate_pem(2048);
        let decryptor = RsaDecryptor::from_pem(&pem).unwrap();

        let mut ciphertext = encrypt_block(&rsa, b"only this");
        ciphertext.extend([0xaa; 44]);
        assert_eq!(ciphertext.len(), 300);

        assert_eq!(decryptor.decrypt(&ciphertext), b"only this");
        assert!(decryptor.decrypt(&ciphertext[..100]).is_empty());
    }

    #[test]
    fn test_block_count_and_order() {
        let mut engine = MockBlockDecrypt::new();
        let mut seq = mockall::Sequence::new();
        engine
            .expect_decrypt_block()
            .withf(|block| block.len() == RSA_BLOCK_SIZE && block[0] == 1)
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(b"first-".to_vec()));
        engine
            .expect_decrypt_block()
            .withf(|block| block.len() == RSA_BLOCK_SIZE && block[0] == 2)
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(b"second".to_vec()));

        let mut ciphertext = vec![1u8; RSA_BLOCK_SIZE];
        ciphertext.extend(vec![2u8; RSA_BLOCK_SIZE]);

        assert_eq!(decrypt_blocks(&engine, &ciphertext), b"first-second");
    }

    #[test]
    fn test_partial_block_not_sent_to_engine() {
        let mut engine = MockBlockDecrypt::new();
        engine
            .expect_decrypt_block()
            .times(1)
            .returning(|_| Ok(vec![0x42]));

        assert_eq!(decrypt_blocks(&engine, &[0u8; 300]), vec![0x42]);
    }

    #[test]
    fn test_failed_block_is_skipped() {
        let mut engine = MockBlockDecrypt::new();
        let mut seq = mockall::Sequence::new();
        engine
            .expect_decrypt_block()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Err(ProxyError::KeyLoad("padding check failed".to_string())));
        engine
            .expect_decrypt_block()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(b"ok".to_vec()));

        assert_eq!(decrypt_blocks(&engine, &[0u8; 2 * RSA_BLOCK_SIZE]), b"ok");
    }
}
