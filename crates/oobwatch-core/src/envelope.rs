//! Hybrid envelope decryption.
//!
//! Every poll response carries a fresh symmetric key wrapped with the
//! session's RSA public key (OAEP, SHA-256, MGF1/SHA-256, empty label), and a
//! batch of records each encrypted under that key with AES-CFB.
//!
//! Record layout after base64 decoding:
//!
//! ```text
//! | iv (16) | ciphertext (n) | trailer (1) |
//! ```
//!
//! The trailing byte is produced by the server's encoder and is discarded
//! before decryption.

use aes::{Aes128, Aes192, Aes256};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use cfb_mode::cipher::{AsyncStreamCipher, KeyIvInit};
use cfb_mode::{Decryptor, Encryptor};
use rsa::{Oaep, RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;

use crate::error::{CoreError, Result};

/// Length of the AES-CFB initialization vector.
pub const IV_LEN: usize = 16;

/// Bytes appended by the server after the ciphertext.
pub const TRAILER_LEN: usize = 1;

/// Symmetric key recovered from a poll response.
#[derive(Clone, PartialEq, Eq)]
pub struct SymmetricKey(Vec<u8>);

impl SymmetricKey {
    /// Wrap raw key bytes; AES-128, AES-192 and AES-256 sizes are accepted.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        match bytes.len() {
            16 | 24 | 32 => Ok(Self(bytes)),
            n => Err(CoreError::InvalidKeyLength(n)),
        }
    }

    /// Get the raw bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Decrypt one base64 record.
    pub fn decrypt(&self, entry_b64: &str) -> Result<Vec<u8>> {
        decrypt_payload(entry_b64, &self.0)
    }

    /// Decrypt one base64 record into UTF-8 text.
    pub fn decrypt_text(&self, entry_b64: &str) -> Result<String> {
        let plaintext = self.decrypt(entry_b64)?;
        String::from_utf8(plaintext)
            .map_err(|e| CoreError::Parse(format!("record is not UTF-8: {e}")))
    }
}

impl std::fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SymmetricKey({} bytes)", self.0.len())
    }
}

/// Base64-decode and RSA-OAEP-decrypt a wrapped symmetric key.
pub fn unwrap_key(wrapped_key_b64: &str, private_key: &RsaPrivateKey) -> Result<Vec<u8>> {
    let wrapped = STANDARD
        .decode(wrapped_key_b64.trim())
        .map_err(|e| CoreError::Crypto(format!("wrapped key is not base64: {e}")))?;

    private_key
        .decrypt(Oaep::new::<Sha256>(), &wrapped)
        .map_err(|e| CoreError::Crypto(format!("key unwrap failed: {e}")))
}

/// RSA-OAEP-encrypt a symmetric key and base64-encode it.
///
/// This is the server half of [`unwrap_key`].
pub fn wrap_key(key: &[u8], public_key: &RsaPublicKey) -> Result<String> {
    let mut rng = rand::thread_rng();
    let wrapped = public_key
        .encrypt(&mut rng, Oaep::new::<Sha256>(), key)
        .map_err(|e| CoreError::Crypto(format!("key wrap failed: {e}")))?;
    Ok(STANDARD.encode(wrapped))
}

/// Base64-decode and AES-CFB-decrypt one record.
pub fn decrypt_payload(entry_b64: &str, key: &[u8]) -> Result<Vec<u8>> {
    let raw = STANDARD
        .decode(entry_b64.trim())
        .map_err(|e| CoreError::Crypto(format!("record is not base64: {e}")))?;

    if raw.len() < IV_LEN + TRAILER_LEN {
        return Err(CoreError::Crypto(format!(
            "record too short: {} bytes",
            raw.len()
        )));
    }

    let (iv, rest) = raw.split_at(IV_LEN);
    let mut buf = rest[..rest.len() - TRAILER_LEN].to_vec();
    apply_cfb(key, iv, &mut buf, Direction::Decrypt)?;
    Ok(buf)
}

/// AES-CFB-encrypt one record the way the server does and base64-encode it.
///
/// The server encodes records with a trailing newline, which is what
/// [`decrypt_payload`] drops.
pub fn encrypt_payload(plaintext: &[u8], key: &[u8], iv: &[u8; IV_LEN]) -> Result<String> {
    let mut buf = Vec::with_capacity(plaintext.len() + TRAILER_LEN);
    buf.extend_from_slice(plaintext);
    buf.push(b'\n');
    apply_cfb(key, iv, &mut buf, Direction::Encrypt)?;

    let mut out = Vec::with_capacity(IV_LEN + buf.len());
    out.extend_from_slice(iv);
    out.extend_from_slice(&buf);
    Ok(STANDARD.encode(out))
}

#[derive(Clone, Copy)]
enum Direction {
    Encrypt,
    Decrypt,
}

macro_rules! cfb {
    ($cipher:ty, $key:expr, $iv:expr, $buf:expr, $dir:expr) => {
        match $dir {
            Direction::Encrypt => Encryptor::<$cipher>::new_from_slices($key, $iv)
                .map_err(|_| CoreError::Crypto("invalid IV length".into()))?
                .encrypt($buf),
            Direction::Decrypt => Decryptor::<$cipher>::new_from_slices($key, $iv)
                .map_err(|_| CoreError::Crypto("invalid IV length".into()))?
                .decrypt($buf),
        }
    };
}

fn apply_cfb(key: &[u8], iv: &[u8], buf: &mut [u8], direction: Direction) -> Result<()> {
    match key.len() {
        16 => cfb!(Aes128, key, iv, buf, direction),
        24 => cfb!(Aes192, key, iv, buf, direction),
        32 => cfb!(Aes256, key, iv, buf, direction),
        n => return Err(CoreError::InvalidKeyLength(n)),
    }
    Ok(())
}
