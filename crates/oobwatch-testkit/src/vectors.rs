//! Known-answer vectors for the record cipher.
//!
//! Ciphertexts are the CFB128 examples from NIST SP 800-38A, appendix F.3.
//! Each vector is packaged the way the interaction server frames a record:
//! `base64(iv || ciphertext || trailer)`.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use oobwatch_core::decrypt_payload;

/// The trailing byte appended after the ciphertext.
pub const TRAILER: u8 = b'\n';

/// A known-answer vector.
#[derive(Debug, Clone)]
pub struct CfbVector {
    /// Human-readable name for the vector.
    pub name: &'static str,
    pub key: &'static str,
    pub iv: &'static str,
    pub plaintext: &'static str,
    pub ciphertext: &'static str,
}

const SP800_38A_IV: &str = "000102030405060708090a0b0c0d0e0f";

/// Get all vectors.
pub fn all_vectors() -> Vec<CfbVector> {
    vec![
        CfbVector {
            name: "CFB128-AES128 two blocks",
            key: "2b7e151628aed2a6abf7158809cf4f3c",
            iv: SP800_38A_IV,
            plaintext: "6bc1bee22e409f96e93d7e117393172aae2d8a571e03ac9c9eb76fac45af8e51",
            ciphertext: "3b3fd92eb72dad20333449f8e83cfb4ac8a64537a0b3a93fcde3cdad9f1ce58b",
        },
        CfbVector {
            name: "CFB128-AES128 partial block",
            key: "2b7e151628aed2a6abf7158809cf4f3c",
            iv: SP800_38A_IV,
            plaintext: "6bc1bee22e",
            ciphertext: "3b3fd92eb7",
        },
        CfbVector {
            name: "CFB128-AES192 one block",
            key: "8e73b0f7da0e6452c810f32b809079e562f8ead2522c6b7b",
            iv: SP800_38A_IV,
            plaintext: "6bc1bee22e409f96e93d7e117393172a",
            ciphertext: "cdc80d6fddf18cab34c25909c99a4174",
        },
        CfbVector {
            name: "CFB128-AES256 one block",
            key: "603deb1015ca71be2b73aef0857d77811f352c073b6108d72d9810a30914dff4",
            iv: SP800_38A_IV,
            plaintext: "6bc1bee22e409f96e93d7e117393172a",
            ciphertext: "dc7e84bfda79164b7ecd8486985d3860",
        },
    ]
}

fn unhex(s: &str) -> Vec<u8> {
    hex::decode(s).expect("vector hex is valid")
}

/// Frame a vector as a server record.
pub fn record_from_vector(vector: &CfbVector) -> String {
    let mut raw = unhex(vector.iv);
    raw.extend(unhex(vector.ciphertext));
    raw.push(TRAILER);
    STANDARD.encode(raw)
}

/// Decrypt every vector and compare with its plaintext.
///
/// Returns the names of the vectors that failed.
pub fn verify_all_vectors() -> Vec<&'static str> {
    all_vectors()
        .into_iter()
        .filter(|v| {
            let key = unhex(v.key);
            decrypt_payload(&record_from_vector(v), &key).ok() != Some(unhex(v.plaintext))
        })
        .map(|v| v.name)
        .collect()
}
