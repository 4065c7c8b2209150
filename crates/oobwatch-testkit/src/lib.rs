//! # oobwatch Testkit
//!
//! Testing utilities for oobwatch.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Vectors**: NIST AES-CFB known answers framed as server records
//! - **Generators**: Proptest strategies for keys, hosts and interaction records
//! - **Fixtures**: A shared RSA key, sample records, and an in-memory server setup
//!
//! ## Vectors
//!
//! ```rust
//! use oobwatch_testkit::vectors::verify_all_vectors;
//!
//! assert!(verify_all_vectors().is_empty());
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use oobwatch_testkit::generators::{aes_key, iv, record_from_params, RecordParams};
//!
//! proptest! {
//!     #[test]
//!     fn record_roundtrip(params: RecordParams, key in aes_key(), iv in iv()) {
//!         let record = record_from_params(&params);
//!         let encoded = oobwatch_core::encrypt_payload(record.as_bytes(), &key, &iv).unwrap();
//!         prop_assert_eq!(oobwatch_core::decrypt_payload(&encoded, &key).unwrap(), record.into_bytes());
//!     }
//! }
//! ```
//!
//! ## Test Fixtures
//!
//! ```rust,no_run
//! use oobwatch_testkit::fixtures::{http_record, TestFixture};
//!
//! # async fn example() {
//! let fixture = TestFixture::new();
//! let mut client = fixture.client();
//! client.register().await.unwrap();
//! fixture.server.push_interaction(client.correlation_id(), http_record("abc"));
//! # }
//! ```

pub mod fixtures;
pub mod generators;
pub mod vectors;

pub use fixtures::{
    dns_record, http_record, identity, shared_private_key, smtp_record, TestFixture, TEST_HOST,
};
pub use generators::{record_from_params, RecordParams};
pub use vectors::{all_vectors, record_from_vector, verify_all_vectors, CfbVector};
