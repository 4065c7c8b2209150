//! Proptest generators for property-based testing.

use proptest::prelude::*;

use oobwatch_core::IV_LEN;

/// Generate an AES key of 16, 24 or 32 bytes.
pub fn aes_key() -> impl Strategy<Value = Vec<u8>> {
    prop_oneof![Just(16usize), Just(24usize), Just(32usize)]
        .prop_flat_map(|len| prop::collection::vec(any::<u8>(), len))
}

/// Generate a key whose length AES rejects.
pub fn bad_aes_key() -> impl Strategy<Value = Vec<u8>> {
    (0usize..=64)
        .prop_filter("valid AES key length", |len| !matches!(len, 16 | 24 | 32))
        .prop_flat_map(|len| prop::collection::vec(any::<u8>(), len))
}

/// Generate an initialization vector.
pub fn iv() -> impl Strategy<Value = [u8; IV_LEN]> {
    any::<[u8; IV_LEN]>()
}

/// Generate payload bytes of specified max length.
pub fn payload(max_len: usize) -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..=max_len)
}

/// Generate a DNS host name such as `ab1.example`.
pub fn host() -> impl Strategy<Value = String> {
    prop::collection::vec("[a-z][a-z0-9-]{0,14}[a-z0-9]", 1..4)
        .prop_map(|labels| labels.join("."))
}

/// Parameters of a generated interaction record.
#[derive(Debug, Clone)]
pub struct RecordParams {
    pub protocol: &'static str,
    pub unique_id: String,
    pub remote_address: String,
}

impl Arbitrary for RecordParams {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        (
            prop_oneof![
                Just("http"),
                Just("https"),
                Just("dns"),
                Just("smtp"),
                Just("ldap"),
                Just("ftp"),
            ],
            "[a-z0-9]{20,33}",
            (any::<u8>(), any::<u8>(), any::<u8>(), any::<u8>()),
        )
            .prop_map(|(protocol, unique_id, (a, b, c, d))| RecordParams {
                protocol,
                unique_id,
                remote_address: format!("{a}.{b}.{c}.{d}"),
            })
            .boxed()
    }
}

/// Serialize generated parameters into a server-style record.
pub fn record_from_params(params: &RecordParams) -> String {
    serde_json::json!({
        "protocol": params.protocol,
        "unique-id": params.unique_id,
        "full-id": params.unique_id,
        "remote-address": params.remote_address,
        "timestamp": "2024-05-01T12:00:00Z"
    })
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use oobwatch_core::{decrypt_payload, encrypt_payload, InteractionEntry, SymmetricKey};

    proptest! {
        #[test]
        fn generated_records_parse(params: RecordParams) {
            let entry = InteractionEntry::parse(record_from_params(&params)).unwrap();
            prop_assert_eq!(entry.protocol(), params.protocol);
            prop_assert_eq!(entry.unique_id(), params.unique_id.as_str());
            prop_assert_eq!(entry.source_address(), params.remote_address.as_str());
        }

        #[test]
        fn bad_key_lengths_are_rejected(key in bad_aes_key()) {
            prop_assert!(SymmetricKey::from_bytes(key.clone()).is_err());
            let record = "AAAAAAAAAAAAAAAAAAAAAAAA";
            prop_assert!(decrypt_payload(record, &key).is_err());
        }

        #[test]
        fn records_survive_envelope(params: RecordParams, key in aes_key(), iv in iv()) {
            let record = record_from_params(&params);
            let encoded = encrypt_payload(record.as_bytes(), &key, &iv).unwrap();
            let text = SymmetricKey::from_bytes(key).unwrap().decrypt_text(&encoded).unwrap();
            prop_assert_eq!(text, record);
        }

        #[test]
        fn domains_end_with_host(host in host()) {
            let identity = crate::fixtures::identity(&host);
            let domain = identity.interaction_domain();
            let suffix = format!(".{host}");
            prop_assert!(domain.ends_with(&suffix));
            prop_assert!(domain.len() >= 34 + host.len());
            prop_assert!(domain.starts_with(identity.correlation_id().as_str()));
        }
    }
}
