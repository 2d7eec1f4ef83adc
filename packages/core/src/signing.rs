//! Canonical signing helpers shared by [`SignedRecord`] and [`AuthToken`].
//!
//! Signed JSON documents are canonicalised with JCS (RFC 8785) after the
//! signature field has been removed, then signed with Ed25519. Signatures are
//! carried as `z` + base58btc of the 64 raw bytes.
//!
//! [`SignedRecord`]: crate::record::SignedRecord
//! [`AuthToken`]: crate::auth::AuthToken

use serde::Serialize;

/// Produce the JCS canonical bytes of `value`.
///
/// Callers must pass a value whose signature field has already been cleared
/// (and is skipped when empty), otherwise the signature would sign itself.
pub fn canonical_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>, String> {
    let value = serde_json::to_value(value).map_err(|e| format!("serialization failed: {e}"))?;
    serde_jcs::to_vec(&value).map_err(|e| format!("JCS canonicalization failed: {e}"))
}

/// Encode a raw signature as `z` + base58btc.
pub fn encode_signature(signature: &[u8; 64]) -> String {
    format!("z{}", bs58::encode(signature).into_string())
}

/// Decode a `z`-prefixed base58btc signature back to 64 raw bytes.
pub fn decode_signature(encoded: &str) -> Result<[u8; 64], String> {
    let data = encoded
        .strip_prefix('z')
        .ok_or("signature value must start with 'z'")?;

    let bytes = bs58::decode(data)
        .into_vec()
        .map_err(|e| format!("bs58 decode failed: {e}"))?;

    bytes
        .try_into()
        .map_err(|_| "signature must be exactly 64 bytes".to_string())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::Keypair;

    #[test]
    fn signature_encoding_roundtrip() {
        let sig = Keypair::generate().sign(b"payload");
        let encoded = encode_signature(&sig);
        assert!(encoded.starts_with('z'));
        assert_eq!(decode_signature(&encoded).unwrap(), sig);
    }

    #[test]
    fn decode_requires_prefix() {
        assert!(decode_signature("abc").is_err());
    }

    #[test]
    fn decode_requires_64_bytes() {
        let short = format!("z{}", bs58::encode([1u8; 10]).into_string());
        assert!(decode_signature(&short).is_err());
    }

    #[test]
    fn canonical_bytes_sort_keys() {
        let value = serde_json::json!({ "b": 1, "a": 2 });
        let bytes = canonical_bytes(&value).unwrap();
        assert_eq!(bytes, br#"{"a":2,"b":1}"#);
    }
}
