use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;

use crate::error::{TypeError, TypeResult};

/// Encode bytes as unpadded base64url, the encoding used for every binary
/// field on the wire.
pub fn b64_encode(data: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(data)
}

/// Decode an unpadded base64url string. Trailing `=` padding is tolerated.
pub fn b64_decode(s: &str) -> TypeResult<Vec<u8>> {
    URL_SAFE_NO_PAD
        .decode(s.trim_end_matches('='))
        .map_err(|e| TypeError::InvalidBase64(e.to_string()))
}

/// Serde adapter for `Vec<u8>` fields carried as base64url strings.
pub mod b64 {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(data: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::b64_encode(data))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        super::b64_decode(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_is_url_safe_and_unpadded() {
        let encoded = b64_encode(&[0xfb, 0xff, 0xfe]);
        assert_eq!(encoded, "-__-");
        assert!(!encoded.contains('='));
    }

    #[test]
    fn decode_tolerates_padding() {
        assert_eq!(b64_decode("aGk=").unwrap(), b"hi".to_vec());
        assert_eq!(b64_decode("aGk").unwrap(), b"hi".to_vec());
    }

    #[test]
    fn decode_rejects_standard_alphabet() {
        let err = b64_decode("a+b/").unwrap_err();
        assert!(matches!(err, TypeError::InvalidBase64(_)));
    }
}
