use serde::{Deserialize, Serialize};

use crate::encoding::{b64, b64_decode, b64_encode};
use crate::error::{TypeError, TypeResult};

/// Content type tag value marking a transaction as a path manifest.
pub const MANIFEST_CONTENT_TYPE: &str = "application/x.arweave-manifest+json";

/// Domain tag for id derivation; ids never collide with chunk-tree hashes.
const ID_DOMAIN: &[u8] = b"seeder-id-v1:";

/// A name/value tag attached to a transaction or bundle item.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tag {
    pub name: String,
    pub value: String,
}

impl Tag {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Verified transaction record.
///
/// Immutable once written. Owner, signature and the other chain fields are
/// opaque to the node: they are checked by an external verifier and stored
/// verbatim. `data` carries the inline payload on submission; it is stripped
/// before the record is persisted and the payload is served from the chunk
/// store instead.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionMeta {
    #[serde(default)]
    pub format: u8,
    pub id: String,
    #[serde(default)]
    pub last_tx: String,
    #[serde(default)]
    pub owner: String,
    #[serde(default)]
    pub tags: Vec<Tag>,
    #[serde(default)]
    pub target: String,
    #[serde(default)]
    pub quantity: String,
    #[serde(default, with = "b64")]
    pub data: Vec<u8>,
    #[serde(default)]
    pub data_size: String,
    #[serde(default)]
    pub data_root: String,
    #[serde(default)]
    pub reward: String,
    #[serde(default)]
    pub signature: String,
}

impl TransactionMeta {
    /// Declared payload size.
    pub fn size(&self) -> TypeResult<u64> {
        parse_size(&self.data_size)
    }

    /// First tag value with the given name (case-insensitive).
    pub fn tag(&self, name: &str) -> Option<&str> {
        self.tags
            .iter()
            .find(|t| t.name.eq_ignore_ascii_case(name))
            .map(|t| t.value.as_str())
    }

    /// Value of the `Content-Type` tag, if any.
    pub fn content_type(&self) -> Option<&str> {
        self.tag("Content-Type")
    }

    /// Returns `true` if the transaction is tagged as a path manifest.
    pub fn is_manifest(&self) -> bool {
        self.content_type() == Some(MANIFEST_CONTENT_TYPE)
    }

    /// Returns `true` if the transaction carries no payload at all.
    pub fn is_empty_payload(&self) -> bool {
        matches!(self.size(), Ok(0)) && self.data.is_empty()
    }

    /// A copy of this record without the inline payload.
    pub fn without_data(&self) -> Self {
        Self {
            data: Vec::new(),
            ..self.clone()
        }
    }

    /// Id derived from the signature field.
    pub fn derived_id(&self) -> TypeResult<String> {
        let signature = b64_decode(&self.signature)?;
        Ok(id_from_signature(&signature))
    }
}

/// Derive a content identifier from raw signature bytes.
///
/// The same derivation is used for transactions and bundle items, so ids are
/// always 43-character base64url tokens.
pub fn id_from_signature(signature: &[u8]) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(ID_DOMAIN);
    hasher.update(signature);
    b64_encode(hasher.finalize().as_bytes())
}

/// Parse a decimal size string.
pub fn parse_size(s: &str) -> TypeResult<u64> {
    s.trim()
        .parse::<u64>()
        .map_err(|_| TypeError::InvalidSize(s.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> TransactionMeta {
        TransactionMeta {
            format: 2,
            id: id_from_signature(b"sig"),
            tags: vec![
                Tag::new("Content-Type", MANIFEST_CONTENT_TYPE),
                Tag::new("App-Name", "seeder"),
            ],
            data: b"payload".to_vec(),
            data_size: "7".into(),
            data_root: "root".into(),
            signature: b64_encode(b"sig"),
            ..Default::default()
        }
    }

    #[test]
    fn size_parses_decimal() {
        assert_eq!(sample().size().unwrap(), 7);
    }

    #[test]
    fn size_rejects_negative_and_garbage() {
        assert!(matches!(parse_size("-1"), Err(TypeError::InvalidSize(_))));
        assert!(matches!(parse_size("ten"), Err(TypeError::InvalidSize(_))));
        assert!(matches!(parse_size(""), Err(TypeError::InvalidSize(_))));
    }

    #[test]
    fn tag_lookup_is_case_insensitive() {
        let tx = sample();
        assert_eq!(tx.tag("app-name"), Some("seeder"));
        assert!(tx.tag("missing").is_none());
        assert!(tx.is_manifest());
    }

    #[test]
    fn without_data_keeps_everything_else() {
        let tx = sample();
        let stripped = tx.without_data();
        assert!(stripped.data.is_empty());
        assert_eq!(stripped.id, tx.id);
        assert_eq!(stripped.data_size, "7");
    }

    #[test]
    fn derived_id_matches_signature() {
        let tx = sample();
        assert_eq!(tx.derived_id().unwrap(), tx.id);
        assert_eq!(tx.id.len(), 43);
    }

    #[test]
    fn json_carries_data_as_base64url() {
        let tx = sample();
        let json = serde_json::to_value(&tx).unwrap();
        assert_eq!(json["data"], b64_encode(b"payload"));
        let back: TransactionMeta = serde_json::from_value(json).unwrap();
        assert_eq!(back, tx);
    }

    #[test]
    fn json_fields_default_when_missing() {
        let tx: TransactionMeta = serde_json::from_str(r#"{"id":"abc"}"#).unwrap();
        assert_eq!(tx.id, "abc");
        assert!(tx.data.is_empty());
        assert!(tx.tags.is_empty());
    }
}
