use seeder_types::{b64_decode, b64_encode, TransactionMeta};

use crate::error::{BundleError, BundleResult};
use crate::item::{to_usize, u256_le_bytes, BundleItem, Reader};

/// Tag values marking a transaction whose payload is a bundle.
pub const BUNDLE_FORMAT: (&str, &str) = ("Bundle-Format", "binary");
pub const BUNDLE_VERSION: (&str, &str) = ("Bundle-Version", "2.0.0");

/// Whether `meta` declares its payload to be a bundle.
pub fn is_bundle(meta: &TransactionMeta) -> bool {
    meta.tag(BUNDLE_FORMAT.0) == Some(BUNDLE_FORMAT.1)
        && meta.tag(BUNDLE_VERSION.0) == Some(BUNDLE_VERSION.1)
}

/// A decoded bundle.
///
/// Layout: item count (32-byte LE), then one `(size, id)` header per item
/// (32-byte LE size, 32-byte raw id), then the items back to back.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Bundle {
    pub items: Vec<BundleItem>,
}

impl Bundle {
    pub fn new(items: Vec<BundleItem>) -> Self {
        Self { items }
    }

    pub fn decode(bytes: &[u8]) -> BundleResult<Self> {
        let mut r = Reader::new(bytes);
        let count = to_usize(r.u256_le("item count")?, "item count")?;
        // Each header is 64 bytes; reject counts the input cannot hold.
        if count > bytes.len() / 64 {
            return Err(BundleError::Truncated("item headers"));
        }

        let mut headers = Vec::with_capacity(count);
        for _ in 0..count {
            let size = to_usize(r.u256_le("item size")?, "item size")?;
            let id = b64_encode(r.take(32, "item id")?);
            headers.push((size, id));
        }

        let body = r.rest();
        let claimed = headers
            .iter()
            .try_fold(0u64, |acc, (size, _)| acc.checked_add(*size as u64))
            .ok_or(BundleError::OutOfRange("item sizes"))?;
        if claimed != body.len() as u64 {
            return Err(BundleError::LengthMismatch {
                claimed,
                actual: body.len() as u64,
            });
        }

        let mut items = Vec::with_capacity(count);
        let mut offset = 0usize;
        for (size, header_id) in headers {
            let end = offset
                .checked_add(size)
                .ok_or(BundleError::OutOfRange("item size"))?;
            let raw = body.get(offset..end).ok_or(BundleError::Truncated("item body"))?;
            let item = BundleItem::decode(raw)?;
            let derived = item.id();
            if derived != header_id {
                return Err(BundleError::IdMismatch {
                    header: header_id,
                    derived,
                });
            }
            items.push(item);
            offset = end;
        }
        Ok(Self { items })
    }

    pub fn encode(&self) -> BundleResult<Vec<u8>> {
        let encoded: Vec<Vec<u8>> = self.items.iter().map(BundleItem::encode).collect();
        let mut out = Vec::with_capacity(
            32 + 64 * encoded.len() + encoded.iter().map(Vec::len).sum::<usize>(),
        );
        out.extend_from_slice(&u256_le_bytes(self.items.len() as u64));
        for (item, bytes) in self.items.iter().zip(&encoded) {
            let raw_id = b64_decode(&item.id()).map_err(|_| BundleError::OutOfRange("item id"))?;
            out.extend_from_slice(&u256_le_bytes(bytes.len() as u64));
            out.extend_from_slice(&raw_id);
        }
        for bytes in encoded {
            out.extend_from_slice(&bytes);
        }
        Ok(out)
    }

    pub fn ids(&self) -> Vec<String> {
        self.items.iter().map(BundleItem::id).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::sample_item;
    use seeder_types::Tag;

    fn sample() -> Bundle {
        Bundle::new(vec![sample_item(1, b"first"), sample_item(2, b""), sample_item(3, &[9; 300])])
    }

    #[test]
    fn encoded_bundle_decodes_with_ids() {
        let bundle = sample();
        let bytes = bundle.encode().unwrap();
        let decoded = Bundle::decode(&bytes).unwrap();
        assert_eq!(decoded, bundle);
        assert_eq!(decoded.ids().len(), 3);
        assert_eq!(bytes[0], 3);
        assert!(bytes[1..32].iter().all(|b| *b == 0));
    }

    #[test]
    fn empty_bundle() {
        let bytes = Bundle::new(vec![]).encode().unwrap();
        assert_eq!(bytes.len(), 32);
        assert!(Bundle::decode(&bytes).unwrap().items.is_empty());
    }

    #[test]
    fn header_id_must_match_signature() {
        let mut bytes = sample().encode().unwrap();
        // First header's id starts after the count and the first size.
        bytes[32 + 32] ^= 0xFF;
        assert!(matches!(Bundle::decode(&bytes), Err(BundleError::IdMismatch { .. })));
    }

    #[test]
    fn body_length_must_match_headers() {
        let mut bytes = sample().encode().unwrap();
        bytes.push(0);
        assert!(matches!(Bundle::decode(&bytes), Err(BundleError::LengthMismatch { .. })));
    }

    #[test]
    fn absurd_count_is_rejected_before_allocation() {
        let mut bytes = vec![0u8; 32];
        bytes[..8].copy_from_slice(&u64::MAX.to_le_bytes());
        assert!(Bundle::decode(&bytes).is_err());
    }

    #[test]
    fn overflowing_item_sizes_are_rejected() {
        let mut bytes = u256_le_bytes(2).to_vec();
        for size in [1u64 << 63, (1u64 << 63) + 10] {
            bytes.extend_from_slice(&u256_le_bytes(size));
            bytes.extend_from_slice(&[0u8; 32]);
        }
        bytes.extend_from_slice(&[0u8; 10]);
        assert!(matches!(Bundle::decode(&bytes), Err(BundleError::OutOfRange(_))));
    }

    #[test]
    fn bundle_tags_are_recognised() {
        let mut meta = TransactionMeta::default();
        assert!(!is_bundle(&meta));
        meta.tags = vec![Tag::new("Bundle-Format", "binary"), Tag::new("Bundle-Version", "2.0.0")];
        assert!(is_bundle(&meta));
    }
}
