use serde::{Deserialize, Serialize};
use seeder_types::{b64_encode, id_from_signature, Tag};

use crate::avro::{decode_tags, encode_tags};
use crate::error::{BundleError, BundleResult};

/// Signature schemes an item may declare, with their signature and owner
/// key lengths.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignatureType {
    Arweave,
    Ed25519,
    Ethereum,
    Solana,
}

impl SignatureType {
    pub fn from_code(code: u16) -> BundleResult<Self> {
        match code {
            1 => Ok(Self::Arweave),
            2 => Ok(Self::Ed25519),
            3 => Ok(Self::Ethereum),
            4 => Ok(Self::Solana),
            other => Err(BundleError::UnknownSignatureType(other)),
        }
    }

    pub fn code(self) -> u16 {
        match self {
            Self::Arweave => 1,
            Self::Ed25519 => 2,
            Self::Ethereum => 3,
            Self::Solana => 4,
        }
    }

    pub fn signature_len(self) -> usize {
        match self {
            Self::Arweave => 512,
            Self::Ed25519 | Self::Solana => 64,
            Self::Ethereum => 65,
        }
    }

    pub fn owner_len(self) -> usize {
        match self {
            Self::Arweave => 512,
            Self::Ed25519 | Self::Solana => 32,
            Self::Ethereum => 65,
        }
    }
}

/// One item inside a bundle.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BundleItem {
    pub signature_type: SignatureType,
    pub signature: Vec<u8>,
    pub owner: Vec<u8>,
    pub target: Option<[u8; 32]>,
    pub anchor: Option<[u8; 32]>,
    pub tags: Vec<Tag>,
    pub data: Vec<u8>,
}

/// Item record stored by the node and served over HTTP. Binary fields are
/// base64url.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemMeta {
    pub id: String,
    pub bundle_id: String,
    pub signature_type: u16,
    pub signature: String,
    pub owner: String,
    pub target: String,
    pub anchor: String,
    pub tags: Vec<Tag>,
    pub data_size: u64,
}

impl ItemMeta {
    pub fn content_type(&self) -> Option<&str> {
        self.tags
            .iter()
            .find(|t| t.name.eq_ignore_ascii_case("Content-Type"))
            .map(|t| t.value.as_str())
    }
}

pub(crate) struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub(crate) fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub(crate) fn take(&mut self, len: usize, what: &'static str) -> BundleResult<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.buf.len())
            .ok_or(BundleError::Truncated(what))?;
        let out = &self.buf[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    fn u8(&mut self, what: &'static str) -> BundleResult<u8> {
        Ok(self.take(1, what)?[0])
    }

    fn u16_le(&mut self, what: &'static str) -> BundleResult<u16> {
        let b = self.take(2, what)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    pub(crate) fn u64_le(&mut self, what: &'static str) -> BundleResult<u64> {
        let b = self.take(8, what)?;
        let mut raw = [0u8; 8];
        raw.copy_from_slice(b);
        Ok(u64::from_le_bytes(raw))
    }

    /// A 32-byte little-endian integer that must fit in 64 bits.
    pub(crate) fn u256_le(&mut self, what: &'static str) -> BundleResult<u64> {
        let b = self.take(32, what)?;
        if b[8..].iter().any(|x| *x != 0) {
            return Err(BundleError::OutOfRange(what));
        }
        let mut raw = [0u8; 8];
        raw.copy_from_slice(&b[..8]);
        Ok(u64::from_le_bytes(raw))
    }

    fn optional_32(&mut self, what: &'static str) -> BundleResult<Option<[u8; 32]>> {
        match self.u8(what)? {
            0 => Ok(None),
            1 => {
                let mut out = [0u8; 32];
                out.copy_from_slice(self.take(32, what)?);
                Ok(Some(out))
            }
            flag => Err(BundleError::InvalidFlag(flag)),
        }
    }

    pub(crate) fn rest(&mut self) -> &'a [u8] {
        let out = &self.buf[self.pos..];
        self.pos = self.buf.len();
        out
    }
}

pub(crate) fn to_usize(n: u64, what: &'static str) -> BundleResult<usize> {
    usize::try_from(n).map_err(|_| BundleError::OutOfRange(what))
}

pub(crate) fn u256_le_bytes(n: u64) -> [u8; 32] {
    let mut out = [0u8; 32];
    out[..8].copy_from_slice(&n.to_le_bytes());
    out
}

impl BundleItem {
    /// Id derived from the signature.
    pub fn id(&self) -> String {
        id_from_signature(&self.signature)
    }

    pub fn decode(bytes: &[u8]) -> BundleResult<Self> {
        let mut r = Reader::new(bytes);
        let signature_type = SignatureType::from_code(r.u16_le("signature type")?)?;
        let signature = r.take(signature_type.signature_len(), "signature")?.to_vec();
        let owner = r.take(signature_type.owner_len(), "owner")?.to_vec();
        let target = r.optional_32("target")?;
        let anchor = r.optional_32("anchor")?;
        let tag_count = r.u64_le("tag count")?;
        let tag_bytes_len = to_usize(r.u64_le("tag bytes length")?, "tag bytes length")?;
        let tags = decode_tags(r.take(tag_bytes_len, "tags")?, tag_count)?;
        let data = r.rest().to_vec();
        Ok(Self {
            signature_type,
            signature,
            owner,
            target,
            anchor,
            tags,
            data,
        })
    }

    pub fn encode(&self) -> Vec<u8> {
        let tag_bytes = encode_tags(&self.tags);
        let mut out = Vec::with_capacity(
            2 + self.signature.len() + self.owner.len() + 66 + 16 + tag_bytes.len() + self.data.len(),
        );
        out.extend_from_slice(&self.signature_type.code().to_le_bytes());
        out.extend_from_slice(&self.signature);
        out.extend_from_slice(&self.owner);
        for field in [&self.target, &self.anchor] {
            match field {
                Some(bytes) => {
                    out.push(1);
                    out.extend_from_slice(bytes);
                }
                None => out.push(0),
            }
        }
        out.extend_from_slice(&(self.tags.len() as u64).to_le_bytes());
        out.extend_from_slice(&(tag_bytes.len() as u64).to_le_bytes());
        out.extend_from_slice(&tag_bytes);
        out.extend_from_slice(&self.data);
        out
    }

    /// Record stored for this item when indexing `bundle_id`.
    pub fn meta(&self, bundle_id: &str) -> ItemMeta {
        ItemMeta {
            id: self.id(),
            bundle_id: bundle_id.to_string(),
            signature_type: self.signature_type.code(),
            signature: b64_encode(&self.signature),
            owner: b64_encode(&self.owner),
            target: self.target.map(|t| b64_encode(&t)).unwrap_or_default(),
            anchor: self.anchor.map(|a| b64_encode(&a)).unwrap_or_default(),
            tags: self.tags.clone(),
            data_size: self.data.len() as u64,
        }
    }
}

#[cfg(test)]
pub(crate) fn sample_item(seed: u8, data: &[u8]) -> BundleItem {
    BundleItem {
        signature_type: SignatureType::Ed25519,
        signature: vec![seed; 64],
        owner: vec![seed.wrapping_add(1); 32],
        target: None,
        anchor: Some([seed; 32]),
        tags: vec![Tag::new("Content-Type", "text/plain"), Tag::new("App", "seeder")],
        data: data.to_vec(),
    }
}
