//! Avro binary encoding of an item's tag list: an array of
//! `{ name: bytes, value: bytes }` records.

use seeder_types::Tag;

use crate::error::{BundleError, BundleResult};

fn write_long(buf: &mut Vec<u8>, n: i64) {
    let mut z = ((n << 1) ^ (n >> 63)) as u64;
    while z >= 0x80 {
        buf.push((z as u8 & 0x7F) | 0x80);
        z >>= 7;
    }
    buf.push(z as u8);
}

fn write_bytes(buf: &mut Vec<u8>, bytes: &[u8]) {
    write_long(buf, bytes.len() as i64);
    buf.extend_from_slice(bytes);
}

struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn read_long(&mut self) -> BundleResult<i64> {
        let mut z: u64 = 0;
        let mut shift = 0;
        loop {
            let byte = *self
                .buf
                .get(self.pos)
                .ok_or_else(|| BundleError::InvalidTags("truncated varint".into()))?;
            self.pos += 1;
            if shift > 63 {
                return Err(BundleError::InvalidTags("varint too long".into()));
            }
            z |= u64::from(byte & 0x7F) << shift;
            if byte & 0x80 == 0 {
                break;
            }
            shift += 7;
        }
        Ok((z >> 1) as i64 ^ -((z & 1) as i64))
    }

    fn read_bytes(&mut self) -> BundleResult<&'a [u8]> {
        let len = usize::try_from(self.read_long()?)
            .map_err(|_| BundleError::InvalidTags("negative length".into()))?;
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.buf.len())
            .ok_or_else(|| BundleError::InvalidTags("truncated bytes".into()))?;
        let out = &self.buf[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    fn read_string(&mut self) -> BundleResult<String> {
        let bytes = self.read_bytes()?;
        String::from_utf8(bytes.to_vec())
            .map_err(|_| BundleError::InvalidTags("tag is not utf-8".into()))
    }
}

/// Encode tags. An empty list encodes to zero bytes.
pub fn encode_tags(tags: &[Tag]) -> Vec<u8> {
    let mut buf = Vec::new();
    if tags.is_empty() {
        return buf;
    }
    write_long(&mut buf, tags.len() as i64);
    for tag in tags {
        write_bytes(&mut buf, tag.name.as_bytes());
        write_bytes(&mut buf, tag.value.as_bytes());
    }
    write_long(&mut buf, 0);
    buf
}

/// Decode tags and check that exactly `expected` were present.
pub fn decode_tags(bytes: &[u8], expected: u64) -> BundleResult<Vec<Tag>> {
    let mut tags = Vec::new();
    if !bytes.is_empty() {
        let mut cursor = Cursor { buf: bytes, pos: 0 };
        loop {
            let mut count = cursor.read_long()?;
            if count == 0 {
                break;
            }
            if count < 0 {
                // Negative block count is followed by the block's byte size.
                count = count.checked_neg().ok_or_else(|| BundleError::InvalidTags("bad block count".into()))?;
                cursor.read_long()?;
            }
            for _ in 0..count {
                let name = cursor.read_string()?;
                let value = cursor.read_string()?;
                tags.push(Tag { name, value });
            }
        }
        if cursor.pos != bytes.len() {
            return Err(BundleError::InvalidTags(format!(
                "{} trailing bytes",
                bytes.len() - cursor.pos
            )));
        }
    }
    if tags.len() as u64 != expected {
        return Err(BundleError::InvalidTags(format!(
            "header declares {expected} tags, found {}",
            tags.len()
        )));
    }
    Ok(tags)
}
