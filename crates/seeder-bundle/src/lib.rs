//! Container formats carried inside transactions.
//!
//! - [`Bundle`] / [`BundleItem`] -- binary bundles of independently signed
//!   items, tags Avro-encoded
//! - [`Manifest`] -- JSON path tables resolved when serving directory-like URLs

mod avro;
pub mod bundle;
pub mod error;
pub mod item;
pub mod manifest;

pub use avro::{decode_tags, encode_tags};
pub use bundle::{is_bundle, Bundle, BUNDLE_FORMAT, BUNDLE_VERSION};
pub use error::{BundleError, BundleResult};
pub use item::{BundleItem, ItemMeta, SignatureType};
pub use manifest::{Manifest, ManifestIndex, ManifestPath, MANIFEST_KIND};
