use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{BundleError, BundleResult};

/// Value of the `manifest` field of a path manifest.
pub const MANIFEST_KIND: &str = "arweave/paths";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestIndex {
    pub path: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestPath {
    pub id: String,
}

/// Path table mapping relative paths to transaction ids.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub manifest: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<ManifestIndex>,
    #[serde(default)]
    pub paths: BTreeMap<String, ManifestPath>,
}

impl Manifest {
    pub fn parse(bytes: &[u8]) -> BundleResult<Self> {
        let manifest: Manifest = serde_json::from_slice(bytes)?;
        if manifest.manifest != MANIFEST_KIND {
            return Err(BundleError::InvalidManifest(format!(
                "unsupported manifest kind {:?}",
                manifest.manifest
            )));
        }
        if let Some(index) = &manifest.index {
            if !manifest.paths.contains_key(&index.path) {
                return Err(BundleError::InvalidManifest(format!(
                    "index path {:?} is not in paths",
                    index.path
                )));
            }
        }
        Ok(manifest)
    }

    /// Id behind `path`. An empty path or `/` means the index; a single
    /// leading and trailing `/` are ignored.
    pub fn resolve(&self, path: &str) -> Option<&str> {
        let trimmed = path.strip_prefix('/').unwrap_or(path);
        let trimmed = trimmed.strip_suffix('/').unwrap_or(trimmed);
        let key = if trimmed.is_empty() {
            self.index.as_ref()?.path.as_str()
        } else {
            trimmed
        };
        self.paths.get(key).map(|p| p.id.as_str())
    }

    /// Distinct ids referenced by the manifest, sorted.
    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.paths.values().map(|p| p.id.as_str()).collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "manifest": "arweave/paths",
        "version": "0.1.0",
        "index": { "path": "index.html" },
        "paths": {
            "index.html": { "id": "idx" },
            "css/site.css": { "id": "css" },
            "docs": { "id": "docs" },
            "copy.html": { "id": "idx" }
        }
    }"#;

    #[test]
    fn resolves_paths_and_index() {
        let manifest = Manifest::parse(SAMPLE.as_bytes()).unwrap();
        assert_eq!(manifest.resolve(""), Some("idx"));
        assert_eq!(manifest.resolve("/"), Some("idx"));
        assert_eq!(manifest.resolve("css/site.css"), Some("css"));
        assert_eq!(manifest.resolve("/css/site.css"), Some("css"));
        assert_eq!(manifest.resolve("docs/"), Some("docs"));
        assert_eq!(manifest.resolve("missing"), None);
    }

    #[test]
    fn ids_are_distinct() {
        let manifest = Manifest::parse(SAMPLE.as_bytes()).unwrap();
        assert_eq!(manifest.ids(), vec!["css", "docs", "idx"]);
    }

    #[test]
    fn without_index_root_is_unresolved() {
        let json = r#"{"manifest":"arweave/paths","version":"0.1.0","paths":{"a":{"id":"x"}}}"#;
        let manifest = Manifest::parse(json.as_bytes()).unwrap();
        assert_eq!(manifest.resolve("/"), None);
        assert_eq!(manifest.resolve("a"), Some("x"));
    }

    #[test]
    fn rejects_other_kinds_and_dangling_index() {
        let json = r#"{"manifest":"other","version":"1","paths":{}}"#;
        assert!(matches!(Manifest::parse(json.as_bytes()), Err(BundleError::InvalidManifest(_))));
        let json = r#"{"manifest":"arweave/paths","version":"1","index":{"path":"nope"},"paths":{}}"#;
        assert!(matches!(Manifest::parse(json.as_bytes()), Err(BundleError::InvalidManifest(_))));
        assert!(matches!(Manifest::parse(b"not json"), Err(BundleError::Json(_))));
    }
}
