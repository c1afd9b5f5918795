use seeder_types::{b64_decode, TransactionMeta};

use crate::error::{NodeError, NodeResult};

/// Integrity check applied to every transaction before it is stored.
/// The node only acts on the outcome.
pub trait Verifier: Send + Sync {
    fn verify_transaction(&self, meta: &TransactionMeta) -> NodeResult<()>;
}

/// Structural checks that need no chain state: the id is the one derived
/// from the signature, the owner is present, the declared size parses and
/// matches any inline payload. Cryptographic signature checks belong to a
/// chain-aware verifier.
#[derive(Clone, Copy, Debug, Default)]
pub struct StructuralVerifier;

impl Verifier for StructuralVerifier {
    fn verify_transaction(&self, meta: &TransactionMeta) -> NodeResult<()> {
        if meta.id.is_empty() {
            return Err(NodeError::Verification("missing id".into()));
        }
        if meta.signature.is_empty() {
            return Err(NodeError::Verification(format!("{}: missing signature", meta.id)));
        }
        let derived = meta.derived_id()?;
        if derived != meta.id {
            return Err(NodeError::Verification(format!(
                "{}: id does not match signature (expected {derived})",
                meta.id
            )));
        }
        if b64_decode(&meta.owner)?.is_empty() {
            return Err(NodeError::Verification(format!("{}: missing owner", meta.id)));
        }
        let size = meta.size()?;
        if !meta.data.is_empty() && meta.data.len() as u64 != size {
            return Err(NodeError::Verification(format!(
                "{}: inline data is {} bytes, declared {size}",
                meta.id,
                meta.data.len()
            )));
        }
        if size > 0 && meta.data_root.is_empty() {
            return Err(NodeError::Verification(format!("{}: missing data root", meta.id)));
        }
        Ok(())
    }
}
