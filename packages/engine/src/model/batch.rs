use super::Operation;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BatchId(pub u64);

/// How history treats a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BatchKind {
    /// Regular user change, recorded by undo.
    #[default]
    Default,
    /// Not recorded by undo (data loading, upload status updates).
    Transparent,
    /// Produced by undoing a batch.
    Undo,
    /// Produced by redoing a batch.
    Redo,
}

/// Identifies a batch. Several change blocks may share one batch, which is
/// how consecutive typing ends up as a single undo step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BatchHandle {
    pub id: BatchId,
    pub kind: BatchKind,
}

/// Operations applied by one change block.
#[derive(Debug, Clone)]
pub struct Batch {
    pub handle: BatchHandle,
    pub operations: Vec<Operation>,
}

impl Batch {
    pub fn new(handle: BatchHandle) -> Self {
        Self {
            handle,
            operations: Vec::new(),
        }
    }
}
