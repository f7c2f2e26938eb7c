//! Error types for the engine

use crate::model::NodeId;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("Node not found: {0:?}")]
    NodeNotFound(NodeId),

    #[error("Node {0:?} is not an element")]
    NotAnElement(NodeId),

    #[error("Invalid position: {0}")]
    InvalidPosition(String),

    #[error("Invalid path: {0:?}")]
    InvalidPath(Vec<usize>),

    #[error("Invalid range: {0}")]
    InvalidRange(String),

    #[error("Cannot move a range into itself")]
    MoveIntoItself,

    #[error("A change block is already being executed")]
    ChangeBlockActive,

    #[error("Post-fixers did not settle after {passes} passes (still changing: {fixers:?})")]
    PostFixerDivergence { passes: usize, fixers: Vec<String> },

    #[error("Post-fixer ordering contains a cycle between: {0:?}")]
    PostFixerCycle(Vec<String>),

    #[error("Binding conflict: {0}")]
    Binding(#[from] crate::conversion::BindingConflict),

    #[error("View node not found: {0:?}")]
    ViewNodeNotFound(crate::view::ViewId),

    #[error("Markup error at {offset}: {message}")]
    Markup { offset: usize, message: String },

    #[error("Conversion error: {0}")]
    Conversion(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;
