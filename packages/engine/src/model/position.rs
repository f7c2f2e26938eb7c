//! Positions and ranges in the model tree.
//!
//! A [`Position`] is a parent element plus an offset counted in model units
//! (one per character, one per element). Positions are virtual: they are not
//! stored in the tree and are re-validated against the [`Document`] whenever
//! they are used.
//!
//! [`Document`]: super::Document

use super::NodeId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Position {
    pub parent: NodeId,
    pub offset: usize,
}

impl Position {
    pub fn new(parent: NodeId, offset: usize) -> Self {
        Self { parent, offset }
    }

    pub fn shifted_by(self, delta: isize) -> Self {
        let offset = (self.offset as isize + delta).max(0) as usize;
        Self {
            parent: self.parent,
            offset,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Range {
    pub start: Position,
    pub end: Position,
}

impl Range {
    /// Boundaries sharing a parent are put in offset order. Ranges across
    /// parents need the document to order them, see `Document::ordered_range`.
    pub fn new(start: Position, end: Position) -> Self {
        if start.parent == end.parent && start.offset > end.offset {
            Self { start: end, end: start }
        } else {
            Self { start, end }
        }
    }

    pub fn collapsed(position: Position) -> Self {
        Self {
            start: position,
            end: position,
        }
    }

    /// Flat range inside `parent` from `start` to `end`.
    pub fn flat(parent: NodeId, start: usize, end: usize) -> Self {
        Self::new(Position::new(parent, start), Position::new(parent, end))
    }

    pub fn is_collapsed(&self) -> bool {
        self.start == self.end
    }

    /// Both boundaries share the same parent.
    pub fn is_flat(&self) -> bool {
        self.start.parent == self.end.parent
    }

    pub fn len_if_flat(&self) -> Option<usize> {
        self.is_flat()
            .then(|| self.end.offset.saturating_sub(self.start.offset))
    }
}

/// A position expressed as offsets from the main root. Operations store
/// paths rather than node ids so they stay valid when undo re-creates
/// elements.
pub type Path = Vec<usize>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathRange {
    pub start: Path,
    pub end: Path,
}

/// Length of the common prefix of two paths.
pub fn common_prefix(a: &[usize], b: &[usize]) -> usize {
    a.iter().zip(b.iter()).take_while(|(x, y)| x == y).count()
}
