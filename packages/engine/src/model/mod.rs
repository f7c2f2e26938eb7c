//! # Document model
//!
//! The abstract document: an ordered tree of elements and text, a selection,
//! and everything needed to change it safely.
//!
//! ```text
//! Model::change(|writer| ...)      Writer records Operations in a Batch
//!          ↓                       Document captures snapshots in the Differ
//! post-fixers (fixed point)        PostFixerRegistry
//!          ↓
//! ChangeObserver::on_change_block  conversion, undo, typing buffer...
//! ```

mod batch;
mod change;
mod differ;
mod document;
mod node;
mod operation;
mod position;
mod post_fixer;
mod schema;
mod selection;
mod writer;

pub use batch::{Batch, BatchHandle, BatchId, BatchKind};
pub use change::{ChangeBlock, ChangeObserver, Model, Scheduler};
pub use differ::{ChangeEntry, Differ};
pub use document::{Document, Item, TextProxy, GRAVEYARD_NAME, ROOT_NAME};
pub use node::{offset_size_of, Attributes, Node, NodeId, NodeKind, NodeSnapshot, TEXT_NAME};
pub use operation::Operation;
pub use position::{Path, PathRange, Position, Range};
pub use post_fixer::{FnPostFixer, PostFixer, PostFixerRegistry, MAX_POST_FIXER_PASSES};
pub use schema::{ItemDefinition, Schema, BLOCK};
pub use selection::Selection;
pub use writer::Writer;
