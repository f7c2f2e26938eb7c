//! # Folio Engine
//!
//! Document model, view tree and the conversion between them.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │ model: Document + Schema + Selection        │
//! │  - Writer records Operations in Batches     │
//! │  - Differ collects what a block changed     │
//! │  - Post-fixers repair until a fixed point   │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ conversion: downcast / upcast dispatchers   │
//! │  - Consumables: one converter per change    │
//! │  - Mapper: model element ↔ view element     │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ view: DOM-like tree, ViewWriter             │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Core Principles
//!
//! 1. **The model is the source of truth**: views are derived by conversion
//! 2. **One mutation path**: every change goes through `Model::change`
//! 3. **Post-fixers converge**: a block ends only when no fixer has work left
//!
//! ## Usage
//!
//! ```rust,ignore
//! use folio_engine::model::{Model, Position};
//!
//! let mut model = Model::new();
//! model.change(|writer| {
//!     let root = writer.document().root();
//!     let paragraph = writer.append_element("paragraph", Default::default(), root)?;
//!     writer.insert_text("Hello", Default::default(), Position::new(paragraph, 0))
//! })?;
//! ```

pub mod conversion;
pub mod dev_utils;
mod error;
pub mod model;
pub mod view;

pub use error::{EngineError, Result};
