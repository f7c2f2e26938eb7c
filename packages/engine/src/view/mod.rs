//! # View
//!
//! The DOM-like tree the model is converted into. The editing view carries
//! widget chrome (UI elements, classes, placeholders); the data view is what
//! gets serialized as HTML.

mod node;
mod position;
mod writer;

pub use node::{
    join_classes, join_styles, parse_style, View, ViewElement, ViewElementKind, ViewId, ViewNode,
    ViewNodeKind, DEFAULT_PRIORITY,
};
pub use position::{ViewPosition, ViewRange};
pub use writer::ViewWriter;
