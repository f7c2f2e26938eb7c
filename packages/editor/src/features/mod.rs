//! Feature plugins.

pub mod attribute_command;
pub mod basic_styles;
pub mod font;
pub mod max_width;
pub mod mention;
pub mod paragraph;
pub mod stencil;
pub mod undo;
pub mod video;

pub use basic_styles::{Bold, Italic, Underline};
pub use font::Font;
pub use max_width::MaxWidth;
pub use mention::Mention;
pub use paragraph::Paragraph;
pub use stencil::Stencil;
pub use undo::Undo;
pub use video::{Video, VideoCaption, VideoResize, VideoStyle, VideoTextAlternative, VideoUpload};

use crate::plugin::Plugin;
use crate::typing::Typing;
use folio_engine::model::{Document, Item, NodeId, Schema};

/// Every feature plugin, in a working initialization order.
pub fn standard_plugins() -> Vec<Box<dyn Plugin>> {
    vec![
        Box::new(Paragraph),
        Box::new(Typing),
        Box::new(Undo),
        Box::new(Bold),
        Box::new(Italic),
        Box::new(Underline),
        Box::new(Font),
        Box::new(Mention),
        Box::new(Video),
        Box::new(VideoCaption),
        Box::new(VideoUpload),
        Box::new(VideoStyle),
        Box::new(VideoResize),
        Box::new(VideoTextAlternative),
        Box::new(Stencil),
        Box::new(MaxWidth),
    ]
}

fn block_of(document: &Document, schema: &Schema, node: NodeId) -> Option<NodeId> {
    std::iter::once(node)
        .chain(document.ancestors(node))
        .find(|n| document.name(*n).map_or(false, |name| schema.is_block(name)))
}

/// Blocks touched by the selection, in document order.
pub fn selected_blocks(document: &Document, schema: &Schema) -> Vec<NodeId> {
    let range = document.selection().range();
    let mut blocks = Vec::new();
    let mut push = |block: NodeId| {
        if !blocks.contains(&block) {
            blocks.push(block);
        }
    };
    if let Some(block) = block_of(document, schema, range.start.parent) {
        push(block);
    }
    for item in document.items(&range, true).unwrap_or_default() {
        if let Item::Element(element) = item {
            if document.name(element).map_or(false, |name| schema.is_block(name)) {
                push(element);
            }
        }
    }
    if let Some(block) = block_of(document, schema, range.end.parent) {
        push(block);
    }
    blocks
}
