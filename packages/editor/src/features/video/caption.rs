//! Video captions.
//!
//! Every `video` owns exactly one `caption`. Empty captions are left out of
//! the data output; in the editing view they stay in place with `ck-hidden`
//! unless the video or the caption is selected.

use super::VIDEO;
use crate::editing::{ViewFixContext, ViewPostFixer};
use crate::editor::Editor;
use crate::errors::Result;
use crate::features::mention::MENTION_FIXERS;
use crate::plugin::Plugin;
use crate::widget::to_widget_editable;
use folio_engine::conversion::{downcast_helpers, upcast_helpers, ViewMatcher};
use folio_engine::model::{
    Attributes, ChangeEntry, Document, ItemDefinition, NodeId, NodeSnapshot, PostFixer, Writer, TEXT_NAME,
};
use folio_engine::view::ViewWriter;
use tracing::debug;

pub const CAPTION: &str = "caption";
pub const HIDDEN_CLASS: &str = "ck-hidden";
pub const CAPTION_FIXER: &str = "video-insert-missing-caption";

const PLACEHOLDER: &str = "Enter video caption";

pub fn caption_of(document: &Document, video: NodeId) -> Option<NodeId> {
    document
        .children(video)
        .iter()
        .copied()
        .find(|child| document.is(*child, CAPTION))
}

fn is_video_caption(document: &Document, caption: NodeId) -> bool {
    document.is(caption, CAPTION) && document.parent(caption).map_or(false, |parent| document.is(parent, VIDEO))
}

/// Caption that contains `node`, if it belongs to a video.
fn parent_caption(document: &Document, node: NodeId) -> Option<NodeId> {
    document
        .find_ancestor(node, CAPTION)
        .filter(|caption| is_video_caption(document, *caption))
}

/// Appends an empty caption to inserted videos that have none, including
/// videos nested in inserted elements.
#[derive(Debug, Default)]
pub struct InsertMissingCaption;

impl PostFixer for InsertMissingCaption {
    fn name(&self) -> &str {
        CAPTION_FIXER
    }

    fn runs_after(&self) -> &[&str] {
        MENTION_FIXERS
    }

    fn fix(&mut self, writer: &mut Writer<'_>) -> folio_engine::Result<bool> {
        let document = writer.document();
        let mut missing: Vec<NodeId> = Vec::new();
        for change in document.changes() {
            let ChangeEntry::Insert { node: Some(node), .. } = change else {
                continue;
            };
            if !document.is_attached(node) {
                continue;
            }
            for candidate in std::iter::once(node).chain(document.descendants(node)) {
                if document.is(candidate, VIDEO)
                    && caption_of(document, candidate).is_none()
                    && !missing.contains(&candidate)
                {
                    missing.push(candidate);
                }
            }
        }
        for video in &missing {
            debug!(?video, "Inserting missing caption");
            writer.append_element(CAPTION, Attributes::new(), *video)?;
        }
        Ok(!missing.is_empty())
    }
}

/// Hides empty captions unless their video or the caption itself is
/// selected.
#[derive(Debug, Default)]
pub struct CaptionVisibility;

impl CaptionVisibility {
    fn selected_caption(document: &Document) -> Option<NodeId> {
        if let Some(video) = document.selected_element().filter(|element| document.is(*element, VIDEO)) {
            return caption_of(document, video);
        }
        parent_caption(document, document.selection().first_position().parent)
    }
}

impl ViewPostFixer for CaptionVisibility {
    fn name(&self) -> &str {
        "video-caption-visibility"
    }

    fn fix(&mut self, context: &ViewFixContext<'_>, writer: &mut ViewWriter<'_>) -> folio_engine::Result<bool> {
        let document = context.document;
        let selected = Self::selected_caption(document);
        let mut changed = false;
        for caption in document.descendants(document.root()) {
            if !is_video_caption(document, caption) {
                continue;
            }
            let Some(view_caption) = context.mapper.to_view_element(caption) else {
                continue;
            };
            let hide = document.is_empty(caption) && Some(caption) != selected;
            let hidden = writer.view().has_class(view_caption, HIDDEN_CLASS);
            if hide && !hidden {
                writer.add_class(HIDDEN_CLASS, view_caption)?;
                changed = true;
            } else if !hide && hidden {
                writer.remove_class(HIDDEN_CLASS, view_caption)?;
                changed = true;
            }
        }
        Ok(changed)
    }
}

pub struct VideoCaption;

impl Plugin for VideoCaption {
    fn name(&self) -> &'static str {
        "VideoCaption"
    }

    fn requires(&self) -> &'static [&'static str] {
        &["Video"]
    }

    fn init(&self, editor: &mut Editor) -> Result<()> {
        let schema = editor.model_mut().schema_mut();
        schema.register(CAPTION, ItemDefinition::default().allowed_in(VIDEO).limit());
        schema.extend(TEXT_NAME, |definition| definition.allow_in.push(CAPTION.to_string()));

        let mut conversion = editor.conversion();
        downcast_helpers::element_to_element(&mut conversion.data_downcast, CAPTION, |document, caption, writer| {
            if !is_video_caption(document, caption) || document.is_empty(caption) {
                return None;
            }
            Some(writer.create_container_element("figcaption", &[]))
        });
        downcast_helpers::element_to_element(
            &mut conversion.editing_downcast,
            CAPTION,
            |document, caption, writer| {
                if !is_video_caption(document, caption) {
                    return None;
                }
                let element = writer.create_editable_element("figcaption", &[("data-placeholder", PLACEHOLDER)]);
                to_widget_editable(writer, element).ok()?;
                if document.is_empty(caption) {
                    writer.add_class(HIDDEN_CLASS, element).ok()?;
                }
                Some(element)
            },
        );
        upcast_helpers::element_to_element(&mut conversion.upcast, ViewMatcher::element("figcaption"), |_, _| {
            Some(NodeSnapshot::element(CAPTION))
        });
        drop(conversion);

        editor.model_mut().register_post_fixer(InsertMissingCaption)?;
        editor.add_view_post_fixer(CaptionVisibility);
        Ok(())
    }
}
