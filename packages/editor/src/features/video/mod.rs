//! # Video
//!
//! `video` is a block object. The data pipeline renders it as
//!
//! ```text
//! <figure class="video"><video controls="" src="…"></video><figcaption>…</figcaption></figure>
//! ```
//!
//! and the editing view wraps the same figure into a widget. Captions live in
//! [`caption`], uploads in [`upload`], and the style, width and text
//! alternative commands in their own modules.

mod caption;
mod resize;
mod style;
mod text_alternative;
mod upload;

pub use caption::{caption_of, CaptionVisibility, InsertMissingCaption, VideoCaption, CAPTION, CAPTION_FIXER, HIDDEN_CLASS};
pub use resize::{VideoResize, VideoResizeCommand, VideoResizeParams, RESIZED_CLASS, WIDTH};
pub use style::{normalize_styles, VideoStyle, VideoStyleCommand, VideoStyleOption, VideoStyleParams, VIDEO_STYLE};
pub use text_alternative::{TextAlternativeParams, VideoTextAlternative, VideoTextAlternativeCommand, ALT};
pub use upload::{
    abort_upload, begin_upload, finish_upload, UploadTracker, VideoUpload, VideoUploadCommand, VideoUploadParams, UPLOAD_ID,
    UPLOAD_STATUS,
};

use super::selected_blocks;
use crate::command::{parse_params, Command, OneOrMany};
use crate::editor::Editor;
use crate::errors::Result;
use crate::plugin::Plugin;
use crate::widget::to_widget;
use folio_engine::conversion::{
    downcast_helpers, upcast_helpers, DowncastData, DowncastDispatcher, EventPattern, Priority, UpcastApi,
    UpcastData, UpcastPattern, ViewMatcher,
};
use folio_engine::model::{
    Attributes, Document, Item, ItemDefinition, Model, NodeId, NodeSnapshot, Position, Schema, Writer, ROOT_NAME,
};
use folio_engine::view::{ViewId, ViewWriter};
use folio_engine::EngineError;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

pub const VIDEO: &str = "video";
const FIGURE_CLASS: &str = "video";

fn create_figure(writer: &mut ViewWriter<'_>) -> Option<ViewId> {
    let figure = writer.create_container_element("figure", &[("class", FIGURE_CLASS)]);
    let media = writer.create_container_element("video", &[("controls", "")]);
    writer.append(media, figure).ok()?;
    Some(figure)
}

/// Writes a model attribute of `video` onto the inner `<video>` element.
fn media_attribute(dispatcher: &mut DowncastDispatcher, key: &'static str) {
    dispatcher.on(
        EventPattern::attribute_on(key, VIDEO),
        Priority::Normal,
        move |info, data, api| {
            let DowncastData::Attribute {
                item: Item::Element(element),
                new_value,
                ..
            } = data
            else {
                return Ok(());
            };
            let Some(token) = data.consumable_key(&info.event) else {
                return Ok(());
            };
            if !api.consumable.consume(&token) {
                return Ok(());
            }
            let Some(figure) = api.mapper.to_view_element(*element) else {
                return Ok(());
            };
            let Some(media) = api.view().child_named(figure, "video") else {
                return Ok(());
            };
            match new_value.as_ref().and_then(Value::as_str) {
                Some(value) => api.writer.set_attribute(key, value, media),
                None => api.writer.remove_attribute(key, media),
            }
        },
    );
}

/// `<figure class="video">` holding a `<video src>`: the video becomes the
/// model element and the rest of the figure its content.
fn figure_to_video(data: &mut UpcastData, api: &mut UpcastApi<'_>) -> folio_engine::Result<()> {
    if data.output.is_some() {
        return Ok(());
    }
    let figure = data.view_item;
    let Some(parts) = ViewMatcher::element("figure").class(FIGURE_CLASS).matches(api.view, figure) else {
        return Ok(());
    };
    if !api.can_consume_all(figure, &parts) {
        return Ok(());
    }
    let view = api.view;
    let Some(media) = view
        .children(figure)
        .iter()
        .copied()
        .find(|child| view.name(*child) == Some("video") && view.attribute(*child, "src").is_some())
    else {
        return Ok(());
    };

    let mut output = api.convert_item(media, &data.parent_name)?;
    let Some(NodeSnapshot::Element { name, children, .. }) = output.first_mut() else {
        return Ok(());
    };
    if name.as_str() != VIDEO {
        return Ok(());
    }
    for child in view.children(figure).iter().copied().filter(|child| *child != media) {
        children.extend(api.convert_item(child, VIDEO)?);
    }
    api.consume_all(figure, &parts);
    data.output = Some(output);
    Ok(())
}

/// Where a block object lands for the current selection: after a selected
/// block, inside an empty block, or next to the block holding the selection.
pub fn find_optimal_insertion_position(document: &Document, schema: &Schema) -> Position {
    let selection = document.selection();
    if let Some(selected) = document.selected_element() {
        let is_block = document.name(selected).map_or(false, |name| schema.is_block(name));
        if let (true, Ok(after)) = (is_block, document.position_after(selected)) {
            return after;
        }
    }
    if let Some(block) = selected_blocks(document, schema).first().copied() {
        if document.is_empty(block) {
            return Position::new(block, 0);
        }
        let focus = selection.focus();
        let placed = if focus.parent == block && document.is_at_end(focus) {
            document.position_after(block)
        } else {
            document.position_before(block)
        };
        if let Ok(position) = placed {
            return position;
        }
    }
    selection.focus()
}

/// Whether a video can be inserted at the selection.
pub fn is_video_allowed(document: &Document, schema: &Schema) -> bool {
    let position = find_optimal_insertion_position(document, schema);
    let mut parent = position.parent;
    if document.is_empty(parent) && parent != document.root() {
        parent = document.parent(parent).unwrap_or(parent);
    }
    let allowed_in_parent = schema.check_child(document.name(parent).unwrap_or_default(), VIDEO);
    let on_object = document
        .selected_element()
        .and_then(|element| document.name(element))
        .map_or(false, |name| schema.is_object(name));
    let in_video = document
        .find_ancestor(document.selection().focus().parent, VIDEO)
        .is_some();
    allowed_in_parent && !on_object && !in_video
}

/// Inserts a video at the optimal position and selects it. An empty block
/// at that position is replaced.
pub fn insert_video(writer: &mut Writer<'_>, attributes: Attributes) -> folio_engine::Result<NodeId> {
    let position = find_optimal_insertion_position(writer.document(), writer.schema());
    let parent = position.parent;
    let parent_name = writer.document().name(parent).unwrap_or_default().to_string();
    let video = if writer.schema().check_child(&parent_name, VIDEO) {
        writer.insert_element(VIDEO, attributes, position)?
    } else if writer.document().is_empty(parent) && parent != writer.document().root() {
        let before = writer.document().position_before(parent)?;
        writer.remove_node(parent)?;
        writer.insert_element(VIDEO, attributes, before)?
    } else {
        return Err(EngineError::InvalidPosition(format!(
            "{VIDEO} is not allowed in {parent_name}"
        )));
    };
    writer.set_selection_on(video)?;
    Ok(video)
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct InsertVideoParams {
    pub source: OneOrMany<String>,
}

/// `insertVideo`: inserts one video per source.
#[derive(Debug, Default)]
pub struct InsertVideoCommand {
    enabled: bool,
}

impl Command for InsertVideoCommand {
    fn refresh(&mut self, document: &Document, schema: &Schema) {
        self.enabled = is_video_allowed(document, schema);
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn execute(&mut self, model: &mut Model, params: Value) -> Result<()> {
        let params: InsertVideoParams = parse_params(params)?;
        let sources = params.source.into_vec();
        if sources.is_empty() {
            return Ok(());
        }
        model.change(|writer| {
            for source in sources {
                let mut attributes = Attributes::new();
                attributes.insert("src".into(), Value::String(source));
                let video = insert_video(writer, attributes)?;
                debug!(?video, "Inserted video");
            }
            Ok(())
        })?;
        Ok(())
    }
}

/// Schema, converters and the `insertVideo` command.
pub struct Video;

impl Plugin for Video {
    fn name(&self) -> &'static str {
        "Video"
    }

    fn init(&self, editor: &mut Editor) -> Result<()> {
        editor.model_mut().schema_mut().register(
            VIDEO,
            ItemDefinition::default()
                .allowed_in(ROOT_NAME)
                .block()
                .object()
                .with_attributes(&["src", "alt", "controls"]),
        );

        let mut conversion = editor.conversion();
        downcast_helpers::element_to_element(&mut conversion.data_downcast, VIDEO, |_, _, writer| {
            create_figure(writer)
        });
        downcast_helpers::element_to_element(&mut conversion.editing_downcast, VIDEO, |_, _, writer| {
            let figure = create_figure(writer)?;
            writer.set_custom_property("video", Value::Bool(true), figure).ok()?;
            to_widget(writer, figure).ok()
        });
        conversion.for_downcast(|dispatcher| {
            media_attribute(dispatcher, "src");
            media_attribute(dispatcher, "alt");
            downcast_helpers::consume_attribute(dispatcher, VIDEO, "controls");
        });

        upcast_helpers::element_to_element(
            &mut conversion.upcast,
            ViewMatcher::element("video").attribute("src"),
            |view, element| {
                let src = view.attribute(element, "src")?;
                Some(NodeSnapshot::element(VIDEO).with_attribute("src", Value::String(src.to_string())))
            },
        );
        upcast_helpers::attribute_to_attribute(
            &mut conversion.upcast,
            ViewMatcher::element("video").attribute("alt"),
            "alt",
            |view, element| view.attribute(element, "alt").map(|alt| Value::String(alt.to_string())),
        );
        conversion
            .upcast
            .on(UpcastPattern::Element(Some("figure".into())), Priority::Normal, figure_to_video);
        drop(conversion);

        editor.add_command("insertVideo", InsertVideoCommand::default());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::Paragraph;
    use serde_json::json;

    fn editor() -> Editor {
        Editor::create(Default::default(), vec![Box::new(Paragraph), Box::new(Video)]).unwrap()
    }

    #[test]
    fn test_insert_replaces_empty_paragraph() {
        let mut editor = editor();
        editor.set_data("<p></p>").unwrap();
        editor.execute("insertVideo", json!({ "source": "a.mp4" })).unwrap();

        let document = editor.model().document();
        let root = document.root();
        assert_eq!(document.children(root).len(), 1);
        let video = document.children(root)[0];
        assert!(document.is(video, VIDEO));
        assert_eq!(document.selected_element(), Some(video));
        assert_eq!(
            editor.get_data().unwrap(),
            "<figure class=\"video\"><video controls=\"\" src=\"a.mp4\"></video></figure>"
        );
    }

    #[test]
    fn test_insert_after_non_empty_paragraph() {
        let mut editor = editor();
        editor.set_data("<p>foo</p>").unwrap();
        editor.execute("insertVideo", json!({ "source": ["a.mp4", "b.mp4"] })).unwrap();

        let document = editor.model().document();
        let names: Vec<_> = document
            .children(document.root())
            .iter()
            .map(|node| document.name(*node).unwrap_or_default())
            .collect();
        // The selection starts at the paragraph start, so the first video goes before it.
        assert_eq!(names, vec!["video", "video", "paragraph"]);
    }

    #[test]
    fn test_disabled_when_video_is_selected() {
        let mut editor = editor();
        editor.set_data("<p></p>").unwrap();
        editor.execute("insertVideo", json!({ "source": "a.mp4" })).unwrap();
        assert!(!editor.command("insertVideo").unwrap().borrow().is_enabled());
    }

    #[test]
    fn test_upcast_figure() {
        let editor = editor();
        let nodes = editor
            .parse_data("<figure class=\"video\"><video controls=\"\" src=\"a.mp4\" alt=\"Clip\"></video></figure>", None)
            .unwrap();
        assert_eq!(
            nodes,
            vec![NodeSnapshot::element(VIDEO)
                .with_attribute("src", json!("a.mp4"))
                .with_attribute("alt", json!("Clip"))]
        );
    }
}
