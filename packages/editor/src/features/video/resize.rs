//! Video resizing: the `width` attribute of a video becomes a `width` style
//! and the `video_resized` class on its figure.

use super::VIDEO;
use crate::command::{parse_params, Command};
use crate::editor::Editor;
use crate::errors::{EditorError, Result};
use crate::plugin::Plugin;
use folio_engine::conversion::{upcast_helpers, DowncastData, DowncastDispatcher, EventPattern, Priority, ViewMatcher};
use folio_engine::model::{Document, Item, Model, NodeId, Schema};
use serde::Deserialize;
use serde_json::{json, Value};

pub const WIDTH: &str = "width";
pub const RESIZED_CLASS: &str = "video_resized";

fn width_converter(dispatcher: &mut DowncastDispatcher) {
    dispatcher.on(
        EventPattern::attribute_on(WIDTH, VIDEO),
        Priority::Normal,
        |info, data, api| {
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
            match new_value.as_ref().and_then(Value::as_str) {
                Some(width) => {
                    api.writer.set_style(WIDTH, width, figure)?;
                    api.writer.add_class(RESIZED_CLASS, figure)
                }
                None => {
                    api.writer.remove_style(WIDTH, figure)?;
                    api.writer.remove_class(RESIZED_CLASS, figure)
                }
            }
        },
    );
}

fn selected_video(document: &Document) -> Option<NodeId> {
    document
        .selected_element()
        .filter(|element| document.is(*element, VIDEO))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct VideoResizeParams {
    /// A CSS width, or a number in the configured unit. `null` removes it.
    pub width: Value,
}

/// `videoResize`: sets the width of the selected video. Its value is
/// `{ width, height: null }` for a resized video and `null` otherwise.
pub struct VideoResizeCommand {
    unit: String,
    value: Value,
    enabled: bool,
}

impl VideoResizeCommand {
    pub fn new(unit: &str) -> Self {
        Self {
            unit: unit.to_string(),
            value: Value::Null,
            enabled: false,
        }
    }

    fn css_width(&self, width: &Value) -> Result<Option<String>> {
        match width {
            Value::Null => Ok(None),
            Value::String(width) if width.trim().is_empty() => Ok(None),
            Value::String(width) => Ok(Some(width.trim().to_string())),
            Value::Number(number) => Ok(Some(format!("{number}{}", self.unit))),
            other => Err(EditorError::Command {
                code: "videoresizecommand-invalid-width",
                message: format!("width must be a string or a number, got {other}"),
            }),
        }
    }
}

impl Command for VideoResizeCommand {
    fn refresh(&mut self, document: &Document, _schema: &Schema) {
        let video = selected_video(document);
        self.enabled = video.is_some();
        self.value = video
            .and_then(|video| document.attribute(video, WIDTH))
            .map_or(Value::Null, |width| json!({ "width": width, "height": null }));
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn value(&self) -> Value {
        self.value.clone()
    }

    fn execute(&mut self, model: &mut Model, params: Value) -> Result<()> {
        let params: VideoResizeParams = parse_params(params)?;
        let width = self.css_width(&params.width)?;
        model.change(|writer| {
            let Some(video) = selected_video(writer.document()) else {
                return Ok(());
            };
            match width {
                Some(width) => writer.set_attribute_on(WIDTH, Value::String(width), video),
                None => writer.remove_attribute_from(WIDTH, video),
            }
        })?;
        Ok(())
    }
}

/// The `width` attribute of videos and the `videoResize` command.
pub struct VideoResize;

impl Plugin for VideoResize {
    fn name(&self) -> &'static str {
        "VideoResize"
    }

    fn requires(&self) -> &'static [&'static str] {
        &["Video"]
    }

    fn init(&self, editor: &mut Editor) -> Result<()> {
        let unit = editor.config().video.resize_unit.clone();
        editor
            .model_mut()
            .schema_mut()
            .extend(VIDEO, |definition| definition.allow_attributes.push(WIDTH.to_string()));

        let mut conversion = editor.conversion();
        conversion.for_downcast(width_converter);
        upcast_helpers::attribute_to_attribute(
            &mut conversion.upcast,
            ViewMatcher::element("figure").style(WIDTH),
            WIDTH,
            |view, figure| view.style(figure, WIDTH).map(|width| Value::String(width.to_string())),
        );
        drop(conversion);

        editor.add_command("videoResize", VideoResizeCommand::new(&unit));
        Ok(())
    }
}
