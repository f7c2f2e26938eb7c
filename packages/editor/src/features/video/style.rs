//! Video styles.
//!
//! A style is stored as the `videoStyle` attribute of a video and rendered as
//! a class on its figure. The default style has no attribute and no class.

use super::VIDEO;
use crate::command::{parse_params, Command};
use crate::config::{VideoStyleDefinition, VideoStyleEntry};
use crate::editor::Editor;
use crate::errors::{EditorError, Result};
use crate::plugin::Plugin;
use folio_engine::conversion::{downcast_helpers, upcast_helpers, ViewMatcher};
use folio_engine::model::{Document, Model, NodeId, Schema};
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

pub const VIDEO_STYLE: &str = "videoStyle";

#[derive(Debug, Clone, PartialEq)]
pub struct VideoStyleOption {
    pub name: String,
    pub title: String,
    pub class_name: Option<String>,
    pub is_default: bool,
}

fn built_in(name: &str) -> Option<VideoStyleOption> {
    let (title, class_name, is_default) = match name {
        "full" => ("Full size video", None, true),
        "side" => ("Side video", Some("video-style-side"), false),
        "alignLeft" => ("Left aligned video", Some("video-style-align-left"), false),
        "alignCenter" => ("Centered video", Some("video-style-align-center"), false),
        "alignRight" => ("Right aligned video", Some("video-style-align-right"), false),
        _ => return None,
    };
    Some(VideoStyleOption {
        name: name.to_string(),
        title: title.to_string(),
        class_name: class_name.map(str::to_string),
        is_default,
    })
}

fn from_definition(definition: &VideoStyleDefinition) -> VideoStyleOption {
    let base = built_in(&definition.name);
    VideoStyleOption {
        name: definition.name.clone(),
        title: definition
            .title
            .clone()
            .or_else(|| base.as_ref().map(|style| style.title.clone()))
            .unwrap_or_default(),
        class_name: definition
            .class_name
            .clone()
            .or_else(|| base.as_ref().and_then(|style| style.class_name.clone())),
        is_default: definition
            .is_default
            .or_else(|| base.as_ref().map(|style| style.is_default))
            .unwrap_or(false),
    }
}

/// Resolves configured styles against the built-in ones. Unknown names are
/// kept as bare styles without a class.
pub fn normalize_styles(entries: &[VideoStyleEntry]) -> Vec<VideoStyleOption> {
    entries
        .iter()
        .map(|entry| match entry {
            VideoStyleEntry::Name(name) => built_in(name).unwrap_or_else(|| {
                warn!(%name, "video-style-not-found: There is no such video style of given name");
                VideoStyleOption {
                    name: name.clone(),
                    title: String::new(),
                    class_name: None,
                    is_default: false,
                }
            }),
            VideoStyleEntry::Definition(definition) => from_definition(definition),
        })
        .collect()
}

fn selected_video(document: &Document) -> Option<NodeId> {
    document
        .selected_element()
        .filter(|element| document.is(*element, VIDEO))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct VideoStyleParams {
    pub value: String,
}

/// `videoStyle`: applies a style to the selected video. Its value is the
/// current style name, or `false` when no video is selected.
pub struct VideoStyleCommand {
    styles: Vec<VideoStyleOption>,
    value: Value,
    enabled: bool,
}

impl VideoStyleCommand {
    pub fn new(styles: Vec<VideoStyleOption>) -> Self {
        Self {
            styles,
            value: Value::Bool(false),
            enabled: false,
        }
    }

    fn style(&self, name: &str) -> Option<&VideoStyleOption> {
        self.styles.iter().find(|style| style.name == name)
    }

    fn default_style(&self) -> Value {
        self.styles
            .iter()
            .find(|style| style.is_default)
            .map_or(Value::Bool(false), |style| Value::String(style.name.clone()))
    }
}

impl Command for VideoStyleCommand {
    fn refresh(&mut self, document: &Document, _schema: &Schema) {
        let video = selected_video(document);
        self.enabled = video.is_some();
        self.value = match video {
            None => Value::Bool(false),
            Some(video) => match document.attribute(video, VIDEO_STYLE).and_then(Value::as_str) {
                Some(name) if self.style(name).is_some() => Value::String(name.to_string()),
                Some(_) => Value::Bool(false),
                None => self.default_style(),
            },
        };
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn value(&self) -> Value {
        self.value.clone()
    }

    fn execute(&mut self, model: &mut Model, params: Value) -> Result<()> {
        let params: VideoStyleParams = parse_params(params)?;
        let style = self.style(&params.value).cloned().ok_or_else(|| EditorError::Command {
            code: "videostylecommand-unknown-style",
            message: format!("no video style named {}", params.value),
        })?;
        model.change(|writer| {
            let Some(video) = selected_video(writer.document()) else {
                return Ok(());
            };
            if style.is_default {
                writer.remove_attribute_from(VIDEO_STYLE, video)
            } else {
                writer.set_attribute_on(VIDEO_STYLE, Value::String(style.name.clone()), video)
            }
        })?;
        Ok(())
    }
}

/// The `videoStyle` attribute, its converters and command.
pub struct VideoStyle;

impl Plugin for VideoStyle {
    fn name(&self) -> &'static str {
        "VideoStyle"
    }

    fn requires(&self) -> &'static [&'static str] {
        &["Video"]
    }

    fn init(&self, editor: &mut Editor) -> Result<()> {
        let styles = normalize_styles(&editor.config().video.styles);
        editor
            .model_mut()
            .schema_mut()
            .extend(VIDEO, |definition| definition.allow_attributes.push(VIDEO_STYLE.to_string()));

        let mut conversion = editor.conversion();
        let classes: Vec<(String, String)> = styles
            .iter()
            .filter_map(|style| Some((style.name.clone(), style.class_name.clone()?)))
            .collect();
        conversion.for_downcast(|dispatcher| {
            let classes = classes.clone();
            downcast_helpers::attribute_to_attribute(dispatcher, VIDEO, VIDEO_STYLE, move |value| {
                let name = value.as_str()?;
                let (_, class) = classes.iter().find(|(style, _)| style == name)?;
                Some(("class".to_string(), class.clone()))
            });
        });
        for style in styles.iter().filter(|style| !style.is_default) {
            let Some(class) = &style.class_name else {
                continue;
            };
            let name = style.name.clone();
            upcast_helpers::attribute_to_attribute(
                &mut conversion.upcast,
                ViewMatcher::element("figure").class(class),
                VIDEO_STYLE,
                move |_, _| Some(Value::String(name.clone())),
            );
        }
        drop(conversion);

        editor.add_command(VIDEO_STYLE, VideoStyleCommand::new(styles));
        Ok(())
    }
}
