//! `videoTextAlternative`: edits the `alt` text of the selected video. The
//! attribute itself and its converters belong to [`Video`](super::Video).

use super::VIDEO;
use crate::command::{parse_params, Command};
use crate::editor::Editor;
use crate::errors::Result;
use crate::plugin::Plugin;
use folio_engine::model::{Document, Model, NodeId, Schema};
use serde::Deserialize;
use serde_json::Value;

pub const ALT: &str = "alt";

fn selected_video(document: &Document) -> Option<NodeId> {
    document
        .selected_element()
        .filter(|element| document.is(*element, VIDEO))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TextAlternativeParams {
    pub new_value: String,
}

/// Its value is the current text, or `false` when there is none.
#[derive(Debug)]
pub struct VideoTextAlternativeCommand {
    value: Value,
    enabled: bool,
}

impl Default for VideoTextAlternativeCommand {
    fn default() -> Self {
        Self {
            value: Value::Bool(false),
            enabled: false,
        }
    }
}

impl Command for VideoTextAlternativeCommand {
    fn refresh(&mut self, document: &Document, _schema: &Schema) {
        let video = selected_video(document);
        self.enabled = video.is_some();
        self.value = video
            .and_then(|video| document.attribute(video, ALT))
            .cloned()
            .unwrap_or(Value::Bool(false));
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn value(&self) -> Value {
        self.value.clone()
    }

    fn execute(&mut self, model: &mut Model, params: Value) -> Result<()> {
        let params: TextAlternativeParams = parse_params(params)?;
        model.change(|writer| {
            let Some(video) = selected_video(writer.document()) else {
                return Ok(());
            };
            writer.set_attribute_on(ALT, Value::String(params.new_value), video)
        })?;
        Ok(())
    }
}

pub struct VideoTextAlternative;

impl Plugin for VideoTextAlternative {
    fn name(&self) -> &'static str {
        "VideoTextAlternative"
    }

    fn requires(&self) -> &'static [&'static str] {
        &["Video"]
    }

    fn init(&self, editor: &mut Editor) -> Result<()> {
        editor.add_command("videoTextAlternative", VideoTextAlternativeCommand::default());
        Ok(())
    }
}
