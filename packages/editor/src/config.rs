//! Editor configuration.
//!
//! Every section has defaults, so `{}` is a valid configuration. Plugins
//! validate the sections they read when they are initialized.

use crate::errors::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;

pub const DEFAULT_CONFIG_NAME: &str = "folio.config.json";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EditorConfig {
    pub typing: TypingConfig,
    pub undo: UndoConfig,
    pub mention: MentionConfig,
    pub video: VideoConfig,
    pub stencil: StencilConfig,
}

impl EditorConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads a configuration file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TypingConfig {
    /// Characters typed before a new undo step starts.
    pub undo_step: usize,
}

impl Default for TypingConfig {
    fn default() -> Self {
        Self { undo_step: 20 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UndoConfig {
    /// 0 keeps every step.
    pub max_levels: usize,
}

impl Default for UndoConfig {
    fn default() -> Self {
        Self { max_levels: 100 }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MentionConfig {
    pub feeds: Vec<MentionFeed>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MentionFeed {
    pub marker: Option<String>,
    /// Plain ids (`"@Lily"`) or objects with at least an `id`.
    pub feed: Vec<Value>,
    pub minimum_characters: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VideoConfig {
    pub upload: VideoUploadConfig,
    /// Styles offered by `videoStyle`, by name or as full definitions.
    pub styles: Vec<VideoStyleEntry>,
    /// Unit appended to numeric widths given to `videoResize`.
    pub resize_unit: String,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            upload: VideoUploadConfig::default(),
            styles: vec![
                VideoStyleEntry::Name("full".to_string()),
                VideoStyleEntry::Name("side".to_string()),
            ],
            resize_unit: "%".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VideoStyleEntry {
    Name(String),
    Definition(VideoStyleDefinition),
}

/// A video style. Fields left out are taken from the built-in style of the
/// same name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VideoStyleDefinition {
    pub name: String,
    pub title: Option<String>,
    pub class_name: Option<String>,
    pub is_default: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VideoUploadConfig {
    /// Accepted `video/<type>` subtypes.
    pub types: Vec<String>,
}

impl Default for VideoUploadConfig {
    fn default() -> Self {
        Self {
            types: ["mp4", "webm", "ogg", "quicktime", "mpeg", "3gp"]
                .iter()
                .map(|t| t.to_string())
                .collect(),
        }
    }
}

impl VideoUploadConfig {
    pub fn accepts(&self, mime_type: &str) -> bool {
        mime_type
            .strip_prefix("video/")
            .map_or(false, |subtype| self.types.iter().any(|t| t == subtype))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StencilConfig {
    pub blocks: Vec<StencilBlock>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StencilBlock {
    /// Tag name of the block in data (`app-hero-block`).
    pub selector: String,
    pub label: String,
    pub properties: Value,
    pub descriptors: Vec<StencilDescriptor>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StencilDescriptor {
    pub name: String,
    pub value: Value,
}

/// Attribute text for a descriptor value: strings verbatim, anything else
/// as JSON.
pub fn descriptor_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = EditorConfig::from_json_str("{}").unwrap();
        assert_eq!(config.typing.undo_step, 20);
        assert_eq!(config.undo.max_levels, 100);
        assert!(config.video.upload.types.contains(&"quicktime".to_string()));
        assert!(config.mention.feeds.is_empty());
    }

    #[test]
    fn test_parse_camel_case_sections() {
        let json = r#"{
            "typing": { "undoStep": 5 },
            "mention": { "feeds": [ { "marker": "@", "feed": ["@Lily"], "minimumCharacters": 2 } ] },
            "stencil": { "blocks": [ {
                "selector": "app-hero-block",
                "label": "Hero",
                "properties": ["title"],
                "descriptors": [ { "name": "properties", "value": ["title"] } ]
            } ] }
        }"#;
        let config = EditorConfig::from_json_str(json).unwrap();
        assert_eq!(config.typing.undo_step, 5);
        assert_eq!(config.mention.feeds[0].marker.as_deref(), Some("@"));
        assert_eq!(config.mention.feeds[0].minimum_characters, 2);
        assert_eq!(config.stencil.blocks[0].descriptors[0].name, "properties");
    }

    #[test]
    fn test_video_types() {
        let upload = VideoUploadConfig::default();
        assert!(upload.accepts("video/mp4"));
        assert!(!upload.accepts("image/png"));
        assert!(!upload.accepts("video/x-matroska"));
    }

    #[test]
    fn test_video_styles_accept_names_and_definitions() {
        let json = r#"{ "video": { "styles": ["full", { "name": "wide", "className": "video-wide" }], "resizeUnit": "px" } }"#;
        let config = EditorConfig::from_json_str(json).unwrap();
        assert_eq!(config.video.styles[0], VideoStyleEntry::Name("full".into()));
        match &config.video.styles[1] {
            VideoStyleEntry::Definition(definition) => {
                assert_eq!(definition.name, "wide");
                assert_eq!(definition.class_name.as_deref(), Some("video-wide"));
                assert_eq!(definition.is_default, None);
            }
            other => panic!("unexpected entry: {other:?}"),
        }
        assert_eq!(config.video.resize_unit, "px");
        assert_eq!(EditorConfig::default().video.styles.len(), 2);
    }

    #[test]
    fn test_load_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = EditorConfig::load(&dir.path().join(DEFAULT_CONFIG_NAME)).unwrap();
        assert_eq!(config, EditorConfig::default());
    }
}
