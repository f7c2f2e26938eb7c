use folio_editor::config::DEFAULT_CONFIG_NAME;
use folio_editor::EditorConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Folio project file: where documents live plus the editor configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Directory containing the .html documents
    #[serde(default = "default_src_dir")]
    pub src_dir: String,

    /// Where normalized documents are written
    #[serde(default = "default_out_dir")]
    pub out_dir: String,

    /// Editor configuration, at the top level of the file
    #[serde(flatten)]
    pub editor: EditorConfig,
}

fn default_src_dir() -> String {
    "content".to_string()
}

fn default_out_dir() -> String {
    "dist".to_string()
}

impl Config {
    /// Load config from a directory
    pub fn load(cwd: &str) -> anyhow::Result<Self> {
        Self::load_file(&PathBuf::from(cwd).join(DEFAULT_CONFIG_NAME))
    }

    /// Load a config file; a missing file gives the defaults
    pub fn load_file(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Config::default());
        }
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn get_src_dir(&self, cwd: &str) -> PathBuf {
        PathBuf::from(cwd).join(&self.src_dir)
    }

    pub fn get_out_dir(&self, cwd: &str) -> PathBuf {
        PathBuf::from(cwd).join(&self.out_dir)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            src_dir: default_src_dir(),
            out_dir: default_out_dir(),
            editor: EditorConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config() {
        let json = r#"{
            "srcDir": "articles",
            "typing": { "undoStep": 5 },
            "mention": { "feeds": [{ "marker": "@", "feed": ["@Lily"] }] },
            "video": { "upload": { "types": ["mp4"] } }
        }"#;

        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.src_dir, "articles");
        assert_eq!(config.out_dir, "dist");
        assert_eq!(config.editor.typing.undo_step, 5);
        assert_eq!(config.editor.mention.feeds[0].marker.as_deref(), Some("@"));
        assert_eq!(config.editor.video.upload.types, vec!["mp4"]);
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.src_dir, "content");
        assert_eq!(config.editor.undo.max_levels, 100);
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(dir.path().to_str().unwrap()).unwrap();
        assert_eq!(config, Config::default());
    }
}
