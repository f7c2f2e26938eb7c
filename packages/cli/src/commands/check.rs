use crate::config::Config;
use anyhow::{anyhow, Result};
use clap::Args;
use colored::Colorize;
use folio_editor::features::standard_plugins;
use folio_editor::{Editor, EditorConfig};
use std::path::PathBuf;

#[derive(Debug, Args)]
pub struct CheckConfigArgs {
    /// Configuration file (defaults to folio.config.json)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// List the commands the editor registers
    #[arg(long)]
    pub commands: bool,
}

/// Builds an editor with every feature, which validates each section the
/// features read. Returns the registered command names.
pub fn validate(config: &EditorConfig) -> Result<Vec<String>> {
    let editor = Editor::create(config.clone(), standard_plugins()).map_err(|err| match err.code() {
        Some(code) => anyhow!("[{code}] {err}"),
        None => anyhow!(err),
    })?;
    Ok(editor.command_names())
}

pub fn check_config(args: CheckConfigArgs, cwd: &str) -> Result<()> {
    let config = match &args.config {
        Some(path) => Config::load_file(path)?,
        None => Config::load(cwd)?,
    };

    println!("{}", "🔍 Checking configuration...".bright_blue().bold());
    let commands = validate(&config.editor)?;
    println!("  {} {} mention feeds", "✓".green(), config.editor.mention.feeds.len());
    println!("  {} {} stencil blocks", "✓".green(), config.editor.stencil.blocks.len());
    println!(
        "  {} video types: {}",
        "✓".green(),
        config.editor.video.upload.types.join(", ")
    );
    if args.commands {
        println!();
        println!("Commands:");
        for name in &commands {
            println!("  {}", name);
        }
    }
    println!();
    println!("{}", "✅ Configuration is valid".green().bold());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_editor::config::DEFAULT_CONFIG_NAME;
    use std::fs;

    #[test]
    fn test_default_config_is_valid() {
        let commands = validate(&EditorConfig::default()).unwrap();
        for name in ["input", "undo", "redo", "bold", "mention", "insertVideo", "videoUpload", "insertTemplateBlock", "videoStyle", "videoResize", "setMaxWidth"] {
            assert!(commands.iter().any(|command| command == name), "missing {name}");
        }
    }

    #[test]
    fn test_bad_marker_reports_code() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join(DEFAULT_CONFIG_NAME),
            r#"{ "mention": { "feeds": [{ "marker": "@@", "feed": ["@Lily"] }] } }"#,
        )
        .unwrap();

        let args = CheckConfigArgs {
            config: None,
            commands: false,
        };
        let err = check_config(args, dir.path().to_str().unwrap()).unwrap_err();
        assert!(err.to_string().starts_with("[mentionconfig-incorrect-marker]"), "{err}");
    }

    #[test]
    fn test_malformed_json_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        fs::write(&path, "{ not json").unwrap();
        let args = CheckConfigArgs {
            config: Some(path),
            commands: true,
        };
        assert!(check_config(args, dir.path().to_str().unwrap()).is_err());
    }
}
