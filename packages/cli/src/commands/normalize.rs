use crate::config::Config;
use anyhow::{anyhow, Result};
use clap::Args;
use colored::Colorize;
use folio_editor::features::standard_plugins;
use folio_editor::{Editor, EditorConfig, Notification};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, instrument};
use walkdir::WalkDir;

#[derive(Debug, Args)]
pub struct NormalizeArgs {
    /// File or directory to normalize (defaults to the configured source directory)
    pub path: Option<PathBuf>,

    /// Output to stdout instead of files
    #[arg(long)]
    pub stdout: bool,

    /// Output directory (overrides config)
    #[arg(short, long)]
    pub out_dir: Option<String>,

    /// Configuration file (defaults to folio.config.json)
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

/// Result of passing one document through the editor.
#[derive(Debug)]
pub struct Normalized {
    pub html: String,
    pub notifications: Vec<Notification>,
}

/// Loads `html` into an editor with every feature and reads it back.
#[instrument(skip_all, fields(len = html.len()))]
pub fn normalize_html(config: &EditorConfig, html: &str) -> Result<Normalized> {
    let mut editor = Editor::create(config.clone(), standard_plugins())?;
    editor.set_data(html)?;
    let html = editor.get_data()?;
    let notifications = editor.notifications_handle().borrow_mut().drain();
    Ok(Normalized { html, notifications })
}

pub fn normalize(args: NormalizeArgs, cwd: &str) -> Result<()> {
    let config = match &args.config {
        Some(path) => Config::load_file(path)?,
        None => Config::load(cwd)?,
    };
    let root = args.path.clone().unwrap_or_else(|| config.get_src_dir(cwd));
    if !root.exists() {
        return Err(anyhow!("Input path does not exist: {}", root.display()));
    }

    println!("{}", "🧹 Normalizing documents...".bright_blue().bold());
    let files = if root.is_file() {
        vec![root.clone()]
    } else {
        find_html_files(&root)
    };
    if files.is_empty() {
        println!("{}", "⚠️  No .html files found".yellow());
        return Ok(());
    }
    println!("Found {} files", files.len());

    let out_dir = match &args.out_dir {
        Some(out) => PathBuf::from(cwd).join(out),
        None => config.get_out_dir(cwd),
    };
    let base = if root.is_file() {
        root.parent().map(Path::to_path_buf).unwrap_or_default()
    } else {
        root.clone()
    };

    let mut success_count = 0;
    let mut error_count = 0;
    for file in &files {
        let relative_path = file.strip_prefix(&base).unwrap_or(file);
        match normalize_file(file, relative_path, &config.editor, &args, &out_dir) {
            Ok(output) => {
                success_count += 1;
                println!("  {} {} → {}", "✓".green(), relative_path.display(), output);
            }
            Err(e) => {
                error_count += 1;
                eprintln!(
                    "  {} {} - {}",
                    "✗".red(),
                    relative_path.display(),
                    e.to_string().red()
                );
            }
        }
    }

    println!();
    if error_count == 0 {
        println!("{} Normalized {} files successfully", "✅".green(), success_count);
    } else {
        println!(
            "{} Normalized {} files, {} errors",
            "⚠️".yellow(),
            success_count,
            error_count
        );
    }
    Ok(())
}

fn find_html_files(dir: &Path) -> Vec<PathBuf> {
    WalkDir::new(dir)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
        .map(|entry| entry.into_path())
        .filter(|path| path.extension().and_then(|s| s.to_str()) == Some("html"))
        .collect()
}

fn normalize_file(
    file: &Path,
    relative_path: &Path,
    config: &EditorConfig,
    args: &NormalizeArgs,
    out_dir: &Path,
) -> Result<String> {
    let source = fs::read_to_string(file)?;
    let normalized = normalize_html(config, &source)?;
    for notification in &normalized.notifications {
        println!("    {} {}", "!".yellow(), notification.message);
    }

    if args.stdout {
        println!("{}", normalized.html);
        return Ok("stdout".to_string());
    }
    let output_file = out_dir.join(relative_path);
    if let Some(parent) = output_file.parent() {
        fs::create_dir_all(parent)?;
    }
    debug!(output = %output_file.display(), "Writing document");
    fs::write(&output_file, normalized.html)?;
    Ok(output_file.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_html_uses_canonical_elements() {
        let normalized = normalize_html(
            &EditorConfig::default(),
            "<p>Hello <b>world</b> and <em>more</em></p>",
        )
        .unwrap();
        assert_eq!(normalized.html, "<p>Hello <strong>world</strong> and <i>more</i></p>");
        assert!(normalized.notifications.is_empty());
    }

    #[test]
    fn test_normalize_directory_into_out_dir() {
        let dir = tempfile::tempdir().unwrap();
        let cwd = dir.path().to_str().unwrap().to_string();
        fs::create_dir_all(dir.path().join("content/posts")).unwrap();
        fs::write(
            dir.path().join("content/posts/first.html"),
            "<p>Clip</p><figure class=\"video\"><video src=\"a.mp4\"></video></figure>",
        )
        .unwrap();
        fs::write(dir.path().join("content/notes.txt"), "ignored").unwrap();

        let args = NormalizeArgs {
            path: None,
            stdout: false,
            out_dir: None,
            config: None,
        };
        normalize(args, &cwd).unwrap();

        let output = fs::read_to_string(dir.path().join("dist/posts/first.html")).unwrap();
        assert_eq!(
            output,
            "<p>Clip</p><figure class=\"video\"><video controls=\"\" src=\"a.mp4\"></video></figure>"
        );
        assert!(!dir.path().join("dist/notes.txt").exists());
    }

    #[test]
    fn test_missing_path_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let args = NormalizeArgs {
            path: Some(dir.path().join("nowhere")),
            stdout: true,
            out_dir: None,
            config: None,
        };
        assert!(normalize(args, dir.path().to_str().unwrap()).is_err());
    }
}
