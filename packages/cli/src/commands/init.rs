use crate::config::Config;
use anyhow::Result;
use clap::Args;
use colored::Colorize;
use folio_editor::config::{MentionFeed, DEFAULT_CONFIG_NAME};
use serde_json::json;
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Args)]
pub struct InitArgs {
    /// Source directory
    #[arg(short, long, default_value = "content")]
    pub src_dir: String,

    /// Force overwrite existing config
    #[arg(short, long)]
    pub force: bool,
}

const EXAMPLE_DOCUMENT: &str = r#"<p>Welcome to Folio, <span class="mention" data-mention="@team">@team</span>!</p>
<figure class="video"><video controls="" src="intro.mp4"></video><figcaption>Getting started</figcaption></figure>
"#;

pub fn init(args: InitArgs, cwd: &str) -> Result<()> {
    let config_path = PathBuf::from(cwd).join(DEFAULT_CONFIG_NAME);

    if config_path.exists() && !args.force {
        println!(
            "{} {} already exists",
            "⚠️".yellow(),
            DEFAULT_CONFIG_NAME.bright_white()
        );
        println!("Use --force to overwrite");
        return Ok(());
    }

    println!("{}", "📝 Initializing Folio project...".bright_blue().bold());

    let src_dir = PathBuf::from(cwd).join(&args.src_dir);
    if !src_dir.exists() {
        fs::create_dir_all(&src_dir)?;
        println!("  {} Created {}/", "✓".green(), args.src_dir);
    }

    let example_file = src_dir.join("welcome.html");
    if !example_file.exists() {
        fs::write(&example_file, EXAMPLE_DOCUMENT)?;
        println!("  {} Created welcome.html", "✓".green());
    }

    let mut config = Config {
        src_dir: args.src_dir.clone(),
        ..Config::default()
    };
    config.editor.mention.feeds.push(MentionFeed {
        marker: Some("@".to_string()),
        feed: vec![json!("@team")],
        minimum_characters: 0,
    });

    let config_json = serde_json::to_string_pretty(&config)?;
    fs::write(&config_path, config_json)?;

    println!("  {} Created {}", "✓".green(), DEFAULT_CONFIG_NAME);
    println!();
    println!("{}", "✅ Project initialized!".green().bold());
    println!();
    println!("Next steps:");
    println!("  1. Edit {}/welcome.html", args.src_dir);
    println!("  2. Run: folio check-config");
    println!("  3. Run: folio normalize");

    Ok(())
}
