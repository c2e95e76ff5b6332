use super::{build_editor, read_file, to_pretty_json};
use crate::config::Config;
use anyhow::Result;
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Args)]
pub struct ConvertArgs {
    /// HTML file to load
    pub file: PathBuf,

    /// Also print the model as JSON
    #[arg(long)]
    pub model: bool,
}

/// Load HTML through the upcast and write it back through the data downcast
pub fn convert(args: ConvertArgs, config: &Config) -> Result<()> {
    let html = read_file(&args.file)?;
    let mut editor = build_editor(&config.editor)?;
    editor.set_data(&html)?;
    info!(file = %args.file.display(), version = editor.model().document().version(), "Loaded data");

    if args.model {
        println!("{}", "Model".bright_blue().bold());
        println!("{}", to_pretty_json(&editor.model().document().to_json())?);
        println!();
        println!("{}", "Data".bright_blue().bold());
    }
    println!("{}", editor.get_data()?);
    Ok(())
}
