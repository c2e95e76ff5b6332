use super::{build_editor, read_file, read_operations_for, to_pretty_json};
use crate::config::Config;
use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Args)]
pub struct ReplayArgs {
    /// HTML file to load first
    pub file: PathBuf,

    /// JSON array of operations to apply, in order
    pub operations: PathBuf,
}

/// Apply recorded operations on top of loaded data
///
/// Base versions in the file are ignored; each operation is applied at the
/// version the document has when its turn comes.
pub fn replay(args: ReplayArgs, config: &Config) -> Result<()> {
    let html = read_file(&args.file)?;
    let mut editor = build_editor(&config.editor)?;
    editor.set_data(&html)?;

    let operations = read_operations_for(&args.operations, editor.model().document())?;
    let count = operations.len();
    editor
        .apply_operations(operations)
        .with_context(|| format!("Failed to replay {}", args.operations.display()))?;
    info!(operations = count, version = editor.model().document().version(), "Replayed operations");

    println!("{}", "Changes".bright_blue().bold());
    println!("{}", to_pretty_json(&editor.last_changes())?);
    println!();
    println!("{}", "Data".bright_blue().bold());
    println!("{}", editor.get_data()?);
    Ok(())
}
