use super::{read_detached_operations, to_pretty_json};
use anyhow::Result;
use clap::Args;
use colored::Colorize;
use folio_model::transform_sets;
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Args)]
pub struct TransformArgs {
    /// First operation list (JSON array)
    pub a: PathBuf,

    /// Second operation list, concurrent with the first
    pub b: PathBuf,

    /// Let the second list win ties instead of the first
    #[arg(long)]
    pub b_strong: bool,
}

/// Print `a` rebased onto `b` and `b` rebased onto `a`
pub fn transform(args: TransformArgs) -> Result<()> {
    let a = read_detached_operations(&args.a)?;
    let b = read_detached_operations(&args.b)?;
    let transformed = transform_sets(&a, &b, !args.b_strong);
    info!(
        a = a.len(),
        b = b.len(),
        a_after = transformed.operations_a.len(),
        b_after = transformed.operations_b.len(),
        "Transformed operation lists"
    );

    println!("{}", "a after b".bright_blue().bold());
    println!("{}", to_pretty_json(&transformed.operations_a)?);
    println!();
    println!("{}", "b after a".bright_blue().bold());
    println!("{}", to_pretty_json(&transformed.operations_b)?);
    Ok(())
}
