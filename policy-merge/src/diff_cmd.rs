use anyhow::Result;
use policy_merge::report::{render_diff, render_summary};
use policy_merge_core::{format_json, AcceptAll};

use crate::cli::{DiffArgs, OutputFormat};
use crate::merge_cmd::merge_documents;

pub fn run_diff(args: DiffArgs) -> Result<()> {
    let merged = merge_documents(&args.base, &args.others, args.symmetric, AcceptAll)?;
    let lines = merged.diff_lines();

    match args.format {
        OutputFormat::Text => {
            let color = !args.no_color;
            println!("{}", render_diff(&lines, color));
            println!("{}", render_summary(&lines, color));
        }
        OutputFormat::Json => println!("{}", format_json(&lines)),
    }
    Ok(())
}
