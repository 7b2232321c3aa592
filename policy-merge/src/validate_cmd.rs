use anyhow::{bail, Context, Result};
use policy_merge::profile::load_profile_with_source;
use policy_merge::validate::{build_validation_report, render_validation_text};
use serde_yaml::Value;

use crate::cli::{OutputFormat, ValidateArgs};

pub fn run_validate(args: ValidateArgs, verbose: bool) -> Result<()> {
    let raw = std::fs::read_to_string(&args.file)
        .with_context(|| format!("failed to read {}", args.file.display()))?;
    let document: Value = serde_yaml::from_str(&raw)
        .with_context(|| format!("failed to parse {}", args.file.display()))?;
    let (profile, source) = load_profile_with_source(args.profiles_dir.as_deref())
        .context("failed to load validation profile")?;
    let report = build_validation_report(&document, &profile, &source);

    match args.format {
        OutputFormat::Text => println!("{}", render_validation_text(&report, verbose)),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
    }

    if report.errors > 0 {
        bail!("validate failed: {} errors", report.errors);
    }
    if args.strict && report.warnings > 0 {
        bail!("validate failed in strict mode: {} warnings", report.warnings);
    }
    Ok(())
}
