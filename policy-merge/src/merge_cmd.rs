use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use policy_merge::profile::load_profile_with_source;
use policy_merge::validate::ProfileValidator;
use policy_merge_core::{default_schemas, load_file, MergeObject, Validator};

use crate::cli::{DocumentFormat, MergeArgs};
use crate::path_guard;

pub fn run_merge(args: MergeArgs) -> Result<()> {
    if let Some(output) = &args.output {
        let mut inputs: Vec<&Path> = vec![&args.base];
        inputs.extend(args.others.iter().map(PathBuf::as_path));
        path_guard::reject_input_overwrite(output, &inputs)?;
    }

    let (profile, source) = load_profile_with_source(args.profiles_dir.as_deref())
        .context("failed to load validation profile")?;
    tracing::debug!(profiles = %source, "using validation profile");

    let merged = merge_documents(
        &args.base,
        &args.others,
        args.symmetric,
        ProfileValidator::new(profile),
    )?;
    if !merged.is_valid_obj() {
        eprintln!(
            "warning: merged document does not pass validation; run `policy-merge validate` for details"
        );
    }

    let rendered = match args.format {
        DocumentFormat::Yaml => serde_yaml::to_string(merged.obj_data())
            .context("failed to serialize merged document as YAML")?,
        DocumentFormat::Json => {
            let mut json = serde_json::to_string_pretty(merged.obj_data())
                .context("failed to serialize merged document as JSON")?;
            json.push('\n');
            json
        }
    };

    match &args.output {
        Some(path) => fs::write(path, rendered)
            .with_context(|| format!("failed to write merged document {}", path.display()))?,
        None => print!("{rendered}"),
    }
    Ok(())
}

/// Load `base` and fold every document in `others` into it, in order.
pub fn merge_documents(
    base: &Path,
    others: &[PathBuf],
    symmetric: bool,
    validator: impl Validator + 'static,
) -> Result<MergeObject> {
    let document =
        load_file(base).with_context(|| format!("failed to load {}", base.display()))?;
    let mut merged = MergeObject::new(document, default_schemas(), validator);

    for path in others {
        let other =
            load_file(path).with_context(|| format!("failed to load {}", path.display()))?;
        let result = if symmetric {
            merged.symmetric_merge(&other)
        } else {
            merged.asymmetric_merge(&other)
        };
        result.with_context(|| format!("failed to merge {}", path.display()))?;

        let stats = merged.last_stats();
        tracing::debug!(
            file = %path.display(),
            merged_nodes = stats.merged_nodes,
            grafted_nodes = stats.grafted_nodes,
            renamed_ids = stats.renamed_ids,
            merged_rules = stats.merged_rules,
            appended_rules = stats.appended_rules,
            "merged file"
        );
    }
    Ok(merged)
}
