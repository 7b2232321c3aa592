use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

/// Fail when `--output` names one of the documents being merged.
pub fn reject_input_overwrite(output: &Path, inputs: &[&Path]) -> Result<()> {
    let target = resolve(output)
        .with_context(|| format!("failed to resolve output path {}", output.display()))?;

    for input in inputs {
        let source = resolve(input)
            .with_context(|| format!("failed to resolve input path {}", input.display()))?;
        if source == target {
            bail!(
                "refusing to overwrite input document {} with merge output",
                input.display()
            );
        }
    }
    Ok(())
}

/// Absolute form of `path` with symlinks and `..` resolved.
///
/// A file that does not exist yet is resolved through its parent directory.
fn resolve(path: &Path) -> Result<PathBuf> {
    if path.exists() {
        return Ok(path.canonicalize()?);
    }
    let Some(name) = path.file_name() else {
        bail!("{} has no file name", path.display());
    };
    let parent = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => std::env::current_dir()?,
    };
    let parent = if parent.exists() {
        parent.canonicalize()?
    } else {
        parent
    };
    Ok(parent.join(name))
}

#[cfg(test)]
mod tests {
    use super::reject_input_overwrite;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn output_naming_an_input_is_rejected() {
        let dir = tempdir().expect("tempdir");
        let base = dir.path().join("base.yaml");
        fs::write(&base, "kind: x\n").expect("write");
        let other = dir.path().join("other.yaml");

        let err = reject_input_overwrite(&base, &[&other, &base]).expect_err("same path");
        assert!(err.to_string().contains("refusing to overwrite"));
    }

    #[test]
    fn dotted_output_path_is_resolved_before_comparing() {
        let dir = tempdir().expect("tempdir");
        fs::create_dir(dir.path().join("sub")).expect("mkdir");
        let base = dir.path().join("base.yaml");
        fs::write(&base, "kind: x\n").expect("write");

        let dotted = dir.path().join("sub").join("..").join("base.yaml");
        assert!(reject_input_overwrite(&dotted, &[&base]).is_err());
    }

    #[test]
    fn new_output_file_is_accepted() {
        let dir = tempdir().expect("tempdir");
        let base = dir.path().join("base.yaml");
        fs::write(&base, "kind: x\n").expect("write");
        let output = dir.path().join("merged.yaml");
        reject_input_overwrite(&output, &[&base]).expect("distinct path");
    }
}
