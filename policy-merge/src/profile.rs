use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

/// Validation rules for merged documents, keyed by document `kind`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ValidationProfile {
    /// Kinds accepted at all. Empty accepts any kind.
    #[serde(default)]
    pub allowed_kinds: Vec<String>,
    /// Dot-separated field paths every document must carry.
    #[serde(default)]
    pub required_fields: Vec<String>,
    #[serde(default)]
    pub kinds: BTreeMap<String, KindProfile>,
}

/// Extra rules for one document kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct KindProfile {
    #[serde(default)]
    pub required_fields: Vec<String>,
    /// At least one of these paths must be present.
    #[serde(default)]
    pub required_any_fields: Vec<String>,
    #[serde(default)]
    pub allowed_modes: Vec<String>,
}

impl ValidationProfile {
    pub fn kind(&self, kind: &str) -> Option<&KindProfile> {
        self.kinds.get(kind)
    }
}

/// Errors returned when loading an override profile.
#[derive(Debug, Error)]
pub enum ProfileLoadError {
    #[error("failed to read profile {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse profile {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },
}

/// Load the validation profile, preferring `<profiles_dir>/default.toml`.
///
/// Returns the profile and where it came from: `embedded` or `file:<path>`.
pub fn load_profile_with_source(
    profiles_dir: Option<&Path>,
) -> Result<(ValidationProfile, String), ProfileLoadError> {
    if let Some(dir) = profiles_dir {
        let path = profile_path(dir);
        let profile = load_profile_file(&path)?;
        return Ok((profile, format!("file:{}", path.display())));
    }
    Ok((default_profile(), "embedded".to_string()))
}

/// Built-in profile.
pub fn default_profile() -> ValidationProfile {
    let embedded = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/profiles/default.toml"));
    match parse_profile(embedded, "embedded profile".to_string()) {
        Ok(profile) => profile,
        Err(e) => {
            tracing::warn!(error = %e, "embedded profile is invalid, using an empty profile");
            ValidationProfile::default()
        }
    }
}

fn profile_path(dir: &Path) -> PathBuf {
    dir.join("default.toml")
}

fn load_profile_file(path: &Path) -> Result<ValidationProfile, ProfileLoadError> {
    let raw = fs::read_to_string(path).map_err(|source| ProfileLoadError::Io {
        path: path.display().to_string(),
        source,
    })?;
    parse_profile(&raw, path.display().to_string())
}

fn parse_profile(raw: &str, path: String) -> Result<ValidationProfile, ProfileLoadError> {
    toml::from_str(raw).map_err(|source| ProfileLoadError::Parse { path, source })
}

#[cfg(test)]
mod tests {
    use super::{default_profile, load_profile_with_source, ProfileLoadError};
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn embedded_profile_loads() {
        let profile = default_profile();
        assert!(profile.allowed_kinds.iter().any(|k| k == "SpyderbatPolicy"));
        let policy = profile.kind("SpyderbatPolicy").expect("policy rules");
        assert_eq!(policy.allowed_modes, vec!["audit", "enforce"]);
    }

    #[test]
    fn profile_source_reports_embedded() {
        let (_, source) = load_profile_with_source(None).expect("embedded profile");
        assert_eq!(source, "embedded");
    }

    #[test]
    fn profile_source_reports_override_dir() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("default.toml");
        fs::write(
            &path,
            r#"
required_fields = ["spec"]

[kinds.SpyderbatPolicy]
allowed_modes = ["audit"]
"#,
        )
        .expect("write profile");

        let (profile, source) = load_profile_with_source(Some(dir.path())).expect("override");
        assert_eq!(source, format!("file:{}", path.display()));
        assert!(profile.allowed_kinds.is_empty());
        assert_eq!(profile.required_fields, vec!["spec"]);
    }

    #[test]
    fn override_dir_errors_are_reported() {
        let dir = tempdir().expect("tempdir");
        let missing = load_profile_with_source(Some(dir.path())).expect_err("missing file");
        assert!(matches!(missing, ProfileLoadError::Io { .. }));

        fs::write(dir.path().join("default.toml"), "required_fields = 3").expect("write");
        let broken = load_profile_with_source(Some(dir.path())).expect_err("bad toml");
        assert!(matches!(broken, ProfileLoadError::Parse { .. }));
    }
}
