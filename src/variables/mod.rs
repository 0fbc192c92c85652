//! Input variable resolution.
//!
//! Variables are merged from six sources, each one overlaying the previous:
//!
//! 1. `TF_VAR_*` variables of the process environment
//! 2. `TF_VAR_*` entries of the project-scoped environment map
//! 3. remote variables (Terraform Cloud / Enterprise)
//! 4. `terraform.tfvars`, `terraform.tfvars.json` and `*.auto.tfvars(.json)`
//! 5. explicit variable files
//! 6. direct input variables (`name=value` assignments, then the input map)
//!
//! Sources 1, 2 and 6 are fixed when the parser is built, the others are
//! read on every resolution.

mod remote;
mod tfvars;

pub use remote::{RemoteVariablesLoader, TerraformCloudLoader};
pub use tfvars::load_var_file;

use crate::config::RemoteFailurePolicy;
use crate::error::Result;
use crate::types::{Block, VariableMapping};

use glob::Pattern;
use hcl::Value;
use std::collections::HashMap;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};

/// Prefix of environment variables holding input variables.
pub const ENV_PREFIX: &str = "TF_VAR_";

/// The primary variable file of a directory.
pub const PRIMARY_VAR_FILE: &str = "terraform.tfvars";

/// Patterns of variable files loaded automatically, after the primary one.
pub const AUTO_VAR_FILE_PATTERNS: [&str; 2] = ["*.auto.tfvars", "*.auto.tfvars.json"];

static AUTO_VAR_FILES: LazyLock<Vec<Pattern>> = LazyLock::new(|| {
    AUTO_VAR_FILE_PATTERNS
        .iter()
        .filter_map(|p| Pattern::new(p).ok())
        .collect()
});

/// The variable sources of one parser.
pub struct VariableSources {
    /// Sources 1 and 2, already merged
    pub env: VariableMapping,
    /// Source 3
    pub remote: Option<Arc<dyn RemoteVariablesLoader>>,
    /// Whether a failure of source 3 aborts resolution
    pub remote_failure: RemoteFailurePolicy,
    /// Source 4, in load order
    pub default_var_files: Vec<PathBuf>,
    /// Source 6
    pub input: VariableMapping,
}

impl VariableSources {
    /// Merge every source.
    ///
    /// # Errors
    ///
    /// Returns an error if the remote loader fails (under the fatal policy) or
    /// if an explicit variable file cannot be loaded.
    pub async fn resolve(&self, blocks: &[Block], var_files: &[PathBuf]) -> Result<VariableMapping> {
        let mut mapping = VariableMapping::new();
        self.resolve_into(blocks, var_files, &mut mapping).await?;
        Ok(mapping)
    }

    /// Merge every source into `mapping`. On error, `mapping` holds the
    /// sources merged before the failing one.
    ///
    /// # Errors
    ///
    /// Same as [`VariableSources::resolve`].
    pub async fn resolve_into(
        &self,
        blocks: &[Block],
        var_files: &[PathBuf],
        mapping: &mut VariableMapping,
    ) -> Result<()> {
        mapping.overlay(self.env.clone());

        if let Some(loader) = &self.remote {
            match loader.load(blocks).await {
                Ok(remote) => {
                    tracing::debug!(count = remote.len(), "Loaded remote variables");
                    mapping.overlay(remote);
                }
                Err(e) => {
                    tracing::warn!("could not load vars from Terraform Cloud: {}", e);
                    if self.remote_failure == RemoteFailurePolicy::Fatal {
                        return Err(e);
                    }
                }
            }
        }

        for path in &self.default_var_files {
            match load_var_file(path).await {
                Ok(vars) => mapping.overlay(vars),
                Err(e) => {
                    tracing::warn!(file = %path.display(), "could not load vars from auto var file err: {}", e);
                }
            }
        }

        for path in var_files {
            mapping.overlay(load_var_file(path).await?);
        }

        mapping.overlay(self.input.clone());

        Ok(())
    }
}

/// Collect `TF_VAR_*` variables from the process environment, then overlay
/// the matching entries of the project-scoped map.
///
/// Values are kept verbatim as strings. Process entries whose name or value
/// is not valid UTF-8 are skipped.
pub fn collect_env_vars<I, K, V>(os_vars: I, project: &HashMap<String, String>) -> VariableMapping
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<OsStr>,
    V: AsRef<OsStr>,
{
    let mut mapping = VariableMapping::new();

    let strip = |key: &str| key.strip_prefix(ENV_PREFIX).filter(|name| !name.is_empty()).map(String::from);

    for (key, value) in os_vars {
        let Some(name) = key.as_ref().to_str().and_then(strip) else {
            continue;
        };
        match value.as_ref().to_str() {
            Some(value) => mapping.insert(name, value),
            None => tracing::debug!(variable = %name, "Skipping environment variable with a non UTF-8 value"),
        }
    }

    for (key, value) in project {
        if let Some(name) = strip(key) {
            mapping.insert(name, value.clone());
        }
    }

    mapping
}

/// Build the direct input source: `name=value` assignments in order, then
/// the input map. Assignments that do not split into exactly one name and
/// one value are ignored.
#[must_use]
pub fn collect_input_vars(assignments: &[String], input: &HashMap<String, String>) -> VariableMapping {
    let mut mapping = VariableMapping::new();

    for assignment in assignments {
        let pieces: Vec<&str> = assignment.split('=').collect();
        match pieces.as_slice() {
            [name, value] if !name.is_empty() => mapping.insert(*name, Value::from(*value)),
            _ => tracing::debug!(assignment = %assignment, "Ignoring malformed variable assignment"),
        }
    }

    for (name, value) in input {
        mapping.insert(name.clone(), Value::from(value.as_str()));
    }

    mapping
}

/// Find the default variable files of a directory: the primary file, its
/// JSON sibling, then the auto-loaded files in file-name order.
#[must_use]
pub fn discover_default_var_files(dir: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();

    let primary = dir.join(PRIMARY_VAR_FILE);
    let primary_json = dir.join(format!("{PRIMARY_VAR_FILE}.json"));
    for candidate in [primary, primary_json] {
        if candidate.is_file() {
            files.push(candidate);
        }
    }

    let Ok(entries) = std::fs::read_dir(dir) else {
        return files;
    };

    let mut auto: Vec<PathBuf> = entries
        .filter_map(std::result::Result::ok)
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| AUTO_VAR_FILES.iter().any(|p| p.matches(name)))
        })
        .collect();
    auto.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

    files.extend(auto);
    files
}

/// Resolve explicit variable files against the parsed directory, dropping
/// the ones that do not exist.
#[must_use]
pub fn validate_var_files(dir: &Path, var_files: &[PathBuf]) -> Vec<PathBuf> {
    var_files
        .iter()
        .filter_map(|file| {
            let path = if file.is_absolute() { file.clone() } else { dir.join(file) };
            if path.exists() {
                Some(path)
            } else {
                tracing::warn!("passed tfvar file does not exist at {}", path.display());
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TfResolveError;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::TempDir;
    use test_case::test_case;

    struct StaticRemote(std::result::Result<VariableMapping, String>);

    #[async_trait]
    impl RemoteVariablesLoader for StaticRemote {
        async fn load(&self, _blocks: &[Block]) -> Result<VariableMapping> {
            self.0
                .clone()
                .map_err(|e| crate::err!(RemoteVariables { message: e }))
        }
    }

    fn mapping(pairs: &[(&str, &str)]) -> VariableMapping {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), Value::from(*v)))
            .collect()
    }

    fn sources(dir: &Path) -> VariableSources {
        VariableSources {
            env: VariableMapping::new(),
            remote: None,
            remote_failure: RemoteFailurePolicy::Fatal,
            default_var_files: discover_default_var_files(dir),
            input: VariableMapping::new(),
        }
    }

    #[test]
    fn test_env_vars_project_overrides_os() {
        let os = vec![
            ("TF_VAR_region".to_string(), "us-east-1".to_string()),
            ("TF_VAR_size".to_string(), "small".to_string()),
            ("HOME".to_string(), "/root".to_string()),
            ("TF_VAR_".to_string(), "nameless".to_string()),
        ];
        let project = HashMap::from([
            ("TF_VAR_region".to_string(), "eu-west-1".to_string()),
            ("OTHER".to_string(), "ignored".to_string()),
        ]);

        let env = collect_env_vars(os, &project);
        assert_eq!(env, mapping(&[("region", "eu-west-1"), ("size", "small")]));
    }

    #[test]
    fn test_env_values_are_verbatim() {
        let os = vec![("TF_VAR_tags".to_string(), "a=b".to_string())];
        let env = collect_env_vars(os, &HashMap::new());
        assert_eq!(env.get("tags"), Some(&Value::from("a=b")));
    }

    #[cfg(unix)]
    #[test]
    fn test_non_utf8_environment_entries_are_skipped() {
        use std::ffi::OsString;
        use std::os::unix::ffi::OsStringExt;

        let os = vec![
            (OsString::from("UNRELATED_BINARY"), OsString::from_vec(vec![0xff, 0xfe])),
            (OsString::from_vec(b"TF_VAR_\xff".to_vec()), OsString::from("x")),
            (OsString::from("TF_VAR_blob"), OsString::from_vec(vec![0xff])),
            (OsString::from("TF_VAR_region"), OsString::from("us-east-1")),
        ];
        let env = collect_env_vars(os, &HashMap::new());
        assert_eq!(env, mapping(&[("region", "us-east-1")]));
    }

    #[test]
    fn test_process_environment_is_collected() {
        let env = collect_env_vars(std::env::vars_os(), &HashMap::new());
        assert!(env.iter().all(|(name, _)| !name.is_empty()));
    }

    #[test_case("region=eu-west-1", Some("eu-west-1") ; "valid")]
    #[test_case("region", None ; "no separator")]
    #[test_case("region=a=b", None ; "two separators")]
    #[test_case("=eu-west-1", None ; "empty name")]
    fn test_assignments(assignment: &str, expected: Option<&str>) {
        let input = collect_input_vars(&[assignment.to_string()], &HashMap::new());
        assert_eq!(input.get("region"), expected.map(Value::from).as_ref());
    }

    #[test]
    fn test_input_map_overrides_assignments() {
        let input = collect_input_vars(
            &["region=us-east-1".to_string(), "region=us-west-2".to_string()],
            &HashMap::from([("size".to_string(), "large".to_string())]),
        );
        assert_eq!(input, mapping(&[("region", "us-west-2"), ("size", "large")]));

        let input = collect_input_vars(
            &["region=us-east-1".to_string()],
            &HashMap::from([("region".to_string(), "eu-west-1".to_string())]),
        );
        assert_eq!(input.get("region"), Some(&Value::from("eu-west-1")));
    }

    #[test]
    fn test_default_var_files_order() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("b.auto.tfvars"), "").unwrap();
        fs::write(dir.path().join("a.auto.tfvars.json"), "{}").unwrap();
        fs::write(dir.path().join("terraform.tfvars.json"), "{}").unwrap();
        fs::write(dir.path().join("terraform.tfvars"), "").unwrap();
        fs::write(dir.path().join("prod.tfvars"), "").unwrap();

        let names: Vec<_> = discover_default_var_files(dir.path())
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(
            names,
            vec!["terraform.tfvars", "terraform.tfvars.json", "a.auto.tfvars.json", "b.auto.tfvars"]
        );
    }

    #[test]
    fn test_missing_var_files_are_dropped() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("prod.tfvars"), "").unwrap();

        let kept = validate_var_files(
            dir.path(),
            &[PathBuf::from("prod.tfvars"), PathBuf::from("missing.tfvars")],
        );
        assert_eq!(kept, vec![dir.path().join("prod.tfvars")]);
    }

    #[tokio::test]
    async fn test_precedence_across_sources() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("terraform.tfvars"), "a = \"primary\"\nb = \"primary\"\nc = \"primary\"").unwrap();
        fs::write(dir.path().join("x.auto.tfvars"), "b = \"auto\"\nc = \"auto\"").unwrap();
        fs::write(dir.path().join("prod.tfvars"), "c = \"explicit\"\nd = \"explicit\"").unwrap();

        let mut sources = sources(dir.path());
        sources.env = mapping(&[("a", "env"), ("e", "env"), ("f", "env"), ("g", "env")]);
        sources.remote = Some(Arc::new(StaticRemote(Ok(mapping(&[("f", "remote"), ("g", "remote")])))));
        sources.input = mapping(&[("d", "input"), ("g", "input")]);

        let resolved = sources
            .resolve(&[], &[dir.path().join("prod.tfvars")])
            .await
            .unwrap();

        assert_eq!(
            resolved,
            mapping(&[
                ("a", "primary"),
                ("b", "auto"),
                ("c", "explicit"),
                ("d", "input"),
                ("e", "env"),
                ("f", "remote"),
                ("g", "input"),
            ])
        );
    }

    #[tokio::test]
    async fn test_resolution_is_deterministic() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("terraform.tfvars"), "region = \"us-east-1\"").unwrap();
        let sources = sources(dir.path());

        let first = sources.resolve(&[], &[]).await.unwrap();
        let second = sources.resolve(&[], &[]).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_broken_default_file_is_skipped() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("terraform.tfvars"), "region = \"us-east-1\"").unwrap();
        fs::write(dir.path().join("broken.auto.tfvars"), "region = {").unwrap();

        let resolved = sources(dir.path()).resolve(&[], &[]).await.unwrap();
        assert_eq!(resolved.get("region"), Some(&Value::from("us-east-1")));
    }

    #[tokio::test]
    async fn test_broken_explicit_file_is_fatal_and_keeps_partial_mapping() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("terraform.tfvars"), "region = \"us-east-1\"").unwrap();
        fs::write(dir.path().join("broken.tfvars"), "region = {").unwrap();

        let mut partial = VariableMapping::new();
        let err = sources(dir.path())
            .resolve_into(&[], &[dir.path().join("broken.tfvars")], &mut partial)
            .await
            .unwrap_err();

        assert!(matches!(err, TfResolveError::VarFile { .. }));
        assert_eq!(partial.get("region"), Some(&Value::from("us-east-1")));
    }

    #[tokio::test]
    async fn test_remote_failure_policy() {
        let dir = TempDir::new().unwrap();
        let mut sources = sources(dir.path());
        sources.env = mapping(&[("region", "us-east-1")]);
        sources.input = mapping(&[("size", "large")]);
        sources.remote = Some(Arc::new(StaticRemote(Err("unauthorized".to_string()))));

        let mut partial = VariableMapping::new();
        let err = sources.resolve_into(&[], &[], &mut partial).await.unwrap_err();
        assert!(matches!(err, TfResolveError::RemoteVariables { .. }));
        assert_eq!(partial, mapping(&[("region", "us-east-1")]));

        sources.remote_failure = RemoteFailurePolicy::Advisory;
        let resolved = sources.resolve(&[], &[]).await.unwrap();
        assert_eq!(resolved, mapping(&[("region", "us-east-1"), ("size", "large")]));
    }
}
