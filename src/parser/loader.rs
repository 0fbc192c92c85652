//! Directory-level file discovery and parsing.
//!
//! Only the given directory is scanned; module directories are visited by the
//! module loader and the evaluator, never recursively from here.

use super::json::parse_json_body;
use crate::error::{ErrorCollector, Result, TfResolveError};
use crate::types::{ParsedFile, Syntax};

use hcl::Body;
use std::path::{Path, PathBuf};

/// The files of one directory that parsed successfully.
#[derive(Debug, Default)]
pub struct LoadedDirectory {
    /// Successfully parsed files, in directory-listing order
    pub files: Vec<ParsedFile>,
    /// Errors of the files that were skipped
    pub skipped: ErrorCollector,
}

/// Parse every configuration file of a directory.
///
/// Files are parsed in file-name order. A file that fails to parse is skipped
/// with a warning unless `strict` is set, in which case its error is returned.
///
/// # Errors
///
/// Returns an error if the directory cannot be listed, or on the first file
/// error when `strict` is set.
pub async fn load_directory(path: &Path, strict: bool) -> Result<LoadedDirectory> {
    let mut entries = tokio::fs::read_dir(path).await.map_err(|e| {
        crate::err!(DirectoryRead {
            path: path.to_path_buf(),
            source: e,
        })
    })?;

    let mut candidates: Vec<(PathBuf, Syntax)> = Vec::new();
    loop {
        let entry = match entries.next_entry().await {
            Ok(Some(entry)) => entry,
            Ok(None) => break,
            Err(e) => {
                return Err(crate::err!(DirectoryRead {
                    path: path.to_path_buf(),
                    source: e,
                }))
            }
        };

        let file_path = entry.path();
        match entry.file_type().await {
            Ok(file_type) if file_type.is_dir() => continue,
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(file = %file_path.display(), error = %e, "Failed to read directory entry");
                continue;
            }
        }

        if is_ignored_file(&file_path) {
            tracing::debug!(file = %file_path.display(), "Skipping ignored file");
            continue;
        }

        // this is not a file we can parse
        let Some(syntax) = Syntax::from_path(&file_path) else {
            continue;
        };
        candidates.push((file_path, syntax));
    }
    candidates.sort_by(|a, b| a.0.file_name().cmp(&b.0.file_name()));

    let mut loaded = LoadedDirectory::default();
    for (file_path, syntax) in candidates {
        tracing::debug!(file = %file_path.display(), ?syntax, "Parsing file");

        match parse_file(&file_path, syntax).await {
            Ok(parsed) => loaded.files.push(parsed),
            Err(e) => {
                if strict {
                    return Err(e);
                }
                tracing::warn!(file = %file_path.display(), "skipping file, hcl parsing err: {}", e);
                loaded.skipped.add(e);
            }
        }
    }

    tracing::debug!(
        directory = %path.display(),
        files = loaded.files.len(),
        skipped = loaded.skipped.count(),
        "Loaded directory"
    );

    Ok(loaded)
}

/// Read and parse a single configuration file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or is not valid in its syntax.
pub async fn parse_file(path: &Path, syntax: Syntax) -> Result<ParsedFile> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| TfResolveError::io(path, e, file!(), line!()))?;

    let body = parse_content(&content, path, syntax)?;

    Ok(ParsedFile {
        path: path.to_path_buf(),
        syntax,
        body,
    })
}

/// Parse file content in the given syntax.
pub(crate) fn parse_content(content: &str, path: &Path, syntax: Syntax) -> Result<Body> {
    match syntax {
        Syntax::Native => hcl::parse(content).map_err(|e| {
            crate::err!(HclParse {
                file: path.to_path_buf(),
                message: e.to_string(),
                line: None,
                column: None,
            })
        }),
        Syntax::Json => parse_json_body(content, path),
    }
}

/// Editor backups and hidden files are never part of a configuration.
fn is_ignored_file(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return true;
    };
    name.starts_with('.') || name.ends_with('~') || (name.starts_with('#') && name.ends_with('#'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const VALID: &str = r#"
variable "region" {
  default = "us-east-1"
}

resource "aws_instance" "web" {
  ami = "ami-123"
}
"#;

    fn write(dir: &TempDir, name: &str, content: &str) {
        fs::write(dir.path().join(name), content).unwrap();
    }

    #[tokio::test]
    async fn test_only_recognized_suffixes_are_parsed() {
        let dir = TempDir::new().unwrap();
        write(&dir, "main.tf", VALID);
        write(&dir, "extra.tf.json", r#"{"variable": {"size": {"default": "small"}}}"#);
        write(&dir, "README.md", "# not terraform");
        write(&dir, "terraform.tfvars", "region = \"eu-west-1\"");

        let loaded = load_directory(dir.path(), false).await.unwrap();
        let names: Vec<_> = loaded
            .files
            .iter()
            .map(|f| f.path.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["extra.tf.json", "main.tf"]);
        assert_eq!(loaded.files[0].syntax, Syntax::Json);
        assert_eq!(loaded.files[1].syntax, Syntax::Native);
    }

    #[tokio::test]
    async fn test_subdirectories_are_not_scanned() {
        let dir = TempDir::new().unwrap();
        write(&dir, "main.tf", VALID);
        fs::create_dir(dir.path().join("modules")).unwrap();
        fs::write(dir.path().join("modules").join("nested.tf"), VALID).unwrap();

        let loaded = load_directory(dir.path(), false).await.unwrap();
        assert_eq!(loaded.files.len(), 1);
    }

    #[tokio::test]
    async fn test_broken_file_is_skipped_when_not_strict() {
        let dir = TempDir::new().unwrap();
        write(&dir, "a_broken.tf", "resource \"x\" \"y\" {");
        write(&dir, "main.tf", VALID);

        let loaded = load_directory(dir.path(), false).await.unwrap();
        assert_eq!(loaded.files.len(), 1);
        assert_eq!(loaded.skipped.count(), 1);
        assert!(loaded.skipped.iter().all(TfResolveError::is_recoverable));
    }

    #[tokio::test]
    async fn test_broken_file_aborts_when_strict() {
        let dir = TempDir::new().unwrap();
        write(&dir, "a_broken.tf", "resource \"x\" \"y\" {");
        write(&dir, "main.tf", VALID);

        let err = load_directory(dir.path(), true).await.unwrap_err();
        assert!(matches!(err, TfResolveError::HclParse { .. }));
    }

    #[tokio::test]
    async fn test_missing_directory_is_fatal() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("does-not-exist");

        let err = load_directory(&missing, false).await.unwrap_err();
        assert!(matches!(err, TfResolveError::DirectoryRead { .. }));
    }

    #[tokio::test]
    async fn test_empty_directory_is_not_an_error() {
        let dir = TempDir::new().unwrap();
        let loaded = load_directory(dir.path(), true).await.unwrap();
        assert!(loaded.files.is_empty());
        assert!(loaded.skipped.is_empty());
    }

    #[test]
    fn test_is_ignored_file() {
        assert!(is_ignored_file(Path::new(".hidden.tf")));
        assert!(is_ignored_file(Path::new("main.tf~")));
        assert!(is_ignored_file(Path::new("#main.tf#")));
        assert!(!is_ignored_file(Path::new("main.tf")));
    }
}
