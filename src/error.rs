//! Error types for tfresolve.
//!
//! This module defines the error hierarchy using `thiserror`. Every variant
//! records where in this crate it was raised, so a failure reported by
//! `Parser::parse_directory` can be traced back to the pipeline stage that
//! produced it.
//!
//! # Error Categories
//!
//! - **Fatal**: unreadable root directory, no valid configuration, module
//!   loading, explicit variable files, remote variables, evaluation, working
//!   directory lookup
//! - **Recoverable**: a single file's parse or block extraction error, a
//!   default variable file that fails to load
//!
//! # Example
//!
//! ```rust
//! use tfresolve::error::{TfResolveError, Result};
//!
//! fn read_var_file(path: &str) -> Result<String> {
//!     std::fs::read_to_string(path)
//!         .map_err(|e| TfResolveError::io(path, e, file!(), line!()))
//! }
//! ```

use std::path::PathBuf;
use thiserror::Error;

/// Macro to create errors with automatic source location tracking.
///
/// Usage:
/// ```ignore
/// return Err(err!(ModuleLoad { message: "boom".to_string() }));
/// ```
#[macro_export]
macro_rules! err {
    ($variant:ident { $($field:ident: $value:expr),* $(,)? }) => {
        $crate::error::TfResolveError::$variant {
            $($field: $value,)*
            src_path: file!(),
            src_line: line!(),
        }
    };
}

/// A specialized Result type for tfresolve operations.
pub type Result<T> = std::result::Result<T, TfResolveError>;

/// The main error type for tfresolve.
#[derive(Error, Debug)]
pub enum TfResolveError {
    // =========================================================================
    // I/O and File System Errors
    // =========================================================================
    /// I/O error with path context.
    #[error("I/O error at '{path}' ({src_path}:{src_line}): {source}")]
    Io {
        /// The path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
        /// Source file path
        src_path: &'static str,
        /// Source line number
        src_line: u32,
    },

    /// The configuration directory itself could not be listed.
    #[error("Could not read directory '{path}' ({src_path}:{src_line}): {source}")]
    DirectoryRead {
        /// The directory that failed to list
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
        /// Source file path
        src_path: &'static str,
        /// Source line number
        src_line: u32,
    },

    /// The current working directory could not be determined.
    #[error("Error could not evaluate current working directory ({src_path}:{src_line}): {source}")]
    WorkingDirectory {
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
        /// Source file path
        src_path: &'static str,
        /// Source line number
        src_line: u32,
    },

    // =========================================================================
    // HCL Parsing Errors
    // =========================================================================
    /// HCL (native or JSON syntax) parsing error.
    #[error("Failed to parse HCL in '{file}' \n\t({src_path}:{src_line}): {message}")]
    HclParse {
        /// The file being parsed
        file: PathBuf,
        /// Error message
        message: String,
        /// Line number (if available)
        line: Option<usize>,
        /// Column number (if available)
        column: Option<usize>,
        /// Source file path
        src_path: &'static str,
        /// Source line number
        src_line: u32,
    },

    /// A parsed file does not match the configuration schema.
    #[error("Invalid HCL structure in '{file}' ({src_path}:{src_line}): {message}")]
    HclStructure {
        /// The file with the invalid structure
        file: PathBuf,
        /// Description of the structural issue
        message: String,
        /// Source file path
        src_path: &'static str,
        /// Source line number
        src_line: u32,
    },

    /// No blocks survived loading and construction.
    #[error("No valid terraform files found given path '{path}', try a different directory ({src_path}:{src_line})")]
    NoConfiguration {
        /// The directory that was parsed
        path: PathBuf,
        /// Source file path
        src_path: &'static str,
        /// Source line number
        src_line: u32,
    },

    // =========================================================================
    // Variable Errors
    // =========================================================================
    /// A variable file could not be read or parsed.
    #[error("Failed to load the tfvars from '{path}' ({src_path}:{src_line}): {message}")]
    VarFile {
        /// The variable file
        path: PathBuf,
        /// Error message
        message: String,
        /// Source file path
        src_path: &'static str,
        /// Source line number
        src_line: u32,
    },

    /// Remote (Terraform Cloud/Enterprise) variables could not be loaded.
    #[error("Could not load vars from Terraform Cloud ({src_path}:{src_line}): {message}")]
    RemoteVariables {
        /// Error message
        message: String,
        /// Source file path
        src_path: &'static str,
        /// Source line number
        src_line: u32,
    },

    /// HTTP request error.
    #[error("HTTP request failed ({src_path}:{src_line}): {message}")]
    Http {
        /// Error message
        message: String,
        /// HTTP status code (if available)
        status_code: Option<u16>,
        /// Source file path
        src_path: &'static str,
        /// Source line number
        src_line: u32,
    },

    // =========================================================================
    // Module and Evaluation Errors
    // =========================================================================
    /// The module loader failed.
    #[error("Error loading Terraform modules ({src_path}:{src_line}): {message}")]
    ModuleLoad {
        /// Error message
        message: String,
        /// Source file path
        src_path: &'static str,
        /// Source line number
        src_line: u32,
    },

    /// The evaluator failed.
    #[error("Error evaluating module '{module}' ({src_path}:{src_line}): {message}")]
    Evaluation {
        /// The module address being evaluated ("" for the root module)
        module: String,
        /// Error message
        message: String,
        /// Source file path
        src_path: &'static str,
        /// Source line number
        src_line: u32,
    },

    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Configuration parsing error.
    #[error("Failed to parse configuration ({src_path}:{src_line}): {message}")]
    ConfigParse {
        /// Error message
        message: String,
        /// The underlying error (if any)
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
        /// Source file path
        src_path: &'static str,
        /// Source line number
        src_line: u32,
    },

    /// Invalid configuration value.
    #[error("Invalid configuration value for '{key}' ({src_path}:{src_line}): {message}")]
    ConfigValue {
        /// The configuration key
        key: String,
        /// Error message
        message: String,
        /// Source file path
        src_path: &'static str,
        /// Source line number
        src_line: u32,
    },

    // =========================================================================
    // Generic Errors
    // =========================================================================
    /// Internal error (should not happen in normal operation).
    #[error("Internal error ({src_path}:{src_line}): {message}")]
    Internal {
        /// Error message
        message: String,
        /// Source file path
        src_path: &'static str,
        /// Source line number
        src_line: u32,
    },
}

impl TfResolveError {
    /// Creates an `Io` error.
    #[must_use]
    pub fn io(
        path: impl Into<PathBuf>,
        source: std::io::Error,
        src_path: &'static str,
        src_line: u32,
    ) -> Self {
        Self::Io { path: path.into(), source, src_path, src_line }
    }

    /// Creates a `ConfigParse` error.
    #[must_use]
    pub fn config_parse(
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
        src_path: &'static str,
        src_line: u32,
    ) -> Self {
        Self::ConfigParse { message, source, src_path, src_line }
    }

    /// Determines if the error only affects a single file and parsing may
    /// continue with the remaining ones.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::HclParse { .. }
                | Self::HclStructure { .. }
                | Self::VarFile { .. }
                | Self::Io { .. }
        )
    }

    /// Returns the appropriate exit code for the error.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Io { source, .. } if source.kind() == std::io::ErrorKind::PermissionDenied => 13,
            Self::DirectoryRead { .. } => 15,
            Self::NoConfiguration { .. } => 16,
            Self::HclParse { .. } | Self::HclStructure { .. } => 17,
            Self::ConfigParse { .. } => 18,
            Self::ConfigValue { .. } => 19,
            Self::VarFile { .. } => 20,
            Self::RemoteVariables { .. } | Self::Http { .. } => 22,
            Self::ModuleLoad { .. } => 23,
            Self::Evaluation { .. } => 24,
            _ => 1,
        }
    }
}

/// Extension trait for `Result` to add context to errors.
pub trait ResultExt<T, E> {
    /// Converts a general error into a `ConfigParse` error with context.
    fn to_config_parse_error(self, message: String) -> Result<T>;
}

impl<T, E> ResultExt<T, E> for std::result::Result<T, E>
where
    E: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    fn to_config_parse_error(self, message: String) -> Result<T> {
        self.map_err(|e| TfResolveError::config_parse(message, Some(e.into()), file!(), line!()))
    }
}

impl From<serde_json::Error> for TfResolveError {
    fn from(source: serde_json::Error) -> Self {
        Self::Internal {
            message: format!("JSON serialization/deserialization error: {source}"),
            src_path: file!(),
            src_line: line!(),
        }
    }
}

/// A utility for collecting recoverable errors while loading a directory.
#[derive(Debug, Default)]
pub struct ErrorCollector {
    errors: Vec<TfResolveError>,
}

impl ErrorCollector {
    /// Create a new error collector.
    #[must_use]
    pub fn new() -> Self {
        Self { errors: Vec::new() }
    }

    /// Add an error to the collection.
    pub fn add(&mut self, error: TfResolveError) {
        self.errors.push(error);
    }

    /// Get the number of collected errors.
    #[must_use]
    pub fn count(&self) -> usize {
        self.errors.len()
    }

    /// Check if there are any errors.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Iterate over the collected errors.
    pub fn iter(&self) -> impl Iterator<Item = &TfResolveError> {
        self.errors.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_error(name: &str) -> TfResolveError {
        crate::err!(HclParse {
            file: PathBuf::from(name),
            message: "unexpected token".to_string(),
            line: None,
            column: None,
        })
    }

    #[test]
    fn test_recoverable_classification() {
        assert!(parse_error("a.tf").is_recoverable());
        let fatal = crate::err!(ModuleLoad { message: "network down".to_string() });
        assert!(!fatal.is_recoverable());
        assert_eq!(fatal.exit_code(), 23);
    }

    #[test]
    fn test_module_load_message_has_stage_prefix() {
        let err = crate::err!(ModuleLoad { message: "network down".to_string() });
        let rendered = err.to_string();
        assert!(rendered.starts_with("Error loading Terraform modules"));
        assert!(rendered.ends_with("network down"));
    }

    #[test]
    fn test_error_collector() {
        let mut collector = ErrorCollector::new();
        assert!(collector.is_empty());
        collector.add(parse_error("a.tf"));
        assert_eq!(collector.count(), 1);
        assert!(collector.iter().all(TfResolveError::is_recoverable));
    }

    #[test]
    fn test_to_config_parse_error_keeps_source() {
        let result: std::result::Result<(), std::io::Error> =
            Err(std::io::Error::new(std::io::ErrorKind::InvalidData, "bad bytes"));
        let err = result.to_config_parse_error("invalid configuration".to_string()).unwrap_err();
        assert_eq!(err.exit_code(), 18);
        assert!(std::error::Error::source(&err).is_some_and(|s| s.to_string().contains("bad bytes")));
    }
}
