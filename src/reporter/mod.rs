//! Report generation module.
//!
//! Renders the outcome of parsing one or more directories:
//! - JSON: the evaluated module trees, machine-readable
//! - Text: an indented tree of modules and block addresses for the terminal
//!
//! # Example
//!
//! ```rust,no_run
//! use tfresolve::reporter::{OutputFormat, ProjectReport, Reporter};
//! use tfresolve::Config;
//!
//! let config = Config::default();
//! let reporter = Reporter::new(&config);
//!
//! let projects: Vec<ProjectReport> = Vec::new();
//! let text = reporter.generate(&projects, OutputFormat::Text).unwrap();
//! ```

mod json;
mod text;

use crate::config::Config;
use crate::error::{Result, TfResolveError};
use crate::types::Module;
use serde::Serialize;
use std::path::PathBuf;

pub use json::JsonReporter;
pub use text::TextReporter;

/// Output format of a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Indented module tree
    #[default]
    Text,
    /// JSON document, one entry per path
    Json,
}

/// The outcome of parsing one directory.
#[derive(Debug, Serialize)]
pub struct ProjectReport {
    /// The parsed directory
    pub path: PathBuf,
    /// Warnings emitted while parsing
    pub warnings: Vec<String>,
    /// The evaluated root module, on success
    #[serde(skip_serializing_if = "Option::is_none")]
    pub module: Option<Module>,
    /// The error message, on failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProjectReport {
    /// Build a report from a parse result.
    #[must_use]
    pub fn new(path: PathBuf, warnings: Vec<String>, result: &std::result::Result<Module, TfResolveError>) -> Self {
        let (module, error) = match result {
            Ok(module) => (Some(module.clone()), None),
            Err(e) => (None, Some(e.to_string())),
        };
        Self {
            path,
            warnings,
            module,
            error,
        }
    }

    /// Returns true if parsing failed.
    #[must_use]
    pub const fn failed(&self) -> bool {
        self.error.is_some()
    }
}

/// Report generator that supports multiple output formats.
pub struct Reporter {
    config: Config,
}

impl Reporter {
    /// Create a new reporter with the given configuration.
    #[must_use]
    pub fn new(config: &Config) -> Self {
        Self {
            config: config.clone(),
        }
    }

    /// Generate a report in the specified format.
    ///
    /// # Errors
    ///
    /// Returns an error if report generation fails.
    pub fn generate(&self, projects: &[ProjectReport], format: OutputFormat) -> Result<String> {
        match format {
            OutputFormat::Json => JsonReporter::new(&self.config).generate(projects),
            OutputFormat::Text => TextReporter::new(&self.config).generate(projects),
        }
    }
}

/// Trait for report generators.
pub trait ReportGenerator {
    /// Generate a report from the parsed projects.
    ///
    /// # Errors
    ///
    /// Returns an error if generation fails.
    fn generate(&self, projects: &[ProjectReport]) -> Result<String>;
}
