//! Command-line interface module.
//!
//! This module defines the CLI structure using Clap, including
//! all commands, arguments, and options.
//!
//! # Commands
//!
//! - `parse`: Parse configuration directories into their evaluated module trees
//! - `init`: Create an example configuration file
//! - `validate`: Validate a configuration file
//!
//! # Example Usage
//!
//! ```bash
//! # Parse one project
//! tfresolve parse ./terraform
//!
//! # Parse several projects with extra variables
//! tfresolve parse ./staging ./prod --var-file common.tfvars --var region=eu-west-1
//!
//! # Write the JSON tree to a file
//! tfresolve parse ./terraform --format json --output tree.json
//!
//! # Initialize configuration
//! tfresolve init
//!
//! # Validate configuration
//! tfresolve validate tfresolve.yaml
//! ```

use crate::reporter::OutputFormat;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// tfresolve - offline Terraform/OpenTofu configuration loader.
#[derive(Parser, Debug)]
#[command(
    name = "tfresolve",
    author,
    version,
    about = "Offline Terraform/OpenTofu configuration loader",
    long_about = "tfresolve parses Terraform/OpenTofu configuration directories, resolves \
                  input variables from every supported source in precedence order, locates \
                  module calls and evaluates the configuration into a module tree."
)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true, env = "TFRESOLVE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Parse configuration directories
    #[command(visible_alias = "p")]
    Parse(ParseArgs),

    /// Create an example configuration file
    Init,

    /// Validate a configuration file
    Validate(ValidateArgs),
}

/// Arguments for the parse command.
#[derive(Args, Debug, Default)]
pub struct ParseArgs {
    /// Configuration directories to parse
    #[arg(value_name = "PATH", required = true)]
    pub paths: Vec<PathBuf>,

    /// Variable file, relative to each parsed directory (repeatable)
    #[arg(long = "var-file", value_name = "FILE")]
    pub var_files: Vec<PathBuf>,

    /// Input variable as name=value (repeatable)
    #[arg(long = "var", value_name = "NAME=VALUE")]
    pub vars: Vec<String>,

    /// Fail on the first file that cannot be parsed
    #[arg(long)]
    pub strict: bool,

    /// Workspace exposed as terraform.workspace
    #[arg(short, long, value_name = "NAME")]
    pub workspace: Option<String>,

    /// Read TF_VAR_* variables from the environment
    #[arg(long)]
    pub env_vars: bool,

    /// Terraform Cloud / Enterprise host to load workspace variables from
    #[arg(long, value_name = "URL")]
    pub remote_host: Option<String>,

    /// API token for the remote host
    #[arg(long, env = "TFRESOLVE_REMOTE_TOKEN", hide_env_values = true)]
    pub remote_token: Option<String>,

    /// Only warn when remote variables cannot be loaded
    #[arg(long)]
    pub remote_advisory: bool,

    /// Output format
    #[arg(short, long, default_value = "text", value_enum)]
    pub format: OutputFormat,

    /// Output file path (stdout if not specified)
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Show progress spinners (single path only)
    #[arg(long)]
    pub progress: bool,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,
}

/// Arguments for the validate command.
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(value_name = "FILE", default_value = "tfresolve.yaml")]
    pub config: PathBuf,
}
