//! Configuration for tfresolve.
//!
//! [`ParserOptions`] configures a single [`crate::parser::Parser`]. The binary
//! additionally reads a [`Config`] file (`tfresolve.yaml`) wrapping the parser
//! options with output settings, and merges its command-line flags on top.
//!
//! # Configuration File Format
//!
//! ```yaml
//! # tfresolve.yaml
//! parser:
//!   var_files:
//!     - env/prod.tfvars
//!   strict: false
//!   workspace: prod
//!   env_vars: {}          # enables TF_VAR_* seeding
//!   var_assignments:
//!     - region=eu-west-1
//!   remote:
//!     host: https://app.terraform.io
//!     token: ${TFC_TOKEN}  # Environment variable expansion
//!   remote_failure: advisory
//!
//! output:
//!   colored: true
//!   pretty: true
//! ```

use crate::error::{Result, ResultExt};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::LazyLock;

/// Workspace used when none is configured.
pub const DEFAULT_WORKSPACE: &str = "default";

/// What to do when the remote variables loader fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemoteFailurePolicy {
    /// Abort variable resolution with the loader's error.
    #[default]
    Fatal,
    /// Log a warning and continue with the remaining sources.
    Advisory,
}

/// Credentials for the remote (Terraform Cloud / Enterprise) variables source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteOptions {
    /// API host, e.g. `https://app.terraform.io`
    pub host: String,

    /// API token
    pub token: String,

    /// Remote workspace name, overrides the one found in the configuration
    pub workspace: Option<String>,
}

impl RemoteOptions {
    /// A remote source without a host or a token is disabled.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        !self.host.is_empty() && !self.token.is_empty()
    }

    /// The API base URL. A host given without a scheme is reached over https.
    #[must_use]
    pub fn base_url(&self) -> String {
        let host = self.host.trim_end_matches('/');
        if host.contains("://") {
            host.to_string()
        } else {
            format!("https://{host}")
        }
    }
}

/// Options of one parser. Immutable once the parser is built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserOptions {
    /// Explicit variable files, relative to the parsed directory unless
    /// absolute. Files that do not exist are dropped with a warning.
    pub var_files: Vec<PathBuf>,

    /// Abort on the first file that fails to parse.
    pub strict: bool,

    /// `Some` enables `TF_VAR_*` seeding from the process environment; the
    /// map holds project-scoped overrides using the same naming convention.
    pub env_vars: Option<HashMap<String, String>>,

    /// `name=value` assignments, as given on the command line.
    pub var_assignments: Vec<String>,

    /// Input variables applied after `var_assignments`.
    pub input_vars: HashMap<String, String>,

    /// Remote variables source.
    pub remote: Option<RemoteOptions>,

    /// Whether a remote variables failure aborts parsing.
    pub remote_failure: RemoteFailurePolicy,

    /// Workspace name passed to the evaluator.
    #[serde(default = "default_workspace")]
    pub workspace: String,
}

fn default_workspace() -> String {
    DEFAULT_WORKSPACE.to_string()
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self {
            var_files: Vec::new(),
            strict: false,
            env_vars: None,
            var_assignments: Vec::new(),
            input_vars: HashMap::new(),
            remote: None,
            remote_failure: RemoteFailurePolicy::default(),
            workspace: default_workspace(),
        }
    }
}

impl ParserOptions {
    /// Returns the workspace name, falling back to the default one when empty.
    #[must_use]
    pub fn workspace_name(&self) -> &str {
        if self.workspace.is_empty() {
            DEFAULT_WORKSPACE
        } else {
            &self.workspace
        }
    }
}

/// Output options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputOptions {
    /// Use colored output.
    pub colored: bool,

    /// Pretty-print JSON output.
    pub pretty: bool,
}

impl Default for OutputOptions {
    fn default() -> Self {
        Self {
            colored: true,
            pretty: true,
        }
    }
}

/// Configuration file of the binary.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Parser options shared by every parsed path
    pub parser: ParserOptions,

    /// Output options
    pub output: OutputOptions,
}

impl Config {
    /// Load configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is invalid.
    pub fn from_yaml(content: &str) -> Result<Self> {
        let expanded = expand_env_vars(content);

        let config: Self = serde_yaml::from_str(&expanded)
            .to_config_parse_error("invalid tfresolve configuration".to_string())?;
        config.validate()?;

        tracing::debug!(
            var_files = config.parser.var_files.len(),
            strict = config.parser.strict,
            workspace = %config.parser.workspace_name(),
            remote = config.parser.remote.as_ref().is_some_and(RemoteOptions::is_enabled),
            "Configuration loaded successfully"
        );

        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if let Some(remote) = &self.parser.remote {
            if !remote.host.is_empty() && url::Url::parse(&remote.base_url()).is_err() {
                return Err(crate::err!(ConfigValue {
                    key: "parser.remote.host".to_string(),
                    message: format!("'{}' is not a valid URL", remote.host),
                }));
            }
        }
        Ok(())
    }

    /// Generate an example YAML configuration.
    #[must_use]
    pub fn example_yaml() -> String {
        r"# tfresolve configuration file

parser:
  # Variable files loaded after terraform.tfvars and *.auto.tfvars
  # var_files:
  #   - env/prod.tfvars

  # Abort on the first file that fails to parse
  strict: false

  # Workspace exposed as terraform.workspace
  workspace: default

  # Read TF_VAR_* variables from the environment; entries here override them
  # env_vars:
  #   TF_VAR_region: eu-west-1

  # Direct input variables, highest precedence
  # var_assignments:
  #   - instance_type=t3.micro

  # Terraform Cloud / Enterprise variables (disabled without host and token)
  # remote:
  #   host: https://app.terraform.io
  #   token: ${TFC_TOKEN}

  # fatal or advisory
  remote_failure: fatal

output:
  # Use colored output in terminal
  colored: true

  # Pretty-print JSON output
  pretty: true
"
        .to_string()
    }

    /// Merge CLI arguments into the configuration.
    pub fn merge_cli_args(&mut self, args: &crate::cli::ParseArgs) {
        let parser = &mut self.parser;
        parser.var_files.extend(args.var_files.iter().cloned());
        // command-line assignments beat input_vars of the configuration file
        for assignment in &args.vars {
            if let Some((name, _)) = assignment.split_once('=') {
                parser.input_vars.remove(name);
            }
        }
        parser.var_assignments.extend(args.vars.iter().cloned());
        if args.strict {
            parser.strict = true;
        }
        if let Some(workspace) = &args.workspace {
            parser.workspace.clone_from(workspace);
        }
        if args.env_vars && parser.env_vars.is_none() {
            parser.env_vars = Some(HashMap::new());
        }
        if args.remote_host.is_some() || args.remote_token.is_some() {
            let remote = parser.remote.get_or_insert_with(RemoteOptions::default);
            if let Some(host) = &args.remote_host {
                remote.host.clone_from(host);
            }
            if let Some(token) = &args.remote_token {
                remote.token.clone_from(token);
            }
        }
        if args.remote_advisory {
            parser.remote_failure = RemoteFailurePolicy::Advisory;
        }
        if args.no_color {
            self.output.colored = false;
        }
    }
}

static BRACED_VAR: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("Invalid regex"));

static BARE_VAR: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new(r"\$([A-Za-z_][A-Za-z0-9_]*)").expect("Invalid regex"));

/// Expand environment variables in a string.
///
/// Supports `${VAR}` and `$VAR` syntax; unknown variables are left as written.
fn expand_env_vars(content: &str) -> String {
    let lookup = |caps: &regex::Captures<'_>| std::env::var(&caps[1]).unwrap_or_else(|_| caps[0].to_string());

    let braced = BRACED_VAR.replace_all(content, lookup);
    BARE_VAR.replace_all(&braced, lookup).into_owned()
}
