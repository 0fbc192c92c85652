//! The directory parser: turns one configuration directory into its
//! evaluated root [`Module`].

use super::blocks::{construct_blocks, BlockBuilder, BuildContext, DefaultBlockBuilder};
use super::loader::load_directory;
use crate::config::ParserOptions;
use crate::error::{Result, TfResolveError};
use crate::eval::{EvaluatorFactory, EvaluatorInput, HclEvaluatorFactory};
use crate::modules::{ManifestModuleLoader, ModuleLoader, SharedModuleCache};
use crate::progress::{self, ProgressReporter, WarningSink};
use crate::types::Module;
use crate::variables::{
    collect_env_vars, collect_input_vars, discover_default_var_files, validate_var_files,
    RemoteVariablesLoader, TerraformCloudLoader, VariableSources,
};

use std::path::PathBuf;
use std::sync::Arc;
use tracing::Instrument;

/// Pluggable collaborators of a [`Parser`]. Anything left `None` gets the
/// default implementation, or nothing for progress and warnings.
#[derive(Default)]
pub struct Collaborators {
    /// Builds blocks from raw parsed blocks
    pub block_builder: Option<Arc<dyn BlockBuilder>>,
    /// Resolves module calls
    pub module_loader: Option<Arc<dyn ModuleLoader>>,
    /// Creates the evaluator
    pub evaluator_factory: Option<Arc<dyn EvaluatorFactory>>,
    /// Replaces the remote variables loader built from the options
    pub remote_loader: Option<Arc<dyn RemoteVariablesLoader>>,
    /// Reports long-running stages
    pub progress: Option<Arc<dyn ProgressReporter>>,
    /// Receives user-facing warnings
    pub warning: Option<WarningSink>,
}

/// Parses one Terraform/OpenTofu configuration directory.
///
/// A parser is built once per directory and holds no state between calls
/// to [`Parser::parse_directory`]; any number of parsers may run at once.
pub struct Parser {
    initial_path: PathBuf,
    strict: bool,
    workspace: String,
    var_files: Vec<PathBuf>,
    sources: VariableSources,
    block_builder: Arc<dyn BlockBuilder>,
    module_loader: Arc<dyn ModuleLoader>,
    evaluator_factory: Arc<dyn EvaluatorFactory>,
    progress: Option<Arc<dyn ProgressReporter>>,
    warning: Option<WarningSink>,
    span: tracing::Span,
}

impl Parser {
    /// Create a parser for `path` with the default collaborators.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, options: &ParserOptions) -> Self {
        Self::with_collaborators(path, options, Collaborators::default())
    }

    /// Create a parser for `path`.
    ///
    /// Explicit variable files that do not exist are dropped here with a
    /// warning, and the default variable files of the directory are found.
    #[must_use]
    pub fn with_collaborators(path: impl Into<PathBuf>, options: &ParserOptions, collaborators: Collaborators) -> Self {
        let initial_path = path.into();
        let workspace = options.workspace_name().to_string();
        let span = tracing::info_span!("parser", path = %initial_path.display(), workspace = %workspace);

        let (var_files, default_var_files) = span.in_scope(|| {
            (
                validate_var_files(&initial_path, &options.var_files),
                discover_default_var_files(&initial_path),
            )
        });

        let env = options
            .env_vars
            .as_ref()
            .map(|project| collect_env_vars(std::env::vars_os(), project))
            .unwrap_or_default();

        let remote = collaborators.remote_loader.or_else(|| {
            options
                .remote
                .as_ref()
                .filter(|remote| remote.is_enabled())
                .map(|remote| {
                    Arc::new(TerraformCloudLoader::new(remote, &workspace).with_progress(collaborators.progress.clone()))
                        as Arc<dyn RemoteVariablesLoader>
                })
        });

        let sources = VariableSources {
            env,
            remote,
            remote_failure: options.remote_failure,
            default_var_files,
            input: collect_input_vars(&options.var_assignments, &options.input_vars),
        };

        let module_loader = collaborators
            .module_loader
            .unwrap_or_else(|| Arc::new(ManifestModuleLoader::new(initial_path.clone(), SharedModuleCache::global())));

        Self {
            strict: options.strict,
            workspace,
            var_files,
            sources,
            block_builder: collaborators
                .block_builder
                .unwrap_or_else(|| Arc::new(DefaultBlockBuilder::default())),
            module_loader,
            evaluator_factory: collaborators
                .evaluator_factory
                .unwrap_or_else(|| Arc::new(HclEvaluatorFactory)),
            progress: collaborators.progress,
            warning: collaborators.warning,
            span,
            initial_path,
        }
    }

    /// The directory this parser reads.
    #[must_use]
    pub fn path(&self) -> &std::path::Path {
        &self.initial_path
    }

    /// Parse the directory into its evaluated root module.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be read, holds no valid
    /// configuration, or if loading variables, loading modules or
    /// evaluation fails. In strict mode the first file that fails to parse
    /// is an error too.
    pub async fn parse_directory(&self) -> Result<Module> {
        self.run().instrument(self.span.clone()).await
    }

    async fn run(&self) -> Result<Module> {
        tracing::debug!(strict = self.strict, "Parsing directory");

        let loaded = load_directory(&self.initial_path, self.strict).await?;
        let skipped_files = loaded.skipped.count();

        let mut skipped = loaded.skipped;
        let ctx = BuildContext::root(&self.initial_path);
        let blocks = construct_blocks(loaded.files, self.block_builder.as_ref(), None, &ctx, self.strict, &mut skipped)?;
        if blocks.is_empty() {
            return Err(crate::err!(NoConfiguration {
                path: self.initial_path.clone(),
            }));
        }
        tracing::debug!(blocks = blocks.len(), skipped = skipped.count(), skipped_files, "Constructed blocks");

        let input_vars = self.sources.resolve(&blocks, &self.var_files).await?;
        tracing::debug!(variables = input_vars.len(), "Resolved input variables");

        let handle = progress::start(self.progress.as_ref(), "modules", "Downloading Terraform modules");
        let manifest = match self.module_loader.load().await {
            Ok(manifest) => {
                handle.success();
                manifest
            }
            Err(e) => {
                handle.fail();
                return Err(match e {
                    e @ TfResolveError::ModuleLoad { .. } => e,
                    e => crate::err!(ModuleLoad {
                        message: e.to_string(),
                    }),
                });
            }
        };

        let working_dir = std::env::current_dir().map_err(|e| crate::err!(WorkingDirectory { source: e }))?;

        let root = Module {
            blocks,
            root_path: self.initial_path.clone(),
            module_path: self.initial_path.clone(),
            variables: input_vars.clone(),
            ..Module::default()
        };

        let mut evaluator = self.evaluator_factory.create(EvaluatorInput {
            module: root,
            working_dir,
            input_vars,
            manifest,
            workspace: self.workspace.clone(),
            block_builder: Arc::clone(&self.block_builder),
            progress: self.progress.clone(),
        });

        let missing = evaluator.missing_vars();
        if !missing.is_empty() {
            self.warn(&missing_vars_message(&missing));
        }

        evaluator.run().await
    }

    fn warn(&self, message: &str) {
        match &self.warning {
            Some(sink) => sink(message),
            None => tracing::warn!("{}", message),
        }
    }
}

fn missing_vars_message(missing: &[String]) -> String {
    let names: Vec<String> = missing.iter().map(|name| format!("\"variable.{name}\"")).collect();
    format!(
        "Input values were not provided for following Terraform variables: {}. Use --var-file or --var to specify them.",
        names.join(", ")
    )
}
