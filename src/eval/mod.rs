//! Evaluation of the constructed blocks into a [`Module`] tree.
//!
//! The parser only builds an [`Evaluator`] through an [`EvaluatorFactory`]
//! and runs it; [`HclEvaluator`] is the default implementation, evaluating
//! block bodies with `hcl-rs` and descending into the module calls listed in
//! the [`ModuleManifest`].

mod context;

use crate::error::{ErrorCollector, Result};
use crate::modules::{ModuleManifest, MAX_MODULE_DEPTH};
use crate::parser::{construct_blocks, load_directory, BlockBuilder, BuildContext};
use crate::progress::{self, ProgressReporter};
use crate::types::{Block, Module, VariableMapping};

use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::FutureExt;
use hcl::eval::Evaluate;
use hcl::Value;
use std::path::PathBuf;
use std::sync::Arc;

/// Module call attributes that are not input variables.
const META_ARGUMENTS: &[&str] = &["source", "version", "count", "for_each", "providers", "depends_on"];

/// Everything an evaluator needs for one parse.
pub struct EvaluatorInput {
    /// The root module, with its constructed but unevaluated blocks
    pub module: Module,
    /// Process working directory, exposed as `path.cwd`
    pub working_dir: PathBuf,
    /// Resolved input variables of the root module
    pub input_vars: VariableMapping,
    /// Where the module calls live on disk
    pub manifest: ModuleManifest,
    /// Workspace name, exposed as `terraform.workspace`
    pub workspace: String,
    /// Builder for the blocks of child modules
    pub block_builder: Arc<dyn BlockBuilder>,
    /// Progress reporter, if any
    pub progress: Option<Arc<dyn ProgressReporter>>,
}

/// Evaluates a configuration into its module tree.
#[async_trait]
pub trait Evaluator: Send {
    /// Variables the root module declares without a default, which were
    /// not given a value.
    fn missing_vars(&self) -> Vec<String>;

    /// Evaluate the configuration.
    async fn run(&mut self) -> Result<Module>;
}

/// Builds the [`Evaluator`] of a parse.
pub trait EvaluatorFactory: Send + Sync {
    /// Create an evaluator for the given input.
    fn create(&self, input: EvaluatorInput) -> Box<dyn Evaluator>;
}

/// Factory of [`HclEvaluator`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct HclEvaluatorFactory;

impl EvaluatorFactory for HclEvaluatorFactory {
    fn create(&self, input: EvaluatorInput) -> Box<dyn Evaluator> {
        Box::new(HclEvaluator::new(input))
    }
}

struct Shared {
    working_dir: PathBuf,
    manifest: ModuleManifest,
    workspace: String,
    block_builder: Arc<dyn BlockBuilder>,
}

/// Evaluates blocks with `hcl-rs`.
pub struct HclEvaluator {
    module: Option<Module>,
    shared: Arc<Shared>,
    progress: Option<Arc<dyn ProgressReporter>>,
}

impl HclEvaluator {
    /// Create an evaluator. The input variables replace the root module's.
    #[must_use]
    pub fn new(input: EvaluatorInput) -> Self {
        let EvaluatorInput {
            mut module,
            working_dir,
            input_vars,
            manifest,
            workspace,
            block_builder,
            progress,
        } = input;
        module.variables = input_vars;

        Self {
            module: Some(module),
            shared: Arc::new(Shared {
                working_dir,
                manifest,
                workspace,
                block_builder,
            }),
            progress,
        }
    }
}

#[async_trait]
impl Evaluator for HclEvaluator {
    fn missing_vars(&self) -> Vec<String> {
        self.module.as_ref().map(context::missing_variables).unwrap_or_default()
    }

    async fn run(&mut self) -> Result<Module> {
        let Some(module) = self.module.take() else {
            return Err(crate::err!(Internal {
                message: "evaluator has already been run".to_string(),
            }));
        };

        let handle = progress::start(self.progress.as_ref(), "eval", "Evaluating Terraform directory");
        match evaluate_module(module, String::new(), 0, Arc::clone(&self.shared)).await {
            Ok(module) => {
                handle.success();
                Ok(module)
            }
            Err(e) => {
                handle.fail();
                Err(e)
            }
        }
    }
}

fn evaluate_module(module: Module, key: String, depth: usize, shared: Arc<Shared>) -> BoxFuture<'static, Result<Module>> {
    async move {
        tracing::debug!(module = %key, blocks = module.blocks.len(), "Evaluating module");

        let (blocks, calls) = evaluate_blocks(&module, &shared);
        let mut module = Module { blocks, ..module };

        for call in &calls {
            let Some(name) = call.name() else { continue };
            let child_key = if key.is_empty() {
                name.to_string()
            } else {
                format!("{key}.{name}")
            };

            if depth + 1 >= MAX_MODULE_DEPTH {
                tracing::warn!(module = %child_key, "Module nesting is too deep, not evaluating");
                continue;
            }

            let Some(child) = load_child(&module, call, &child_key, &shared).await? else {
                continue;
            };
            let child = evaluate_module(child, child_key, depth + 1, Arc::clone(&shared)).await?;
            module.children.push(child);
        }

        Ok(module)
    }
    .boxed()
}

/// Evaluate every block of a module. Returns the evaluated blocks and,
/// separately, the module calls among them.
fn evaluate_blocks(module: &Module, shared: &Shared) -> (Vec<Block>, Vec<Block>) {
    let mut ctx = context::module_context(module, &shared.working_dir, &shared.workspace);
    let locals = context::resolve_locals(&module.blocks, &ctx);
    ctx.declare_var("local", Value::Object(locals));

    let mut blocks = Vec::with_capacity(module.blocks.len());
    let mut calls = Vec::new();

    for block in &module.blocks {
        let mut block = block.clone();
        if let Err(errors) = block.body.evaluate_in_place(&ctx) {
            tracing::debug!(block = %block.address(), errors = %errors, "Some expressions could not be evaluated");
        }
        let values = context::body_values(&block.body, &ctx);
        block.values.extend(values);

        if block.block_type == "module" {
            calls.push(block.clone());
        }
        blocks.push(block);
    }

    (blocks, calls)
}

/// Load the directory of a module call, `None` if the call is not in the
/// manifest.
async fn load_child(parent: &Module, call: &Block, key: &str, shared: &Shared) -> Result<Option<Module>> {
    let Some(entry) = shared.manifest.find(key) else {
        tracing::debug!(module = %key, "Module call is not in the manifest, skipping");
        return Ok(None);
    };

    let dir = if entry.dir.is_absolute() {
        entry.dir.clone()
    } else {
        parent.root_path.join(&entry.dir)
    };

    let loaded = load_directory(&dir, false).await.map_err(|e| {
        crate::err!(Evaluation {
            module: key.to_string(),
            message: e.to_string(),
        })
    })?;

    let ctx = BuildContext {
        root_path: parent.root_path.clone(),
        module_dir: dir.clone(),
    };
    let mut skipped = ErrorCollector::new();
    let blocks = construct_blocks(loaded.files, shared.block_builder.as_ref(), Some(call), &ctx, false, &mut skipped)?;

    let variables = call
        .values
        .iter()
        .filter(|(name, _)| !META_ARGUMENTS.contains(&name.as_str()))
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect();

    let source = match call.values.get("source") {
        Some(Value::String(source)) => source.clone(),
        _ => entry.source.clone(),
    };

    Ok(Some(Module {
        name: call.name().unwrap_or_default().to_string(),
        source,
        blocks,
        root_path: parent.root_path.clone(),
        module_path: dir,
        variables,
        children: Vec::new(),
    }))
}
