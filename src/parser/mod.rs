//! Directory parsing for Terraform/OpenTofu configurations.
//!
//! This module drives the whole pipeline for one directory:
//!
//! 1. [`load_directory`] parses every `.tf` / `.tf.json` file of the directory
//! 2. [`construct_blocks`] extracts the top-level blocks and passes them
//!    through a [`BlockBuilder`]
//! 3. the variable sources are merged (see [`crate::variables`])
//! 4. a [`crate::modules::ModuleLoader`] resolves module calls
//! 5. an [`crate::eval::Evaluator`] produces the evaluated root [`crate::types::Module`]
//!
//! # Example
//!
//! ```rust,no_run
//! use tfresolve::parser::Parser;
//! use tfresolve::config::ParserOptions;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let options = ParserOptions {
//!         var_assignments: vec!["region=eu-west-1".to_string()],
//!         ..ParserOptions::default()
//!     };
//!     let parser = Parser::new("./terraform", &options);
//!
//!     let root = parser.parse_directory().await?;
//!     println!("Found {} blocks", root.blocks.len());
//!     Ok(())
//! }
//! ```

mod blocks;
mod directory;
mod json;
mod loader;
mod source;

pub use blocks::{
    construct_blocks, extract_blocks, set_uuid_attributes, BlockBuilder, BuildContext,
    DefaultBlockBuilder, SetAttributesFn,
};
pub use directory::{Collaborators, Parser};
pub use loader::{load_directory, parse_file, LoadedDirectory};
pub use source::parse_module_source;

/// Suffix of native-syntax configuration files.
pub const NATIVE_SUFFIX: &str = ".tf";

/// Suffix of JSON-syntax configuration files.
pub const JSON_SUFFIX: &str = ".tf.json";

/// Block types allowed at the top level of a configuration file, with the
/// number of labels each one takes.
pub const TOP_LEVEL_BLOCKS: &[(&str, usize)] = &[
    ("terraform", 0),
    ("locals", 0),
    ("moved", 0),
    ("import", 0),
    ("removed", 0),
    ("variable", 1),
    ("output", 1),
    ("module", 1),
    ("provider", 1),
    ("check", 1),
    ("resource", 2),
    ("data", 2),
];

/// Returns the number of labels a top-level block type takes, `None` for
/// block types that are not part of the configuration language.
#[must_use]
pub fn label_count(block_type: &str) -> Option<usize> {
    TOP_LEVEL_BLOCKS
        .iter()
        .find(|(name, _)| *name == block_type)
        .map(|(_, labels)| *labels)
}
