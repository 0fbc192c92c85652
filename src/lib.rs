//! # tfresolve
//!
//! An offline loader for Terraform/OpenTofu configurations.
//!
//! tfresolve reads a configuration directory, resolves its input variables
//! from every source Terraform itself reads, locates module calls and
//! evaluates the configuration into a tree of modules and blocks, without
//! running Terraform.
//!
//! ## Features
//!
//! - **Native and JSON syntax**: `.tf` and `.tf.json` files, parsed with `hcl-rs`
//! - **Variable precedence**: `TF_VAR_*` environment variables, remote
//!   workspace variables, `terraform.tfvars`, `*.auto.tfvars`, explicit
//!   variable files and direct input, merged last-writer-wins
//! - **Modules**: local calls and calls installed by `terraform init`
//! - **Fault tolerance**: broken files are skipped with a warning unless
//!   strict mode is on
//! - **Concurrent use**: any number of parsers may run at once, each with its
//!   own tracing span, warning sink and progress reporter
//!
//! ## Example
//!
//! ```rust,no_run
//! use tfresolve::{Parser, ParserOptions};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let options = ParserOptions {
//!         var_files: vec!["env/prod.tfvars".into()],
//!         ..ParserOptions::default()
//!     };
//!
//!     let module = Parser::new("./terraform", &options).parse_directory().await?;
//!     for block in &module.blocks {
//!         println!("{}", block.address());
//!     }
//!     Ok(())
//! }
//! ```

#![warn(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    missing_docs,
    rust_2018_idioms
)]

pub mod cli;
pub mod config;
pub mod error;
pub mod eval;
pub mod modules;
pub mod parser;
pub mod progress;
pub mod reporter;
pub mod types;
pub mod variables;

// Re-export commonly used types at crate root
pub use config::{Config, ParserOptions};
pub use error::{Result, TfResolveError};
pub use parser::Parser;
pub use types::{Block, Module, VariableMapping};
