//! Core data types used throughout tfresolve.
//!
//! This module defines the fundamental data structures for representing:
//! - Parsed configuration files and the blocks extracted from them
//! - Resolved input variables
//! - The evaluated module tree
//! - Module sources

use crate::parser::{JSON_SUFFIX, NATIVE_SUFFIX};
use hcl::{Body, Map, Value};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// A typed value of one resolved input variable.
pub type VariableValue = Value;

/// The two syntaxes a configuration file may be written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Syntax {
    /// Native HCL syntax (`.tf`)
    Native,
    /// JSON-encoded HCL (`.tf.json`)
    Json,
}

impl Syntax {
    /// Detect the syntax of a file from its name, `None` if it is not a
    /// configuration file at all.
    #[must_use]
    pub fn from_path(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_str()?;
        if name.ends_with(JSON_SUFFIX) {
            Some(Self::Json)
        } else if name.ends_with(NATIVE_SUFFIX) {
            Some(Self::Native)
        } else {
            None
        }
    }
}

/// The syntactic parse of one configuration file.
#[derive(Debug, Clone)]
pub struct ParsedFile {
    /// Path of the file, kept for diagnostics
    pub path: PathBuf,
    /// Which syntax the file was parsed with
    pub syntax: Syntax,
    /// The raw body of the file
    pub body: Body,
}

/// A top-level block as extracted from a [`ParsedFile`], before construction.
#[derive(Debug, Clone)]
pub struct RawBlock {
    /// The parsed block
    pub block: hcl::Block,
    /// The file the block was defined in
    pub filename: PathBuf,
}

/// A semantic configuration unit (resource, variable, module call, ...).
///
/// Blocks are produced by a [`crate::parser::BlockBuilder`] and keep a
/// reference to their originating file.
#[derive(Debug, Clone, Serialize)]
pub struct Block {
    /// The block type (e.g. "resource", "variable", "module")
    pub block_type: String,

    /// The block labels (e.g. `["aws_instance", "web"]`)
    pub labels: Vec<String>,

    /// The block body. Unevaluated after construction, evaluated in place
    /// by the evaluator on its own copy.
    #[serde(skip)]
    pub body: Body,

    /// File where this block is defined
    pub filename: PathBuf,

    /// Names of the module calls leading to this block, empty for the root module
    pub module_path: Vec<String>,

    /// Attribute values known for this block. Holds the derived attributes
    /// after construction and every evaluated attribute after evaluation.
    pub values: Map<String, Value>,
}

impl Block {
    /// Returns the block's name label (the last label), if any.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.labels.last().map(String::as_str)
    }

    /// Returns the address of the block relative to its own module.
    ///
    /// `resource "aws_instance" "web"` is `aws_instance.web`,
    /// `data "aws_ami" "ubuntu"` is `data.aws_ami.ubuntu`,
    /// `variable "region"` is `var.region`.
    #[must_use]
    pub fn local_address(&self) -> String {
        match self.block_type.as_str() {
            "resource" => self.labels.join("."),
            "variable" => format!("var.{}", self.labels.join(".")),
            _ if self.labels.is_empty() => self.block_type.clone(),
            _ => format!("{}.{}", self.block_type, self.labels.join(".")),
        }
    }

    /// Returns the fully qualified address of the block, including the
    /// module calls leading to it (e.g. `module.vpc.aws_subnet.private`).
    #[must_use]
    pub fn address(&self) -> String {
        let mut address = String::new();
        for name in &self.module_path {
            address.push_str("module.");
            address.push_str(name);
            address.push('.');
        }
        address.push_str(&self.local_address());
        address
    }

    /// Find an attribute of the block body by key.
    #[must_use]
    pub fn attribute(&self, key: &str) -> Option<&hcl::Attribute> {
        self.body.attributes().find(|attr| attr.key() == key)
    }
}

/// Mapping from variable name to value, built by overlaying sources.
///
/// The order of keys is not significant; only the order in which sources are
/// overlaid is. The last writer for a given key wins.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct VariableMapping(Map<String, VariableValue>);

impl VariableMapping {
    /// Create an empty mapping.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a single variable, replacing any previous value.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<VariableValue>) {
        self.0.insert(name.into(), value.into());
    }

    /// Overlay another source on top of this mapping.
    pub fn overlay<I>(&mut self, source: I)
    where
        I: IntoIterator<Item = (String, VariableValue)>,
    {
        for (name, value) in source {
            self.0.insert(name, value);
        }
    }

    /// Look up a variable by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&VariableValue> {
        self.0.get(name)
    }

    /// Check whether a variable has been set by any source.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    /// Number of variables in the mapping.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check whether the mapping is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over the variables.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &VariableValue)> {
        self.0.iter()
    }
}

impl FromIterator<(String, VariableValue)> for VariableMapping {
    fn from_iter<T: IntoIterator<Item = (String, VariableValue)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for VariableMapping {
    type Item = (String, VariableValue);
    type IntoIter = <Map<String, VariableValue> as IntoIterator>::IntoIter;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// The evaluated configuration tree rooted at a directory.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Module {
    /// Module call name, empty for the root module
    pub name: String,

    /// Module source as written in the call, empty for the root module
    pub source: String,

    /// The module's blocks
    pub blocks: Vec<Block>,

    /// The directory of the root module of the tree
    pub root_path: PathBuf,

    /// The directory this module was loaded from
    pub module_path: PathBuf,

    /// Input variables this module was evaluated with
    pub variables: VariableMapping,

    /// Child modules called by this module
    pub children: Vec<Module>,
}

impl Module {
    /// Iterate over blocks of a given type.
    pub fn blocks_of_type<'a>(&'a self, block_type: &'a str) -> impl Iterator<Item = &'a Block> {
        self.blocks.iter().filter(move |b| b.block_type == block_type)
    }

    /// Find a block by its local address (e.g. `aws_instance.web`).
    #[must_use]
    pub fn find_block(&self, local_address: &str) -> Option<&Block> {
        self.blocks.iter().find(|b| b.local_address() == local_address)
    }

    /// Find a direct child module by call name.
    #[must_use]
    pub fn child(&self, name: &str) -> Option<&Module> {
        self.children.iter().find(|m| m.name == name)
    }
}

/// Represents the source of a Terraform module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum ModuleSource {
    /// Terraform Registry module (e.g., "hashicorp/consul/aws")
    Registry {
        /// Registry hostname (default: registry.terraform.io)
        hostname: String,
        /// Namespace (e.g., "hashicorp")
        namespace: String,
        /// Module name (e.g., "consul")
        name: String,
        /// Provider (e.g., "aws")
        provider: String,
    },

    /// Git repository source
    Git {
        /// Host and repository path, used as the canonical identity
        host: String,
        /// Repository URL
        url: String,
        /// Git ref (branch, tag, or commit)
        ref_: Option<String>,
        /// Subdirectory within the repository
        subdir: Option<String>,
    },

    /// Local file path
    Local {
        /// Path to the module (relative or absolute)
        path: String,
    },

    /// HTTP/HTTPS URL
    Http {
        /// URL to the module archive
        url: String,
    },

    /// S3 bucket source
    S3 {
        /// Bucket name
        bucket: String,
        /// Object key
        key: String,
        /// AWS region
        region: Option<String>,
    },

    /// GCS bucket source
    Gcs {
        /// Bucket name
        bucket: String,
        /// Object path
        path: String,
    },

    /// Unknown or unparseable source
    Unknown(String),
}

impl ModuleSource {
    /// Returns a canonical identifier for this source.
    #[must_use]
    pub fn canonical_id(&self) -> String {
        match self {
            Self::Registry {
                hostname,
                namespace,
                name,
                provider,
            } => format!("{hostname}/{namespace}/{name}/{provider}"),
            Self::Git { host, url, ref_, subdir } => {
                let mut id = host.clone();
                if let Some(r) = ref_ {
                    id.push_str(&format!("?ref={r}"));
                }
                if let Some(s) = subdir {
                    if s.is_empty() {
                        tracing::warn!("Subdirectory is empty for Git source {url}, ignoring");
                    } else {
                        id.push_str(&format!("//{s}"));
                    }
                }
                id
            }
            Self::Local { path } => format!("local://{path}"),
            Self::Http { url } => url.clone(),
            Self::S3 { bucket, key, .. } => format!("s3://{bucket}/{key}"),
            Self::Gcs { bucket, path } => format!("gcs://{bucket}/{path}"),
            Self::Unknown(s) => s.clone(),
        }
    }

    /// Returns true if this is a local module source.
    #[must_use]
    pub const fn is_local(&self) -> bool {
        matches!(self, Self::Local { .. })
    }
}
