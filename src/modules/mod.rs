//! Module call resolution.
//!
//! A [`ModuleLoader`] maps every module call of a configuration to a directory
//! on disk. [`ManifestModuleLoader`] reads the manifest written by
//! `terraform init` (`.terraform/modules/modules.json`), resolves local
//! sources itself, and looks remote sources up in a [`SharedModuleCache`]
//! shared by every parser of the process.

use crate::error::Result;
use crate::parser::{load_directory, parse_module_source};
use crate::types::ModuleSource;

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};

/// Location of the manifest, relative to the root module.
pub const MANIFEST_PATH: &str = ".terraform/modules/modules.json";

/// Nesting limit for module calls.
pub const MAX_MODULE_DEPTH: usize = 10;

/// Where the module calls of a configuration live on disk.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleManifest {
    /// One entry per module call, keyed by dotted call path
    #[serde(rename = "Modules", default)]
    pub modules: Vec<ManifestEntry>,
}

/// One resolved module call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ManifestEntry {
    /// Dotted call path (`vpc`, `vpc.subnets`); empty for the root module
    pub key: String,
    /// Source as written in the call
    #[serde(default)]
    pub source: String,
    /// Resolved version, for registry sources
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Directory holding the module
    pub dir: PathBuf,
}

impl ModuleManifest {
    /// Find the entry of a call path.
    #[must_use]
    pub fn find(&self, key: &str) -> Option<&ManifestEntry> {
        self.modules.iter().find(|m| m.key == key)
    }
}

/// Resolves the module calls of a configuration.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ModuleLoader: Send + Sync {
    /// Produce the manifest of the configuration this loader was built for.
    async fn load(&self) -> Result<ModuleManifest>;
}

static GLOBAL_CACHE: LazyLock<Arc<SharedModuleCache>> = LazyLock::new(|| Arc::new(SharedModuleCache::new()));

/// Remote module sources already available on disk, shared across parsers.
#[derive(Debug, Default)]
pub struct SharedModuleCache {
    entries: DashMap<String, PathBuf>,
}

impl SharedModuleCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide cache.
    #[must_use]
    pub fn global() -> Arc<Self> {
        Arc::clone(&GLOBAL_CACHE)
    }

    fn cache_key(source: &ModuleSource, version: Option<&str>) -> String {
        match version {
            Some(version) => format!("{}@{version}", source.canonical_id()),
            None => source.canonical_id(),
        }
    }

    /// Look up a remote source.
    #[must_use]
    pub fn get(&self, source: &ModuleSource, version: Option<&str>) -> Option<PathBuf> {
        self.entries
            .get(&Self::cache_key(source, version))
            .map(|entry| entry.value().clone())
    }

    /// Record where a remote source lives. The first recorded location wins.
    pub fn insert(&self, source: &ModuleSource, version: Option<&str>, dir: PathBuf) {
        self.entries
            .entry(Self::cache_key(source, version))
            .or_insert(dir);
    }

    /// Number of cached sources.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check whether the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

struct ModuleCall {
    name: String,
    source: String,
    version: Option<String>,
}

/// Loads modules from the `terraform init` manifest and the local file system.
pub struct ManifestModuleLoader {
    root: PathBuf,
    cache: Arc<SharedModuleCache>,
}

impl ManifestModuleLoader {
    /// Create a loader for the configuration rooted at `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, cache: Arc<SharedModuleCache>) -> Self {
        Self {
            root: root.into(),
            cache,
        }
    }

    async fn read_manifest(&self) -> Result<Option<ModuleManifest>> {
        let path = self.root.join(MANIFEST_PATH);
        if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return Ok(None);
        }

        let content = tokio::fs::read_to_string(&path).await.map_err(|e| {
            crate::err!(ModuleLoad {
                message: format!("could not read {}: {e}", path.display()),
            })
        })?;
        let manifest: ModuleManifest = serde_json::from_str(&content).map_err(|e| {
            crate::err!(ModuleLoad {
                message: format!("invalid module manifest {}: {e}", path.display()),
            })
        })?;

        tracing::debug!(path = %path.display(), modules = manifest.modules.len(), "Read module manifest");
        Ok(Some(manifest))
    }

    fn absolute(&self, dir: &Path) -> PathBuf {
        if dir.is_absolute() {
            dir.to_path_buf()
        } else {
            self.root.join(dir)
        }
    }

    fn resolve_call(&self, key: &str, call: &ModuleCall, caller_dir: &Path, installed: Option<&ManifestEntry>) -> Option<PathBuf> {
        let source = parse_module_source(&call.source);

        if let Some(entry) = installed {
            let dir = self.absolute(&entry.dir);
            if !dir.is_dir() {
                tracing::warn!(module = %key, dir = %dir.display(), "Installed module directory is missing, skipping");
                return None;
            }
            if !source.is_local() {
                self.cache.insert(&source, entry.version.as_deref().or(call.version.as_deref()), dir.clone());
            }
            return Some(dir);
        }

        if let ModuleSource::Local { path } = &source {
            let dir = caller_dir.join(path);
            if dir.is_dir() {
                return Some(dir);
            }
            tracing::warn!(module = %key, dir = %dir.display(), "Local module directory does not exist, skipping");
            return None;
        }

        if let Some(dir) = self.cache.get(&source, call.version.as_deref()) {
            tracing::debug!(module = %key, source = %call.source, "Using cached module");
            return Some(dir);
        }

        tracing::warn!(
            module = %key,
            source = %call.source,
            "Module is not available locally, run terraform init to download it"
        );
        None
    }
}

#[async_trait]
impl ModuleLoader for ManifestModuleLoader {
    async fn load(&self) -> Result<ModuleManifest> {
        let installed = self.read_manifest().await?.unwrap_or_default();

        let mut manifest = ModuleManifest {
            modules: vec![ManifestEntry {
                key: String::new(),
                source: String::new(),
                version: None,
                dir: self.root.clone(),
            }],
        };

        let mut pending: Vec<(String, PathBuf, usize)> = vec![(String::new(), self.root.clone(), 0)];
        while let Some((prefix, dir, depth)) = pending.pop() {
            if depth >= MAX_MODULE_DEPTH {
                tracing::warn!(module = %prefix, "Module nesting is too deep, not loading further calls");
                continue;
            }

            for call in module_calls(&dir).await? {
                let key = if prefix.is_empty() {
                    call.name.clone()
                } else {
                    format!("{prefix}.{}", call.name)
                };

                let Some(module_dir) = self.resolve_call(&key, &call, &dir, installed.find(&key)) else {
                    continue;
                };

                tracing::debug!(module = %key, dir = %module_dir.display(), "Resolved module");
                pending.push((key.clone(), module_dir.clone(), depth + 1));
                manifest.modules.push(ManifestEntry {
                    key,
                    source: call.source,
                    version: call.version,
                    dir: module_dir,
                });
            }
        }

        manifest.modules.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(manifest)
    }
}

/// The module calls of a directory, in file and source order.
async fn module_calls(dir: &Path) -> Result<Vec<ModuleCall>> {
    let loaded = load_directory(dir, false).await.map_err(|e| {
        crate::err!(ModuleLoad {
            message: e.to_string(),
        })
    })?;

    let mut calls = Vec::new();
    for file in &loaded.files {
        for block in file.body.blocks().filter(|b| b.identifier() == "module") {
            let Some(name) = block.labels().first().map(|l| l.as_str().to_string()) else {
                continue;
            };
            let literal = |key: &str| {
                block.body().attributes().find(|a| a.key() == key).and_then(|a| match a.expr() {
                    hcl::Expression::String(s) => Some(s.clone()),
                    _ => None,
                })
            };
            let Some(source) = literal("source") else {
                tracing::warn!(module = %name, file = %file.path.display(), "Module call has no literal source, skipping");
                continue;
            };
            calls.push(ModuleCall {
                name,
                source,
                version: literal("version"),
            });
        }
    }

    Ok(calls)
}
