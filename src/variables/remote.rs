//! Remote variables from Terraform Cloud / Terraform Enterprise.
//!
//! Workspaces using remote execution keep their variables in the remote
//! workspace. The workspace is identified from the configuration's
//! `terraform { cloud { ... } }` or `terraform { backend "remote" { ... } }`
//! block, then its variables are fetched through the workspaces API.

use crate::config::RemoteOptions;
use crate::error::{Result, TfResolveError};
use crate::progress::{self, ProgressReporter};
use crate::types::{Block, VariableMapping};

use async_trait::async_trait;
use hcl::eval::{Context, Evaluate};
use hcl::{Body, Value};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::Arc;

/// Supplies variables stored by a remote execution backend.
#[async_trait]
pub trait RemoteVariablesLoader: Send + Sync {
    /// Load the remote variables for the configuration made of `blocks`.
    async fn load(&self, blocks: &[Block]) -> Result<VariableMapping>;
}

/// The remote workspace a configuration runs in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteWorkspace {
    /// Organization owning the workspace
    pub organization: String,
    /// Workspace name
    pub name: String,
}

#[derive(Debug, Deserialize)]
struct Document<T> {
    data: T,
}

#[derive(Debug, Deserialize)]
struct WorkspaceData {
    id: String,
}

#[derive(Debug, Deserialize)]
struct VarData {
    attributes: VarAttributes,
}

#[derive(Debug, Deserialize)]
struct VarAttributes {
    key: String,
    #[serde(default)]
    value: Option<String>,
    category: String,
    #[serde(default)]
    hcl: bool,
    #[serde(default)]
    sensitive: bool,
}

/// Loads variables through the Terraform Cloud / Enterprise API.
pub struct TerraformCloudLoader {
    client: Client,
    host: String,
    token: String,
    local_workspace: String,
    workspace_override: Option<String>,
    progress: Option<Arc<dyn ProgressReporter>>,
}

impl TerraformCloudLoader {
    /// Build a loader from the remote options. `local_workspace` is combined
    /// with a `workspaces { prefix = ... }` setting.
    #[must_use]
    pub fn new(options: &RemoteOptions, local_workspace: &str) -> Self {
        // no request timeout: a slow remote fetch runs to completion
        let client = Client::builder()
            .user_agent(concat!("tfresolve/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_default();

        Self {
            client,
            host: options.base_url(),
            token: options.token.clone(),
            local_workspace: local_workspace.to_string(),
            workspace_override: options.workspace.clone().filter(|w| !w.is_empty()),
            progress: None,
        }
    }

    /// Report the download through `progress`.
    #[must_use]
    pub fn with_progress(mut self, progress: Option<Arc<dyn ProgressReporter>>) -> Self {
        self.progress = progress;
        self
    }

    /// Find the remote workspace configured by the blocks, if any.
    #[must_use]
    pub fn find_workspace(&self, blocks: &[Block]) -> Option<RemoteWorkspace> {
        for block in blocks.iter().filter(|b| b.block_type == "terraform") {
            for settings in block.body.blocks() {
                let is_remote = match settings.identifier() {
                    "cloud" => true,
                    "backend" => settings.labels().first().is_some_and(|l| l.as_str() == "remote"),
                    _ => false,
                };
                if !is_remote {
                    continue;
                }

                let Some(organization) = literal_string(settings.body(), "organization") else {
                    continue;
                };
                let workspaces = settings.body().blocks().find(|b| b.identifier() == "workspaces");

                let name = self.workspace_override.clone().or_else(|| {
                    let workspaces = workspaces?.body();
                    literal_string(workspaces, "name").or_else(|| {
                        literal_string(workspaces, "prefix").map(|prefix| format!("{prefix}{}", self.local_workspace))
                    })
                });

                if let Some(name) = name {
                    return Some(RemoteWorkspace { organization, name });
                }
            }
        }
        None
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = format!("{}{path}", self.host);
        tracing::debug!(url = %url, "Requesting remote variables API");

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .header("Content-Type", "application/vnd.api+json")
            .send()
            .await
            .map_err(|e| {
                crate::err!(Http {
                    message: format!("request to {url} failed: {e}"),
                    status_code: None,
                })
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(crate::err!(Http {
                message: format!("request to {url} returned status {status}"),
                status_code: Some(status.as_u16()),
            }));
        }

        response.json::<T>().await.map_err(|e| {
            crate::err!(RemoteVariables {
                message: format!("invalid response from {url}: {e}"),
            })
        })
    }

    async fn fetch(&self, workspace: &RemoteWorkspace) -> Result<VariableMapping> {
        let ws: Document<WorkspaceData> = self
            .get(&format!(
                "/api/v2/organizations/{}/workspaces/{}",
                workspace.organization, workspace.name
            ))
            .await?;

        let vars: Document<Vec<VarData>> = self
            .get(&format!("/api/v2/workspaces/{}/vars", ws.data.id))
            .await?;

        let mut mapping = VariableMapping::new();
        for var in vars.data.into_iter().map(|v| v.attributes) {
            if var.category != "terraform" || var.sensitive {
                continue;
            }
            let raw = var.value.unwrap_or_default();
            let value = if var.hcl { evaluate_hcl_value(&var.key, &raw) } else { Value::from(raw) };
            mapping.insert(var.key, value);
        }

        Ok(mapping)
    }
}

#[async_trait]
impl RemoteVariablesLoader for TerraformCloudLoader {
    async fn load(&self, blocks: &[Block]) -> Result<VariableMapping> {
        let Some(workspace) = self.find_workspace(blocks) else {
            tracing::debug!("No remote workspace configured, skipping remote variables");
            return Ok(VariableMapping::new());
        };

        let handle = progress::start(
            self.progress.as_ref(),
            "remote",
            "Downloading Terraform remote variables",
        );

        match self.fetch(&workspace).await {
            Ok(mapping) => {
                handle.success();
                tracing::debug!(
                    organization = %workspace.organization,
                    workspace = %workspace.name,
                    count = mapping.len(),
                    "Downloaded remote variables"
                );
                Ok(mapping)
            }
            Err(e) => {
                handle.fail();
                Err(match e {
                    e @ TfResolveError::RemoteVariables { .. } => e,
                    other => crate::err!(RemoteVariables {
                        message: other.to_string(),
                    }),
                })
            }
        }
    }
}

/// Read a literal string attribute, evaluating it in an empty context.
fn literal_string(body: &Body, key: &str) -> Option<String> {
    let attr = body.attributes().find(|a| a.key() == key)?;
    match attr.expr().evaluate(&Context::new()) {
        Ok(Value::String(s)) => Some(s),
        _ => None,
    }
}

/// Remote variables flagged as HCL hold an expression rather than a string.
fn evaluate_hcl_value(key: &str, raw: &str) -> Value {
    let parsed = hcl::parse(&format!("value = {raw}\n"));
    let expr = parsed
        .ok()
        .and_then(|body| body.into_attributes().next())
        .map(|attr| attr.expr);

    match expr.map(|expr| expr.evaluate(&Context::new())) {
        Some(Ok(value)) => value,
        _ => {
            tracing::debug!(variable = %key, "Could not evaluate remote HCL variable, leaving it unset");
            Value::Null
        }
    }
}
