//! Variable definition files (`.tfvars` / `.tfvars.json`).

use crate::error::Result;
use crate::types::VariableMapping;

use hcl::eval::{Context, Evaluate};
use hcl::{Structure, Value};
use std::path::Path;

/// Load a variable file.
///
/// Native files may only hold attributes. Each attribute is evaluated without
/// any variables or functions in scope; an expression that fails to evaluate
/// sets its variable to null instead of failing the file.
///
/// # Errors
///
/// Returns a `VarFile` error if the file cannot be read or parsed.
pub async fn load_var_file(path: &Path) -> Result<VariableMapping> {
    tracing::debug!(file = %path.display(), "loading tfvars-file");

    let content = tokio::fs::read_to_string(path).await.map_err(|e| {
        crate::err!(VarFile {
            path: path.to_path_buf(),
            message: format!("could not read file: {e}"),
        })
    })?;

    let is_json = path.extension().is_some_and(|ext| ext == "json");
    if is_json {
        parse_json_vars(&content, path)
    } else {
        parse_native_vars(&content, path)
    }
}

fn parse_native_vars(content: &str, path: &Path) -> Result<VariableMapping> {
    let body = hcl::parse(content).map_err(|e| {
        crate::err!(VarFile {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    })?;

    let ctx = Context::new();
    let mut vars = VariableMapping::new();

    for structure in body.into_inner() {
        match structure {
            Structure::Attribute(attr) => {
                let value = attr.expr().evaluate(&ctx).unwrap_or_else(|e| {
                    tracing::debug!(file = %path.display(), variable = %attr.key(), error = %e, "Could not evaluate variable, leaving it unset");
                    Value::Null
                });
                tracing::debug!(file = %path.display(), variable = %attr.key(), "Setting variable from tfvars file");
                vars.insert(attr.key().to_string(), value);
            }
            Structure::Block(block) => {
                tracing::debug!(file = %path.display(), block = %block.identifier(), "Ignoring block in tfvars file");
            }
        }
    }

    Ok(vars)
}

fn parse_json_vars(content: &str, path: &Path) -> Result<VariableMapping> {
    let var_file_error = |reason: String| {
        crate::err!(VarFile {
            path: path.to_path_buf(),
            message: reason,
        })
    };

    let root: serde_json::Value = serde_json::from_str(content).map_err(|e| var_file_error(e.to_string()))?;
    let serde_json::Value::Object(entries) = root else {
        return Err(var_file_error("the root of a JSON variables file must be an object".to_string()));
    };

    entries
        .into_iter()
        .map(|(name, value)| {
            hcl::to_value(value)
                .map(|value| (name, value))
                .map_err(|e| var_file_error(e.to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TfResolveError;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::TempDir;

    async fn load(name: &str, content: &str) -> Result<VariableMapping> {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        load_var_file(&path).await
    }

    #[tokio::test]
    async fn test_native_literals() {
        let vars = load(
            "terraform.tfvars",
            r#"
region        = "us-east-1"
instance_count = 3
enabled       = true
zones         = ["a", "b"]
tags          = { env = "prod" }
"#,
        )
        .await
        .unwrap();

        assert_eq!(vars.get("region"), Some(&Value::from("us-east-1")));
        assert_eq!(vars.get("instance_count"), Some(&Value::from(3)));
        assert_eq!(vars.get("enabled"), Some(&Value::Bool(true)));
        assert_eq!(
            vars.get("zones"),
            Some(&Value::Array(vec![Value::from("a"), Value::from("b")]))
        );
        assert!(matches!(vars.get("tags"), Some(Value::Object(_))));
    }

    #[tokio::test]
    async fn test_self_contained_expressions_are_evaluated() {
        let vars = load(
            "a.auto.tfvars",
            "name = \"${\"web\"}-1\"\nsize = true ? \"large\" : \"small\"\nports = [for p in [80, 443] : p]",
        )
        .await
        .unwrap();
        assert_eq!(vars.get("name"), Some(&Value::from("web-1")));
        assert_eq!(vars.get("size"), Some(&Value::from("large")));
        assert!(matches!(vars.get("ports"), Some(Value::Array(ports)) if ports.len() == 2));
    }

    #[tokio::test]
    async fn test_unresolvable_expression_leaves_value_unset() {
        let vars = load("terraform.tfvars", "region = var.other\nsize = \"small\"").await.unwrap();
        assert_eq!(vars.get("region"), Some(&Value::Null));
        assert_eq!(vars.get("size"), Some(&Value::from("small")));
    }

    #[tokio::test]
    async fn test_blocks_are_ignored() {
        let vars = load("terraform.tfvars", "region = \"us-east-1\"\nsettings {\n  a = 1\n}").await.unwrap();
        assert_eq!(vars.len(), 1);
    }

    #[tokio::test]
    async fn test_json_file() {
        let vars = load(
            "terraform.tfvars.json",
            r#"{"region": "eu-west-1", "count": 2, "tags": {"env": "prod"}}"#,
        )
        .await
        .unwrap();
        assert_eq!(vars.get("region"), Some(&Value::from("eu-west-1")));
        assert_eq!(vars.get("count"), Some(&Value::from(2)));
    }

    #[tokio::test]
    async fn test_syntax_error_is_a_var_file_error() {
        let err = load("broken.tfvars", "region = {").await.unwrap_err();
        assert!(matches!(err, TfResolveError::VarFile { .. }));
    }

    #[tokio::test]
    async fn test_json_root_must_be_an_object() {
        let err = load("list.tfvars.json", r#"["region"]"#).await.unwrap_err();
        match err {
            TfResolveError::VarFile { path, message, .. } => {
                assert!(path.ends_with("list.tfvars.json"));
                assert_eq!(message, "the root of a JSON variables file must be an object");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_missing_file_is_a_var_file_error() {
        let err = load_var_file(Path::new("/definitely/not/here.tfvars")).await.unwrap_err();
        assert!(matches!(err, TfResolveError::VarFile { .. }));
    }
}
