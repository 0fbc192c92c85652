//! JSON-syntax configuration files (`.tf.json`).
//!
//! A JSON configuration nests one object level per block label, e.g.
//! `{"resource": {"aws_instance": {"web": {...}}}}`. The number of levels is
//! taken from the top-level block schema, so the converted [`Body`] has the
//! same shape as the equivalent native-syntax file.

use super::label_count;
use crate::error::Result;

use hcl::expr::TemplateExpr;
use hcl::{Attribute, Block, BlockLabel, Body, Expression, Identifier, Number, ObjectKey, Structure};
use serde_json::{Map as JsonMap, Value as JsonValue};
use std::path::Path;

/// Key used for comments in JSON configuration files.
const COMMENT_KEY: &str = "//";

/// Parse JSON-syntax content into an HCL body.
pub(crate) fn parse_json_body(content: &str, path: &Path) -> Result<Body> {
    let root: JsonValue = serde_json::from_str(content).map_err(|e| {
        crate::err!(HclParse {
            file: path.to_path_buf(),
            message: e.to_string(),
            line: Some(e.line()),
            column: Some(e.column()),
        })
    })?;

    let JsonValue::Object(root) = root else {
        return Err(json_error(path, "the root of a JSON configuration file must be an object"));
    };

    let mut structures = Vec::new();
    for (key, value) in root {
        if key == COMMENT_KEY {
            continue;
        }
        match label_count(&key) {
            Some(labels) => collect_blocks(&key, labels, &[], value, path, &mut structures)?,
            // unknown top-level keys are kept as attributes, block extraction rejects them
            None => structures.push(Structure::Attribute(Attribute {
                key: identifier(&key, path)?,
                expr: json_to_expression(value),
            })),
        }
    }

    Ok(structures.into_iter().collect())
}

/// Walk `remaining` label levels below a block type and emit one block per leaf.
fn collect_blocks(
    block_type: &str,
    remaining: usize,
    labels: &[String],
    value: JsonValue,
    path: &Path,
    out: &mut Vec<Structure>,
) -> Result<()> {
    if remaining == 0 {
        return match value {
            // several blocks with the same labels
            JsonValue::Array(items) => {
                for item in items {
                    collect_blocks(block_type, 0, labels, item, path, out)?;
                }
                Ok(())
            }
            JsonValue::Object(attrs) => {
                out.push(Structure::Block(json_block(block_type, labels, attrs, path)?));
                Ok(())
            }
            _ => Err(json_error(
                path,
                &format!("the body of a {block_type} block must be a JSON object"),
            )),
        };
    }

    let JsonValue::Object(children) = value else {
        return Err(json_error(
            path,
            &format!("expected an object of labels for {block_type} block"),
        ));
    };

    for (label, child) in children {
        if label == COMMENT_KEY {
            continue;
        }
        let mut next = labels.to_vec();
        next.push(label);
        collect_blocks(block_type, remaining - 1, &next, child, path, out)?;
    }

    Ok(())
}

fn json_block(
    block_type: &str,
    labels: &[String],
    attrs: JsonMap<String, JsonValue>,
    path: &Path,
) -> Result<Block> {
    let mut structures = Vec::new();
    for (key, value) in attrs {
        if key == COMMENT_KEY {
            continue;
        }
        match nested_label_count(block_type, &key) {
            Some(nested_labels) => {
                collect_blocks(&key, nested_labels, &[], value, path, &mut structures)?;
            }
            None => structures.push(Structure::Attribute(Attribute {
                key: identifier(&key, path)?,
                expr: json_to_expression(value),
            })),
        }
    }

    Ok(Block {
        identifier: identifier(block_type, path)?,
        labels: labels.iter().cloned().map(BlockLabel::String).collect(),
        body: structures.into_iter().collect(),
    })
}

/// Nested blocks that must stay blocks for the rest of the pipeline to find
/// them (backend and cloud settings read by the remote variables loader).
fn nested_label_count(parent: &str, key: &str) -> Option<usize> {
    match (parent, key) {
        ("terraform", "backend") => Some(1),
        ("terraform", "cloud" | "required_providers") => Some(0),
        ("backend" | "cloud", "workspaces") => Some(0),
        _ => None,
    }
}

/// Convert a JSON value to an expression. Strings holding interpolation
/// sequences become templates so they are evaluated like native syntax.
pub(crate) fn json_to_expression(value: JsonValue) -> Expression {
    match value {
        JsonValue::Null => Expression::Null,
        JsonValue::Bool(b) => Expression::Bool(b),
        JsonValue::Number(n) => json_number(&n).map_or(Expression::Null, Expression::Number),
        JsonValue::String(s) if s.contains("${") => {
            Expression::TemplateExpr(Box::new(TemplateExpr::QuotedString(s)))
        }
        JsonValue::String(s) => Expression::String(s),
        JsonValue::Array(items) => {
            Expression::Array(items.into_iter().map(json_to_expression).collect())
        }
        JsonValue::Object(entries) => Expression::Object(
            entries
                .into_iter()
                .map(|(key, value)| {
                    let key = Identifier::new(key.clone())
                        .map_or_else(|_| ObjectKey::Expression(Expression::String(key)), ObjectKey::Identifier);
                    (key, json_to_expression(value))
                })
                .collect(),
        ),
    }
}

fn json_number(n: &serde_json::Number) -> Option<Number> {
    if let Some(i) = n.as_i64() {
        Some(Number::from(i))
    } else if let Some(u) = n.as_u64() {
        Some(Number::from(u))
    } else {
        n.as_f64().and_then(Number::from_f64)
    }
}

fn identifier(name: &str, path: &Path) -> Result<Identifier> {
    Identifier::new(name).map_err(|e| json_error(path, &format!("invalid identifier '{name}': {e}")))
}

fn json_error(path: &Path, message: &str) -> crate::error::TfResolveError {
    crate::err!(HclParse {
        file: path.to_path_buf(),
        message: message.to_string(),
        line: None,
        column: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blocks(body: &Body) -> Vec<(String, Vec<String>)> {
        body.blocks()
            .map(|b| {
                (
                    b.identifier().to_string(),
                    b.labels().iter().map(|l| l.as_str().to_string()).collect(),
                )
            })
            .collect()
    }

    #[test]
    fn test_resource_labels_are_unnested() {
        let content = r#"{
  "resource": {
    "aws_instance": {
      "web": { "ami": "ami-123", "count": 2 },
      "db": { "ami": "ami-456" }
    }
  },
  "variable": { "region": { "default": "us-east-1" } },
  "locals": { "env": "prod" }
}"#;
        let body = parse_json_body(content, Path::new("main.tf.json")).unwrap();
        assert_eq!(
            blocks(&body),
            vec![
                ("resource".to_string(), vec!["aws_instance".to_string(), "web".to_string()]),
                ("resource".to_string(), vec!["aws_instance".to_string(), "db".to_string()]),
                ("variable".to_string(), vec!["region".to_string()]),
                ("locals".to_string(), vec![]),
            ]
        );
    }

    #[test]
    fn test_source_order_is_kept() {
        let content = r#"{
  "variable": { "zeta": {}, "alpha": {} },
  "locals": { "b": 1, "a": 2 }
}"#;
        let body = parse_json_body(content, Path::new("order.tf.json")).unwrap();

        assert_eq!(
            blocks(&body),
            vec![
                ("variable".to_string(), vec!["zeta".to_string()]),
                ("variable".to_string(), vec!["alpha".to_string()]),
                ("locals".to_string(), Vec::new()),
            ]
        );
        let locals = body.blocks().last().unwrap();
        let keys: Vec<&str> = locals.body().attributes().map(|a| a.key()).collect();
        assert_eq!(keys, vec!["b", "a"]);
    }

    #[test]
    fn test_interpolated_strings_become_templates() {
        let content = r#"{"output": {"name": {"value": "${var.region}-web"}}}"#;
        let body = parse_json_body(content, Path::new("main.tf.json")).unwrap();
        let output = body.blocks().next().unwrap();
        let value = output.body().attributes().next().unwrap();
        assert!(matches!(value.expr(), Expression::TemplateExpr(_)));
    }

    #[test]
    fn test_terraform_backend_stays_a_block() {
        let content = r#"{
  "terraform": {
    "backend": { "remote": { "organization": "acme", "workspaces": { "name": "prod" } } }
  }
}"#;
        let body = parse_json_body(content, Path::new("main.tf.json")).unwrap();
        let terraform = body.blocks().next().unwrap();
        let backend = terraform.body().blocks().next().unwrap();
        assert_eq!(backend.identifier(), "backend");
        assert_eq!(backend.labels()[0].as_str(), "remote");
        assert_eq!(backend.body().blocks().next().unwrap().identifier(), "workspaces");
    }

    #[test]
    fn test_invalid_json_is_a_parse_error() {
        let err = parse_json_body("{ not json", Path::new("main.tf.json")).unwrap_err();
        assert!(matches!(err, crate::error::TfResolveError::HclParse { line: Some(1), .. }));
    }

    #[test]
    fn test_non_object_root_is_rejected() {
        assert!(parse_json_body("[1, 2]", Path::new("main.tf.json")).is_err());
    }
}
