//! JSON report generator.

use crate::config::Config;
use crate::error::Result;
use crate::reporter::{ProjectReport, ReportGenerator};
use serde::Serialize;

/// JSON report generator.
pub struct JsonReporter {
    /// Whether to pretty-print the output
    pretty: bool,
}

impl JsonReporter {
    /// Create a new JSON reporter.
    #[must_use]
    pub fn new(config: &Config) -> Self {
        Self {
            pretty: config.output.pretty,
        }
    }
}

#[derive(Serialize)]
struct JsonReport<'a> {
    version: &'static str,
    projects: &'a [ProjectReport],
}

impl ReportGenerator for JsonReporter {
    fn generate(&self, projects: &[ProjectReport]) -> Result<String> {
        let report = JsonReport {
            version: env!("CARGO_PKG_VERSION"),
            projects,
        };

        let json = if self.pretty {
            serde_json::to_string_pretty(&report)?
        } else {
            serde_json::to_string(&report)?
        };
        Ok(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Block, Module};
    use hcl::{Body, Map, Value};
    use std::path::PathBuf;

    fn project() -> ProjectReport {
        let mut values = Map::new();
        values.insert("ami".to_string(), Value::from("ami-123"));
        let module = Module {
            blocks: vec![Block {
                block_type: "resource".to_string(),
                labels: vec!["aws_instance".to_string(), "web".to_string()],
                body: Body::default(),
                filename: PathBuf::from("/project/main.tf"),
                module_path: Vec::new(),
                values,
            }],
            root_path: PathBuf::from("/project"),
            module_path: PathBuf::from("/project"),
            ..Module::default()
        };
        ProjectReport::new(PathBuf::from("/project"), vec!["careful".to_string()], &Ok(module))
    }

    #[test]
    fn test_json_report_contains_values() {
        let mut config = Config::default();
        config.output.pretty = false;

        let json = JsonReporter::new(&config).generate(&[project()]).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();

        let block = &parsed["projects"][0]["module"]["blocks"][0];
        assert_eq!(block["block_type"], "resource");
        assert_eq!(block["values"]["ami"], "ami-123");
        assert_eq!(parsed["projects"][0]["warnings"][0], "careful");
        assert!(parsed["projects"][0].get("error").is_none());
    }

    #[test]
    fn test_json_report_pretty() {
        let config = Config::default();
        let json = JsonReporter::new(&config).generate(&[project()]).unwrap();
        assert!(json.contains('\n'));
    }
}
