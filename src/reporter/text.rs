//! Plain text report generator.

use crate::config::Config;
use crate::error::Result;
use crate::reporter::{ProjectReport, ReportGenerator};
use crate::types::Module;
use colored::Colorize;
use std::fmt::Write;

/// Text report generator for CLI output.
pub struct TextReporter {
    /// Whether to use colors
    use_colors: bool,
}

impl TextReporter {
    /// Create a new text reporter.
    #[must_use]
    pub fn new(config: &Config) -> Self {
        Self {
            use_colors: config.output.colored,
        }
    }
}

impl ReportGenerator for TextReporter {
    fn generate(&self, projects: &[ProjectReport]) -> Result<String> {
        let mut output = String::new();

        for project in projects {
            output.push_str(&self.format_project(project));
            output.push('\n');
        }

        let failed = projects.iter().filter(|p| p.failed()).count();
        let _ = writeln!(
            output,
            "{} parsed | {} failed",
            projects.len() - failed,
            failed
        );

        Ok(output)
    }
}

impl TextReporter {
    fn format_project(&self, project: &ProjectReport) -> String {
        let mut output = String::new();

        let title = project.path.display().to_string();
        if self.use_colors {
            let _ = writeln!(output, "{}", title.bright_white().bold());
        } else {
            let _ = writeln!(output, "{title}");
        }
        output.push_str(&"-".repeat(80));
        output.push('\n');

        for warning in &project.warnings {
            let label = if self.use_colors {
                "warning:".yellow().bold().to_string()
            } else {
                "warning:".to_string()
            };
            let _ = writeln!(output, "  {label} {warning}");
        }

        if let Some(error) = &project.error {
            let label = if self.use_colors {
                "error:".red().bold().to_string()
            } else {
                "error:".to_string()
            };
            let _ = writeln!(output, "  {label} {error}");
        }

        if let Some(module) = &project.module {
            self.format_module(module, 1, &mut output);
        }

        output
    }

    fn format_module(&self, module: &Module, depth: usize, output: &mut String) {
        let indent = "  ".repeat(depth);

        for block in &module.blocks {
            let address = block.address();
            let evaluated = block.values.len();
            if self.use_colors {
                let _ = writeln!(output, "{indent}{} {}", address.cyan(), format!("({evaluated} values)").dimmed());
            } else {
                let _ = writeln!(output, "{indent}{address} ({evaluated} values)");
            }
        }

        for child in &module.children {
            let header = format!("module.{}", child.name);
            if self.use_colors {
                let _ = writeln!(output, "{indent}{} {}", header.bright_blue().bold(), child.source.dimmed());
            } else {
                let _ = writeln!(output, "{indent}{header} {}", child.source);
            }
            self.format_module(child, depth + 1, output);
        }
    }
}
