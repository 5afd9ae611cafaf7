//! Markdown lint on written content.
//!
//! Stands in for the external markdownlint wrapper: heading spacing and
//! title length, nothing more.

use async_trait::async_trait;
use klaudiush_config::MarkdownConfig;

use crate::hook::context::HookContext;
use crate::validators::result::ValidationResult;
use crate::validators::{CostCategory, Validator};

pub struct MarkdownValidator {
    config: MarkdownConfig,
}

impl MarkdownValidator {
    pub fn new(config: MarkdownConfig) -> Self {
        Self { config }
    }

    fn first_violation(&self, content: &str) -> Option<String> {
        let lines: Vec<&str> = content.lines().collect();

        for (index, line) in lines.iter().enumerate() {
            if !line.starts_with('#') {
                continue;
            }

            let title = line.trim_start_matches('#').trim();
            if title.chars().count() > self.config.max_title_length {
                return Some(format!(
                    "heading on line {} exceeds {} characters",
                    index + 1,
                    self.config.max_title_length
                ));
            }

            if self.config.heading_spacing()
                && index > 0
                && !lines[index - 1].trim().is_empty()
            {
                return Some(format!(
                    "heading on line {} is not preceded by a blank line",
                    index + 1
                ));
            }
        }

        None
    }
}

#[async_trait]
impl Validator for MarkdownValidator {
    fn name(&self) -> &str {
        "file.markdown"
    }

    fn cost(&self) -> CostCategory {
        // Would be Io if use_markdownlint shelled out; the builtin checks
        // are pure string work.
        if self.config.use_markdownlint() {
            CostCategory::Io
        } else {
            CostCategory::Cpu
        }
    }

    async fn validate(&self, context: &HookContext) -> ValidationResult {
        let content = context.content();
        match self.first_violation(&content) {
            Some(message) => ValidationResult::fail_with_severity(
                "FILE020",
                &self.config.severity,
                message,
            )
            .with_detail("file", context.file_path()),
            None => ValidationResult::pass(),
        }
    }
}
