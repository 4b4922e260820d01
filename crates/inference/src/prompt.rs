//! Prompt templates with named placeholders.

use std::collections::HashMap;

use grantscout_core::ToolError;

/// A template with `{name}` placeholders. Rendering fails on a placeholder
/// with no binding so a half-filled prompt can never reach the service.
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    template: String,
}

impl PromptTemplate {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    /// Placeholder names in order of first appearance.
    pub fn placeholders(&self) -> Vec<String> {
        let re = placeholder_regex();
        let mut seen = Vec::new();
        for capture in re.captures_iter(&self.template) {
            let name = capture[1].to_string();
            if !seen.contains(&name) {
                seen.push(name);
            }
        }
        seen
    }

    pub fn render(&self, bindings: &HashMap<String, String>) -> Result<String, ToolError> {
        let re = placeholder_regex();
        let mut missing = Vec::new();
        let rendered = re
            .replace_all(&self.template, |caps: &regex::Captures<'_>| {
                match bindings.get(&caps[1]) {
                    Some(value) => value.clone(),
                    None => {
                        missing.push(caps[1].to_string());
                        String::new()
                    }
                }
            })
            .into_owned();

        if missing.is_empty() {
            Ok(rendered)
        } else {
            Err(ToolError::invalid_arguments(format!(
                "prompt template missing bindings: {}",
                missing.join(", ")
            )))
        }
    }
}

fn placeholder_regex() -> &'static regex::Regex {
    use std::sync::OnceLock;
    static RE: OnceLock<regex::Regex> = OnceLock::new();
    RE.get_or_init(|| regex::Regex::new(r"\{([a-z_][a-z0-9_]*)\}").expect("static regex"))
}
