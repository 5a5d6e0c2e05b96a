//! Prompt templates for ragtube.
//!
//! Prompts can be customized by placing TOML files in the custom prompts directory.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Collection of all prompt templates.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Prompts {
    pub answer: AnswerPrompts,
    /// Custom variables from config, available in all prompts.
    #[serde(skip)]
    pub variables: HashMap<String, String>,
}

/// Prompts for grounded answer generation.
///
/// `template` receives `{{question}}` and `{{context}}`. The question comes
/// before the context so that prompt truncation eats the least relevant
/// contexts first and never the question.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnswerPrompts {
    pub system: String,
    pub template: String,
}

impl Default for AnswerPrompts {
    fn default() -> Self {
        Self {
            system: "You answer questions about video transcripts. You never use knowledge \
                     that is not present in the supplied context."
                .to_string(),

            template: r#"Use ONLY the information in the context below to answer clearly and concisely.
If the answer is not contained in the context, say explicitly that it is not in the context.

Question: {{question}}

Context:
"""
{{context}}
"""

Answer:"#
                .to_string(),
        }
    }
}

impl Prompts {
    /// Load prompts from the default location, with optional custom directory and variables.
    pub fn load(
        custom_dir: Option<&str>,
        custom_variables: Option<&HashMap<String, String>>,
    ) -> crate::error::Result<Self> {
        let mut prompts = Prompts::default();

        if let Some(vars) = custom_variables {
            prompts.variables = vars.clone();
        }

        if let Some(dir) = custom_dir {
            let custom_path = PathBuf::from(shellexpand::tilde(dir).to_string());

            let answer_path = custom_path.join("answer.toml");
            if answer_path.exists() {
                let content = std::fs::read_to_string(&answer_path)?;
                prompts.answer = toml::from_str(&content)?;
            }
        }

        Ok(prompts)
    }

    /// Render a prompt template with the given variables.
    ///
    /// Placeholders are substituted in a single pass over the template, so
    /// a `{{name}}` inside an inserted value is left as written. Unknown
    /// placeholders are kept verbatim.
    pub fn render(template: &str, vars: &HashMap<String, String>) -> String {
        let mut result = String::with_capacity(template.len());
        let mut rest = template;
        while let Some(open) = rest.find("{{") {
            result.push_str(&rest[..open]);
            let after = &rest[open + 2..];
            let Some(close) = after.find("}}") else {
                rest = &rest[open..];
                break;
            };
            let key = &after[..close];
            match vars.get(key) {
                Some(value) => result.push_str(value),
                None => result.push_str(&rest[open..open + close + 4]),
            }
            rest = &after[close + 2..];
        }
        result.push_str(rest);
        result
    }

    /// Render a prompt template with both provided variables and custom config variables.
    /// Provided variables take precedence over custom config variables.
    pub fn render_with_custom(&self, template: &str, vars: &HashMap<String, String>) -> String {
        let mut merged = self.variables.clone();
        for (key, value) in vars {
            merged.insert(key.clone(), value.clone());
        }
        Self::render(template, &merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_prompts() {
        let prompts = Prompts::default();
        assert!(prompts.answer.template.contains("{{question}}"));
        assert!(prompts.answer.template.contains("{{context}}"));
        let question_at = prompts.answer.template.find("{{question}}").unwrap();
        let context_at = prompts.answer.template.find("{{context}}").unwrap();
        assert!(question_at < context_at);
    }

    #[test]
    fn test_render_template() {
        let template = "Hello {{name}}, you have {{count}} messages.";
        let mut vars = HashMap::new();
        vars.insert("name".to_string(), "Alice".to_string());
        vars.insert("count".to_string(), "5".to_string());

        let result = Prompts::render(template, &vars);
        assert_eq!(result, "Hello Alice, you have 5 messages.");
    }

    #[test]
    fn test_render_does_not_expand_inserted_values() {
        let mut vars = HashMap::new();
        vars.insert("question".to_string(), "What is {{context}}?".to_string());
        vars.insert("context".to_string(), "Say {{question}} and {{lang}}.".to_string());
        vars.insert("lang".to_string(), "Italian".to_string());

        for _ in 0..20 {
            let out = Prompts::render("Q: {{question}}\nC: {{context}} {{missing}} {{open", &vars);
            assert_eq!(out, "Q: What is {{context}}?\nC: Say {{question}} and {{lang}}. {{missing}} {{open");
        }
    }

    #[test]
    fn test_provided_vars_override_custom() {
        let mut custom = HashMap::new();
        custom.insert("lang".to_string(), "Italian".to_string());
        custom.insert("question".to_string(), "ignored".to_string());
        let prompts = Prompts::load(None, Some(&custom)).unwrap();

        let mut vars = HashMap::new();
        vars.insert("question".to_string(), "Why?".to_string());
        let out = prompts.render_with_custom("{{question}} in {{lang}}", &vars);
        assert_eq!(out, "Why? in Italian");
    }

    #[test]
    fn test_custom_answer_prompt_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("answer.toml"),
            "system = \"Rispondi in italiano.\"\ntemplate = \"D: {{question}}\\n{{context}}\"\n",
        )
        .unwrap();

        let prompts = Prompts::load(dir.path().to_str(), None).unwrap();
        assert_eq!(prompts.answer.system, "Rispondi in italiano.");
        assert!(prompts.answer.template.starts_with("D: {{question}}"));
    }
}
