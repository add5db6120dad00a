// Prompt template for context-grounded answers
use serde::{Deserialize, Serialize};

/// Placeholder replaced by the retrieved passages
pub const CONTEXT_PLACEHOLDER: &str = "{context}";

/// Placeholder replaced by the user's question
pub const QUERY_PLACEHOLDER: &str = "{query}";

/// Default instruction template
pub const DEFAULT_TEMPLATE: &str = "[INST]
You are an expert chat assistant that extracts information from the CONTEXT provided
between <context> and </context> tags.
When answering the question contained between <question> and </question> tags
be concise and do not hallucinate.
If you don't have the information just say so.
Only answer the question if you can extract it from the CONTEXT provided.

Do not mention the CONTEXT used in your answer.

<context>
{context}
</context>
<question>
{query}
</question>
[/INST]
Answer:
";

/// Instruction template with `{context}` and `{query}` slots
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptTemplate {
    template: String,
}

impl PromptTemplate {
    /// Create template with the default instructions
    pub fn new() -> Self {
        Self::with_template(DEFAULT_TEMPLATE)
    }

    /// Create with a custom template
    pub fn with_template(template: &str) -> Self {
        Self {
            template: template.to_string(),
        }
    }

    /// Substitute passages and question into the template
    ///
    /// One left-to-right pass: substituted text is never scanned again, so
    /// braces inside passages or the question come through verbatim.
    pub fn render(&self, context: &[String], query: &str) -> String {
        let context_text = context.join("\n");
        let mut rendered = String::with_capacity(
            self.template.len() + context_text.len() + query.len(),
        );

        let mut rest = self.template.as_str();
        while let Some(open) = rest.find('{') {
            rendered.push_str(&rest[..open]);
            let tail = &rest[open..];

            if tail.starts_with(CONTEXT_PLACEHOLDER) {
                rendered.push_str(&context_text);
                rest = &tail[CONTEXT_PLACEHOLDER.len()..];
            } else if tail.starts_with(QUERY_PLACEHOLDER) {
                rendered.push_str(query);
                rest = &tail[QUERY_PLACEHOLDER.len()..];
            } else {
                rendered.push('{');
                rest = &tail[1..];
            }
        }
        rendered.push_str(rest);

        rendered
    }

    /// Get the raw template text
    pub fn template(&self) -> &str {
        &self.template
    }
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn passages(texts: &[&str]) -> Vec<String> {
        texts.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn test_render_default_template() {
        let prompt = PromptTemplate::new().render(&passages(&["X is a widget."]), "What is X?");
        assert!(prompt.contains("<context>\nX is a widget.\n</context>"));
        assert!(prompt.contains("<question>\nWhat is X?\n</question>"));
        assert!(prompt.starts_with("[INST]"));
        assert!(!prompt.contains(CONTEXT_PLACEHOLDER));
        assert!(!prompt.contains(QUERY_PLACEHOLDER));
    }

    #[test]
    fn test_render_joins_passages_in_order() {
        let template = PromptTemplate::with_template("{context}|{query}");
        let prompt = template.render(&passages(&["a", "b", "c"]), "q");
        assert_eq!(prompt, "a\nb\nc|q");
    }

    #[test]
    fn test_render_empty_context() {
        let template = PromptTemplate::with_template("[{context}] {query}");
        assert_eq!(template.render(&[], "q"), "[] q");
    }

    #[test]
    fn test_substituted_text_is_not_rescanned() {
        let template = PromptTemplate::with_template("C={context} Q={query}");
        let prompt = template.render(&passages(&["has {query} inside"]), "asks about {context}");
        assert_eq!(prompt, "C=has {query} inside Q=asks about {context}");
    }

    #[test]
    fn test_unrelated_braces_are_kept() {
        let template = PromptTemplate::with_template("{\"json\": {x}} {query}");
        assert_eq!(template.render(&[], "q"), "{\"json\": {x}} q");
    }

    #[test]
    fn test_render_is_deterministic() {
        let template = PromptTemplate::new();
        let context = passages(&["one", "two"]);
        assert_eq!(template.render(&context, "q"), template.render(&context, "q"));
    }
}
