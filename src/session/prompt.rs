//! System prompt rendering.

use minijinja::{Environment, context};
use thiserror::Error;

/// Built-in system prompt template.
///
/// Rendered with `target` (optional) and `tool_timeout_secs`.
pub const DEFAULT_SYSTEM_PROMPT_TEMPLATE: &str = "\
We're working through an authorised security assessment using the available tools.
{%- if target %} The target is {{ target }}.{% endif %}
Start with some light reconnaissance. Keep in mind there is a {{ tool_timeout_secs }} second \
timeout on tool calls, so avoid scanning too deeply at first. Pause and discuss findings; \
try not to chain together too many tool calls without waiting for human input. \
Avoid looking up write-ups for the specific target.";

/// Failure to render a prompt template.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("failed to render system prompt: {0}")]
pub struct PromptError(String);

/// Renders `template` with the session's prompt context.
///
/// # Errors
///
/// Returns [`PromptError`] when the template does not parse or references
/// an undefined filter or function.
pub fn render_system_prompt(
    template: &str,
    target: Option<&str>,
    tool_timeout_secs: u64,
) -> Result<String, PromptError> {
    let environment = Environment::new();
    let prompt_context = context! {
        target => target,
        tool_timeout_secs => tool_timeout_secs,
    };
    let rendered = environment
        .render_str(template, prompt_context)
        .map_err(|error| PromptError(error.to_string()))?;
    Ok(rendered.trim().to_owned())
}
