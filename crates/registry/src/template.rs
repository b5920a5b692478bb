// SPDX-License-Identifier: MIT

//! Prompt template rendering (§4.5).
//!
//! Mirrors the host crate family's `${name}` / `${namespace.name}` interpolation (see
//! `oj-runbook::template::interpolate`), with two differences demanded by this bus's context:
//! unknown variables render to empty string rather than being left as a literal placeholder
//! (prompts are shown to an external assistant, not inlined into shell commands), and a simple
//! `{{#if name}}...{{/if}}` conditional gates a clause on whether `name` resolves to a non-empty
//! string.

use crate::error::RegistryError;
use ojb_spool::SessionSummary;
use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;

#[allow(clippy::expect_used)]
static VAR_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([a-zA-Z_][a-zA-Z0-9_]*(?:\.[a-zA-Z_][a-zA-Z0-9_-]*)*)\}")
        .expect("constant regex pattern is valid")
});

#[allow(clippy::expect_used)]
static ENV_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{(\w+):-([^}]*)\}").expect("constant regex pattern is valid"));

#[allow(clippy::expect_used)]
static IF_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)\{\{#if ([a-zA-Z_][a-zA-Z0-9_.]*)\}\}(.*?)\{\{/if\}\}")
        .expect("constant regex pattern is valid")
});

/// The flattened, dotted-path variable map a template renders against.
pub type RenderContext = HashMap<String, String>;

/// Build the rendering context for one workflow invocation (§4.5): `workspace_path`,
/// `session_id`, `correlation_id`, plus every `git_status.*` and `lychee_status.*` field.
pub fn context_for_summary(summary: &SessionSummary) -> RenderContext {
    let mut ctx = HashMap::new();
    ctx.insert("workspace_path".to_string(), summary.workspace_path.clone());
    ctx.insert("session_id".to_string(), summary.session_id.clone());
    ctx.insert("correlation_id".to_string(), summary.correlation_id.clone());
    ctx.insert("git_status.branch".to_string(), summary.git_status.branch.clone());
    ctx.insert("git_status.modified_files".to_string(), summary.git_status.modified_files.to_string());
    ctx.insert("git_status.staged_files".to_string(), summary.git_status.staged_files.to_string());
    ctx.insert("git_status.untracked_files".to_string(), summary.git_status.untracked_files.to_string());
    ctx.insert("lychee_status.error_count".to_string(), summary.lychee_status.error_count.to_string());
    ctx.insert("lychee_status.details".to_string(), summary.lychee_status.details.clone());
    ctx
}

/// Render `template` against `ctx` for workflow `workflow_id` (used only in error messages).
///
/// Unknown template variables resolve to the empty string — consistently everywhere, per §4.5's
/// resolved Open Question — never a literal `${...}` placeholder and never a render error.
/// `{{#if name}}...{{/if}}` blocks are resolved after variable substitution conceptually, but
/// implemented as a first pass so the conditional is evaluated against the *name* in `ctx`
/// directly (not against already-substituted text).
pub fn render(
    template: &str,
    ctx: &RenderContext,
    workflow_id: &str,
) -> Result<String, RegistryError> {
    if has_unbalanced_if(template) {
        return Err(RegistryError::UnbalancedConditional { workflow_id: workflow_id.to_string() });
    }

    let with_conditionals = IF_PATTERN
        .replace_all(template, |caps: &regex::Captures| {
            let name = &caps[1];
            let body = &caps[2];
            match ctx.get(name) {
                Some(value) if !value.is_empty() => body.to_string(),
                _ => String::new(),
            }
        })
        .to_string();

    let with_env = ENV_PATTERN
        .replace_all(&with_conditionals, |caps: &regex::Captures| {
            let var_name = &caps[1];
            let default_value = &caps[2];
            std::env::var(var_name).unwrap_or_else(|_| default_value.to_string())
        })
        .to_string();

    let rendered = VAR_PATTERN
        .replace_all(&with_env, |caps: &regex::Captures| {
            let name = &caps[1];
            ctx.get(name).cloned().unwrap_or_default()
        })
        .to_string();

    Ok(rendered)
}

fn has_unbalanced_if(template: &str) -> bool {
    template.matches("{{#if").count() != template.matches("{{/if}}").count()
}
