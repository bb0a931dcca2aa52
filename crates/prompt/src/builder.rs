//! Prompt builder for rendering grounded prompt templates.

use crate::types::{BuiltPrompt, BuiltPromptMetadata, GroundedInput, PromptDefinition, FALLBACK_ANSWER};
use citerag_core::{AppError, AppResult};
use handlebars::Handlebars;
use std::collections::HashMap;

/// Render a prompt definition with the grounded input.
///
/// # Example
/// ```no_run
/// use citerag_prompt::{build_prompt, loader::default_grounded_prompt, GroundedInput};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let input = GroundedInput::new(
///     "What is BM25?",
///     "[1] ir.pdf p.3\nBM25 is a ranking function.",
///     "ir.pdf p.3",
/// );
/// let built = build_prompt(&default_grounded_prompt(), &input)?;
/// println!("{}", built.to_body());
/// # Ok(())
/// # }
/// ```
pub fn build_prompt(definition: &PromptDefinition, input: &GroundedInput) -> AppResult<BuiltPrompt> {
    tracing::debug!("Building prompt: {}", definition.id);

    let mut variables = HashMap::new();
    variables.insert("question".to_string(), input.question.clone());
    variables.insert("context".to_string(), input.context.clone());
    variables.insert("citation_note".to_string(), input.citation_note.clone());
    variables.insert("fallback".to_string(), FALLBACK_ANSWER.to_string());
    if let Some(words) = input.approx_words {
        variables.insert("approx_words".to_string(), words.to_string());
    }

    let mut handlebars = Handlebars::new();

    // Plain text output, no HTML escaping
    handlebars.register_escape_fn(handlebars::no_escape);

    register(&mut handlebars, "system", &definition.system)?;
    register(&mut handlebars, "user", &definition.user)?;

    let system = render(&handlebars, "system", &variables)?;
    let user = render(&handlebars, "user", &variables)?;

    Ok(BuiltPrompt {
        system: system.trim().to_string(),
        user: user.trim().to_string(),
        metadata: BuiltPromptMetadata {
            source_prompt_id: definition.id.clone(),
            resolved_variables: variables,
        },
    })
}

fn register(handlebars: &mut Handlebars<'_>, name: &str, template: &str) -> AppResult<()> {
    handlebars
        .register_template_string(name, template)
        .map_err(|e| AppError::Prompt(format!("Failed to register {} template: {}", name, e)))
}

fn render(
    handlebars: &Handlebars<'_>,
    name: &str,
    variables: &HashMap<String, String>,
) -> AppResult<String> {
    handlebars
        .render(name, variables)
        .map_err(|e| AppError::Prompt(format!("Failed to render {} template: {}", name, e)))
}
