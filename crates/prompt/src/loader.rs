//! Prompt loader for the built-in grounded prompt and YAML overrides.

use crate::types::PromptDefinition;
use citerag_core::config::STATE_DIR;
use citerag_core::{AppError, AppResult};
use std::path::{Path, PathBuf};

/// Identifier of the grounded answer prompt.
pub const GROUNDED_PROMPT_ID: &str = "grounded";

const DEFAULT_SYSTEM: &str = "You are a precise Q&A assistant. Answer ONLY using the CONTEXT.\n\
{{#if approx_words}}- Provide a structured, detailed answer.\n\
- Be as thorough but as efficient as you can be in {{approx_words}} words or fewer.\n\
{{/if}}- If the answer is not fully supported, say \"{{fallback}}\"\n\
- Cite sources inline with the label of the CONTEXT passage, e.g. (File p.Page [Source]), at the END of each sentence you claim.";

const DEFAULT_USER: &str = "QUESTION:\n{{question}}\n\n\
CONTEXT:\n{{context}}\n\n\
INSTRUCTIONS:\n\
- Include source references like ({{citation_note}}) after each supported claim.\n\
- Use content verbatim where appropriate.";

/// The built-in grounded prompt.
pub fn default_grounded_prompt() -> PromptDefinition {
    PromptDefinition {
        id: GROUNDED_PROMPT_ID.to_string(),
        title: "Grounded answer with inline citations".to_string(),
        api_version: "1.0".to_string(),
        created_by: "citerag".to_string(),
        system: DEFAULT_SYSTEM.to_string(),
        user: DEFAULT_USER.to_string(),
    }
}

/// Load the grounded prompt, preferring a workspace override.
///
/// Looks for `.citerag/prompts/grounded.yml` under `workspace_path`; falls
/// back to the built-in prompt when there is no such file. An override
/// that exists but does not parse is an error.
pub fn load_grounded_prompt(workspace_path: &Path) -> AppResult<PromptDefinition> {
    let prompt_file = prompt_path(workspace_path, GROUNDED_PROMPT_ID);

    if prompt_file.exists() {
        load_prompt(workspace_path, GROUNDED_PROMPT_ID)
    } else {
        tracing::debug!("No grounded prompt override, using built-in prompt");
        Ok(default_grounded_prompt())
    }
}

/// Load a prompt definition by ID from the workspace.
///
/// Searches for a file named `<id>.yml` in `.citerag/prompts/`.
///
/// # Example
/// ```no_run
/// use citerag_prompt::load_prompt;
/// use std::path::Path;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let prompt = load_prompt(Path::new("."), "grounded")?;
/// println!("Loaded prompt: {}", prompt.title);
/// # Ok(())
/// # }
/// ```
pub fn load_prompt(workspace_path: &Path, prompt_id: &str) -> AppResult<PromptDefinition> {
    let prompt_file = prompt_path(workspace_path, prompt_id);

    tracing::debug!("Loading prompt from: {:?}", prompt_file);

    if !prompt_file.exists() {
        return Err(AppError::Prompt(format!(
            "Prompt file not found: {:?}",
            prompt_file
        )));
    }

    let contents = std::fs::read_to_string(&prompt_file).map_err(|e| {
        AppError::Prompt(format!(
            "Failed to read prompt file {:?}: {}",
            prompt_file, e
        ))
    })?;

    let definition: PromptDefinition = serde_yaml::from_str(&contents).map_err(|e| {
        AppError::Prompt(format!(
            "Failed to parse prompt YAML {:?}: {}",
            prompt_file, e
        ))
    })?;

    validate_prompt(&definition)?;

    tracing::info!("Loaded prompt: {} ({})", definition.id, definition.title);

    Ok(definition)
}

fn prompts_dir(workspace_path: &Path) -> PathBuf {
    workspace_path.join(STATE_DIR).join("prompts")
}

fn prompt_path(workspace_path: &Path, prompt_id: &str) -> PathBuf {
    prompts_dir(workspace_path).join(format!("{}.yml", prompt_id))
}

/// Validate a prompt definition.
fn validate_prompt(def: &PromptDefinition) -> AppResult<()> {
    if def.id.is_empty() {
        return Err(AppError::Prompt("Prompt ID cannot be empty".to_string()));
    }

    if def.title.is_empty() {
        return Err(AppError::Prompt("Prompt title cannot be empty".to_string()));
    }

    if !def.api_version.contains('.') {
        return Err(AppError::Prompt(format!(
            "Invalid apiVersion format: {}. Expected format: 'x.y'",
            def.api_version
        )));
    }

    if def.system.trim().is_empty() || def.user.trim().is_empty() {
        return Err(AppError::Prompt(
            "Prompt system and user templates cannot be empty".to_string(),
        ));
    }

    // Without the context the answer cannot be grounded
    if !def.user.contains("{{context}}") && !def.system.contains("{{context}}") {
        return Err(AppError::Prompt(format!(
            "Prompt {} does not reference {{{{context}}}}",
            def.id
        )));
    }

    Ok(())
}
