use include_dir::{include_dir, Dir};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tera::{Context, Error as TeraError, Tera};

// Embed the prompts directory
static PROMPTS: Dir = include_dir!("$CARGO_MANIFEST_DIR/src/prompts");

pub const PERSONA_TEMPLATE: &str = "persona.md";

/// Values the persona template is rendered with
#[derive(Debug, Clone, Copy, Serialize)]
pub struct PersonaContext {
    /// Ask for replies formatted with the allowed HTML tags instead of plain text
    pub markup: bool,
    pub search_grounding: bool,
}

pub fn load_prompt<T: Serialize>(template: &str, context_data: &T) -> Result<String, TeraError> {
    let mut tera = Tera::default();
    tera.add_raw_template("inline_template", template)?;
    let context = Context::from_serialize(context_data)?;
    let rendered = tera.render("inline_template", &context)?;
    Ok(rendered)
}

/// Render a template from disk, falling back to the embedded prompts when the
/// path does not exist.
pub fn load_prompt_file<T: Serialize>(
    template_file: impl Into<PathBuf>,
    context_data: &T,
) -> Result<String, TeraError> {
    let template_path = template_file.into();

    let template_content = if template_path.exists() {
        fs::read_to_string(&template_path)
            .map_err(|e| TeraError::chain("Failed to read template file", e))?
    } else {
        PROMPTS
            .get_file(&template_path)
            .and_then(|f| f.contents_utf8())
            .map(str::to_string)
            .ok_or_else(|| {
                TeraError::msg(format!(
                    "Template file not found: {}",
                    template_path.display()
                ))
            })?
    };

    load_prompt(&template_content, context_data)
}

/// The system instruction, from the override file when one is given
pub fn persona_instruction(
    override_file: Option<&Path>,
    context: &PersonaContext,
) -> Result<String, TeraError> {
    let rendered = match override_file {
        Some(path) => load_prompt_file(path, context)?,
        None => load_prompt_file(PERSONA_TEMPLATE, context)?,
    };
    Ok(rendered.trim().to_string())
}
