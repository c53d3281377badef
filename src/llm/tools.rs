use std::path::Path;

use crate::errors::{DeskPilotError, DeskPilotResult};

/// Placeholder in the system template that receives the tool vocabulary.
pub const TOOLS_PLACEHOLDER: &str = "TOOLS_INSERTED_HERE";

/// Loads every `*.json` tool description in `dir`, ordered by file name.
pub fn load_tool_specs(dir: &Path) -> DeskPilotResult<Vec<serde_json::Value>> {
    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(|e| {
        DeskPilotError::Prompt(format!("cannot read tools directory {}: {e}", dir.display()))
    })? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) == Some("json") {
            paths.push(path);
        }
    }
    paths.sort();

    let mut tools = Vec::with_capacity(paths.len());
    for path in paths {
        let content = std::fs::read_to_string(&path)?;
        let tool: serde_json::Value = serde_json::from_str(&content).map_err(|e| {
            DeskPilotError::Prompt(format!("invalid tool description {}: {e}", path.display()))
        })?;
        tracing::info!(path = %path.display(), "loaded tool description");
        tools.push(tool);
    }

    if tools.is_empty() {
        return Err(DeskPilotError::Prompt(format!(
            "no tool descriptions found in {}",
            dir.display()
        )));
    }
    Ok(tools)
}

/// Splices the tool vocabulary into the template as a fenced JSON block.
pub fn build_system_prompt(template: &str, tools: &[serde_json::Value]) -> DeskPilotResult<String> {
    if !template.contains(TOOLS_PLACEHOLDER) {
        return Err(DeskPilotError::Prompt(format!(
            "system template has no {TOOLS_PLACEHOLDER} placeholder"
        )));
    }
    let rendered = serde_json::to_string_pretty(tools)?;
    Ok(template.replace(TOOLS_PLACEHOLDER, &format!("\n```\n{rendered}\n```\n")))
}

/// Reads the template and tool directory and returns the finished system prompt.
pub fn load_system_prompt(template_path: &Path, tools_dir: &Path) -> DeskPilotResult<String> {
    let template = std::fs::read_to_string(template_path).map_err(|e| {
        DeskPilotError::Prompt(format!(
            "cannot read system template {}: {e}",
            template_path.display()
        ))
    })?;
    let tools = load_tool_specs(tools_dir)?;
    build_system_prompt(&template, &tools)
}
