use std::process::Command;

use anyhow::{Context, Result};
use tempfile::Builder;

use crate::state::Action;

fn editor_command() -> String {
    std::env::var("VISUAL")
        .or_else(|_| std::env::var("EDITOR"))
        .ok()
        .filter(|e| !e.trim().is_empty())
        .unwrap_or_else(|| if cfg!(windows) { "notepad".to_string() } else { "nvim".to_string() })
}

/// Open `initial_content` in the user's editor.
///
/// Returns `None` when the editor fails or the text comes back unchanged.
pub fn edit_in_editor(initial_content: &str, file_extension: &str) -> Result<Option<String>> {
    let temp_file = Builder::new()
        .prefix("quicklaunch-")
        .suffix(&format!(".{}", file_extension))
        .tempfile()?;
    std::fs::write(temp_file.path(), initial_content)?;

    let editor = editor_command();
    let mut parts = shlex::split(&editor).unwrap_or_else(|| vec![editor.clone()]);
    if parts.is_empty() {
        parts.push(editor.clone());
    }
    let program = parts.remove(0);

    let status = Command::new(&program)
        .args(parts)
        .arg(temp_file.path())
        .status()
        .with_context(|| format!("failed to start editor {}", editor))?;

    if !status.success() {
        tracing::info!("Editor {} exited with {}", editor, status);
        return Ok(None);
    }

    let content = std::fs::read_to_string(temp_file.path())?;
    if content.trim() == initial_content.trim() {
        return Ok(None);
    }

    Ok(Some(content))
}

/// Edit `action` as pretty JSON.
///
/// A parse failure is returned as an error so callers can report it and
/// keep the original.
pub fn edit_action(action: &Action) -> Result<Option<Action>> {
    let initial = serde_json::to_string_pretty(action)?;
    let Some(edited) = edit_in_editor(&initial, "json")? else {
        return Ok(None);
    };
    parse_edited_action(&edited).map(Some)
}

pub fn parse_edited_action(text: &str) -> Result<Action> {
    let action: Action = serde_json::from_str(text).context("edited action is not valid JSON")?;
    if action.name.trim().is_empty() {
        anyhow::bail!("action name must not be empty");
    }
    Ok(action)
}
