use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::state::{Notice, is_within};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
struct ViewStateFile {
    expanded: BTreeMap<String, bool>,
    filter: Option<String>,
}

/// Process-scoped tree view state: per-group expansion flags and the active
/// search filter.
///
/// Keyed by group path string, so it outlives individual actions. Loaded at
/// startup and written back after every change. A `None` path keeps it in
/// memory only.
#[derive(Debug, Default)]
pub struct ViewState {
    path: Option<PathBuf>,
    expanded: BTreeMap<String, bool>,
    filter: Option<String>,
}

impl ViewState {
    #[cfg(test)]
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Load from `path`, falling back to an empty state with a warning.
    pub fn load(path: impl Into<PathBuf>) -> (Self, Option<Notice>) {
        let path = path.into();
        let mut state = Self {
            path: Some(path.clone()),
            ..Self::default()
        };

        if !path.exists() {
            return (state, None);
        }

        match read_file(&path) {
            Ok(file) => {
                state.expanded = file.expanded;
                state.filter = file.filter.filter(|f| !f.is_empty());
                (state, None)
            }
            Err(e) => {
                tracing::warn!("Failed to load view state {:?}: {:#}", path, e);
                (
                    state,
                    Some(Notice::warning(format!("Tree state was reset: {:#}", e))),
                )
            }
        }
    }

    /// Never-seen groups start collapsed.
    pub fn is_expanded(&self, path: &str) -> bool {
        self.expanded.get(path).copied().unwrap_or(false)
    }

    pub fn filter(&self) -> Option<&str> {
        self.filter.as_deref()
    }

    pub fn set_expanded(&mut self, path: &str, expanded: bool) -> Option<Notice> {
        if self.is_expanded(path) == expanded && self.expanded.contains_key(path) {
            return None;
        }
        self.expanded.insert(path.to_string(), expanded);
        self.persist()
    }

    pub fn toggle(&mut self, path: &str) -> Option<Notice> {
        let next = !self.is_expanded(path);
        self.set_expanded(path, next)
    }

    pub fn expand_all<'a>(&mut self, paths: impl IntoIterator<Item = &'a str>) -> Option<Notice> {
        for path in paths {
            self.expanded.insert(path.to_string(), true);
        }
        self.persist()
    }

    pub fn collapse_all(&mut self) -> Option<Notice> {
        for value in self.expanded.values_mut() {
            *value = false;
        }
        self.persist()
    }

    pub fn set_filter(&mut self, filter: Option<String>) -> Option<Notice> {
        self.filter = filter.filter(|f| !f.trim().is_empty());
        self.persist()
    }

    /// Carry expansion flags over to a renamed group and its subgroups.
    ///
    /// Renames that bypass this leave the old keys orphaned and the new
    /// paths start collapsed.
    pub fn rename_prefix(&mut self, old: &str, new: &str) -> Option<Notice> {
        let moved: Vec<(String, bool)> = self
            .expanded
            .iter()
            .filter(|(path, _)| is_within(path, old))
            .map(|(path, value)| (format!("{}{}", new, &path[old.len()..]), *value))
            .collect();
        if moved.is_empty() {
            return None;
        }
        self.expanded.retain(|path, _| !is_within(path, old));
        self.expanded.extend(moved);
        self.persist()
    }

    pub fn persist(&self) -> Option<Notice> {
        let path = self.path.as_ref()?;
        let file = ViewStateFile {
            expanded: self.expanded.clone(),
            filter: self.filter.clone(),
        };
        match write_file(path, &file) {
            Ok(()) => None,
            Err(e) => {
                tracing::error!("Failed to save view state {:?}: {:#}", path, e);
                Some(Notice::error(format!("Could not save tree state: {:#}", e)))
            }
        }
    }
}

fn read_file(path: &Path) -> Result<ViewStateFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read view state: {:?}", path))?;
    serde_json::from_str(&content).context("Malformed view state")
}

/// Temp file in the same directory, then rename over `path`.
fn write_file(path: &Path, file: &ViewStateFile) -> Result<()> {
    let json = serde_json::to_string_pretty(file)?;
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut tmp = tempfile::NamedTempFile::new_in(dir)
        .with_context(|| format!("Failed to write view state: {:?}", path))?;
    tmp.write_all(json.as_bytes())?;
    tmp.persist(path)
        .with_context(|| format!("Failed to replace view state: {:?}", path))?;
    Ok(())
}
