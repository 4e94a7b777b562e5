use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::state::{Action, Notice, is_within, normalize_group_path};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to read {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed command file {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to write {path:?}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to serialize commands: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("{path:?} is not a command file: expected a top-level \"commands\" array")]
    ImportValidation { path: PathBuf },
    #[error("index {index} is out of range (store holds {len} actions)")]
    IndexOutOfRange { index: usize, len: usize },
}

/// Whole-document persistence format.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommandDocument {
    pub commands: Vec<Action>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportMode {
    Merge,
    Replace,
}

#[derive(Debug, Default)]
pub struct LoadOutcome {
    pub actions: Vec<Action>,
    pub notice: Option<Notice>,
}

/// Summary of an import, for the user-facing message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportSummary {
    pub added: usize,
    pub skipped: usize,
}

/// Ordered, file-backed collection of actions.
///
/// The order of `actions` is the only notion of position, including the
/// position of an action among its group siblings.
#[derive(Debug)]
pub struct ActionStore {
    path: PathBuf,
    actions: Vec<Action>,
}

impl ActionStore {
    /// Open the store at `path` and load it, never failing.
    pub fn open(path: impl Into<PathBuf>) -> (Self, Option<Notice>) {
        let mut store = Self {
            path: path.into(),
            actions: Vec::new(),
        };
        let outcome = store.load();
        store.actions = outcome.actions;
        (store, outcome.notice)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    pub fn get(&self, index: usize) -> Option<&Action> {
        self.actions.get(index)
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Read the backing file.
    ///
    /// A missing file is an empty store; an unreadable or malformed one is an
    /// empty store plus a warning for the caller to surface.
    pub fn load(&self) -> LoadOutcome {
        if !self.path.exists() {
            tracing::debug!("No command file at {:?}, starting empty", self.path);
            return LoadOutcome::default();
        }

        match read_document(&self.path) {
            Ok(Some(doc)) => {
                tracing::info!("Loaded {} actions from {:?}", doc.commands.len(), self.path);
                LoadOutcome {
                    actions: doc.commands,
                    notice: None,
                }
            }
            Ok(None) => {
                let err = StoreError::ImportValidation {
                    path: self.path.clone(),
                };
                tracing::warn!("{}", err);
                LoadOutcome {
                    actions: Vec::new(),
                    notice: Some(Notice::warning(format!("{}{}", err, self.back_up()))),
                }
            }
            Err(err) => {
                tracing::warn!("{}", err);
                let kept = match err {
                    StoreError::Parse { .. } => self.back_up(),
                    _ => String::new(),
                };
                LoadOutcome {
                    actions: Vec::new(),
                    notice: Some(Notice::warning(format!(
                        "Could not load commands, starting empty: {}{}",
                        err, kept
                    ))),
                }
            }
        }
    }

    /// Move an unreadable command file aside so the next save cannot
    /// clobber it. Returns a note for the load warning.
    fn back_up(&self) -> String {
        let backup = backup_path(&self.path);
        match std::fs::rename(&self.path, &backup) {
            Ok(()) => {
                tracing::warn!("Moved unreadable {:?} to {:?}", self.path, backup);
                format!(" (kept as {})", backup.display())
            }
            Err(e) => {
                tracing::error!("Failed to back up {:?}: {}", self.path, e);
                String::new()
            }
        }
    }

    /// Write the full ordered sequence, reporting instead of failing.
    ///
    /// In-memory state stays authoritative when the write fails.
    pub fn persist(&self) -> Option<Notice> {
        match self.try_persist() {
            Ok(()) => None,
            Err(err) => {
                tracing::error!("{}", err);
                Some(Notice::error(format!("Could not save commands: {}", err)))
            }
        }
    }

    pub fn try_persist(&self) -> Result<(), StoreError> {
        write_document(&self.path, &self.actions)
    }

    pub fn replace_all(&mut self, actions: Vec<Action>) -> Option<Notice> {
        self.actions = actions;
        self.persist()
    }

    pub fn append(&mut self, action: Action) -> Option<Notice> {
        self.actions.push(action);
        self.persist()
    }

    pub fn update_at(&mut self, index: usize, action: Action) -> Result<Option<Notice>, StoreError> {
        let len = self.actions.len();
        let slot = self
            .actions
            .get_mut(index)
            .ok_or(StoreError::IndexOutOfRange { index, len })?;
        *slot = action;
        Ok(self.persist())
    }

    pub fn remove_at(&mut self, index: usize) -> Result<(Action, Option<Notice>), StoreError> {
        if index >= self.actions.len() {
            return Err(StoreError::IndexOutOfRange {
                index,
                len: self.actions.len(),
            });
        }
        let removed = self.actions.remove(index);
        Ok((removed, self.persist()))
    }

    /// Insert a copy of the action at `index` directly after it.
    pub fn duplicate_at(&mut self, index: usize) -> Result<(usize, Option<Notice>), StoreError> {
        let original = self.actions.get(index).ok_or(StoreError::IndexOutOfRange {
            index,
            len: self.actions.len(),
        })?;
        let mut copy = original.clone();
        copy.name = format!("{} (copy)", copy.name);
        self.actions.insert(index + 1, copy);
        Ok((index + 1, self.persist()))
    }

    /// Mutable access for the reorder engine; callers persist afterwards.
    pub fn actions_mut(&mut self) -> &mut Vec<Action> {
        &mut self.actions
    }

    /// Find an action by bare name or by `Group/Sub/Name`.
    ///
    /// A qualified match wins over a bare-name match; among bare-name matches
    /// the first in store order is returned.
    pub fn find_by_name(&self, name: &str) -> Option<usize> {
        self.actions
            .iter()
            .position(|a| a.qualified_name() == name)
            .or_else(|| self.actions.iter().position(|a| a.name == name))
    }

    /// Rewrite every group path under `old` to live under `new`.
    ///
    /// Returns the number of actions touched.
    pub fn rename_group(&mut self, old: &str, new: &str) -> usize {
        let Some(new) = normalize_group_path(Some(new)) else {
            return 0;
        };
        let mut touched = 0;
        for action in &mut self.actions {
            let Some(group) = action.group_path.as_deref() else {
                continue;
            };
            if !is_within(group, old) {
                continue;
            }
            let rest = &group[old.len()..];
            action.group_path = Some(format!("{}{}", new, rest));
            touched += 1;
        }
        touched
    }

    /// Move every action of `path` (and its subgroups) one level up.
    pub fn ungroup(&mut self, path: &str) -> usize {
        let parent = crate::state::parent_path(path).map(str::to_string);
        let mut touched = 0;
        for action in &mut self.actions {
            let Some(group) = action.group_path.as_deref() else {
                continue;
            };
            if !is_within(group, path) {
                continue;
            }
            let rest = group[path.len()..].trim_start_matches('/');
            let lifted = match (&parent, rest.is_empty()) {
                (Some(parent), true) => Some(parent.clone()),
                (Some(parent), false) => Some(format!("{}/{}", parent, rest)),
                (None, true) => None,
                (None, false) => Some(rest.to_string()),
            };
            action.group_path = lifted;
            touched += 1;
        }
        touched
    }

    pub fn export_to(&self, path: &Path) -> Result<(), StoreError> {
        write_document(path, &self.actions)
    }

    /// Import a command document.
    ///
    /// The whole import is rejected when the document lacks the `commands`
    /// array. Merge keeps the existing action when name and group collide.
    pub fn import_from(&mut self, path: &Path, mode: ImportMode) -> Result<ImportSummary, StoreError> {
        let incoming = read_document(path)?
            .ok_or_else(|| StoreError::ImportValidation {
                path: path.to_path_buf(),
            })?
            .commands;

        let summary = match mode {
            ImportMode::Replace => {
                let added = incoming.len();
                self.actions = incoming;
                ImportSummary { added, skipped: 0 }
            }
            ImportMode::Merge => {
                let mut added = 0;
                let mut skipped = 0;
                for action in incoming {
                    let exists = self
                        .actions
                        .iter()
                        .any(|a| a.name == action.name && a.group_path == action.group_path);
                    if exists {
                        tracing::debug!("Import skipped existing {:?}", action.qualified_name());
                        skipped += 1;
                    } else {
                        self.actions.push(action);
                        added += 1;
                    }
                }
                ImportSummary { added, skipped }
            }
        };

        tracing::info!(
            "Imported {:?} ({:?}): {} added, {} skipped",
            path,
            mode,
            summary.added,
            summary.skipped
        );
        Ok(summary)
    }
}

/// `commands.json` -> `commands.json.bak`.
fn backup_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".bak");
    PathBuf::from(name)
}

/// Read a command document. `Ok(None)` means valid JSON without a
/// `commands` array.
fn read_document(path: &Path) -> Result<Option<CommandDocument>, StoreError> {
    let content = std::fs::read_to_string(path).map_err(|source| StoreError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let value: serde_json::Value =
        serde_json::from_str(&content).map_err(|source| StoreError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

    if !value.get("commands").is_some_and(serde_json::Value::is_array) {
        return Ok(None);
    }

    let doc: CommandDocument =
        serde_json::from_value(value).map_err(|source| StoreError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(Some(doc))
}

/// Serialize and atomically replace `path`: temp file in the same
/// directory, then rename.
fn write_document(path: &Path, actions: &[Action]) -> Result<(), StoreError> {
    #[derive(Serialize)]
    struct DocumentRef<'a> {
        commands: &'a [Action],
    }

    let json = serde_json::to_string_pretty(&DocumentRef { commands: actions })?;
    let write_err = |source| StoreError::Write {
        path: path.to_path_buf(),
        source,
    };

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir).map_err(write_err)?;

    let mut tmp = tempfile::NamedTempFile::new_in(&dir).map_err(write_err)?;
    tmp.write_all(json.as_bytes()).map_err(write_err)?;
    tmp.write_all(b"\n").map_err(write_err)?;
    tmp.as_file().sync_all().map_err(write_err)?;
    tmp.persist(path).map_err(|e| write_err(e.error))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::NoticeLevel;

    fn sample() -> Vec<Action> {
        let mut build = Action::new("Build").in_group("Dev");
        build.shell_commands = vec!["cargo build".to_string()];
        let mut docs = Action::new("Docs");
        docs.urls.push(crate::state::UrlEntry {
            url: "https://docs.rs".to_string(),
            external: false,
        });
        vec![build, Action::new("Test").in_group("Dev/Ci"), docs]
    }

    #[test]
    fn test_missing_file_is_empty_without_notice() {
        let dir = tempfile::tempdir().unwrap();
        let (store, notice) = ActionStore::open(dir.path().join("commands.json"));
        assert!(store.is_empty());
        assert!(notice.is_none());
    }

    #[test]
    fn test_malformed_file_is_empty_with_warning() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("commands.json");
        std::fs::write(&path, "{ not json").unwrap();

        let (mut store, notice) = ActionStore::open(&path);
        assert!(store.is_empty());
        let notice = notice.unwrap();
        assert_eq!(notice.level, NoticeLevel::Warning);
        assert!(notice.message.contains("commands.json.bak"));

        // The next save must not overwrite what the user wrote
        assert!(store.append(Action::new("Fresh")).is_none());
        let backup = dir.path().join("commands.json.bak");
        assert_eq!(std::fs::read_to_string(backup).unwrap(), "{ not json");
    }

    #[test]
    fn test_file_without_commands_array_is_kept_aside() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("commands.json");
        std::fs::write(&path, r#"{"actions": []}"#).unwrap();

        let (_, notice) = ActionStore::open(&path);
        assert!(notice.is_some());
        assert!(!path.exists());
        assert!(dir.path().join("commands.json.bak").exists());
    }

    #[test]
    fn test_failed_write_reports_error_and_keeps_memory() {
        let dir = tempfile::tempdir().unwrap();
        // A file where the directory should be makes every write fail
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "").unwrap();
        let (mut store, notice) = ActionStore::open(blocker.join("commands.json"));
        assert!(notice.is_none());

        let notice = store.replace_all(sample()).unwrap();
        assert_eq!(notice.level, NoticeLevel::Error);
        assert_eq!(store.len(), 3);

        let notice = store.append(Action::new("Extra")).unwrap();
        assert!(notice.is_error());
        assert_eq!(store.actions()[3].name, "Extra");

        let (removed, notice) = store.remove_at(0).unwrap();
        assert_eq!(removed.name, "Build");
        assert!(notice.unwrap().is_error());
        assert_eq!(store.len(), 3);
        assert!(store.try_persist().is_err());
    }

    #[test]
    fn test_persist_then_reload_preserves_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("commands.json");
        let (mut store, _) = ActionStore::open(&path);
        assert!(store.replace_all(sample()).is_none());

        let (reloaded, notice) = ActionStore::open(&path);
        assert!(notice.is_none());
        assert_eq!(reloaded.actions(), store.actions());
    }

    #[test]
    fn test_export_import_replace_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let (mut source, _) = ActionStore::open(dir.path().join("a.json"));
        source.replace_all(sample());
        let export = dir.path().join("export.json");
        source.export_to(&export).unwrap();

        let (mut target, _) = ActionStore::open(dir.path().join("b.json"));
        target.append(Action::new("Stale"));
        target.import_from(&export, ImportMode::Replace).unwrap();
        assert_eq!(target.actions(), source.actions());
    }

    #[test]
    fn test_import_merge_keeps_existing_on_collision() {
        let dir = tempfile::tempdir().unwrap();
        let (mut store, _) = ActionStore::open(dir.path().join("commands.json"));
        let mut existing = Action::new("Build").in_group("Dev");
        existing.shell_commands = vec!["make".to_string()];
        store.replace_all(vec![existing.clone()]);

        let export = dir.path().join("incoming.json");
        std::fs::write(&export, serde_json::to_string(&CommandDocument { commands: sample() }).unwrap())
            .unwrap();

        let summary = store.import_from(&export, ImportMode::Merge).unwrap();
        assert_eq!(summary, ImportSummary { added: 2, skipped: 1 });
        assert_eq!(store.actions()[0], existing);
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn test_import_without_commands_array_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let (mut store, _) = ActionStore::open(dir.path().join("commands.json"));
        store.replace_all(sample());
        let bad = dir.path().join("bad.json");
        std::fs::write(&bad, r#"{"actions": []}"#).unwrap();

        let err = store.import_from(&bad, ImportMode::Replace).unwrap_err();
        assert!(matches!(err, StoreError::ImportValidation { .. }));
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn test_update_and_remove_out_of_range() {
        let dir = tempfile::tempdir().unwrap();
        let (mut store, _) = ActionStore::open(dir.path().join("commands.json"));
        assert!(store.update_at(0, Action::new("x")).is_err());
        assert!(store.remove_at(3).is_err());
    }

    #[test]
    fn test_find_by_name_prefers_qualified() {
        let dir = tempfile::tempdir().unwrap();
        let (mut store, _) = ActionStore::open(dir.path().join("commands.json"));
        store.replace_all(vec![
            Action::new("Run").in_group("A"),
            Action::new("Run").in_group("B"),
        ]);
        assert_eq!(store.find_by_name("B/Run"), Some(1));
        assert_eq!(store.find_by_name("Run"), Some(0));
        assert_eq!(store.find_by_name("C/Run"), None);
    }

    #[test]
    fn test_rename_group_rewrites_prefix_only() {
        let dir = tempfile::tempdir().unwrap();
        let (mut store, _) = ActionStore::open(dir.path().join("commands.json"));
        store.replace_all(vec![
            Action::new("a").in_group("Dev"),
            Action::new("b").in_group("Dev/Ci"),
            Action::new("c").in_group("Devops"),
        ]);
        assert_eq!(store.rename_group("Dev", "Work/Dev"), 2);
        let groups: Vec<_> = store.actions().iter().map(|a| a.group()).collect();
        assert_eq!(groups, vec![Some("Work/Dev"), Some("Work/Dev/Ci"), Some("Devops")]);
    }

    #[test]
    fn test_ungroup_lifts_one_level() {
        let dir = tempfile::tempdir().unwrap();
        let (mut store, _) = ActionStore::open(dir.path().join("commands.json"));
        store.replace_all(vec![
            Action::new("a").in_group("A/B"),
            Action::new("b").in_group("A/B/C"),
            Action::new("c").in_group("X"),
        ]);
        assert_eq!(store.ungroup("A/B"), 2);
        assert_eq!(store.actions()[0].group(), Some("A"));
        assert_eq!(store.actions()[1].group(), Some("A/C"));

        store.ungroup("X");
        assert_eq!(store.actions()[2].group(), None);
    }

    #[test]
    fn test_duplicate_inserts_after_original() {
        let dir = tempfile::tempdir().unwrap();
        let (mut store, _) = ActionStore::open(dir.path().join("commands.json"));
        store.replace_all(sample());
        let (index, _) = store.duplicate_at(0).unwrap();
        assert_eq!(index, 1);
        assert_eq!(store.actions()[1].name, "Build (copy)");
        assert_eq!(store.actions()[1].group(), Some("Dev"));
    }
}
