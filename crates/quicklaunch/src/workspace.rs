use std::path::{Path, PathBuf};

use utils::assets::{self, AssetError};

use crate::config::Config;
use crate::external::{Dispatcher, SystemSink, available_profiles};
use crate::state::{Notice, normalize_group_path};
use crate::storage::{ActionStore, ViewState};

/// Everything loaded from the data directory at startup.
///
/// Loading never fails past locating the directory: bad files degrade to
/// defaults and leave a notice in `notices`.
pub struct Workspace {
    pub asset_dir: PathBuf,
    pub config: Config,
    pub store: ActionStore,
    pub view: ViewState,
    pub notices: Vec<Notice>,
}

impl Workspace {
    pub fn open() -> Result<Self, AssetError> {
        Ok(Self::open_in(&assets::asset_dir()?))
    }

    pub fn open_in(asset_dir: &Path) -> Self {
        let mut notices = Vec::new();

        let (config, notice) = Config::load(&asset_dir.join(assets::CONFIG_FILE));
        notices.extend(notice);

        let (store, notice) = ActionStore::open(config.commands_path(asset_dir));
        notices.extend(notice);

        let (view, notice) = ViewState::load(asset_dir.join(assets::VIEW_STATE_FILE));
        notices.extend(notice);

        Self {
            asset_dir: asset_dir.to_path_buf(),
            config,
            store,
            view,
            notices,
        }
    }

    pub fn dispatcher(&self) -> Dispatcher<SystemSink> {
        Dispatcher::new(
            SystemSink,
            available_profiles().to_vec(),
            self.config.dispatch_options(),
        )
    }

    /// Rename a group in the store and carry its expansion flags along.
    ///
    /// Both paths are normalized first, so `Dev/` and `/Dev` name `Dev`.
    pub fn rename_group(&mut self, old: &str, new: &str) -> (usize, Vec<Notice>) {
        let (Some(old), Some(new)) = (normalize_group_path(Some(old)), normalize_group_path(Some(new)))
        else {
            return (0, Vec::new());
        };
        let touched = self.store.rename_group(&old, &new);
        if touched == 0 {
            return (0, Vec::new());
        }
        let mut notices: Vec<Notice> = self.store.persist().into_iter().collect();
        notices.extend(self.view.rename_prefix(&old, &new));
        (touched, notices)
    }

    /// Dissolve one level of grouping below `path`.
    pub fn ungroup(&mut self, path: &str) -> (usize, Vec<Notice>) {
        let Some(path) = normalize_group_path(Some(path)) else {
            return (0, Vec::new());
        };
        let touched = self.store.ungroup(&path);
        if touched == 0 {
            return (0, Vec::new());
        }
        (touched, self.store.persist().into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::Action;

    #[test]
    fn test_open_in_empty_dir() {
        let dir = tempfile::tempdir().unwrap();
        let ws = Workspace::open_in(dir.path());
        assert!(ws.store.is_empty());
        assert!(ws.notices.is_empty());
        assert_eq!(ws.store.path(), dir.path().join(assets::COMMANDS_FILE));
    }

    #[test]
    fn test_open_in_collects_load_warnings() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("commands.json"), "[1, 2").unwrap();
        std::fs::write(dir.path().join("config.json"), "nope").unwrap();

        let ws = Workspace::open_in(dir.path());
        assert_eq!(ws.notices.len(), 2);
    }

    #[test]
    fn test_rename_group_migrates_expansion() {
        let dir = tempfile::tempdir().unwrap();
        let mut ws = Workspace::open_in(dir.path());
        ws.store.append(Action::new("Build").in_group("Dev/Backend"));
        ws.view.set_expanded("Dev", true);
        ws.view.set_expanded("Dev/Backend", true);

        let (touched, notices) = ws.rename_group("Dev", "Work");
        assert_eq!(touched, 1);
        assert!(notices.is_empty());
        assert!(ws.view.is_expanded("Work/Backend"));
        assert!(!ws.view.is_expanded("Dev"));

        let reopened = Workspace::open_in(dir.path());
        assert_eq!(reopened.store.actions()[0].group(), Some("Work/Backend"));
        assert!(reopened.view.is_expanded("Work"));
    }

    #[test]
    fn test_group_arguments_are_normalized() {
        let dir = tempfile::tempdir().unwrap();
        let mut ws = Workspace::open_in(dir.path());
        ws.store.append(Action::new("Build").in_group("Dev/Api"));

        let (touched, _) = ws.rename_group("/Dev", "Work/");
        assert_eq!(touched, 1);
        assert_eq!(ws.store.actions()[0].group(), Some("Work/Api"));

        let (touched, _) = ws.ungroup("Work/Api/");
        assert_eq!(touched, 1);
        assert_eq!(ws.store.actions()[0].group(), Some("Work"));

        assert_eq!(ws.ungroup("/").0, 0);
    }
}
