mod actions;
mod app_state;
mod notice;
pub mod reorder;
pub mod tree;

pub use actions::{
    Action, GROUP_SEPARATOR, ProgramEntry, TerminalMode, UrlEntry, is_within, last_segment,
    normalize_group_path, parent_path,
};
pub use app_state::*;
pub use notice::{Notice, NoticeLevel};
