mod dispatcher;
mod editor;
mod opener;
mod profiles;
mod programs;
mod prompt;
mod shell;
mod terminal_spawn;

pub use dispatcher::*;
pub use editor::{edit_action, edit_in_editor};
pub use profiles::{Platform, available_profiles, default_profile};
pub use prompt::{StdinPrompt, extract_placeholders};
