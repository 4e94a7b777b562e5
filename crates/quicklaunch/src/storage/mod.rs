mod actions;
mod view_state;

pub use actions::{ActionStore, ImportMode};
pub use view_state::ViewState;
