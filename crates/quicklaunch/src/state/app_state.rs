use super::Notice;
use super::reorder::{DragPayload, DropTarget};
use super::tree::TreeNode;

/// How many notices the footer keeps around.
const NOTICE_HISTORY: usize = 5;

/// Which keymap applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Browse,
    Filter,
    Modal,
}

/// The node under the cursor, detached from the borrowed tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    Group(String),
    Action(usize),
}

impl Selection {
    pub fn of(node: &TreeNode) -> Self {
        match node {
            TreeNode::Group(g) => Selection::Group(g.path.clone()),
            TreeNode::Action(a) => Selection::Action(a.store_index),
        }
    }

    pub fn matches(&self, node: &TreeNode) -> bool {
        *self == Selection::of(node)
    }

    pub fn drop_target(&self) -> DropTarget {
        match self {
            Selection::Group(path) => DropTarget::Group(path.clone()),
            Selection::Action(index) => DropTarget::Action(*index),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Modal {
    Help,
    ConfirmDelete { target: Selection, label: String },
}

pub struct AppState {
    pub cursor: usize,
    pub modal: Option<Modal>,
    /// Filter text being typed; `None` outside filter mode.
    pub filter_input: Option<String>,
    /// Entries picked up with `x`, waiting for a drop.
    pub drag: Option<DragPayload>,
    pub notices: Vec<Notice>,
    pub should_quit: bool,
}

impl AppState {
    pub fn new() -> Self {
        Self {
            cursor: 0,
            modal: None,
            filter_input: None,
            drag: None,
            notices: Vec::new(),
            should_quit: false,
        }
    }

    pub fn input_mode(&self) -> InputMode {
        if self.modal.is_some() {
            InputMode::Modal
        } else if self.filter_input.is_some() {
            InputMode::Filter
        } else {
            InputMode::Browse
        }
    }

    pub fn clamp_cursor(&mut self, len: usize) {
        self.cursor = self.cursor.min(len.saturating_sub(1));
    }

    pub fn select_next(&mut self, len: usize) {
        if self.cursor + 1 < len {
            self.cursor += 1;
        }
    }

    pub fn select_prev(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn push_notices(&mut self, notices: impl IntoIterator<Item = Notice>) {
        self.notices.extend(notices);
        let excess = self.notices.len().saturating_sub(NOTICE_HISTORY);
        self.notices.drain(..excess);
    }

    pub fn latest_notice(&self) -> Option<&Notice> {
        self.notices.last()
    }

    /// Add the selection to the drag payload.
    ///
    /// Actions accumulate into one block (picking one twice drops it from
    /// the block); a group replaces whatever was held.
    pub fn pick_up(&mut self, selection: Selection) {
        self.drag = match (self.drag.take(), selection) {
            (_, Selection::Group(path)) => Some(DragPayload::Group(path)),
            (Some(DragPayload::Actions(mut indices)), Selection::Action(index)) => {
                match indices.iter().position(|&i| i == index) {
                    Some(pos) => {
                        indices.remove(pos);
                    }
                    None => indices.push(index),
                }
                (!indices.is_empty()).then_some(DragPayload::Actions(indices))
            }
            (_, Selection::Action(index)) => Some(DragPayload::Actions(vec![index])),
        };
    }

    pub fn is_dragged(&self, selection: &Selection) -> bool {
        match (&self.drag, selection) {
            (Some(DragPayload::Actions(indices)), Selection::Action(index)) => indices.contains(index),
            (Some(DragPayload::Group(held)), Selection::Group(path)) => held == path,
            _ => false,
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pick_up_accumulates_and_toggles_actions() {
        let mut state = AppState::new();
        state.pick_up(Selection::Action(2));
        state.pick_up(Selection::Action(0));
        assert_eq!(state.drag, Some(DragPayload::Actions(vec![2, 0])));
        assert!(state.is_dragged(&Selection::Action(0)));

        state.pick_up(Selection::Action(2));
        state.pick_up(Selection::Action(0));
        assert_eq!(state.drag, None);
    }

    #[test]
    fn test_group_pick_up_replaces_actions() {
        let mut state = AppState::new();
        state.pick_up(Selection::Action(1));
        state.pick_up(Selection::Group("Dev".to_string()));
        assert_eq!(state.drag, Some(DragPayload::Group("Dev".to_string())));

        state.pick_up(Selection::Action(3));
        assert_eq!(state.drag, Some(DragPayload::Actions(vec![3])));
    }

    #[test]
    fn test_cursor_stays_in_bounds() {
        let mut state = AppState::new();
        state.select_prev();
        assert_eq!(state.cursor, 0);
        state.select_next(2);
        state.select_next(2);
        assert_eq!(state.cursor, 1);
        state.clamp_cursor(0);
        assert_eq!(state.cursor, 0);
    }

    #[test]
    fn test_notice_history_is_bounded() {
        let mut state = AppState::new();
        state.push_notices((0..8).map(|i| Notice::info(i.to_string())));
        assert_eq!(state.notices.len(), NOTICE_HISTORY);
        assert_eq!(state.latest_notice().map(|n| n.message.as_str()), Some("7"));
    }

    #[test]
    fn test_input_mode_precedence() {
        let mut state = AppState::new();
        assert_eq!(state.input_mode(), InputMode::Browse);
        state.filter_input = Some(String::new());
        assert_eq!(state.input_mode(), InputMode::Filter);
        state.modal = Some(Modal::Help);
        assert_eq!(state.input_mode(), InputMode::Modal);
    }
}
