use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use super::UiAction;
use crate::state::InputMode;

pub fn key_to_action(key: KeyEvent, mode: InputMode) -> Option<UiAction> {
    if let (KeyCode::Char('c'), KeyModifiers::CONTROL) = (key.code, key.modifiers) {
        return Some(UiAction::Quit);
    }

    match mode {
        InputMode::Modal => modal_bindings(key),
        InputMode::Filter => filter_bindings(key),
        InputMode::Browse => tree_bindings(key),
    }
}

fn modal_bindings(key: KeyEvent) -> Option<UiAction> {
    match key.code {
        KeyCode::Char('y') | KeyCode::Enter => Some(UiAction::Confirm),
        KeyCode::Char('n') | KeyCode::Char('q') | KeyCode::Esc => Some(UiAction::Back),
        _ => None,
    }
}

fn filter_bindings(key: KeyEvent) -> Option<UiAction> {
    match key.code {
        KeyCode::Enter => Some(UiAction::FilterConfirm),
        KeyCode::Esc => Some(UiAction::FilterCancel),
        KeyCode::Backspace => Some(UiAction::FilterBackspace),
        KeyCode::Char(c) => Some(UiAction::FilterType(c)),
        _ => None,
    }
}

fn tree_bindings(key: KeyEvent) -> Option<UiAction> {
    match key.code {
        // Navigation
        KeyCode::Char('j') | KeyCode::Down => Some(UiAction::Down),
        KeyCode::Char('k') | KeyCode::Up => Some(UiAction::Up),
        KeyCode::Char('l') | KeyCode::Right | KeyCode::Enter => Some(UiAction::Activate),
        KeyCode::Char('h') | KeyCode::Left => Some(UiAction::Collapse),
        KeyCode::Char('E') => Some(UiAction::ExpandAll),
        KeyCode::Char('C') => Some(UiAction::CollapseAll),

        // Editing
        KeyCode::Char('a') => Some(UiAction::Add),
        KeyCode::Char('e') => Some(UiAction::Edit),
        KeyCode::Char('d') => Some(UiAction::Delete),
        KeyCode::Char('y') => Some(UiAction::Duplicate),
        KeyCode::Char('u') => Some(UiAction::Ungroup),

        // Drag and drop
        KeyCode::Char('x') => Some(UiAction::PickUp),
        KeyCode::Char('p') => Some(UiAction::DropOnCursor),
        KeyCode::Char('P') => Some(UiAction::DropOnRoot),
        KeyCode::Char('J') => Some(UiAction::MoveDown),
        KeyCode::Char('K') => Some(UiAction::MoveUp),

        KeyCode::Char('/') => Some(UiAction::StartFilter),
        KeyCode::Char('?') => Some(UiAction::ShowHelp),
        KeyCode::Char('q') => Some(UiAction::Quit),
        KeyCode::Esc => Some(UiAction::Back),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn test_tree_keys() {
        let cases = [
            (KeyCode::Char('j'), UiAction::Down),
            (KeyCode::Enter, UiAction::Activate),
            (KeyCode::Char('l'), UiAction::Activate),
            (KeyCode::Char('h'), UiAction::Collapse),
            (KeyCode::Char('x'), UiAction::PickUp),
            (KeyCode::Char('P'), UiAction::DropOnRoot),
            (KeyCode::Char('J'), UiAction::MoveDown),
            (KeyCode::Char('y'), UiAction::Duplicate),
        ];
        for (code, expected) in cases {
            assert_eq!(key_to_action(press(code), InputMode::Browse), Some(expected));
        }
    }

    #[test]
    fn test_filter_mode_captures_letters() {
        assert_eq!(
            key_to_action(press(KeyCode::Char('q')), InputMode::Filter),
            Some(UiAction::FilterType('q'))
        );
        assert_eq!(
            key_to_action(press(KeyCode::Esc), InputMode::Filter),
            Some(UiAction::FilterCancel)
        );
    }

    #[test]
    fn test_modal_confirm_keys() {
        assert_eq!(key_to_action(press(KeyCode::Char('y')), InputMode::Modal), Some(UiAction::Confirm));
        assert_eq!(key_to_action(press(KeyCode::Char('j')), InputMode::Modal), None);
    }

    #[test]
    fn test_ctrl_c_always_quits() {
        let key = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert_eq!(key_to_action(key, InputMode::Filter), Some(UiAction::Quit));
    }
}
