/// What a key press asks the UI to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiAction {
    // Navigation
    Up,
    Down,
    /// Expand a group or run an action
    Activate,
    /// Collapse a group or jump to the parent
    Collapse,
    ExpandAll,
    CollapseAll,

    // Editing
    Add,
    Edit,
    Delete,
    Duplicate,
    /// Lift a group's contents one level up
    Ungroup,

    // Drag and drop
    PickUp,
    DropOnCursor,
    DropOnRoot,
    MoveUp,
    MoveDown,

    // Filter (vim-style /)
    StartFilter,
    FilterType(char),
    FilterBackspace,
    FilterConfirm,
    FilterCancel,

    // Modals
    Confirm,
    Back,
    ShowHelp,
    Quit,
}
