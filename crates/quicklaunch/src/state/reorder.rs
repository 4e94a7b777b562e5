//! Drag-and-drop mutations over the flat action list.
//!
//! All moves use stable-splice semantics: sources are removed first (in
//! descending index order), then the insertion index is shifted down by the
//! number of removed entries that sat before it.

use std::ops::Range;

use thiserror::Error;

use super::actions::{Action, is_within};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReorderError {
    #[error("cannot drop group {0:?} onto itself or one of its subgroups")]
    DropIntoSelf(String),
    #[error("source index {index} is out of range (store holds {len} actions)")]
    SourceOutOfRange { index: usize, len: usize },
    #[error("nothing to move")]
    EmptySelection,
    #[error("group {0:?} has no actions")]
    UnknownGroup(String),
}

/// What is being dragged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DragPayload {
    Actions(Vec<usize>),
    Group(String),
}

/// Where it is dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropTarget {
    /// Onto an action node: land directly after it, inside its group.
    Action(usize),
    /// Onto a group node: land after the last member of that group.
    Group(String),
    /// Empty space: root level, after the last ungrouped action.
    Empty,
}

/// Group and insertion index a drop target resolves to, computed against
/// the list before anything is removed.
pub fn resolve_target(
    actions: &[Action],
    target: &DropTarget,
) -> Result<(Option<String>, usize), ReorderError> {
    match target {
        DropTarget::Action(index) => {
            let action = actions.get(*index).ok_or(ReorderError::SourceOutOfRange {
                index: *index,
                len: actions.len(),
            })?;
            Ok((action.group_path.clone(), index + 1))
        }
        DropTarget::Group(path) => {
            let last = actions
                .iter()
                .rposition(|a| a.is_in_group(path))
                .ok_or_else(|| ReorderError::UnknownGroup(path.clone()))?;
            Ok((Some(path.clone()), last + 1))
        }
        DropTarget::Empty => {
            let index = actions
                .iter()
                .rposition(|a| a.group_path.is_none())
                .map(|i| i + 1)
                .unwrap_or(actions.len());
            Ok((None, index))
        }
    }
}

/// Move one action into `target_group` at `insertion_index`.
///
/// Within the same group this is a pure positional move. Returns the final
/// index of the action.
pub fn move_action(
    actions: &mut Vec<Action>,
    source: usize,
    target_group: Option<&str>,
    insertion_index: usize,
) -> Result<usize, ReorderError> {
    move_actions(actions, &[source], target_group, insertion_index).map(|range| range.start)
}

/// Move several actions as one block, regrouping each to `target_group`.
///
/// The block keeps the relative store order of its members. Returns the
/// index range the block occupies afterwards.
pub fn move_actions(
    actions: &mut Vec<Action>,
    sources: &[usize],
    target_group: Option<&str>,
    insertion_index: usize,
) -> Result<Range<usize>, ReorderError> {
    let mut block = splice_out(actions, sources, insertion_index)?;
    for action in &mut block.items {
        if action.group() != target_group {
            action.set_group(target_group);
        }
    }
    Ok(block.insert_into(actions))
}

/// Move every action of `source_group` (and its subgroups) as one block.
///
/// Group paths are left untouched: only the position in sibling order
/// changes.
pub fn move_group(
    actions: &mut Vec<Action>,
    source_group: &str,
    insertion_index: usize,
) -> Result<Range<usize>, ReorderError> {
    let members: Vec<usize> = actions
        .iter()
        .enumerate()
        .filter(|(_, a)| a.is_in_group(source_group))
        .map(|(i, _)| i)
        .collect();
    if members.is_empty() {
        return Err(ReorderError::UnknownGroup(source_group.to_string()));
    }

    let block = splice_out(actions, &members, insertion_index)?;
    Ok(block.insert_into(actions))
}

/// Apply a drag-and-drop intent. Returns the range the moved entries occupy.
pub fn apply_drop(
    actions: &mut Vec<Action>,
    payload: &DragPayload,
    target: &DropTarget,
) -> Result<Range<usize>, ReorderError> {
    if let DragPayload::Group(source) = payload {
        let into_self = match target {
            DropTarget::Group(path) => is_within(path, source),
            DropTarget::Action(index) => actions.get(*index).is_some_and(|a| a.is_in_group(source)),
            DropTarget::Empty => false,
        };
        if into_self {
            return Err(ReorderError::DropIntoSelf(source.clone()));
        }
    }

    let (group, index) = resolve_target(actions, target)?;
    let range = match payload {
        DragPayload::Actions(sources) => move_actions(actions, sources, group.as_deref(), index)?,
        DragPayload::Group(source) => move_group(actions, source, index)?,
    };

    tracing::debug!("Drop {:?} onto {:?} -> {:?}", payload, target, range);
    Ok(range)
}

/// Swap an action with the previous action of the same group.
pub fn move_up(actions: &mut Vec<Action>, index: usize) -> Option<usize> {
    let group = actions.get(index)?.group_path.clone();
    let prev = actions[..index]
        .iter()
        .rposition(|a| a.group_path == group)?;
    move_action(actions, index, group.as_deref(), prev).ok()
}

/// Swap an action with the next action of the same group.
pub fn move_down(actions: &mut Vec<Action>, index: usize) -> Option<usize> {
    let group = actions.get(index)?.group_path.clone();
    let next = actions[index + 1..]
        .iter()
        .position(|a| a.group_path == group)?
        + index
        + 1;
    move_action(actions, index, group.as_deref(), next + 1).ok()
}

struct Block {
    items: Vec<Action>,
    at: usize,
}

impl Block {
    fn insert_into(self, actions: &mut Vec<Action>) -> Range<usize> {
        let at = self.at.min(actions.len());
        let len = self.items.len();
        actions.splice(at..at, self.items);
        at..at + len
    }
}

/// Remove `sources` and compute where the block goes back in.
fn splice_out(
    actions: &mut Vec<Action>,
    sources: &[usize],
    insertion_index: usize,
) -> Result<Block, ReorderError> {
    if sources.is_empty() {
        return Err(ReorderError::EmptySelection);
    }

    let mut sorted = sources.to_vec();
    sorted.sort_unstable();
    sorted.dedup();
    if let Some(&max) = sorted.last() {
        if max >= actions.len() {
            return Err(ReorderError::SourceOutOfRange {
                index: max,
                len: actions.len(),
            });
        }
    }

    let before = sorted.iter().filter(|&&i| i < insertion_index).count();

    // Descending so earlier indices stay valid while removing
    let mut items: Vec<Action> = sorted.iter().rev().map(|&i| actions.remove(i)).collect();
    items.reverse();

    Ok(Block {
        items,
        at: insertion_index.saturating_sub(before),
    })
}
