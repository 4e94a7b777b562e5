//! Derives the group hierarchy from the flat action list.
//!
//! Nothing here is stored: every call projects the current store into one
//! level of the tree, so the view can never drift from the list.

use super::actions::{Action, GROUP_SEPARATOR, is_within, last_segment};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupNode {
    pub path: String,
    pub display_name: String,
    pub expanded: bool,
    pub descendant_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionNode<'a> {
    pub action: &'a Action,
    pub store_index: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeNode<'a> {
    Group(GroupNode),
    Action(ActionNode<'a>),
}

impl<'a> TreeNode<'a> {
    pub fn as_action(&self) -> Option<&'a Action> {
        match self {
            TreeNode::Action(a) => Some(a.action),
            TreeNode::Group(_) => None,
        }
    }
}

/// A node of the depth-first listing produced by [`flatten_visible`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisibleRow<'a> {
    pub depth: usize,
    pub node: TreeNode<'a>,
}

/// Read-only inputs shared by every level query.
pub struct TreeQuery<'a, F> {
    actions: &'a [Action],
    expanded: F,
    filter: Option<String>,
}

impl<'a, F> TreeQuery<'a, F>
where
    F: Fn(&str) -> bool,
{
    /// `expanded` looks up stored expansion state; `filter` is matched
    /// case-insensitively and ignored when blank.
    pub fn new(actions: &'a [Action], expanded: F, filter: Option<&str>) -> Self {
        let filter = filter
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .map(str::to_lowercase);
        Self {
            actions,
            expanded,
            filter,
        }
    }

    pub fn is_filtering(&self) -> bool {
        self.filter.is_some()
    }

    fn matching(&self) -> impl Iterator<Item = (usize, &'a Action)> + '_ {
        let actions: &'a [Action] = self.actions;
        actions
            .iter()
            .enumerate()
            .filter(move |(_, a)| match &self.filter {
                Some(needle) => a.matches_filter(needle),
                None => true,
            })
    }

    fn is_expanded(&self, path: &str) -> bool {
        self.is_filtering() || (self.expanded)(path)
    }

    /// Number of matching actions in `path` or any subgroup.
    pub fn descendant_count(&self, path: &str) -> usize {
        self.matching().filter(|(_, a)| a.is_in_group(path)).count()
    }

    fn group_node(&self, path: String) -> GroupNode {
        GroupNode {
            display_name: last_segment(&path).to_string(),
            expanded: self.is_expanded(&path),
            descendant_count: self.descendant_count(&path),
            path,
        }
    }

    /// One level of the tree: the root when `parent` is `None`, otherwise the
    /// children of that group.
    ///
    /// Subgroups come first, ordered by first appearance in the store, then
    /// the actions that sit directly at this level in store order.
    pub fn children(&self, parent: Option<&str>) -> Vec<TreeNode<'a>> {
        let mut subgroups: Vec<String> = Vec::new();
        let mut direct: Vec<TreeNode<'a>> = Vec::new();

        for (index, action) in self.matching() {
            let child_segment = match (parent, action.group()) {
                (None, None) => None,
                (None, Some(group)) => Some(group.split(GROUP_SEPARATOR).next().unwrap_or(group)),
                (Some(_), None) => continue,
                (Some(p), Some(group)) if group == p => None,
                (Some(p), Some(group)) => {
                    if !is_within(group, p) {
                        continue;
                    }
                    let rest = &group[p.len() + 1..];
                    Some(rest.split(GROUP_SEPARATOR).next().unwrap_or(rest))
                }
            };

            match child_segment {
                Some(segment) => {
                    let path = match parent {
                        Some(p) => format!("{}/{}", p, segment),
                        None => segment.to_string(),
                    };
                    if !subgroups.contains(&path) {
                        subgroups.push(path);
                    }
                }
                None => direct.push(TreeNode::Action(ActionNode {
                    action,
                    store_index: index,
                })),
            }
        }

        subgroups
            .into_iter()
            .map(|path| TreeNode::Group(self.group_node(path)))
            .chain(direct)
            .collect()
    }

    /// Depth-first listing of everything currently visible, descending only
    /// into expanded groups.
    pub fn flatten_visible(&self) -> Vec<VisibleRow<'a>> {
        let mut rows = Vec::new();
        self.flatten_into(None, 0, &mut rows);
        rows
    }

    fn flatten_into(&self, parent: Option<&str>, depth: usize, rows: &mut Vec<VisibleRow<'a>>) {
        for node in self.children(parent) {
            let descend = match &node {
                TreeNode::Group(g) if g.expanded => Some(g.path.clone()),
                _ => None,
            };
            rows.push(VisibleRow { depth, node });
            if let Some(path) = descend {
                self.flatten_into(Some(&path), depth + 1, rows);
            }
        }
    }
}

/// Every distinct group path prefix, in order of first appearance.
pub fn all_group_paths(actions: &[Action]) -> Vec<String> {
    let mut paths: Vec<String> = Vec::new();
    for action in actions {
        let mut prefix = String::new();
        for segment in action.group_segments() {
            if !prefix.is_empty() {
                prefix.push(GROUP_SEPARATOR);
            }
            prefix.push_str(segment);
            if !paths.contains(&prefix) {
                paths.push(prefix.clone());
            }
        }
    }
    paths
}
