use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Separator between the segments of a group path ("Dev/Backend").
pub const GROUP_SEPARATOR: char = '/';

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TerminalMode {
    #[default]
    Internal,
    External,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawUrlEntry")]
pub struct UrlEntry {
    pub url: String,
    #[serde(default)]
    pub external: bool,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawUrlEntry {
    Bare(String),
    Full {
        url: String,
        #[serde(default)]
        external: bool,
    },
}

impl From<RawUrlEntry> for UrlEntry {
    fn from(raw: RawUrlEntry) -> Self {
        match raw {
            RawUrlEntry::Bare(url) => UrlEntry {
                url,
                external: true,
            },
            RawUrlEntry::Full { url, external } => UrlEntry { url, external },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramEntry {
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<String>,
}

/// One launchable entry.
///
/// Always holds the normalized shape: deprecated single-value fields are
/// folded into `urls`/`programs` while deserializing and never written back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "RawAction")]
pub struct Action {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_path: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub shell_commands: Vec<String>,
    pub terminal_mode: TerminalMode,
    pub auto_close: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub terminal_profile_name: Option<String>,
    pub run_as_admin: bool,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub urls: Vec<UrlEntry>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub programs: Vec<ProgramEntry>,
}

/// Legacy `args`: either a single string or a list of tokens.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum LegacyArgs {
    Line(String),
    Tokens(Vec<String>),
}

impl LegacyArgs {
    fn into_line(self) -> Option<String> {
        let line = match self {
            LegacyArgs::Line(line) => line,
            LegacyArgs::Tokens(tokens) => tokens.join(" "),
        };
        if line.trim().is_empty() {
            None
        } else {
            Some(line)
        }
    }
}

/// On-disk shape accepted when reading, including the deprecated aliases.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawAction {
    pub name: String,
    pub group_path: Option<String>,
    pub shell_commands: Vec<String>,
    pub terminal_mode: TerminalMode,
    pub auto_close: bool,
    pub terminal_profile_name: Option<String>,
    pub run_as_admin: bool,
    pub env: BTreeMap<String, String>,
    pub urls: Vec<UrlEntry>,
    pub programs: Vec<ProgramEntry>,

    // Deprecated single-value fields
    pub url: Option<String>,
    pub program: Option<String>,
    pub args: Option<LegacyArgs>,
}

impl From<RawAction> for Action {
    fn from(raw: RawAction) -> Self {
        raw.normalize()
    }
}

impl RawAction {
    /// Fold the deprecated fields into the array fields.
    ///
    /// Legacy values only apply when the matching array is empty, so an
    /// already-normalized entry passes through unchanged.
    pub fn normalize(self) -> Action {
        let mut urls = self.urls;
        if urls.is_empty() {
            if let Some(url) = self.url.filter(|u| !u.trim().is_empty()) {
                urls.push(UrlEntry {
                    url,
                    external: true,
                });
            }
        }

        let mut programs = self.programs;
        if programs.is_empty() {
            if let Some(path) = self.program.filter(|p| !p.trim().is_empty()) {
                programs.push(ProgramEntry {
                    path,
                    args: self.args.and_then(LegacyArgs::into_line),
                });
            }
        }

        Action {
            name: self.name,
            group_path: normalize_group_path(self.group_path.as_deref()),
            shell_commands: self.shell_commands,
            terminal_mode: self.terminal_mode,
            auto_close: self.auto_close,
            terminal_profile_name: self
                .terminal_profile_name
                .filter(|p| !p.trim().is_empty()),
            run_as_admin: self.run_as_admin,
            env: self.env,
            urls,
            programs,
        }
    }
}

/// Trim separators and drop empty segments; an empty result means root.
pub fn normalize_group_path(path: Option<&str>) -> Option<String> {
    let path = path?;
    let joined = path
        .split(GROUP_SEPARATOR)
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join("/");
    if joined.is_empty() { None } else { Some(joined) }
}

/// True when `group` equals `path` or is nested below it.
pub fn is_within(group: &str, path: &str) -> bool {
    group == path
        || (group.len() > path.len()
            && group.starts_with(path)
            && group.as_bytes()[path.len()] == GROUP_SEPARATOR as u8)
}

/// Last segment of a group path, used as its display name.
pub fn last_segment(path: &str) -> &str {
    path.rsplit(GROUP_SEPARATOR).next().unwrap_or(path)
}

/// Parent of a group path, `None` for a top-level group.
pub fn parent_path(path: &str) -> Option<&str> {
    path.rfind(GROUP_SEPARATOR).map(|idx| &path[..idx])
}

impl Action {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            group_path: None,
            shell_commands: Vec::new(),
            terminal_mode: TerminalMode::Internal,
            auto_close: false,
            terminal_profile_name: None,
            run_as_admin: false,
            env: BTreeMap::new(),
            urls: Vec::new(),
            programs: Vec::new(),
        }
    }

    pub fn group(&self) -> Option<&str> {
        self.group_path.as_deref()
    }

    pub fn in_group(mut self, group: &str) -> Self {
        self.group_path = normalize_group_path(Some(group));
        self
    }

    pub fn set_group(&mut self, group: Option<&str>) {
        self.group_path = normalize_group_path(group);
    }

    /// True when the action sits in `path` or any of its subgroups.
    pub fn is_in_group(&self, path: &str) -> bool {
        self.group().is_some_and(|group| is_within(group, path))
    }

    pub fn group_segments(&self) -> impl Iterator<Item = &str> {
        self.group()
            .into_iter()
            .flat_map(|group| group.split(GROUP_SEPARATOR))
    }

    /// `Group/Sub/Name`, or the bare name at root level.
    pub fn qualified_name(&self) -> String {
        match self.group() {
            Some(group) => format!("{}/{}", group, self.name),
            None => self.name.clone(),
        }
    }

    /// Case-insensitive substring match. `needle` must already be lowercased.
    pub fn matches_filter(&self, needle: &str) -> bool {
        if needle.is_empty() {
            return true;
        }
        let hit = |text: &str| text.to_lowercase().contains(needle);

        hit(&self.name)
            || self.group().is_some_and(hit)
            || self.shell_commands.iter().any(|c| hit(c))
            || self.urls.iter().any(|u| hit(&u.url))
            || self.programs.iter().any(|p| hit(&p.path))
    }

    pub fn has_effects(&self) -> bool {
        !self.shell_commands.is_empty() || !self.urls.is_empty() || !self.programs.is_empty()
    }

    /// Short one-line description for list views.
    pub fn summary(&self) -> String {
        let mut parts = Vec::new();
        if !self.shell_commands.is_empty() {
            parts.push(format!("{} cmd", self.shell_commands.len()));
        }
        if !self.urls.is_empty() {
            parts.push(format!("{} url", self.urls.len()));
        }
        if !self.programs.is_empty() {
            parts.push(format!("{} prog", self.programs.len()));
        }
        if parts.is_empty() {
            "empty".to_string()
        } else {
            parts.join(", ")
        }
    }
}
