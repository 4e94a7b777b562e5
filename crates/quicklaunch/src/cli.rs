use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use thiserror::Error;
use utils::assets::AssetError;

use crate::external::{Platform, StdinPrompt, available_profiles, default_profile, edit_action};
use crate::state::tree::TreeQuery;
use crate::state::{Action, Notice, ProgramEntry, TerminalMode, UrlEntry};
use crate::storage::ImportMode;
use crate::workspace::Workspace;

#[derive(Parser, Debug)]
#[command(name = "ql")]
#[command(about = "Personal command launcher")]
#[command(version)]
/// Command-line arguments.
pub struct Cli {
    /// Subcommand to execute; opens the interactive tree when omitted.
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run an action by name or Group/Sub/Name
    Run { name: String },
    /// Print the action tree
    List {
        /// Only show actions matching this text
        #[arg(long, short = 'f')]
        filter: Option<String>,
        /// Print the matching actions as JSON
        #[arg(long)]
        json: bool,
    },
    /// Add an action (opens $EDITOR unless --name is given)
    Add(AddArgs),
    /// Edit an action in $EDITOR
    Edit { name: String },
    /// Delete an action
    Delete { name: String },
    /// Write all actions to a file
    Export { path: PathBuf },
    /// Read actions from a file
    Import {
        path: PathBuf,
        /// Keep existing actions and append new ones (default)
        #[arg(long, conflicts_with = "replace")]
        merge: bool,
        /// Discard existing actions
        #[arg(long)]
        replace: bool,
    },
    /// Rename a group and all of its subgroups
    RenameGroup { old: String, new: String },
    /// Move a group's actions and subgroups one level up
    Ungroup { path: String },
    /// List the terminal profiles detected on this machine
    Profiles,
}

#[derive(Args, Debug, Default)]
pub struct AddArgs {
    #[arg(long)]
    pub name: Option<String>,
    /// Slash-delimited group path, e.g. Dev/Backend
    #[arg(long)]
    pub group: Option<String>,
    /// Shell command; repeat for several
    #[arg(long = "cmd")]
    pub commands: Vec<String>,
    /// URL opened with the system handler; repeat for several
    #[arg(long = "url")]
    pub urls: Vec<String>,
    /// Program path; repeat for several
    #[arg(long = "program")]
    pub programs: Vec<String>,
    /// Run shell commands in a new terminal window
    #[arg(long)]
    pub external: bool,
}

impl AddArgs {
    fn into_action(self, name: String) -> Action {
        let mut action = Action::new(name);
        action.set_group(self.group.as_deref());
        action.shell_commands = self.commands;
        action.urls = self
            .urls
            .into_iter()
            .map(|url| UrlEntry { url, external: true })
            .collect();
        action.programs = self
            .programs
            .into_iter()
            .map(|path| ProgramEntry { path, args: None })
            .collect();
        if self.external {
            action.terminal_mode = TerminalMode::External;
        }
        action
    }
}

#[derive(Debug, Error)]
pub enum CliError {
    #[error("no action named {0:?}")]
    NotFound(String),
    #[error("no place to store commands: {0}")]
    NoPersistenceTarget(#[from] AssetError),
    #[error("{0:#}")]
    Other(#[from] anyhow::Error),
}

impl CliError {
    pub fn exit_code(&self) -> u8 {
        match self {
            CliError::NotFound(_) => 1,
            CliError::NoPersistenceTarget(_) => 2,
            CliError::Other(_) => 3,
        }
    }
}

fn report(notices: &[Notice]) {
    for notice in notices {
        eprintln!("{}", notice);
    }
}

fn lookup(ws: &Workspace, name: &str) -> Result<usize, CliError> {
    ws.store
        .find_by_name(name)
        .ok_or_else(|| CliError::NotFound(name.to_string()))
}

fn save(ws: &Workspace) -> Result<(), CliError> {
    ws.store
        .try_persist()
        .with_context(|| format!("could not save {:?}", ws.store.path()))?;
    Ok(())
}

pub async fn execute(command: Command) -> Result<(), CliError> {
    let mut ws = Workspace::open()?;
    report(&ws.notices);

    match command {
        Command::Run { name } => {
            let index = lookup(&ws, &name)?;
            let action = ws.store.actions()[index].clone();
            let dispatcher = ws.dispatcher();

            let handle = dispatcher.run(&action, &StdinPrompt).await;
            let notices = handle.settle().await;
            report(&notices);
            if let Some(failure) = notices.iter().find(|n| n.is_error()) {
                return Err(anyhow::anyhow!("{}", failure.message).into());
            }
        }
        Command::List { filter, json } => {
            list(&ws, filter.as_deref(), json)?;
        }
        Command::Add(args) => {
            let action = match args.name.clone() {
                Some(name) => args.into_action(name),
                None => {
                    let template = Action::new("New action");
                    match edit_action(&template)? {
                        Some(action) => action,
                        None => {
                            eprintln!("Add cancelled");
                            return Ok(());
                        }
                    }
                }
            };
            println!("Added {}", action.qualified_name());
            ws.store.actions_mut().push(action);
            save(&ws)?;
        }
        Command::Edit { name } => {
            let index = lookup(&ws, &name)?;
            match edit_action(&ws.store.actions()[index])? {
                Some(action) => {
                    println!("Updated {}", action.qualified_name());
                    ws.store.actions_mut()[index] = action;
                    save(&ws)?;
                }
                None => eprintln!("Edit cancelled"),
            }
        }
        Command::Delete { name } => {
            let index = lookup(&ws, &name)?;
            let removed = ws.store.actions_mut().remove(index);
            save(&ws)?;
            println!("Deleted {}", removed.qualified_name());
        }
        Command::Export { path } => {
            ws.store
                .export_to(&path)
                .with_context(|| format!("export to {:?} failed", path))?;
            println!("Exported {} actions to {}", ws.store.len(), path.display());
        }
        Command::Import { path, replace, .. } => {
            let mode = if replace { ImportMode::Replace } else { ImportMode::Merge };
            let summary = ws
                .store
                .import_from(&path, mode)
                .with_context(|| format!("import from {:?} failed", path))?;
            save(&ws)?;
            println!(
                "Imported {} actions ({} already present)",
                summary.added, summary.skipped
            );
        }
        Command::RenameGroup { old, new } => {
            let (touched, notices) = ws.rename_group(&old, &new);
            if touched == 0 {
                return Err(CliError::NotFound(old));
            }
            report(&notices);
            if notices.iter().any(Notice::is_error) {
                return Err(anyhow::anyhow!("rename was not saved").into());
            }
            println!("Moved {} actions from {} to {}", touched, old, new);
        }
        Command::Ungroup { path } => {
            let (touched, notices) = ws.ungroup(&path);
            if touched == 0 {
                return Err(CliError::NotFound(path));
            }
            report(&notices);
            if notices.iter().any(Notice::is_error) {
                return Err(anyhow::anyhow!("ungroup was not saved").into());
            }
            println!("Lifted {} actions out of {}", touched, path);
        }
        Command::Profiles => print_profiles(),
    }

    Ok(())
}

fn list(ws: &Workspace, filter: Option<&str>, json: bool) -> anyhow::Result<()> {
    let query = TreeQuery::new(ws.store.actions(), |_: &str| true, filter);
    let rows = query.flatten_visible();

    if json {
        let actions: Vec<&Action> = rows.iter().filter_map(|row| row.node.as_action()).collect();
        println!("{}", serde_json::to_string_pretty(&actions)?);
        return Ok(());
    }

    for line in render_list(&rows) {
        println!("{}", line);
    }
    Ok(())
}

fn render_list(rows: &[crate::state::tree::VisibleRow]) -> Vec<String> {
    use crate::state::tree::TreeNode;

    rows.iter()
        .map(|row| {
            let indent = "  ".repeat(row.depth);
            match &row.node {
                TreeNode::Group(group) => {
                    format!("{}{}/ ({})", indent, group.display_name, group.descendant_count)
                }
                TreeNode::Action(node) => {
                    format!("{}{}  [{}]", indent, node.action.name, node.action.summary())
                }
            }
        })
        .collect()
}

fn print_profiles() {
    let profiles = available_profiles();
    let default = default_profile(profiles, Platform::current()).map(|p| p.name.clone());
    if profiles.is_empty() {
        println!("No terminal profiles detected");
        return;
    }
    for profile in profiles {
        let marker = if Some(&profile.name) == default.as_ref() { "*" } else { " " };
        println!("{} {:<16} {}", marker, profile.name, profile.path.display());
    }
}
