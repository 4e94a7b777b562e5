use anyhow::Result;
use crossterm::event::KeyEvent;

use crate::external::{
    Dispatcher, EffectSink, StdinPrompt, SystemSink, edit_action, edit_in_editor, extract_placeholders,
};
use crate::input::{EventStream, UiAction, key_to_action};
use crate::state::reorder::{self, DropTarget};
use crate::state::tree::{TreeQuery, VisibleRow, all_group_paths};
use crate::state::{
    Action, AppState, GROUP_SEPARATOR, Modal, Notice, Selection, parent_path,
};
use crate::terminal::Terminal;
use crate::ui::{
    HeaderInfo, main_layout, render_detail, render_footer, render_header, render_modal,
    render_tree,
};
use crate::workspace::Workspace;

pub struct App {
    ws: Workspace,
    state: AppState,
    events: EventStream,
    dispatcher: Dispatcher<SystemSink>,
}

/// True when running `action` needs the real terminal: a shell on the host
/// terminal or a placeholder prompt.
fn needs_terminal<S: EffectSink>(dispatcher: &Dispatcher<S>, action: &Action) -> bool {
    let host_shell = dispatcher.uses_host_terminal(action);

    let texts = action
        .shell_commands
        .iter()
        .chain(action.urls.iter().map(|u| &u.url))
        .chain(action.programs.iter().map(|p| &p.path))
        .chain(action.programs.iter().filter_map(|p| p.args.as_ref()));

    host_shell || texts.into_iter().any(|t| !extract_placeholders(t).is_empty())
}

impl App {
    pub fn new(mut ws: Workspace) -> Self {
        let mut state = AppState::new();
        state.push_notices(ws.notices.drain(..));
        let dispatcher = ws.dispatcher();

        Self {
            ws,
            state,
            events: EventStream::new(),
            dispatcher,
        }
    }

    pub async fn run(&mut self, terminal: &mut Terminal) -> Result<()> {
        loop {
            self.render(terminal)?;

            if let Some(key) = self.events.next_key().await? {
                self.handle_key(key, terminal).await?;
            }

            if self.state.should_quit {
                break;
            }
        }

        Ok(())
    }

    fn query(&self) -> TreeQuery<'_, impl Fn(&str) -> bool + '_> {
        let filter = self
            .state
            .filter_input
            .as_deref()
            .or(self.ws.view.filter());
        let view = &self.ws.view;
        TreeQuery::new(
            self.ws.store.actions(),
            move |path: &str| view.is_expanded(path),
            filter,
        )
    }

    fn rows(&self) -> Vec<VisibleRow<'_>> {
        self.query().flatten_visible()
    }

    fn selection(&self) -> Option<Selection> {
        self.rows()
            .get(self.state.cursor)
            .map(|row| Selection::of(&row.node))
    }

    /// Put the cursor on `target` if it is visible.
    fn focus(&mut self, target: &Selection) {
        let found = self.rows().iter().position(|row| target.matches(&row.node));
        if let Some(pos) = found {
            self.state.cursor = pos;
        }
    }

    /// Expand every ancestor of `group` so its members are visible.
    fn reveal(&mut self, group: Option<&str>) {
        let Some(group) = group else {
            return;
        };
        let mut prefix = String::new();
        for segment in group.split(GROUP_SEPARATOR) {
            if !prefix.is_empty() {
                prefix.push(GROUP_SEPARATOR);
            }
            prefix.push_str(segment);
            let notice = self.ws.view.set_expanded(&prefix, true);
            self.state.push_notices(notice);
        }
    }

    fn render(&mut self, terminal: &mut Terminal) -> Result<()> {
        let len = self.rows().len();
        self.state.clamp_cursor(len);

        let rows = self.rows();
        let selected = rows
            .get(self.state.cursor)
            .and_then(|row| row.node.as_action());
        let store_path = self.ws.store.path().display().to_string();
        let info = HeaderInfo {
            store_path: &store_path,
            action_count: self.ws.store.len(),
            filter: self.ws.view.filter(),
        };
        let state = &self.state;

        terminal.draw(|frame| {
            let (header, tree, detail, footer) = main_layout(frame.area());

            render_header(frame, header, &info);
            render_tree(frame, tree, &rows, state);
            render_detail(frame, detail, selected);
            render_footer(frame, footer, state);

            if let Some(modal) = &state.modal {
                render_modal(frame, frame.area(), modal);
            }
        })
    }

    async fn handle_key(&mut self, key: KeyEvent, terminal: &mut Terminal) -> Result<()> {
        let Some(action) = key_to_action(key, self.state.input_mode()) else {
            return Ok(());
        };

        match action {
            UiAction::Activate => match self.selection() {
                Some(Selection::Action(index)) => self.run_action(index, terminal).await?,
                Some(Selection::Group(path)) => {
                    let notice = self.ws.view.toggle(&path);
                    self.state.push_notices(notice);
                }
                None => {}
            },
            UiAction::Add => self.handle_add(terminal)?,
            UiAction::Edit => self.handle_edit(terminal)?,
            other => self.apply(other),
        }

        Ok(())
    }

    /// Everything that never leaves the UI.
    fn apply(&mut self, action: UiAction) {
        match action {
            UiAction::Quit => self.state.should_quit = true,
            UiAction::Back => self.handle_back(),
            UiAction::ShowHelp => self.state.modal = Some(Modal::Help),
            UiAction::Confirm => self.handle_confirm(),

            UiAction::Up => self.state.select_prev(),
            UiAction::Down => {
                let len = self.rows().len();
                self.state.select_next(len);
            }
            UiAction::Activate => {
                if let Some(Selection::Group(path)) = self.selection() {
                    let notice = self.ws.view.toggle(&path);
                    self.state.push_notices(notice);
                }
            }
            UiAction::Collapse => self.handle_collapse(),
            UiAction::ExpandAll => {
                let paths = all_group_paths(self.ws.store.actions());
                let notice = self.ws.view.expand_all(paths.iter().map(String::as_str));
                self.state.push_notices(notice);
            }
            UiAction::CollapseAll => {
                let notice = self.ws.view.collapse_all();
                self.state.push_notices(notice);
                self.state.cursor = 0;
            }

            UiAction::Delete => self.request_delete(),
            UiAction::Duplicate => self.handle_duplicate(),
            UiAction::Ungroup => self.handle_ungroup(),

            UiAction::PickUp => {
                if let Some(selection) = self.selection() {
                    self.state.pick_up(selection);
                }
            }
            UiAction::DropOnCursor => {
                if let Some(selection) = self.selection() {
                    self.handle_drop(selection.drop_target());
                }
            }
            UiAction::DropOnRoot => self.handle_drop(DropTarget::Empty),
            UiAction::MoveUp => self.handle_shift(true),
            UiAction::MoveDown => self.handle_shift(false),

            UiAction::StartFilter => {
                self.state.filter_input = Some(self.ws.view.filter().unwrap_or_default().to_string());
            }
            UiAction::FilterType(c) => {
                if let Some(input) = &mut self.state.filter_input {
                    input.push(c);
                }
                self.state.cursor = 0;
            }
            UiAction::FilterBackspace => {
                if let Some(input) = &mut self.state.filter_input {
                    input.pop();
                }
                self.state.cursor = 0;
            }
            UiAction::FilterConfirm => {
                let text = self.state.filter_input.take();
                let notice = self.ws.view.set_filter(text);
                self.state.push_notices(notice);
            }
            UiAction::FilterCancel => {
                self.state.filter_input = None;
            }

            // Need the terminal; routed by handle_key
            UiAction::Add | UiAction::Edit => {}
        }
    }

    fn handle_back(&mut self) {
        if self.state.modal.take().is_some() {
            return;
        }
        if self.state.drag.take().is_some() {
            self.state.push_notices([Notice::info("Drag cancelled")]);
            return;
        }
        if self.ws.view.filter().is_some() {
            let notice = self.ws.view.set_filter(None);
            self.state.push_notices(notice);
            self.state.cursor = 0;
        }
    }

    fn handle_collapse(&mut self) {
        let Some(selection) = self.selection() else {
            return;
        };
        let filtering = self.query().is_filtering();

        let parent = match &selection {
            Selection::Group(path) => {
                if !filtering && self.ws.view.is_expanded(path) {
                    let notice = self.ws.view.set_expanded(path, false);
                    self.state.push_notices(notice);
                    return;
                }
                parent_path(path).map(str::to_string)
            }
            Selection::Action(index) => self
                .ws
                .store
                .get(*index)
                .and_then(|a| a.group().map(str::to_string)),
        };

        if let Some(parent) = parent {
            self.focus(&Selection::Group(parent));
        }
    }

    /// Group the cursor is in, where new actions land.
    fn current_group(&self) -> Option<String> {
        match self.selection()? {
            Selection::Group(path) => Some(path),
            Selection::Action(index) => self.ws.store.get(index)?.group().map(str::to_string),
        }
    }

    async fn run_action(&mut self, index: usize, terminal: &mut Terminal) -> Result<()> {
        let Some(action) = self.ws.store.get(index).cloned() else {
            return Ok(());
        };
        if !action.has_effects() {
            self.state
                .push_notices([Notice::info(format!("{} has nothing to run", action.name))]);
            return Ok(());
        }

        let foreground = needs_terminal(&self.dispatcher, &action);
        if foreground {
            terminal.suspend()?;
            println!("> {}", action.qualified_name());
        }

        let handle = self.dispatcher.run(&action, &StdinPrompt).await;
        let notices = handle.settle().await;

        if foreground {
            terminal.resume()?;
        }

        if notices.is_empty() {
            self.state
                .push_notices([Notice::info(format!("Ran {}", action.qualified_name()))]);
        } else {
            self.state.push_notices(notices);
        }
        Ok(())
    }

    fn handle_add(&mut self, terminal: &mut Terminal) -> Result<()> {
        let mut template = Action::new("New action");
        template.set_group(self.current_group().as_deref());

        terminal.suspend()?;
        let edited = edit_action(&template);
        terminal.resume()?;

        match edited {
            Ok(Some(action)) => {
                let group = action.group_path.clone();
                let name = action.qualified_name();
                let notice = self.ws.store.append(action);
                self.state.drag = None;
                self.state.push_notices([Notice::info(format!("Added {}", name))]);
                self.state.push_notices(notice);
                self.reveal(group.as_deref());
                self.focus(&Selection::Action(self.ws.store.len() - 1));
            }
            Ok(None) => self.state.push_notices([Notice::info("Add cancelled")]),
            Err(e) => self
                .state
                .push_notices([Notice::error(format!("Add failed: {:#}", e))]),
        }
        Ok(())
    }

    fn handle_edit(&mut self, terminal: &mut Terminal) -> Result<()> {
        match self.selection() {
            Some(Selection::Action(index)) => self.edit_action_at(index, terminal),
            Some(Selection::Group(path)) => self.rename_group(&path, terminal),
            None => Ok(()),
        }
    }

    fn edit_action_at(&mut self, index: usize, terminal: &mut Terminal) -> Result<()> {
        let Some(original) = self.ws.store.get(index).cloned() else {
            return Ok(());
        };

        terminal.suspend()?;
        let edited = edit_action(&original);
        terminal.resume()?;

        match edited {
            Ok(Some(action)) => {
                let group = action.group_path.clone();
                match self.ws.store.update_at(index, action) {
                    Ok(notice) => self.state.push_notices(notice),
                    Err(e) => self.state.push_notices([Notice::error(e.to_string())]),
                }
                self.reveal(group.as_deref());
                self.focus(&Selection::Action(index));
            }
            Ok(None) => {}
            Err(e) => self
                .state
                .push_notices([Notice::error(format!("Edit discarded: {:#}", e))]),
        }
        Ok(())
    }

    /// Edit a group path as one line of text.
    fn rename_group(&mut self, path: &str, terminal: &mut Terminal) -> Result<()> {
        terminal.suspend()?;
        let edited = edit_in_editor(path, "txt");
        terminal.resume()?;

        let new_path = match edited {
            Ok(Some(text)) => text.trim().to_string(),
            Ok(None) => return Ok(()),
            Err(e) => {
                self.state
                    .push_notices([Notice::error(format!("Rename failed: {:#}", e))]);
                return Ok(());
            }
        };

        let (touched, notices) = self.ws.rename_group(path, &new_path);
        self.state.drag = None;
        self.state.push_notices(notices);
        self.state.push_notices([Notice::info(format!(
            "Moved {} actions from {} to {}",
            touched, path, new_path
        ))]);
        if let Some(new_path) = crate::state::normalize_group_path(Some(new_path.as_str())) {
            self.reveal(parent_path(&new_path));
            self.focus(&Selection::Group(new_path));
        }
        Ok(())
    }

    fn request_delete(&mut self) {
        let Some(target) = self.selection() else {
            return;
        };
        let label = match &target {
            Selection::Action(index) => match self.ws.store.get(*index) {
                Some(action) => action.qualified_name(),
                None => return,
            },
            Selection::Group(path) => {
                let count = self
                    .ws
                    .store
                    .actions()
                    .iter()
                    .filter(|a| a.is_in_group(path))
                    .count();
                format!("group {} and its {} actions", path, count)
            }
        };
        self.state.modal = Some(Modal::ConfirmDelete { target, label });
    }

    fn handle_confirm(&mut self) {
        let Some(Modal::ConfirmDelete { target, label }) = self.state.modal.take() else {
            return;
        };
        self.state.drag = None;

        match target {
            Selection::Action(index) => match self.ws.store.remove_at(index) {
                Ok((_, notice)) => {
                    self.state.push_notices([Notice::info(format!("Deleted {}", label))]);
                    self.state.push_notices(notice);
                }
                Err(e) => self.state.push_notices([Notice::error(e.to_string())]),
            },
            Selection::Group(path) => {
                self.ws.store.actions_mut().retain(|a| !a.is_in_group(&path));
                let notice = self.ws.store.persist();
                self.state.push_notices([Notice::info(format!("Deleted {}", label))]);
                self.state.push_notices(notice);
            }
        }
    }

    fn handle_duplicate(&mut self) {
        let Some(Selection::Action(index)) = self.selection() else {
            return;
        };
        match self.ws.store.duplicate_at(index) {
            Ok((copy, notice)) => {
                self.state.drag = None;
                self.state.push_notices(notice);
                self.focus(&Selection::Action(copy));
            }
            Err(e) => self.state.push_notices([Notice::error(e.to_string())]),
        }
    }

    fn handle_ungroup(&mut self) {
        let Some(Selection::Group(path)) = self.selection() else {
            return;
        };
        let (touched, notices) = self.ws.ungroup(&path);
        self.state.drag = None;
        self.state.push_notices(notices);
        self.state
            .push_notices([Notice::info(format!("Lifted {} actions out of {}", touched, path))]);
        self.reveal(parent_path(&path));
    }

    fn handle_drop(&mut self, target: DropTarget) {
        let Some(payload) = self.state.drag.clone() else {
            self.state
                .push_notices([Notice::info("Nothing held, press x to pick up")]);
            return;
        };

        match reorder::apply_drop(self.ws.store.actions_mut(), &payload, &target) {
            Ok(range) => {
                self.state.drag = None;
                let notice = self.ws.store.persist();
                self.state.push_notices(notice);

                let focus = match payload {
                    reorder::DragPayload::Group(path) => Selection::Group(path),
                    reorder::DragPayload::Actions(_) => Selection::Action(range.start),
                };
                let group = self
                    .ws
                    .store
                    .get(range.start)
                    .and_then(|a| a.group().map(str::to_string));
                self.reveal(group.as_deref());
                self.focus(&focus);
            }
            Err(e) => {
                tracing::warn!("Drop rejected: {}", e);
                self.state.push_notices([Notice::warning(e.to_string())]);
            }
        }
    }

    fn handle_shift(&mut self, up: bool) {
        let Some(Selection::Action(index)) = self.selection() else {
            return;
        };
        let actions = self.ws.store.actions_mut();
        let moved = if up {
            reorder::move_up(actions, index)
        } else {
            reorder::move_down(actions, index)
        };

        if let Some(new_index) = moved {
            self.state.drag = None;
            let notice = self.ws.store.persist();
            self.state.push_notices(notice);
            self.focus(&Selection::Action(new_index));
        }
    }
}
