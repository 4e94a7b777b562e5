use ratatui::{
    Frame,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap},
};

use crate::state::tree::{TreeNode, VisibleRow};
use crate::state::{Action, AppState, Selection, TerminalMode};

pub fn render_tree(frame: &mut Frame, area: Rect, rows: &[VisibleRow], state: &AppState) {
    let items: Vec<ListItem> = rows
        .iter()
        .map(|row| {
            let indent = Span::raw("  ".repeat(row.depth));
            let dragged = state.is_dragged(&Selection::of(&row.node));
            let mut spans = vec![indent];

            match &row.node {
                TreeNode::Group(group) => {
                    let marker = if group.expanded { "▾ " } else { "▸ " };
                    spans.push(Span::styled(marker, Style::default().fg(Color::Cyan)));
                    spans.push(Span::styled(
                        group.display_name.clone(),
                        Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
                    ));
                    spans.push(Span::styled(
                        format!(" ({})", group.descendant_count),
                        Style::default().fg(Color::DarkGray),
                    ));
                }
                TreeNode::Action(node) => {
                    spans.push(Span::raw("  "));
                    spans.push(Span::raw(node.action.name.clone()));
                    if node.action.terminal_mode == TerminalMode::External {
                        spans.push(Span::styled(" ⧉", Style::default().fg(Color::DarkGray)));
                    }
                }
            }

            if dragged {
                spans.push(Span::styled(" [held]", Style::default().fg(Color::Yellow)));
            }
            ListItem::new(Line::from(spans))
        })
        .collect();

    let title = if rows.is_empty() {
        " Actions (empty, press a to add) ".to_string()
    } else {
        " Actions ".to_string()
    };

    let list = List::new(items)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(title)
                .border_style(Style::default().fg(Color::Cyan)),
        )
        .highlight_style(
            Style::default()
                .bg(Color::DarkGray)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("> ");

    let mut list_state = ListState::default();
    if !rows.is_empty() {
        list_state.select(Some(state.cursor));
    }

    frame.render_stateful_widget(list, area, &mut list_state);
}

fn section<'a>(title: &'a str, lines: &mut Vec<Line<'a>>, entries: Vec<String>) {
    if entries.is_empty() {
        return;
    }
    lines.push(Line::from(Span::styled(
        title,
        Style::default().add_modifier(Modifier::BOLD),
    )));
    lines.extend(entries.into_iter().map(|e| Line::from(format!("  {}", e))));
    lines.push(Line::from(""));
}

/// Everything one action will do when run.
pub fn detail_lines(action: &Action) -> Vec<Line<'_>> {
    let mut lines = vec![
        Line::from(Span::styled(
            action.qualified_name(),
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
    ];

    let mode = match action.terminal_mode {
        TerminalMode::Internal => "internal terminal".to_string(),
        TerminalMode::External => match &action.terminal_profile_name {
            Some(profile) => format!("external terminal ({})", profile),
            None => "external terminal".to_string(),
        },
    };
    let mut flags = vec![mode];
    if action.auto_close {
        flags.push("auto-close".to_string());
    }
    if action.run_as_admin {
        flags.push("as administrator".to_string());
    }

    section("Shell", &mut lines, {
        let mut entries = action.shell_commands.clone();
        if !entries.is_empty() {
            entries.push(format!("[{}]", flags.join(", ")));
        }
        entries
    });
    section(
        "URLs",
        &mut lines,
        action
            .urls
            .iter()
            .map(|u| {
                let target = if u.external { "" } else { " (embedded)" };
                format!("{}{}", u.url, target)
            })
            .collect(),
    );
    section(
        "Programs",
        &mut lines,
        action
            .programs
            .iter()
            .map(|p| match &p.args {
                Some(args) => format!("{} {}", p.path, args),
                None => p.path.clone(),
            })
            .collect(),
    );
    section(
        "Environment",
        &mut lines,
        action.env.iter().map(|(k, v)| format!("{}={}", k, v)).collect(),
    );

    if !action.has_effects() {
        lines.push(Line::from(Span::styled(
            "Nothing to run yet, press e to edit",
            Style::default().fg(Color::DarkGray),
        )));
    }
    lines
}

pub fn render_detail(frame: &mut Frame, area: Rect, action: Option<&Action>) {
    let lines = match action {
        Some(action) => detail_lines(action),
        None => vec![Line::from(Span::styled(
            "Select an action to see what it runs",
            Style::default().fg(Color::DarkGray),
        ))],
    };

    let detail = Paragraph::new(lines).wrap(Wrap { trim: false }).block(
        Block::default()
            .borders(Borders::ALL)
            .title(" Details ")
            .border_style(Style::default().fg(Color::DarkGray)),
    );
    frame.render_widget(detail, area);
}
