use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
};

use crate::state::reorder::DragPayload;
use crate::state::{AppState, Modal, NoticeLevel};

/// Header facts that live outside `AppState`.
pub struct HeaderInfo<'a> {
    pub store_path: &'a str,
    pub action_count: usize,
    pub filter: Option<&'a str>,
}

pub fn render_header(frame: &mut Frame, area: Rect, info: &HeaderInfo) {
    let mut spans = vec![
        Span::styled(" quicklaunch ", Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)),
        Span::raw(" | "),
        Span::styled(
            format!("{} actions", info.action_count),
            Style::default().fg(Color::Green),
        ),
        Span::raw(" | "),
        Span::styled(info.store_path, Style::default().fg(Color::DarkGray)),
    ];
    if let Some(filter) = info.filter {
        spans.push(Span::raw(" | "));
        spans.push(Span::styled(format!("/{}", filter), Style::default().fg(Color::Yellow)));
    }

    let header = Paragraph::new(Line::from(spans)).block(Block::default().borders(Borders::BOTTOM));
    frame.render_widget(header, area);
}

pub fn render_footer(frame: &mut Frame, area: Rect, state: &AppState) {
    // Filter input takes over the footer
    if let Some(input) = &state.filter_input {
        let line = Line::from(vec![
            Span::styled("/", Style::default().fg(Color::Yellow)),
            Span::raw(input.as_str()),
            Span::styled("_", Style::default().fg(Color::Yellow)),
        ]);
        let footer = Paragraph::new(line).block(Block::default().borders(Borders::TOP));
        frame.render_widget(footer, area);
        return;
    }

    let line = match (&state.drag, state.latest_notice()) {
        (Some(payload), _) => {
            let held = match payload {
                DragPayload::Actions(indices) => format!("{} held", indices.len()),
                DragPayload::Group(path) => format!("group {} held", path),
            };
            Line::from(vec![
                Span::styled(held, Style::default().fg(Color::Yellow)),
                Span::styled(
                    " | x: add/remove | p: drop here | P: drop at root | Esc: cancel",
                    Style::default().fg(Color::DarkGray),
                ),
            ])
        }
        (None, Some(notice)) => {
            let color = match notice.level {
                NoticeLevel::Info => Color::Green,
                NoticeLevel::Warning => Color::Yellow,
                NoticeLevel::Error => Color::Red,
            };
            Line::from(Span::styled(notice.to_string(), Style::default().fg(color)))
        }
        (None, None) => Line::from(Span::styled(
            "j/k: move | Enter: open/run | /: filter | a/e/d: add/edit/delete | x/p: drag | ?: help",
            Style::default().fg(Color::DarkGray),
        )),
    };

    let footer = Paragraph::new(line).block(Block::default().borders(Borders::TOP));
    frame.render_widget(footer, area);
}

const HELP: &[(&str, &[(&str, &str)])] = &[
    (
        "Navigation",
        &[
            ("j/k or arrows", "Move"),
            ("l / Enter", "Expand group or run action"),
            ("h", "Collapse group or go to parent"),
            ("E / C", "Expand / collapse all groups"),
            ("/", "Filter"),
        ],
    ),
    (
        "Actions",
        &[
            ("a", "Add (in the current group)"),
            ("e", "Edit ($EDITOR)"),
            ("d", "Delete"),
            ("y", "Duplicate"),
            ("u", "Ungroup (lift contents one level)"),
        ],
    ),
    (
        "Reorder",
        &[
            ("x", "Pick up (repeat to hold several)"),
            ("p", "Drop after the cursor"),
            ("P", "Drop at root level"),
            ("J / K", "Move down / up among siblings"),
        ],
    ),
];

fn help_lines() -> Vec<Line<'static>> {
    let mut lines = vec![
        Line::from(Span::styled(
            "Keyboard Shortcuts",
            Style::default().add_modifier(Modifier::BOLD).fg(Color::Yellow),
        )),
        Line::from(""),
    ];
    for (title, keys) in HELP {
        lines.push(Line::from(Span::styled(*title, Style::default().add_modifier(Modifier::BOLD))));
        for (key, what) in keys.iter() {
            lines.push(Line::from(format!("  {:<18} {}", key, what)));
        }
        lines.push(Line::from(""));
    }
    lines.push(Line::from(Span::styled(
        "q quits | Esc closes",
        Style::default().fg(Color::DarkGray),
    )));
    lines
}

pub fn render_modal(frame: &mut Frame, area: Rect, modal: &Modal) {
    let (title, lines, color) = match modal {
        Modal::Help => (" Help ", help_lines(), Color::Cyan),
        Modal::ConfirmDelete { label, .. } => (
            " Delete ",
            vec![
                Line::from(format!("Delete {}?", label)),
                Line::from(""),
                Line::from(Span::styled("y: delete | n: keep", Style::default().fg(Color::DarkGray))),
            ],
            Color::Red,
        ),
    };

    let width = 56.min(area.width);
    let height = (lines.len() as u16 + 2).min(area.height);
    let modal_area = Rect::new(
        area.x + (area.width.saturating_sub(width)) / 2,
        area.y + (area.height.saturating_sub(height)) / 2,
        width,
        height,
    );

    frame.render_widget(Clear, modal_area);
    let paragraph = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .title(title)
            .border_style(Style::default().fg(color)),
    );
    frame.render_widget(paragraph, modal_area);
}

/// Header, body split into tree and details, footer.
pub fn main_layout(area: Rect) -> (Rect, Rect, Rect, Rect) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(2), // Header
            Constraint::Min(0),    // Tree + details
            Constraint::Length(2), // Footer
        ])
        .split(area);

    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(45), Constraint::Percentage(55)])
        .split(rows[1]);

    (rows[0], body[0], body[1], rows[2])
}
