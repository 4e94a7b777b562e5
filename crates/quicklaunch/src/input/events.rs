use anyhow::Result;
use crossterm::event::{self, Event, KeyEvent, KeyEventKind};

/// Key presses read off the terminal.
///
/// Reads block, so they run on the blocking pool and never hold a pending
/// read across a suspend of the terminal.
#[derive(Debug, Default)]
pub struct EventStream;

impl EventStream {
    pub fn new() -> Self {
        Self
    }

    pub async fn next_key(&mut self) -> Result<Option<KeyEvent>> {
        let event = tokio::task::spawn_blocking(event::read).await??;
        Ok(extract_key_event(event))
    }
}

/// Only presses count; Windows also reports releases.
pub fn extract_key_event(event: Event) -> Option<KeyEvent> {
    match event {
        Event::Key(key) if key.kind == KeyEventKind::Press => Some(key),
        _ => None,
    }
}
