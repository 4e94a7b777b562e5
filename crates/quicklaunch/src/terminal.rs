use std::io::{self, Stdout};

use anyhow::Result;
use crossterm::{
    cursor, execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::prelude::*;

type Backend = CrosstermBackend<Stdout>;

/// The alternate screen the browser draws on.
///
/// Running an action that talks to the user hands the real terminal back
/// with `suspend` and takes it again with `resume`. Dropping the value
/// always leaves the screen usable, even on an early return.
pub struct Terminal {
    inner: ratatui::Terminal<Backend>,
    active: bool,
}

fn leave(backend: &mut Backend) -> io::Result<()> {
    disable_raw_mode()?;
    execute!(backend, LeaveAlternateScreen, cursor::Show)
}

impl Terminal {
    pub fn new() -> Result<Self> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen, cursor::Hide)?;

        let inner = ratatui::Terminal::new(CrosstermBackend::new(stdout))?;
        Ok(Self {
            inner,
            active: true,
        })
    }

    pub fn draw<F>(&mut self, render: F) -> Result<()>
    where
        F: FnOnce(&mut Frame),
    {
        self.inner.draw(render)?;
        Ok(())
    }

    pub fn suspend(&mut self) -> Result<()> {
        if self.active {
            leave(self.inner.backend_mut())?;
            self.active = false;
        }
        Ok(())
    }

    pub fn resume(&mut self) -> Result<()> {
        if !self.active {
            enable_raw_mode()?;
            execute!(self.inner.backend_mut(), EnterAlternateScreen, cursor::Hide)?;
            self.inner.clear()?;
            self.active = true;
        }
        Ok(())
    }

    /// Give the terminal back for good.
    pub fn restore(&mut self) -> Result<()> {
        self.suspend()
    }
}

impl Drop for Terminal {
    fn drop(&mut self) {
        if self.active {
            if let Err(e) = leave(self.inner.backend_mut()) {
                tracing::warn!("Failed to restore terminal: {}", e);
            }
        }
    }
}
