use std::io::{self, Stdout};

use crossterm::{
    event::{DisableMouseCapture, EnableMouseCapture},
    execute,
    terminal::{self, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Frame, Terminal};
use tracing::debug;

use crate::error::{AppError, Result};

fn terminal_error(context: &str, err: io::Error) -> AppError {
    AppError::Terminal(format!("{}: {}", context, err))
}

/// Raw-mode, alternate-screen terminal owned by the event loop.
pub struct Tui {
    terminal: Terminal<CrosstermBackend<Stdout>>,
    mouse_capture: bool,
    active: bool,
}

impl Tui {
    pub fn new(mouse_capture: bool) -> Result<Self> {
        let mut stdout = io::stdout();
        terminal::enable_raw_mode().map_err(|e| terminal_error("enable raw mode", e))?;
        execute!(stdout, EnterAlternateScreen)
            .map_err(|e| terminal_error("enter alternate screen", e))?;
        if mouse_capture {
            execute!(stdout, EnableMouseCapture)
                .map_err(|e| terminal_error("enable mouse capture", e))?;
        }
        let terminal = Terminal::new(CrosstermBackend::new(stdout))
            .map_err(|e| terminal_error("create terminal", e))?;
        debug!(mouse_capture, "terminal initialised");
        Ok(Self {
            terminal,
            mouse_capture,
            active: true,
        })
    }

    pub fn draw<F>(&mut self, render: F) -> Result<()>
    where
        F: FnOnce(&mut Frame),
    {
        self.terminal
            .draw(render)
            .map(|_| ())
            .map_err(|e| terminal_error("draw", e))
    }

    /// Leave raw mode and the alternate screen. Safe to call twice.
    pub fn restore(&mut self) -> Result<()> {
        if !self.active {
            return Ok(());
        }
        self.active = false;
        if self.mouse_capture {
            execute!(self.terminal.backend_mut(), DisableMouseCapture)
                .map_err(|e| terminal_error("disable mouse capture", e))?;
        }
        terminal::disable_raw_mode().map_err(|e| terminal_error("disable raw mode", e))?;
        execute!(self.terminal.backend_mut(), LeaveAlternateScreen)
            .map_err(|e| terminal_error("leave alternate screen", e))?;
        self.terminal
            .show_cursor()
            .map_err(|e| terminal_error("show cursor", e))?;
        Ok(())
    }
}

impl Drop for Tui {
    fn drop(&mut self) {
        let _ = self.restore();
    }
}

/// Restore the terminal before the default panic output is printed.
pub fn install_panic_hook() {
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let _ = terminal::disable_raw_mode();
        let _ = execute!(io::stdout(), DisableMouseCapture, LeaveAlternateScreen);
        original_hook(panic_info);
    }));
}
