use anyhow::Context;
use crossterm::{cursor, execute, terminal};
use std::io::{stdout, Stdout, Write};

/// Raw mode plus alternate screen for as long as the guard lives.
pub struct TerminalGuard {
    _private: (),
}

impl TerminalGuard {
    pub fn new() -> anyhow::Result<Self> {
        terminal::enable_raw_mode().context("enable raw mode")?;
        // From here on Drop undoes whatever part of setup succeeded.
        let guard = Self { _private: () };
        execute!(
            stdout(),
            terminal::EnterAlternateScreen,
            terminal::Clear(terminal::ClearType::All),
            cursor::Hide
        )
        .context("prepare alternate screen")?;
        Ok(guard)
    }

    pub fn stdout() -> Stdout {
        stdout()
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
        let mut out = stdout();
        // Synchronized output off, autowrap on, colours reset.
        let _ = out.write_all(b"\x1b[?2026l\x1b[?7h\x1b[0m");
        let _ = out.flush();
        let _ = execute!(out, cursor::Show, terminal::LeaveAlternateScreen);
    }
}
