//! Terminal port shared by progress bars and spinners.
//!
//! Everything the renderers need from the outside world goes through the
//! [`Terminal`] trait: width queries, tty detection, cursor visibility, the
//! ANSI processing toggle and raw text output. Two implementations ship with
//! the crate:
//!
//! - [`CrosstermTerminal`] talks to the real process stdout/stderr.
//! - [`MemoryTerminal`] records everything in memory, which makes rendering
//!   fully deterministic for tests or for capturing output.
//!
//! # Mode ownership
//!
//! Cursor visibility and escape processing are process-wide. They are taken
//! with [`TerminalModeGuard::acquire`] and restored when the guard is dropped,
//! so an early return or a panic unwinding through a bar still leaves the
//! terminal usable.
//!
//! ```rust
//! use pbar::terminal::{MemoryTerminal, TerminalModeGuard};
//! use std::sync::Arc;
//!
//! let terminal = Arc::new(MemoryTerminal::new(Some(80)));
//! {
//!     let _guard = TerminalModeGuard::acquire(terminal.clone()).unwrap();
//!     assert!(terminal.cursor_hidden());
//! }
//! assert!(!terminal.cursor_hidden());
//! ```

use crossterm::cursor::{Hide, MoveUp, Show};
use crossterm::terminal::{Clear, ClearType};
use crossterm::Command;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::fmt;
use std::io::{self, IsTerminal, Write};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::Result;

fn ansi(command: impl Command) -> String {
    let mut out = String::new();
    // fmt::Write into a String never fails
    let _ = command.write_ansi(&mut out);
    out
}

/// Erases the whole line the cursor is on.
pub static CLEAR_LINE: Lazy<String> = Lazy::new(|| ansi(Clear(ClearType::CurrentLine)));

/// Moves the cursor one row up, keeping its column.
pub static CURSOR_UP: Lazy<String> = Lazy::new(|| ansi(MoveUp(1)));

/// Hides the text cursor.
pub static HIDE_CURSOR: Lazy<String> = Lazy::new(|| ansi(Hide));

/// Shows the text cursor.
pub static SHOW_CURSOR: Lazy<String> = Lazy::new(|| ansi(Show));

/// The two output streams a renderer can target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stream {
    /// Primary output, where frames are drawn.
    Stdout,
    /// Diagnostic output.
    Stderr,
}

/// Console mode captured before escape processing was switched on.
///
/// Handed back to [`Terminal::restore_mode`] when the owner releases the
/// terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PriorMode {
    /// Nothing was changed, nothing needs restoring.
    #[default]
    Unchanged,
    /// Raw console flags that were active before the switch.
    Console(u32),
}

/// Capabilities a renderer consumes from the terminal.
///
/// Implementations must be shareable across threads: a spinner writes from
/// its animation thread while the caller keeps writing from its own.
pub trait Terminal: Send + Sync {
    /// Current column count, or `None` when stdout is not a terminal.
    fn width(&self) -> Option<u16>;

    /// Whether `stream` is attached to a terminal.
    fn is_tty(&self, stream: Stream) -> bool;

    /// Shows or hides the cursor.
    fn set_cursor_visible(&self, visible: bool) -> io::Result<()>;

    /// Switches on escape sequence processing and returns the mode it replaced.
    fn enable_ansi(&self) -> io::Result<PriorMode>;

    /// Puts back a mode returned by [`enable_ansi`](Terminal::enable_ansi).
    fn restore_mode(&self, prior: PriorMode) -> io::Result<()>;

    /// Writes `text` to `stream` and flushes it.
    fn write(&self, stream: Stream, text: &str) -> io::Result<()>;
}

/// [`Terminal`] backed by the process stdout and stderr.
///
/// Sizes come from crossterm and cursor visibility is written as the
/// [`HIDE_CURSOR`]/[`SHOW_CURSOR`] sequences. On Windows consoles
/// [`enable_ansi`](Terminal::enable_ansi) saves the console mode and turns on
/// virtual terminal processing, and [`restore_mode`](Terminal::restore_mode)
/// puts the saved mode back. Elsewhere both are no-ops.
#[derive(Debug, Clone, Copy, Default)]
pub struct CrosstermTerminal;

impl Terminal for CrosstermTerminal {
    fn width(&self) -> Option<u16> {
        if !io::stdout().is_terminal() {
            return None;
        }
        crossterm::terminal::size().ok().map(|(columns, _)| columns)
    }

    fn is_tty(&self, stream: Stream) -> bool {
        match stream {
            Stream::Stdout => io::stdout().is_terminal(),
            Stream::Stderr => io::stderr().is_terminal(),
        }
    }

    fn set_cursor_visible(&self, visible: bool) -> io::Result<()> {
        let mut out = io::stdout().lock();
        if !out.is_terminal() {
            return Ok(());
        }
        let sequence = if visible { &SHOW_CURSOR } else { &HIDE_CURSOR };
        out.write_all(sequence.as_bytes())?;
        out.flush()
    }

    fn enable_ansi(&self) -> io::Result<PriorMode> {
        if !io::stdout().is_terminal() {
            return Ok(PriorMode::Unchanged);
        }
        console::enable_virtual_terminal()
    }

    fn restore_mode(&self, prior: PriorMode) -> io::Result<()> {
        match prior {
            PriorMode::Unchanged => Ok(()),
            PriorMode::Console(mode) => console::restore(mode),
        }
    }

    fn write(&self, stream: Stream, text: &str) -> io::Result<()> {
        match stream {
            Stream::Stdout => {
                let mut out = io::stdout().lock();
                out.write_all(text.as_bytes())?;
                out.flush()
            }
            Stream::Stderr => {
                let mut err = io::stderr().lock();
                err.write_all(text.as_bytes())?;
                err.flush()
            }
        }
    }
}

#[cfg(windows)]
mod console {
    use super::PriorMode;
    use crossterm_winapi::ConsoleMode;
    use std::io;

    const ENABLE_VIRTUAL_TERMINAL_PROCESSING: u32 = 0x0004;
    const DISABLE_NEWLINE_AUTO_RETURN: u32 = 0x0008;

    pub(super) fn enable_virtual_terminal() -> io::Result<PriorMode> {
        let console = ConsoleMode::new()?;
        let prior = console.mode()?;
        console.set_mode(prior | ENABLE_VIRTUAL_TERMINAL_PROCESSING | DISABLE_NEWLINE_AUTO_RETURN)?;
        Ok(PriorMode::Console(prior))
    }

    pub(super) fn restore(mode: u32) -> io::Result<()> {
        ConsoleMode::new()?.set_mode(mode)
    }
}

#[cfg(not(windows))]
mod console {
    use super::PriorMode;
    use std::io;

    // escape sequences are always interpreted
    pub(super) fn enable_virtual_terminal() -> io::Result<PriorMode> {
        Ok(PriorMode::Unchanged)
    }

    pub(super) fn restore(_mode: u32) -> io::Result<()> {
        Ok(())
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    stdout: String,
    stderr: String,
    width: Option<u16>,
    width_queries: usize,
    stdout_tty: bool,
    stderr_tty: bool,
    cursor_hidden: bool,
    modes_enabled: usize,
    modes_restored: usize,
}

/// In-memory [`Terminal`] that records every write.
///
/// The reported width is scripted with [`set_width`](MemoryTerminal::set_width)
/// and every width query is counted, so tests can check exactly when a bar
/// re-samples the terminal.
#[derive(Debug, Default)]
pub struct MemoryTerminal {
    state: Mutex<MemoryState>,
}

impl MemoryTerminal {
    /// Creates a terminal reporting `width`.
    ///
    /// Both streams count as attached to a terminal when a width is given.
    pub fn new(width: Option<u16>) -> Self {
        let attached = width.is_some();
        Self {
            state: Mutex::new(MemoryState {
                width,
                stdout_tty: attached,
                stderr_tty: attached,
                ..MemoryState::default()
            }),
        }
    }

    /// Changes the width reported from now on.
    pub fn set_width(&self, width: Option<u16>) {
        self.state.lock().width = width;
    }

    /// Marks `stream` as attached or detached.
    pub fn set_tty(&self, stream: Stream, attached: bool) {
        let mut state = self.state.lock();
        match stream {
            Stream::Stdout => state.stdout_tty = attached,
            Stream::Stderr => state.stderr_tty = attached,
        }
    }

    /// Everything written to `stream` so far, escape sequences included.
    pub fn output(&self, stream: Stream) -> String {
        let state = self.state.lock();
        match stream {
            Stream::Stdout => state.stdout.clone(),
            Stream::Stderr => state.stderr.clone(),
        }
    }

    /// Like [`output`](MemoryTerminal::output) with escape sequences removed.
    pub fn visible_output(&self, stream: Stream) -> String {
        strip_ansi_escapes::strip_str(self.output(stream))
    }

    /// Returns and clears what was written to `stream`.
    pub fn take_output(&self, stream: Stream) -> String {
        let mut state = self.state.lock();
        match stream {
            Stream::Stdout => std::mem::take(&mut state.stdout),
            Stream::Stderr => std::mem::take(&mut state.stderr),
        }
    }

    /// Number of times [`width`](Terminal::width) was called.
    pub fn width_queries(&self) -> usize {
        self.state.lock().width_queries
    }

    /// Whether the cursor is currently hidden.
    pub fn cursor_hidden(&self) -> bool {
        self.state.lock().cursor_hidden
    }

    /// Escape-processing switches that have not been restored yet.
    pub fn outstanding_modes(&self) -> usize {
        let state = self.state.lock();
        state.modes_enabled - state.modes_restored
    }
}

impl Terminal for MemoryTerminal {
    fn width(&self) -> Option<u16> {
        let mut state = self.state.lock();
        state.width_queries += 1;
        state.width
    }

    fn is_tty(&self, stream: Stream) -> bool {
        let state = self.state.lock();
        match stream {
            Stream::Stdout => state.stdout_tty,
            Stream::Stderr => state.stderr_tty,
        }
    }

    fn set_cursor_visible(&self, visible: bool) -> io::Result<()> {
        self.state.lock().cursor_hidden = !visible;
        Ok(())
    }

    fn enable_ansi(&self) -> io::Result<PriorMode> {
        let mut state = self.state.lock();
        state.modes_enabled += 1;
        Ok(PriorMode::Console(state.modes_enabled as u32))
    }

    fn restore_mode(&self, _prior: PriorMode) -> io::Result<()> {
        self.state.lock().modes_restored += 1;
        Ok(())
    }

    fn write(&self, stream: Stream, text: &str) -> io::Result<()> {
        let mut state = self.state.lock();
        match stream {
            Stream::Stdout => state.stdout.push_str(text),
            Stream::Stderr => state.stderr.push_str(text),
        }
        Ok(())
    }
}

/// Scoped ownership of the process-wide terminal modes.
///
/// Acquiring hides the cursor and enables escape processing; dropping the
/// guard shows the cursor and restores the prior mode. Failures during drop
/// are logged since they cannot be returned.
pub struct TerminalModeGuard {
    terminal: Arc<dyn Terminal>,
    prior: PriorMode,
    owned: bool,
}

impl fmt::Debug for TerminalModeGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TerminalModeGuard")
            .field("prior", &self.prior)
            .field("owned", &self.owned)
            .finish()
    }
}

impl TerminalModeGuard {
    /// Enables escape processing and hides the cursor.
    pub fn acquire(terminal: Arc<dyn Terminal>) -> Result<Self> {
        let prior = terminal.enable_ansi()?;
        if let Err(e) = terminal.set_cursor_visible(false) {
            // leave the console as we found it
            let _ = terminal.restore_mode(prior);
            return Err(e.into());
        }
        debug!(target: "pbar", "terminal modes acquired: {:?}", prior);
        Ok(Self {
            terminal,
            prior,
            owned: true,
        })
    }

    /// Restores the terminal now, reporting any failure.
    pub fn release(mut self) -> Result<()> {
        self.owned = false;
        self.restore()?;
        Ok(())
    }

    /// Gives up ownership without restoring anything.
    ///
    /// The modes stay as they are; whichever owner is still alive restores
    /// them.
    pub fn relinquish(mut self) {
        self.owned = false;
        debug!(target: "pbar", "terminal modes relinquished");
    }

    fn restore(&self) -> io::Result<()> {
        self.terminal.set_cursor_visible(true)?;
        self.terminal.restore_mode(self.prior)?;
        debug!(target: "pbar", "terminal modes restored");
        Ok(())
    }
}

impl Drop for TerminalModeGuard {
    fn drop(&mut self) {
        if !self.owned {
            return;
        }
        if let Err(e) = self.restore() {
            warn!(target: "pbar", "cannot restore terminal modes: {}", e);
        }
    }
}

/// Where a user message goes, chosen once from tty detection.
///
/// The terminal variant wipes the current render line before writing so a
/// message never lands on top of a half-drawn frame; the plain variant passes
/// text through untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputChannel {
    /// Stream attached to a terminal with a live render line.
    Terminal(Stream),
    /// Stream redirected to a file or pipe.
    Plain(Stream),
}

impl OutputChannel {
    /// Picks the variant for `stream`.
    pub fn select(stream: Stream, attached: bool) -> Self {
        if attached {
            OutputChannel::Terminal(stream)
        } else {
            OutputChannel::Plain(stream)
        }
    }

    /// The stream this channel writes to.
    pub fn stream(&self) -> Stream {
        match self {
            OutputChannel::Terminal(stream) | OutputChannel::Plain(stream) => *stream,
        }
    }

    /// Writes `text` in place of the current render line.
    pub fn write_line(&self, terminal: &dyn Terminal, text: &str) -> io::Result<()> {
        match self {
            OutputChannel::Terminal(stream) => {
                terminal.write(*stream, &format!("{}\r{}", *CLEAR_LINE, text))
            }
            OutputChannel::Plain(stream) => terminal.write(*stream, text),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_control_sequences() {
        assert_eq!(*CLEAR_LINE, "\x1b[2K");
        assert_eq!(*CURSOR_UP, "\x1b[1A");
        assert_eq!(*HIDE_CURSOR, "\x1b[?25l");
        assert_eq!(*SHOW_CURSOR, "\x1b[?25h");
    }

    #[test]
    fn test_unchanged_mode_needs_no_restore() {
        assert!(CrosstermTerminal.restore_mode(PriorMode::Unchanged).is_ok());
    }

    #[cfg(not(windows))]
    #[test]
    fn test_ansi_switch_is_a_no_op_off_windows() {
        assert_eq!(CrosstermTerminal.enable_ansi().unwrap(), PriorMode::Unchanged);
    }

    #[cfg(windows)]
    #[test]
    fn test_console_mode_is_restored() {
        use crossterm_winapi::ConsoleMode;

        if !io::stdout().is_terminal() {
            return;
        }
        let before = ConsoleMode::new().unwrap().mode().unwrap();
        let prior = CrosstermTerminal.enable_ansi().unwrap();
        assert_eq!(prior, PriorMode::Console(before));
        let during = ConsoleMode::new().unwrap().mode().unwrap();
        assert_ne!(during & 0x0004, 0);

        CrosstermTerminal.restore_mode(prior).unwrap();
        assert_eq!(ConsoleMode::new().unwrap().mode().unwrap(), before);
    }

    #[test]
    fn test_memory_terminal_counts_width_queries() {
        let terminal = MemoryTerminal::new(Some(100));
        assert_eq!(terminal.width_queries(), 0);
        assert_eq!(terminal.width(), Some(100));
        terminal.set_width(None);
        assert_eq!(terminal.width(), None);
        assert_eq!(terminal.width_queries(), 2);
    }

    #[test]
    fn test_memory_terminal_tty_follows_width() {
        let attached = MemoryTerminal::new(Some(80));
        assert!(attached.is_tty(Stream::Stdout));
        assert!(attached.is_tty(Stream::Stderr));

        let detached = MemoryTerminal::new(None);
        assert!(!detached.is_tty(Stream::Stdout));
        detached.set_tty(Stream::Stderr, true);
        assert!(detached.is_tty(Stream::Stderr));
    }

    #[test]
    fn test_memory_terminal_separates_streams() {
        let terminal = MemoryTerminal::new(Some(80));
        terminal.write(Stream::Stdout, "out").unwrap();
        terminal.write(Stream::Stderr, "err").unwrap();

        assert_eq!(terminal.output(Stream::Stdout), "out");
        assert_eq!(terminal.take_output(Stream::Stderr), "err");
        assert_eq!(terminal.output(Stream::Stderr), "");
    }

    #[test]
    fn test_visible_output_strips_escapes() {
        let terminal = MemoryTerminal::new(Some(80));
        terminal
            .write(Stream::Stdout, &format!("{}hello{}", *CLEAR_LINE, *CURSOR_UP))
            .unwrap();
        assert_eq!(terminal.visible_output(Stream::Stdout), "hello");
    }

    #[test]
    fn test_guard_restores_on_drop() {
        let terminal = Arc::new(MemoryTerminal::new(Some(80)));
        {
            let _guard = TerminalModeGuard::acquire(terminal.clone()).unwrap();
            assert!(terminal.cursor_hidden());
            assert_eq!(terminal.outstanding_modes(), 1);
        }
        assert!(!terminal.cursor_hidden());
        assert_eq!(terminal.outstanding_modes(), 0);
    }

    #[test]
    fn test_guard_restores_during_unwind() {
        let terminal = Arc::new(MemoryTerminal::new(Some(80)));
        let port = terminal.clone();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(move || {
            let _guard = TerminalModeGuard::acquire(port).unwrap();
            panic!("render failed");
        }));

        assert!(result.is_err());
        assert!(!terminal.cursor_hidden());
        assert_eq!(terminal.outstanding_modes(), 0);
    }

    #[test]
    fn test_guard_release_is_not_repeated_on_drop() {
        let terminal = Arc::new(MemoryTerminal::new(Some(80)));
        let guard = TerminalModeGuard::acquire(terminal.clone()).unwrap();
        guard.release().unwrap();
        assert!(!terminal.cursor_hidden());
        assert_eq!(terminal.outstanding_modes(), 0);
    }

    #[test]
    fn test_relinquished_guard_leaves_modes_alone() {
        let terminal = Arc::new(MemoryTerminal::new(Some(80)));
        let guard = TerminalModeGuard::acquire(terminal.clone()).unwrap();
        guard.relinquish();
        assert!(terminal.cursor_hidden());
        assert_eq!(terminal.outstanding_modes(), 1);
    }

    #[test]
    fn test_output_channel_variants() {
        let terminal = MemoryTerminal::new(Some(80));

        let live = OutputChannel::select(Stream::Stdout, true);
        assert_eq!(live, OutputChannel::Terminal(Stream::Stdout));
        live.write_line(&terminal, "a\n").unwrap();

        let plain = OutputChannel::select(Stream::Stderr, false);
        assert_eq!(plain.stream(), Stream::Stderr);
        plain.write_line(&terminal, "b\n").unwrap();

        assert_eq!(terminal.output(Stream::Stdout), "\x1b[2K\ra\n");
        assert_eq!(terminal.output(Stream::Stderr), "b\n");
    }
}
