//! Progress bar component.
//!
//! A [`ProgressBar`] counts from zero to a fixed total and redraws a single
//! terminal line on every [`tick`](ProgressBar::tick). The line adapts to the
//! terminal width and drops its time statistics when they no longer fit.
//!
//! # Basic Usage
//!
//! ```rust,no_run
//! use pbar::progress::{with_description, ProgressBar};
//!
//! # fn main() -> pbar::Result<()> {
//! let mut bar = ProgressBar::new(100, &[with_description("[TASK0]")])?;
//! bar.init()?;
//! for _ in 0..100 {
//!     // ... work ...
//!     bar.inc()?;
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Stacking
//!
//! Nested loops can each drive their own bar on a row of its own. The
//! outermost bar owns the terminal; inner bars are marked [`stacked`] and
//! reserve a fresh row when they start, then step back up one row when they
//! complete so the next pass draws over the same place.
//!
//! ```rust,no_run
//! use pbar::progress::{stacked, with_description, ProgressBar};
//!
//! # fn main() -> pbar::Result<()> {
//! let mut outer = ProgressBar::new(4, &[with_description("[TASK1]")])?;
//! let mut inner = ProgressBar::new(8, &[with_description("[TASK2]"), stacked()])?;
//!
//! outer.init()?;
//! for _ in 0..4 {
//!     inner.init()?;
//!     for _ in 0..8 {
//!         inner.inc()?;
//!     }
//!     outer.inc()?;
//! }
//! # Ok(())
//! # }
//! ```
//!
//! Only one non-stacked bar may be live among overlapping bars. Two owners
//! restore the cursor and console mode in whatever order they are dropped.

use std::fmt;
use std::num::NonZeroU64;
use std::sync::Arc;

use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::layout::{self, Glyphs, LineInput};
use crate::stopwatch::Stopwatch;
use crate::terminal::{
    CrosstermTerminal, OutputChannel, Stream, Terminal, TerminalModeGuard, CLEAR_LINE, CURSOR_UP,
};

/// Configuration options applied when a [`ProgressBar`] is built.
///
/// Options are applied in order, so a later option overrides an earlier one.
///
/// # Examples
///
/// ```rust,no_run
/// use pbar::progress::{with_columns, with_description, without_time_measurement, ProgressBar};
///
/// let bar = ProgressBar::new(
///     10,
///     &[
///         with_columns(60),
///         with_description("copy"),
///         without_time_measurement(),
///     ],
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BarOption {
    /// Column budget for the line instead of the detected terminal width.
    WithColumns(u64),
    /// Label drawn before the percentage.
    WithDescription(String),
    /// Render on a reserved row under the owning bar.
    Stacked,
    /// Keep the finished line on screen (`true`) or clear it (`false`).
    WithLeave(bool),
    /// Leave out the elapsed/remaining/velocity field.
    WithoutTimeMeasurement,
    /// Re-sample the terminal width whenever progress is a multiple of the cycle.
    WithRecalcCycle(u64),
    /// Characters used for the bracket section.
    WithGlyphs(Glyphs),
}

impl BarOption {
    fn apply(&self, bar: &mut ProgressBar) -> Result<()> {
        match self {
            BarOption::WithColumns(columns) => bar.columns = *columns,
            BarOption::WithDescription(description) => bar.description = description.clone(),
            BarOption::Stacked => {
                bar.stacked = true;
                bar.leave = false;
            }
            BarOption::WithLeave(leave) => bar.leave = *leave,
            BarOption::WithoutTimeMeasurement => bar.time_measurement = false,
            BarOption::WithRecalcCycle(cycle) => bar.enable_recalc_console_width(*cycle)?,
            BarOption::WithGlyphs(glyphs) => bar.glyphs = *glyphs,
        }
        Ok(())
    }
}

/// Uses `columns` as the line budget instead of the detected terminal width.
///
/// The budget is still clamped to the terminal width when the bar starts.
pub fn with_columns(columns: u64) -> BarOption {
    BarOption::WithColumns(columns)
}

/// Sets the label drawn before the percentage.
pub fn with_description(description: impl Into<String>) -> BarOption {
    BarOption::WithDescription(description.into())
}

/// Renders the bar on its own row beneath the bar that owns the terminal.
///
/// A stacked bar never leaves its finished line behind and never touches the
/// cursor or console mode.
pub fn stacked() -> BarOption {
    BarOption::Stacked
}

/// Chooses whether the finished line stays on screen.
pub fn with_leave(leave: bool) -> BarOption {
    BarOption::WithLeave(leave)
}

/// Disables the elapsed/remaining/velocity field.
pub fn without_time_measurement() -> BarOption {
    BarOption::WithoutTimeMeasurement
}

/// Re-samples the terminal width every `cycle` ticks of progress.
///
/// Building the bar fails with [`Error::ZeroRecalcCycle`] when `cycle` is zero.
pub fn with_recalc_cycle(cycle: u64) -> BarOption {
    BarOption::WithRecalcCycle(cycle)
}

/// Replaces the bracket characters.
pub fn with_glyphs(glyphs: Glyphs) -> BarOption {
    BarOption::WithGlyphs(glyphs)
}

/// Where a bar is in its run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BarState {
    /// No run in progress; the next tick starts one.
    Idle,
    /// A run is in progress.
    Active {
        /// Current count.
        progress: u64,
    },
    /// The last tick reached the total. Reported by [`ProgressBar::tick`];
    /// the bar itself is already back to [`BarState::Idle`].
    Completed,
}

/// A single-line progress bar driven by explicit ticks.
///
/// The bar is reusable: once a run completes it resets to idle and the next
/// tick starts a new run, which is what nested loops rely on.
///
/// A bar is not meant to be shared between threads; drive it from the loop
/// that does the work.
pub struct ProgressBar {
    terminal: Arc<dyn Terminal>,
    total: u64,
    digit_width: u64,
    columns: u64,
    description: String,
    glyphs: Glyphs,
    state: BarState,
    stopwatch: Stopwatch,
    stacked: bool,
    leave: bool,
    recalc_cycle: Option<NonZeroU64>,
    time_measurement: bool,
    interrupted: bool,
    stderr_is_tty: bool,
    stdout_channel: OutputChannel,
    stderr_channel: OutputChannel,
    mode: Option<TerminalModeGuard>,
}

impl fmt::Debug for ProgressBar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressBar")
            .field("total", &self.total)
            .field("columns", &self.columns)
            .field("description", &self.description)
            .field("state", &self.state)
            .field("stacked", &self.stacked)
            .field("leave", &self.leave)
            .field("recalc_cycle", &self.recalc_cycle)
            .field("time_measurement", &self.time_measurement)
            .field("interrupted", &self.interrupted)
            .finish_non_exhaustive()
    }
}

fn detected_columns(terminal: &dyn Terminal) -> u64 {
    u64::from(terminal.width().unwrap_or(1)).saturating_sub(1)
}

impl ProgressBar {
    /// Creates a bar counting to `total` on the process terminal.
    ///
    /// Without [`with_columns`] the line budget is the terminal width minus
    /// one. When stdout is not a terminal the budget is zero and every tick is
    /// a no-op.
    ///
    /// # Errors
    ///
    /// [`Error::ZeroTotal`] when `total` is zero, [`Error::ZeroRecalcCycle`]
    /// for a zero [`with_recalc_cycle`], and [`Error::Terminal`] when the
    /// cursor or console mode cannot be switched.
    pub fn new(total: u64, opts: &[BarOption]) -> Result<Self> {
        Self::with_terminal(total, opts, Arc::new(CrosstermTerminal))
    }

    /// Creates a bar drawing through `terminal`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use pbar::progress::{with_leave, without_time_measurement, BarState, ProgressBar};
    /// use pbar::terminal::{MemoryTerminal, Stream};
    /// use std::sync::Arc;
    ///
    /// let terminal = Arc::new(MemoryTerminal::new(Some(41)));
    /// let mut bar = ProgressBar::with_terminal(
    ///     2,
    ///     &[without_time_measurement(), with_leave(false)],
    ///     terminal.clone(),
    /// )
    /// .unwrap();
    ///
    /// assert_eq!(bar.tick(1).unwrap(), BarState::Active { progress: 1 });
    /// assert_eq!(bar.tick(1).unwrap(), BarState::Completed);
    /// assert_eq!(bar.state(), BarState::Idle);
    /// assert!(terminal.visible_output(Stream::Stdout).contains(" 50%|"));
    /// ```
    pub fn with_terminal(
        total: u64,
        opts: &[BarOption],
        terminal: Arc<dyn Terminal>,
    ) -> Result<Self> {
        if total == 0 {
            return Err(Error::ZeroTotal);
        }

        let columns = opts
            .iter()
            .rev()
            .find_map(|opt| match opt {
                BarOption::WithColumns(columns) => Some(*columns),
                _ => None,
            })
            .unwrap_or_else(|| detected_columns(&*terminal));
        let stderr_is_tty = terminal.is_tty(Stream::Stderr);

        let mut bar = Self {
            terminal,
            total,
            digit_width: layout::digit_count(total),
            columns,
            description: String::new(),
            glyphs: Glyphs::default(),
            state: BarState::Idle,
            stopwatch: Stopwatch::new(),
            stacked: false,
            leave: true,
            recalc_cycle: None,
            time_measurement: true,
            interrupted: false,
            stderr_is_tty,
            stdout_channel: OutputChannel::Plain(Stream::Stdout),
            stderr_channel: OutputChannel::Plain(Stream::Stderr),
            mode: None,
        };
        for opt in opts {
            opt.apply(&mut bar)?;
        }

        let rendering = bar.columns > 0;
        bar.stdout_channel = OutputChannel::select(Stream::Stdout, rendering);
        bar.stderr_channel = OutputChannel::select(Stream::Stderr, rendering && stderr_is_tty);
        if rendering && !bar.stacked {
            bar.mode = Some(TerminalModeGuard::acquire(bar.terminal.clone())?);
        }
        Ok(bar)
    }

    /// Draws the zero-progress frame, starting a run if none is active.
    pub fn init(&mut self) -> Result<BarState> {
        self.tick(0)
    }

    /// Advances by one.
    pub fn inc(&mut self) -> Result<BarState> {
        self.tick(1)
    }

    /// Advances by `delta` and redraws the line.
    ///
    /// Progress saturates at the total. Reaching it finishes the line (kept or
    /// cleared, see [`with_leave`]), moves a stacked bar back up to its parent
    /// row and resets the bar to idle; the returned state is then
    /// [`BarState::Completed`].
    ///
    /// Does nothing while the column budget is zero.
    pub fn tick(&mut self, delta: u64) -> Result<BarState> {
        if self.columns == 0 {
            return Ok(self.state);
        }

        let mut frame = String::new();
        let current = match self.state {
            BarState::Active { progress } => progress,
            BarState::Idle | BarState::Completed => {
                if self.stacked {
                    // claim a row of our own below the parent
                    frame.push('\n');
                }
                self.clamp_columns();
                0
            }
        };
        let progress = current.saturating_add(delta).min(self.total);
        self.state = BarState::Active { progress };

        if let Some(cycle) = self.recalc_cycle {
            if progress % cycle.get() == 0 {
                trace!(target: "pbar", "re-sampling terminal width at {}", progress);
                self.clamp_columns();
            }
        }

        let timing = if self.time_measurement {
            Some(self.stopwatch.sample(progress, self.total))
        } else {
            None
        };
        let line = layout::render_line(&LineInput {
            columns: self.columns,
            description: &self.description,
            progress,
            total: self.total,
            digit_width: self.digit_width,
            timing,
            glyphs: &self.glyphs,
        });
        if line.degraded && self.time_measurement {
            debug!(
                target: "pbar",
                "{} columns cannot fit time statistics, dropping them",
                self.columns
            );
            self.time_measurement = false;
        }
        self.columns = line.columns;

        frame.push_str(&CLEAR_LINE);
        frame.push('\r');
        frame.push_str(&line.text);

        let state = if progress == self.total {
            self.finish_frame(&mut frame);
            self.reset();
            BarState::Completed
        } else {
            self.state
        };
        self.terminal.write(Stream::Stdout, &frame)?;
        Ok(state)
    }

    fn finish_frame(&self, frame: &mut String) {
        if self.leave {
            frame.push_str("\r\n");
        } else {
            frame.push_str(&CLEAR_LINE);
            frame.push('\r');
        }
        if self.stacked && !self.interrupted {
            frame.push_str(&CURSOR_UP);
        }
    }

    fn clamp_columns(&mut self) {
        self.columns = self.columns.min(detected_columns(&*self.terminal));
    }

    /// Returns the bar to idle so the next tick starts a fresh run.
    pub fn reset(&mut self) {
        self.state = BarState::Idle;
        self.stopwatch.reset();
        self.interrupted = false;
    }

    /// Writes `msg` to stdout in place of the current line.
    ///
    /// Marks the run as interrupted: the message moved the cursor, so a
    /// stacked bar will not step back up when it completes.
    pub fn write(&mut self, msg: &str) -> Result<()> {
        self.stdout_channel.write_line(&*self.terminal, msg)?;
        self.interrupted = true;
        Ok(())
    }

    /// Writes `msg` to stderr, clearing the line first when stderr is a
    /// terminal.
    pub fn warn(&mut self, msg: &str) -> Result<()> {
        self.stderr_channel.write_line(&*self.terminal, msg)?;
        self.interrupted = true;
        Ok(())
    }

    /// Replaces the label drawn before the percentage.
    pub fn set_description(&mut self, description: impl Into<String>) {
        self.description = description.into();
    }

    /// Switches the bar to stacked rendering.
    ///
    /// Stacking implies not leaving the finished line. If this bar acquired
    /// the terminal modes, it hands them off without restoring them; the
    /// owning bar restores them.
    pub fn enable_stack(&mut self) {
        self.stacked = true;
        self.leave = false;
        if let Some(mode) = self.mode.take() {
            mode.relinquish();
        }
    }

    /// Keeps the finished line on screen.
    pub fn enable_leave(&mut self) {
        self.leave = true;
    }

    /// Clears the finished line.
    pub fn disable_leave(&mut self) {
        self.leave = false;
    }

    /// Draws the elapsed/remaining/velocity field.
    pub fn enable_time_measurement(&mut self) {
        self.time_measurement = true;
    }

    /// Stops drawing the elapsed/remaining/velocity field.
    pub fn disable_time_measurement(&mut self) {
        self.time_measurement = false;
    }

    /// Re-samples the terminal width whenever progress is a multiple of
    /// `cycle`. The budget only ever shrinks.
    ///
    /// # Errors
    ///
    /// [`Error::ZeroRecalcCycle`] when `cycle` is zero.
    pub fn enable_recalc_console_width(&mut self, cycle: u64) -> Result<()> {
        let cycle = NonZeroU64::new(cycle).ok_or(Error::ZeroRecalcCycle)?;
        self.recalc_cycle = Some(cycle);
        Ok(())
    }

    /// Stops re-sampling the terminal width.
    pub fn disable_recalc_console_width(&mut self) {
        self.recalc_cycle = None;
    }

    /// Count at which a run completes.
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Current column budget; zero means rendering is disabled.
    pub fn columns(&self) -> u64 {
        self.columns
    }

    /// Current count, or `None` while idle.
    pub fn progress(&self) -> Option<u64> {
        match self.state {
            BarState::Active { progress } => Some(progress),
            BarState::Idle | BarState::Completed => None,
        }
    }

    /// Current state.
    pub fn state(&self) -> BarState {
        self.state
    }

    /// Label drawn before the percentage.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Width of the counter fields, the digit count of the total.
    pub fn digit_width(&self) -> u64 {
        self.digit_width
    }

    /// Whether the bar renders on a reserved row.
    pub fn is_stacked(&self) -> bool {
        self.stacked
    }

    /// Whether the finished line stays on screen.
    pub fn leaves_on_complete(&self) -> bool {
        self.leave
    }

    /// Whether the time field is drawn.
    pub fn time_measurement_enabled(&self) -> bool {
        self.time_measurement
    }

    /// Width re-sampling cycle, if enabled.
    pub fn recalc_cycle(&self) -> Option<u64> {
        self.recalc_cycle.map(NonZeroU64::get)
    }

    /// Whether a message was written during the current run.
    pub fn is_interrupted(&self) -> bool {
        self.interrupted
    }

    /// Whether stderr was a terminal when the bar was built.
    pub fn stderr_is_tty(&self) -> bool {
        self.stderr_is_tty
    }

    /// Whether this bar owns the cursor and console mode.
    pub fn owns_terminal(&self) -> bool {
        self.mode.is_some()
    }
}
