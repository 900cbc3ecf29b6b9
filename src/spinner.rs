//! Spinner component.
//!
//! A [`Spinner`] animates one terminal line from a background thread until it
//! is stopped, then optionally prints a success or failure line in its place.
//!
//! # Basic Usage
//!
//! ```rust,no_run
//! use pbar::spinner::Spinner;
//!
//! # fn main() -> pbar::Result<()> {
//! let mut spinner = Spinner::new("Connecting", &[])?;
//! spinner.start()?;
//! // ... work ...
//! spinner.write("handshake done\n")?;
//! // ... more work ...
//! spinner.ok()?;
//! # Ok(())
//! # }
//! ```
//!
//! # Available Frame Sets
//!
//! - `DOTS`: braille dots, the default outside Windows
//! - `LINE`: `|`, `/`, `-`, `\`, the default on Windows consoles
//!
//! # Interleaved writes
//!
//! Animation frames and messages passed to [`Spinner::write`] or
//! [`Spinner::warn`] go through one lock, so a message is never split by a
//! frame and a frame is never drawn in the middle of a message.

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::terminal::{CrosstermTerminal, OutputChannel, Stream, Terminal, TerminalModeGuard};

/// Delay between frames unless [`with_interval`] says otherwise.
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(200);

const SUCCESS_GLYPH: &str = "✔";
const FAILURE_GLYPH: &str = "✖";

/// A sequence of glyphs drawn one after another.
///
/// # Examples
///
/// ```rust
/// use pbar::spinner::SpinnerFrames;
///
/// let arrows = SpinnerFrames::new(vec!["←".to_string(), "↑".to_string(), "→".to_string(), "↓".to_string()]);
/// assert_eq!(arrows.frames.len(), 4);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpinnerFrames {
    /// Glyphs to cycle through, each one terminal column wide.
    pub frames: Vec<String>,
}

impl SpinnerFrames {
    /// Creates a frame set from `frames`.
    pub fn new(frames: Vec<String>) -> Self {
        Self { frames }
    }
}

/// Line spinner, safe on every console.
pub static LINE: Lazy<SpinnerFrames> = Lazy::new(|| SpinnerFrames {
    frames: vec![
        "|".to_string(),
        "/".to_string(),
        "-".to_string(),
        "\\".to_string(),
    ],
});

/// Braille dot spinner.
pub static DOTS: Lazy<SpinnerFrames> = Lazy::new(|| SpinnerFrames {
    frames: vec![
        "⠋".to_string(),
        "⠙".to_string(),
        "⠹".to_string(),
        "⠸".to_string(),
        "⠼".to_string(),
        "⠴".to_string(),
        "⠦".to_string(),
        "⠧".to_string(),
        "⠇".to_string(),
        "⠏".to_string(),
    ],
});

fn default_frames() -> SpinnerFrames {
    if cfg!(windows) {
        LINE.clone()
    } else {
        DOTS.clone()
    }
}

/// Configuration options applied when a [`Spinner`] is built.
#[derive(Debug, Clone)]
pub enum SpinnerOption {
    /// Glyphs to animate.
    WithFrames(SpinnerFrames),
    /// Delay between frames.
    WithInterval(Duration),
}

impl SpinnerOption {
    fn apply(&self, spinner: &mut Spinner) {
        match self {
            SpinnerOption::WithFrames(frames) => {
                spinner.frames = frames.frames.iter().cloned().collect();
            }
            SpinnerOption::WithInterval(interval) => spinner.interval = *interval,
        }
    }
}

/// Animates `frames` instead of the platform default.
///
/// ```rust
/// use pbar::spinner::{with_frames, Spinner, LINE};
///
/// let spinner = Spinner::new("loading", &[with_frames(LINE.clone())]).unwrap();
/// assert_eq!(spinner.frames(), LINE.frames.as_slice());
/// ```
pub fn with_frames(frames: SpinnerFrames) -> SpinnerOption {
    SpinnerOption::WithFrames(frames)
}

/// Sets the delay between frames.
///
/// [`Spinner::stop`] may block for up to one interval while the animation
/// thread finishes its sleep.
pub fn with_interval(interval: Duration) -> SpinnerOption {
    SpinnerOption::WithInterval(interval)
}

/// A line-overwriting animation running on its own thread.
///
/// The spinner owns the cursor and console mode while it runs. Dropping a
/// running spinner stops it.
pub struct Spinner {
    text: Arc<str>,
    interval: Duration,
    frames: Arc<[String]>,
    terminal: Arc<dyn Terminal>,
    active: Arc<AtomicBool>,
    output: Arc<Mutex<()>>,
    worker: Option<JoinHandle<()>>,
    stdout_channel: OutputChannel,
    stderr_channel: OutputChannel,
    mode: Option<TerminalModeGuard>,
}

impl fmt::Debug for Spinner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Spinner")
            .field("text", &self.text)
            .field("interval", &self.interval)
            .field("frames", &self.frames)
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

impl Spinner {
    /// Creates an idle spinner labelled `text` on the process terminal.
    pub fn new(text: impl Into<String>, opts: &[SpinnerOption]) -> Result<Self> {
        Self::with_terminal(text, opts, Arc::new(CrosstermTerminal))
    }

    /// Creates an idle spinner drawing through `terminal`.
    ///
    /// Whether messages clear the animation line first is decided here, from
    /// whether each stream is a terminal.
    pub fn with_terminal(
        text: impl Into<String>,
        opts: &[SpinnerOption],
        terminal: Arc<dyn Terminal>,
    ) -> Result<Self> {
        let stdout_channel = OutputChannel::select(Stream::Stdout, terminal.is_tty(Stream::Stdout));
        let stderr_channel = OutputChannel::select(Stream::Stderr, terminal.is_tty(Stream::Stderr));
        let mut spinner = Self {
            text: Arc::from(text.into()),
            interval: DEFAULT_INTERVAL,
            frames: default_frames().frames.into(),
            terminal,
            active: Arc::new(AtomicBool::new(false)),
            output: Arc::new(Mutex::new(())),
            worker: None,
            stdout_channel,
            stderr_channel,
            mode: None,
        };
        for opt in opts {
            opt.apply(&mut spinner);
        }
        Ok(spinner)
    }

    /// Label drawn after the glyph.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Delay between frames.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Glyphs being animated.
    pub fn frames(&self) -> &[String] {
        &self.frames
    }

    /// Whether the animation thread is live.
    pub fn is_running(&self) -> bool {
        self.worker.is_some()
    }

    /// Hides the cursor and starts the animation thread.
    ///
    /// # Errors
    ///
    /// [`Error::AlreadyRunning`] if the spinner is already animating; the
    /// running thread is left alone.
    pub fn start(&mut self) -> Result<()> {
        if self.worker.is_some() {
            return Err(Error::AlreadyRunning);
        }

        let mode = TerminalModeGuard::acquire(self.terminal.clone())?;
        self.active.store(true, Ordering::Release);

        let animation = Animation {
            text: self.text.clone(),
            interval: self.interval,
            frames: self.frames.clone(),
            terminal: self.terminal.clone(),
            active: self.active.clone(),
            output: self.output.clone(),
        };
        let worker = thread::Builder::new()
            .name("pbar-spinner".to_string())
            .spawn(move || animation.run())
            .map_err(|e| {
                self.active.store(false, Ordering::Release);
                Error::Spawn(e)
            })?;

        debug!(target: "pbar", "spinner started: {}", self.text);
        self.mode = Some(mode);
        self.worker = Some(worker);
        Ok(())
    }

    /// Restores the terminal, then stops the animation thread and waits for it.
    ///
    /// Blocks for at most one interval. Does nothing if the spinner is not
    /// running.
    pub fn stop(&mut self) -> Result<()> {
        let released = match self.mode.take() {
            Some(mode) => mode.release(),
            None => Ok(()),
        };
        self.active.store(false, Ordering::Release);
        let joined = match self.worker.take() {
            Some(worker) => {
                debug!(target: "pbar", "spinner stopping: {}", self.text);
                worker.join().map_err(|_| {
                    warn!(target: "pbar", "spinner thread panicked: {}", self.text);
                    Error::SpinnerPanicked
                })
            }
            None => Ok(()),
        };
        released?;
        joined
    }

    /// Stops and prints `✔<text> [SUCCESS]`.
    pub fn ok(&mut self) -> Result<()> {
        self.finish(SUCCESS_GLYPH, "SUCCESS")
    }

    /// Stops and prints `✖<text> [FAILURE]`.
    pub fn err(&mut self) -> Result<()> {
        self.finish(FAILURE_GLYPH, "FAILURE")
    }

    fn finish(&mut self, glyph: &str, status: &str) -> Result<()> {
        self.stop()?;
        let _held = self.output.lock();
        self.terminal.write(
            Stream::Stdout,
            &format!("\r{}{} [{}]\n", glyph, self.text, status),
        )?;
        Ok(())
    }

    /// Writes `msg` to stdout between two frames.
    pub fn write(&self, msg: &str) -> Result<()> {
        let _held = self.output.lock();
        self.stdout_channel.write_line(&*self.terminal, msg)?;
        Ok(())
    }

    /// Writes `msg` to stderr between two frames.
    pub fn warn(&self, msg: &str) -> Result<()> {
        let _held = self.output.lock();
        self.stderr_channel.write_line(&*self.terminal, msg)?;
        Ok(())
    }
}

impl Drop for Spinner {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            warn!(target: "pbar", "spinner did not stop cleanly: {}", e);
        }
    }
}

/// State moved onto the animation thread.
struct Animation {
    text: Arc<str>,
    interval: Duration,
    frames: Arc<[String]>,
    terminal: Arc<dyn Terminal>,
    active: Arc<AtomicBool>,
    output: Arc<Mutex<()>>,
}

impl Animation {
    fn run(self) {
        let mut index = 0;
        while self.active.load(Ordering::Acquire) {
            {
                let _held = self.output.lock();
                let glyph = self.frames.get(index).map_or("", String::as_str);
                let line = format!("\r{} {}", glyph, self.text);
                if let Err(e) = self.terminal.write(Stream::Stdout, &line) {
                    warn!(target: "pbar", "spinner frame not written: {}", e);
                }
                index = (index + 1) % self.frames.len().max(1);
            }
            thread::sleep(self.interval);
        }
    }
}
