#![warn(missing_docs)]
#![doc(html_root_url = "https://docs.rs/pbar-rs/")]

//! # pbar-rs
//!
//! Terminal progress bars and a spinner for command-line programs.
//!
//! ## Overview
//!
//! A [`ProgressBar`] counts to a fixed total and redraws one terminal line
//! on every tick. The line is fitted to the terminal width, carries optional
//! elapsed, remaining and throughput statistics, and can be stacked beneath
//! another bar so nested loops each get a row of their own. A [`Spinner`]
//! animates one line from a background thread while the caller works.
//!
//! Both components leave the terminal as they found it: the cursor is hidden
//! while they draw and shown again when they finish, are stopped, or are
//! dropped. When stdout is not a terminal a bar draws nothing and messages
//! are written unchanged.
//!
//! ## Progress bars
//!
//! ```rust,no_run
//! use pbar::progress::{with_description, ProgressBar};
//!
//! # fn main() -> pbar::Result<()> {
//! let mut bar = ProgressBar::new(250, &[with_description("download")])?;
//! bar.init()?;
//! for chunk in 0..250 {
//!     if chunk == 100 {
//!         bar.write("checksum verified\n")?;
//!     }
//!     bar.inc()?;
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Iterators
//!
//! ```rust,no_run
//! use pbar::ProgressIteratorExt;
//!
//! # fn main() -> pbar::Result<()> {
//! let total: u64 = (1..=1000u64).progress()?.sum();
//! # let _ = total;
//! # Ok(())
//! # }
//! ```
//!
//! ## Spinners
//!
//! ```rust,no_run
//! use pbar::spinner::{with_interval, Spinner};
//! use std::time::Duration;
//!
//! # fn main() -> pbar::Result<()> {
//! let mut spinner = Spinner::new("resolving", &[with_interval(Duration::from_millis(100))])?;
//! spinner.start()?;
//! // ... work ...
//! spinner.ok()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Testing
//!
//! Every component can be built over a [`MemoryTerminal`] through its
//! `with_terminal` constructor, which records output per stream and reports
//! whatever width and tty status the test chooses.
//!
//! ## Logging
//!
//! Diagnostics are emitted through [`tracing`] under the `pbar` target:
//! width changes and dropped time statistics at `debug`, and failures that
//! cannot be returned (such as restoring the terminal from `Drop`) at `warn`.
//!
//! ## Components
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`progress`] | Tick-driven progress bar with stacking |
//! | [`spinner`] | Background line animation |
//! | [`iter`] | Iterator adapters driving a bar |
//! | [`layout`] | Fitting a bar line into a column budget |
//! | [`stopwatch`] | Elapsed time, velocity and remaining-time estimates |
//! | [`terminal`] | Terminal access, control sequences and mode guard |

pub mod error;
pub mod iter;
pub mod layout;
pub mod progress;
pub mod spinner;
pub mod stopwatch;
pub mod terminal;

pub use error::{Error, Result};
pub use iter::{ProgressIter, ProgressIteratorExt};
pub use progress::{BarOption, BarState, ProgressBar};
pub use spinner::{Spinner, SpinnerFrames, SpinnerOption};
pub use terminal::{CrosstermTerminal, MemoryTerminal, Stream, Terminal};

/// Commonly used types and option constructors.
///
/// ```rust
/// use pbar::prelude::*;
///
/// let options = [with_description("sync"), with_leave(false)];
/// assert_eq!(options.len(), 2);
/// ```
pub mod prelude {
    pub use crate::iter::ProgressIteratorExt;
    pub use crate::layout::Glyphs;
    pub use crate::progress::{
        stacked, with_columns, with_description, with_glyphs, with_leave, with_recalc_cycle,
        without_time_measurement, BarOption, BarState, ProgressBar,
    };
    pub use crate::spinner::{with_frames, with_interval, Spinner, SpinnerOption, DOTS, LINE};
    pub use crate::{Error, Result};
}
