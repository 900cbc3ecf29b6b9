//! Line layout for progress bars.
//!
//! [`render_line`] turns the state of a bar into the exact text of one
//! terminal line. The line is assembled from fixed-width fields around a
//! stretchable bracket section:
//!
//! ```text
//! desc: 42%|█████████████               | 42/100 [00:03<00:04, 13.12it/s]
//! ```
//!
//! The bracket section gets whatever the fixed fields leave of the column
//! budget. When nothing is left, the time statistics are dropped and the
//! bracket section falls back to [`MIN_BAR_WIDTH`]; the caller is told via
//! [`RenderedLine::degraded`] so it can stop measuring time for good.
//!
//! # Examples
//!
//! ```rust
//! use pbar::layout::{render_line, Glyphs, LineInput};
//!
//! let glyphs = Glyphs::default();
//! let line = render_line(&LineInput {
//!     columns: 20,
//!     description: "",
//!     progress: 1,
//!     total: 2,
//!     digit_width: 1,
//!     timing: None,
//!     glyphs: &glyphs,
//! });
//! assert_eq!(line.text, " 50%|█████     | 1/2");
//! ```

use crate::stopwatch::Timing;
use unicode_width::UnicodeWidthStr;

/// Bracket width used when the column budget cannot fit the line.
pub const MIN_BAR_WIDTH: u64 = 10;

/// Columns taken by the percentage field, both brackets, the space before
/// the counter and the slash inside it.
const FRAME_WIDTH: u64 = 8;

/// Characters used to draw the bracket section.
///
/// Each glyph must occupy a single terminal column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Glyphs {
    /// Filled cell.
    pub done: char,
    /// Unfilled cell.
    pub todo: char,
    /// Left edge of the bar.
    pub open: char,
    /// Right edge of the bar.
    pub close: char,
}

impl Default for Glyphs {
    fn default() -> Self {
        Self {
            done: '█',
            todo: ' ',
            open: '|',
            close: '|',
        }
    }
}

/// Everything [`render_line`] needs to lay out one frame.
#[derive(Debug, Clone, Copy)]
pub struct LineInput<'a> {
    /// Column budget for the whole line.
    pub columns: u64,
    /// Label printed before the percentage; omitted when empty.
    pub description: &'a str,
    /// Current count, at most `total`.
    pub progress: u64,
    /// Count at completion, never zero.
    pub total: u64,
    /// Digits of `total`; the counter is padded to this width.
    pub digit_width: u64,
    /// Time statistics, or `None` when time measurement is off.
    pub timing: Option<Timing>,
    /// Bar characters.
    pub glyphs: &'a Glyphs,
}

/// A laid-out line together with the numbers it was built from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedLine {
    /// The line, without any control sequences.
    pub text: String,
    /// Column budget after layout; grows past the input only on degradation.
    pub columns: u64,
    /// Cells between the brackets.
    pub bar_width: u64,
    /// Filled cells.
    pub filled: u64,
    /// Rounded percentage.
    pub percent: u64,
    /// The fixed fields did not fit and time statistics were dropped.
    pub degraded: bool,
}

/// Number of decimal digits in `n`; zero has one digit.
pub fn digit_count(n: u64) -> u64 {
    if n == 0 {
        return 1;
    }
    u64::from(n.ilog10()) + 1
}

/// Columns used by everything except the bracket cells and time statistics.
pub fn base_width(description: &str, digit_width: u64) -> u64 {
    let label = if description.is_empty() {
        0
    } else {
        // the trailing colon
        description.width() as u64 + 1
    };
    label + 2 * digit_width + FRAME_WIDTH
}

fn clock(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    let hours = secs / 3600;
    let minutes = (secs / 60) % 60;
    let seconds = secs % 60;
    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{:02}:{:02}", minutes, seconds)
    }
}

/// Formats the trailing `[elapsed<remaining, velocity]` field.
///
/// The field is 23 columns plus the integer digits of the velocity, plus
/// `digits + 1` for each clock that reached one hour.
pub fn time_field(timing: &Timing) -> String {
    format!(
        " [{}<{}, {:.2}it/s]",
        clock(timing.elapsed),
        clock(timing.remaining),
        timing.velocity
    )
}

/// Lays out one progress line within `input.columns`.
pub fn render_line(input: &LineInput<'_>) -> RenderedLine {
    let base = base_width(input.description, input.digit_width);
    let mut time = input.timing.as_ref().map(time_field);
    let fixed = base + time.as_deref().map_or(0, |t| t.width() as u64);

    let (columns, bar_width, degraded) = if input.columns > fixed {
        (input.columns, input.columns - fixed, false)
    } else {
        time = None;
        (MIN_BAR_WIDTH + base, MIN_BAR_WIDTH, true)
    };

    let ratio = input.progress as f64 / input.total as f64;
    let filled = ((ratio * bar_width as f64).round() as u64).min(bar_width);
    let percent = (ratio * 100.0).round() as u64;

    let mut text = String::with_capacity(columns as usize * 3);
    if !input.description.is_empty() {
        text.push_str(input.description);
        text.push(':');
    }
    text.push_str(&format!("{:>3}%", percent));
    text.push(input.glyphs.open);
    text.extend(std::iter::repeat(input.glyphs.done).take(filled as usize));
    text.extend(std::iter::repeat(input.glyphs.todo).take((bar_width - filled) as usize));
    text.push(input.glyphs.close);
    text.push_str(&format!(
        " {:>width$}/{}",
        input.progress,
        input.total,
        width = input.digit_width as usize
    ));
    if let Some(time) = time {
        text.push_str(&time);
    }

    RenderedLine {
        text,
        columns,
        bar_width,
        filled,
        percent,
        degraded,
    }
}
