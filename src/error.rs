//! Error types shared by progress bars and spinners.

use std::io;
use thiserror::Error;

/// Errors raised by [`ProgressBar`](crate::progress::ProgressBar) and
/// [`Spinner`](crate::spinner::Spinner).
#[derive(Error, Debug)]
pub enum Error {
    /// A bar was constructed with a total of zero.
    #[error("total must be greater than zero")]
    ZeroTotal,

    /// An iterator without an exact length was asked to build its own bar.
    #[error("iterator length is unknown")]
    UnknownLength,

    /// Width recalculation was enabled with a cycle of zero.
    #[error("recalculation cycle must be greater than zero")]
    ZeroRecalcCycle,

    /// `start` was called on a spinner whose animation thread is live.
    #[error("spinner is already running")]
    AlreadyRunning,

    /// The animation thread could not be started.
    #[error("failed to spawn spinner thread: {0}")]
    Spawn(#[source] io::Error),

    /// The animation thread panicked before it could be joined.
    #[error("spinner animation thread panicked")]
    SpinnerPanicked,

    /// Writing to or configuring the terminal failed.
    #[error("terminal I/O failed: {0}")]
    Terminal(#[from] io::Error),
}

/// Shorthand for results carrying [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
