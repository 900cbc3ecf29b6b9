//! Iterator adapters that drive a [`ProgressBar`].
//!
//! [`ProgressIteratorExt`] adds `progress` and `progress_with` to every
//! [`Iterator`]. An item counts as done when the loop asks for the next one,
//! so the bar reaches its total when the iterator is exhausted rather than
//! when the last item is handed out.
//!
//! ```rust,no_run
//! use pbar::ProgressIteratorExt;
//!
//! # fn main() -> pbar::Result<()> {
//! for path in vec!["a.txt", "b.txt", "c.txt"].into_iter().progress()? {
//!     // ... process path ...
//! }
//! # Ok(())
//! # }
//! ```

use std::borrow::{Borrow, BorrowMut};

use tracing::warn;

use crate::error::{Error, Result};
use crate::progress::{BarOption, BarState, ProgressBar};

/// Wraps an iterator and ticks a bar once per finished item.
///
/// `B` is either an owned [`ProgressBar`] or a `&mut ProgressBar`, so a
/// caller can keep a bar across several loops.
#[derive(Debug)]
pub struct ProgressIter<I, B> {
    iter: I,
    bar: B,
    pending: bool,
    started: bool,
}

impl<I, B> ProgressIter<I, B>
where
    B: BorrowMut<ProgressBar>,
{
    /// Creates a new `ProgressIter`.
    ///
    /// Usually constructed via [`ProgressIteratorExt`].
    pub fn new(iter: I, bar: B) -> Self {
        Self {
            iter,
            bar,
            pending: false,
            started: false,
        }
    }

    /// The bar being driven.
    pub fn bar(&self) -> &ProgressBar {
        Borrow::<ProgressBar>::borrow(&self.bar)
    }

    fn step(&mut self, f: impl FnOnce(&mut ProgressBar) -> Result<BarState>) {
        if let Err(e) = f(BorrowMut::<ProgressBar>::borrow_mut(&mut self.bar)) {
            warn!(target: "pbar", "progress iterator could not redraw: {}", e);
        }
    }
}

impl<I, B> Iterator for ProgressIter<I, B>
where
    I: Iterator,
    B: BorrowMut<ProgressBar>,
{
    type Item = I::Item;

    fn next(&mut self) -> Option<Self::Item> {
        if !self.started {
            self.started = true;
            if self.bar().state() == BarState::Idle {
                self.step(ProgressBar::init);
            }
        }
        if self.pending {
            self.pending = false;
            self.step(ProgressBar::inc);
        }

        let item = self.iter.next();
        self.pending = item.is_some();
        item
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.iter.size_hint()
    }
}

impl<I, B> ExactSizeIterator for ProgressIter<I, B>
where
    I: ExactSizeIterator,
    B: BorrowMut<ProgressBar>,
{
}

/// Extension trait to attach a [`ProgressBar`] to any iterator.
pub trait ProgressIteratorExt: Iterator + Sized {
    /// Wraps the iterator in a new bar whose total is the iterator's exact
    /// length.
    ///
    /// # Errors
    ///
    /// [`Error::UnknownLength`] when `size_hint` has no exact bound, and
    /// [`Error::ZeroTotal`] when the iterator is empty.
    fn progress(self) -> Result<ProgressIter<Self, ProgressBar>> {
        self.progress_with_options(&[])
    }

    /// Like [`progress`](ProgressIteratorExt::progress), building the bar from
    /// `opts`.
    fn progress_with_options(self, opts: &[BarOption]) -> Result<ProgressIter<Self, ProgressBar>> {
        let total = exact_len(&self).ok_or(Error::UnknownLength)?;
        let bar = ProgressBar::new(total, opts)?;
        Ok(ProgressIter::new(self, bar))
    }

    /// Drives an existing bar, which keeps its own total.
    fn progress_with<B>(self, bar: B) -> ProgressIter<Self, B>
    where
        B: BorrowMut<ProgressBar>,
    {
        ProgressIter::new(self, bar)
    }
}

impl<I: Iterator> ProgressIteratorExt for I {}

fn exact_len<I: Iterator>(iter: &I) -> Option<u64> {
    match iter.size_hint() {
        (lower, Some(upper)) if lower == upper => Some(upper as u64),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::{with_leave, without_time_measurement};
    use crate::terminal::{MemoryTerminal, Stream};
    use std::sync::Arc;

    fn bar(terminal: &Arc<MemoryTerminal>, total: u64) -> ProgressBar {
        ProgressBar::with_terminal(
            total,
            &[without_time_measurement(), with_leave(true)],
            terminal.clone(),
        )
        .unwrap()
    }

    #[test]
    fn test_counts_items_as_they_finish() {
        let terminal = Arc::new(MemoryTerminal::new(Some(41)));
        let mut bar = bar(&terminal, 3);

        let mut iter = vec!['a', 'b', 'c'].into_iter().progress_with(&mut bar);
        assert_eq!(iter.next(), Some('a'));
        assert_eq!(iter.bar().progress(), Some(0));
        assert_eq!(iter.next(), Some('b'));
        assert_eq!(iter.bar().progress(), Some(1));
        assert_eq!(iter.next(), Some('c'));
        assert_eq!(iter.bar().progress(), Some(2));
        assert_eq!(iter.next(), None);
        assert_eq!(iter.bar().state(), BarState::Idle);

        let visible = terminal.visible_output(Stream::Stdout);
        assert!(visible.contains("  0%|"));
        assert!(visible.contains("100%|"));
    }

    #[test]
    fn test_exhausted_iterator_stays_quiet() {
        let terminal = Arc::new(MemoryTerminal::new(Some(41)));
        let mut bar = bar(&terminal, 2);

        let mut iter = vec![1, 2].into_iter().progress_with(&mut bar);
        while iter.next().is_some() {}
        let settled = terminal.output(Stream::Stdout);
        assert_eq!(iter.next(), None);
        assert_eq!(terminal.output(Stream::Stdout), settled);
    }

    #[test]
    fn test_shared_bar_across_loops() {
        let terminal = Arc::new(MemoryTerminal::new(Some(41)));
        let mut bar = bar(&terminal, 4);

        for _ in [1, 2].into_iter().progress_with(&mut bar) {}
        assert_eq!(bar.progress(), Some(2));
        for _ in [3, 4].into_iter().progress_with(&mut bar) {}
        assert_eq!(bar.state(), BarState::Idle);
        assert_eq!(terminal.visible_output(Stream::Stdout).matches("100%|").count(), 1);
    }

    #[test]
    fn test_size_hint_passthrough() {
        let terminal = Arc::new(MemoryTerminal::new(Some(41)));
        let iter = (0..7).progress_with(bar(&terminal, 7));
        assert_eq!(iter.size_hint(), (7, Some(7)));
        assert_eq!(iter.len(), 7);
    }

    #[test]
    fn test_progress_rejects_empty_iterator() {
        assert!(matches!(
            std::iter::empty::<u8>().progress(),
            Err(Error::ZeroTotal)
        ));
    }

    #[test]
    fn test_progress_rejects_unknown_length() {
        assert!(matches!(
            (0..).filter(|n| n % 2 == 0).progress(),
            Err(Error::UnknownLength)
        ));
        assert!(matches!(
            (0..10).filter(|n| n % 2 == 0).progress(),
            Err(Error::UnknownLength)
        ));
        assert_eq!(exact_len(&(0..5)), Some(5));
        assert_eq!(exact_len(&std::iter::empty::<u8>()), Some(0));
    }
}
