//! Page windows: split `[0, total_pages)` into bounded, contiguous ranges.
//!
//! Document AI rejects (or silently truncates) large synchronous requests,
//! so a document is submitted as a series of sub-documents of at most
//! `window_size` pages each. The partition is a pure function of the page
//! count and window size; iterating it twice yields the same windows.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::NonZeroUsize;
use std::ops::Range;

/// Half-open, zero-based page range `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Window {
    pub start: usize,
    pub end: usize,
}

impl Window {
    /// Create a window. `start` must be strictly less than `end`.
    pub fn new(start: usize, end: usize) -> Self {
        debug_assert!(start < end, "empty window [{start}, {end})");
        Self { start, end }
    }

    /// Number of pages in the window.
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    pub fn pages(&self) -> Range<usize> {
        self.start..self.end
    }

    /// 1-based inclusive label, e.g. `"16~30"` for `[15, 30)`.
    pub fn page_label(&self) -> String {
        format!("{}~{}", self.start + 1, self.end)
    }
}

impl fmt::Display for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

/// Plans the windows for a document of `total_pages` pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Partitioner {
    total_pages: usize,
    window_size: NonZeroUsize,
}

impl Partitioner {
    pub fn new(total_pages: usize, window_size: NonZeroUsize) -> Self {
        Self {
            total_pages,
            window_size,
        }
    }

    pub fn total_pages(&self) -> usize {
        self.total_pages
    }

    pub fn window_size(&self) -> usize {
        self.window_size.get()
    }

    /// Number of windows the partition yields.
    pub fn window_count(&self) -> usize {
        self.total_pages.div_ceil(self.window_size.get())
    }

    /// Lazily iterate the windows in ascending order.
    pub fn windows(&self) -> Windows {
        Windows {
            next_start: 0,
            total_pages: self.total_pages,
            window_size: self.window_size.get(),
        }
    }
}

impl IntoIterator for Partitioner {
    type Item = Window;
    type IntoIter = Windows;

    fn into_iter(self) -> Windows {
        self.windows()
    }
}

/// Iterator returned by [`Partitioner::windows`].
#[derive(Debug, Clone)]
pub struct Windows {
    next_start: usize,
    total_pages: usize,
    window_size: usize,
}

impl Iterator for Windows {
    type Item = Window;

    fn next(&mut self) -> Option<Window> {
        if self.next_start >= self.total_pages {
            return None;
        }
        let start = self.next_start;
        let end = start.saturating_add(self.window_size).min(self.total_pages);
        self.next_start = end;
        Some(Window::new(start, end))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self
            .total_pages
            .saturating_sub(self.next_start)
            .div_ceil(self.window_size);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Windows {}

impl std::iter::FusedIterator for Windows {}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan(total: usize, size: usize) -> Vec<(usize, usize)> {
        Partitioner::new(total, NonZeroUsize::new(size).unwrap())
            .windows()
            .map(|w| (w.start, w.end))
            .collect()
    }

    #[test]
    fn thirty_two_pages_by_fifteen() {
        assert_eq!(plan(32, 15), vec![(0, 15), (15, 30), (30, 32)]);
    }

    #[test]
    fn zero_pages_yields_nothing() {
        assert!(plan(0, 15).is_empty());
        let p = Partitioner::new(0, NonZeroUsize::new(15).unwrap());
        assert_eq!(p.window_count(), 0);
    }

    #[test]
    fn short_document_is_one_window() {
        assert_eq!(plan(4, 15), vec![(0, 4)]);
        assert_eq!(plan(15, 15), vec![(0, 15)]);
    }

    #[test]
    fn window_size_one() {
        assert_eq!(plan(3, 1), vec![(0, 1), (1, 2), (2, 3)]);
    }

    #[test]
    fn coverage_is_exact_for_many_shapes() {
        for total in 0..=64 {
            for size in 1..=20 {
                let windows = plan(total, size);
                let mut cursor = 0;
                for &(start, end) in &windows {
                    assert_eq!(start, cursor, "gap or overlap at {total}/{size}");
                    assert!(end > start);
                    assert!(end - start <= size);
                    cursor = end;
                }
                assert_eq!(cursor, total, "coverage at {total}/{size}");
                let p = Partitioner::new(total, NonZeroUsize::new(size).unwrap());
                assert_eq!(p.window_count(), windows.len());
                assert_eq!(p.windows().len(), windows.len());
            }
        }
    }

    #[test]
    fn restartable() {
        let p = Partitioner::new(40, NonZeroUsize::new(15).unwrap());
        let first: Vec<Window> = p.windows().collect();
        let second: Vec<Window> = p.into_iter().collect();
        assert_eq!(first, second);
    }

    #[test]
    fn page_label_is_one_based() {
        assert_eq!(Window::new(0, 15).page_label(), "1~15");
        assert_eq!(Window::new(30, 32).page_label(), "31~32");
        assert_eq!(Window::new(30, 32).len(), 2);
        assert_eq!(Window::new(30, 32).to_string(), "[30, 32)");
    }
}
