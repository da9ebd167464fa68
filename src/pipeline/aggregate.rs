//! Merge chunks from successful windows into one document.
//!
//! The aggregator never sorts. Chunks come out in exactly the order they went
//! in; the orchestrator appends windows in ascending page order, and Document
//! AI's chunk list is already in reading order within a window.

use crate::output::ContentChunk;
use crate::pipeline::partition::Window;

/// Paragraph break placed between consecutive chunks.
pub const CHUNK_DELIMITER: &str = "\n\n";

/// Accumulates chunks across windows.
#[derive(Debug, Default)]
pub struct Aggregator {
    parts: Vec<(Window, Vec<ContentChunk>)>,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the chunks of a successfully processed window.
    pub fn append(&mut self, window: Window, chunks: Vec<ContentChunk>) {
        debug_assert!(
            self.parts.last().is_none_or(|(last, _)| last.end <= window.start),
            "window {window} appended out of order"
        );
        self.parts.push((window, chunks));
    }

    /// Number of windows appended so far.
    pub fn window_count(&self) -> usize {
        self.parts.len()
    }

    pub fn chunk_count(&self) -> usize {
        self.parts.iter().map(|(_, c)| c.len()).sum()
    }

    /// Chunks in append order, each with its `(window.start, ordinal)` key.
    pub fn chunks(&self) -> impl Iterator<Item = ((usize, usize), &ContentChunk)> {
        self.parts
            .iter()
            .flat_map(|(window, chunks)| chunks.iter().map(move |c| (c.order_key(*window), c)))
    }

    /// Join every appended chunk with [`CHUNK_DELIMITER`] and trim the result.
    ///
    /// Takes `&self`, so calling it repeatedly returns the same text.
    pub fn finalize(&self) -> String {
        let mut merged = String::new();
        for (_, chunk) in self.chunks() {
            merged.push_str(&chunk.content);
            merged.push_str(CHUNK_DELIMITER);
        }
        merged.trim().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunks(texts: &[&str]) -> Vec<ContentChunk> {
        texts
            .iter()
            .enumerate()
            .map(|(i, t)| ContentChunk::new(i, *t))
            .collect()
    }

    #[test]
    fn joins_in_append_order() {
        let mut agg = Aggregator::new();
        agg.append(Window::new(0, 15), chunks(&["A", "B"]));
        agg.append(Window::new(30, 32), chunks(&["E", "F"]));
        assert_eq!(agg.finalize(), "A\n\nB\n\nE\n\nF");
        assert_eq!(agg.chunk_count(), 4);
        assert_eq!(agg.window_count(), 2);
    }

    #[test]
    fn order_keys_ascend() {
        let mut agg = Aggregator::new();
        agg.append(Window::new(0, 2), chunks(&["a", "b", "c"]));
        agg.append(Window::new(2, 4), chunks(&["d"]));
        agg.append(Window::new(4, 5), chunks(&["e", "f"]));

        let keys: Vec<(usize, usize)> = agg.chunks().map(|(k, _)| k).collect();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);
        assert_eq!(keys, vec![(0, 0), (0, 1), (0, 2), (2, 0), (4, 0), (4, 1)]);

        let by_key: Vec<&str> = agg.chunks().map(|(_, c)| c.content.as_str()).collect();
        assert_eq!(agg.finalize(), by_key.join(CHUNK_DELIMITER));
    }

    #[test]
    fn finalize_is_idempotent() {
        let mut agg = Aggregator::new();
        agg.append(Window::new(0, 1), chunks(&["  lead", "tail  \n"]));
        let first = agg.finalize();
        let second = agg.finalize();
        assert_eq!(first, second);
        assert_eq!(first, "lead\n\ntail");
    }

    #[test]
    fn empty_aggregator_finalizes_to_empty() {
        assert_eq!(Aggregator::new().finalize(), "");

        let mut agg = Aggregator::new();
        agg.append(Window::new(0, 1), chunks(&["", "   "]));
        assert_eq!(agg.finalize(), "");
    }
}
