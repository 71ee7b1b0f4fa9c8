//! Recursive character text splitter.
//!
//! Tries the coarsest separator first (paragraphs, then lines, then words,
//! then characters) and merges the pieces back into chunks of at most
//! `chunk_size` characters, carrying up to `chunk_overlap` characters of
//! trailing context into the next chunk.

use std::collections::VecDeque;

const DEFAULT_SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

#[derive(Debug, Clone)]
pub struct TextSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
    separators: Vec<String>,
}

impl TextSplitter {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            chunk_size,
            chunk_overlap: chunk_overlap.min(chunk_size - 1),
            separators: DEFAULT_SEPARATORS.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn split(&self, text: &str) -> Vec<String> {
        self.split_with(text, &self.separators)
    }

    fn split_with(&self, text: &str, separators: &[String]) -> Vec<String> {
        let idx = separators
            .iter()
            .position(|s| s.is_empty() || text.contains(s.as_str()))
            .unwrap_or(separators.len().saturating_sub(1));
        let Some(separator) = separators.get(idx) else {
            return vec![text.to_string()];
        };
        let remaining = &separators[idx + 1..];

        let splits: Vec<&str> = if separator.is_empty() {
            text.char_indices()
                .map(|(i, c)| &text[i..i + c.len_utf8()])
                .collect()
        } else {
            text.split(separator.as_str()).filter(|s| !s.is_empty()).collect()
        };

        let mut chunks = Vec::new();
        let mut pending: Vec<&str> = Vec::new();
        for piece in splits {
            if char_len(piece) < self.chunk_size {
                pending.push(piece);
                continue;
            }
            if !pending.is_empty() {
                chunks.extend(self.merge(&pending, separator));
                pending.clear();
            }
            if remaining.is_empty() {
                chunks.push(piece.to_string());
            } else {
                chunks.extend(self.split_with(piece, remaining));
            }
        }
        if !pending.is_empty() {
            chunks.extend(self.merge(&pending, separator));
        }
        chunks
    }

    fn merge(&self, splits: &[&str], separator: &str) -> Vec<String> {
        let sep_len = char_len(separator);
        let mut docs = Vec::new();
        let mut current: VecDeque<&str> = VecDeque::new();
        let mut total = 0usize;

        for &piece in splits {
            let len = char_len(piece);
            let joiner = if current.is_empty() { 0 } else { sep_len };
            if total + len + joiner > self.chunk_size && !current.is_empty() {
                if let Some(doc) = join(&current, separator) {
                    docs.push(doc);
                }
                loop {
                    let joiner = if current.is_empty() { 0 } else { sep_len };
                    let overflows = total > 0 && total + len + joiner > self.chunk_size;
                    if total <= self.chunk_overlap && !overflows {
                        break;
                    }
                    let Some(first) = current.pop_front() else { break };
                    let dropped_joiner = if current.is_empty() { 0 } else { sep_len };
                    total -= char_len(first) + dropped_joiner;
                }
            }
            let joiner = if current.is_empty() { 0 } else { sep_len };
            total += len + joiner;
            current.push_back(piece);
        }
        if let Some(doc) = join(&current, separator) {
            docs.push(doc);
        }
        docs
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

fn join(parts: &VecDeque<&str>, separator: &str) -> Option<String> {
    let joined = parts.iter().copied().collect::<Vec<_>>().join(separator);
    let trimmed = joined.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
