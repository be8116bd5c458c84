//! Sliding-window text splitting shared by every chunk strategy.
//!
//! Grounded in the teacher's `TextChunker`: break-point search prefers a
//! paragraph break, then a sentence end, then a line break, then a word
//! boundary, and every byte offset is snapped to a UTF-8 char boundary
//! before slicing.

/// One raw text span produced by the sliding window, before it is wrapped
/// into a `Chunk` with document metadata.
#[derive(Debug, Clone)]
pub struct Span {
    pub text: String,
    pub heading: Option<String>,
    pub start_offset: usize,
    pub end_offset: usize,
}

pub struct SlidingWindowChunker {
    pub window_size: usize,
    pub overlap: usize,
}

impl SlidingWindowChunker {
    pub fn new(window_size: usize, overlap: usize) -> Self {
        Self { window_size, overlap }
    }

    /// Slide a fixed-size window over `text`, seeking a natural break point
    /// near the end of each window. Guarantees: every character appears in
    /// at least one span; no span exceeds `window_size + overlap` bytes.
    pub fn chunk(&self, text: &str) -> Vec<Span> {
        if text.is_empty() {
            return Vec::new();
        }
        if text.len() <= self.window_size {
            return vec![Span {
                heading: extract_heading(text),
                text: text.to_string(),
                start_offset: 0,
                end_offset: text.len(),
            }];
        }

        let mut spans = Vec::new();
        let mut start = 0;

        while start < text.len() {
            let raw_end = (start + self.window_size).min(text.len());
            let end = snap_to_char_boundary(text, raw_end);

            let actual_end = if end < text.len() {
                find_break_point(text, start, end)
            } else {
                end
            };

            let chunk_text = &text[start..actual_end];
            if !chunk_text.trim().is_empty() {
                spans.push(Span {
                    heading: extract_heading(chunk_text),
                    text: chunk_text.to_string(),
                    start_offset: start,
                    end_offset: actual_end,
                });
            }

            let step = if actual_end > start + self.overlap {
                actual_end - start - self.overlap
            } else {
                actual_end - start
            };
            let raw_next = start + step.max(1);
            let next = snap_to_char_boundary(text, raw_next);
            if next <= start || next >= text.len() {
                break;
            }
            start = next;
        }

        spans
    }
}

/// Search backwards from `preferred_end` (within the trailing 200 bytes of
/// the window) for the best available break point, in priority order:
/// paragraph break > sentence end > line break > word break.
pub fn find_break_point(text: &str, start: usize, preferred_end: usize) -> usize {
    let raw_search_start = preferred_end.saturating_sub(200).max(start);
    let search_start = snap_to_char_boundary(text, raw_search_start);
    let safe_end = snap_to_char_boundary(text, preferred_end);

    if search_start >= safe_end {
        return safe_end;
    }

    let search_region = &text[search_start..safe_end];

    if let Some(pos) = search_region.rfind("\n\n") {
        return search_start + pos + 2;
    }
    if let Some(pos) = search_region.rfind(". ") {
        return search_start + pos + 2;
    }
    if let Some(pos) = search_region.rfind(".\n") {
        return search_start + pos + 2;
    }
    if let Some(pos) = search_region.rfind('\n') {
        return search_start + pos + 1;
    }
    if let Some(pos) = search_region.rfind(' ') {
        return search_start + pos + 1;
    }

    safe_end
}

/// Snap a byte offset to the nearest valid UTF-8 char boundary at or before
/// `pos`. If `pos` is beyond the text, returns `text.len()`.
pub fn snap_to_char_boundary(text: &str, pos: usize) -> usize {
    if pos >= text.len() {
        return text.len();
    }
    let mut p = pos;
    while p > 0 && !text.is_char_boundary(p) {
        p -= 1;
    }
    p
}

fn extract_heading(text: &str) -> Option<String> {
    let first_line = text.lines().next()?;
    if first_line.starts_with('#') {
        Some(first_line.trim_start_matches('#').trim().to_string())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_single_span() {
        let c = SlidingWindowChunker::new(1000, 100);
        let spans = c.chunk("hello world");
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].text, "hello world");
    }

    #[test]
    fn no_span_exceeds_window_plus_overlap() {
        let text = "word ".repeat(500);
        let c = SlidingWindowChunker::new(200, 50);
        for span in c.chunk(&text) {
            assert!(span.text.len() <= 200 + 50);
        }
    }

    #[test]
    fn snap_handles_multibyte_boundary() {
        let text = "héllo wörld";
        let pos = snap_to_char_boundary(text, 3);
        assert!(text.is_char_boundary(pos));
    }
}
