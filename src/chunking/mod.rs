//! Adaptive document chunking.
//!
//! Splits document content into ordered `Chunk`s (without embeddings — the
//! embedding port fills those in during ingestion) using one of five
//! strategies, selected automatically when `ChunkStrategy::Adaptive` is
//! requested.

pub mod strategies;

use crate::error::ChunkingError;
use crate::types::{Chunk, ChunkMetadata};
use chrono::Utc;
use strategies::SlidingWindowChunker;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkStrategy {
    Adaptive,
    Fixed,
    Sentence,
    Paragraph,
    Semantic,
    Hierarchical,
}

#[derive(Debug, Clone)]
pub struct ChunkOptions {
    pub strategy: ChunkStrategy,
    pub max_chunk_size: usize,
    pub overlap: usize,
}

impl Default for ChunkOptions {
    fn default() -> Self {
        Self { strategy: ChunkStrategy::Adaptive, max_chunk_size: 1000, overlap: 100 }
    }
}

/// Splits `content` into ordered chunks per `options`. Guarantees: chunks
/// preserve source order, every character appears in at least one chunk,
/// no chunk exceeds `max_chunk_size + overlap` bytes, and empty or
/// whitespace-only chunks are dropped.
pub fn chunk_document(
    content: &str,
    document_id: Uuid,
    filename: &str,
    mime_type: &str,
    options: &ChunkOptions,
) -> Result<Vec<Chunk>, ChunkingError> {
    if content.trim().is_empty() {
        return Err(ChunkingError::EmptyContent);
    }

    let strategy = resolve_strategy(options.strategy, content, mime_type);
    let spans = match strategy {
        ChunkStrategy::Adaptive => unreachable!("resolved above"),
        ChunkStrategy::Fixed => {
            SlidingWindowChunker::new(options.max_chunk_size, options.overlap).chunk(content)
        }
        ChunkStrategy::Sentence => sentence_split(content, options.max_chunk_size, options.overlap),
        ChunkStrategy::Paragraph => paragraph_split(content, options.max_chunk_size, options.overlap),
        ChunkStrategy::Semantic => semantic_split(content, options.max_chunk_size, options.overlap),
        ChunkStrategy::Hierarchical => hierarchical_split(content, options.max_chunk_size, options.overlap),
    };

    if spans.is_empty() {
        return Err(ChunkingError::StrategyFailed {
            strategy: format!("{:?}", strategy),
            reason: "no non-empty spans produced".into(),
        });
    }

    let now = Utc::now();
    Ok(spans
        .into_iter()
        .enumerate()
        .map(|(index, span)| Chunk {
            id: Uuid::new_v4(),
            document_id,
            chunk_index: index as u32,
            content: span.text,
            metadata: ChunkMetadata {
                filename: filename.to_string(),
                timestamp: Some(now),
                importance: None,
            },
            embedding: Vec::new(),
        })
        .collect())
}

fn resolve_strategy(requested: ChunkStrategy, content: &str, mime_type: &str) -> ChunkStrategy {
    if requested != ChunkStrategy::Adaptive {
        return requested;
    }
    if content.len() < 500 {
        return ChunkStrategy::Fixed;
    }
    if is_code_mime(mime_type) {
        return ChunkStrategy::Fixed;
    }
    if is_markdown_mime(mime_type) || looks_structured(content) {
        return ChunkStrategy::Semantic;
    }
    if is_conversational_mime(mime_type) {
        return ChunkStrategy::Sentence;
    }
    if content.len() > 8000 {
        return ChunkStrategy::Hierarchical;
    }
    ChunkStrategy::Paragraph
}

fn is_code_mime(mime_type: &str) -> bool {
    mime_type.starts_with("text/x-") || mime_type.contains("code") || mime_type == "application/x-shellscript"
}

fn is_markdown_mime(mime_type: &str) -> bool {
    mime_type == "text/markdown" || mime_type == "text/x-markdown"
}

fn is_conversational_mime(mime_type: &str) -> bool {
    mime_type.contains("chat") || mime_type.contains("conversation")
}

fn looks_structured(content: &str) -> bool {
    content.lines().filter(|l| l.trim_start().starts_with('#')).count() >= 2
}

/// Split on sentence boundaries, packing sentences greedily into windows of
/// at most `max_size` bytes, then re-applying the sliding window to any
/// single sentence that alone exceeds the budget.
fn sentence_split(content: &str, max_size: usize, overlap: usize) -> Vec<strategies::Span> {
    let sentences = split_sentences(content);
    pack_units(content, &sentences, max_size, overlap)
}

/// Split on blank-line paragraph boundaries, same packing discipline as
/// `sentence_split`.
fn paragraph_split(content: &str, max_size: usize, overlap: usize) -> Vec<strategies::Span> {
    let mut paragraphs = Vec::new();
    let mut offset = 0usize;
    for part in content.split("\n\n") {
        let start = offset;
        let end = start + part.len();
        offset = end + 2;
        if !part.trim().is_empty() {
            paragraphs.push((start, end.min(content.len())));
        }
    }
    pack_units(content, &paragraphs, max_size, overlap)
}

/// Split on markdown headers (lines starting with `#`), each header section
/// packed by paragraph if it exceeds the budget.
fn semantic_split(content: &str, max_size: usize, overlap: usize) -> Vec<strategies::Span> {
    let mut sections: Vec<(usize, usize, Option<String>)> = Vec::new();
    let mut section_start = 0usize;
    let mut current_heading: Option<String> = None;
    let mut offset = 0usize;

    for line in content.split_inclusive('\n') {
        let trimmed = line.trim_end_matches('\n');
        if trimmed.trim_start().starts_with('#') && offset > section_start {
            sections.push((section_start, offset, current_heading.take()));
            section_start = offset;
        }
        if trimmed.trim_start().starts_with('#') {
            current_heading = Some(trimmed.trim_start_matches('#').trim().to_string());
        }
        offset += line.len();
    }
    sections.push((section_start, content.len(), current_heading));

    let mut spans = Vec::new();
    for (start, end, heading) in sections {
        if end <= start {
            continue;
        }
        let section_text = &content[start..end];
        if section_text.trim().is_empty() {
            continue;
        }
        if section_text.len() <= max_size {
            spans.push(strategies::Span {
                text: section_text.to_string(),
                heading,
                start_offset: start,
                end_offset: end,
            });
        } else {
            let sub = paragraph_split(section_text, max_size, overlap);
            for mut s in sub {
                s.start_offset += start;
                s.end_offset += start;
                if s.heading.is_none() {
                    s.heading = heading.clone();
                }
                spans.push(s);
            }
        }
    }
    spans
}

/// Header → paragraph → sentence: recursively narrows any section still
/// over budget after a coarser split, falling back to the raw sliding
/// window only at the sentence level.
fn hierarchical_split(content: &str, max_size: usize, overlap: usize) -> Vec<strategies::Span> {
    let by_header = semantic_split(content, max_size, overlap);
    let mut spans = Vec::new();
    for span in by_header {
        if span.text.len() <= max_size {
            spans.push(span);
            continue;
        }
        let by_paragraph = paragraph_split(&span.text, max_size, overlap);
        for mut p in by_paragraph {
            if p.text.len() <= max_size {
                p.heading = p.heading.or_else(|| span.heading.clone());
                spans.push(p);
            } else {
                let by_sentence = sentence_split(&p.text, max_size, overlap);
                spans.extend(by_sentence);
            }
        }
    }
    spans
}

fn split_sentences(content: &str) -> Vec<(usize, usize)> {
    let mut units = Vec::new();
    let mut start = 0usize;
    let bytes = content.as_bytes();
    let mut i = 0usize;
    while i < bytes.len() {
        let b = bytes[i];
        if (b == b'.' || b == b'!' || b == b'?') && i + 1 <= content.len() {
            let next = strategies::snap_to_char_boundary(content, i + 1);
            if next >= content.len() || bytes.get(next) == Some(&b' ') || bytes.get(next) == Some(&b'\n') {
                units.push((start, next));
                start = next;
            }
        }
        i += 1;
    }
    if start < content.len() {
        units.push((start, content.len()));
    }
    units
}

fn pack_units(content: &str, units: &[(usize, usize)], max_size: usize, overlap: usize) -> Vec<strategies::Span> {
    let mut spans = Vec::new();
    let mut i = 0usize;
    while i < units.len() {
        let (window_start, _) = units[i];
        let mut window_end = units[i].1;
        let mut j = i + 1;
        while j < units.len() && units[j].1 - window_start <= max_size {
            window_end = units[j].1;
            j += 1;
        }

        if window_end - window_start > max_size {
            let sub = SlidingWindowChunker::new(max_size, overlap).chunk(&content[window_start..window_end]);
            for mut s in sub {
                s.start_offset += window_start;
                s.end_offset += window_start;
                spans.push(s);
            }
        } else {
            let text = &content[window_start..window_end];
            if !text.trim().is_empty() {
                spans.push(strategies::Span {
                    text: text.to_string(),
                    heading: None,
                    start_offset: window_start,
                    end_offset: window_end,
                });
            }
        }

        if j <= i {
            j = i + 1;
        }
        // Back off by roughly one unit's worth of overlap, unless we're at the end.
        i = if overlap > 0 && j < units.len() && j > i + 1 { j - 1 } else { j };
    }
    spans
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_content_produces_one_chunk() {
        let doc_id = Uuid::new_v4();
        let opts = ChunkOptions::default();
        let chunks = chunk_document("a short note", doc_id, "note.txt", "text/plain", &opts).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].chunk_index, 0);
    }

    #[test]
    fn empty_content_is_an_error() {
        let doc_id = Uuid::new_v4();
        let opts = ChunkOptions::default();
        let err = chunk_document("   \n  ", doc_id, "empty.txt", "text/plain", &opts).unwrap_err();
        assert!(matches!(err, ChunkingError::EmptyContent));
    }

    #[test]
    fn chunk_indices_are_contiguous_and_ordered() {
        let doc_id = Uuid::new_v4();
        let text = "This is a sentence. ".repeat(200);
        let opts = ChunkOptions { strategy: ChunkStrategy::Fixed, max_chunk_size: 300, overlap: 30 };
        let chunks = chunk_document(&text, doc_id, "big.txt", "text/plain", &opts).unwrap();
        for (i, c) in chunks.iter().enumerate() {
            assert_eq!(c.chunk_index, i as u32);
            assert!(c.content.len() <= 300 + 30);
        }
    }

    #[test]
    fn markdown_picks_semantic_strategy() {
        let doc_id = Uuid::new_v4();
        let text = format!("# Title\n\n{}\n\n## Section\n\n{}", "intro text. ".repeat(80), "body text. ".repeat(80));
        let opts = ChunkOptions::default();
        let chunks = chunk_document(&text, doc_id, "doc.md", "text/markdown", &opts).unwrap();
        assert!(chunks.len() >= 2);
    }
}
