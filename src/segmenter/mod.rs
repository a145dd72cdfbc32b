//! Boundary-aware document segmentation
//!
//! Splits raw document text into ordered chunks with bounded size and
//! controlled overlap. Structural boundaries (headings) are respected when
//! present; sentences are never cut in half; content is never dropped.
//! Segmentation is pure and synchronous, and chunks of one document are
//! always produced in index order because each overlap prefix depends on
//! the previous chunk.

mod sentence;

use crate::config::SegmenterConfig;
use sentence::{split_sections, split_sentences, Span};
use serde::{Deserialize, Serialize};

/// A bounded, ordered segment of a document's text
///
/// `start_offset`/`end_offset` are character offsets into the source
/// document and always describe the chunk's own span. `content` may carry a
/// synthetic overlap prefix copied from the previous chunk; the prefix is
/// included in `size` but never shifts the offsets, so
/// `end_offset - start_offset == size` holds exactly for prefix-free chunks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    /// Dense, monotonic index within the owning document
    pub chunk_index: usize,
    /// Chunk text, including any overlap prefix
    pub content: String,
    /// Start of the chunk's own span, in source character coordinates
    pub start_offset: usize,
    /// End of the chunk's own span, in source character coordinates
    pub end_offset: usize,
    /// Character count of `content`
    pub size: usize,
    /// Title of the structural section this chunk belongs to, if known
    pub section_title: Option<String>,
    /// Vector index id, assigned at indexing time
    pub vector_id: Option<String>,
}

impl Chunk {
    /// Length of the synthetic overlap prefix, in characters
    pub fn overlap_len(&self) -> usize {
        self.size - (self.end_offset - self.start_offset)
    }

    /// Chunk text without the synthetic overlap prefix
    pub fn core_content(&self) -> &str {
        let skip = self.overlap_len();
        match self.content.char_indices().nth(skip) {
            Some((byte_idx, _)) => &self.content[byte_idx..],
            None => "",
        }
    }
}

/// Splits documents into overlapping, sentence-aligned chunks
pub struct Segmenter {
    config: SegmenterConfig,
}

impl Segmenter {
    pub fn new(config: SegmenterConfig) -> Self {
        Self { config }
    }

    /// Segment a document into ordered chunks.
    ///
    /// Deterministic: identical input and configuration always yield
    /// byte-identical chunks. Empty or whitespace-only documents produce
    /// zero chunks.
    pub fn segment(&self, text: &str) -> Vec<Chunk> {
        let chars: Vec<char> = text.chars().collect();
        if chars.iter().all(|c| c.is_whitespace()) {
            return Vec::new();
        }

        let mut chunks: Vec<Chunk> = Vec::new();

        for section in split_sections(&chars) {
            let sentences = split_sentences(&chars, section.span);
            if sentences.is_empty() {
                continue;
            }

            let mut buffer: Option<Span> = None;

            for sent in sentences {
                match buffer {
                    None => buffer = Some(sent),
                    Some(span) => {
                        if span.len() + sent.len() > self.config.max_chunk_size {
                            self.push_chunk(&chars, span, &section.title, &mut chunks);
                            buffer = Some(sent);
                        } else {
                            buffer = Some(Span {
                                start: span.start,
                                end: sent.end,
                            });
                        }
                    }
                }

                // An oversized single sentence closes immediately rather
                // than being truncated
                if let Some(span) = buffer {
                    if span.len() > self.config.max_chunk_size {
                        self.push_chunk(&chars, span, &section.title, &mut chunks);
                        buffer = None;
                    }
                }
            }

            if let Some(span) = buffer {
                self.push_chunk(&chars, span, &section.title, &mut chunks);
            }
        }

        chunks
    }

    fn push_chunk(
        &self,
        chars: &[char],
        span: Span,
        title: &Option<String>,
        chunks: &mut Vec<Chunk>,
    ) {
        let core: String = chars[span.start..span.end].iter().collect();

        let (content, size) = match chunks.last() {
            Some(prev) => {
                let prefix = self.overlap_prefix(&prev.content);
                let prefix_len = prefix.chars().count();
                (format!("{}{}", prefix, core), prefix_len + span.len())
            }
            None => (core, span.len()),
        };

        chunks.push(Chunk {
            chunk_index: chunks.len(),
            content,
            start_offset: span.start,
            end_offset: span.end,
            size,
            section_title: title.clone(),
            vector_id: None,
        });
    }

    /// Suffix of the previous chunk's content used as the overlap window:
    /// `overlap_size` characters, capped at `overlap_ratio` of the previous
    /// chunk's length (rounded up so short chunks still contribute).
    fn overlap_prefix(&self, previous: &str) -> String {
        let prev_len = previous.chars().count();
        let ratio_cap = (self.config.overlap_ratio * prev_len as f32).ceil() as usize;
        let overlap = self.config.overlap_size.min(ratio_cap).min(prev_len);

        if overlap == 0 {
            return String::new();
        }

        previous.chars().skip(prev_len - overlap).collect()
    }
}
