//! Section and sentence boundary detection
//!
//! All spans are expressed in character offsets into the source document so
//! multi-byte text never gets split inside a code point.

use regex::Regex;
use std::sync::OnceLock;

/// Sentence terminators for both supported script families
const TERMINATORS: [char; 6] = ['.', '!', '?', '。', '！', '？'];

/// A contiguous span of the source document, in character offsets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn len(&self) -> usize {
        self.end - self.start
    }
}

/// A structural section of the document
#[derive(Debug, Clone)]
pub(crate) struct Section {
    pub title: Option<String>,
    pub span: Span,
}

fn heading_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(#{1,6})\s+(\S.*)$").expect("static heading regex"))
}

/// Split a document into sections on markdown-style heading lines.
///
/// A document without headings is a single untitled section. Heading lines
/// stay inside the section body so that no source text is lost.
pub(crate) fn split_sections(chars: &[char]) -> Vec<Section> {
    let mut sections = Vec::new();
    let mut current_title: Option<String> = None;
    let mut current_start = 0usize;
    let mut line_start = 0usize;

    let flush = |title: Option<String>, start: usize, end: usize, out: &mut Vec<Section>| {
        if end > start {
            out.push(Section {
                title,
                span: Span { start, end },
            });
        }
    };

    for pos in 0..=chars.len() {
        let at_end = pos == chars.len();
        if !at_end && chars[pos] != '\n' {
            continue;
        }

        let line: String = chars[line_start..pos].iter().collect();
        if let Some(caps) = heading_regex().captures(&line) {
            // Close the running section before the heading line
            flush(
                current_title.take(),
                current_start,
                line_start,
                &mut sections,
            );
            current_title = Some(caps[2].trim().to_string());
            current_start = line_start;
        }

        line_start = pos + 1;
    }

    flush(current_title, current_start, chars.len(), &mut sections);

    sections
}

/// Split a section into contiguous sentence spans.
///
/// A sentence runs from the end of the previous sentence through its
/// terminator, so concatenating all spans reconstructs the section exactly.
/// Trailing text without a terminator forms a final sentence of its own;
/// whitespace-only spans are dropped.
pub(crate) fn split_sentences(chars: &[char], section: Span) -> Vec<Span> {
    let mut sentences = Vec::new();
    let mut start = section.start;

    for pos in section.start..section.end {
        if TERMINATORS.contains(&chars[pos]) {
            let span = Span {
                start,
                end: pos + 1,
            };
            if !is_blank(chars, span) {
                sentences.push(span);
            }
            start = pos + 1;
        }
    }

    if start < section.end {
        let tail = Span {
            start,
            end: section.end,
        };
        if !is_blank(chars, tail) {
            sentences.push(tail);
        }
    }

    sentences
}

fn is_blank(chars: &[char], span: Span) -> bool {
    chars[span.start..span.end].iter().all(|c| c.is_whitespace())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chars_of(text: &str) -> Vec<char> {
        text.chars().collect()
    }

    fn text_of(chars: &[char], span: Span) -> String {
        chars[span.start..span.end].iter().collect()
    }

    #[test]
    fn test_single_section_without_headings() {
        let chars = chars_of("Just some prose. Nothing structural.");
        let sections = split_sections(&chars);

        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].title, None);
        assert_eq!(sections[0].span.start, 0);
        assert_eq!(sections[0].span.end, chars.len());
    }

    #[test]
    fn test_heading_starts_new_section() {
        let text = "Intro text.\n# First\nBody one.\n## Second\nBody two.";
        let chars = chars_of(text);
        let sections = split_sections(&chars);

        assert_eq!(sections.len(), 3);
        assert_eq!(sections[0].title, None);
        assert_eq!(sections[1].title.as_deref(), Some("First"));
        assert_eq!(sections[2].title.as_deref(), Some("Second"));

        // Sections tile the document
        let reconstructed: String = sections
            .iter()
            .map(|s| text_of(&chars, s.span))
            .collect();
        assert_eq!(reconstructed, text);
    }

    #[test]
    fn test_empty_document_has_no_sections() {
        assert!(split_sections(&[]).is_empty());
    }

    #[test]
    fn test_sentence_split_both_script_families() {
        let chars = chars_of("First. Second! Third? 你好。再见！");
        let all = Span {
            start: 0,
            end: chars.len(),
        };
        let sentences = split_sentences(&chars, all);

        assert_eq!(sentences.len(), 5);
        assert_eq!(text_of(&chars, sentences[0]), "First.");
        assert_eq!(text_of(&chars, sentences[1]), " Second!");
        assert_eq!(text_of(&chars, sentences[3]), " 你好。");
        assert_eq!(text_of(&chars, sentences[4]), "再见！");
    }

    #[test]
    fn test_trailing_text_without_terminator() {
        let chars = chars_of("Complete sentence. trailing fragment");
        let all = Span {
            start: 0,
            end: chars.len(),
        };
        let sentences = split_sentences(&chars, all);

        assert_eq!(sentences.len(), 2);
        assert_eq!(text_of(&chars, sentences[1]), " trailing fragment");
    }

    #[test]
    fn test_sentences_tile_their_section() {
        let text = "A. B? C! Leftover";
        let chars = chars_of(text);
        let all = Span {
            start: 0,
            end: chars.len(),
        };
        let sentences = split_sentences(&chars, all);

        let reconstructed: String = sentences.iter().map(|s| text_of(&chars, *s)).collect();
        assert_eq!(reconstructed, text);
    }
}
