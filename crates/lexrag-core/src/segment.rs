//! Structural segmenter for legal documents.
//!
//! Splits raw document text into [`Chunk`]s using a two-level grammar
//! (chapter → article) when chapter markers are present, and a
//! blank-line paragraph split otherwise.
//!
//! # Algorithm
//!
//! 1. Classify every line as a chapter marker, an article marker, blank,
//!    or body text.
//! 2. If at least one chapter marker exists, cut the text at every marker
//!    line:
//!    - each chapter starts a new chunk;
//!    - each article inside a chapter starts a new chunk, except the
//!      chapter's first article, which takes over the chunk opened by the
//!      chapter heading;
//!    - article markers before the first chapter are body text.
//!
//!    The first cut is at offset 0, so chunk spans partition the document.
//! 3. Otherwise split on runs of blank lines and number the non-empty
//!    paragraphs `Section 1`, `Section 2`, ….
//!
//! A document with article markers but no chapter marker takes the
//! paragraph path: article structure is only recognized inside chapters.
//!
//! Text before the first chapter marker is never dropped. It is folded into
//! the first chunk and carries that chunk's label, so a regulation's title
//! and recitals (`Whereas ...`) are cited as e.g. `CHAPTER I - Article 1`.
//! Callers that want recitals excluded from results should strip them
//! before segmenting.
//!
//! # Markers
//!
//! | Marker | Shape | Case |
//! |--------|-------|------|
//! | Chapter | `CHAPTER <roman or arabic numeral>[ title]` | sensitive |
//! | Article | `Article <digits>` alone on its line | insensitive |
//!
//! Both must begin a line (leading whitespace is allowed). An article
//! marker must also end its line, so prose such as
//! `Article 6 shall apply ...` wrapping onto a new line is not a marker.
//!
//! # Example
//!
//! ```rust
//! use lexrag_core::segment::Segmenter;
//!
//! let text = "CHAPTER I\nIntroduction\nArticle 1 \nDefinitions...\nArticle 2 \nScope...";
//! let chunks = Segmenter::default().segment(text).unwrap();
//! assert_eq!(chunks.len(), 2);
//! assert_eq!(chunks[0].label, "CHAPTER I - Article 1");
//! assert_eq!(chunks[1].label, "CHAPTER I - Article 2");
//! ```

use std::ops::Range;

use tracing::debug;

use crate::error::{Error, Result};
use crate::models::Chunk;

pub const DEFAULT_CHAPTER_KEYWORD: &str = "CHAPTER";
pub const DEFAULT_ARTICLE_KEYWORD: &str = "Article";

const ROMAN_DIGITS: &str = "IVXLCDM";

/// Converts document text into an ordered sequence of chunks.
///
/// Segmentation is a pure function of the input text and the configured
/// keywords.
#[derive(Debug, Clone)]
pub struct Segmenter {
    chapter_keyword: String,
    article_keyword: String,
}

impl Default for Segmenter {
    fn default() -> Self {
        Self::new(DEFAULT_CHAPTER_KEYWORD, DEFAULT_ARTICLE_KEYWORD)
    }
}

/// A source line with its byte range (including the line terminator).
struct Line<'a> {
    start: usize,
    end: usize,
    content: &'a str,
}

#[derive(Debug, PartialEq, Eq)]
enum LineKind {
    Chapter(String),
    Article(String),
    Blank,
    Body,
}

/// A chunk boundary found by the structural pass.
struct Cut {
    start: usize,
    chapter: String,
    article: Option<String>,
}

impl Segmenter {
    pub fn new(chapter_keyword: impl Into<String>, article_keyword: impl Into<String>) -> Self {
        Self {
            chapter_keyword: chapter_keyword.into(),
            article_keyword: article_keyword.into(),
        }
    }

    /// Segment `text` into chunks.
    ///
    /// # Errors
    ///
    /// [`Error::SegmentationYieldsEmpty`] if no chunk survives trimming,
    /// i.e. the text is empty or whitespace-only.
    pub fn segment(&self, text: &str) -> Result<Vec<Chunk>> {
        let lines: Vec<(Line<'_>, LineKind)> = split_lines(text)
            .map(|line| {
                let kind = self.classify(line.content);
                (line, kind)
            })
            .collect();

        let has_chapters = lines
            .iter()
            .any(|(_, kind)| matches!(kind, LineKind::Chapter(_)));

        let chunks = if has_chapters {
            structural_pass(text, &lines)
        } else {
            paragraph_pass(text, &lines)
        };

        if chunks.is_empty() {
            return Err(Error::SegmentationYieldsEmpty);
        }

        debug!(
            chunks = chunks.len(),
            structural = has_chapters,
            "segmented document"
        );
        Ok(chunks)
    }

    fn classify(&self, line: &str) -> LineKind {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            LineKind::Blank
        } else if self.is_chapter_marker(trimmed) {
            LineKind::Chapter(trimmed.to_string())
        } else if self.is_article_marker(trimmed) {
            LineKind::Article(trimmed.to_string())
        } else {
            LineKind::Body
        }
    }

    /// `CHAPTER`, whitespace, a numeral token, then an optional title.
    fn is_chapter_marker(&self, line: &str) -> bool {
        let Some(rest) = line.strip_prefix(self.chapter_keyword.as_str()) else {
            return false;
        };
        let after = rest.trim_start();
        if after.len() == rest.len() {
            return false;
        }
        let ident_end = after
            .find(|c: char| c.is_whitespace() || matches!(c, '-' | ':' | '.'))
            .unwrap_or(after.len());
        is_numeral(&after[..ident_end])
    }

    /// `Article`, whitespace, digits, and nothing else.
    fn is_article_marker(&self, line: &str) -> bool {
        let keyword_len = self.article_keyword.len();
        let Some(head) = line.get(..keyword_len) else {
            return false;
        };
        if !head.eq_ignore_ascii_case(&self.article_keyword) {
            return false;
        }
        let rest = &line[keyword_len..];
        let number = rest.trim_start();
        number.len() < rest.len()
            && !number.is_empty()
            && number.chars().all(|c| c.is_ascii_digit())
    }
}

fn is_numeral(ident: &str) -> bool {
    !ident.is_empty()
        && (ident.chars().all(|c| c.is_ascii_digit())
            || ident.chars().all(|c| ROMAN_DIGITS.contains(c)))
}

fn split_lines(text: &str) -> impl Iterator<Item = Line<'_>> {
    let mut offset = 0;
    text.split_inclusive('\n').map(move |raw| {
        let start = offset;
        offset += raw.len();
        Line {
            start,
            end: offset,
            content: raw.trim_end_matches(|c| c == '\n' || c == '\r'),
        }
    })
}

fn structural_pass(text: &str, lines: &[(Line<'_>, LineKind)]) -> Vec<Chunk> {
    let mut cuts: Vec<Cut> = Vec::new();
    let mut chapter_has_article = false;

    for (line, kind) in lines {
        match kind {
            LineKind::Chapter(label) => {
                cuts.push(Cut {
                    start: if cuts.is_empty() { 0 } else { line.start },
                    chapter: label.clone(),
                    article: None,
                });
                chapter_has_article = false;
            }
            LineKind::Article(label) => {
                let Some(open) = cuts.last_mut() else {
                    continue;
                };
                if chapter_has_article {
                    let chapter = open.chapter.clone();
                    cuts.push(Cut {
                        start: line.start,
                        chapter,
                        article: Some(label.clone()),
                    });
                } else {
                    open.article = Some(label.clone());
                    chapter_has_article = true;
                }
            }
            LineKind::Blank | LineKind::Body => {}
        }
    }

    let ends: Vec<usize> = cuts
        .iter()
        .skip(1)
        .map(|c| c.start)
        .chain(std::iter::once(text.len()))
        .collect();

    cuts.into_iter()
        .zip(ends)
        .enumerate()
        .map(|(index, (cut, end))| {
            Chunk::new(index, text, cut.start..end, Some(cut.chapter), cut.article)
        })
        .collect()
}

fn paragraph_pass(text: &str, lines: &[(Line<'_>, LineKind)]) -> Vec<Chunk> {
    let mut paragraphs: Vec<Range<usize>> = Vec::new();
    let mut open: Option<Range<usize>> = None;

    for (line, kind) in lines {
        if *kind == LineKind::Blank {
            if let Some(span) = open.take() {
                paragraphs.push(span);
            }
        } else {
            match open.as_mut() {
                Some(span) => span.end = line.end,
                None => open = Some(line.start..line.end),
            }
        }
    }
    paragraphs.extend(open);

    paragraphs
        .into_iter()
        .enumerate()
        .map(|(index, span)| {
            let section = format!("Section {}", index + 1);
            Chunk::new(index, text, span, None, Some(section))
        })
        .collect()
}
