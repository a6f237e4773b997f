//! Core data models shared by the segmenter and the similarity index.
//!
//! A [`Chunk`] is produced by [`crate::segment`] and owned by a
//! [`SimilarityIndex`](crate::index::SimilarityIndex) after build. Search
//! results are returned as [`SearchHit`]s.

use std::ops::Range;

use serde::{Deserialize, Serialize};

/// Display form of an absent `chapter` or `article`.
pub const NOT_APPLICABLE: &str = "N/A";

/// A contiguous, citable unit of document text with structural metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Position in the chunk sequence, starting at 0.
    pub index: usize,
    /// Chunk body, trimmed of leading/trailing whitespace. Never empty.
    pub text: String,
    /// Enclosing chapter marker (e.g. `"CHAPTER II Principles"`).
    /// `None` when the document has no chapter structure.
    pub chapter: Option<String>,
    /// Article marker (e.g. `"Article 5"`), or `"Section N"` for
    /// paragraph-split documents. `None` for an un-articled chapter.
    pub article: Option<String>,
    /// Citation string derived from `chapter`/`article`. Display only.
    pub label: String,
    /// Untrimmed byte range in the source text this chunk was cut from.
    pub span: Range<usize>,
}

impl Chunk {
    /// Build a chunk from its source span, trimming the body and deriving
    /// the label.
    pub fn new(
        index: usize,
        source: &str,
        span: Range<usize>,
        chapter: Option<String>,
        article: Option<String>,
    ) -> Self {
        let label = citation_label(chapter.as_deref(), article.as_deref());
        Self {
            index,
            text: source[span.clone()].trim().to_string(),
            chapter,
            article,
            label,
            span,
        }
    }

    /// Chapter for display, `N/A` when absent.
    pub fn chapter_display(&self) -> &str {
        self.chapter.as_deref().unwrap_or(NOT_APPLICABLE)
    }

    /// Article for display, `N/A` when absent.
    pub fn article_display(&self) -> &str {
        self.article.as_deref().unwrap_or(NOT_APPLICABLE)
    }
}

/// Derive the citation label: `"<chapter> - <article>"`, or whichever of
/// the two is present.
pub fn citation_label(chapter: Option<&str>, article: Option<&str>) -> String {
    match (chapter, article) {
        (Some(c), Some(a)) => format!("{} - {}", c, a),
        (Some(c), None) => c.to_string(),
        (None, Some(a)) => a.to_string(),
        (None, None) => NOT_APPLICABLE.to_string(),
    }
}

/// One ranked result of [`SimilarityIndex::search`](crate::index::SimilarityIndex::search).
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    /// 1-based rank.
    pub rank: usize,
    pub chunk: Chunk,
    /// Raw cosine similarity in `[-1.0, 1.0]`.
    pub similarity: f32,
    /// Similarity as a percentage in `[0.0, 100.0]`; negatives floor at 0.
    pub score: f32,
}

/// Rescale a cosine similarity to the 0–100 percentage reported to callers.
pub fn similarity_to_score(similarity: f32) -> f32 {
    (similarity * 100.0).clamp(0.0, 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_chapter_and_article() {
        assert_eq!(
            citation_label(Some("CHAPTER I"), Some("Article 1")),
            "CHAPTER I - Article 1"
        );
    }

    #[test]
    fn test_label_chapter_only() {
        assert_eq!(citation_label(Some("CHAPTER XI"), None), "CHAPTER XI");
    }

    #[test]
    fn test_label_section_only() {
        assert_eq!(citation_label(None, Some("Section 3")), "Section 3");
    }

    #[test]
    fn test_chunk_new_trims_text() {
        let src = "  \nArticle 1 \nBody text.\n\n";
        let chunk = Chunk::new(0, src, 0..src.len(), Some("CHAPTER I".into()), None);
        assert_eq!(chunk.text, "Article 1 \nBody text.");
        assert_eq!(chunk.label, "CHAPTER I");
        assert_eq!(chunk.article_display(), "N/A");
    }

    #[test]
    fn test_chunk_json_shape() {
        let src = "Article 1\nScope.";
        let chunk = Chunk::new(
            0,
            src,
            0..src.len(),
            Some("CHAPTER I".into()),
            Some("Article 1".into()),
        );
        let json = serde_json::to_value(&chunk).unwrap();
        assert_eq!(json["label"], "CHAPTER I - Article 1");
        assert_eq!(json["span"]["end"], src.len());
        let back: Chunk = serde_json::from_value(json).unwrap();
        assert_eq!(back, chunk);
    }

    #[test]
    fn test_score_clamped() {
        assert_eq!(similarity_to_score(-0.4), 0.0);
        assert_eq!(similarity_to_score(1.0000002), 100.0);
        assert!((similarity_to_score(0.42) - 42.0).abs() < 1e-4);
    }
}
