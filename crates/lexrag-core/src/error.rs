//! Error taxonomy for segmentation and retrieval.
//!
//! Caller misuse ([`Error::IndexNotBuilt`], [`Error::InvalidTopK`]) is kept
//! distinct from infrastructure failure ([`Error::EmbeddingUnavailable`]).
//! None of these are retried by the core.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// The document produced zero chunks after both the structural and
    /// fallback passes (empty or whitespace-only input).
    #[error("document yields no chunks")]
    SegmentationYieldsEmpty,

    /// `search` was called before a successful build, or after a build
    /// that stored zero chunks.
    #[error("index not built: load a document before searching")]
    IndexNotBuilt,

    /// The embedding provider failed. Carries the provider's error.
    #[error("embedding model unavailable: {0:#}")]
    EmbeddingUnavailable(#[source] anyhow::Error),

    #[error("top_k must be >= 1, got {0}")]
    InvalidTopK(usize),

    /// The provider returned a different number of vectors than inputs.
    #[error("embedding provider returned {actual} vectors for {expected} inputs")]
    EmbeddingShape { expected: usize, actual: usize },

    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// The provider returned a vector containing NaN or infinity.
    /// `row` is the chunk index, or `None` for the query vector.
    #[error("embedding contains non-finite values (row {row:?})")]
    NonFiniteEmbedding { row: Option<usize> },
}

pub type Result<T> = std::result::Result<T, Error>;
