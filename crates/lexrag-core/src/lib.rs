//! # lexrag Core
//!
//! Retrieval core for question answering over a legal document:
//! structural segmentation, the chunk model, the embedding-provider
//! trait, and an exact cosine-similarity index.
//!
//! This crate contains no tokio, filesystem I/O, or network access.
//! Embeddings come from an injected [`embedding::EmbeddingProvider`].
//!
//! ## Pipeline
//!
//! ```text
//! raw text ──▶ Segmenter::segment ──▶ Vec<Chunk>
//!                                        │
//!                                        ▼
//!                         SimilarityIndex::build (one embed batch)
//!                                        │
//!          query ──▶ SimilarityIndex::search ──▶ Vec<SearchHit>
//! ```

pub mod embedding;
pub mod error;
pub mod index;
pub mod models;
pub mod segment;

pub use error::{Error, Result};
pub use index::SimilarityIndex;
pub use models::{Chunk, SearchHit};
pub use segment::Segmenter;
