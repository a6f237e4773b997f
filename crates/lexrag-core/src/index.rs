//! In-memory similarity index over one document's chunks.
//!
//! The index owns the chunk sequence and a parallel row-major matrix of
//! L2-normalized embeddings. Search is exact (brute-force) inner product,
//! which equals cosine similarity on unit vectors.
//!
//! # Lifecycle
//!
//! 1. [`SimilarityIndex::new`] creates an empty, unbuilt index.
//! 2. [`build`](SimilarityIndex::build) embeds every chunk in one batched
//!    provider call and replaces any prior state (last build wins).
//! 3. [`search`](SimilarityIndex::search) may be called any number of
//!    times, concurrently, once built.
//!
//! `build` takes `&mut self` and `search` takes `&self`, so a build can
//! never overlap another build or a search on the same instance. Callers
//! sharing an index across tasks wrap it in a `RwLock`.
//!
//! # Ranking
//!
//! Candidates are ordered by descending similarity, ties broken by
//! ascending chunk index. Scores are `similarity × 100` clamped to
//! `[0, 100]`.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::embedding::{dot, normalize, EmbeddingProvider};
use crate::error::{Error, Result};
use crate::models::{similarity_to_score, Chunk, SearchHit};
use crate::segment::Segmenter;

/// Built state: chunks plus their normalized embeddings.
struct IndexState {
    chunks: Vec<Chunk>,
    /// `chunks.len() × dims` unit vectors, row-major.
    matrix: Vec<f32>,
    dims: usize,
}

impl IndexState {
    fn row(&self, i: usize) -> &[f32] {
        &self.matrix[i * self.dims..(i + 1) * self.dims]
    }
}

/// Exact cosine-similarity index for a single document.
pub struct SimilarityIndex {
    provider: Arc<dyn EmbeddingProvider>,
    state: Option<IndexState>,
}

impl SimilarityIndex {
    pub fn new(provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            provider,
            state: None,
        }
    }

    /// True once a build with at least one chunk has succeeded.
    pub fn is_built(&self) -> bool {
        self.state.is_some()
    }

    /// Number of indexed chunks (0 when unbuilt).
    pub fn len(&self) -> usize {
        self.state.as_ref().map_or(0, |s| s.chunks.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Embedding dimension of the built index.
    pub fn dims(&self) -> Option<usize> {
        self.state.as_ref().map(|s| s.dims)
    }

    pub fn model_name(&self) -> &str {
        self.provider.model_name()
    }

    /// Indexed chunks in document order (empty when unbuilt).
    pub fn chunks(&self) -> &[Chunk] {
        match &self.state {
            Some(state) => &state.chunks,
            None => &[],
        }
    }

    /// Stored (normalized) embedding of chunk `i`.
    pub fn embedding(&self, i: usize) -> Option<&[f32]> {
        let state = self.state.as_ref()?;
        (i < state.chunks.len()).then(|| state.row(i))
    }

    /// Embed and index `chunks`, replacing any previous build.
    ///
    /// Prior state is dropped before embedding, so an empty input or a
    /// failed build leaves the index unbuilt.
    ///
    /// # Errors
    ///
    /// - [`Error::EmbeddingUnavailable`] if the provider fails.
    /// - [`Error::EmbeddingShape`] / [`Error::DimensionMismatch`] if the
    ///   provider returns the wrong number or size of vectors.
    /// - [`Error::NonFiniteEmbedding`] if any vector holds NaN or infinity.
    pub async fn build(&mut self, chunks: Vec<Chunk>) -> Result<()> {
        self.state = None;

        if chunks.is_empty() {
            warn!("build received no chunks; index left unbuilt");
            return Ok(());
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        info!(
            chunks = texts.len(),
            model = self.provider.model_name(),
            "generating embeddings"
        );

        let vectors = self
            .provider
            .embed(&texts)
            .await
            .map_err(Error::EmbeddingUnavailable)?;

        if vectors.len() != chunks.len() {
            return Err(Error::EmbeddingShape {
                expected: chunks.len(),
                actual: vectors.len(),
            });
        }

        let dims = vectors[0].len();
        let expected_dims = self.provider.dims();
        if dims == 0 || (expected_dims != 0 && dims != expected_dims) {
            return Err(Error::DimensionMismatch {
                expected: expected_dims,
                actual: dims,
            });
        }

        let mut matrix = Vec::with_capacity(dims * vectors.len());
        let mut degenerate = 0usize;
        for (row, mut v) in vectors.into_iter().enumerate() {
            if v.len() != dims {
                return Err(Error::DimensionMismatch {
                    expected: dims,
                    actual: v.len(),
                });
            }
            if v.iter().any(|x| !x.is_finite()) {
                return Err(Error::NonFiniteEmbedding { row: Some(row) });
            }
            if !normalize(&mut v) {
                degenerate += 1;
            }
            matrix.extend_from_slice(&v);
        }
        if degenerate > 0 {
            warn!(degenerate, "zero-norm embeddings left unnormalized");
        }

        info!(chunks = chunks.len(), dims, "index built");
        self.state = Some(IndexState {
            chunks,
            matrix,
            dims,
        });
        Ok(())
    }

    /// Segment `text` and build the index from the resulting chunks.
    ///
    /// Returns the number of indexed chunks.
    pub async fn build_from_text(&mut self, segmenter: &Segmenter, text: &str) -> Result<usize> {
        self.state = None;
        let chunks = segmenter.segment(text)?;
        let count = chunks.len();
        self.build(chunks).await?;
        Ok(count)
    }

    /// Return the `top_k` chunks most similar to `query`, best first.
    ///
    /// `top_k` larger than the number of indexed chunks is clamped.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidTopK`] if `top_k` is 0. Checked before anything
    ///   else, so no embedding call is made.
    /// - [`Error::IndexNotBuilt`] if no successful, non-empty build exists.
    /// - [`Error::EmbeddingUnavailable`] if the provider fails.
    pub async fn search(&self, query: &str, top_k: usize) -> Result<Vec<SearchHit>> {
        if top_k < 1 {
            return Err(Error::InvalidTopK(top_k));
        }
        let state = self.state.as_ref().ok_or(Error::IndexNotBuilt)?;

        let vectors = self
            .provider
            .embed(&[query.to_string()])
            .await
            .map_err(Error::EmbeddingUnavailable)?;
        if vectors.len() != 1 {
            return Err(Error::EmbeddingShape {
                expected: 1,
                actual: vectors.len(),
            });
        }
        let mut query_vec = vectors.into_iter().next().unwrap_or_default();
        if query_vec.len() != state.dims {
            return Err(Error::DimensionMismatch {
                expected: state.dims,
                actual: query_vec.len(),
            });
        }
        if query_vec.iter().any(|x| !x.is_finite()) {
            return Err(Error::NonFiniteEmbedding { row: None });
        }
        if !normalize(&mut query_vec) {
            debug!("query embedding has zero norm");
        }

        let mut scored: Vec<(usize, f32)> = state
            .matrix
            .chunks_exact(state.dims)
            .map(|row| dot(row, &query_vec).clamp(-1.0, 1.0))
            .enumerate()
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        scored.truncate(top_k.min(state.chunks.len()));

        debug!(top_k, returned = scored.len(), "search complete");

        Ok(scored
            .into_iter()
            .enumerate()
            .map(|(rank, (i, similarity))| SearchHit {
                rank: rank + 1,
                chunk: state.chunks[i].clone(),
                similarity,
                score: similarity_to_score(similarity),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Looks texts up in a fixed table; counts calls.
    struct TableProvider {
        table: HashMap<String, Vec<f32>>,
        dims: usize,
        calls: AtomicUsize,
    }

    impl TableProvider {
        fn new(entries: &[(&str, Vec<f32>)]) -> Self {
            let dims = entries.first().map_or(0, |(_, v)| v.len());
            Self {
                table: entries
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.clone()))
                    .collect(),
                dims,
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl EmbeddingProvider for TableProvider {
        fn model_name(&self) -> &str {
            "table"
        }
        fn dims(&self) -> usize {
            self.dims
        }
        async fn embed(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            texts
                .iter()
                .map(|t| {
                    self.table
                        .get(t)
                        .cloned()
                        .ok_or_else(|| anyhow!("no vector for {:?}", t))
                })
                .collect()
        }
    }

    /// Deterministic pseudo-random vectors with negative components.
    struct NoiseProvider {
        dims: usize,
    }

    #[async_trait]
    impl EmbeddingProvider for NoiseProvider {
        fn model_name(&self) -> &str {
            "noise"
        }
        fn dims(&self) -> usize {
            self.dims
        }
        async fn embed(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|t| noise_vector(t, self.dims)).collect())
        }
    }

    fn noise_vector(text: &str, dims: usize) -> Vec<f32> {
        let mut state = text
            .bytes()
            .fold(0xcbf2_9ce4_8422_2325u64, |h, b| {
                (h ^ b as u64).wrapping_mul(0x0100_0000_01b3)
            })
            | 1;
        (0..dims)
            .map(|_| {
                state ^= state << 13;
                state ^= state >> 7;
                state ^= state << 17;
                (state % 2001) as f32 / 1000.0 - 1.0
            })
            .collect()
    }

    struct FailingProvider;

    #[async_trait]
    impl EmbeddingProvider for FailingProvider {
        fn model_name(&self) -> &str {
            "failing"
        }
        fn dims(&self) -> usize {
            4
        }
        async fn embed(&self, _texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
            Err(anyhow!("model failed to load"))
        }
    }

    fn chunk(index: usize, text: &str) -> Chunk {
        Chunk::new(
            index,
            text,
            0..text.len(),
            None,
            Some(format!("Section {}", index + 1)),
        )
    }

    fn legal_chunks() -> Vec<Chunk> {
        [
            "Personal data shall be processed lawfully and fairly.",
            "The controller shall notify a personal data breach.",
            "Member States shall provide for penalties.",
            "This Regulation shall enter into force.",
            "The data subject shall have the right to erasure.",
        ]
        .iter()
        .enumerate()
        .map(|(i, t)| chunk(i, t))
        .collect()
    }

    async fn noise_index(dims: usize) -> SimilarityIndex {
        let mut index = SimilarityIndex::new(Arc::new(NoiseProvider { dims }));
        index.build(legal_chunks()).await.unwrap();
        index
    }

    #[tokio::test]
    async fn test_build_normalizes_every_row() {
        let index = noise_index(32).await;
        assert!(index.is_built());
        assert_eq!(index.len(), 5);
        assert_eq!(index.dims(), Some(32));
        for i in 0..index.len() {
            let norm = crate::embedding::l2_norm(index.embedding(i).unwrap());
            assert!((norm - 1.0).abs() < 1e-5, "row {} has norm {}", i, norm);
        }
        assert!(index.embedding(5).is_none());
    }

    #[tokio::test]
    async fn test_build_embeds_in_one_batch() {
        let provider = Arc::new(TableProvider::new(&[
            ("alpha", vec![1.0, 0.0]),
            ("beta", vec![0.0, 1.0]),
            ("gamma", vec![1.0, 1.0]),
        ]));
        let mut index = SimilarityIndex::new(provider.clone());
        index
            .build(vec![chunk(0, "alpha"), chunk(1, "beta"), chunk(2, "gamma")])
            .await
            .unwrap();
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_self_retrieval_ranks_first() {
        let index = noise_index(64).await;
        for c in index.chunks() {
            let hits = index.search(&c.text, index.len()).await.unwrap();
            let own = hits.iter().find(|h| h.chunk.index == c.index).unwrap();
            for other in &hits {
                assert!(own.score >= other.score);
            }
            assert_eq!(hits[0].chunk.index, c.index);
            assert!((own.similarity - 1.0).abs() < 1e-5);
        }
    }

    #[tokio::test]
    async fn test_scores_bounded_for_noise_queries() {
        let index = noise_index(16).await;
        let mut saw_negative = false;
        for q in 0..50 {
            let hits = index.search(&format!("query {}", q), 5).await.unwrap();
            for h in &hits {
                assert!((0.0..=100.0).contains(&h.score), "score {}", h.score);
                assert!((-1.0..=1.0).contains(&h.similarity));
                saw_negative |= h.similarity < 0.0;
            }
            for pair in hits.windows(2) {
                assert!(pair[0].similarity >= pair[1].similarity);
            }
        }
        assert!(saw_negative, "noise should produce negative similarities");
    }

    #[tokio::test]
    async fn test_top_k_clamped_to_chunk_count() {
        let index = noise_index(8).await;
        let hits = index.search("penalties", 50).await.unwrap();
        assert_eq!(hits.len(), 5);
        let ranks: Vec<usize> = hits.iter().map(|h| h.rank).collect();
        assert_eq!(ranks, vec![1, 2, 3, 4, 5]);
    }

    #[tokio::test]
    async fn test_invalid_top_k_checked_before_embedding() {
        let provider = Arc::new(TableProvider::new(&[("alpha", vec![1.0, 0.0])]));
        let mut index = SimilarityIndex::new(provider.clone());

        let err = index.search("", 0).await.unwrap_err();
        assert!(matches!(err, Error::InvalidTopK(0)));
        assert_eq!(provider.calls(), 0);

        index.build(vec![chunk(0, "alpha")]).await.unwrap();
        let err = index.search("alpha", 0).await.unwrap_err();
        assert!(matches!(err, Error::InvalidTopK(0)));
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_search_before_build() {
        let index = SimilarityIndex::new(Arc::new(NoiseProvider { dims: 8 }));
        assert!(!index.is_built());
        let err = index.search("anything", 3).await.unwrap_err();
        assert!(matches!(err, Error::IndexNotBuilt));
    }

    #[tokio::test]
    async fn test_empty_build_leaves_index_unbuilt() {
        let mut index = noise_index(8).await;
        index.build(Vec::new()).await.unwrap();
        assert!(!index.is_built());
        assert!(index.chunks().is_empty());
        let err = index.search("anything", 3).await.unwrap_err();
        assert!(matches!(err, Error::IndexNotBuilt));
    }

    #[tokio::test]
    async fn test_rebuild_replaces_state() {
        let mut index = noise_index(8).await;
        index
            .build(vec![chunk(0, "only chunk")])
            .await
            .unwrap();
        assert_eq!(index.len(), 1);
        let hits = index.search("penalties", 10).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].chunk.text, "only chunk");
    }

    #[tokio::test]
    async fn test_provider_failure_is_embedding_unavailable() {
        let mut index = SimilarityIndex::new(Arc::new(FailingProvider));
        let err = index.build(legal_chunks()).await.unwrap_err();
        assert!(matches!(err, Error::EmbeddingUnavailable(_)));
        assert!(err.to_string().contains("model failed to load"));
        assert!(!index.is_built());

        let err = index.search("q", 1).await.unwrap_err();
        assert!(matches!(err, Error::IndexNotBuilt));
    }

    #[tokio::test]
    async fn test_query_embedding_failure_propagates() {
        let provider = Arc::new(TableProvider::new(&[("alpha", vec![1.0, 0.0])]));
        let mut index = SimilarityIndex::new(provider);
        index.build(vec![chunk(0, "alpha")]).await.unwrap();
        let err = index.search("unknown query", 1).await.unwrap_err();
        assert!(matches!(err, Error::EmbeddingUnavailable(_)));
        assert!(index.is_built());
    }

    #[tokio::test]
    async fn test_dimension_mismatch_rejected() {
        let provider = Arc::new(TableProvider::new(&[
            ("alpha", vec![1.0, 0.0]),
            ("beta", vec![0.0, 1.0, 0.0]),
        ]));
        let mut index = SimilarityIndex::new(provider);
        let err = index
            .build(vec![chunk(0, "alpha"), chunk(1, "beta")])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::DimensionMismatch {
                expected: 2,
                actual: 3
            }
        ));
        assert!(!index.is_built());
    }

    #[tokio::test]
    async fn test_zero_norm_row_left_as_is() {
        let provider = Arc::new(TableProvider::new(&[
            ("alpha", vec![2.0, 0.0]),
            ("blank", vec![0.0, 0.0]),
        ]));
        let mut index = SimilarityIndex::new(provider);
        index
            .build(vec![chunk(0, "alpha"), chunk(1, "blank")])
            .await
            .unwrap();
        assert_eq!(index.embedding(1).unwrap(), &[0.0, 0.0]);
        let hits = index.search("alpha", 2).await.unwrap();
        assert_eq!(hits[0].chunk.text, "alpha");
        assert_eq!(hits[1].score, 0.0);
    }

    #[tokio::test]
    async fn test_non_finite_row_rejected() {
        let provider = Arc::new(TableProvider::new(&[
            ("good", vec![1.0, 0.0]),
            ("bad", vec![f32::NAN, 0.0]),
        ]));
        let mut index = SimilarityIndex::new(provider);
        let err = index
            .build(vec![chunk(0, "good"), chunk(1, "bad")])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NonFiniteEmbedding { row: Some(1) }));
        assert!(!index.is_built());
    }

    #[tokio::test]
    async fn test_non_finite_query_rejected() {
        let provider = Arc::new(TableProvider::new(&[
            ("good", vec![1.0, 0.0]),
            ("inf", vec![f32::INFINITY, 0.0]),
        ]));
        let mut index = SimilarityIndex::new(provider);
        index.build(vec![chunk(0, "good")]).await.unwrap();
        let err = index.search("inf", 1).await.unwrap_err();
        assert!(matches!(err, Error::NonFiniteEmbedding { row: None }));

        let hits = index.search("good", 1).await.unwrap();
        assert!((0.0..=100.0).contains(&hits[0].score));
    }

    #[tokio::test]
    async fn test_ties_ordered_by_chunk_index() {
        let provider = Arc::new(TableProvider::new(&[
            ("q", vec![1.0, 0.0]),
            ("c0", vec![0.0, 1.0]),
            ("c1", vec![3.0, 0.0]),
            ("c2", vec![0.0, -1.0]),
            ("c3", vec![1.0, 0.0]),
            ("c4", vec![-1.0, 0.0]),
        ]));
        let mut index = SimilarityIndex::new(provider);
        let chunks = (0..5).map(|i| chunk(i, &format!("c{}", i))).collect();
        index.build(chunks).await.unwrap();

        let order: Vec<usize> = index
            .search("q", 5)
            .await
            .unwrap()
            .iter()
            .map(|h| h.chunk.index)
            .collect();
        assert_eq!(order, vec![1, 3, 0, 2, 4]);

        let again: Vec<usize> = index
            .search("q", 5)
            .await
            .unwrap()
            .iter()
            .map(|h| h.chunk.index)
            .collect();
        assert_eq!(order, again);
    }

    #[tokio::test]
    async fn test_build_from_text() {
        let text = "CHAPTER I\nIntroduction\nArticle 1 \nDefinitions...\nArticle 2 \nScope...";
        let mut index = SimilarityIndex::new(Arc::new(NoiseProvider { dims: 8 }));
        let count = index
            .build_from_text(&Segmenter::default(), text)
            .await
            .unwrap();
        assert_eq!(count, 2);
        assert_eq!(index.chunks()[1].label, "CHAPTER I - Article 2");
    }

    #[tokio::test]
    async fn test_build_from_empty_text_clears_index() {
        let mut index = noise_index(8).await;
        let err = index
            .build_from_text(&Segmenter::default(), "   \n")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::SegmentationYieldsEmpty));
        assert!(!index.is_built());
    }

    #[tokio::test]
    async fn test_concurrent_searches_share_built_index() {
        let index = Arc::new(noise_index(16).await);
        let mut handles = Vec::new();
        for i in 0..8 {
            let index = index.clone();
            handles.push(tokio::spawn(async move {
                index.search(&format!("question {}", i), 3).await
            }));
        }
        for h in handles {
            assert_eq!(h.await.unwrap().unwrap().len(), 3);
        }
    }
}
