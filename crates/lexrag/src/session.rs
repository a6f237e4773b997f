//! Per-document sessions.
//!
//! Each loaded document gets its own [`SimilarityIndex`] behind an async
//! `RwLock`: a load takes the write lock, so it is exclusive with searches
//! and with other loads on the same session, while searches share the read
//! lock. Sessions never share index state; they share only the embedding
//! provider and the segmenter.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

use lexrag_core::embedding::EmbeddingProvider;
use lexrag_core::{Chunk, SearchHit, Segmenter, SimilarityIndex};

/// A loaded document and its index.
pub struct DocumentSession {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
    segmenter: Segmenter,
    index: RwLock<SimilarityIndex>,
}

impl std::fmt::Debug for DocumentSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentSession")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("created_at", &self.created_at)
            .finish_non_exhaustive()
    }
}

/// Summary of a session for listings.
#[derive(Debug, Clone, Serialize)]
pub struct SessionInfo {
    pub id: Uuid,
    pub name: String,
    pub chunks: usize,
    pub created_at: DateTime<Utc>,
}

impl DocumentSession {
    fn new(name: String, provider: Arc<dyn EmbeddingProvider>, segmenter: Segmenter) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            created_at: Utc::now(),
            segmenter,
            index: RwLock::new(SimilarityIndex::new(provider)),
        }
    }

    /// Segment `text` and rebuild the index from it. The last completed
    /// load wins; a failed load leaves the session unbuilt.
    pub async fn load_text(&self, text: &str) -> lexrag_core::Result<usize> {
        let mut index = self.index.write().await;
        let count = index.build_from_text(&self.segmenter, text).await?;
        info!(session = %self.id, name = %self.name, chunks = count, "document loaded");
        Ok(count)
    }

    pub async fn search(&self, query: &str, top_k: usize) -> lexrag_core::Result<Vec<SearchHit>> {
        self.index.read().await.search(query, top_k).await
    }

    pub async fn chunks(&self) -> Vec<Chunk> {
        self.index.read().await.chunks().to_vec()
    }

    pub async fn info(&self) -> SessionInfo {
        SessionInfo {
            id: self.id,
            name: self.name.clone(),
            chunks: self.index.read().await.len(),
            created_at: self.created_at,
        }
    }
}

/// All live sessions, keyed by id.
pub struct SessionRegistry {
    provider: Arc<dyn EmbeddingProvider>,
    segmenter: Segmenter,
    sessions: RwLock<HashMap<Uuid, Arc<DocumentSession>>>,
}

impl SessionRegistry {
    pub fn new(provider: Arc<dyn EmbeddingProvider>, segmenter: Segmenter) -> Self {
        Self {
            provider,
            segmenter,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub fn provider(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.provider
    }

    /// Create a session from document text. The session is registered
    /// only if the initial load succeeds.
    pub async fn create(
        &self,
        name: impl Into<String>,
        text: &str,
    ) -> lexrag_core::Result<Arc<DocumentSession>> {
        let session = Arc::new(DocumentSession::new(
            name.into(),
            self.provider.clone(),
            self.segmenter.clone(),
        ));
        session.load_text(text).await?;
        self.sessions
            .write()
            .await
            .insert(session.id, session.clone());
        Ok(session)
    }

    pub async fn get(&self, id: &Uuid) -> Option<Arc<DocumentSession>> {
        self.sessions.read().await.get(id).cloned()
    }

    pub async fn remove(&self, id: &Uuid) -> bool {
        let removed = self.sessions.write().await.remove(id).is_some();
        if removed {
            info!(session = %id, "session removed");
        }
        removed
    }

    /// Sessions ordered by creation time, oldest first.
    pub async fn list(&self) -> Vec<SessionInfo> {
        let sessions: Vec<Arc<DocumentSession>> =
            self.sessions.read().await.values().cloned().collect();
        let mut infos = Vec::with_capacity(sessions.len());
        for session in sessions {
            infos.push(session.info().await);
        }
        infos.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        infos
    }
}
