//! Graph/vector store boundary.
//!
//! The engine only talks to [`GraphStore`]. Labels cross the boundary as
//! validated [`SafeLabel`] / [`RelType`] values; names and texts are plain
//! values and never become part of a label.

use crate::error::Result;
use async_trait::async_trait;
use ontorag_graphdb::{ChunkHit, ChunkWrite, EntityRef, FactEdge, GraphDB, GraphStats, RelType, SafeLabel};
use parking_lot::RwLock;
use std::path::{Path, PathBuf};

#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Create a chunk node under its document. Existing chunks are left
    /// untouched.
    async fn store_chunk(
        &self,
        doc_id: &str,
        chunk_id: &str,
        text: &str,
        embedding: &[f32],
    ) -> Result<ChunkWrite>;

    /// Upsert both entities and the typed edge between them. Returns whether
    /// the edge is new.
    async fn merge_fact(
        &self,
        subject_label: &SafeLabel,
        subject: &str,
        rel_type: &RelType,
        object_label: &SafeLabel,
        object: &str,
    ) -> Result<bool>;

    /// Upsert a `MENTIONS` edge from a stored chunk to an entity.
    async fn merge_mention(&self, chunk_id: &str, label: &SafeLabel, name: &str) -> Result<bool>;

    /// Nearest chunks by embedding similarity, best first.
    async fn nearest_chunks(&self, embedding: &[f32], k: usize) -> Result<Vec<ChunkHit>>;

    async fn chunk_mentions(&self, chunk_id: &str) -> Result<Vec<EntityRef>>;

    /// Outgoing typed edges of an entity to non-chunk neighbours.
    async fn outgoing_facts(&self, label: &SafeLabel, name: &str) -> Result<Vec<FactEdge>>;

    /// Make all writes so far durable.
    async fn flush(&self) -> Result<()>;

    async fn stats(&self) -> Result<GraphStats>;
}

/// [`GraphStore`] over an in-process [`GraphDB`], optionally snapshotted to
/// a file on [`GraphStore::flush`].
pub struct EmbeddedGraphStore {
    db: RwLock<GraphDB>,
    path: Option<PathBuf>,
}

impl EmbeddedGraphStore {
    pub fn in_memory() -> Self {
        Self {
            db: RwLock::new(GraphDB::new()),
            path: None,
        }
    }

    /// Open the snapshot at `path`, or start empty if it does not exist.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let db = GraphDB::open(&path)?;
        tracing::debug!(path = %path.display(), nodes = db.node_count(), "opened graph");
        Ok(Self {
            db: RwLock::new(db),
            path: Some(path),
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Run a read-only closure against the graph.
    pub fn read<T>(&self, f: impl FnOnce(&GraphDB) -> T) -> T {
        f(&self.db.read())
    }
}

#[async_trait]
impl GraphStore for EmbeddedGraphStore {
    async fn store_chunk(
        &self,
        doc_id: &str,
        chunk_id: &str,
        text: &str,
        embedding: &[f32],
    ) -> Result<ChunkWrite> {
        Ok(self.db.write().merge_chunk(doc_id, chunk_id, text, embedding)?)
    }

    async fn merge_fact(
        &self,
        subject_label: &SafeLabel,
        subject: &str,
        rel_type: &RelType,
        object_label: &SafeLabel,
        object: &str,
    ) -> Result<bool> {
        Ok(self
            .db
            .write()
            .merge_fact(subject_label, subject, rel_type, object_label, object))
    }

    async fn merge_mention(&self, chunk_id: &str, label: &SafeLabel, name: &str) -> Result<bool> {
        Ok(self.db.write().merge_mention(chunk_id, label, name)?)
    }

    async fn nearest_chunks(&self, embedding: &[f32], k: usize) -> Result<Vec<ChunkHit>> {
        Ok(self.db.read().nearest_chunks(embedding, k)?)
    }

    async fn chunk_mentions(&self, chunk_id: &str) -> Result<Vec<EntityRef>> {
        Ok(self.db.read().chunk_mentions(chunk_id))
    }

    async fn outgoing_facts(&self, label: &SafeLabel, name: &str) -> Result<Vec<FactEdge>> {
        Ok(self.db.read().outgoing_facts(label, name))
    }

    async fn flush(&self) -> Result<()> {
        if let Some(path) = &self.path {
            self.db.read().save(path)?;
        }
        Ok(())
    }

    async fn stats(&self) -> Result<GraphStats> {
        Ok(self.db.read().stats())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn flush_and_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("graph.orgd");
        let store = EmbeddedGraphStore::open(&path).unwrap();
        store.store_chunk("doc", "doc:0", "text", &[1.0, 0.0]).await.unwrap();
        let person = SafeLabel::normalize("person").unwrap();
        store.merge_mention("doc:0", &person, "Ada").await.unwrap();
        store.flush().await.unwrap();

        let reopened = EmbeddedGraphStore::open(&path).unwrap();
        assert_eq!(reopened.stats().await.unwrap().chunks, 1);
        assert_eq!(reopened.chunk_mentions("doc:0").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn in_memory_flush_is_a_no_op() {
        let store = EmbeddedGraphStore::in_memory();
        store.flush().await.unwrap();
        assert!(store.path().is_none());
    }
}
