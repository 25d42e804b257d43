//! Embedded property graph for ontorag
//!
//! A small labeled property graph tuned for the ingestion/retrieval workload:
//!
//! - **String interning**: labels, names and edge types are stored as `u32` ids
//! - **Label indexes**: roaring bitmaps of node ids per label
//! - **Merge semantics**: nodes are keyed by `(label, name)` and edges by
//!   `(source, type, target)`, so every write is an idempotent upsert
//! - **Chunk vectors**: chunk embeddings live in a [`vector::VectorIndex`]
//! - **Snapshots**: the whole graph serializes to a single binary file
//!
//! Node kinds: `Document` (keyed by source id), `Chunk` (keyed by chunk id,
//! with text and embedding) and entities (keyed by their [`SafeLabel`] and
//! name). Entity labels can never be `Chunk` or `Document`.

use ahash::{AHashMap, AHashSet};
use roaring::RoaringBitmap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

pub mod label;
pub mod vector;

pub use label::{LabelError, RelType, SafeLabel, CHUNK_LABEL, DOCUMENT_LABEL, HAS_CHUNK, MENTIONS};
pub use vector::VectorIndex;

const MAGIC: &[u8; 4] = b"ORGD";
const FORMAT_VERSION: u32 = 1;

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum GraphDbError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("encoding error: {0}")]
    Encode(#[from] bincode::Error),
    #[error("invalid graph snapshot: {0}")]
    InvalidFormat(String),
    #[error("chunk not found: {0}")]
    ChunkNotFound(String),
    #[error("embedding dimension mismatch: index has {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("empty embedding")]
    EmptyEmbedding,
    #[error(transparent)]
    Label(#[from] LabelError),
}

pub type Result<T> = std::result::Result<T, GraphDbError>;

// ============================================================================
// String Interning
// ============================================================================

/// Interned string ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(transparent)]
pub struct StrId(u32);

/// String interner: maps strings to compact IDs
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct StringInterner {
    strings: Vec<String>,
    #[serde(skip)]
    lookup: AHashMap<String, StrId>,
}

impl StringInterner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern a string, returning its ID
    pub fn intern(&mut self, s: &str) -> StrId {
        if let Some(id) = self.lookup.get(s) {
            return *id;
        }
        let id = StrId(self.strings.len() as u32);
        self.strings.push(s.to_string());
        self.lookup.insert(s.to_string(), id);
        id
    }

    /// Look up an existing ID for a string without inserting.
    pub fn id_of(&self, s: &str) -> Option<StrId> {
        self.lookup.get(s).copied()
    }

    /// Look up string by ID
    pub fn resolve(&self, id: StrId) -> &str {
        self.strings
            .get(id.0 as usize)
            .map(|s| s.as_str())
            .unwrap_or_default()
    }

    fn rebuild_lookup(&mut self) {
        self.lookup = self
            .strings
            .iter()
            .enumerate()
            .map(|(i, s)| (s.clone(), StrId(i as u32)))
            .collect();
    }
}

// ============================================================================
// Nodes and edges
// ============================================================================

/// Chunk payload. Written once, never updated.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChunkProps {
    doc_id: StrId,
    text: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct NodeStore {
    /// node id -> label
    labels: Vec<StrId>,
    /// node id -> name (entity name, chunk id or document source id)
    names: Vec<StrId>,
    /// label -> node ids
    label_index: AHashMap<StrId, RoaringBitmap>,
    /// (label, name) -> node id
    key_index: AHashMap<(StrId, StrId), u32>,
    chunks: AHashMap<u32, ChunkProps>,
}

impl NodeStore {
    fn len(&self) -> usize {
        self.labels.len()
    }

    fn get(&self, label: StrId, name: StrId) -> Option<u32> {
        self.key_index.get(&(label, name)).copied()
    }

    /// Returns the node id and whether it was created.
    fn merge(&mut self, label: StrId, name: StrId) -> (u32, bool) {
        if let Some(id) = self.get(label, name) {
            return (id, false);
        }
        let id = self.labels.len() as u32;
        self.labels.push(label);
        self.names.push(name);
        self.label_index.entry(label).or_default().insert(id);
        self.key_index.insert((label, name), id);
        (id, true)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct Edge {
    source: u32,
    rel_type: StrId,
    target: u32,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct EdgeStore {
    edges: Vec<Edge>,
    /// source node -> edge ids, in insertion order
    forward: AHashMap<u32, Vec<u32>>,
    #[serde(skip)]
    dedup: AHashSet<(u32, StrId, u32)>,
}

impl EdgeStore {
    fn len(&self) -> usize {
        self.edges.len()
    }

    /// Returns whether the edge was created.
    fn merge(&mut self, source: u32, rel_type: StrId, target: u32) -> bool {
        if !self.dedup.insert((source, rel_type, target)) {
            return false;
        }
        let id = self.edges.len() as u32;
        self.edges.push(Edge {
            source,
            rel_type,
            target,
        });
        self.forward.entry(source).or_default().push(id);
        true
    }

    fn outgoing(&self, source: u32) -> impl Iterator<Item = &Edge> {
        self.forward
            .get(&source)
            .into_iter()
            .flatten()
            .filter_map(|id| self.edges.get(*id as usize))
    }

    fn rebuild_dedup(&mut self) {
        self.dedup = self
            .edges
            .iter()
            .map(|e| (e.source, e.rel_type, e.target))
            .collect();
    }
}

// ============================================================================
// Query results
// ============================================================================

/// An entity as seen by readers: its label and name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityRef {
    pub label: String,
    pub name: String,
}

/// One outgoing typed edge between two entities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactEdge {
    pub subject: EntityRef,
    pub rel_type: String,
    pub object: EntityRef,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkHit {
    pub chunk_id: String,
    pub doc_id: String,
    pub text: String,
    pub score: f32,
}

/// Outcome of storing a chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkWrite {
    Created,
    /// The chunk id already existed; its text and embedding were kept.
    Existing,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphStats {
    pub documents: usize,
    pub chunks: usize,
    pub entities: usize,
    pub edges: usize,
    pub mentions: usize,
    /// Entity count per label
    pub labels: BTreeMap<String, usize>,
    /// Edge count per fact relation type
    pub rel_types: BTreeMap<String, usize>,
}

// ============================================================================
// GraphDB
// ============================================================================

#[derive(Default, Serialize, Deserialize)]
pub struct GraphDB {
    interner: StringInterner,
    nodes: NodeStore,
    edges: EdgeStore,
    vectors: VectorIndex,
}

impl GraphDB {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Fixed embedding dimension, once the first chunk is stored.
    pub fn embedding_dim(&self) -> Option<usize> {
        self.vectors.dim()
    }

    fn merge_node(&mut self, label: &str, name: &str) -> u32 {
        let label = self.interner.intern(label);
        let name = self.interner.intern(name);
        self.nodes.merge(label, name).0
    }

    fn find_node(&self, label: &str, name: &str) -> Option<u32> {
        let label = self.interner.id_of(label)?;
        let name = self.interner.id_of(name)?;
        self.nodes.get(label, name)
    }

    fn merge_edge_raw(&mut self, source: u32, rel_type: &str, target: u32) -> bool {
        let rel = self.interner.intern(rel_type);
        self.edges.merge(source, rel, target)
    }

    pub fn merge_document(&mut self, doc_id: &str) -> u32 {
        self.merge_node(DOCUMENT_LABEL, doc_id)
    }

    /// Store a chunk under its document. Text and embedding are set only when
    /// the chunk is created.
    pub fn merge_chunk(
        &mut self,
        doc_id: &str,
        chunk_id: &str,
        text: &str,
        embedding: &[f32],
    ) -> Result<ChunkWrite> {
        if let Some(existing) = self.find_node(CHUNK_LABEL, chunk_id) {
            let doc = self.merge_document(doc_id);
            self.merge_edge_raw(doc, HAS_CHUNK, existing);
            return Ok(ChunkWrite::Existing);
        }
        if embedding.is_empty() {
            return Err(GraphDbError::EmptyEmbedding);
        }
        self.vectors.check_dim(embedding.len())?;

        let doc = self.merge_document(doc_id);
        let chunk = self.merge_node(CHUNK_LABEL, chunk_id);
        let doc_sid = self.interner.intern(doc_id);
        self.nodes.chunks.insert(
            chunk,
            ChunkProps {
                doc_id: doc_sid,
                text: text.to_string(),
            },
        );
        self.vectors.insert(chunk, embedding)?;
        self.merge_edge_raw(doc, HAS_CHUNK, chunk);
        Ok(ChunkWrite::Created)
    }

    pub fn merge_entity(&mut self, label: &SafeLabel, name: &str) -> u32 {
        self.merge_node(label.as_str(), name)
    }

    /// Merge `(subject)-[rel]->(object)`, creating either entity if needed.
    /// Returns whether the edge was created.
    pub fn merge_fact(
        &mut self,
        subject_label: &SafeLabel,
        subject: &str,
        rel_type: &RelType,
        object_label: &SafeLabel,
        object: &str,
    ) -> bool {
        let s = self.merge_entity(subject_label, subject);
        let o = self.merge_entity(object_label, object);
        self.merge_edge_raw(s, rel_type.as_str(), o)
    }

    /// Merge a `MENTIONS` edge from an existing chunk to an entity.
    pub fn merge_mention(&mut self, chunk_id: &str, label: &SafeLabel, name: &str) -> Result<bool> {
        let chunk = self
            .find_node(CHUNK_LABEL, chunk_id)
            .ok_or_else(|| GraphDbError::ChunkNotFound(chunk_id.to_string()))?;
        let entity = self.merge_entity(label, name);
        Ok(self.merge_edge_raw(chunk, MENTIONS, entity))
    }

    pub fn chunk(&self, chunk_id: &str) -> Option<ChunkHit> {
        let id = self.find_node(CHUNK_LABEL, chunk_id)?;
        let props = self.nodes.chunks.get(&id)?;
        Some(ChunkHit {
            chunk_id: chunk_id.to_string(),
            doc_id: self.interner.resolve(props.doc_id).to_string(),
            text: props.text.clone(),
            score: 0.0,
        })
    }

    /// The `k` chunks nearest to `embedding`, best first.
    pub fn nearest_chunks(&self, embedding: &[f32], k: usize) -> Result<Vec<ChunkHit>> {
        let hits = self.vectors.search(embedding, k)?;
        Ok(hits
            .into_iter()
            .filter_map(|(id, score)| {
                let props = self.nodes.chunks.get(&id)?;
                Some(ChunkHit {
                    chunk_id: self.interner.resolve(self.nodes.names[id as usize]).to_string(),
                    doc_id: self.interner.resolve(props.doc_id).to_string(),
                    text: props.text.clone(),
                    score,
                })
            })
            .collect())
    }

    fn is_structural(&self, node: u32) -> bool {
        let label = self.interner.resolve(self.nodes.labels[node as usize]);
        label == CHUNK_LABEL || label == DOCUMENT_LABEL
    }

    fn entity_ref(&self, node: u32) -> EntityRef {
        EntityRef {
            label: self.interner.resolve(self.nodes.labels[node as usize]).to_string(),
            name: self.interner.resolve(self.nodes.names[node as usize]).to_string(),
        }
    }

    /// Entities mentioned by a chunk, in mention order. Unknown chunk ids
    /// have no mentions.
    pub fn chunk_mentions(&self, chunk_id: &str) -> Vec<EntityRef> {
        let Some(chunk) = self.find_node(CHUNK_LABEL, chunk_id) else {
            return Vec::new();
        };
        let Some(mentions) = self.interner.id_of(MENTIONS) else {
            return Vec::new();
        };
        self.edges
            .outgoing(chunk)
            .filter(|e| e.rel_type == mentions && !self.is_structural(e.target))
            .map(|e| self.entity_ref(e.target))
            .collect()
    }

    /// Outgoing fact edges of an entity to other (non-chunk) entities, in
    /// insertion order.
    pub fn outgoing_facts(&self, label: &SafeLabel, name: &str) -> Vec<FactEdge> {
        let Some(node) = self.find_node(label.as_str(), name) else {
            return Vec::new();
        };
        let subject = self.entity_ref(node);
        self.edges
            .outgoing(node)
            .filter(|e| !self.is_structural(e.target))
            .map(|e| FactEdge {
                subject: subject.clone(),
                rel_type: self.interner.resolve(e.rel_type).to_string(),
                object: self.entity_ref(e.target),
            })
            .collect()
    }

    pub fn stats(&self) -> GraphStats {
        let mut stats = GraphStats::default();
        for (label, ids) in &self.nodes.label_index {
            let name = self.interner.resolve(*label);
            let count = ids.len() as usize;
            match name {
                CHUNK_LABEL => stats.chunks = count,
                DOCUMENT_LABEL => stats.documents = count,
                _ => {
                    stats.entities += count;
                    stats.labels.insert(name.to_string(), count);
                }
            }
        }
        for edge in &self.edges.edges {
            match self.interner.resolve(edge.rel_type) {
                MENTIONS => stats.mentions += 1,
                HAS_CHUNK => {}
                rel => {
                    stats.edges += 1;
                    *stats.rel_types.entry(rel.to_string()).or_default() += 1;
                }
            }
        }
        stats
    }

    // ========================================================================
    // Snapshots
    // ========================================================================

    /// Serialize to binary format
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let body = bincode::serialize(self)?;
        let mut out = Vec::with_capacity(body.len() + 16);
        out.extend_from_slice(MAGIC);
        out.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
        out.extend_from_slice(&(body.len() as u64).to_le_bytes());
        out.extend_from_slice(&body);
        Ok(out)
    }

    /// Deserialize from binary format
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < 16 || &bytes[0..4] != MAGIC {
            return Err(GraphDbError::InvalidFormat("missing ORGD header".to_string()));
        }
        let version = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
        if version != FORMAT_VERSION {
            return Err(GraphDbError::InvalidFormat(format!(
                "unsupported version {version}"
            )));
        }
        let mut len_bytes = [0u8; 8];
        len_bytes.copy_from_slice(&bytes[8..16]);
        let len = u64::from_le_bytes(len_bytes) as usize;
        let body = bytes
            .get(16..16 + len)
            .ok_or_else(|| GraphDbError::InvalidFormat("truncated snapshot".to_string()))?;

        let mut db: GraphDB = bincode::deserialize(body)?;
        db.interner.rebuild_lookup();
        db.edges.rebuild_dedup();
        Ok(db)
    }

    /// Write a snapshot atomically: temp file, fsync, rename.
    pub fn save(&self, path: &Path) -> Result<()> {
        let bytes = self.to_bytes()?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let tmp = path.with_extension("orgd.tmp");
        {
            let mut file = std::fs::File::create(&tmp)?;
            file.write_all(&bytes)?;
            file.sync_all()?;
        }
        std::fs::rename(&tmp, path)?;
        tracing::debug!(path = %path.display(), bytes = bytes.len(), "saved graph snapshot");
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        Self::from_bytes(&bytes)
    }

    /// Load a snapshot, or start empty if none exists yet.
    pub fn open(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn label(s: &str) -> SafeLabel {
        SafeLabel::normalize(s).unwrap()
    }

    fn rel(s: &str) -> RelType {
        RelType::normalize(s).unwrap()
    }

    fn sample() -> GraphDB {
        let mut db = GraphDB::new();
        db.merge_chunk("budget", "budget:0", "The Ministry of Finance ...", &[1.0, 0.0])
            .unwrap();
        db.merge_chunk("budget", "budget:1", "Rainfall ...", &[0.0, 1.0])
            .unwrap();
        db.merge_fact(
            &label("ministry"),
            "Ministry of Finance",
            &rel("has minister"),
            &label("person"),
            "Nirmala Sitharaman",
        );
        db.merge_mention("budget:0", &label("ministry"), "Ministry of Finance")
            .unwrap();
        db.merge_mention("budget:0", &label("person"), "Nirmala Sitharaman")
            .unwrap();
        db
    }

    #[test]
    fn merges_are_idempotent() {
        let mut db = sample();
        let nodes = db.node_count();
        let edges = db.edge_count();

        assert_eq!(
            db.merge_chunk("budget", "budget:0", "different text", &[0.5, 0.5])
                .unwrap(),
            ChunkWrite::Existing
        );
        assert!(!db.merge_fact(
            &label("Ministry"),
            "Ministry of Finance",
            &rel("HAS_MINISTER"),
            &label("Person"),
            "Nirmala Sitharaman",
        ));
        assert!(!db
            .merge_mention("budget:0", &label("ministry"), "Ministry of Finance")
            .unwrap());

        assert_eq!(db.node_count(), nodes);
        assert_eq!(db.edge_count(), edges);
        assert_eq!(db.chunk("budget:0").unwrap().text, "The Ministry of Finance ...");
    }

    #[test]
    fn distinct_relations_between_same_pair() {
        let mut db = sample();
        assert!(db.merge_fact(
            &label("ministry"),
            "Ministry of Finance",
            &rel("announced"),
            &label("person"),
            "Nirmala Sitharaman",
        ));
        let facts = db.outgoing_facts(&label("ministry"), "Ministry of Finance");
        let rels: Vec<_> = facts.iter().map(|f| f.rel_type.as_str()).collect();
        assert_eq!(rels, vec!["HAS_MINISTER", "ANNOUNCED"]);
    }

    #[test]
    fn same_name_different_type_are_distinct_entities() {
        let mut db = GraphDB::new();
        let a = db.merge_entity(&label("location"), "Delhi");
        let b = db.merge_entity(&label("organization"), "Delhi");
        assert_ne!(a, b);
    }

    #[test]
    fn mentions_and_facts_exclude_chunks() {
        let db = sample();
        let mentions = db.chunk_mentions("budget:0");
        assert_eq!(
            mentions,
            vec![
                EntityRef {
                    label: "Ministry".into(),
                    name: "Ministry of Finance".into()
                },
                EntityRef {
                    label: "Person".into(),
                    name: "Nirmala Sitharaman".into()
                },
            ]
        );
        assert!(db.chunk_mentions("budget:1").is_empty());
        assert!(db.chunk_mentions("missing:0").is_empty());

        let facts = db.outgoing_facts(&label("ministry"), "Ministry of Finance");
        assert_eq!(facts.len(), 1);
        assert_eq!(facts[0].object.name, "Nirmala Sitharaman");
        assert!(db.outgoing_facts(&label("person"), "Nirmala Sitharaman").is_empty());
    }

    #[test]
    fn mention_requires_existing_chunk() {
        let mut db = GraphDB::new();
        let err = db
            .merge_mention("nope:0", &label("person"), "X")
            .unwrap_err();
        assert!(matches!(err, GraphDbError::ChunkNotFound(_)));
    }

    #[test]
    fn nearest_chunks_are_scored_descending() {
        let db = sample();
        let hits = db.nearest_chunks(&[0.9, 0.1], 10).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].chunk_id, "budget:0");
        assert_eq!(hits[0].doc_id, "budget");
        assert!(hits[0].score > hits[1].score);
    }

    #[test]
    fn embedding_dimension_is_enforced() {
        let mut db = sample();
        let err = db.merge_chunk("budget", "budget:2", "x", &[1.0, 0.0, 0.0]).unwrap_err();
        assert!(matches!(err, GraphDbError::DimensionMismatch { .. }));
        assert!(db.nearest_chunks(&[1.0], 3).is_err());
    }

    #[test]
    fn stats_separate_structure_from_facts() {
        let stats = sample().stats();
        assert_eq!(stats.documents, 1);
        assert_eq!(stats.chunks, 2);
        assert_eq!(stats.entities, 2);
        assert_eq!(stats.edges, 1);
        assert_eq!(stats.mentions, 2);
        assert_eq!(stats.labels.get("Ministry"), Some(&1));
        assert_eq!(stats.rel_types.get("HAS_MINISTER"), Some(&1));
    }

    #[test]
    fn snapshot_roundtrip_preserves_merge_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join("graph.orgd");
        sample().save(&path).unwrap();

        let mut db = GraphDB::open(&path).unwrap();
        assert_eq!(db.stats(), sample().stats());
        assert!(!db.merge_fact(
            &label("ministry"),
            "Ministry of Finance",
            &rel("has minister"),
            &label("person"),
            "Nirmala Sitharaman",
        ));
        assert_eq!(db.nearest_chunks(&[1.0, 0.0], 1).unwrap()[0].chunk_id, "budget:0");
    }

    #[test]
    fn rejects_corrupt_snapshots() {
        assert!(matches!(
            GraphDB::from_bytes(b"nope"),
            Err(GraphDbError::InvalidFormat(_))
        ));
        let mut bytes = sample().to_bytes().unwrap();
        bytes.truncate(bytes.len() - 3);
        assert!(GraphDB::from_bytes(&bytes).is_err());
    }

    #[test]
    fn open_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let db = GraphDB::open(&dir.path().join("graph.orgd")).unwrap();
        assert_eq!(db.node_count(), 0);
    }
}
