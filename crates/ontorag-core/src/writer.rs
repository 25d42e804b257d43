//! Graph writer: typed, idempotent upserts of extracted triplets.

use crate::error::Result;
use crate::ontology::Ontology;
use crate::store::GraphStore;
use crate::triplet::Triplet;
use ontorag_graphdb::{LabelError, RelType, SafeLabel};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteSummary {
    pub written: usize,
    pub rejected: usize,
}

impl std::ops::AddAssign for WriteSummary {
    fn add_assign(&mut self, rhs: Self) {
        self.written += rhs.written;
        self.rejected += rhs.rejected;
    }
}

#[derive(Debug, thiserror::Error)]
enum Rejection {
    #[error("empty entity name")]
    EmptyName,
    #[error("entity type {0:?} is not in the ontology")]
    UnknownEntityType(String),
    #[error("relation type {0:?} is not in the ontology")]
    UnknownRelationType(String),
    #[error(transparent)]
    Label(#[from] LabelError),
}

struct Prepared<'a> {
    subject: &'a str,
    subject_label: SafeLabel,
    rel_type: RelType,
    object: &'a str,
    object_label: SafeLabel,
}

pub struct GraphWriter {
    store: Arc<dyn GraphStore>,
}

impl GraphWriter {
    pub fn new(store: Arc<dyn GraphStore>) -> Self {
        Self { store }
    }

    /// Write `triplets` extracted from `chunk_id`. Every type must already
    /// be in `ontology`; triplets that fail the check or normalize to an
    /// unusable label are skipped and counted as rejected.
    pub async fn write(
        &self,
        triplets: &[Triplet],
        chunk_id: &str,
        ontology: &Ontology,
    ) -> Result<WriteSummary> {
        let mut summary = WriteSummary::default();
        for triplet in triplets {
            let prepared = match prepare(triplet, ontology) {
                Ok(p) => p,
                Err(reason) => {
                    tracing::warn!(chunk_id, triplet = %triplet, %reason, "rejected triplet");
                    summary.rejected += 1;
                    continue;
                }
            };
            self.store
                .merge_fact(
                    &prepared.subject_label,
                    prepared.subject,
                    &prepared.rel_type,
                    &prepared.object_label,
                    prepared.object,
                )
                .await?;
            self.store
                .merge_mention(chunk_id, &prepared.subject_label, prepared.subject)
                .await?;
            self.store
                .merge_mention(chunk_id, &prepared.object_label, prepared.object)
                .await?;
            summary.written += 1;
        }
        Ok(summary)
    }
}

fn prepare<'a>(triplet: &'a Triplet, ontology: &Ontology) -> std::result::Result<Prepared<'a>, Rejection> {
    let subject = triplet.subject.trim();
    let object = triplet.object.trim();
    if subject.is_empty() || object.is_empty() {
        return Err(Rejection::EmptyName);
    }
    for t in [&triplet.subject_type, &triplet.object_type] {
        if !ontology.contains_entity_type(t) {
            return Err(Rejection::UnknownEntityType(t.clone()));
        }
    }
    if !ontology.contains_relation_type(&triplet.relation) {
        return Err(Rejection::UnknownRelationType(triplet.relation.clone()));
    }
    Ok(Prepared {
        subject,
        subject_label: SafeLabel::normalize(&triplet.subject_type)?,
        rel_type: RelType::normalize(&triplet.relation)?,
        object,
        object_label: SafeLabel::normalize(&triplet.object_type)?,
    })
}
