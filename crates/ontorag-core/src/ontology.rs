//! Ontology store: the evolving vocabulary of entity and relation types.
//!
//! Types only ever grow. Every change is written to disk before it becomes
//! visible in memory, so the in-memory set never runs ahead of the file.

use crate::error::{Error, Result};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const BASELINE_ENTITY_TYPES: &[&str] = &[
    "ministry",
    "department",
    "organization",
    "policy",
    "scheme",
    "person",
    "title",
    "budget item",
    "location",
    "date",
];

pub const BASELINE_RELATION_TYPES: &[&str] = &[
    "has department",
    "has minister",
    "has title",
    "announced",
    "allocates budget to",
    "has budget",
    "located in",
    "effective from",
    "governs",
    "implemented by",
];

/// Canonical form used for membership: trimmed, lowercase, `_` and `-` read
/// as spaces, whitespace collapsed.
pub fn normalize_type(raw: &str) -> String {
    raw.to_lowercase()
        .replace(['_', '-'], " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ontology {
    pub entity_types: BTreeSet<String>,
    pub relation_types: BTreeSet<String>,
}

impl Ontology {
    pub fn baseline() -> Self {
        Self {
            entity_types: BASELINE_ENTITY_TYPES.iter().map(|s| s.to_string()).collect(),
            relation_types: BASELINE_RELATION_TYPES.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn contains_entity_type(&self, t: &str) -> bool {
        self.entity_types.contains(&normalize_type(t))
    }

    pub fn contains_relation_type(&self, t: &str) -> bool {
        self.relation_types.contains(&normalize_type(t))
    }

    fn normalized(self) -> Self {
        Self {
            entity_types: normalize_all(self.entity_types),
            relation_types: normalize_all(self.relation_types),
        }
    }
}

fn normalize_all<I: IntoIterator<Item = String>>(types: I) -> BTreeSet<String> {
    types
        .into_iter()
        .map(|t| normalize_type(&t))
        .filter(|t| !t.is_empty())
        .collect()
}

/// Owner of the ontology file. Single writer per process.
#[derive(Debug)]
pub struct OntologyStore {
    path: Option<PathBuf>,
    current: Ontology,
}

/// The store shared between concurrent extraction tasks; the mutex is the
/// single-writer critical section.
pub type SharedOntology = Arc<Mutex<OntologyStore>>;

impl OntologyStore {
    /// Open the ontology file, seeding the baseline vocabulary if it does
    /// not exist yet.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let current = if path.exists() {
            let text = std::fs::read_to_string(&path)?;
            let parsed: Ontology = serde_json::from_str(&text)?;
            parsed.normalized()
        } else {
            tracing::info!(path = %path.display(), "no ontology file, starting from baseline");
            Ontology::baseline()
        };
        Ok(Self {
            path: Some(path),
            current,
        })
    }

    /// A store that never touches disk.
    pub fn in_memory(ontology: Ontology) -> Self {
        Self {
            path: None,
            current: ontology.normalized(),
        }
    }

    pub fn shared(self) -> SharedOntology {
        Arc::new(Mutex::new(self))
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Cheap copy of the current vocabulary.
    pub fn snapshot(&self) -> Ontology {
        self.current.clone()
    }

    pub fn contains_entity_type(&self, t: &str) -> bool {
        self.current.contains_entity_type(t)
    }

    pub fn contains_relation_type(&self, t: &str) -> bool {
        self.current.contains_relation_type(t)
    }

    /// Add any types not already known and persist the full set if anything
    /// was added. Returns whether a persist happened.
    ///
    /// On a persist failure the in-memory vocabulary is left unchanged and
    /// the error is returned.
    pub fn propose<E, R>(&mut self, new_entity_types: E, new_relation_types: R) -> Result<bool>
    where
        E: IntoIterator,
        E::Item: AsRef<str>,
        R: IntoIterator,
        R::Item: AsRef<str>,
    {
        let mut next = self.current.clone();
        let mut added = Vec::new();
        for t in new_entity_types {
            let t = normalize_type(t.as_ref());
            if !t.is_empty() && next.entity_types.insert(t.clone()) {
                added.push(format!("entity:{t}"));
            }
        }
        for t in new_relation_types {
            let t = normalize_type(t.as_ref());
            if !t.is_empty() && next.relation_types.insert(t.clone()) {
                added.push(format!("relation:{t}"));
            }
        }
        if added.is_empty() {
            return Ok(false);
        }

        if let Some(path) = &self.path {
            write_atomic(path, &next)?;
        }
        tracing::info!(added = ?added, "ontology updated");
        self.current = next;
        Ok(true)
    }

    /// Persist the current vocabulary even if nothing changed.
    pub fn save(&self) -> Result<()> {
        match &self.path {
            Some(path) => write_atomic(path, &self.current),
            None => Ok(()),
        }
    }
}

fn write_atomic(path: &Path, ontology: &Ontology) -> Result<()> {
    let persist_err = |source: std::io::Error| Error::OntologyPersist {
        path: path.to_path_buf(),
        source,
    };
    let json = serde_json::to_vec_pretty(ontology)?;
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(persist_err)?;
        }
    }
    let tmp = path.with_extension("json.tmp");
    let mut file = std::fs::File::create(&tmp).map_err(persist_err)?;
    file.write_all(&json).map_err(persist_err)?;
    file.sync_all().map_err(persist_err)?;
    drop(file);
    std::fs::rename(&tmp, path).map_err(persist_err)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn normalization_unifies_spellings() {
        assert_eq!(normalize_type("  Has_Minister "), "has minister");
        assert_eq!(normalize_type("budget-item"), "budget item");
        assert_eq!(normalize_type("Budget   Item"), "budget item");
    }

    #[test]
    fn missing_file_starts_from_baseline() {
        let dir = tempfile::tempdir().unwrap();
        let store = OntologyStore::open(dir.path().join("ontology.json")).unwrap();
        assert!(store.contains_entity_type("ministry"));
        assert!(store.contains_entity_type("Budget Item"));
        assert!(store.contains_relation_type("has_minister"));
        assert!(!store.contains_entity_type("mission"));
    }

    #[test]
    fn propose_persists_only_on_change() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ontology.json");
        let mut store = OntologyStore::open(&path).unwrap();

        assert!(!store.propose(["ministry"], ["has-minister"]).unwrap());
        assert!(!path.exists());

        assert!(store.propose(["Mission"], Vec::<String>::new()).unwrap());
        assert!(path.exists());

        let reopened = OntologyStore::open(&path).unwrap();
        assert!(reopened.contains_entity_type("mission"));
        assert_eq!(reopened.snapshot(), store.snapshot());
    }

    #[test]
    fn persisted_lists_are_sorted_and_distinct() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ontology.json");
        let mut store = OntologyStore::open(&path).unwrap();
        store.propose(["zeta", "alpha", "Alpha"], ["launched"]).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        let entities: Vec<String> = serde_json::from_value(value["entity_types"].clone()).unwrap();
        let mut sorted = entities.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(entities, sorted);
        assert_eq!(entities.iter().filter(|t| *t == "alpha").count(), 1);
    }

    #[test]
    fn persist_failure_leaves_memory_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not_a_dir");
        std::fs::write(&blocker, "file").unwrap();
        let mut store = OntologyStore::open(blocker.join("ontology.json")).unwrap();
        let before = store.snapshot();

        let err = store.propose(["mission"], ["launched"]).unwrap_err();
        assert!(matches!(err, Error::OntologyPersist { .. }));
        assert_eq!(store.snapshot(), before);
    }

    proptest! {
        #[test]
        fn propose_is_monotonic(
            batches in proptest::collection::vec(
                (proptest::collection::vec("[a-z_ -]{0,12}", 0..4),
                 proptest::collection::vec("[a-z_ -]{0,12}", 0..4)),
                0..6,
            )
        ) {
            let mut store = OntologyStore::in_memory(Ontology::baseline());
            for (entities, relations) in batches {
                let before = store.snapshot();
                store.propose(&entities, &relations).unwrap();
                let after = store.snapshot();
                prop_assert!(before.entity_types.is_subset(&after.entity_types));
                prop_assert!(before.relation_types.is_subset(&after.relation_types));
                for t in &entities {
                    prop_assert!(normalize_type(t).is_empty() || after.contains_entity_type(t));
                }
            }
        }
    }
}
