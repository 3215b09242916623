//! Facet taxonomy side-index
//!
//! Maps `(dimension, label)` pairs to stable ordinals and back. One sled
//! database per object type, stored next to the type's inverted index.

use crate::search::error::{SearchError, SearchResult};
use serde::{Deserialize, Serialize};
use sled::Db;
use std::path::Path;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct FacetLabel {
    dim: String,
    label: String,
}

/// Persistent facet label registry of one object type
#[derive(Clone)]
pub struct Taxonomy {
    db: Arc<Db>,
    labels_tree: sled::Tree,
    ordinals_tree: sled::Tree,
}

impl Taxonomy {
    /// Open (or create) the taxonomy at the specified path
    pub fn open<P: AsRef<Path>>(path: P) -> SearchResult<Self> {
        let db = sled::open(path.as_ref()).map_err(|e| {
            SearchError::TaxonomyError(format!("Failed to open taxonomy database: {}", e))
        })?;
        let labels_tree = db.open_tree("labels")?;
        let ordinals_tree = db.open_tree("ordinals")?;

        Ok(Self {
            db: Arc::new(db),
            labels_tree,
            ordinals_tree,
        })
    }

    fn label_key(dim: &str, label: &str) -> Vec<u8> {
        let mut key = Vec::with_capacity(dim.len() + label.len() + 1);
        key.extend_from_slice(dim.as_bytes());
        key.push(0);
        key.extend_from_slice(label.as_bytes());
        key
    }

    fn dim_prefix(dim: &str) -> Vec<u8> {
        let mut prefix = dim.as_bytes().to_vec();
        prefix.push(0);
        prefix
    }

    /// Ordinal of a label, if it was ever registered
    pub fn ordinal(&self, dim: &str, label: &str) -> SearchResult<Option<u64>> {
        let value = self.labels_tree.get(Self::label_key(dim, label))?;
        Ok(value.and_then(|bytes| decode_ordinal(&bytes)))
    }

    /// Ordinal of a label, registering it first when unknown
    pub fn ordinal_or_insert(&self, dim: &str, label: &str) -> SearchResult<u64> {
        let key = Self::label_key(dim, label);
        if let Some(ordinal) = self.labels_tree.get(&key)?.and_then(|b| decode_ordinal(&b)) {
            return Ok(ordinal);
        }

        let ordinal = self.db.generate_id()?;
        let entry = bincode::serialize(&FacetLabel {
            dim: dim.to_string(),
            label: label.to_string(),
        })
        .map_err(|e| SearchError::TaxonomyError(format!("Failed to encode facet label: {}", e)))?;

        // A concurrent registration of the same label keeps the first ordinal
        match self
            .labels_tree
            .compare_and_swap(&key, None as Option<&[u8]>, Some(&ordinal.to_be_bytes()[..]))?
        {
            Ok(()) => {
                self.ordinals_tree.insert(ordinal.to_be_bytes(), entry)?;
                Ok(ordinal)
            }
            Err(conflict) => conflict
                .current
                .and_then(|b| decode_ordinal(&b))
                .ok_or_else(|| SearchError::TaxonomyError("Facet label vanished".to_string())),
        }
    }

    /// Resolve an ordinal back to its (dimension, label)
    pub fn label(&self, ordinal: u64) -> SearchResult<Option<(String, String)>> {
        match self.ordinals_tree.get(ordinal.to_be_bytes())? {
            Some(bytes) => {
                let entry: FacetLabel = bincode::deserialize(&bytes).map_err(|e| {
                    SearchError::TaxonomyError(format!("Failed to decode facet label: {}", e))
                })?;
                Ok(Some((entry.dim, entry.label)))
            }
            None => Ok(None),
        }
    }

    /// All labels registered under a dimension, in byte order
    pub fn labels(&self, dim: &str) -> SearchResult<Vec<String>> {
        let prefix = Self::dim_prefix(dim);
        let mut labels = Vec::new();
        for entry in self.labels_tree.scan_prefix(&prefix) {
            let (key, _) = entry?;
            labels.push(String::from_utf8_lossy(&key[prefix.len()..]).into_owned());
        }
        Ok(labels)
    }

    /// Number of registered labels
    pub fn len(&self) -> usize {
        self.labels_tree.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels_tree.is_empty()
    }

    /// Make registrations durable
    pub fn commit(&self) -> SearchResult<()> {
        self.db.flush()?;
        Ok(())
    }
}

fn decode_ordinal(bytes: &[u8]) -> Option<u64> {
    let array: [u8; 8] = bytes.try_into().ok()?;
    Some(u64::from_be_bytes(array))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_ordinals_are_stable() {
        let dir = TempDir::new().unwrap();
        let taxonomy = Taxonomy::open(dir.path()).unwrap();

        let bug = taxonomy.ordinal_or_insert("label", "bug").unwrap();
        let ui = taxonomy.ordinal_or_insert("label", "ui").unwrap();
        assert_ne!(bug, ui);
        assert_eq!(taxonomy.ordinal_or_insert("label", "bug").unwrap(), bug);
        assert_eq!(taxonomy.ordinal("label", "ui").unwrap(), Some(ui));
        assert_eq!(taxonomy.ordinal("label", "docs").unwrap(), None);
        assert_eq!(
            taxonomy.label(bug).unwrap(),
            Some(("label".to_string(), "bug".to_string()))
        );
    }

    #[test]
    fn test_labels_are_scoped_by_dimension() {
        let dir = TempDir::new().unwrap();
        let taxonomy = Taxonomy::open(dir.path()).unwrap();

        taxonomy.ordinal_or_insert("lang", "rust").unwrap();
        taxonomy.ordinal_or_insert("lang", "go").unwrap();
        taxonomy.ordinal_or_insert("license", "MIT").unwrap();
        taxonomy.commit().unwrap();

        assert_eq!(taxonomy.labels("lang").unwrap(), vec!["go", "rust"]);
        assert_eq!(taxonomy.labels("license").unwrap(), vec!["MIT"]);
        assert_eq!(taxonomy.len(), 3);
    }
}
