//! Per-type index storage
//!
//! Every object type owns a tantivy index under `{root}/{type}/index` and a
//! facet taxonomy under `{root}/{type}/taxonomy`. Both are opened lazily on
//! first use. The writer of a type is exclusive: `open_writer` blocks while
//! another handle for the same type is outstanding. Readers are snapshots
//! and never wait on writers.

use crate::config::StorageConfig;
use crate::models::ObjectType;
use crate::search::document::{build_schema, id_term, IndexDocument};
use crate::search::error::{SearchError, SearchResult};
use crate::search::taxonomy::Taxonomy;
use parking_lot::lock_api::ArcMutexGuard;
use parking_lot::{Mutex, RawMutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tantivy::directory::MmapDirectory;
use tantivy::indexer::NoMergePolicy;
use tantivy::schema::Schema;
use tantivy::{Index, IndexReader, IndexWriter, ReloadPolicy, Searcher};

/// Index statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexStats {
    #[serde(rename = "type")]
    pub object_type: ObjectType,

    /// Live documents visible to readers
    pub total_documents: u64,

    /// Number of segments
    pub num_segments: usize,

    /// Registered facet labels
    pub facet_labels: usize,
}

/// Open resources of one object type
struct TypeStore {
    object_type: ObjectType,
    index: Index,
    schema: Schema,
    reader: IndexReader,
    writer: Arc<Mutex<Option<IndexWriter>>>,
    taxonomy: Taxonomy,
    /// Set by `reset`; handles of a retired store must not be reused
    retired: AtomicBool,
}

/// Owns the index resources of every object type
pub struct StorageManager {
    root: PathBuf,
    writer_heap_size: usize,
    search_threads: usize,
    stores: RwLock<HashMap<ObjectType, Arc<TypeStore>>>,
}

impl StorageManager {
    /// Create a manager over an existing, readable storage root
    pub fn new(config: &StorageConfig) -> SearchResult<Self> {
        Self::validate_root(&config.path)?;

        tracing::info!(
            path = %config.path.display(),
            search_threads = config.search_threads,
            "Storage manager initialized"
        );

        Ok(Self {
            root: config.path.clone(),
            writer_heap_size: config.writer_heap_size,
            search_threads: config.search_threads.max(1),
            stores: RwLock::new(HashMap::new()),
        })
    }

    fn validate_root(root: &Path) -> SearchResult<()> {
        if !root.exists() {
            return Err(SearchError::InvalidConfiguration(format!(
                "storage path {} does not exist",
                root.display()
            )));
        }
        if !root.is_dir() {
            return Err(SearchError::InvalidConfiguration(format!(
                "storage path {} is not a directory",
                root.display()
            )));
        }
        std::fs::read_dir(root).map_err(|e| {
            SearchError::InvalidConfiguration(format!(
                "storage path {} is not readable: {}",
                root.display(),
                e
            ))
        })?;
        Ok(())
    }

    /// Storage root
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn type_dir(&self, ty: ObjectType) -> PathBuf {
        self.root.join(ty.as_str())
    }

    fn store(&self, ty: ObjectType) -> SearchResult<Arc<TypeStore>> {
        if let Some(store) = self.stores.read().get(&ty) {
            return Ok(store.clone());
        }

        let mut stores = self.stores.write();
        if let Some(store) = stores.get(&ty) {
            return Ok(store.clone());
        }
        let store = Arc::new(self.open_store(ty)?);
        stores.insert(ty, store.clone());
        Ok(store)
    }

    fn open_store(&self, ty: ObjectType) -> SearchResult<TypeStore> {
        let dir = self.type_dir(ty);
        let index_dir = dir.join("index");
        std::fs::create_dir_all(&index_dir).map_err(|e| {
            SearchError::IndexInitFailed(format!("Failed to create index directory: {}", e))
        })?;

        let schema = build_schema(ty);
        let directory = MmapDirectory::open(&index_dir)?;
        let mut index = Index::open_or_create(directory, schema.clone()).map_err(|e| {
            SearchError::IndexInitFailed(format!("Failed to open {} index: {}", ty, e))
        })?;
        index.set_multithread_executor(self.search_threads)?;

        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::OnCommitWithDelay)
            .try_into()
            .map_err(|e| SearchError::IndexInitFailed(format!("Failed to create reader: {}", e)))?;

        let taxonomy = Taxonomy::open(dir.join("taxonomy"))?;

        tracing::debug!(object_type = %ty, path = %dir.display(), "Opened type index");

        Ok(TypeStore {
            object_type: ty,
            index,
            schema,
            reader,
            writer: Arc::new(Mutex::new(None)),
            taxonomy,
            retired: AtomicBool::new(false),
        })
    }

    /// Exclusive writer of a type; blocks while another handle is outstanding
    pub fn open_writer(&self, ty: ObjectType) -> SearchResult<WriterHandle> {
        loop {
            let store = self.store(ty)?;
            let mut guard = store.writer.lock_arc();
            if store.retired.load(Ordering::Acquire) {
                continue;
            }
            if guard.is_none() {
                let writer: IndexWriter = store.index.writer(self.writer_heap_size)?;
                *guard = Some(writer);
            }
            return Ok(WriterHandle { store, guard });
        }
    }

    /// Point-in-time reader of a type
    pub fn open_reader(&self, ty: ObjectType) -> SearchResult<ReaderHandle> {
        let store = self.store(ty)?;
        Ok(ReaderHandle {
            searcher: store.reader.searcher(),
            store,
        })
    }

    /// Label registry used while writing documents
    pub fn open_facet_writer(&self, ty: ObjectType) -> SearchResult<FacetWriter> {
        let store = self.store(ty)?;
        Ok(FacetWriter {
            taxonomy: store.taxonomy.clone(),
        })
    }

    /// Read-only view over the label registry
    pub fn open_facet_reader(&self, ty: ObjectType) -> SearchResult<FacetReader> {
        let store = self.store(ty)?;
        Ok(FacetReader {
            taxonomy: store.taxonomy.clone(),
        })
    }

    /// Document and segment counts of a type
    pub fn stats(&self, ty: ObjectType) -> SearchResult<IndexStats> {
        let reader = self.open_reader(ty)?;
        Ok(IndexStats {
            object_type: ty,
            total_documents: reader.searcher.num_docs(),
            num_segments: reader.searcher.segment_readers().len(),
            facet_labels: reader.store.taxonomy.len(),
        })
    }

    /// Merge every segment of a type into one
    ///
    /// Holds the exclusive writer for the whole merge, so indexing of the type
    /// waits until it completes.
    pub fn optimize(&self, ty: ObjectType) -> SearchResult<IndexStats> {
        let WriterHandle { store, mut guard } = self.open_writer(ty)?;

        // Let background merges settle so every segment is free to merge
        if let Some(writer) = guard.take() {
            writer.wait_merging_threads()?;
        }

        let mut writer: IndexWriter = store.index.writer(self.writer_heap_size)?;
        writer.set_merge_policy(Box::new(NoMergePolicy));
        let segment_ids = store.index.searchable_segment_ids()?;
        let merged = segment_ids.len();
        if merged > 1 {
            writer.merge(&segment_ids).wait()?;
        }
        writer.wait_merging_threads()?;

        *guard = Some(store.index.writer(self.writer_heap_size)?);
        store.reader.reload()?;
        drop(guard);

        tracing::info!(object_type = %ty, segments = merged, "Index optimized");
        self.stats(ty)
    }

    /// Wipe all on-disk state of a type; waits for the current writer to be released
    pub fn reset(&self, ty: ObjectType) -> SearchResult<()> {
        let store = self.store(ty)?;
        let mut guard = store.writer.lock();
        store.retired.store(true, Ordering::Release);
        if let Some(writer) = guard.take() {
            writer.wait_merging_threads()?;
        }

        let mut stores = self.stores.write();
        stores.remove(&ty);
        let dir = self.type_dir(ty);
        if dir.exists() {
            std::fs::remove_dir_all(&dir)?;
        }
        let fresh = Arc::new(self.open_store(ty)?);
        stores.insert(ty, fresh);

        tracing::warn!(object_type = %ty, "Index storage reset");
        Ok(())
    }
}

/// Exclusive write access to one type index
pub struct WriterHandle {
    store: Arc<TypeStore>,
    guard: ArcMutexGuard<RawMutex, Option<IndexWriter>>,
}

impl WriterHandle {
    pub fn object_type(&self) -> ObjectType {
        self.store.object_type
    }

    pub fn schema(&self) -> &Schema {
        &self.store.schema
    }

    fn writer(&mut self) -> SearchResult<&mut IndexWriter> {
        self.guard
            .as_mut()
            .ok_or_else(|| SearchError::IndexingFailed("Index writer is closed".to_string()))
    }

    /// Queue a document for the next commit
    pub fn add(&mut self, document: &IndexDocument) -> SearchResult<()> {
        let doc = document.to_tantivy(&self.store.schema);
        self.writer()?
            .add_document(doc)
            .map_err(|e| SearchError::IndexingFailed(format!("Failed to add document {}: {}", document.id, e)))?;
        Ok(())
    }

    /// Queue deletion of every document carrying this identifier
    pub fn delete_id(&mut self, id: i64) -> SearchResult<()> {
        let term = id_term(&self.store.schema, id)
            .ok_or_else(|| SearchError::IndexingFailed("Schema has no id field".to_string()))?;
        self.writer()?.delete_term(term);
        Ok(())
    }

    /// Durably apply all queued mutations and refresh the shared reader
    pub fn commit(&mut self) -> SearchResult<u64> {
        let opstamp = self.writer()?.commit()?;
        self.store.reader.reload()?;
        Ok(opstamp)
    }

    /// Discard all mutations queued since the last commit
    pub fn rollback(&mut self) -> SearchResult<()> {
        let result = self.writer()?.rollback();
        if let Err(e) = result {
            // The writer is unusable; a fresh one is opened on next use
            self.guard.take();
            return Err(e.into());
        }
        Ok(())
    }
}

/// Snapshot view over one type index
pub struct ReaderHandle {
    store: Arc<TypeStore>,
    searcher: Searcher,
}

impl ReaderHandle {
    pub fn object_type(&self) -> ObjectType {
        self.store.object_type
    }

    pub fn searcher(&self) -> &Searcher {
        &self.searcher
    }

    pub fn schema(&self) -> &Schema {
        &self.store.schema
    }

    pub fn index(&self) -> &Index {
        &self.store.index
    }
}

/// Registers facet labels of documents being written
pub struct FacetWriter {
    taxonomy: Taxonomy,
}

impl FacetWriter {
    /// Register every facet of a document
    pub fn register(&self, document: &IndexDocument) -> SearchResult<()> {
        for (dim, label) in &document.facets {
            self.taxonomy.ordinal_or_insert(dim, label)?;
        }
        Ok(())
    }

    pub fn commit(&self) -> SearchResult<()> {
        self.taxonomy.commit()
    }
}

/// Lists facet labels of a type
pub struct FacetReader {
    taxonomy: Taxonomy,
}

impl FacetReader {
    pub fn labels(&self, dim: &str) -> SearchResult<Vec<String>> {
        self.taxonomy.labels(dim)
    }

    pub fn ordinal(&self, dim: &str, label: &str) -> SearchResult<Option<u64>> {
        self.taxonomy.ordinal(dim, label)
    }
}
