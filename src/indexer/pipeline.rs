//! Applies queued tasks to the per-type indexes

use crate::metrics::INDEX_METRICS;
use crate::models::{ObjectType, TaskAction};
use crate::queue::QueueTask;
use crate::search::{
    DocumentMapper, FacetWriter, IndexDocument, SearchError, SearchResult, StorageManager,
    WriterHandle,
};
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;

/// Resolves add/update/delete semantics and commits each task atomically
#[derive(Clone)]
pub struct IndexPipeline {
    storage: Arc<StorageManager>,
}

impl IndexPipeline {
    pub fn new(storage: Arc<StorageManager>) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> &Arc<StorageManager> {
        &self.storage
    }

    /// Apply one task; returns the number of documents affected.
    ///
    /// Blocks while another writer of the same type is outstanding. Either
    /// every mutation of the task is committed or none is.
    pub fn apply(&self, task: &QueueTask) -> SearchResult<usize> {
        let start = Instant::now();
        let ty = task.object_type;
        let objects = task
            .objects()
            .map_err(|e| SearchError::IndexingFailed(format!("Undecodable task body: {}", e)))?;

        let result = match task.action {
            TaskAction::Add => self.upsert(ty, &objects, false),
            TaskAction::Update => self.upsert(ty, &objects, true),
            TaskAction::Delete => self.delete(ty, &objects),
        };

        INDEX_METRICS
            .apply_duration
            .with_label_values(&[ty.as_str()])
            .observe(start.elapsed().as_secs_f64());

        let action = task.action.to_string();
        match &result {
            Ok(affected) => {
                INDEX_METRICS
                    .tasks_applied
                    .with_label_values(&[ty.as_str(), action.as_str()])
                    .inc();
                INDEX_METRICS
                    .documents_written
                    .with_label_values(&[ty.as_str(), action.as_str()])
                    .inc_by(*affected as u64);
                tracing::debug!(
                    object_type = %ty,
                    action = %task.action,
                    affected,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "Task applied"
                );
            }
            Err(e) => {
                INDEX_METRICS
                    .tasks_failed
                    .with_label_values(&[ty.as_str(), action.as_str()])
                    .inc();
                tracing::error!(
                    object_type = %ty,
                    action = %task.action,
                    error = %e,
                    "Task failed"
                );
            }
        }

        result
    }

    fn map_all(ty: ObjectType, objects: &[Value]) -> Vec<IndexDocument> {
        objects
            .iter()
            .filter_map(|object| {
                let doc = DocumentMapper::map(object, ty);
                if doc.is_none() {
                    tracing::warn!(object_type = %ty, "Skipping object that cannot be indexed");
                }
                doc
            })
            .collect()
    }

    /// Add documents; when `replace` is set, delete the previous version of
    /// each id first, within the same commit
    fn upsert(&self, ty: ObjectType, objects: &[Value], replace: bool) -> SearchResult<usize> {
        let documents = Self::map_all(ty, objects);
        if documents.is_empty() {
            return Ok(0);
        }

        let mut writer = self.storage.open_writer(ty)?;
        let facets = self.storage.open_facet_writer(ty)?;

        let staged = Self::stage_upsert(&mut writer, &facets, &documents, replace);
        Self::finish(&mut writer, Some(&facets), staged)?;
        Ok(documents.len())
    }

    fn stage_upsert(
        writer: &mut WriterHandle,
        facets: &FacetWriter,
        documents: &[IndexDocument],
        replace: bool,
    ) -> SearchResult<()> {
        for doc in documents {
            if replace {
                writer.delete_id(doc.id)?;
            }
            facets.register(doc)?;
            writer.add(doc)?;
        }
        Ok(())
    }

    fn delete(&self, ty: ObjectType, objects: &[Value]) -> SearchResult<usize> {
        let ids: Vec<i64> = objects.iter().filter_map(DocumentMapper::object_id).collect();
        if ids.is_empty() {
            return Ok(0);
        }

        let mut writer = self.storage.open_writer(ty)?;
        let staged = ids.iter().try_for_each(|id| writer.delete_id(*id));
        Self::finish(&mut writer, None, staged)?;
        Ok(ids.len())
    }

    /// Commit staged mutations, or roll them back when staging or commit failed
    fn finish(
        writer: &mut WriterHandle,
        facets: Option<&FacetWriter>,
        staged: SearchResult<()>,
    ) -> SearchResult<()> {
        let committed = staged
            .and_then(|_| match facets {
                Some(facets) => facets.commit(),
                None => Ok(()),
            })
            .and_then(|_| writer.commit().map(|_| ()));

        if let Err(e) = committed {
            if let Err(rollback_err) = writer.rollback() {
                tracing::error!(
                    object_type = %writer.object_type(),
                    error = %rollback_err,
                    "Rollback failed"
                );
            }
            return Err(e);
        }
        Ok(())
    }
}
