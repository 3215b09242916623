//! Search execution over the per-type indexes

use crate::config::SearchConfig;
use crate::metrics::SEARCH_METRICS;
use crate::models::ObjectType;
use crate::search::cache::{CachedPage, QueryCache};
use crate::search::document::{facet_dims, facet_field_name, DocumentMapper, ID_FIELD};
use crate::search::error::{SearchError, SearchResult};
use crate::search::index::{ReaderHandle, StorageManager};
use crate::search::query::{CompiledQuery, QueryPlanner, SearchRequest};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tantivy::collector::{Count, FacetCollector, FacetCounts, MultiCollector, TopDocs};
use tantivy::schema::Facet;
use tantivy::{DocAddress, DocId, Score, SegmentReader, TantivyDocument};

/// Internal document id key added to every hit
pub const DOC_ID_KEY: &str = "_id_";

/// Relevance score key added to every hit
pub const SCORE_KEY: &str = "_score_";

/// Number of documents carrying one facet label
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacetCount {
    pub name: String,
    pub count: u64,
}

/// One page of ranked results
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultPage {
    #[serde(rename = "type")]
    pub object_type: ObjectType,

    pub total_hits: u64,

    pub total_pages: u64,

    pub page_index: usize,

    pub page_size: usize,

    /// Elapsed milliseconds
    pub time_used: u64,

    /// Textual form of the executed query
    pub query: String,

    pub objects: Vec<Map<String, Value>>,

    pub facets: BTreeMap<String, Vec<FacetCount>>,

    /// Resumes after the last hit of this page
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
}

/// Total order of hits: sort value, then score, then lowest id first
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankKey {
    pub sort_value: i64,
    pub score: Score,
    pub id: i64,
}

impl PartialOrd for RankKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(
            self.sort_value
                .cmp(&other.sort_value)
                .then_with(|| self.score.total_cmp(&other.score))
                .then_with(|| other.id.cmp(&self.id)),
        )
    }
}

impl RankKey {
    /// Opaque cursor string
    pub fn encode(&self) -> String {
        format!("{}.{:08x}.{}", self.sort_value, self.score.to_bits(), self.id)
    }

    pub fn decode(cursor: &str) -> SearchResult<Self> {
        let invalid = || SearchError::InvalidCursor(cursor.to_string());
        let mut parts = cursor.trim().split('.');
        let sort_value = parts
            .next()
            .and_then(|p| p.parse::<i64>().ok())
            .ok_or_else(invalid)?;
        let score = parts
            .next()
            .and_then(|p| u32::from_str_radix(p, 16).ok())
            .map(f32::from_bits)
            .ok_or_else(invalid)?;
        let id = parts
            .next()
            .and_then(|p| p.parse::<i64>().ok())
            .ok_or_else(invalid)?;
        if parts.next().is_some() {
            return Err(invalid());
        }
        Ok(Self {
            sort_value,
            score,
            id,
        })
    }
}

#[derive(Debug, Clone, Copy)]
enum Pagination {
    Offset { page: usize },
    After { cursor: Option<RankKey> },
}

/// Runs queries against snapshot readers with a shared result cache
#[derive(Clone)]
pub struct SearchExecutor {
    storage: Arc<StorageManager>,
    planner: Arc<QueryPlanner>,
    cache: QueryCache,
    config: Arc<SearchConfig>,
}

impl SearchExecutor {
    pub fn new(storage: Arc<StorageManager>, config: &SearchConfig) -> Self {
        Self {
            storage,
            planner: Arc::new(QueryPlanner::new(config)),
            cache: QueryCache::new(config),
            config: Arc::new(config.clone()),
        }
    }

    pub fn storage(&self) -> &Arc<StorageManager> {
        &self.storage
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    /// Offset pagination within the configured result window
    pub async fn search(&self, request: SearchRequest) -> SearchResult<ResultPage> {
        let executor = self.clone();
        tokio::task::spawn_blocking(move || executor.search_blocking(&request))
            .await
            .map_err(|e| SearchError::SearchFailed(format!("Search task failed: {}", e)))?
    }

    /// Cursor pagination; a missing cursor starts from the first hit
    pub async fn search_after(
        &self,
        request: SearchRequest,
        cursor: Option<String>,
    ) -> SearchResult<ResultPage> {
        let executor = self.clone();
        tokio::task::spawn_blocking(move || {
            executor.search_after_blocking(&request, cursor.as_deref())
        })
        .await
        .map_err(|e| SearchError::SearchFailed(format!("Search task failed: {}", e)))?
    }

    pub fn search_blocking(&self, request: &SearchRequest) -> SearchResult<ResultPage> {
        self.execute(request, Pagination::Offset { page: request.page.max(1) })
    }

    pub fn search_after_blocking(
        &self,
        request: &SearchRequest,
        cursor: Option<&str>,
    ) -> SearchResult<ResultPage> {
        let cursor = match cursor.map(str::trim) {
            Some(c) if !c.is_empty() => Some(RankKey::decode(c)?),
            _ => None,
        };
        self.execute(request, Pagination::After { cursor })
    }

    /// Every label registered for the facet dimensions of a type
    pub fn facet_labels(&self, ty: ObjectType) -> SearchResult<BTreeMap<String, Vec<String>>> {
        let reader = self.storage.open_facet_reader(ty)?;
        let mut labels = BTreeMap::new();
        for dim in facet_dims(ty) {
            labels.insert(dim.to_string(), reader.labels(dim)?);
        }
        Ok(labels)
    }

    fn page_size(&self, request: &SearchRequest) -> usize {
        request
            .page_size
            .unwrap_or(self.config.default_page_size)
            .clamp(1, self.config.max_page_size.max(1))
    }

    fn execute(&self, request: &SearchRequest, pagination: Pagination) -> SearchResult<ResultPage> {
        let start = Instant::now();
        let ty = request.object_type;
        let page_size = self.page_size(request);

        let (page_index, offset, limit, after, mode) = match pagination {
            Pagination::Offset { page } => {
                let window = self.config.max_result_window;
                let offset = (page - 1).saturating_mul(page_size);
                if offset >= window {
                    return Err(SearchError::WindowExceeded {
                        offset,
                        limit: window,
                    });
                }
                (page, offset, page_size.min(window - offset), None, "offset")
            }
            Pagination::After { cursor } => (request.page.max(1), 0, page_size, cursor, "after"),
        };

        let reader = self.storage.open_reader(ty)?;
        let compiled = self
            .planner
            .compile(request, reader.index(), reader.schema())?;
        let described = compiled.describe();

        let key = format!(
            "{}|{}|{:?}|{}|{}|{}|{}",
            ty,
            described,
            compiled.sort_field,
            offset,
            limit,
            after.map(|c| c.encode()).unwrap_or_default(),
            reader.searcher().generation().generation_id()
        );

        let page = match self.cache.get(&key) {
            Some(page) => page,
            None => {
                let page = Arc::new(Self::collect(&reader, &compiled, offset, limit, after)?);
                self.cache.put(key, page.clone());
                page
            }
        };

        let total_pages = page.total_hits.div_ceil(page_size as u64);
        let elapsed = start.elapsed();

        SEARCH_METRICS
            .searches
            .with_label_values(&[ty.as_str(), mode])
            .inc();
        SEARCH_METRICS
            .latency
            .with_label_values(&[ty.as_str()])
            .observe(elapsed.as_secs_f64());

        tracing::debug!(
            object_type = %ty,
            total_hits = page.total_hits,
            elapsed_ms = elapsed.as_millis() as u64,
            "Search executed"
        );

        Ok(ResultPage {
            object_type: ty,
            total_hits: page.total_hits,
            total_pages,
            page_index,
            page_size,
            time_used: elapsed.as_millis() as u64,
            query: described,
            objects: page.objects.clone(),
            facets: page.facets.clone(),
            cursor: page.cursor.clone(),
        })
    }

    fn collect(
        reader: &ReaderHandle,
        compiled: &CompiledQuery,
        offset: usize,
        limit: usize,
        after: Option<RankKey>,
    ) -> SearchResult<CachedPage> {
        let ty = reader.object_type();
        let schema = reader.schema();
        let searcher = reader.searcher();
        let sort_field = compiled.sort_field;

        let top_docs = TopDocs::with_limit(limit)
            .and_offset(offset)
            .tweak_score(move |segment_reader: &SegmentReader| {
                let fast_fields = segment_reader.fast_fields();
                let ids = fast_fields.i64(ID_FIELD).ok();
                let sort_column = sort_field.and_then(|name| fast_fields.i64(name).ok());

                move |doc: DocId, score: Score| {
                    let sort_value = match (&sort_column, sort_field) {
                        (Some(column), _) => column.first(doc).unwrap_or(i64::MIN),
                        (None, Some(_)) => i64::MIN,
                        (None, None) => 0,
                    };
                    let key = RankKey {
                        sort_value,
                        score,
                        id: ids.as_ref().and_then(|c| c.first(doc)).unwrap_or(0),
                    };
                    match after {
                        Some(cursor) if key.partial_cmp(&cursor) != Some(Ordering::Less) => None,
                        _ => Some(key),
                    }
                }
            });

        let mut collectors = MultiCollector::new();
        let count_handle = collectors.add_collector(Count);
        let top_handle = collectors.add_collector(top_docs);
        let mut facet_handles = Vec::new();
        for dim in facet_dims(ty) {
            let field_name = facet_field_name(dim);
            if schema.get_field(&field_name).is_err() {
                continue;
            }
            let mut facet_collector = FacetCollector::for_field(field_name);
            facet_collector.add_facet(Facet::root());
            facet_handles.push((dim.to_string(), collectors.add_collector(facet_collector)));
        }

        let mut fruits = searcher.search(&*compiled.query, &collectors)?;
        let total_hits = count_handle.extract(&mut fruits) as u64;
        let top: Vec<(Option<RankKey>, DocAddress)> = top_handle.extract(&mut fruits);

        let mut facets = BTreeMap::new();
        for (dim, handle) in facet_handles {
            let counts: FacetCounts = handle.extract(&mut fruits);
            facets.insert(dim, facet_counts(&counts));
        }

        let mut objects = Vec::with_capacity(top.len());
        let mut last_key = None;
        for (key, address) in top {
            let Some(key) = key else {
                continue;
            };
            let doc: TantivyDocument = searcher.doc(address)?;
            let mut fields = DocumentMapper::to_result_fields(&doc, ty, schema);
            fields.insert(DOC_ID_KEY.to_string(), Value::from(internal_doc_id(address)));
            fields.insert(SCORE_KEY.to_string(), Value::from(key.score));
            objects.push(fields);
            last_key = Some(key);
        }

        Ok(CachedPage {
            total_hits,
            objects,
            facets,
            cursor: last_key.map(|k| k.encode()),
        })
    }
}

/// Segment ordinal in the high half, segment-local doc id in the low half
fn internal_doc_id(address: DocAddress) -> u64 {
    ((address.segment_ord as u64) << 32) | address.doc_id as u64
}

fn facet_counts(counts: &FacetCounts) -> Vec<FacetCount> {
    let mut result: Vec<FacetCount> = counts
        .get("/")
        .filter_map(|(facet, count)| {
            facet.to_path().last().map(|label| FacetCount {
                name: label.to_string(),
                count,
            })
        })
        .collect();
    result.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.name.cmp(&b.name)));
    result
}
