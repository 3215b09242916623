//! Search request building and per-type query construction

use crate::config::SearchConfig;
use crate::models::ObjectType;
use crate::search::document::{facet_dims, facet_field_name, field_defs, FieldKind};
use crate::search::error::SearchResult;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tantivy::query::{
    AllQuery, BooleanQuery, BoostQuery, ConstScoreQuery, Occur, Query, QueryParser, TermQuery,
};
use tantivy::schema::{Facet, Field, IndexRecordOption, Schema};
use tantivy::tokenizer::TokenStream;
use tantivy::{Index, Term};

/// Everything needed to run one search; built once per request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchRequest {
    pub object_type: ObjectType,

    /// Free text, or query-language text when `parse` is set
    pub search_key: String,

    /// Parse `search_key` as a structured query
    pub parse: bool,

    /// Accepted values per facet dimension
    pub facets: BTreeMap<String, BTreeSet<String>>,

    /// Named sort key; relevance when absent or unknown
    pub sort: Option<String>,

    /// 1-based page number
    pub page: usize,

    /// Page size; the configured default when absent
    pub page_size: Option<usize>,
}

/// Fluent construction of a [`SearchRequest`]
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    request: SearchRequest,
}

impl QueryBuilder {
    pub fn new(object_type: ObjectType) -> Self {
        Self {
            request: SearchRequest {
                object_type,
                search_key: String::new(),
                parse: false,
                facets: BTreeMap::new(),
                sort: None,
                page: 1,
                page_size: None,
            },
        }
    }

    pub fn with_search_key(mut self, key: impl Into<String>) -> Self {
        self.request.search_key = key.into();
        self
    }

    pub fn with_parse_as_query_language(mut self, parse: bool) -> Self {
        self.request.parse = parse;
        self
    }

    pub fn with_sort(mut self, sort: impl Into<String>) -> Self {
        let sort = sort.into();
        self.request.sort = if sort.trim().is_empty() {
            None
        } else {
            Some(sort.trim().to_lowercase())
        };
        self
    }

    /// Add an accepted value for a facet; blank values are ignored
    pub fn with_facet(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let value = value.into();
        let value = value.trim();
        if !value.is_empty() {
            self.request
                .facets
                .entry(name.into())
                .or_default()
                .insert(value.to_string());
        }
        self
    }

    pub fn with_page(mut self, page: usize) -> Self {
        self.request.page = page.max(1);
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.request.page_size = Some(page_size);
        self
    }

    pub fn build(self) -> SearchRequest {
        self.request
    }
}

/// A request translated into an engine query
#[derive(Debug)]
pub struct CompiledQuery {
    pub query: Box<dyn Query>,
    /// Fast field ordering the hits, descending
    pub sort_field: Option<&'static str>,
}

impl CompiledQuery {
    /// Textual form echoed in result pages and used in cache keys
    pub fn describe(&self) -> String {
        format!("{:?}", self.query)
    }
}

/// Per-type query construction; types override the parts that differ
pub trait TypedQuery: Send + Sync {
    fn object_type(&self) -> ObjectType;

    /// Boosted fields matched by free-text search
    fn default_boosts(&self) -> &'static [(&'static str, f32)];

    /// Fast field behind a named sort key
    fn sort_field(&self, key: &str) -> Option<&'static str> {
        match key {
            "created" | "create" => Some("created_at"),
            "updated" | "update" => Some("updated_at"),
            _ => None,
        }
    }

    /// Query over the search key alone, without facet filters
    fn key_query(
        &self,
        key: &str,
        boosts: &[(&'static str, f32)],
        index: &Index,
        schema: &Schema,
    ) -> SearchResult<Box<dyn Query>> {
        boosted_disjunction(self.object_type(), key, boosts, index, schema)
    }
}

/// Analyze `text` with the field's own tokenizer
fn analyzed_terms(index: &Index, field: Field, text: &str) -> SearchResult<Vec<Term>> {
    let mut analyzer = index.tokenizer_for_field(field)?;
    let mut stream = analyzer.token_stream(text);
    let mut terms = Vec::new();
    stream.process(&mut |token| terms.push(Term::from_field_text(field, &token.text)));
    Ok(terms)
}

/// Disjunction over the boosted fields; keyword fields match the whole key
/// exactly, text fields require every analyzed term
fn boosted_disjunction(
    ty: ObjectType,
    key: &str,
    boosts: &[(&'static str, f32)],
    index: &Index,
    schema: &Schema,
) -> SearchResult<Box<dyn Query>> {
    let mut clauses: Vec<(Occur, Box<dyn Query>)> = Vec::new();

    for (name, boost) in boosts {
        let Some(def) = field_defs(ty).iter().find(|d| d.name == *name) else {
            continue;
        };
        let Ok(field) = schema.get_field(name) else {
            continue;
        };

        let query: Box<dyn Query> = match def.kind {
            FieldKind::Keyword => Box::new(TermQuery::new(
                Term::from_field_text(field, key.trim()),
                IndexRecordOption::Basic,
            )),
            FieldKind::Text => {
                let terms = analyzed_terms(index, field, key)?;
                match terms.len() {
                    0 => continue,
                    1 => Box::new(TermQuery::new(
                        terms[0].clone(),
                        IndexRecordOption::WithFreqs,
                    )),
                    _ => Box::new(BooleanQuery::new(
                        terms
                            .into_iter()
                            .map(|t| {
                                let q: Box<dyn Query> =
                                    Box::new(TermQuery::new(t, IndexRecordOption::WithFreqs));
                                (Occur::Must, q)
                            })
                            .collect(),
                    )),
                }
            }
            _ => continue,
        };

        clauses.push((Occur::Should, Box::new(BoostQuery::new(query, *boost))));
    }

    Ok(Box::new(BooleanQuery::new(clauses)))
}

pub struct RepositoryQuery;

impl TypedQuery for RepositoryQuery {
    fn object_type(&self) -> ObjectType {
        ObjectType::Repository
    }

    fn default_boosts(&self) -> &'static [(&'static str, f32)] {
        &[
            ("ident", 100.0),
            ("name", 10.0),
            ("description", 1.0),
            ("topics", 1.0),
        ]
    }

    fn sort_field(&self, key: &str) -> Option<&'static str> {
        match key {
            "created" | "create" => Some("created_at"),
            "updated" | "update" => Some("updated_at"),
            "stars" => Some("stars"),
            "forks" => Some("forks"),
            "recomm" => Some("recomm"),
            _ => None,
        }
    }
}

pub struct IssueQuery;

/// Issue and pull request keys of the form `#42` also match the number exactly
fn numbered_key_query(
    ty: ObjectType,
    key: &str,
    boosts: &[(&'static str, f32)],
    index: &Index,
    schema: &Schema,
) -> SearchResult<Box<dyn Query>> {
    let text = boosted_disjunction(ty, key, boosts, index, schema)?;

    let number = key.trim().strip_prefix('#').and_then(|n| n.parse::<i64>().ok());
    match (number, schema.get_field("number")) {
        (Some(number), Ok(field)) => {
            let top = boosts.iter().map(|(_, b)| *b).fold(1.0_f32, f32::max);
            let exact: Box<dyn Query> = Box::new(BoostQuery::new(
                Box::new(TermQuery::new(
                    Term::from_field_i64(field, number),
                    IndexRecordOption::Basic,
                )),
                top,
            ));
            Ok(Box::new(BooleanQuery::new(vec![
                (Occur::Should, text),
                (Occur::Should, exact),
            ])))
        }
        _ => Ok(text),
    }
}

impl TypedQuery for IssueQuery {
    fn object_type(&self) -> ObjectType {
        ObjectType::Issue
    }

    fn default_boosts(&self) -> &'static [(&'static str, f32)] {
        &[
            ("ident", 100.0),
            ("title", 10.0),
            ("tags", 1.0),
            ("description", 1.0),
        ]
    }

    fn key_query(
        &self,
        key: &str,
        boosts: &[(&'static str, f32)],
        index: &Index,
        schema: &Schema,
    ) -> SearchResult<Box<dyn Query>> {
        numbered_key_query(ObjectType::Issue, key, boosts, index, schema)
    }
}

pub struct PullRequestQuery;

impl TypedQuery for PullRequestQuery {
    fn object_type(&self) -> ObjectType {
        ObjectType::PullRequest
    }

    fn default_boosts(&self) -> &'static [(&'static str, f32)] {
        &[
            ("ident", 100.0),
            ("title", 10.0),
            ("tags", 1.0),
            ("description", 1.0),
        ]
    }

    fn key_query(
        &self,
        key: &str,
        boosts: &[(&'static str, f32)],
        index: &Index,
        schema: &Schema,
    ) -> SearchResult<Box<dyn Query>> {
        numbered_key_query(ObjectType::PullRequest, key, boosts, index, schema)
    }
}

pub struct CodeQuery;

impl TypedQuery for CodeQuery {
    fn object_type(&self) -> ObjectType {
        ObjectType::Code
    }

    fn default_boosts(&self) -> &'static [(&'static str, f32)] {
        &[("name", 10.0), ("path", 5.0), ("contents", 1.0)]
    }
}

/// Per-type query construction with configured boosts
pub struct QueryPlanner {
    boosts: HashMap<ObjectType, Vec<(&'static str, f32)>>,
}

impl QueryPlanner {
    pub fn new(config: &SearchConfig) -> Self {
        let mut boosts = HashMap::new();

        for ty in ObjectType::ALL {
            let typed = Self::typed(ty);
            let mut weights: Vec<(&'static str, f32)> = typed.default_boosts().to_vec();

            if let Some(overrides) = config.boosts.get(ty.as_str()) {
                for (name, boost) in overrides {
                    let def = field_defs(ty).iter().find(|d| {
                        d.name == name.as_str() && matches!(d.kind, FieldKind::Text | FieldKind::Keyword)
                    });
                    match def {
                        Some(def) => match weights.iter_mut().find(|(n, _)| *n == def.name) {
                            Some(entry) => entry.1 = *boost,
                            None => weights.push((def.name, *boost)),
                        },
                        None => tracing::warn!(
                            object_type = %ty,
                            field = %name,
                            "Ignoring boost for unknown or non-text field"
                        ),
                    }
                }
            }

            boosts.insert(ty, weights);
        }

        Self { boosts }
    }

    /// Query behavior of a type
    pub fn typed(ty: ObjectType) -> Box<dyn TypedQuery> {
        match ty {
            ObjectType::Repository => Box::new(RepositoryQuery),
            ObjectType::Issue => Box::new(IssueQuery),
            ObjectType::PullRequest => Box::new(PullRequestQuery),
            ObjectType::Code => Box::new(CodeQuery),
        }
    }

    /// Effective field boosts of a type
    pub fn boosts(&self, ty: ObjectType) -> &[(&'static str, f32)] {
        self.boosts.get(&ty).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Translate a request against the index of its type
    pub fn compile(
        &self,
        request: &SearchRequest,
        index: &Index,
        schema: &Schema,
    ) -> SearchResult<CompiledQuery> {
        let ty = request.object_type;
        let typed = Self::typed(ty);
        let boosts = self.boosts(ty);
        let key = request.search_key.trim();

        let key_query: Box<dyn Query> = if key.is_empty() {
            Box::new(AllQuery)
        } else if request.parse {
            let fields: Vec<Field> = boosts
                .iter()
                .filter_map(|(name, _)| schema.get_field(name).ok())
                .collect();
            let mut parser = QueryParser::for_index(index, fields);
            parser.set_conjunction_by_default();
            for (name, boost) in boosts {
                if let Ok(field) = schema.get_field(name) {
                    parser.set_field_boost(field, *boost);
                }
            }
            parser.parse_query(key)?
        } else {
            typed.key_query(key, boosts, index, schema)?
        };

        let mut clauses: Vec<(Occur, Box<dyn Query>)> = vec![(Occur::Must, key_query)];
        for (dim, values) in &request.facets {
            if !facet_dims(ty).contains(&dim.as_str()) {
                tracing::debug!(object_type = %ty, facet = %dim, "Ignoring unknown facet");
                continue;
            }
            let Ok(field) = schema.get_field(&facet_field_name(dim)) else {
                continue;
            };
            let accepted: Vec<(Occur, Box<dyn Query>)> = values
                .iter()
                .filter(|v| !v.trim().is_empty())
                .map(|v| {
                    let facet = Facet::from_path([v.trim()]);
                    let q: Box<dyn Query> = Box::new(TermQuery::new(
                        Term::from_facet(field, &facet),
                        IndexRecordOption::Basic,
                    ));
                    (Occur::Should, q)
                })
                .collect();
            if accepted.is_empty() {
                continue;
            }
            clauses.push((
                Occur::Must,
                Box::new(ConstScoreQuery::new(Box::new(BooleanQuery::new(accepted)), 0.0)),
            ));
        }

        let query: Box<dyn Query> = if clauses.len() == 1 {
            clauses.remove(0).1
        } else {
            Box::new(BooleanQuery::new(clauses))
        };

        let sort_field = request
            .sort
            .as_deref()
            .and_then(|key| typed.sort_field(key))
            .filter(|name| {
                field_defs(ty)
                    .iter()
                    .any(|d| d.name == *name && d.kind == FieldKind::Long)
            });

        Ok(CompiledQuery { query, sort_field })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::document::build_schema;
    use crate::search::error::SearchError;

    fn planner_with(ty: &str, field: &str, boost: f32) -> QueryPlanner {
        let mut config = SearchConfig::default();
        config
            .boosts
            .entry(ty.to_string())
            .or_default()
            .insert(field.to_string(), boost);
        QueryPlanner::new(&config)
    }

    #[test]
    fn test_builder_ignores_blank_facets() {
        let request = QueryBuilder::new(ObjectType::Issue)
            .with_facet("label", "bug")
            .with_facet("label", "  ")
            .with_facet("state", "")
            .with_page(0)
            .with_sort(" Updated ")
            .build();

        assert_eq!(request.facets.len(), 1);
        assert_eq!(request.facets["label"].len(), 1);
        assert_eq!(request.page, 1);
        assert_eq!(request.sort.as_deref(), Some("updated"));
    }

    #[test]
    fn test_configured_boosts_override_defaults() {
        let planner = planner_with("issue", "title", 20.0);
        let boosts = planner.boosts(ObjectType::Issue);
        assert!(boosts.contains(&("title", 20.0)));
        assert!(boosts.contains(&("ident", 100.0)));

        let planner = planner_with("issue", "created_at", 5.0);
        assert!(!planner
            .boosts(ObjectType::Issue)
            .iter()
            .any(|(name, _)| *name == "created_at"));
    }

    #[test]
    fn test_sort_keys_per_type() {
        let schema = build_schema(ObjectType::Code);
        let index = Index::create_in_ram(schema.clone());
        let planner = QueryPlanner::new(&SearchConfig::default());

        let request = QueryBuilder::new(ObjectType::Code).with_sort("create").build();
        let compiled = planner.compile(&request, &index, &schema).unwrap();
        assert_eq!(compiled.sort_field, Some("created_at"));

        let request = QueryBuilder::new(ObjectType::Code).with_sort("size").build();
        let compiled = planner.compile(&request, &index, &schema).unwrap();
        assert_eq!(compiled.sort_field, None);

        let request = QueryBuilder::new(ObjectType::Code).with_sort("update").build();
        let compiled = planner.compile(&request, &index, &schema).unwrap();
        assert_eq!(compiled.sort_field, Some("updated_at"));

        assert_eq!(RepositoryQuery.sort_field("stars"), Some("stars"));
        assert_eq!(IssueQuery.sort_field("stars"), None);
    }

    #[test]
    fn test_malformed_query_language_is_rejected() {
        let schema = build_schema(ObjectType::Issue);
        let index = Index::create_in_ram(schema.clone());
        let planner = QueryPlanner::new(&SearchConfig::default());

        let request = QueryBuilder::new(ObjectType::Issue)
            .with_search_key("title:(login")
            .with_parse_as_query_language(true)
            .build();
        assert!(matches!(
            planner.compile(&request, &index, &schema),
            Err(SearchError::QueryParsingFailed(_))
        ));
    }

    #[test]
    fn test_empty_key_matches_all() {
        let schema = build_schema(ObjectType::Repository);
        let index = Index::create_in_ram(schema.clone());
        let planner = QueryPlanner::new(&SearchConfig::default());

        let request = QueryBuilder::new(ObjectType::Repository).build();
        let compiled = planner.compile(&request, &index, &schema).unwrap();
        assert!(compiled.describe().contains("AllQuery"));
    }
}
