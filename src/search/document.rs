//! Mapping between domain objects and index documents
//!
//! Each object type has a static field table. The same table drives schema
//! creation, document building and the inverse mapping used when a result
//! page is assembled, so a result carries exactly the fields that were stored.

use crate::models::{CodeFile, Issue, ObjectType, PullRequest, Repository};
use serde_json::{Map, Value as JsonValue};
use tantivy::schema::{
    Facet, FacetOptions, Schema, SchemaBuilder, Value, FAST, INDEXED, STORED, STRING, TEXT,
};
use tantivy::{TantivyDocument, Term};

/// Name of the unique identifier field of every type
pub const ID_FIELD: &str = "id";

/// How a field is indexed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Unique numeric identifier; exact match, fast field
    Id,
    /// Analyzed full text
    Text,
    /// Single untokenized term
    Keyword,
    /// Numeric, sortable
    Long,
    Bool,
}

/// One entry of a type's field table
#[derive(Debug, Clone, Copy)]
pub struct FieldDef {
    pub name: &'static str,
    pub kind: FieldKind,
    pub multi: bool,
}

const fn field(name: &'static str, kind: FieldKind) -> FieldDef {
    FieldDef {
        name,
        kind,
        multi: false,
    }
}

const fn multi(name: &'static str, kind: FieldKind) -> FieldDef {
    FieldDef {
        name,
        kind,
        multi: true,
    }
}

use FieldKind::{Bool, Id, Keyword, Long, Text};

const REPO_FIELDS: &[FieldDef] = &[
    field(ID_FIELD, Id),
    field("ident", Keyword),
    field("name", Text),
    field("owner", Text),
    field("description", Text),
    field("url", Keyword),
    field("language", Keyword),
    field("license", Keyword),
    multi("topics", Text),
    field("stars", Long),
    field("forks", Long),
    field("recomm", Long),
    field("fork", Bool),
    field("visibility", Keyword),
    field("created_at", Long),
    field("updated_at", Long),
];

const ISSUE_FIELDS: &[FieldDef] = &[
    field(ID_FIELD, Id),
    field("ident", Keyword),
    field("repo_id", Long),
    field("repo_name", Keyword),
    field("number", Long),
    field("title", Text),
    field("description", Text),
    multi("tags", Text),
    field("state", Keyword),
    field("author", Keyword),
    field("created_at", Long),
    field("updated_at", Long),
];

const PR_FIELDS: &[FieldDef] = &[
    field(ID_FIELD, Id),
    field("ident", Keyword),
    field("repo_id", Long),
    field("repo_name", Keyword),
    field("number", Long),
    field("title", Text),
    field("description", Text),
    multi("tags", Text),
    field("state", Keyword),
    field("author", Keyword),
    field("source_branch", Keyword),
    field("target_branch", Keyword),
    field("created_at", Long),
    field("updated_at", Long),
];

const CODE_FIELDS: &[FieldDef] = &[
    field(ID_FIELD, Id),
    field("repo_id", Long),
    field("repo_name", Keyword),
    field("path", Text),
    field("name", Text),
    field("language", Keyword),
    field("contents", Text),
    field("revision", Keyword),
    field("created_at", Long),
    field("updated_at", Long),
];

/// Field table of a type
pub fn field_defs(ty: ObjectType) -> &'static [FieldDef] {
    match ty {
        ObjectType::Repository => REPO_FIELDS,
        ObjectType::Issue => ISSUE_FIELDS,
        ObjectType::PullRequest => PR_FIELDS,
        ObjectType::Code => CODE_FIELDS,
    }
}

/// Facet dimensions of a type
pub fn facet_dims(ty: ObjectType) -> &'static [&'static str] {
    match ty {
        ObjectType::Repository => &["lang", "license"],
        ObjectType::Issue | ObjectType::PullRequest => &["label", "state"],
        ObjectType::Code => &["lang", "repo"],
    }
}

/// Index field holding the facet values of one dimension
pub fn facet_field_name(dim: &str) -> String {
    format!("facet_{}", dim)
}

/// Build the schema of a type from its field table
pub fn build_schema(ty: ObjectType) -> Schema {
    let mut builder = SchemaBuilder::new();

    for def in field_defs(ty) {
        match def.kind {
            FieldKind::Id => {
                builder.add_i64_field(def.name, INDEXED | STORED | FAST);
            }
            FieldKind::Text => {
                builder.add_text_field(def.name, TEXT | STORED);
            }
            FieldKind::Keyword => {
                builder.add_text_field(def.name, STRING | STORED);
            }
            FieldKind::Long => {
                builder.add_i64_field(def.name, INDEXED | STORED | FAST);
            }
            FieldKind::Bool => {
                builder.add_bool_field(def.name, INDEXED | STORED);
            }
        }
    }

    for dim in facet_dims(ty) {
        builder.add_facet_field(&facet_field_name(dim), FacetOptions::default());
    }

    builder.build()
}

/// A typed field value
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Long(i64),
    Str(String),
    Bool(bool),
}

/// The indexed representation of one domain object
#[derive(Debug, Clone, PartialEq)]
pub struct IndexDocument {
    pub object_type: ObjectType,
    pub id: i64,
    pub fields: Vec<(&'static str, FieldValue)>,
    /// (dimension, label) pairs
    pub facets: Vec<(&'static str, String)>,
}

impl IndexDocument {
    fn new(object_type: ObjectType, id: i64) -> Self {
        Self {
            object_type,
            id,
            fields: vec![(ID_FIELD, FieldValue::Long(id))],
            facets: Vec::new(),
        }
    }

    fn text(&mut self, name: &'static str, value: &str) {
        if !value.is_empty() {
            self.fields.push((name, FieldValue::Str(value.to_string())));
        }
    }

    fn long(&mut self, name: &'static str, value: i64) {
        self.fields.push((name, FieldValue::Long(value)));
    }

    fn flag(&mut self, name: &'static str, value: bool) {
        self.fields.push((name, FieldValue::Bool(value)));
    }

    fn facet(&mut self, dim: &'static str, label: &str) {
        let label = label.trim();
        if !label.is_empty() {
            self.facets.push((dim, label.to_string()));
        }
    }

    /// Convert to a tantivy document of the given schema
    pub fn to_tantivy(&self, schema: &Schema) -> TantivyDocument {
        let mut doc = TantivyDocument::new();

        for (name, value) in &self.fields {
            let Ok(field) = schema.get_field(name) else {
                continue;
            };
            match value {
                FieldValue::Long(v) => doc.add_i64(field, *v),
                FieldValue::Str(v) => doc.add_text(field, v),
                FieldValue::Bool(v) => doc.add_bool(field, *v),
            }
        }

        for (dim, label) in &self.facets {
            if let Ok(field) = schema.get_field(&facet_field_name(dim)) {
                doc.add_facet(field, Facet::from_path([label.as_str()]));
            }
        }

        doc
    }
}

/// Term matching the identifier of one document
pub fn id_term(schema: &Schema, id: i64) -> Option<Term> {
    schema
        .get_field(ID_FIELD)
        .ok()
        .map(|field| Term::from_field_i64(field, id))
}

/// Stateless mapper between domain objects and documents
pub struct DocumentMapper;

impl DocumentMapper {
    /// Map a serialized domain object; `None` when it cannot be indexed
    pub fn map(object: &JsonValue, ty: ObjectType) -> Option<IndexDocument> {
        match ty {
            ObjectType::Repository => {
                let repo: Repository = serde_json::from_value(object.clone()).ok()?;
                Self::map_repository(&repo)
            }
            ObjectType::Issue => {
                let issue: Issue = serde_json::from_value(object.clone()).ok()?;
                Self::map_issue(&issue)
            }
            ObjectType::PullRequest => {
                let pr: PullRequest = serde_json::from_value(object.clone()).ok()?;
                Self::map_pull_request(&pr)
            }
            ObjectType::Code => {
                let code: CodeFile = serde_json::from_value(object.clone()).ok()?;
                Self::map_code(&code)
            }
        }
    }

    /// Extract only the identifier of a serialized object
    pub fn object_id(object: &JsonValue) -> Option<i64> {
        object.get(ID_FIELD).and_then(JsonValue::as_i64)
    }

    pub fn map_repository(repo: &Repository) -> Option<IndexDocument> {
        let mut doc = IndexDocument::new(ObjectType::Repository, repo.id?);
        if let Some(ident) = repo.ident() {
            doc.text("ident", &ident);
        }
        doc.text("name", &repo.name);
        doc.text("owner", &repo.owner);
        doc.text("description", &repo.description);
        doc.text("url", &repo.url);
        doc.text("language", &repo.language);
        doc.text("license", &repo.license);
        for topic in &repo.topics {
            doc.text("topics", topic);
        }
        doc.long("stars", repo.stars);
        doc.long("forks", repo.forks);
        doc.long("recomm", repo.recomm);
        doc.flag("fork", repo.fork);
        doc.text("visibility", &repo.visibility);
        doc.long("created_at", repo.created_at);
        doc.long("updated_at", repo.updated_at);

        doc.facet("lang", &repo.language);
        doc.facet("license", &repo.license);
        Some(doc)
    }

    pub fn map_issue(issue: &Issue) -> Option<IndexDocument> {
        let mut doc = IndexDocument::new(ObjectType::Issue, issue.id?);
        if let Some(ident) = issue.ident() {
            doc.text("ident", &ident);
        }
        doc.long("repo_id", issue.repository.id);
        doc.text("repo_name", &issue.repository.name);
        doc.long("number", issue.number);
        doc.text("title", &issue.title);
        doc.text("description", &issue.description);
        for tag in &issue.tags {
            doc.text("tags", tag);
            doc.facet("label", tag);
        }
        doc.text("state", &issue.state);
        doc.text("author", &issue.author);
        doc.long("created_at", issue.created_at);
        doc.long("updated_at", issue.updated_at);

        doc.facet("state", &issue.state);
        Some(doc)
    }

    pub fn map_pull_request(pr: &PullRequest) -> Option<IndexDocument> {
        let mut doc = IndexDocument::new(ObjectType::PullRequest, pr.id?);
        if let Some(ident) = pr.ident() {
            doc.text("ident", &ident);
        }
        doc.long("repo_id", pr.repository.id);
        doc.text("repo_name", &pr.repository.name);
        doc.long("number", pr.number);
        doc.text("title", &pr.title);
        doc.text("description", &pr.description);
        for tag in &pr.tags {
            doc.text("tags", tag);
            doc.facet("label", tag);
        }
        doc.text("state", &pr.state);
        doc.text("author", &pr.author);
        doc.text("source_branch", &pr.source_branch);
        doc.text("target_branch", &pr.target_branch);
        doc.long("created_at", pr.created_at);
        doc.long("updated_at", pr.updated_at);

        doc.facet("state", &pr.state);
        Some(doc)
    }

    pub fn map_code(code: &CodeFile) -> Option<IndexDocument> {
        let mut doc = IndexDocument::new(ObjectType::Code, code.id?);
        doc.long("repo_id", code.repository.id);
        doc.text("repo_name", &code.repository.name);
        doc.text("path", &code.path);
        doc.text("name", code.file_name());
        doc.text("language", &code.language);
        doc.text("contents", &code.contents);
        doc.text("revision", &code.revision);
        doc.long("created_at", code.created_at);
        doc.long("updated_at", code.updated_at);

        doc.facet("lang", &code.language);
        doc.facet("repo", &code.repository.name);
        Some(doc)
    }

    /// Stored fields of a hit as a JSON object, following the type's field table
    pub fn to_result_fields(
        doc: &TantivyDocument,
        ty: ObjectType,
        schema: &Schema,
    ) -> Map<String, JsonValue> {
        let mut fields = Map::new();

        for def in field_defs(ty) {
            let Ok(field) = schema.get_field(def.name) else {
                continue;
            };
            if def.multi {
                let values: Vec<JsonValue> = doc
                    .get_all(field)
                    .filter_map(|v| read_value(v, def.kind))
                    .collect();
                if !values.is_empty() {
                    fields.insert(def.name.to_string(), JsonValue::Array(values));
                }
            } else if let Some(value) = doc.get_first(field).and_then(|v| read_value(v, def.kind)) {
                fields.insert(def.name.to_string(), value);
            }
        }

        fields
    }
}

fn read_value<'a, V: Value<'a>>(value: V, kind: FieldKind) -> Option<JsonValue> {
    match kind {
        FieldKind::Id | FieldKind::Long => value.as_i64().map(JsonValue::from),
        FieldKind::Text | FieldKind::Keyword => value.as_str().map(JsonValue::from),
        FieldKind::Bool => value.as_bool().map(JsonValue::from),
    }
}
