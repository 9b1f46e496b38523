//! Full-text search over storage locations and parts using Tantivy.
//!
//! The index lives in memory. It starts empty, is filled by a full rebuild
//! from the database (in the background at startup and on demand), and is
//! kept current by [`SearchSync`] events sent after successful writes.
//!
//! Matching is infix: every query token must appear as a substring of some
//! word in the name, description or MPN. Hits are ordered by score, then by
//! creation time (newest first).

mod indexer;
mod sync;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tantivy::collector::TopDocs;
use tantivy::query::{AllQuery, BooleanQuery, Occur, Query, RegexQuery, TermQuery};
use tantivy::schema::{
    FAST, Field, INDEXED, IndexRecordOption, STORED, STRING, Schema, TextFieldIndexing,
    TextOptions, Value,
};
use tantivy::tokenizer::{LowerCaser, RemoveLongFilter, SimpleTokenizer, TextAnalyzer};
use tantivy::{
    DocId, Index, IndexReader, IndexWriter, ReloadPolicy, Score, SegmentReader, TantivyDocument,
    Term,
};
use thiserror::Error;
use tracing::instrument;
use uuid::Uuid;

use crate::models::part::Part;
use crate::models::storage::Storage;

pub use indexer::{rebuild, rebuild_in_background};
pub use sync::{IndexEvent, SearchSync};

const TOKENIZER: &str = "infix";
const WRITER_MEMORY_BYTES: usize = 20_000_000;
/// Upper bound on hits considered for suggestions.
const MAX_CANDIDATES: usize = 10_000;
/// Longest word indexed. Long enough for any MPN.
const MAX_TOKEN_LEN: usize = 255;

/// Errors from the search index.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("Index error: {0}")]
    Index(String),
    #[error("Query error: {0}")]
    Query(String),
    #[error("Build error: {0}")]
    Build(String),
}

/// Which kind of record a document describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collection {
    Storage,
    Parts,
}

impl Collection {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Storage => "storage",
            Self::Parts => "parts",
        }
    }
}

/// A record to index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexDocument {
    pub collection: Collection,
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub mpn: Option<String>,
    pub parent_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl From<&Storage> for IndexDocument {
    fn from(storage: &Storage) -> Self {
        Self {
            collection: Collection::Storage,
            id: storage.id.as_uuid(),
            name: storage.name.clone(),
            description: storage.description.clone(),
            mpn: None,
            parent_id: storage.parent_id.map(|id| id.as_uuid()),
            created_at: storage.created_at,
        }
    }
}

impl From<&Part> for IndexDocument {
    fn from(part: &Part) -> Self {
        Self {
            collection: Collection::Parts,
            id: part.id.as_uuid(),
            name: part.name.clone(),
            description: part.description.clone(),
            mpn: Some(part.mpn.clone()).filter(|mpn| !mpn.is_empty()),
            parent_id: None,
            created_at: part.created_at,
        }
    }
}

/// A search result item.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mpn: Option<String>,
    pub created_at: DateTime<Utc>,
    pub score: f32,
}

/// Schema field handles for the search index.
#[derive(Clone)]
struct SearchFields {
    // Stored / exact-match fields
    collection: Field,
    id: Field,
    name: Field,
    description: Field,
    mpn: Field,
    parent_id: Field,
    created_at: Field,
    // Tokenized fields for infix matching (not stored)
    name_text: Field,
    description_text: Field,
    mpn_text: Field,
}

struct Inner {
    reader: IndexReader,
    writer: Mutex<IndexWriter>,
    fields: SearchFields,
    ready: AtomicBool,
}

/// The search index. Cheap to clone.
#[derive(Clone)]
pub struct SearchIndex {
    inner: Arc<Inner>,
}

impl SearchIndex {
    /// Create an empty in-memory index.
    ///
    /// # Errors
    ///
    /// Returns `SearchError::Index` if the writer or reader cannot be created.
    pub fn new() -> Result<Self, SearchError> {
        let (schema, fields) = build_schema();
        let index = Index::create_in_ram(schema);

        index.tokenizers().register(
            TOKENIZER,
            TextAnalyzer::builder(SimpleTokenizer::default())
                .filter(RemoveLongFilter::limit(MAX_TOKEN_LEN))
                .filter(LowerCaser)
                .build(),
        );

        let writer = index
            .writer_with_num_threads(1, WRITER_MEMORY_BYTES)
            .map_err(|e| SearchError::Index(format!("Failed to create writer: {e}")))?;
        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()
            .map_err(|e| SearchError::Index(format!("Failed to create reader: {e}")))?;

        Ok(Self {
            inner: Arc::new(Inner {
                reader,
                writer: Mutex::new(writer),
                fields,
                ready: AtomicBool::new(false),
            }),
        })
    }

    /// Whether a full rebuild has completed.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.inner.ready.load(Ordering::Acquire)
    }

    /// Number of indexed documents across both collections.
    #[must_use]
    pub fn num_docs(&self) -> u64 {
        self.inner.reader.searcher().num_docs()
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Add or replace a single document.
    ///
    /// # Errors
    ///
    /// Returns `SearchError::Index` if the write or commit fails.
    pub fn upsert(&self, doc: &IndexDocument) -> Result<(), SearchError> {
        self.write(|writer, fields| {
            writer.delete_term(Term::from_field_text(fields.id, &doc.id.to_string()));
            writer
                .add_document(to_tantivy(fields, doc))
                .map_err(|e| SearchError::Index(format!("Failed to add document: {e}")))?;
            Ok(())
        })
    }

    /// Remove a document by record ID. Unknown IDs are ignored.
    ///
    /// # Errors
    ///
    /// Returns `SearchError::Index` if the commit fails.
    pub fn delete(&self, id: Uuid) -> Result<(), SearchError> {
        self.write(|writer, fields| {
            writer.delete_term(Term::from_field_text(fields.id, &id.to_string()));
            Ok(())
        })
    }

    /// Replace the whole index with `docs` and mark it ready.
    ///
    /// # Errors
    ///
    /// Returns `SearchError::Index` if the write or commit fails.
    pub fn replace_all(&self, docs: &[IndexDocument]) -> Result<(), SearchError> {
        self.write(|writer, fields| {
            writer
                .delete_all_documents()
                .map_err(|e| SearchError::Index(format!("Failed to clear index: {e}")))?;
            for doc in docs {
                writer
                    .add_document(to_tantivy(fields, doc))
                    .map_err(|e| SearchError::Index(format!("Failed to add document: {e}")))?;
            }
            Ok(())
        })?;
        self.inner.ready.store(true, Ordering::Release);
        Ok(())
    }

    /// Run `f` against the writer, then commit and reload the reader.
    fn write<F>(&self, f: F) -> Result<(), SearchError>
    where
        F: FnOnce(&mut IndexWriter, &SearchFields) -> Result<(), SearchError>,
    {
        let mut writer = self
            .inner
            .writer
            .lock()
            .map_err(|_| SearchError::Index("Lock poisoned".to_string()))?;

        if let Err(e) = f(&mut writer, &self.inner.fields) {
            // Drop the partial batch.
            let _ = writer.rollback();
            return Err(e);
        }
        writer
            .commit()
            .map_err(|e| SearchError::Index(format!("Commit failed: {e}")))?;
        drop(writer);

        self.inner
            .reader
            .reload()
            .map_err(|e| SearchError::Index(format!("Reader reload failed: {e}")))
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Search one collection.
    ///
    /// An empty query lists the collection newest first. `parent_id`
    /// restricts storage hits to direct children of a location.
    ///
    /// # Errors
    ///
    /// Returns `SearchError::Query` if the search fails.
    #[instrument(skip(self))]
    pub fn search(
        &self,
        collection: Collection,
        query: &str,
        parent_id: Option<Uuid>,
        limit: usize,
    ) -> Result<Vec<SearchHit>, SearchError> {
        let fields = &self.inner.fields;
        let tokens = tokenize(query);

        let mut clauses: Vec<(Occur, Box<dyn Query>)> = vec![(
            Occur::Must,
            Box::new(TermQuery::new(
                Term::from_field_text(fields.collection, collection.as_str()),
                IndexRecordOption::Basic,
            )),
        )];

        if let Some(parent_id) = parent_id {
            clauses.push((
                Occur::Must,
                Box::new(TermQuery::new(
                    Term::from_field_text(fields.parent_id, &parent_id.to_string()),
                    IndexRecordOption::Basic,
                )),
            ));
        }

        if tokens.is_empty() {
            clauses.push((Occur::Must, Box::new(AllQuery)));
        }
        for token in &tokens {
            clauses.push((Occur::Must, token_query(fields, token)?));
        }

        self.ranked(&BooleanQuery::new(clauses), limit, !tokens.is_empty())
    }

    /// Top `limit` hits by score, then creation time, newest first.
    ///
    /// Ranking happens inside the collector so the limit applies after
    /// ordering. Without `by_score` only creation time counts.
    fn ranked(
        &self,
        query: &dyn Query,
        limit: usize,
        by_score: bool,
    ) -> Result<Vec<SearchHit>, SearchError> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let collector = TopDocs::with_limit(limit).tweak_score(move |segment: &SegmentReader| {
            let created_at = segment.fast_fields().i64("created_at").ok();
            move |doc: DocId, score: Score| {
                let created = created_at
                    .as_ref()
                    .and_then(|column| column.first(doc))
                    .unwrap_or(i64::MIN);
                (if by_score { score } else { 0.0 }, created)
            }
        });

        let searcher = self.inner.reader.searcher();
        let top_docs = searcher
            .search(query, &collector)
            .map_err(|e| SearchError::Query(format!("Search failed: {e}")))?;

        top_docs
            .into_iter()
            .map(|((score, _), address)| {
                let doc = searcher
                    .doc::<TantivyDocument>(address)
                    .map_err(|e| SearchError::Query(format!("Failed to retrieve doc: {e}")))?;
                to_hit(&self.inner.fields, &doc, score)
            })
            .collect()
    }

    /// Names in a collection whose words start with every token of `prefix`.
    ///
    /// # Errors
    ///
    /// Returns `SearchError::Query` if the search fails.
    #[instrument(skip(self))]
    pub fn suggest(
        &self,
        collection: Collection,
        prefix: &str,
        limit: usize,
    ) -> Result<Vec<String>, SearchError> {
        let fields = &self.inner.fields;
        let tokens = tokenize(prefix);
        if tokens.is_empty() {
            return Ok(Vec::new());
        }

        let mut clauses: Vec<(Occur, Box<dyn Query>)> = vec![(
            Occur::Must,
            Box::new(TermQuery::new(
                Term::from_field_text(fields.collection, collection.as_str()),
                IndexRecordOption::Basic,
            )),
        )];
        for token in &tokens {
            let regex = RegexQuery::from_pattern(&format!("{token}.*"), fields.name_text)
                .map_err(|e| SearchError::Query(format!("Invalid pattern: {e}")))?;
            clauses.push((Occur::Must, Box::new(regex)));
        }

        let mut hits = self.collect(&BooleanQuery::new(clauses))?;
        hits.sort_by(|a, b| a.name.len().cmp(&b.name.len()).then_with(|| a.name.cmp(&b.name)));

        let mut names: Vec<String> = Vec::new();
        for hit in hits {
            if names.len() >= limit {
                break;
            }
            if !names.contains(&hit.name) {
                names.push(hit.name);
            }
        }
        Ok(names)
    }

    fn collect(&self, query: &dyn Query) -> Result<Vec<SearchHit>, SearchError> {
        let searcher = self.inner.reader.searcher();
        let top_docs = searcher
            .search(query, &TopDocs::with_limit(MAX_CANDIDATES))
            .map_err(|e| SearchError::Query(format!("Search failed: {e}")))?;

        top_docs
            .into_iter()
            .map(|(score, address)| {
                let doc = searcher
                    .doc::<TantivyDocument>(address)
                    .map_err(|e| SearchError::Query(format!("Failed to retrieve doc: {e}")))?;
                to_hit(&self.inner.fields, &doc, score)
            })
            .collect()
    }
}

/// Build the schema for the search index.
fn build_schema() -> (Schema, SearchFields) {
    let mut schema_builder = Schema::builder();

    // STRING means indexed but not tokenized (exact match)
    let collection = schema_builder.add_text_field("collection", STRING);
    let id = schema_builder.add_text_field("id", STRING | STORED);
    let name = schema_builder.add_text_field("name", STORED);
    let description = schema_builder.add_text_field("description", STORED);
    let mpn = schema_builder.add_text_field("mpn", STORED);
    let parent_id = schema_builder.add_text_field("parent_id", STRING | STORED);
    let created_at = schema_builder.add_i64_field("created_at", INDEXED | STORED | FAST);

    let text_indexing = TextFieldIndexing::default()
        .set_tokenizer(TOKENIZER)
        .set_index_option(IndexRecordOption::WithFreqsAndPositions);
    let text_options = TextOptions::default().set_indexing_options(text_indexing);

    let name_text = schema_builder.add_text_field("name_text", text_options.clone());
    let description_text = schema_builder.add_text_field("description_text", text_options.clone());
    let mpn_text = schema_builder.add_text_field("mpn_text", text_options);

    let fields = SearchFields {
        collection,
        id,
        name,
        description,
        mpn,
        parent_id,
        created_at,
        name_text,
        description_text,
        mpn_text,
    };
    (schema_builder.build(), fields)
}

/// Split a query into lowercase alphanumeric tokens, matching the index tokenizer.
fn tokenize(query: &str) -> Vec<String> {
    query
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Any field containing `token` as a substring of a word. Exact word
/// matches on the name score higher.
fn token_query(fields: &SearchFields, token: &str) -> Result<Box<dyn Query>, SearchError> {
    // Tokens are alphanumeric, so they need no regex escaping.
    let pattern = format!(".*{token}.*");
    let mut should: Vec<(Occur, Box<dyn Query>)> = vec![(
        Occur::Should,
        Box::new(TermQuery::new(
            Term::from_field_text(fields.name_text, token),
            IndexRecordOption::WithFreqs,
        )),
    )];
    for field in [fields.name_text, fields.description_text, fields.mpn_text] {
        let regex = RegexQuery::from_pattern(&pattern, field)
            .map_err(|e| SearchError::Query(format!("Invalid pattern: {e}")))?;
        should.push((Occur::Should, Box::new(regex)));
    }
    Ok(Box::new(BooleanQuery::new(should)))
}

fn to_tantivy(fields: &SearchFields, doc: &IndexDocument) -> TantivyDocument {
    let mut out = TantivyDocument::default();
    out.add_text(fields.collection, doc.collection.as_str());
    out.add_text(fields.id, doc.id.to_string());
    out.add_text(fields.name, &doc.name);
    out.add_text(fields.description, &doc.description);
    out.add_text(
        fields.parent_id,
        doc.parent_id.map(|id| id.to_string()).unwrap_or_default(),
    );
    out.add_i64(fields.created_at, doc.created_at.timestamp_micros());
    out.add_text(fields.name_text, &doc.name);
    out.add_text(fields.description_text, &doc.description);
    if let Some(mpn) = &doc.mpn {
        out.add_text(fields.mpn, mpn);
        out.add_text(fields.mpn_text, mpn);
    }
    out
}

fn to_hit(fields: &SearchFields, doc: &TantivyDocument, score: f32) -> Result<SearchHit, SearchError> {
    let get_text = |field: Field| -> Option<String> {
        doc.get_first(field)
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .map(String::from)
    };

    let id = get_text(fields.id)
        .and_then(|s| Uuid::parse_str(&s).ok())
        .ok_or_else(|| SearchError::Query("Document without a valid id".to_string()))?;
    let created_at = doc
        .get_first(fields.created_at)
        .and_then(|v| v.as_i64())
        .and_then(DateTime::from_timestamp_micros)
        .ok_or_else(|| SearchError::Query(format!("Document {id} without created_at")))?;

    Ok(SearchHit {
        id,
        name: get_text(fields.name).unwrap_or_default(),
        description: get_text(fields.description).unwrap_or_default(),
        parent_id: get_text(fields.parent_id).and_then(|s| Uuid::parse_str(&s).ok()),
        mpn: get_text(fields.mpn),
        created_at,
        score,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn storage(name: &str, description: &str, parent: Option<Uuid>, minute: u32) -> IndexDocument {
        IndexDocument {
            collection: Collection::Storage,
            id: Uuid::new_v4(),
            name: name.to_string(),
            description: description.to_string(),
            mpn: None,
            parent_id: parent,
            created_at: Utc
                .with_ymd_and_hms(2025, 1, 1, 12, minute, 0)
                .single()
                .expect("valid time"),
        }
    }

    fn part(name: &str, mpn: &str) -> IndexDocument {
        IndexDocument {
            collection: Collection::Parts,
            id: Uuid::new_v4(),
            name: name.to_string(),
            description: String::new(),
            mpn: Some(mpn.to_string()),
            parent_id: None,
            created_at: Utc::now(),
        }
    }

    fn index_with(docs: &[IndexDocument]) -> SearchIndex {
        let index = SearchIndex::new().expect("index");
        index.replace_all(docs).expect("replace");
        index
    }

    #[test]
    fn test_tokenize() {
        assert_eq!(tokenize("SM01-2A  bin"), vec!["sm01", "2a", "bin"]);
        assert!(tokenize("  -- ").is_empty());
    }

    #[test]
    fn test_infix_match() {
        let index = index_with(&[
            storage("SM01-2A", "Storage bin: SM01-2A", None, 0),
            storage("LG02-1B", "Storage bin: LG02-1B", None, 1),
        ]);

        let hits = index
            .search(Collection::Storage, "m01", None, 10)
            .expect("search");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "SM01-2A");
    }

    #[test]
    fn test_every_token_must_match() {
        let index = index_with(&[
            storage("Shelf A", "resistors", None, 0),
            storage("Shelf B", "capacitors", None, 1),
        ]);

        let hits = index
            .search(Collection::Storage, "shelf resist", None, 10)
            .expect("search");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "Shelf A");
    }

    #[test]
    fn test_empty_query_lists_newest_first() {
        let index = index_with(&[
            storage("Old", "", None, 0),
            storage("New", "", None, 30),
            part("Resistor", "RC0603"),
        ]);

        let hits = index.search(Collection::Storage, "", None, 10).expect("search");
        let names: Vec<_> = hits.iter().map(|h| h.name.as_str()).collect();
        assert_eq!(names, vec!["New", "Old"]);
    }

    #[test]
    fn test_collections_are_separate() {
        let index = index_with(&[storage("Resistor drawer", "", None, 0), part("Resistor 10k", "RC0603FR-0710KL")]);

        let parts = index.search(Collection::Parts, "resistor", None, 10).expect("search");
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].mpn.as_deref(), Some("RC0603FR-0710KL"));

        let by_mpn = index.search(Collection::Parts, "0710k", None, 10).expect("search");
        assert_eq!(by_mpn.len(), 1);
    }

    #[test]
    fn test_parent_filter() {
        let parent = Uuid::new_v4();
        let index = index_with(&[
            storage("Bin 1", "", Some(parent), 0),
            storage("Bin 2", "", None, 1),
        ]);

        let hits = index
            .search(Collection::Storage, "bin", Some(parent), 10)
            .expect("search");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].parent_id, Some(parent));
    }

    #[test]
    fn test_limit_truncates() {
        let docs: Vec<_> = (0..5).map(|i| storage(&format!("Bin {i}"), "", None, i)).collect();
        let index = index_with(&docs);
        let hits = index.search(Collection::Storage, "bin", None, 2).expect("search");
        assert_eq!(hits.len(), 2);
    }

    #[test]
    fn test_limit_applies_after_ordering_by_age() {
        let start = Utc
            .with_ymd_and_hms(2025, 1, 1, 0, 0, 0)
            .single()
            .expect("valid time");
        let docs: Vec<_> = (0..=MAX_CANDIDATES)
            .map(|i| {
                let mut doc = storage(&format!("Bin {i}"), "", None, 0);
                doc.created_at = start + chrono::Duration::seconds(i64::try_from(i).expect("fits"));
                doc
            })
            .collect();
        let index = index_with(&docs);

        let newest = format!("Bin {MAX_CANDIDATES}");
        let hits = index.search(Collection::Storage, "", None, 1).expect("search");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, newest);

        // Equal scores fall back to creation time.
        let hits = index.search(Collection::Storage, "bin", None, 1).expect("search");
        assert_eq!(hits[0].name, newest);
    }

    #[test]
    fn test_zero_limit_returns_nothing() {
        let index = index_with(&[storage("Bin", "", None, 0)]);
        assert!(index.search(Collection::Storage, "", None, 0).expect("search").is_empty());
    }

    #[test]
    fn test_long_mpn_is_searchable() {
        let mpn = "ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789ABCDEFGHIJ";
        assert!(mpn.len() > 40);
        let index = index_with(&[part("Custom module", mpn)]);

        let hits = index.search(Collection::Parts, "xyz0123", None, 10).expect("search");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].mpn.as_deref(), Some(mpn));
    }

    #[test]
    fn test_upsert_replaces_and_delete_removes() {
        let index = index_with(&[]);
        let mut doc = storage("Drawer", "", None, 0);
        index.upsert(&doc).expect("upsert");
        doc.name = "Cabinet".to_string();
        index.upsert(&doc).expect("upsert");

        assert_eq!(index.num_docs(), 1);
        assert!(index.search(Collection::Storage, "drawer", None, 10).expect("search").is_empty());
        assert_eq!(index.search(Collection::Storage, "cabinet", None, 10).expect("search").len(), 1);

        index.delete(doc.id).expect("delete");
        assert_eq!(index.num_docs(), 0);
    }

    #[test]
    fn test_suggestions_are_prefix_matches() {
        let index = index_with(&[
            storage("SM01-1A", "", None, 0),
            storage("SM02-1A", "", None, 1),
            storage("LG01-1A", "", None, 2),
        ]);

        let suggestions = index.suggest(Collection::Storage, "sm0", 10).expect("suggest");
        assert_eq!(suggestions, vec!["SM01-1A", "SM02-1A"]);

        // "m01" is an infix, not a prefix
        assert!(index.suggest(Collection::Storage, "m01", 10).expect("suggest").is_empty());
    }

    #[test]
    fn test_ready_after_rebuild() {
        let index = SearchIndex::new().expect("index");
        assert!(!index.is_ready());
        index.replace_all(&[]).expect("replace");
        assert!(index.is_ready());
    }
}
