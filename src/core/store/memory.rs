//! In-Memory Store
//!
//! A [`DocumentStore`] that evaluates the subset of the Elasticsearch query
//! DSL the trademark core emits, against documents held in process. Used by
//! the test suites and for running the service without a cluster
//! (`store.backend = "memory"`).
//!
//! Supported clauses: `match_all`, `bool` (`must`, `filter`, `should`,
//! `must_not`, `minimum_should_match`, `boost`), `term`, `terms`, `range`,
//! `exists`, `match`, `match_phrase_prefix` and `multi_match` (best fields).
//!
//! Field semantics come from the collection definition's mappings: `keyword`
//! fields match exactly, `text` fields match lowercase substrings, with
//! optional fuzzy token matching. Sub-fields (`.keyword`, `.ngram`,
//! `.edge_ngram`, `.numeric`) resolve to their base field. Scores are simple
//! sums of clause boosts; they preserve the relative weighting of clauses but
//! make no attempt to reproduce BM25.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::RwLock;

use super::{
    document_id, BulkOutcome, DocVersion, Document, DocumentStore, SearchHit, SearchRequest,
    SearchResponse, StoreError, StoreInfo, StoreResult, UpdateOutcome,
};

const PRIMARY_TERM: u64 = 1;

// ============================================================================
// Field Semantics
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldKind {
    Keyword,
    Text,
    Numeric,
    Date,
}

/// Base field plus how a query on the given path should compare values.
#[derive(Debug, Clone, Copy)]
struct FieldRef<'a> {
    base: &'a str,
    kind: FieldKind,
}

fn kind_from_mapping(mapping: &Value) -> FieldKind {
    match mapping["type"].as_str() {
        Some("keyword") => FieldKind::Keyword,
        Some("date") => FieldKind::Date,
        Some("long" | "integer" | "short" | "byte" | "double" | "float") => FieldKind::Numeric,
        _ => FieldKind::Text,
    }
}

// ============================================================================
// Collection
// ============================================================================

#[derive(Debug, Clone)]
struct StoredDoc {
    source: Document,
    seq_no: u64,
}

#[derive(Debug, Default)]
struct Collection {
    kinds: HashMap<String, FieldKind>,
    docs: BTreeMap<String, StoredDoc>,
    seq_no: u64,
    auto_id: u64,
}

impl Collection {
    fn from_definition(definition: &Value) -> Self {
        let kinds = definition["mappings"]["properties"]
            .as_object()
            .map(|properties| {
                properties
                    .iter()
                    .map(|(name, mapping)| (name.clone(), kind_from_mapping(mapping)))
                    .collect()
            })
            .unwrap_or_default();
        Self {
            kinds,
            ..Default::default()
        }
    }

    fn next_seq_no(&mut self) -> u64 {
        self.seq_no += 1;
        self.seq_no
    }

    fn field<'a>(&self, path: &'a str) -> FieldRef<'a> {
        for (suffix, kind) in [
            (".keyword", Some(FieldKind::Keyword)),
            (".numeric", Some(FieldKind::Numeric)),
            (".ngram", None),
            (".edge_ngram", None),
        ] {
            if let Some(base) = path.strip_suffix(suffix) {
                return FieldRef {
                    base,
                    kind: kind.unwrap_or(FieldKind::Text),
                };
            }
        }
        FieldRef {
            base: path,
            kind: self.kinds.get(path).copied().unwrap_or(FieldKind::Text),
        }
    }

    fn index(&mut self, mut source: Document) -> String {
        let id = match document_id(&source) {
            Some(id) => id,
            None => {
                self.auto_id += 1;
                format!("auto-{}", self.auto_id)
            }
        };
        source.remove("_id");
        let seq_no = self.next_seq_no();
        self.docs.insert(id.clone(), StoredDoc { source, seq_no });
        id
    }

    // ------------------------------------------------------------------------
    // Clause evaluation
    // ------------------------------------------------------------------------

    /// Score of `clause` against `doc`, `None` when it does not match.
    fn eval(&self, clause: &Value, doc: &Document) -> StoreResult<Option<f64>> {
        let (name, body) = single_entry(clause)?;
        match name.as_str() {
            "match_all" => Ok(Some(boost_of(body))),
            "bool" => self.eval_bool(body, doc),
            "term" => {
                let (path, spec) = single_entry(body)?;
                let (expected, boost) = value_and_boost(spec, "value");
                let field = self.field(path);
                Ok(self
                    .values(doc, field)
                    .iter()
                    .any(|v| term_matches(field.kind, v, expected))
                    .then_some(boost))
            }
            "terms" => {
                let boost = boost_of(body);
                let (path, candidates) = body
                    .as_object()
                    .and_then(|o| o.iter().find(|(k, _)| k.as_str() != "boost"))
                    .ok_or_else(|| StoreError::query("terms query without a field"))?;
                let candidates = candidates.as_array().cloned().unwrap_or_default();
                let field = self.field(path);
                Ok(self
                    .values(doc, field)
                    .iter()
                    .any(|v| candidates.iter().any(|c| term_matches(field.kind, v, c)))
                    .then_some(boost))
            }
            "range" => {
                let (path, bounds) = single_entry(body)?;
                let field = self.field(path);
                Ok(self
                    .values(doc, field)
                    .iter()
                    .any(|v| in_range(v, bounds))
                    .then_some(boost_of(bounds)))
            }
            "exists" => {
                let path = body["field"]
                    .as_str()
                    .ok_or_else(|| StoreError::query("exists query without a field"))?;
                let field = self.field(path);
                Ok((!self.values(doc, field).is_empty()).then_some(boost_of(body)))
            }
            "match" => {
                let (path, spec) = single_entry(body)?;
                let options = MatchOptions::from_spec(spec, "query");
                Ok(self
                    .match_field(doc, self.field(path), &options)
                    .map(|score| score * options.boost))
            }
            "match_phrase_prefix" => {
                let (path, spec) = single_entry(body)?;
                let (query, boost) = value_and_boost(spec, "query");
                let query = query.as_str().unwrap_or_default();
                let field = self.field(path);
                Ok(self
                    .values(doc, field)
                    .iter()
                    .filter_map(|v| v.as_str())
                    .any(|v| phrase_prefix_matches(field.kind, v, query))
                    .then_some(boost))
            }
            "multi_match" => self.eval_multi_match(body, doc),
            other => Err(StoreError::query(format!(
                "unsupported query clause '{}'",
                other
            ))),
        }
    }

    fn eval_bool(&self, body: &Value, doc: &Document) -> StoreResult<Option<f64>> {
        let clauses = |key: &str| -> Vec<Value> {
            match &body[key] {
                Value::Array(items) => items.clone(),
                Value::Null => Vec::new(),
                single => vec![single.clone()],
            }
        };
        let must = clauses("must");
        let filter = clauses("filter");
        let should = clauses("should");
        let must_not = clauses("must_not");

        let mut score = 0.0;
        for clause in &must {
            match self.eval(clause, doc)? {
                Some(s) => score += s,
                None => return Ok(None),
            }
        }
        for clause in &filter {
            if self.eval(clause, doc)?.is_none() {
                return Ok(None);
            }
        }
        for clause in &must_not {
            if self.eval(clause, doc)?.is_some() {
                return Ok(None);
            }
        }

        let mut matched_should = 0u64;
        for clause in &should {
            if let Some(s) = self.eval(clause, doc)? {
                matched_should += 1;
                score += s;
            }
        }
        let minimum = match body["minimum_should_match"].as_u64() {
            Some(n) => n,
            None if !should.is_empty() && must.is_empty() && filter.is_empty() => 1,
            None => 0,
        };
        if matched_should < minimum {
            return Ok(None);
        }

        Ok(Some(score * boost_of(body)))
    }

    fn eval_multi_match(&self, body: &Value, doc: &Document) -> StoreResult<Option<f64>> {
        let options = MatchOptions::from_spec(body, "query");
        let fields = body["fields"]
            .as_array()
            .ok_or_else(|| StoreError::query("multi_match without fields"))?;

        let mut best: Option<f64> = None;
        for entry in fields {
            let entry = entry.as_str().unwrap_or_default();
            let (path, weight) = match entry.split_once('^') {
                Some((path, weight)) => (path, weight.parse::<f64>().unwrap_or(1.0)),
                None => (entry, 1.0),
            };
            if let Some(score) = self.match_field(doc, self.field(path), &options) {
                let weighted = score * weight;
                best = Some(best.map_or(weighted, |b: f64| b.max(weighted)));
            }
        }
        Ok(best.map(|score| score * options.boost))
    }

    /// Fraction of query tokens found in the field, `None` for no token.
    fn match_field(&self, doc: &Document, field: FieldRef<'_>, options: &MatchOptions) -> Option<f64> {
        let values = self.values(doc, field);
        if values.is_empty() || options.query.is_empty() {
            return None;
        }

        if matches!(field.kind, FieldKind::Keyword | FieldKind::Numeric) {
            let query = Value::String(options.query.clone());
            return values
                .iter()
                .any(|v| term_matches(field.kind, v, &query))
                .then_some(1.0);
        }

        let haystacks: Vec<String> = values.iter().map(|v| value_text(v).to_lowercase()).collect();
        let tokens: Vec<String> = options
            .query
            .to_lowercase()
            .split_whitespace()
            .map(str::to_string)
            .collect();
        if tokens.is_empty() {
            return None;
        }

        let matched = tokens
            .iter()
            .filter(|token| {
                haystacks
                    .iter()
                    .any(|h| h.contains(token.as_str()) || options.fuzzy_matches(h, token))
            })
            .count();
        if matched == 0 {
            None
        } else {
            Some(matched as f64 / tokens.len() as f64)
        }
    }

    /// Flattened non-null values of the base field.
    fn values<'d>(&self, doc: &'d Document, field: FieldRef<'_>) -> Vec<&'d Value> {
        match doc.get(field.base) {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items.iter().filter(|v| !v.is_null()).collect(),
            Some(value) => vec![value],
        }
    }
}

// ============================================================================
// Matching Helpers
// ============================================================================

fn single_entry(value: &Value) -> StoreResult<(&String, &Value)> {
    value
        .as_object()
        .and_then(|o| o.iter().next())
        .ok_or_else(|| StoreError::query(format!("malformed query clause: {}", value)))
}

fn boost_of(body: &Value) -> f64 {
    body["boost"].as_f64().unwrap_or(1.0)
}

/// `{"field": v}` or `{"field": {"<key>": v, "boost": b}}`.
fn value_and_boost<'v>(spec: &'v Value, key: &str) -> (&'v Value, f64) {
    match spec.get(key) {
        Some(value) if spec.is_object() => (value, boost_of(spec)),
        _ => (spec, 1.0),
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn term_matches(kind: FieldKind, actual: &Value, expected: &Value) -> bool {
    match kind {
        FieldKind::Numeric => match (as_number(actual), as_number(expected)) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        },
        FieldKind::Text => value_text(actual)
            .to_lowercase()
            .split_whitespace()
            .any(|token| token == value_text(expected).to_lowercase()),
        FieldKind::Keyword | FieldKind::Date => value_text(actual) == value_text(expected),
    }
}

fn phrase_prefix_matches(kind: FieldKind, actual: &str, query: &str) -> bool {
    if query.is_empty() {
        return false;
    }
    match kind {
        FieldKind::Text => {
            let actual = actual.to_lowercase();
            let query = query.to_lowercase();
            actual.starts_with(&query) || actual.contains(&format!(" {}", query))
        }
        _ => actual.starts_with(query),
    }
}

fn in_range(value: &Value, bounds: &Value) -> bool {
    let check = |key: &str, accept: fn(Ordering) -> bool| -> bool {
        match bounds.get(key) {
            None | Some(Value::Null) => true,
            Some(bound) => compare_values(value, bound).map_or(false, accept),
        }
    };
    check("gte", |o| o != Ordering::Less)
        && check("gt", |o| o == Ordering::Greater)
        && check("lte", |o| o != Ordering::Greater)
        && check("lt", |o| o == Ordering::Less)
}

/// Numbers compare numerically, everything else as text.
fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    if a.is_number() || b.is_number() {
        let (x, y) = (as_number(a)?, as_number(b)?);
        return x.partial_cmp(&y);
    }
    Some(value_text(a).cmp(&value_text(b)))
}

struct MatchOptions {
    query: String,
    boost: f64,
    fuzziness: Option<String>,
    prefix_length: usize,
}

impl MatchOptions {
    fn from_spec(spec: &Value, key: &str) -> Self {
        match spec.get(key) {
            Some(query) if spec.is_object() => Self {
                query: value_text(query),
                boost: boost_of(spec),
                fuzziness: spec.get("fuzziness").map(value_text),
                prefix_length: spec["prefix_length"].as_u64().unwrap_or(0) as usize,
            },
            _ => Self {
                query: value_text(spec),
                boost: 1.0,
                fuzziness: None,
                prefix_length: 0,
            },
        }
    }

    fn max_edits(&self, token: &str) -> usize {
        let len = token.chars().count();
        match self.fuzziness.as_deref() {
            None => 0,
            Some("AUTO") => match len {
                0..=2 => 0,
                3..=5 => 1,
                _ => 2,
            },
            Some(n) => n.parse().unwrap_or(0),
        }
    }

    /// Whether some word of `haystack` is within the allowed edit distance
    /// of `token`, sharing its first `prefix_length` characters.
    fn fuzzy_matches(&self, haystack: &str, token: &str) -> bool {
        let max_edits = self.max_edits(token);
        if max_edits == 0 {
            return false;
        }
        let prefix: String = token.chars().take(self.prefix_length).collect();
        haystack
            .split_whitespace()
            .filter(|word| word.starts_with(&prefix))
            .any(|word| levenshtein(word, token) <= max_edits)
    }
}

fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let mut previous: Vec<usize> = (0..=b.len()).collect();
    for (i, ca) in a.iter().enumerate() {
        let mut current = vec![i + 1; b.len() + 1];
        for (j, cb) in b.iter().enumerate() {
            let substitution = previous[j] + usize::from(ca != cb);
            current[j + 1] = substitution.min(previous[j + 1] + 1).min(current[j] + 1);
        }
        previous = current;
    }
    previous[b.len()]
}

// ============================================================================
// Sorting
// ============================================================================

struct SortKey<'a> {
    field: Option<FieldRef<'a>>,
    descending: bool,
}

fn sort_keys<'a>(collection: &Collection, sort: &'a [Value]) -> StoreResult<Vec<SortKey<'a>>> {
    sort.iter()
        .map(|entry| {
            let (name, order) = match entry {
                Value::String(name) => (name.as_str(), None),
                Value::Object(o) => {
                    let (name, spec) = o
                        .iter()
                        .next()
                        .ok_or_else(|| StoreError::query("empty sort entry"))?;
                    let order = spec
                        .as_str()
                        .or_else(|| spec["order"].as_str())
                        .map(str::to_string);
                    (name.as_str(), order)
                }
                other => return Err(StoreError::query(format!("bad sort entry: {}", other))),
            };
            let is_score = name == "_score";
            let descending = match order.as_deref() {
                Some("desc") => true,
                Some("asc") => false,
                Some(other) => {
                    return Err(StoreError::query(format!("bad sort order '{}'", other)))
                }
                None => is_score,
            };
            Ok(SortKey {
                field: (!is_score).then(|| collection.field(name)),
                descending,
            })
        })
        .collect()
}

fn compare_hits(collection: &Collection, keys: &[SortKey<'_>], a: &SearchHit, b: &SearchHit) -> Ordering {
    for key in keys {
        let ordering = match key.field {
            None => {
                let (x, y) = (a.score.unwrap_or(0.0), b.score.unwrap_or(0.0));
                let o = x.partial_cmp(&y).unwrap_or(Ordering::Equal);
                if key.descending {
                    o.reverse()
                } else {
                    o
                }
            }
            Some(field) => {
                let x = collection.values(&a.source, field).first().copied();
                let y = collection.values(&b.source, field).first().copied();
                match (x, y) {
                    // Missing values sort last in either direction.
                    (None, None) => Ordering::Equal,
                    (None, Some(_)) => Ordering::Greater,
                    (Some(_), None) => Ordering::Less,
                    (Some(x), Some(y)) => {
                        let o = if field.kind == FieldKind::Numeric {
                            match (as_number(x), as_number(y)) {
                                (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
                                _ => compare_values(x, y).unwrap_or(Ordering::Equal),
                            }
                        } else {
                            compare_values(x, y).unwrap_or(Ordering::Equal)
                        };
                        if key.descending {
                            o.reverse()
                        } else {
                            o
                        }
                    }
                }
            }
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

// ============================================================================
// Store
// ============================================================================

/// Process-local document store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, Collection>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn exists(&self, collection: &str) -> StoreResult<bool> {
        Ok(self.collections.read().await.contains_key(collection))
    }

    async fn create_collection(&self, collection: &str, definition: &Value) -> StoreResult<()> {
        let mut collections = self.collections.write().await;
        if collections.contains_key(collection) {
            return Err(StoreError::query(format!(
                "resource_already_exists_exception: index [{}] already exists",
                collection
            )));
        }
        collections.insert(collection.to_string(), Collection::from_definition(definition));
        log::info!("Created in-memory collection '{}'", collection);
        Ok(())
    }

    async fn delete_collection(&self, collection: &str) -> StoreResult<()> {
        self.collections
            .write()
            .await
            .remove(collection)
            .map(|_| ())
            .ok_or_else(|| StoreError::index_not_found(collection))
    }

    async fn count(&self, collection: &str) -> StoreResult<u64> {
        let collections = self.collections.read().await;
        let c = collections
            .get(collection)
            .ok_or_else(|| StoreError::index_not_found(collection))?;
        Ok(c.docs.len() as u64)
    }

    async fn search(
        &self,
        collection: &str,
        request: &SearchRequest,
    ) -> StoreResult<SearchResponse> {
        let collections = self.collections.read().await;
        let c = collections
            .get(collection)
            .ok_or_else(|| StoreError::index_not_found(collection))?;

        let query = if request.query.is_null() {
            serde_json::json!({ "match_all": {} })
        } else {
            request.query.clone()
        };

        let mut hits = Vec::new();
        for (id, stored) in &c.docs {
            if let Some(score) = c.eval(&query, &stored.source)? {
                hits.push(SearchHit {
                    id: id.clone(),
                    source: stored.source.clone(),
                    score: Some(score),
                    version: Some(DocVersion {
                        seq_no: stored.seq_no,
                        primary_term: PRIMARY_TERM,
                    }),
                    highlight: None,
                });
            }
        }

        // Unsorted hits come back in indexing order, not id order.
        hits.sort_by_key(|hit| hit.version.map(|v| v.seq_no));
        let keys = sort_keys(c, &request.sort)?;
        if !keys.is_empty() {
            hits.sort_by(|a, b| compare_hits(c, &keys, a, b));
        }

        let total = hits.len() as u64;
        let mut page: Vec<SearchHit> = hits
            .into_iter()
            .skip(request.from)
            .take(request.size)
            .collect();

        if let Some(fields) = &request.source {
            for hit in &mut page {
                hit.source.retain(|key, _| fields.iter().any(|f| f == key));
            }
        }

        Ok(SearchResponse { hits: page, total })
    }

    async fn max_value(&self, collection: &str, field: &str) -> StoreResult<Option<Value>> {
        let collections = self.collections.read().await;
        let c = collections
            .get(collection)
            .ok_or_else(|| StoreError::index_not_found(collection))?;
        let field = c.field(field);

        let values: Vec<&Value> = c
            .docs
            .values()
            .flat_map(|d| c.values(&d.source, field))
            .collect();

        if field.kind == FieldKind::Numeric || values.iter().all(|v| v.is_number()) {
            // Malformed values are ignored like `ignore_malformed` does.
            let max = values
                .iter()
                .filter_map(|v| as_number(v))
                .fold(None, |acc: Option<f64>, n| Some(acc.map_or(n, |m| m.max(n))));
            return Ok(max.map(Value::from));
        }

        Ok(values
            .iter()
            .map(|v| value_text(v))
            .max()
            .map(Value::String))
    }

    async fn update(
        &self,
        collection: &str,
        id: &str,
        partial: Document,
        expected: Option<DocVersion>,
    ) -> StoreResult<UpdateOutcome> {
        let mut collections = self.collections.write().await;
        let c = collections
            .get_mut(collection)
            .ok_or_else(|| StoreError::index_not_found(collection))?;

        let current = match c.docs.get(id) {
            Some(doc) => doc.seq_no,
            None => return Ok(UpdateOutcome::NotFound),
        };
        if let Some(expected) = expected {
            if expected.seq_no != current || expected.primary_term != PRIMARY_TERM {
                return Ok(UpdateOutcome::Conflict);
            }
        }

        let unchanged = c
            .docs
            .get(id)
            .map(|doc| partial.iter().all(|(k, v)| doc.source.get(k) == Some(v)))
            .unwrap_or(false);
        if unchanged {
            return Ok(UpdateOutcome::Noop {
                version: DocVersion {
                    seq_no: current,
                    primary_term: PRIMARY_TERM,
                },
            });
        }

        let seq_no = c.next_seq_no();
        let doc = c
            .docs
            .get_mut(id)
            .ok_or_else(|| StoreError::query(format!("document {} vanished", id)))?;
        merge(&mut doc.source, partial);
        doc.seq_no = seq_no;

        Ok(UpdateOutcome::Updated {
            version: DocVersion {
                seq_no,
                primary_term: PRIMARY_TERM,
            },
        })
    }

    async fn bulk_index(
        &self,
        collection: &str,
        documents: Vec<Document>,
    ) -> StoreResult<BulkOutcome> {
        let mut collections = self.collections.write().await;
        // Like Elasticsearch, indexing into a missing collection creates it.
        let c = collections.entry(collection.to_string()).or_default();

        let success = documents.len();
        for document in documents {
            c.index(document);
        }
        log::debug!("Indexed {} documents into '{}'", success, collection);
        Ok(BulkOutcome { success, failed: 0 })
    }

    async fn delete_all(&self, collection: &str) -> StoreResult<u64> {
        let mut collections = self.collections.write().await;
        let c = collections
            .get_mut(collection)
            .ok_or_else(|| StoreError::index_not_found(collection))?;
        let removed = c.docs.len() as u64;
        c.docs.clear();
        Ok(removed)
    }

    async fn info(&self) -> StoreResult<StoreInfo> {
        Ok(StoreInfo {
            engine: "memory".to_string(),
            version: crate::VERSION.to_string(),
        })
    }
}

fn merge(target: &mut Map<String, Value>, partial: Document) {
    for (key, value) in partial {
        target.insert(key, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn definition() -> Value {
        json!({
            "mappings": {
                "properties": {
                    "pid": { "type": "keyword", "fields": { "numeric": { "type": "long" } } },
                    "productName": { "type": "text" },
                    "productName_chosung": { "type": "keyword" },
                    "registerStatus": { "type": "keyword" },
                    "applicationDate": { "type": "date" },
                    "viewCount": { "type": "integer" }
                }
            }
        })
    }

    fn doc(value: Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    async fn seeded() -> MemoryStore {
        let store = MemoryStore::new();
        store.create_collection("t", &definition()).await.unwrap();
        store
            .bulk_index(
                "t",
                vec![
                    doc(json!({"pid": "2", "productName": "엘지전자", "productName_chosung": "ㅇㅈㅈㅈ", "registerStatus": "출원", "applicationDate": "2021-05-01", "viewCount": 3})),
                    doc(json!({"pid": "1", "productName": "삼성전자", "productName_chosung": "ㅅㅅㅈㅈ", "registerStatus": "등록", "applicationDate": "2020-01-15", "viewCount": 0})),
                    doc(json!({"pid": "10", "productName": "Samsung Galaxy", "registerStatus": "등록"})),
                ],
            )
            .await
            .unwrap();
        store
    }

    fn request(query: Value) -> SearchRequest {
        SearchRequest {
            query,
            sort: vec![json!({"pid.keyword": {"order": "asc"}})],
            from: 0,
            size: 10,
            source: None,
            highlight: None,
        }
    }

    fn pids(response: &SearchResponse) -> Vec<String> {
        response.hits.iter().map(|h| h.id.clone()).collect()
    }

    #[tokio::test]
    async fn test_term_filter_on_keyword() {
        let store = seeded().await;
        let response = store
            .search(
                "t",
                &request(json!({"bool": {"filter": [{"term": {"registerStatus": "등록"}}]}})),
            )
            .await
            .unwrap();
        assert_eq!(pids(&response), vec!["1", "10"]);
        assert_eq!(response.total, 2);
    }

    #[tokio::test]
    async fn test_match_phrase_prefix_on_keyword_chosung() {
        let store = seeded().await;
        let response = store
            .search(
                "t",
                &request(json!({"match_phrase_prefix": {"productName_chosung": {"query": "ㅅㅅ", "boost": 5.0}}})),
            )
            .await
            .unwrap();
        assert_eq!(pids(&response), vec!["1"]);
        assert_eq!(response.hits[0].score, Some(5.0));
    }

    #[tokio::test]
    async fn test_match_text_substring_and_ngram_subfield() {
        let store = seeded().await;
        let response = store
            .search("t", &request(json!({"match": {"productName.ngram": "전자"}})))
            .await
            .unwrap();
        assert_eq!(pids(&response), vec!["1", "2"]);
    }

    #[tokio::test]
    async fn test_multi_match_fuzzy() {
        let store = seeded().await;
        let response = store
            .search(
                "t",
                &request(json!({"multi_match": {
                    "query": "samsng",
                    "fields": ["productName^3", "productName.ngram^2"],
                    "fuzziness": "AUTO",
                    "prefix_length": 1
                }})),
            )
            .await
            .unwrap();
        assert_eq!(pids(&response), vec!["10"]);
        // Weighted by the best field.
        assert_eq!(response.hits[0].score, Some(3.0));
    }

    #[tokio::test]
    async fn test_range_on_dates() {
        let store = seeded().await;
        let response = store
            .search(
                "t",
                &request(json!({"range": {"applicationDate": {"gte": "2021-01-01", "lte": "2021-12-31"}}})),
            )
            .await
            .unwrap();
        assert_eq!(pids(&response), vec!["2"]);
    }

    #[tokio::test]
    async fn test_bool_should_defaults_to_one_required() {
        let store = seeded().await;
        let query = json!({"bool": {"should": [
            {"term": {"registerStatus": "없음"}},
            {"term": {"productName_chosung": "ㅇㅈㅈㅈ"}}
        ]}});
        let response = store.search("t", &request(query)).await.unwrap();
        assert_eq!(pids(&response), vec!["2"]);
    }

    #[tokio::test]
    async fn test_exists_gate_and_must_not() {
        let store = seeded().await;
        let query = json!({"bool": {
            "filter": [{"exists": {"field": "productName_chosung"}}],
            "must_not": [{"term": {"pid": "2"}}]
        }});
        let response = store.search("t", &request(query)).await.unwrap();
        assert_eq!(pids(&response), vec!["1"]);
    }

    #[tokio::test]
    async fn test_sort_score_then_field_with_missing_last() {
        let store = seeded().await;
        let mut req = request(json!({"match_all": {}}));
        req.sort = vec![
            json!({"viewCount": {"order": "desc"}}),
            json!({"pid.keyword": {"order": "asc"}}),
        ];
        let response = store.search("t", &req).await.unwrap();
        assert_eq!(pids(&response), vec!["2", "1", "10"]);
    }

    #[tokio::test]
    async fn test_pagination_and_source_filter() {
        let store = seeded().await;
        let mut req = request(json!({"match_all": {}}));
        req.from = 1;
        req.size = 1;
        req.source = Some(vec!["pid".to_string()]);
        let response = store.search("t", &req).await.unwrap();
        assert_eq!(response.total, 3);
        assert_eq!(pids(&response), vec!["10"]);
        assert_eq!(response.hits[0].source.len(), 1);
    }

    #[tokio::test]
    async fn test_unsupported_clause_is_query_error() {
        let store = seeded().await;
        let err = store
            .search("t", &request(json!({"wildcard": {"pid": "1*"}})))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Query(_)));
    }

    #[tokio::test]
    async fn test_missing_collection() {
        let store = MemoryStore::new();
        assert!(!store.exists("t").await.unwrap());
        assert!(matches!(
            store.count("t").await,
            Err(StoreError::IndexNotFound(_))
        ));
        assert!(matches!(
            store.search("t", &SearchRequest::default()).await,
            Err(StoreError::IndexNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_max_value_numeric_subfield_ignores_malformed() {
        let store = seeded().await;
        store
            .bulk_index(
                "t",
                vec![doc(json!({"pid": "550e8400-e29b-41d4-a716-446655440000"}))],
            )
            .await
            .unwrap();
        let max = store.max_value("t", "pid.numeric").await.unwrap();
        assert_eq!(max, Some(json!(10.0)));
    }

    #[tokio::test]
    async fn test_max_value_empty() {
        let store = MemoryStore::new();
        store.create_collection("t", &definition()).await.unwrap();
        assert_eq!(store.max_value("t", "pid.numeric").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_update_versions_and_conflicts() {
        let store = seeded().await;
        let hit = store
            .search("t", &request(json!({"term": {"pid": "1"}})))
            .await
            .unwrap()
            .hits
            .remove(0);
        let version = hit.version.unwrap();

        let mut partial = Document::new();
        partial.insert("viewCount".into(), json!(1));
        let outcome = store
            .update("t", "1", partial.clone(), Some(version))
            .await
            .unwrap();
        assert!(matches!(outcome, UpdateOutcome::Updated { .. }));

        // Stale token.
        let mut partial2 = Document::new();
        partial2.insert("viewCount".into(), json!(2));
        let outcome = store.update("t", "1", partial2, Some(version)).await.unwrap();
        assert_eq!(outcome, UpdateOutcome::Conflict);

        // Same values again.
        let outcome = store.update("t", "1", partial, None).await.unwrap();
        assert!(matches!(outcome, UpdateOutcome::Noop { .. }));

        let outcome = store
            .update("t", "404", Document::new(), None)
            .await
            .unwrap();
        assert_eq!(outcome, UpdateOutcome::NotFound);
    }

    #[tokio::test]
    async fn test_delete_all_and_collection() {
        let store = seeded().await;
        assert_eq!(store.delete_all("t").await.unwrap(), 3);
        assert_eq!(store.count("t").await.unwrap(), 0);
        store.delete_collection("t").await.unwrap();
        assert!(!store.exists("t").await.unwrap());
        assert!(store.delete_collection("t").await.is_err());
    }

    #[tokio::test]
    async fn test_create_twice_fails() {
        let store = MemoryStore::new();
        store.create_collection("t", &definition()).await.unwrap();
        assert!(store.create_collection("t", &definition()).await.is_err());
    }

    #[tokio::test]
    async fn test_unsorted_hits_keep_indexing_order() {
        let store = seeded().await;
        let response = store
            .search("t", &SearchRequest { sort: Vec::new(), ..request(json!({"match_all": {}})) })
            .await
            .unwrap();
        assert_eq!(pids(&response), vec!["2", "1", "10"]);
    }

    #[test]
    fn test_equal_scores_ordered_by_pid_key() {
        let collection = Collection::from_definition(&definition());
        let mut second = SearchHit {
            id: "2".to_string(),
            source: doc(json!({"pid": "2"})),
            score: Some(1.5),
            version: None,
            highlight: None,
        };
        let first = SearchHit {
            id: "1".to_string(),
            source: doc(json!({"pid": "1"})),
            ..second.clone()
        };

        let score_only = [json!({"_score": {"order": "desc"}})];
        let keys = sort_keys(&collection, &score_only).unwrap();
        assert_eq!(compare_hits(&collection, &keys, &second, &first), Ordering::Equal);

        let with_pid = [json!({"_score": {"order": "desc"}}), json!({"pid": {"order": "asc"}})];
        let keys = sort_keys(&collection, &with_pid).unwrap();
        let mut hits = vec![second.clone(), first.clone()];
        hits.sort_by(|a, b| compare_hits(&collection, &keys, a, b));
        let ids: Vec<&str> = hits.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2"]);

        // A higher score still wins over the pid.
        second.score = Some(2.0);
        assert_eq!(compare_hits(&collection, &keys, &second, &first), Ordering::Less);
    }

    #[test]
    fn test_levenshtein() {
        assert_eq!(levenshtein("samsung", "samsng"), 1);
        assert_eq!(levenshtein("", "abc"), 3);
        assert_eq!(levenshtein("삼성", "삼성"), 0);
    }
}
