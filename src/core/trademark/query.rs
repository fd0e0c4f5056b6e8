//! Query Builder
//!
//! Translates user-facing search parameters into the engine's boolean query
//! DSL. Text matching runs in one of two modes:
//!
//! - **Chosung mode** when the query consists only of leading consonants
//!   ("ㅅㅅㅈㅈ"): prefix-phrase matches on the two chosung fields.
//! - **Mixed mode** otherwise: four existence-gated clauses over the Korean
//!   name, the English name, its Korean pronunciation and the pronunciation's
//!   chosung. Queries containing Hangul add two low-weight chosung clauses.
//!
//! Filters are AND-combined and independent of the mode. Sorting always ends
//! with `pid` ascending so equal-scored pages stay stable.
//!
//! # Usage
//!
//! ```
//! use trademark_search::core::trademark::query::{MatchMode, QueryBuilder, SearchParams};
//!
//! let builder = QueryBuilder::default();
//! assert_eq!(builder.match_mode("ㅅㅅㅈㅈ"), MatchMode::Chosung);
//!
//! let params = SearchParams {
//!     query: Some("삼성".to_string()),
//!     status: Some("등록".to_string()),
//!     ..Default::default()
//! };
//! let request = builder.build(&params).unwrap();
//! assert_eq!(request.from, 0);
//! assert_eq!(request.size, 10);
//! ```

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::chosung::{extract_chosung, has_korean, is_chosung_query};
use super::error::{Result, TrademarkError};
use super::normalize::{
    PRODUCT_NAME, PRODUCT_NAME_CHOSUNG, PRODUCT_NAME_ENG, PRONUNCIATION, PRONUNCIATION_CHOSUNG,
};
use crate::config::PagingConfig;

pub use crate::core::store::SearchRequest;

const DATE_FORMAT: &str = "yyyy-MM-dd";
const FUZZINESS: &str = "AUTO";
const PREFIX_LENGTH: u32 = 1;

// ============================================================================
// Sorting
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortField {
    ApplicationDate,
    RegistrationDate,
    ProductName,
    ProductNameEng,
    ViewCount,
    Pid,
}

impl SortField {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ApplicationDate => "applicationDate",
            Self::RegistrationDate => "registrationDate",
            Self::ProductName => "productName",
            Self::ProductNameEng => "productNameEng",
            Self::ViewCount => "viewCount",
            Self::Pid => "pid",
        }
    }

    /// Field the engine sorts on. Analyzed text sorts on its keyword copy.
    fn engine_field(&self) -> &'static str {
        match self {
            Self::ProductName => "productName.keyword",
            Self::ProductNameEng => "productNameEng.keyword",
            other => other.as_str(),
        }
    }

    fn is_date(&self) -> bool {
        matches!(self, Self::ApplicationDate | Self::RegistrationDate)
    }
}

impl fmt::Display for SortField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortField {
    type Err = TrademarkError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "applicationDate" => Ok(Self::ApplicationDate),
            "registrationDate" => Ok(Self::RegistrationDate),
            "productName" => Ok(Self::ProductName),
            "productNameEng" => Ok(Self::ProductNameEng),
            "viewCount" => Ok(Self::ViewCount),
            "pid" => Ok(Self::Pid),
            other => Err(TrademarkError::invalid(format!(
                "unknown sort field '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

impl FromStr for SortOrder {
    type Err = TrademarkError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "asc" => Ok(Self::Asc),
            "desc" => Ok(Self::Desc),
            other => Err(TrademarkError::invalid(format!(
                "unknown sort order '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortOption {
    pub field: SortField,
    #[serde(default)]
    pub order: SortOrder,
}

impl SortOption {
    pub fn new(field: SortField, order: SortOrder) -> Self {
        Self { field, order }
    }

    fn to_engine(self) -> Value {
        let mut spec = json!({ "order": self.order.as_str() });
        if self.field.is_date() {
            spec["format"] = json!(DATE_FORMAT);
        }
        json!({ self.field.engine_field(): spec })
    }
}

/// `field` or `field:order`; order defaults to descending.
impl FromStr for SortOption {
    type Err = TrademarkError;

    fn from_str(s: &str) -> Result<Self> {
        let (field, order) = match s.split_once(':') {
            Some((field, order)) => (field.trim(), order.trim().parse()?),
            None => (s.trim(), SortOrder::default()),
        };
        Ok(Self::new(field.parse()?, order))
    }
}

/// Parse a comma-separated sort list such as `"applicationDate:asc,pid"`.
pub fn parse_sort_list(s: &str) -> Result<Vec<SortOption>> {
    s.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::parse)
        .collect()
}

// ============================================================================
// Parameters
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct SearchParams {
    pub query: Option<String>,
    pub status: Option<String>,
    pub main_code: Option<String>,
    pub sub_code: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    /// 1-based.
    pub page: u32,
    /// `None` uses the configured default.
    pub size: Option<u32>,
    pub sort: Vec<SortOption>,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            query: None,
            status: None,
            main_code: None,
            sub_code: None,
            start_date: None,
            end_date: None,
            page: 1,
            size: None,
            sort: Vec::new(),
        }
    }
}

/// Relevance weights per clause. Tunable, but the ordering (name match >
/// English name > pronunciation > chosung signals) should hold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryBoosts {
    pub chosung_product_name: f64,
    pub chosung_pronunciation: f64,
    pub product_name: f64,
    pub product_name_eng: f64,
    pub pronunciation: f64,
    pub pronunciation_chosung: f64,
    pub korean_product_name_chosung: f64,
    pub korean_pronunciation_chosung: f64,
}

impl Default for QueryBoosts {
    fn default() -> Self {
        Self {
            chosung_product_name: 5.0,
            chosung_pronunciation: 3.0,
            product_name: 4.0,
            product_name_eng: 2.5,
            pronunciation: 2.0,
            pronunciation_chosung: 1.0,
            korean_product_name_chosung: 0.8,
            korean_pronunciation_chosung: 0.5,
        }
    }
}

/// How the text part of a query is matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMode {
    Chosung,
    Mixed { chosung_boost: bool },
}

// ============================================================================
// Builder
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct QueryBuilder {
    paging: PagingConfig,
    boosts: QueryBoosts,
}

impl QueryBuilder {
    pub fn new(paging: PagingConfig, boosts: QueryBoosts) -> Self {
        Self { paging, boosts }
    }

    pub fn paging(&self) -> &PagingConfig {
        &self.paging
    }

    pub fn match_mode(&self, query: &str) -> MatchMode {
        if is_chosung_query(query) {
            MatchMode::Chosung
        } else {
            MatchMode::Mixed {
                chosung_boost: has_korean(query),
            }
        }
    }

    /// Build the search request. Parameters are validated before anything
    /// else so a bad request never reaches the engine.
    pub fn build(&self, params: &SearchParams) -> Result<SearchRequest> {
        if params.page < 1 {
            return Err(TrademarkError::invalid("page must be at least 1"));
        }
        let size = resolve_size(params.size, self.paging.default_size, self.paging.max_size)?;
        if let (Some(start), Some(end)) = (params.start_date, params.end_date) {
            if start > end {
                return Err(TrademarkError::invalid(format!(
                    "start_date {} is after end_date {}",
                    start, end
                )));
            }
        }

        let mut must = Vec::new();
        if let Some(query) = params.query.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
            must.push(self.text_clause(query));
        }

        Ok(SearchRequest {
            query: json!({
                "bool": {
                    "must": must,
                    "filter": self.filters(params),
                }
            }),
            sort: self.sort(&params.sort),
            from: (params.page as usize - 1) * size,
            size,
            source: None,
            highlight: None,
        })
    }

    /// OR-group matching the trimmed, non-empty query text.
    pub fn text_clause(&self, query: &str) -> Value {
        let b = &self.boosts;
        let mode = self.match_mode(query);
        log::debug!("query '{}' matched in {:?} mode", query, mode);

        let should = match mode {
            MatchMode::Chosung => vec![
                phrase_prefix(PRODUCT_NAME_CHOSUNG, query, b.chosung_product_name),
                phrase_prefix(PRONUNCIATION_CHOSUNG, query, b.chosung_pronunciation),
            ],
            MatchMode::Mixed { chosung_boost } => {
                let query_chosung = extract_chosung(query);
                let mut should = vec![
                    gated(
                        PRODUCT_NAME,
                        fuzzy_multi_match(query, &["productName^3", "productName.ngram^2"]),
                        b.product_name,
                    ),
                    gated(
                        PRODUCT_NAME_ENG,
                        fuzzy_multi_match(query, &["productNameEng^2", "productNameEng.ngram"]),
                        b.product_name_eng,
                    ),
                    gated(
                        PRONUNCIATION,
                        json!({ "match": { PRONUNCIATION: {
                            "query": query,
                            "fuzziness": FUZZINESS,
                            "prefix_length": PREFIX_LENGTH,
                        }}}),
                        b.pronunciation,
                    ),
                    gated(
                        PRONUNCIATION_CHOSUNG,
                        json!({ "match": { PRONUNCIATION_CHOSUNG: { "query": query_chosung } } }),
                        b.pronunciation_chosung,
                    ),
                ];
                if chosung_boost {
                    should.push(phrase_prefix(
                        PRODUCT_NAME_CHOSUNG,
                        &query_chosung,
                        b.korean_product_name_chosung,
                    ));
                    should.push(phrase_prefix(
                        PRONUNCIATION_CHOSUNG,
                        &query_chosung,
                        b.korean_pronunciation_chosung,
                    ));
                }
                should
            }
        };

        json!({ "bool": { "should": should, "minimum_should_match": 1 } })
    }

    fn filters(&self, params: &SearchParams) -> Vec<Value> {
        let mut filters = Vec::new();
        for (field, value) in [
            ("registerStatus", &params.status),
            ("asignProductMainCodeList", &params.main_code),
            ("asignProductSubCodeList", &params.sub_code),
        ] {
            if let Some(value) = value.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
                filters.push(json!({ "term": { field: value } }));
            }
        }

        if params.start_date.is_some() || params.end_date.is_some() {
            let mut range = json!({ "format": DATE_FORMAT });
            if let Some(start) = params.start_date {
                range["gte"] = json!(start.format("%Y-%m-%d").to_string());
            }
            if let Some(end) = params.end_date {
                range["lte"] = json!(end.format("%Y-%m-%d").to_string());
            }
            filters.push(json!({ "range": { "applicationDate": range } }));
        }
        filters
    }

    fn sort(&self, options: &[SortOption]) -> Vec<Value> {
        let mut sort: Vec<Value> = if options.is_empty() {
            vec![json!({ "_score": { "order": "desc" } })]
        } else {
            options.iter().map(|o| o.to_engine()).collect()
        };
        sort.push(pid_tie_break());
        sort
    }

    /// Search-as-you-type request over the name fields.
    pub fn build_autocomplete(&self, query: &str, size: Option<u32>) -> Result<SearchRequest> {
        let query = query.trim();
        if query.is_empty() {
            return Err(TrademarkError::invalid("query must not be empty"));
        }
        let size = resolve_size(
            size,
            self.paging.autocomplete_default_size,
            self.paging.autocomplete_max_size,
        )?;

        let should = if is_chosung_query(query) {
            vec![
                phrase_prefix(PRODUCT_NAME_CHOSUNG, query, 5.0),
                phrase_prefix(PRONUNCIATION_CHOSUNG, query, 3.0),
            ]
        } else {
            let mut should = vec![json!({
                "multi_match": {
                    "query": query,
                    "fields": [
                        "productName^5",
                        "productName.ngram^3",
                        "productName.edge_ngram^2",
                        "productNameEng^3",
                        "productNameEng.ngram^2"
                    ],
                    "type": "best_fields",
                    "fuzziness": FUZZINESS,
                    "prefix_length": PREFIX_LENGTH,
                }
            })];
            if has_korean(query) {
                should.push(phrase_prefix(PRODUCT_NAME_CHOSUNG, &extract_chosung(query), 2.0));
            }
            should
        };

        Ok(SearchRequest {
            query: json!({ "bool": { "should": should, "minimum_should_match": 1 } }),
            sort: vec![
                json!({ "_score": { "order": "desc" } }),
                json!({ "productName.keyword": { "order": "asc" } }),
                pid_tie_break(),
            ],
            from: 0,
            size,
            source: Some(
                [PRODUCT_NAME, PRODUCT_NAME_ENG, PRODUCT_NAME_CHOSUNG, "pid"]
                    .iter()
                    .map(|f| f.to_string())
                    .collect(),
            ),
            highlight: Some(json!({
                "pre_tags": ["<mark>"],
                "post_tags": ["</mark>"],
                "fields": {
                    PRODUCT_NAME: {},
                    PRODUCT_NAME_CHOSUNG: {},
                    PRODUCT_NAME_ENG: {}
                }
            })),
        })
    }
}

fn resolve_size(size: Option<u32>, default: u32, max: u32) -> Result<usize> {
    let size = size.unwrap_or(default);
    if size < 1 || size > max {
        return Err(TrademarkError::invalid(format!(
            "size must be between 1 and {}",
            max
        )));
    }
    Ok(size as usize)
}

fn pid_tie_break() -> Value {
    json!({ "pid": { "order": "asc" } })
}

fn phrase_prefix(field: &str, query: &str, boost: f64) -> Value {
    json!({ "match_phrase_prefix": { field: { "query": query, "boost": boost } } })
}

fn fuzzy_multi_match(query: &str, fields: &[&str]) -> Value {
    json!({
        "multi_match": {
            "query": query,
            "fields": fields,
            "fuzziness": FUZZINESS,
            "prefix_length": PREFIX_LENGTH,
        }
    })
}

/// Clause that only scores when `field` exists on the document.
fn gated(field: &str, clause: Value, boost: f64) -> Value {
    json!({
        "bool": {
            "filter": [{ "exists": { "field": field } }],
            "must": [clause],
            "boost": boost,
        }
    })
}
