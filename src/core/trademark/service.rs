//! Trademark Service
//!
//! Orchestrates the store calls behind every trademark operation: search,
//! autocomplete, lookups, view counting, index provisioning and bulk loading.

use std::path::Path;
use std::sync::Arc;

use serde_json::{json, Value};

use super::error::{Result, TrademarkError};
use super::mapping::index_definition;
use super::models::{
    AutocompleteResponse, AutocompleteSuggestion, LoadSummary, SearchPage, StoreStatus,
    ViewCountUpdate,
};
use super::normalize::{pid_text, DocumentNormalizer, PRODUCT_NAME, PRODUCT_NAME_ENG};
use super::pid::{is_valid_pid, FallbackSequence, PidAllocator, PidBlock};
use super::pronunciation::Transliterator;
use super::query::{QueryBuilder, SearchParams, SearchRequest};
use crate::config::{AppConfig, InitMode};
use crate::core::store::{Document, DocumentStore, SearchHit, StoreError, UpdateOutcome};

pub struct TrademarkService {
    store: Arc<dyn DocumentStore>,
    index: String,
    init_mode: InitMode,
    max_retries: u32,
    queries: QueryBuilder,
    normalizer: DocumentNormalizer,
    allocator: PidAllocator,
}

impl TrademarkService {
    pub fn new(store: Arc<dyn DocumentStore>, config: &AppConfig) -> Self {
        Self::with_fallback(store, config, Arc::new(FallbackSequence::new()))
    }

    /// Build the service around an existing fallback pid sequence.
    pub fn with_fallback(
        store: Arc<dyn DocumentStore>,
        config: &AppConfig,
        fallback: Arc<FallbackSequence>,
    ) -> Self {
        let index = config.elasticsearch.index.clone();
        let transliterator = Transliterator::from_config(&config.phonetic);
        log::info!(
            "Trademark service on index '{}' (phonetic converter: {})",
            index,
            transliterator.primary_name()
        );
        Self {
            allocator: PidAllocator::new(store.clone(), index.clone(), fallback),
            store,
            index,
            init_mode: config.data.init_mode,
            max_retries: config.view_count.max_retries,
            queries: QueryBuilder::new(config.paging.clone(), config.query.boosts.clone()),
            normalizer: DocumentNormalizer::new(transliterator),
        }
    }

    pub fn index(&self) -> &str {
        &self.index
    }

    pub fn allocator(&self) -> &PidAllocator {
        &self.allocator
    }

    pub fn normalizer(&self) -> &DocumentNormalizer {
        &self.normalizer
    }

    // ========================================================================
    // Search
    // ========================================================================

    pub async fn search(&self, params: &SearchParams) -> Result<SearchPage> {
        let request = self.queries.build(params)?;
        if let Some(query) = params.query.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
            log::debug!("search '{}' in {:?} mode", query, self.queries.match_mode(query));
        }

        let response = self
            .store
            .search(&self.index, &request)
            .await
            .map_err(|e| store_failure("search", e))?;

        Ok(SearchPage {
            total: response.total,
            page: params.page,
            size: request.size,
            results: response.hits.into_iter().map(|hit| hit.source).collect(),
        })
    }

    pub async fn autocomplete(&self, query: &str, size: Option<u32>) -> Result<AutocompleteResponse> {
        let request = self.queries.build_autocomplete(query, size)?;
        let response = self
            .store
            .search(&self.index, &request)
            .await
            .map_err(|e| store_failure("autocomplete", e))?;

        let suggestions: Vec<AutocompleteSuggestion> = response
            .hits
            .into_iter()
            .filter_map(|hit| {
                let product_name_eng = string_field(&hit.source, PRODUCT_NAME_ENG);
                let text = string_field(&hit.source, PRODUCT_NAME).or_else(|| product_name_eng.clone())?;
                Some(AutocompleteSuggestion {
                    text,
                    product_name_eng,
                    pid: string_field(&hit.source, "pid"),
                    score: hit.score,
                    highlight: hit.highlight,
                })
            })
            .collect();

        // Counts suggestions returned, not engine hits.
        Ok(AutocompleteResponse {
            total: suggestions.len() as u64,
            suggestions,
        })
    }

    // ========================================================================
    // Lookups
    // ========================================================================

    pub async fn get_by_pid(&self, pid: &str) -> Result<Document> {
        let hit = self.find_by_pid(pid).await?;
        Ok(hit.source)
    }

    pub async fn get_by_application_number(&self, number: &str) -> Result<Document> {
        let number = number.trim();
        if number.is_empty() {
            return Err(TrademarkError::invalid("application number must not be empty"));
        }
        self.find_one("applicationNumber", number)
            .await?
            .map(|hit| hit.source)
            .ok_or_else(|| {
                TrademarkError::not_found(format!("application number {}", number))
            })
    }

    async fn find_by_pid(&self, pid: &str) -> Result<SearchHit> {
        if !is_valid_pid(pid) {
            return Err(TrademarkError::invalid(format!("invalid pid format: {}", pid)));
        }
        self.find_one("pid", pid)
            .await?
            .ok_or_else(|| TrademarkError::not_found(format!("pid {}", pid)))
    }

    async fn find_one(&self, field: &str, value: &str) -> Result<Option<SearchHit>> {
        let request = SearchRequest {
            query: json!({ "bool": { "filter": [ { "term": { (field): value } } ] } }),
            size: 1,
            ..Default::default()
        };
        let response = self
            .store
            .search(&self.index, &request)
            .await
            .map_err(|e| store_failure("lookup", e))?;
        Ok(response.hits.into_iter().next())
    }

    // ========================================================================
    // View Count
    // ========================================================================

    /// Add one to a trademark's view count.
    ///
    /// Each attempt writes against the version it read; a concurrent writer
    /// turns the write into a conflict and the read is repeated.
    pub async fn increment_view_count(&self, pid: &str) -> Result<ViewCountUpdate> {
        let attempts = self.max_retries.max(1);

        for attempt in 1..=attempts {
            let hit = self.find_by_pid(pid).await?;
            let view_count = current_view_count(hit.source.get("viewCount")) + 1;

            let mut partial = Document::new();
            partial.insert("viewCount".to_string(), Value::from(view_count));

            let outcome = self
                .store
                .update(&self.index, &hit.id, partial, hit.version)
                .await
                .map_err(|e| store_failure("view count update", e))?;

            match outcome {
                UpdateOutcome::Updated { .. } | UpdateOutcome::Noop { .. } => {
                    return Ok(ViewCountUpdate {
                        pid: pid.to_string(),
                        view_count,
                    });
                }
                UpdateOutcome::Conflict => {
                    log::debug!("view count conflict on pid {} (attempt {}/{})", pid, attempt, attempts);
                }
                UpdateOutcome::NotFound => {
                    return Err(TrademarkError::not_found(format!("pid {}", pid)));
                }
            }
        }

        log::warn!("view count for pid {} gave up after {} attempts", pid, attempts);
        Err(TrademarkError::VersionConflict {
            pid: pid.to_string(),
            attempts,
        })
    }

    // ========================================================================
    // Index Lifecycle
    // ========================================================================

    /// Provision the index according to the configured init mode. Returns
    /// true when a fresh index was created.
    pub async fn ensure_index(&self) -> Result<bool> {
        let exists = self
            .store
            .exists(&self.index)
            .await
            .map_err(|e| store_failure("index check", e))?;

        match self.init_mode {
            InitMode::Create => {
                if exists {
                    log::info!("Dropping index '{}' (init mode create)", self.index);
                    self.store
                        .delete_collection(&self.index)
                        .await
                        .map_err(|e| store_failure("index delete", e))?;
                }
                self.create_index().await?;
                Ok(true)
            }
            InitMode::Update if !exists => {
                self.create_index().await?;
                Ok(true)
            }
            InitMode::Update | InitMode::None => {
                log::info!("Keeping index '{}' (exists: {})", self.index, exists);
                Ok(false)
            }
        }
    }

    async fn create_index(&self) -> Result<()> {
        self.store
            .create_collection(&self.index, &index_definition())
            .await
            .map_err(|e| store_failure("index create", e))?;
        log::info!("Created index '{}'", self.index);
        Ok(())
    }

    // ========================================================================
    // Loading
    // ========================================================================

    /// Load a JSON array of raw trademark records into the index.
    ///
    /// In `create` mode existing documents are replaced. Records without a
    /// pid get consecutive ids from one reserved block.
    pub async fn load_data(&self, path: &Path) -> Result<LoadSummary> {
        let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                TrademarkError::data_load(format!("data file not found: {}", path.display()))
            } else {
                TrademarkError::Io(e)
            }
        })?;
        let records: Vec<Value> = serde_json::from_str(&raw).map_err(|e| {
            TrademarkError::data_load(format!(
                "{} is not a JSON array of records: {}",
                path.display(),
                e
            ))
        })?;
        let total = records.len();
        log::info!("Loading {} records from {}", total, path.display());

        let exists = self
            .store
            .exists(&self.index)
            .await
            .map_err(|e| store_failure("index check", e))?;
        if !exists {
            self.create_index().await?;
        } else if self.init_mode == InitMode::Create {
            let removed = self
                .store
                .delete_all(&self.index)
                .await
                .map_err(|e| store_failure("clear index", e))?;
            log::info!("Removed {} existing documents from '{}'", removed, self.index);
        }

        let objects: Vec<_> = records
            .into_iter()
            .filter_map(|record| match record {
                Value::Object(map) => Some(map),
                other => {
                    log::warn!("Skipping non-object record: {}", other);
                    None
                }
            })
            .collect();
        let skipped = total - objects.len();

        let pids: Vec<Option<String>> = objects.iter().map(|r| pid_text(r.get("pid"))).collect();
        let missing = pids.iter().filter(|pid| pid.is_none()).count();
        // Generated ids must not collide with numeric ids later in the file.
        let batch_max = pids
            .iter()
            .flatten()
            .filter_map(|pid| pid.parse::<u64>().ok())
            .max()
            .unwrap_or(0);
        let mut block = if missing > 0 {
            Some(self.allocator.reserve(missing, batch_max).await)
        } else {
            None
        };

        // The block exists whenever a record lacks a pid.
        let documents: Vec<Document> = objects
            .iter()
            .map(|record| {
                self.normalizer.normalize_with(record, || {
                    block.as_mut().map(PidBlock::next_pid).unwrap_or_default()
                })
            })
            .collect();

        let outcome = if documents.is_empty() {
            Default::default()
        } else {
            self.store
                .bulk_index(&self.index, documents)
                .await
                .map_err(|e| store_failure("bulk index", e))?
        };

        let summary = LoadSummary {
            total,
            success: outcome.success,
            failed: outcome.failed + skipped,
        };
        log::info!(
            "Loaded {}/{} records into '{}' ({} failed)",
            summary.success,
            summary.total,
            self.index,
            summary.failed
        );
        Ok(summary)
    }

    /// Startup load. In `update` mode an index that already holds documents
    /// is left as is and `None` is returned.
    pub async fn auto_load(&self, path: &Path) -> Result<Option<LoadSummary>> {
        if self.init_mode == InitMode::Update
            && self.store.exists(&self.index).await.map_err(|e| store_failure("index check", e))?
        {
            let count = self
                .store
                .count(&self.index)
                .await
                .map_err(|e| store_failure("count", e))?;
            if count > 0 {
                log::info!("Index '{}' already holds {} documents, skipping load", self.index, count);
                return Ok(None);
            }
        }
        self.load_data(path).await.map(Some)
    }

    // ========================================================================
    // Status
    // ========================================================================

    /// Connection and index state. Never fails; problems are reported in
    /// the `error` field.
    pub async fn status(&self) -> StoreStatus {
        let mut status = StoreStatus {
            connected: false,
            engine: None,
            version: None,
            index: self.index.clone(),
            exists: false,
            document_count: 0,
            error: None,
        };

        match self.store.info().await {
            Ok(info) => {
                status.connected = true;
                status.engine = Some(info.engine);
                status.version = Some(info.version);
            }
            Err(e) => {
                status.error = Some(e.to_string());
                return status;
            }
        }

        let counted = async {
            let exists = self.store.exists(&self.index).await?;
            let count = if exists { self.store.count(&self.index).await? } else { 0 };
            Ok::<_, StoreError>((exists, count))
        };
        match counted.await {
            Ok((exists, count)) => {
                status.exists = exists;
                status.document_count = count;
            }
            Err(e) => status.error = Some(e.to_string()),
        }
        status
    }
}

/// Log a store failure and translate it.
fn store_failure(operation: &str, err: StoreError) -> TrademarkError {
    log::error!("{} failed: {}", operation, err);
    err.into()
}

fn string_field(source: &Document, field: &str) -> Option<String> {
    source
        .get(field)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn current_view_count(value: Option<&Value>) -> u64 {
    match value {
        Some(Value::Number(n)) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f > 0.0).map(|f| f as u64))
            .unwrap_or(0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}
