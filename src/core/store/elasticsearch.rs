//! Elasticsearch Store
//!
//! [`DocumentStore`] over the Elasticsearch REST API using `reqwest`.
//! Transport failures become [`StoreError::Connection`],
//! `index_not_found_exception` becomes [`StoreError::IndexNotFound`] and any
//! other non-2xx answer becomes [`StoreError::Query`] carrying the body.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::{json, Map, Value};

use super::{
    document_id, BulkOutcome, DocVersion, Document, DocumentStore, SearchHit, SearchRequest,
    SearchResponse, StoreError, StoreInfo, StoreResult, UpdateOutcome,
};
use crate::config::ElasticsearchConfig;

// ============================================================================
// Wire Types
// ============================================================================

#[derive(Debug, Deserialize)]
struct SearchBody {
    hits: HitsBody,
}

#[derive(Debug, Deserialize)]
struct HitsBody {
    #[serde(default)]
    total: Option<TotalHits>,
    #[serde(default)]
    hits: Vec<RawHit>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TotalHits {
    Object { value: u64 },
    Count(u64),
}

#[derive(Debug, Deserialize)]
struct RawHit {
    #[serde(rename = "_id")]
    id: String,
    #[serde(rename = "_score", default)]
    score: Option<f64>,
    #[serde(rename = "_source", default)]
    source: Document,
    #[serde(rename = "_seq_no", default)]
    seq_no: Option<u64>,
    #[serde(rename = "_primary_term", default)]
    primary_term: Option<u64>,
    #[serde(default)]
    highlight: Option<Map<String, Value>>,
}

impl From<RawHit> for SearchHit {
    fn from(raw: RawHit) -> Self {
        let version = match (raw.seq_no, raw.primary_term) {
            (Some(seq_no), Some(primary_term)) => Some(DocVersion {
                seq_no,
                primary_term,
            }),
            _ => None,
        };
        Self {
            id: raw.id,
            source: raw.source,
            score: raw.score,
            version,
            highlight: raw.highlight,
        }
    }
}

#[derive(Debug, Deserialize)]
struct WriteResult {
    result: String,
    #[serde(rename = "_seq_no")]
    seq_no: u64,
    #[serde(rename = "_primary_term")]
    primary_term: u64,
}

// ============================================================================
// Client
// ============================================================================

/// HTTP client bound to one Elasticsearch cluster.
#[derive(Debug, Clone)]
pub struct ElasticsearchStore {
    client: Client,
    base_url: String,
}

impl ElasticsearchStore {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> StoreResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StoreError::connection(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &ElasticsearchConfig) -> StoreResult<Self> {
        Self::new(config.url(), Duration::from_secs(config.timeout_secs))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn send(&self, request: RequestBuilder) -> StoreResult<Response> {
        request.send().await.map_err(|e| {
            log::error!("Elasticsearch request failed: {}", e);
            StoreError::connection(e.to_string())
        })
    }

    /// Parse a successful JSON answer or translate the failure.
    async fn read_json(response: Response, index: &str) -> StoreResult<Value> {
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| StoreError::connection(e.to_string()))?;

        if !status.is_success() {
            return Err(error_from_body(status, &text, index));
        }
        if text.is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&text)?)
    }
}

fn error_from_body(status: StatusCode, body: &str, index: &str) -> StoreError {
    if body.contains("index_not_found_exception") {
        StoreError::index_not_found(index)
    } else {
        log::error!("Elasticsearch returned {}: {}", status, body);
        StoreError::query(format!("{}: {}", status, body))
    }
}

#[async_trait]
impl DocumentStore for ElasticsearchStore {
    async fn exists(&self, collection: &str) -> StoreResult<bool> {
        let response = self.send(self.client.head(self.url(collection))).await?;
        match response.status() {
            StatusCode::OK => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            status => Err(StoreError::query(format!(
                "unexpected status {} checking index {}",
                status, collection
            ))),
        }
    }

    async fn create_collection(&self, collection: &str, definition: &Value) -> StoreResult<()> {
        let response = self
            .send(self.client.put(self.url(collection)).json(definition))
            .await?;
        Self::read_json(response, collection).await?;
        log::info!("Created index '{}'", collection);
        Ok(())
    }

    async fn delete_collection(&self, collection: &str) -> StoreResult<()> {
        let response = self.send(self.client.delete(self.url(collection))).await?;
        Self::read_json(response, collection).await?;
        log::info!("Deleted index '{}'", collection);
        Ok(())
    }

    async fn count(&self, collection: &str) -> StoreResult<u64> {
        let response = self
            .send(self.client.get(self.url(&format!("{}/_count", collection))))
            .await?;
        let body = Self::read_json(response, collection).await?;
        body["count"]
            .as_u64()
            .ok_or_else(|| StoreError::query("missing count in response"))
    }

    async fn search(
        &self,
        collection: &str,
        request: &SearchRequest,
    ) -> StoreResult<SearchResponse> {
        let response = self
            .send(
                self.client
                    .post(self.url(&format!("{}/_search", collection)))
                    .json(&request.to_body()),
            )
            .await?;
        let body = Self::read_json(response, collection).await?;
        let parsed: SearchBody = serde_json::from_value(body)?;

        let hits: Vec<SearchHit> = parsed.hits.hits.into_iter().map(SearchHit::from).collect();
        let total = match parsed.hits.total {
            Some(TotalHits::Object { value }) | Some(TotalHits::Count(value)) => value,
            None => hits.len() as u64,
        };
        Ok(SearchResponse { hits, total })
    }

    async fn max_value(&self, collection: &str, field: &str) -> StoreResult<Option<Value>> {
        let body = json!({
            "size": 0,
            "aggs": { "max_value": { "max": { "field": field } } }
        });
        let response = self
            .send(
                self.client
                    .post(self.url(&format!("{}/_search", collection)))
                    .json(&body),
            )
            .await?;
        let body = Self::read_json(response, collection).await?;
        Ok(match &body["aggregations"]["max_value"]["value"] {
            Value::Null => None,
            value => Some(value.clone()),
        })
    }

    async fn update(
        &self,
        collection: &str,
        id: &str,
        partial: Document,
        expected: Option<DocVersion>,
    ) -> StoreResult<UpdateOutcome> {
        let mut query: Vec<(&str, String)> = vec![("refresh", "true".to_string())];
        if let Some(version) = expected {
            query.push(("if_seq_no", version.seq_no.to_string()));
            query.push(("if_primary_term", version.primary_term.to_string()));
        }

        let response = self
            .send(
                self.client
                    .post(self.url(&format!("{}/_update/{}", collection, id)))
                    .query(&query)
                    .json(&json!({ "doc": partial })),
            )
            .await?;

        let status = response.status();
        if status == StatusCode::CONFLICT {
            log::debug!("Version conflict updating {}/{}", collection, id);
            return Ok(UpdateOutcome::Conflict);
        }
        if status == StatusCode::NOT_FOUND {
            let text = response
                .text()
                .await
                .map_err(|e| StoreError::connection(e.to_string()))?;
            return if text.contains("index_not_found_exception") {
                Err(StoreError::index_not_found(collection))
            } else {
                Ok(UpdateOutcome::NotFound)
            };
        }

        let body = Self::read_json(response, collection).await?;
        let result: WriteResult = serde_json::from_value(body)?;
        let version = DocVersion {
            seq_no: result.seq_no,
            primary_term: result.primary_term,
        };
        Ok(if result.result == "noop" {
            UpdateOutcome::Noop { version }
        } else {
            UpdateOutcome::Updated { version }
        })
    }

    async fn bulk_index(
        &self,
        collection: &str,
        documents: Vec<Document>,
    ) -> StoreResult<BulkOutcome> {
        if documents.is_empty() {
            return Ok(BulkOutcome::default());
        }

        let mut ndjson = String::new();
        for document in &documents {
            let action = match document_id(document) {
                Some(id) => json!({ "index": { "_index": collection, "_id": id } }),
                None => json!({ "index": { "_index": collection } }),
            };
            ndjson.push_str(&serde_json::to_string(&action)?);
            ndjson.push('\n');
            ndjson.push_str(&serde_json::to_string(document)?);
            ndjson.push('\n');
        }

        let response = self
            .send(
                self.client
                    .post(self.url("_bulk"))
                    .query(&[("refresh", "true")])
                    .header("Content-Type", "application/x-ndjson")
                    .body(ndjson),
            )
            .await?;
        let body = Self::read_json(response, collection).await?;

        let items = body["items"].as_array().cloned().unwrap_or_default();
        let mut outcome = BulkOutcome::default();
        for item in &items {
            let status = item["index"]["status"].as_u64().unwrap_or(500);
            if (200..300).contains(&status) {
                outcome.success += 1;
            } else {
                outcome.failed += 1;
                log::warn!(
                    "Bulk item {} failed: {}",
                    item["index"]["_id"],
                    item["index"]["error"]
                );
            }
        }
        // Items the response does not mention did not make it.
        outcome.failed += documents.len().saturating_sub(items.len());

        log::info!(
            "Bulk indexed into '{}': {} ok, {} failed",
            collection,
            outcome.success,
            outcome.failed
        );
        Ok(outcome)
    }

    async fn delete_all(&self, collection: &str) -> StoreResult<u64> {
        let response = self
            .send(
                self.client
                    .post(self.url(&format!("{}/_delete_by_query", collection)))
                    .query(&[("refresh", "true")])
                    .json(&json!({ "query": { "match_all": {} } })),
            )
            .await?;
        let body = Self::read_json(response, collection).await?;
        Ok(body["deleted"].as_u64().unwrap_or(0))
    }

    async fn info(&self) -> StoreResult<StoreInfo> {
        let response = self.send(self.client.get(self.url(""))).await?;
        let body = Self::read_json(response, "").await?;
        let version = body["version"]["number"]
            .as_str()
            .ok_or_else(|| StoreError::query("missing version in cluster info"))?;
        Ok(StoreInfo {
            engine: "elasticsearch".to_string(),
            version: version.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn store(server: &MockServer) -> ElasticsearchStore {
        ElasticsearchStore::new(server.uri(), Duration::from_secs(5)).unwrap()
    }

    fn index_missing_body() -> Value {
        json!({
            "error": { "type": "index_not_found_exception", "reason": "no such index [trademarks]" },
            "status": 404
        })
    }

    #[tokio::test]
    async fn test_exists() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/trademarks"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        Mock::given(method("HEAD"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let store = store(&server);
        assert!(store.exists("trademarks").await.unwrap());
        assert!(!store.exists("missing").await.unwrap());
    }

    #[tokio::test]
    async fn test_search_parses_hits_and_versions() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/trademarks/_search"))
            .and(body_partial_json(json!({ "seq_no_primary_term": true, "from": 0 })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "hits": {
                    "total": { "value": 2, "relation": "eq" },
                    "hits": [
                        {
                            "_id": "1",
                            "_score": 3.5,
                            "_seq_no": 4,
                            "_primary_term": 1,
                            "_source": { "pid": "1", "productName": "삼성전자" },
                            "highlight": { "productName": ["<mark>삼성</mark>전자"] }
                        },
                        { "_id": "2", "_score": null, "_source": { "pid": "2" } }
                    ]
                }
            })))
            .mount(&server)
            .await;

        let request = SearchRequest {
            query: json!({ "match_all": {} }),
            size: 10,
            ..Default::default()
        };
        let response = store(&server).search("trademarks", &request).await.unwrap();

        assert_eq!(response.total, 2);
        assert_eq!(response.hits.len(), 2);
        assert_eq!(response.hits[0].score, Some(3.5));
        assert_eq!(
            response.hits[0].version,
            Some(DocVersion {
                seq_no: 4,
                primary_term: 1
            })
        );
        assert!(response.hits[0].highlight.is_some());
        assert_eq!(response.hits[1].version, None);
        assert_eq!(response.hits[1].source["pid"], "2");
    }

    #[tokio::test]
    async fn test_search_index_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/trademarks/_search"))
            .respond_with(ResponseTemplate::new(404).set_body_json(index_missing_body()))
            .mount(&server)
            .await;

        let request = SearchRequest::default();
        let err = store(&server).search("trademarks", &request).await.unwrap_err();
        assert!(matches!(err, StoreError::IndexNotFound(ref i) if i == "trademarks"));
    }

    #[tokio::test]
    async fn test_search_bad_request_is_query_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/trademarks/_search"))
            .respond_with(ResponseTemplate::new(400).set_body_string("parsing_exception"))
            .mount(&server)
            .await;

        let err = store(&server)
            .search("trademarks", &SearchRequest::default())
            .await
            .unwrap_err();
        match err {
            StoreError::Query(msg) => assert!(msg.contains("parsing_exception")),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_connection_refused() {
        // Nothing listens on port 1.
        let store = ElasticsearchStore::new("http://127.0.0.1:1", Duration::from_secs(1)).unwrap();
        let err = store.count("trademarks").await.unwrap_err();
        assert!(matches!(err, StoreError::Connection(_)));
    }

    #[tokio::test]
    async fn test_max_value() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/trademarks/_search"))
            .and(body_partial_json(json!({
                "size": 0,
                "aggs": { "max_value": { "max": { "field": "pid.numeric" } } }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "hits": { "hits": [] },
                "aggregations": { "max_value": { "value": 7.0 } }
            })))
            .mount(&server)
            .await;

        let max = store(&server)
            .max_value("trademarks", "pid.numeric")
            .await
            .unwrap();
        assert_eq!(max, Some(json!(7.0)));
    }

    #[tokio::test]
    async fn test_max_value_empty_collection() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/trademarks/_search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "aggregations": { "max_value": { "value": null } }
            })))
            .mount(&server)
            .await;

        let max = store(&server)
            .max_value("trademarks", "pid.numeric")
            .await
            .unwrap();
        assert_eq!(max, None);
    }

    #[tokio::test]
    async fn test_update_with_version() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/trademarks/_update/5"))
            .and(query_param("if_seq_no", "3"))
            .and(query_param("if_primary_term", "1"))
            .and(body_partial_json(json!({ "doc": { "viewCount": 2 } })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": "updated", "_seq_no": 4, "_primary_term": 1
            })))
            .mount(&server)
            .await;

        let mut partial = Document::new();
        partial.insert("viewCount".into(), json!(2));
        let outcome = store(&server)
            .update(
                "trademarks",
                "5",
                partial,
                Some(DocVersion {
                    seq_no: 3,
                    primary_term: 1,
                }),
            )
            .await
            .unwrap();
        assert_eq!(
            outcome,
            UpdateOutcome::Updated {
                version: DocVersion {
                    seq_no: 4,
                    primary_term: 1
                }
            }
        );
    }

    #[tokio::test]
    async fn test_update_conflict_and_missing() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/trademarks/_update/5"))
            .respond_with(ResponseTemplate::new(409).set_body_json(json!({
                "error": { "type": "version_conflict_engine_exception" }
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/trademarks/_update/6"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "error": { "type": "document_missing_exception" }
            })))
            .mount(&server)
            .await;

        let store = store(&server);
        let outcome = store
            .update("trademarks", "5", Document::new(), None)
            .await
            .unwrap();
        assert_eq!(outcome, UpdateOutcome::Conflict);

        let outcome = store
            .update("trademarks", "6", Document::new(), None)
            .await
            .unwrap();
        assert_eq!(outcome, UpdateOutcome::NotFound);
    }

    #[tokio::test]
    async fn test_bulk_index_counts_items() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/_bulk"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "errors": true,
                "items": [
                    { "index": { "_id": "1", "status": 201 } },
                    { "index": { "_id": "2", "status": 400, "error": { "type": "mapper_parsing_exception" } } }
                ]
            })))
            .mount(&server)
            .await;

        let docs: Vec<Document> = ["1", "2"]
            .iter()
            .map(|pid| {
                let mut doc = Document::new();
                doc.insert("pid".into(), json!(pid));
                doc
            })
            .collect();
        let outcome = store(&server).bulk_index("trademarks", docs).await.unwrap();
        assert_eq!(
            outcome,
            BulkOutcome {
                success: 1,
                failed: 1
            }
        );
    }

    #[tokio::test]
    async fn test_count_delete_all_and_info() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/trademarks/_count"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "count": 42 })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/trademarks/_delete_by_query"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "deleted": 42 })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "version": { "number": "8.11.0" }
            })))
            .mount(&server)
            .await;

        let store = store(&server);
        assert_eq!(store.count("trademarks").await.unwrap(), 42);
        assert_eq!(store.delete_all("trademarks").await.unwrap(), 42);
        let info = store.info().await.unwrap();
        assert_eq!(info.engine, "elasticsearch");
        assert_eq!(info.version, "8.11.0");
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let store = ElasticsearchStore::new("http://es:9200/", Duration::from_secs(1)).unwrap();
        assert_eq!(store.base_url(), "http://es:9200");
        assert_eq!(store.url("trademarks/_count"), "http://es:9200/trademarks/_count");
        assert_eq!(store.url(""), "http://es:9200/");
    }
}
