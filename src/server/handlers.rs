use std::path::PathBuf;

use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{ApiError, AppState};
use crate::core::store::Document;
use crate::core::trademark::models::{AutocompleteResponse, SearchPage, StoreStatus, ViewCountUpdate};
use crate::core::trademark::query::{parse_sort_list, SearchParams};
use crate::core::trademark::TrademarkError;

type ApiResult<T> = Result<Json<T>, ApiError>;

#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    pub query: Option<String>,
    pub status: Option<String>,
    pub main_code: Option<String>,
    pub sub_code: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub page: Option<u32>,
    pub size: Option<u32>,
    /// Comma-separated `field[:order]` list.
    pub sort: Option<String>,
}

impl SearchQuery {
    fn into_params(self) -> Result<SearchParams, TrademarkError> {
        Ok(SearchParams {
            query: self.query,
            status: non_empty(self.status),
            main_code: non_empty(self.main_code),
            sub_code: non_empty(self.sub_code),
            start_date: parse_date("start_date", self.start_date)?,
            end_date: parse_date("end_date", self.end_date)?,
            page: self.page.unwrap_or(1),
            size: self.size,
            sort: match self.sort {
                Some(sort) => parse_sort_list(&sort)?,
                None => Vec::new(),
            },
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn parse_date(name: &str, value: Option<String>) -> Result<Option<NaiveDate>, TrademarkError> {
    match non_empty(value) {
        None => Ok(None),
        Some(raw) => NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
            .map(Some)
            .map_err(|_| TrademarkError::invalid(format!("{} must be YYYY-MM-DD, got '{}'", name, raw))),
    }
}

#[derive(Debug, Deserialize)]
pub struct AutocompleteQuery {
    #[serde(default)]
    pub query: String,
    pub size: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct LoadDataQuery {
    pub file_path: PathBuf,
}

pub async fn root() -> Json<Value> {
    Json(json!({
        "message": "Trademark search API",
        "version": crate::VERSION,
        "api_prefix": "/api"
    }))
}

pub async fn health(State(state): State<AppState>) -> Json<Value> {
    let status = state.service.status().await;
    let configuration = json!({
        "init_mode": state.init_mode,
        "load_mode": state.load_mode,
    });
    if status.connected {
        Json(json!({
            "status": "healthy",
            "store": status,
            "configuration": configuration,
        }))
    } else {
        Json(json!({
            "status": "unhealthy",
            "detail": status.error,
            "configuration": configuration,
        }))
    }
}

pub async fn search(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> ApiResult<SearchPage> {
    let params = query.into_params()?;
    log::info!("search request: query={:?} page={}", params.query, params.page);
    let page = state.service.search(&params).await?;
    log::info!("search returned {} of {} results", page.results.len(), page.total);
    Ok(Json(page))
}

pub async fn autocomplete(
    State(state): State<AppState>,
    Query(query): Query<AutocompleteQuery>,
) -> ApiResult<AutocompleteResponse> {
    Ok(Json(state.service.autocomplete(&query.query, query.size).await?))
}

pub async fn status(State(state): State<AppState>) -> Json<StoreStatus> {
    Json(state.service.status().await)
}

pub async fn load_data(
    State(state): State<AppState>,
    Query(query): Query<LoadDataQuery>,
) -> ApiResult<Value> {
    log::info!("load-data request: {}", query.file_path.display());
    let summary = state.service.load_data(&query.file_path).await?;
    Ok(Json(json!({
        "message": "Data load complete",
        "total": summary.total,
        "success": summary.success,
        "failed": summary.failed,
    })))
}

pub async fn get_by_pid(State(state): State<AppState>, Path(pid): Path<String>) -> ApiResult<Document> {
    Ok(Json(state.service.get_by_pid(&pid).await?))
}

pub async fn get_by_application_number(
    State(state): State<AppState>,
    Path(number): Path<String>,
) -> ApiResult<Document> {
    Ok(Json(state.service.get_by_application_number(&number).await?))
}

pub async fn increment_view_count(
    State(state): State<AppState>,
    Path(pid): Path<String>,
) -> ApiResult<ViewCountUpdate> {
    Ok(Json(state.service.increment_view_count(&pid).await?))
}
