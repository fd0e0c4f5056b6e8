//! HTTP error responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::core::trademark::TrademarkError;

/// A [`TrademarkError`] rendered as `{"detail": message}` with a matching
/// status code.
#[derive(Debug)]
pub struct ApiError(pub TrademarkError);

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match &self.0 {
            TrademarkError::IndexNotFound(_) | TrademarkError::NotFound(_) => StatusCode::NOT_FOUND,
            TrademarkError::ConnectionFailure(_) => StatusCode::SERVICE_UNAVAILABLE,
            TrademarkError::InvalidParameter(_) => StatusCode::UNPROCESSABLE_ENTITY,
            TrademarkError::QueryExecution(_) => StatusCode::BAD_REQUEST,
            TrademarkError::VersionConflict { .. } => StatusCode::CONFLICT,
            TrademarkError::DataLoad(_) | TrademarkError::Io(_) | TrademarkError::Serialization(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<TrademarkError> for ApiError {
    fn from(err: TrademarkError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            log::error!("{}", self.0);
        } else {
            log::debug!("{}: {}", status, self.0);
        }
        (status, Json(json!({ "detail": self.0.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(TrademarkError::IndexNotFound("trademarks".into()), StatusCode::NOT_FOUND)]
    #[case(TrademarkError::not_found("pid 9"), StatusCode::NOT_FOUND)]
    #[case(TrademarkError::ConnectionFailure("refused".into()), StatusCode::SERVICE_UNAVAILABLE)]
    #[case(TrademarkError::invalid("page"), StatusCode::UNPROCESSABLE_ENTITY)]
    #[case(TrademarkError::QueryExecution("parse".into()), StatusCode::BAD_REQUEST)]
    #[case(TrademarkError::VersionConflict { pid: "1".into(), attempts: 3 }, StatusCode::CONFLICT)]
    #[case(TrademarkError::data_load("missing"), StatusCode::INTERNAL_SERVER_ERROR)]
    fn test_status_mapping(#[case] err: TrademarkError, #[case] expected: StatusCode) {
        assert_eq!(ApiError(err).status_code(), expected);
    }
}
