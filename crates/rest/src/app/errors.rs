use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use stockledger_core::{ErrorKind, LedgerError};

/// Map a ledger error onto the HTTP surface.
///
/// | kind                | status |
/// |---------------------|--------|
/// | invalid_argument    | 400    |
/// | not_found           | 404    |
/// | failed_precondition | 422    |
/// | aborted             | 409    |
/// | unavailable         | 503    |
/// | internal            | 500    |
pub fn ledger_error_to_response(err: LedgerError) -> axum::response::Response {
    let status = match err.kind() {
        ErrorKind::InvalidArgument => StatusCode::BAD_REQUEST,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::FailedPrecondition => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::Aborted => StatusCode::CONFLICT,
        ErrorKind::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    };
    json_error(status, err.kind().as_str(), err.to_string())
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
