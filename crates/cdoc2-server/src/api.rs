//! Key capsule HTTP API
//!
//!   POST /key-capsules        → 201, Location + x-expiry-time   (put mode)
//!   GET  /key-capsules/{id}   → 200 capsule JSON | 404 | 401    (get mode)
//!
//! The operation a deployment does not serve answers 405.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use cdoc2_capsule::CapsuleError;
use cdoc2_core::types::Capsule;
use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use tracing::error;

use crate::identity::ClientIdentity;
use crate::server::AppState;

/// Request header with the sender's requested expiry, and response header
/// with the effective one.
pub const EXPIRY_TIME_HEADER: &str = "x-expiry-time";

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Unauthorized,
    NotFound,
    MethodNotAllowed,
    Internal,
}

impl From<CapsuleError> for ApiError {
    fn from(e: CapsuleError) -> Self {
        match e {
            CapsuleError::Validation(msg) => ApiError::BadRequest(msg),
            CapsuleError::UnsupportedCapsuleType(t) => {
                ApiError::BadRequest(format!("unsupported capsule type: {t}"))
            }
            CapsuleError::NotFound => ApiError::NotFound,
            CapsuleError::DuplicateTransactionId(_)
            | CapsuleError::Storage(_)
            | CapsuleError::Crypto(_) => ApiError::Internal,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "client certificate required".to_string(),
            ),
            ApiError::NotFound => (StatusCode::NOT_FOUND, "key capsule not found".to_string()),
            ApiError::MethodNotAllowed => (
                StatusCode::METHOD_NOT_ALLOWED,
                "operation not served by this instance".to_string(),
            ),
            ApiError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal server error".to_string(),
            ),
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

pub async fn create_capsule(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<Capsule>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(capsule) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let requested = requested_expiry(&headers)?;

    let outcome = state.service.store(capsule, requested).await?;
    state.metrics.created.inc();

    let location = format!("/key-capsules/{}", outcome.transaction_id);
    let expiry = format_expiry(outcome.expiry_time);
    let mut response = StatusCode::CREATED.into_response();
    let response_headers = response.headers_mut();
    response_headers.insert(header::LOCATION, header_value(&location)?);
    response_headers.insert(EXPIRY_TIME_HEADER, header_value(&expiry)?);
    Ok(response)
}

pub async fn get_capsule(
    State(state): State<AppState>,
    identity: ClientIdentity,
    Path(transaction_id): Path<String>,
) -> Result<Json<Capsule>, ApiError> {
    match state.service.fetch(&transaction_id, &identity.0).await {
        Ok(capsule) => {
            state.metrics.fetched.inc();
            Ok(Json(capsule))
        }
        Err(CapsuleError::NotFound) => {
            state.metrics.not_found.inc();
            Err(ApiError::NotFound)
        }
        Err(e) => Err(e.into()),
    }
}

pub async fn not_served() -> ApiError {
    ApiError::MethodNotAllowed
}

fn requested_expiry(headers: &HeaderMap) -> Result<Option<DateTime<Utc>>, ApiError> {
    let Some(value) = headers.get(EXPIRY_TIME_HEADER) else {
        return Ok(None);
    };
    let text = value
        .to_str()
        .map_err(|_| ApiError::BadRequest(format!("{EXPIRY_TIME_HEADER} is not ASCII")))?;
    parse_expiry(text)
        .map(Some)
        .ok_or_else(|| ApiError::BadRequest(format!("invalid {EXPIRY_TIME_HEADER}: {text}")))
}

/// RFC 3339 with an offset, or a bare local date-time taken as UTC.
pub fn parse_expiry(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

pub fn format_expiry(expiry: DateTime<Utc>) -> String {
    expiry.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

fn header_value(s: &str) -> Result<HeaderValue, ApiError> {
    HeaderValue::from_str(s).map_err(|e| {
        error!("invalid response header value: {e}");
        ApiError::Internal
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_expiry_rfc3339() {
        let expected = Utc.with_ymd_and_hms(2026, 5, 1, 10, 0, 0).unwrap();
        assert_eq!(parse_expiry("2026-05-01T10:00:00Z"), Some(expected));
        assert_eq!(parse_expiry("2026-05-01T12:00:00+02:00"), Some(expected));
    }

    #[test]
    fn test_parse_expiry_local_is_utc() {
        let expected = Utc.with_ymd_and_hms(2026, 5, 1, 10, 0, 0).unwrap();
        assert_eq!(parse_expiry("2026-05-01T10:00:00"), Some(expected));
        assert!(parse_expiry("2026-05-01T10:00:00.250").is_some());
    }

    #[test]
    fn test_parse_expiry_garbage() {
        assert_eq!(parse_expiry("tomorrow"), None);
        assert_eq!(parse_expiry("2026-13-01T10:00:00Z"), None);
        assert_eq!(parse_expiry(""), None);
    }

    #[test]
    fn test_format_expiry() {
        let t = Utc.with_ymd_and_hms(2028, 2, 29, 23, 59, 59).unwrap();
        assert_eq!(format_expiry(t), "2028-02-29T23:59:59Z");
    }

    #[test]
    fn test_error_mapping() {
        let status = |e: CapsuleError| ApiError::from(e).into_response().status();
        assert_eq!(status(CapsuleError::Validation("x".into())), StatusCode::BAD_REQUEST);
        assert_eq!(
            status(CapsuleError::UnsupportedCapsuleType(
                cdoc2_core::types::CapsuleType::Unknown
            )),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(status(CapsuleError::NotFound), StatusCode::NOT_FOUND);
        assert_eq!(status(CapsuleError::Storage("db".into())), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            status(CapsuleError::DuplicateTransactionId("KC".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
