//! Handlers de l'API `/api/*` et leur gestion d'erreurs commune.
//!
//! Politique : une donnée absente n'est jamais une erreur côté client
//! (réponse 200 avec valeurs vides ou factices). Seuls les paramètres
//! invalides (400) et les pannes du backend (500) remontent.

pub mod cluster;
pub mod metrics;

use axum::extract::{FromRequestParts, Query};
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::storage::StorageError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(&'static str),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, Json(json!({ "error": msg }))).into_response()
            }
            ApiError::Storage(e) => {
                tracing::error!(error = %e, "storage failure");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({
                        "error": "Internal server error",
                        "message": e.to_string(),
                    })),
                )
                    .into_response()
            }
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

/// Query string brute : une clé répétée garde sa première valeur,
/// une valeur vide vaut absente.
#[derive(Debug, Default)]
pub struct QueryParams(Vec<(String, String)>);

impl QueryParams {
    pub fn first(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
            .filter(|value| !value.is_empty())
    }
}

impl<S: Send + Sync> FromRequestParts<S> for QueryParams {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(pairs) = Query::<Vec<(String, String)>>::from_request_parts(parts, state)
            .await
            .map_err(|e| {
                tracing::debug!(error = %e, "unreadable query string");
                ApiError::BadRequest("Invalid query string")
            })?;
        Ok(Self(pairs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> QueryParams {
        QueryParams(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    #[test]
    fn test_first_value_wins_on_repeated_key() {
        let query = params(&[("name", "foo"), ("type", "users"), ("name", "bar")]);
        assert_eq!(query.first("name"), Some("foo"));
        assert_eq!(query.first("type"), Some("users"));
    }

    #[test]
    fn test_empty_or_missing_value_is_absent() {
        let query = params(&[("name", ""), ("name", "late")]);
        assert_eq!(query.first("name"), None);
        assert_eq!(query.first("type"), None);
    }
}
