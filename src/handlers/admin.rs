use crate::{error::ShortenerError, models::UrlInfo, shortener, AppState};
use axum::{
    extract::{Path, State},
    http::Uri,
    response::Json,
};
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Serialize)]
pub struct Deleted {
    pub detail: String,
}

/// GET /admin/:secret_key
pub async fn info(
    State(state): State<Arc<AppState>>,
    Path(secret_key): Path<String>,
    uri: Uri,
) -> Result<Json<UrlInfo>, ShortenerError> {
    let url = shortener::fetch_admin_view(&state.db, &secret_key)
        .await
        .map_err(|e| e.for_request(uri.path()))?;

    Ok(Json(UrlInfo::from_record(&url, &state.config.base_url)))
}

/// DELETE /admin/:secret_key
///
/// Soft delete: the record is deactivated, never removed.
pub async fn delete(
    State(state): State<Arc<AppState>>,
    Path(secret_key): Path<String>,
    uri: Uri,
) -> Result<Json<Deleted>, ShortenerError> {
    let url = shortener::deactivate(&state.db, &secret_key)
        .await
        .map_err(|e| e.for_request(uri.path()))?;

    Ok(Json(Deleted {
        detail: format!("Successfully deleted shortened URL for '{}'", url.target_url),
    }))
}
