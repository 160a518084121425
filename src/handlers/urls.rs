use crate::{
    error::ShortenerError,
    models::{CreateUrl, UrlInfo},
    shortener, AppState,
};
use axum::{
    extract::{rejection::JsonRejection, State},
    response::Json,
};
use std::sync::Arc;

/// GET /
pub async fn index() -> &'static str {
    "Welcome to the URL shortener API :)"
}

/// POST /url
///
/// Validate the target, mint a public and a secret key, and return both
/// through the `url` and `admin_url` fields. Malformed bodies get the same
/// JSON error shape as every other failure.
pub async fn create_url(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CreateUrl>, JsonRejection>,
) -> Result<Json<UrlInfo>, ShortenerError> {
    let Json(body) = payload.map_err(|rej| ShortenerError::BadRequest(rej.body_text()))?;
    let url = shortener::create(&state.db, &state.config.keys, &body.target_url).await?;
    Ok(Json(UrlInfo::from_record(&url, &state.config.base_url)))
}
