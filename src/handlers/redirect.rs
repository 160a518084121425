use crate::{error::ShortenerError, shortener, AppState};
use axum::{
    extract::{Path, State},
    http::Uri,
    response::Redirect,
};
use std::sync::Arc;

/// GET /:key
///
/// Count the click and send a 307 to the target. Unknown and deactivated
/// keys both answer 404 with the requested path echoed back.
pub async fn redirect(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
    uri: Uri,
) -> Result<Redirect, ShortenerError> {
    let target_url = shortener::resolve_for_forwarding(&state.db, &key)
        .await
        .map_err(|e| e.for_request(uri.path()))?;

    Ok(Redirect::temporary(&target_url))
}
