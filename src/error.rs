use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};

pub type Result<T> = std::result::Result<T, ShortenerError>;

#[derive(Debug, thiserror::Error)]
pub enum ShortenerError {
    /// The target URL handed to `create` is not an absolute http(s) URL.
    #[error("Your provided URL is not valid")]
    InvalidUrl(String),

    /// The request body could not be read as the expected JSON shape.
    #[error("{0}")]
    BadRequest(String),

    /// Internal misuse, e.g. asking the generator for a zero-length key.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("no unused key of length {length} found after {attempts} attempts")]
    ExhaustedKeyspace { length: usize, attempts: usize },

    /// The UNIQUE constraint on `key` or `secret_key` rejected an insert.
    #[error("generated key collided with an existing record")]
    Conflict,

    /// Carries the identity of whatever could not be resolved.
    #[error("URL '{0}' doesn't exist")]
    NotFound(String),

    #[error("storage failure: {0}")]
    Storage(#[from] sqlx::Error),
}

impl ShortenerError {
    /// Stable, machine-checkable name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            ShortenerError::InvalidUrl(_) => "invalid_url",
            ShortenerError::BadRequest(_) => "bad_request",
            ShortenerError::InvalidArgument(_) => "invalid_argument",
            ShortenerError::ExhaustedKeyspace { .. } => "exhausted_keyspace",
            ShortenerError::Conflict => "conflict",
            ShortenerError::NotFound(_) => "not_found",
            ShortenerError::Storage(_) => "storage_failure",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ShortenerError::InvalidUrl(_) | ShortenerError::BadRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            ShortenerError::NotFound(_) => StatusCode::NOT_FOUND,
            ShortenerError::Conflict => StatusCode::CONFLICT,
            ShortenerError::InvalidArgument(_)
            | ShortenerError::ExhaustedKeyspace { .. }
            | ShortenerError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Classify a failed INSERT: UNIQUE violations are `Conflict`, anything
    /// else is an opaque storage failure.
    pub fn from_insert(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                ShortenerError::Conflict
            }
            _ => ShortenerError::Storage(err),
        }
    }

    /// Replace the identity carried by `NotFound` with the path the client
    /// actually requested. Other kinds pass through untouched.
    pub fn for_request(self, path: &str) -> Self {
        match self {
            ShortenerError::NotFound(_) => ShortenerError::NotFound(path.to_owned()),
            other => other,
        }
    }
}

impl IntoResponse for ShortenerError {
    fn into_response(self) -> Response {
        let status = self.status();

        let detail = if status.is_server_error() {
            tracing::error!("Request failed ({}): {:?}", self.kind(), self);
            "Internal server error".to_owned()
        } else {
            self.to_string()
        };

        let body = Json(serde_json::json!({
            "error": self.kind(),
            "detail": detail,
        }));

        (status, body).into_response()
    }
}
