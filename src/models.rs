use serde::{Deserialize, Serialize};

/// A shortened URL record from the `urls` table.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Url {
    pub id: i64,
    pub key: String,
    pub secret_key: String,
    pub target_url: String,
    pub is_active: bool,
    pub clicks: i64,
}

/// Body of `POST /url`.
#[derive(Debug, Deserialize)]
pub struct CreateUrl {
    pub target_url: String,
}

/// What clients see for a record: the stored fields plus the public and
/// admin URLs built from the configured base URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[cfg_attr(test, derive(Deserialize))]
pub struct UrlInfo {
    pub target_url: String,
    pub is_active: bool,
    pub clicks: i64,
    pub url: String,
    pub admin_url: String,
}

impl UrlInfo {
    pub fn from_record(record: &Url, base_url: &str) -> Self {
        Self {
            target_url: record.target_url.clone(),
            is_active: record.is_active,
            clicks: record.clicks,
            url: format!("{base_url}/{}", record.key),
            admin_url: format!("{base_url}/admin/{}", record.secret_key),
        }
    }
}
