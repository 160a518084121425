use crate::models::Url;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
    SqlitePool,
};

// ── Pool ───────────────────────────────────────────────────────────────────

/// Open the SQLite pool (creating the file if it doesn't exist yet) and run
/// the embedded migrations from `migrations/`.
pub async fn connect(database_url: &str) -> anyhow::Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .connect_with(
            database_url
                .parse::<SqliteConnectOptions>()?
                .create_if_missing(true)
                .journal_mode(SqliteJournalMode::Wal),
        )
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;
    tracing::info!("Database migrations applied");

    Ok(pool)
}

/// Total number of records, active or not.
pub async fn count_urls(pool: &SqlitePool) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM urls")
        .fetch_one(pool)
        .await
}

// ── Lookups ────────────────────────────────────────────────────────────────

/// Fetch a record by its public key, whatever its status.
pub async fn find_by_key(pool: &SqlitePool, key: &str) -> Result<Option<Url>, sqlx::Error> {
    sqlx::query_as(
        "SELECT id, key, secret_key, target_url, is_active, clicks
         FROM urls WHERE key = ?1",
    )
    .bind(key)
    .fetch_optional(pool)
    .await
}

/// Fetch a record by its public key, only if it is still active.
pub async fn find_active_by_key(
    pool: &SqlitePool,
    key: &str,
) -> Result<Option<Url>, sqlx::Error> {
    sqlx::query_as(
        "SELECT id, key, secret_key, target_url, is_active, clicks
         FROM urls WHERE key = ?1 AND is_active = 1",
    )
    .bind(key)
    .fetch_optional(pool)
    .await
}

/// Fetch a record by its secret key, whatever its status.
pub async fn find_by_secret_key(
    pool: &SqlitePool,
    secret_key: &str,
) -> Result<Option<Url>, sqlx::Error> {
    sqlx::query_as(
        "SELECT id, key, secret_key, target_url, is_active, clicks
         FROM urls WHERE secret_key = ?1",
    )
    .bind(secret_key)
    .fetch_optional(pool)
    .await
}

// ── Writes ─────────────────────────────────────────────────────────────────

/// Insert a new active record with zero clicks and return the stored row.
///
/// A duplicate `key` or `secret_key` surfaces as a database error whose
/// `is_unique_violation()` is true.
pub async fn insert(
    pool: &SqlitePool,
    key: &str,
    secret_key: &str,
    target_url: &str,
) -> Result<Url, sqlx::Error> {
    sqlx::query_as(
        "INSERT INTO urls (key, secret_key, target_url, is_active, clicks)
         VALUES (?1, ?2, ?3, 1, 0)
         RETURNING id, key, secret_key, target_url, is_active, clicks",
    )
    .bind(key)
    .bind(secret_key)
    .bind(target_url)
    .fetch_one(pool)
    .await
}

/// Add one click in a single statement so concurrent forwards never lose an
/// increment. Returns the updated row, or `None` if the id is unknown.
pub async fn increment_clicks(pool: &SqlitePool, id: i64) -> Result<Option<Url>, sqlx::Error> {
    sqlx::query_as(
        "UPDATE urls SET clicks = clicks + 1 WHERE id = ?1
         RETURNING id, key, secret_key, target_url, is_active, clicks",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
}

/// Set the active flag. Returns the updated row, or `None` if the id is unknown.
pub async fn set_active(
    pool: &SqlitePool,
    id: i64,
    is_active: bool,
) -> Result<Option<Url>, sqlx::Error> {
    sqlx::query_as(
        "UPDATE urls SET is_active = ?2 WHERE id = ?1
         RETURNING id, key, secret_key, target_url, is_active, clicks",
    )
    .bind(id)
    .bind(is_active)
    .fetch_optional(pool)
    .await
}

// ── Test support ───────────────────────────────────────────────────────────

/// A migrated in-memory database. Pinned to one connection that never
/// expires, since every SQLite memory connection is its own database.
/// Callers queue on that connection, hence the long acquire timeout.
#[cfg(test)]
pub async fn test_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .acquire_timeout(std::time::Duration::from_secs(300))
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .expect("open in-memory sqlite");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("run migrations");

    pool
}
