//! Lifecycle of a shortened URL: create, forward, inspect, deactivate.
//!
//! A record starts active with zero clicks. Forwarding bumps the click
//! counter; deactivation flips it to inactive for good. Inactive records are
//! invisible to forwarding but stay readable through their secret key.

use crate::{
    config::KeyConfig,
    db,
    error::{Result, ShortenerError},
    keygen,
    models::Url,
};
use sqlx::SqlitePool;
use std::future::Future;

/// Validate `target_url` and persist a new record under fresh public and
/// secret keys. The returned record is the only place the secret key is
/// handed out without an admin lookup.
pub async fn create(pool: &SqlitePool, keys: &KeyConfig, target_url: &str) -> Result<Url> {
    create_with(pool, keys, target_url, || pick_keys(pool, keys)).await
}

/// `create` with the key source supplied by the caller. `pick` runs once per
/// attempt; a UNIQUE rejection on insert throws the pair away and asks again,
/// up to `max_create_attempts` times.
async fn create_with<F, Fut>(
    pool: &SqlitePool,
    keys: &KeyConfig,
    target_url: &str,
    mut pick: F,
) -> Result<Url>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<(String, String)>>,
{
    let target_url = validate_target_url(target_url)?;

    for attempt in 1..=keys.max_create_attempts {
        let (key, secret_key) = pick().await?;

        match db::insert(pool, &key, &secret_key, &target_url).await {
            Ok(url) => {
                tracing::info!("Created short key '{}' for {}", url.key, url.target_url);
                return Ok(url);
            }
            Err(e) => match ShortenerError::from_insert(e) {
                ShortenerError::Conflict => {
                    tracing::warn!(
                        "Key '{}' taken between check and insert (attempt {}/{})",
                        key,
                        attempt,
                        keys.max_create_attempts
                    );
                }
                other => return Err(other),
            },
        }
    }

    Err(ShortenerError::Conflict)
}

/// A public and a secret key, each unused at the time it was checked.
async fn pick_keys(pool: &SqlitePool, keys: &KeyConfig) -> Result<(String, String)> {
    let key = keygen::generate_unique(
        keys.key_length,
        keys.max_key_attempts,
        move |c| async move {
            db::find_by_key(pool, &c)
                .await
                .map(|found| found.is_some())
                .map_err(ShortenerError::from)
        },
    )
    .await?;

    let secret_key = keygen::generate_unique(
        keys.secret_key_length,
        keys.max_key_attempts,
        move |c| async move {
            db::find_by_secret_key(pool, &c)
                .await
                .map(|found| found.is_some())
                .map_err(ShortenerError::from)
        },
    )
    .await?;

    Ok((key, secret_key))
}

/// Resolve an active public key to its target URL and count the click.
/// Unknown and inactive keys are indistinguishable to the caller.
pub async fn resolve_for_forwarding(pool: &SqlitePool, key: &str) -> Result<String> {
    let url = db::find_active_by_key(pool, key)
        .await?
        .ok_or_else(|| ShortenerError::NotFound(key.to_owned()))?;

    // The row may vanish between lookup and update only if it was removed
    // out-of-band; treat that the same as a miss.
    let url = db::increment_clicks(pool, url.id)
        .await?
        .ok_or_else(|| ShortenerError::NotFound(key.to_owned()))?;

    tracing::debug!(
        "Forwarding '{}' → {} ({} clicks)",
        url.key,
        url.target_url,
        url.clicks
    );
    Ok(url.target_url)
}

/// Full record for the holder of the secret key, active or not.
pub async fn fetch_admin_view(pool: &SqlitePool, secret_key: &str) -> Result<Url> {
    db::find_by_secret_key(pool, secret_key)
        .await?
        .ok_or_else(|| ShortenerError::NotFound(secret_key.to_owned()))
}

/// Soft-delete the record owning `secret_key`. Deactivating an already
/// inactive record succeeds and changes nothing.
pub async fn deactivate(pool: &SqlitePool, secret_key: &str) -> Result<Url> {
    let url = fetch_admin_view(pool, secret_key).await?;

    if !url.is_active {
        tracing::debug!("Short key '{}' already inactive", url.key);
        return Ok(url);
    }

    let url = db::set_active(pool, url.id, false)
        .await?
        .ok_or_else(|| ShortenerError::NotFound(secret_key.to_owned()))?;

    tracing::info!("Deactivated short key '{}'", url.key);
    Ok(url)
}

/// Trim the input and require an absolute http(s) URL with a host.
fn validate_target_url(raw: &str) -> Result<String> {
    let trimmed = raw.trim();

    let parsed = url::Url::parse(trimmed).map_err(|e| invalid_url(format!("{trimmed}: {e}")))?;

    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(invalid_url(format!(
            "unsupported scheme '{}'",
            parsed.scheme()
        )));
    }

    if parsed.host_str().map_or(true, str::is_empty) {
        return Err(invalid_url(format!("{trimmed}: missing host")));
    }

    Ok(trimmed.to_owned())
}

// Clients only see the generic message; the reason goes to the log.
fn invalid_url(reason: String) -> ShortenerError {
    tracing::debug!("Rejected target URL: {}", reason);
    ShortenerError::InvalidUrl(reason)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keygen::ALPHABET;
    use std::collections::HashSet;
    use std::sync::Arc;

    const TARGET: &str = "https://realpython.com/python-url-shortener/";

    #[test]
    fn accepts_absolute_http_urls() {
        assert_eq!(
            validate_target_url("  https://example.com/a?b=c  ").unwrap(),
            "https://example.com/a?b=c"
        );
        assert!(validate_target_url("http://localhost:8000").is_ok());
    }

    #[test]
    fn rejects_malformed_or_relative_urls() {
        for bad in [
            "not a url",
            "",
            "/relative/path",
            "example.com",
            "javascript:alert(1)",
            "mailto:someone@example.com",
            "ftp://files.example.com",
            "http://",
        ] {
            assert!(
                matches!(validate_target_url(bad), Err(ShortenerError::InvalidUrl(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn rejection_keeps_the_reason() {
        match validate_target_url("ftp://files.example.com") {
            Err(ShortenerError::InvalidUrl(reason)) => {
                assert_eq!(reason, "unsupported scheme 'ftp'")
            }
            other => panic!("expected InvalidUrl, got {other:?}"),
        }

        match validate_target_url("http://") {
            Err(ShortenerError::InvalidUrl(reason)) => assert!(reason.starts_with("http://: ")),
            other => panic!("expected InvalidUrl, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn create_then_admin_view_round_trips() {
        let pool = db::test_pool().await;
        let keys = KeyConfig::default();

        let created = create(&pool, &keys, TARGET).await.unwrap();
        assert_eq!(created.key.len(), 5);
        assert_eq!(created.secret_key.len(), 8);
        assert!(created
            .key
            .bytes()
            .chain(created.secret_key.bytes())
            .all(|b| ALPHABET.contains(&b)));

        let view = fetch_admin_view(&pool, &created.secret_key).await.unwrap();
        assert!(view.is_active);
        assert_eq!(view.clicks, 0);
        assert_eq!(view.target_url, TARGET);
        assert_eq!(view.key, created.key);
    }

    #[tokio::test]
    async fn invalid_url_creates_nothing() {
        let pool = db::test_pool().await;

        let err = create(&pool, &KeyConfig::default(), "not a url")
            .await
            .unwrap_err();

        assert!(matches!(err, ShortenerError::InvalidUrl(_)));
        assert_eq!(db::count_urls(&pool).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn forwarding_counts_each_click() {
        let pool = db::test_pool().await;
        let created = create(&pool, &KeyConfig::default(), TARGET).await.unwrap();

        let target = resolve_for_forwarding(&pool, &created.key).await.unwrap();
        assert_eq!(target, TARGET);
        let view = fetch_admin_view(&pool, &created.secret_key).await.unwrap();
        assert_eq!(view.clicks, 1);

        resolve_for_forwarding(&pool, &created.key).await.unwrap();
        let view = fetch_admin_view(&pool, &created.secret_key).await.unwrap();
        assert_eq!(view.clicks, 2);
    }

    #[tokio::test]
    async fn unknown_key_is_not_found() {
        let pool = db::test_pool().await;

        let err = resolve_for_forwarding(&pool, "NOPE").await.unwrap_err();
        assert!(matches!(err, ShortenerError::NotFound(_)));

        let err = fetch_admin_view(&pool, "NOPENOPE").await.unwrap_err();
        assert!(matches!(err, ShortenerError::NotFound(_)));

        let err = deactivate(&pool, "NOPENOPE").await.unwrap_err();
        assert!(matches!(err, ShortenerError::NotFound(_)));
    }

    #[tokio::test]
    async fn deactivated_record_stops_forwarding_but_stays_readable() {
        let pool = db::test_pool().await;
        let created = create(&pool, &KeyConfig::default(), TARGET).await.unwrap();
        resolve_for_forwarding(&pool, &created.key).await.unwrap();

        let deactivated = deactivate(&pool, &created.secret_key).await.unwrap();
        assert!(!deactivated.is_active);

        let err = resolve_for_forwarding(&pool, &created.key).await.unwrap_err();
        assert!(matches!(err, ShortenerError::NotFound(_)));

        let view = fetch_admin_view(&pool, &created.secret_key).await.unwrap();
        assert!(!view.is_active);
        // The failed forward must not have counted.
        assert_eq!(view.clicks, 1);
    }

    #[tokio::test]
    async fn deactivate_is_idempotent() {
        let pool = db::test_pool().await;
        let created = create(&pool, &KeyConfig::default(), TARGET).await.unwrap();

        let first = deactivate(&pool, &created.secret_key).await.unwrap();
        let second = deactivate(&pool, &created.secret_key).await.unwrap();

        assert_eq!(first, second);
        assert!(!second.is_active);
    }

    #[tokio::test]
    async fn admin_view_is_stable_without_mutation() {
        let pool = db::test_pool().await;
        let created = create(&pool, &KeyConfig::default(), TARGET).await.unwrap();

        let a = fetch_admin_view(&pool, &created.secret_key).await.unwrap();
        let b = fetch_admin_view(&pool, &created.secret_key).await.unwrap();

        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn exhausted_keyspace_surfaces_without_insert() {
        let pool = db::test_pool().await;
        let keys = KeyConfig {
            key_length: 1,
            max_key_attempts: 50,
            ..KeyConfig::default()
        };

        // Occupy every one-letter public key.
        for (i, &b) in ALPHABET.iter().enumerate() {
            let key = (b as char).to_string();
            db::insert(&pool, &key, &format!("SECRET{i:02}"), TARGET)
                .await
                .unwrap();
        }

        let err = create(&pool, &keys, TARGET).await.unwrap_err();
        assert!(matches!(err, ShortenerError::ExhaustedKeyspace { length: 1, .. }));
        assert_eq!(db::count_urls(&pool).await.unwrap(), ALPHABET.len() as i64);
    }

    /// Run `n` creates at once and check no two rows share either key.
    async fn assert_concurrent_creates_unique(pool: SqlitePool, keys: KeyConfig, n: usize) {
        let target = Arc::new(TARGET.to_owned());

        let mut tasks = tokio::task::JoinSet::new();
        for _ in 0..n {
            let pool = pool.clone();
            let target = Arc::clone(&target);
            tasks.spawn(async move { create(&pool, &keys, &target).await });
        }

        let mut public = HashSet::new();
        let mut secret = HashSet::new();
        while let Some(joined) = tasks.join_next().await {
            let url = joined.unwrap().unwrap();
            assert!(public.insert(url.key));
            assert!(secret.insert(url.secret_key));
        }

        assert_eq!(public.len(), n);
        assert_eq!(db::count_urls(&pool).await.unwrap(), n as i64);
    }

    #[tokio::test]
    async fn concurrent_creates_never_share_keys() {
        let pool = db::test_pool().await;
        assert_concurrent_creates_unique(pool, KeyConfig::default(), 10_000).await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn concurrent_creates_on_shared_file_pool() {
        let dir = tempfile::tempdir().unwrap();
        let database_url = format!("sqlite:{}", dir.path().join("urls.db").display());
        let pool = db::connect(&database_url).await.unwrap();

        // 676 two-letter keys for 400 records: plenty of collisions, and
        // checks racing inserts across connections.
        let keys = KeyConfig {
            key_length: 2,
            max_key_attempts: 256,
            max_create_attempts: 20,
            ..KeyConfig::default()
        };

        assert_concurrent_creates_unique(pool, keys, 400).await;
    }

    #[tokio::test]
    async fn insert_collision_is_retried_with_fresh_keys() {
        let pool = db::test_pool().await;
        db::insert(&pool, "TAKEN", "TAKENSEC", TARGET).await.unwrap();

        // First pair reuses the stored public key, as if another creator won
        // the race after the existence check.
        let mut pairs = vec![
            ("FRESH".to_owned(), "FRESHSEC".to_owned()),
            ("TAKEN".to_owned(), "OTHERSEC".to_owned()),
        ];
        let mut picks = 0;

        let url = create_with(&pool, &KeyConfig::default(), TARGET, || {
            picks += 1;
            let pair = pairs.pop().unwrap();
            async move { Ok::<_, ShortenerError>(pair) }
        })
        .await
        .unwrap();

        assert_eq!(picks, 2);
        assert_eq!(url.key, "FRESH");
        assert_eq!(url.secret_key, "FRESHSEC");
        assert_eq!(db::count_urls(&pool).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn secret_key_collision_is_retried_too() {
        let pool = db::test_pool().await;
        db::insert(&pool, "TAKEN", "TAKENSEC", TARGET).await.unwrap();

        let mut pairs = vec![
            ("FRESH".to_owned(), "FRESHSEC".to_owned()),
            ("OTHER".to_owned(), "TAKENSEC".to_owned()),
        ];

        let url = create_with(&pool, &KeyConfig::default(), TARGET, || {
            let pair = pairs.pop().unwrap();
            async move { Ok::<_, ShortenerError>(pair) }
        })
        .await
        .unwrap();

        assert_eq!(url.secret_key, "FRESHSEC");
        assert_eq!(db::count_urls(&pool).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn persistent_collisions_end_in_conflict() {
        let pool = db::test_pool().await;
        db::insert(&pool, "TAKEN", "TAKENSEC", TARGET).await.unwrap();
        let keys = KeyConfig {
            max_create_attempts: 3,
            ..KeyConfig::default()
        };
        let mut picks = 0;

        let err = create_with(&pool, &keys, TARGET, || {
            picks += 1;
            let pair = ("TAKEN".to_owned(), format!("OTHERSE{picks}"));
            async move { Ok::<_, ShortenerError>(pair) }
        })
        .await
        .unwrap_err();

        assert!(matches!(err, ShortenerError::Conflict));
        assert_eq!(err.status(), axum::http::StatusCode::CONFLICT);
        assert_eq!(picks, 3);
        assert_eq!(db::count_urls(&pool).await.unwrap(), 1);
    }
}
