use crate::error::{Result, ShortenerError};
use rand::{rngs::OsRng, Rng};
use std::future::Future;

/// Alphabet shared by public and secret keys.
pub const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Generate a random uppercase key of exactly `length` characters, drawn
/// from the operating system's CSPRNG.
pub fn generate(length: usize) -> Result<String> {
    if length == 0 {
        return Err(ShortenerError::InvalidArgument(
            "key length must be at least 1".into(),
        ));
    }

    let mut rng = OsRng;
    Ok((0..length)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect())
}

/// Generate keys until `exists` reports one as unused.
///
/// Nothing is reserved: the UNIQUE constraint in the database is the final
/// arbiter between concurrent creators. Gives up with `ExhaustedKeyspace`
/// after `max_attempts` collisions.
pub async fn generate_unique<F, Fut>(
    length: usize,
    max_attempts: usize,
    mut exists: F,
) -> Result<String>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<bool>>,
{
    for attempt in 1..=max_attempts {
        let candidate = generate(length)?;
        if !exists(candidate.clone()).await? {
            return Ok(candidate);
        }
        tracing::debug!("Key collision on attempt {} (length {})", attempt, length);
    }

    Err(ShortenerError::ExhaustedKeyspace {
        length,
        attempts: max_attempts,
    })
}
