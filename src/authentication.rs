use crate::domain::Password;
use anyhow::Context;
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::SaltString;
use argon2::{Algorithm, Argon2, Params, PasswordHash, PasswordHasher, PasswordVerifier, Version};
use rand::distributions::Alphanumeric;
use rand::{thread_rng, Rng};
use secrecy::{ExposeSecret, Secret};
use tokio::task::JoinHandle;

/// Verified against when the submitted email matches no user, so that both
/// failure paths cost the same.
const FALLBACK_PASSWORD_HASH: &str = "$argon2id$v=19$m=15000,t=2,p=1$\
    gZiV/M1gPc22ElAH/Jh1Hw$\
    CWOrkoo7oJBQ/iyh7uJ0LO2aLEfrHwTWllSAxT0zRno";

#[derive(thiserror::Error, Debug)]
pub enum AuthError {
    #[error("Invalid credentials.")]
    InvalidCredentials(#[source] anyhow::Error),
    #[error(transparent)]
    UnexpectedError(#[from] anyhow::Error),
}

pub fn spawn_blocking_with_tracing<F, R>(f: F) -> JoinHandle<R>
where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    let current_span = tracing::Span::current();
    tokio::task::spawn_blocking(move || current_span.in_scope(f))
}

/// Argon2id PHC string for a password that passed the policy checks.
pub async fn compute_password_hash(password: Password) -> Result<String, anyhow::Error> {
    spawn_blocking_with_tracing(move || hash_with_argon2(password.expose_secret()))
        .await
        .context("Failed to spawn blocking task.")?
}

fn hash_with_argon2(password: &str) -> Result<String, anyhow::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::new(
        Algorithm::Argon2id,
        Version::V0x13,
        Params::new(15000, 2, 1, None).map_err(anyhow::Error::msg)?,
    )
    .hash_password(password.as_bytes(), &salt)
    .map_err(anyhow::Error::msg)?
    .to_string();
    Ok(password_hash)
}

/// Checks `candidate` against a stored hash. `None` stands for an unknown
/// account and always fails, after doing the same amount of work.
#[tracing::instrument(name = "Verify password hash", skip(expected_password_hash, candidate))]
pub async fn verify_password(
    expected_password_hash: Option<String>,
    candidate: Secret<String>,
) -> Result<(), AuthError> {
    let known_account = expected_password_hash.is_some();
    let expected_password_hash =
        expected_password_hash.unwrap_or_else(|| FALLBACK_PASSWORD_HASH.to_string());
    spawn_blocking_with_tracing(move || {
        verify_password_hash(Secret::new(expected_password_hash), candidate)
    })
    .await
    .context("Failed to spawn blocking task.")??;

    if known_account {
        Ok(())
    } else {
        Err(AuthError::InvalidCredentials(anyhow::anyhow!(
            "Unknown email."
        )))
    }
}

fn verify_password_hash(
    expected_password_hash: Secret<String>,
    candidate: Secret<String>,
) -> Result<(), AuthError> {
    let expected_password_hash = PasswordHash::new(expected_password_hash.expose_secret())
        .map_err(anyhow::Error::msg)
        .context("Failed to parse hash in PHC string format.")?;

    Argon2::default()
        .verify_password(candidate.expose_secret().as_bytes(), &expected_password_hash)
        .map_err(anyhow::Error::msg)
        .context("Invalid password.")
        .map_err(AuthError::InvalidCredentials)
}

/// Random token mailed in password reset links.
pub fn generate_reset_token() -> String {
    let mut rng = thread_rng();
    std::iter::repeat_with(|| rng.sample(Alphanumeric))
        .map(char::from)
        .take(32)
        .collect()
}
