use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use lazy_static::lazy_static;
use rand::rngs::OsRng;
use tracing::error;

/// Argon2id with the crate's default cost parameters.
fn hasher() -> Argon2<'static> {
    Argon2::default()
}

fn argon_err(context: &'static str) -> impl FnOnce(argon2::password_hash::Error) -> anyhow::Error {
    move |e| {
        error!(error = %e, context, "argon2 failure");
        anyhow::anyhow!("{context}: {e}")
    }
}

/// Hashes `plain` with a fresh random salt and returns the PHC string.
pub fn hash_password(plain: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = hasher()
        .hash_password(plain.as_bytes(), &salt)
        .map_err(argon_err("hash password"))?;
    Ok(hash.to_string())
}

/// `Ok(false)` on mismatch; `Err` only when `hash` is not a PHC string.
pub fn verify_password(plain: &str, hash: &str) -> anyhow::Result<bool> {
    let parsed = PasswordHash::new(hash).map_err(argon_err("parse password hash"))?;
    match hasher().verify_password(plain.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(argon_err("verify password")(e)),
    }
}

lazy_static! {
    static ref DUMMY_HASH: Option<String> = hash_password("dummy-password-never-matches").ok();
}

/// Computes the throwaway hash up front so the first unknown-account login
/// does not also pay for hashing it.
pub fn prime_dummy_hash() {
    lazy_static::initialize(&DUMMY_HASH);
}

/// Spends one verification on a throwaway hash so an unknown account takes
/// as long to reject as a wrong password.
pub fn verify_dummy(plain: &str) {
    if let Some(hash) = DUMMY_HASH.as_deref() {
        let _ = verify_password(plain, hash);
    }
}
