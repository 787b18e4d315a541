//! Password hashing for authgate.
//!
//! Uses Argon2id. Hashing is CPU-bound, so both hashing and verification run
//! on tokio's blocking pool.

use argon2::{
    password_hash::{
        PasswordHash, PasswordHasher as _, PasswordVerifier as _, SaltString,
    },
    Algorithm, Argon2, Params, Version,
};
use rand_core::OsRng;
use std::sync::Arc;

use crate::config::PasswordConfig;
use crate::{AuthgateError, Result};

/// Input for the hash that [`PasswordHasher::verify_dummy`] checks against.
const DUMMY_PASSWORD: &str = "authgate-timing-equalizer";

/// Argon2id hasher configured with fixed cost parameters.
#[derive(Clone)]
pub struct PasswordHasher {
    params: Params,
    dummy_hash: Arc<str>,
}

impl PasswordHasher {
    /// Create a hasher from configured cost parameters.
    pub fn new(config: &PasswordConfig) -> Result<Self> {
        let params = Params::new(
            config.memory_kib,
            config.iterations,
            config.parallelism,
            None,
        )
        .map_err(|e| AuthgateError::Config(format!("invalid Argon2 parameters: {e}")))?;
        let dummy_hash = hash_with(params.clone(), DUMMY_PASSWORD)?;
        Ok(Self {
            params,
            dummy_hash: dummy_hash.into(),
        })
    }

    fn argon2(params: Params) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
    }

    /// Hash a password, returning a PHC string with salt and parameters.
    pub async fn hash(&self, password: &str) -> Result<String> {
        let params = self.params.clone();
        let password = password.to_owned();
        tokio::task::spawn_blocking(move || hash_with(params, &password))
            .await
            .map_err(|e| AuthgateError::Hashing(format!("hashing task failed: {e}")))?
    }

    /// Check a password against a stored hash.
    ///
    /// Returns `Ok(false)` for a wrong password. A malformed stored hash is an
    /// error.
    pub async fn verify(&self, password: &str, hash: &str) -> Result<bool> {
        let password = password.to_owned();
        let hash = hash.to_owned();
        tokio::task::spawn_blocking(move || verify_with(&password, &hash))
            .await
            .map_err(|e| AuthgateError::Hashing(format!("verification task failed: {e}")))?
    }

    /// Run one verification against a throwaway hash with the configured
    /// cost, for paths that have no stored hash to check.
    pub async fn verify_dummy(&self, password: &str) -> Result<()> {
        self.verify(password, &self.dummy_hash).await.map(|_| ())
    }
}

impl std::fmt::Debug for PasswordHasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasswordHasher")
            .field("m_cost", &self.params.m_cost())
            .field("t_cost", &self.params.t_cost())
            .field("p_cost", &self.params.p_cost())
            .finish()
    }
}

fn hash_with(params: Params, password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    PasswordHasher::argon2(params)
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthgateError::Hashing(e.to_string()))
}

fn verify_with(password: &str, hash: &str) -> Result<bool> {
    let parsed = PasswordHash::new(hash)
        .map_err(|e| AuthgateError::Hashing(format!("invalid stored hash: {e}")))?;

    // Cost parameters come from the parsed hash.
    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(AuthgateError::Hashing(e.to_string())),
    }
}
