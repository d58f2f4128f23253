use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail};
use argon2::{
    Algorithm, Argon2, Params, PasswordHash, PasswordHasher, PasswordVerifier, Version,
    password_hash::SaltString,
};
use rand::Rng;
use rand_core::OsRng;
use tracing::{info, warn};

use messagely_db::Database;

use crate::config::PasswordConfig;
use crate::error::ApiError;
use crate::run_blocking;

pub const MIN_PASSWORD_LEN: usize = 8;

/// Reset codes are short-lived; one day is the most a deployment may configure.
pub const MAX_RESET_CODE_TTL_SECS: i64 = 24 * 60 * 60;

/// Password hashing plus the reset-code lifecycle.
#[derive(Clone)]
pub struct CredentialStore {
    db: Arc<Database>,
    argon2: Argon2<'static>,
    reset_code_ttl_secs: i64,
}

impl CredentialStore {
    pub fn new(db: Arc<Database>, password: &PasswordConfig, reset_code_ttl: Duration) -> anyhow::Result<Self> {
        let params = Params::new(password.memory_kib, password.iterations, password.parallelism, None)
            .map_err(|e| anyhow!("Invalid Argon2 parameters: {}", e))?;
        let reset_code_ttl_secs = match i64::try_from(reset_code_ttl.as_secs()) {
            Ok(secs) if secs <= MAX_RESET_CODE_TTL_SECS => secs,
            _ => bail!(
                "Reset code TTL of {}s exceeds the {}s limit",
                reset_code_ttl.as_secs(),
                MAX_RESET_CODE_TTL_SECS
            ),
        };

        Ok(Self {
            db,
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
            reset_code_ttl_secs,
        })
    }

    /// Argon2id with a fresh random salt. CPU-bound; call from a blocking task.
    pub fn hash(&self, password: &str) -> Result<String, ApiError> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| anyhow!("Password hashing failed: {}", e))?;
        Ok(hash.to_string())
    }

    /// A stored hash that does not parse never verifies.
    pub fn verify(&self, password: &str, hashed: &str) -> bool {
        match PasswordHash::new(hashed) {
            Ok(parsed) => self.argon2.verify_password(password.as_bytes(), &parsed).is_ok(),
            Err(e) => {
                warn!("Unparseable password hash in store: {}", e);
                false
            }
        }
    }

    /// Generate, persist and return a fresh reset code for `username`,
    /// replacing any code issued earlier.
    pub async fn issue_reset_code(&self, username: &str) -> Result<String, ApiError> {
        let code = generate_reset_code().to_string();

        let db = self.db.clone();
        let user = username.to_string();
        let stored = code.clone();
        let ttl = self.reset_code_ttl_secs;
        let found = run_blocking(move || Ok(db.set_reset_code(&user, &stored, ttl)?)).await?;

        if !found {
            return Err(ApiError::NotFound(format!("No such user: {}", username)));
        }

        info!("Issued reset code for {}", username);
        Ok(code)
    }

    /// Replace the password if `code` matches the live reset code. The code
    /// check, password write and code clear are one conditional update, so
    /// a code can be redeemed at most once.
    pub async fn redeem_reset_code(&self, username: &str, code: &str, new_password: &str) -> Result<(), ApiError> {
        if !is_well_formed_code(code) {
            return Err(ApiError::InvalidResetCode);
        }
        validate_password(new_password)?;

        let store = self.clone();
        let user = username.to_string();
        let code = code.to_string();
        let password = new_password.to_string();
        let redeemed = run_blocking(move || {
            let password_hash = store.hash(&password)?;
            Ok(store.db.redeem_reset_code(&user, &code, &password_hash)?)
        })
        .await?;

        if !redeemed {
            warn!("Rejected reset code for {}", username);
            return Err(ApiError::InvalidResetCode);
        }

        info!("Password updated via reset code for {}", username);
        Ok(())
    }
}

/// Uniform in 100000..=999999.
pub fn generate_reset_code() -> u32 {
    rand::rng().random_range(100_000..=999_999)
}

fn is_well_formed_code(code: &str) -> bool {
    code.len() == 6 && code.bytes().all(|b| b.is_ascii_digit())
}

pub(crate) fn validate_password(password: &str) -> Result<(), ApiError> {
    if password.len() < MIN_PASSWORD_LEN {
        return Err(ApiError::BadRequest(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    Ok(())
}
