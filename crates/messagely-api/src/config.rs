use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Result, bail};

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &["secret", "change-me", "dev-secret-change-me"];

/// Process-wide configuration. Built once at startup and read-only afterwards.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub jwt_secret: String,
    /// Session lifetime baked into each token's `exp`.
    pub token_ttl: Duration,
    /// How long an issued reset code stays redeemable.
    pub reset_code_ttl: Duration,
    pub password: PasswordConfig,
    pub sms: SmsConfig,
}

/// Argon2id work factor.
#[derive(Debug, Clone)]
pub struct PasswordConfig {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for PasswordConfig {
    fn default() -> Self {
        Self {
            memory_kib: argon2::Params::DEFAULT_M_COST,
            iterations: argon2::Params::DEFAULT_T_COST,
            parallelism: argon2::Params::DEFAULT_P_COST,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SmsConfig {
    /// Twilio account SID. Without it (or the token) SMS go to the local outbox.
    pub account_sid: Option<String>,
    pub auth_token: Option<String>,
    pub from_number: String,
    pub api_base: String,
    pub timeout: Duration,
}

impl Default for SmsConfig {
    fn default() -> Self {
        Self {
            account_sid: None,
            auth_token: None,
            from_number: "+15005550006".into(),
            api_base: "https://api.twilio.com".into(),
            timeout: Duration::from_secs(10),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 3000,
            db_path: "messagely.db".into(),
            jwt_secret: String::new(),
            token_ttl: Duration::from_secs(24 * 60 * 60),
            reset_code_ttl: Duration::from_secs(10 * 60),
            password: PasswordConfig::default(),
            sms: SmsConfig::default(),
        }
    }
}

impl AppConfig {
    /// Read `MESSAGELY_*` variables, falling back to defaults. Refuses to
    /// start with an unset or placeholder signing secret.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let jwt_secret = std::env::var("MESSAGELY_JWT_SECRET").unwrap_or_default();
        if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("MESSAGELY_JWT_SECRET is unset or still a placeholder");
        }

        let sms_defaults = defaults.sms;
        let password_defaults = defaults.password;

        Ok(Self {
            host: std::env::var("MESSAGELY_HOST").unwrap_or(defaults.host),
            port: parse_var("MESSAGELY_PORT")?.unwrap_or(defaults.port),
            db_path: std::env::var("MESSAGELY_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.db_path),
            jwt_secret,
            token_ttl: match parse_var("MESSAGELY_TOKEN_TTL_HOURS")? {
                Some(hours) => hours_to_duration(hours)?,
                None => defaults.token_ttl,
            },
            reset_code_ttl: parse_var("MESSAGELY_RESET_CODE_TTL_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.reset_code_ttl),
            password: PasswordConfig {
                memory_kib: parse_var("MESSAGELY_ARGON2_MEMORY_KIB")?.unwrap_or(password_defaults.memory_kib),
                iterations: parse_var("MESSAGELY_ARGON2_ITERATIONS")?.unwrap_or(password_defaults.iterations),
                parallelism: parse_var("MESSAGELY_ARGON2_PARALLELISM")?.unwrap_or(password_defaults.parallelism),
            },
            sms: SmsConfig {
                account_sid: std::env::var("MESSAGELY_SMS_ACCOUNT_SID").ok().filter(|s| !s.is_empty()),
                auth_token: std::env::var("MESSAGELY_SMS_AUTH_TOKEN").ok().filter(|s| !s.is_empty()),
                from_number: std::env::var("MESSAGELY_SMS_FROM").unwrap_or(sms_defaults.from_number),
                api_base: std::env::var("MESSAGELY_SMS_API_BASE").unwrap_or(sms_defaults.api_base),
                timeout: parse_var("MESSAGELY_SMS_TIMEOUT_SECS")?
                    .map(Duration::from_secs)
                    .unwrap_or(sms_defaults.timeout),
            },
        })
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn hours_to_duration(hours: u64) -> Result<Duration> {
    match hours.checked_mul(60 * 60) {
        Some(secs) => Ok(Duration::from_secs(secs)),
        None => bail!("MESSAGELY_TOKEN_TTL_HOURS is too large: {}", hours),
    }
}

fn parse_var<T>(name: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => match raw.trim().parse() {
            Ok(value) => Ok(Some(value)),
            Err(e) => bail!("{} has invalid value '{}': {}", name, raw, e),
        },
        Err(_) => Ok(None),
    }
}
