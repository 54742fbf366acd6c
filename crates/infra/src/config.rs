//! Process configuration from the environment (and an optional `.env`).

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

use thiserror::Error;

use stockroom_core::TenantId;

const DEV_JWT_SECRET: &str = "stockroom-dev-secret";

pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8080";
pub const DEFAULT_ACCESS_TOKEN_TTL_MINUTES: i64 = 60;
pub const DEFAULT_REFRESH_TOKEN_TTL_HOURS: i64 = 720;
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{key} is invalid: {reason}")]
    Invalid { key: &'static str, reason: String },
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_address: SocketAddr,
    pub jwt_secret: String,
    pub access_token_ttl: chrono::Duration,
    pub refresh_token_ttl: chrono::Duration,
    pub database_url: Option<String>,
    pub blob_dir: Option<PathBuf>,
    pub default_tenant_id: TenantId,
    /// Display name that is granted admin when it registers.
    pub bootstrap_admin_name: Option<String>,
    pub max_upload_bytes: usize,
}

impl AppConfig {
    /// Load `.env` (if any) and read the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!(path = %path.display(), "loaded .env");
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let bind_address = parse("BIND_ADDRESS", get("BIND_ADDRESS").as_deref().unwrap_or(DEFAULT_BIND_ADDRESS))?;

        let jwt_secret = get("JWT_SECRET").unwrap_or_else(|| {
            tracing::warn!("JWT_SECRET not set; using insecure dev default");
            DEV_JWT_SECRET.to_string()
        });

        let access_minutes = positive("ACCESS_TOKEN_TTL_MINUTES", get("ACCESS_TOKEN_TTL_MINUTES"), DEFAULT_ACCESS_TOKEN_TTL_MINUTES)?;
        let refresh_hours = positive("REFRESH_TOKEN_TTL_HOURS", get("REFRESH_TOKEN_TTL_HOURS"), DEFAULT_REFRESH_TOKEN_TTL_HOURS)?;

        let default_tenant_id = match get("DEFAULT_TENANT_ID") {
            Some(raw) => parse::<TenantId>("DEFAULT_TENANT_ID", &raw)?,
            None => {
                let generated = TenantId::new();
                tracing::warn!(tenant_id = %generated, "DEFAULT_TENANT_ID not set; generated one for this process");
                generated
            }
        };

        let max_upload_bytes = match get("MAX_UPLOAD_BYTES") {
            Some(raw) => parse::<usize>("MAX_UPLOAD_BYTES", &raw)?,
            None => DEFAULT_MAX_UPLOAD_BYTES,
        };

        Ok(Self {
            bind_address,
            jwt_secret,
            access_token_ttl: chrono::Duration::minutes(access_minutes),
            refresh_token_ttl: chrono::Duration::hours(refresh_hours),
            database_url: get("DATABASE_URL"),
            blob_dir: get("BLOB_DIR").map(PathBuf::from),
            default_tenant_id,
            bootstrap_admin_name: get("BOOTSTRAP_ADMIN_NAME"),
            max_upload_bytes,
        })
    }

    /// In-memory everything, fixed secret. Used by tests and local runs.
    pub fn in_memory(jwt_secret: impl Into<String>) -> Self {
        Self {
            bind_address: SocketAddr::from(([127, 0, 0, 1], 0)),
            jwt_secret: jwt_secret.into(),
            access_token_ttl: chrono::Duration::minutes(DEFAULT_ACCESS_TOKEN_TTL_MINUTES),
            refresh_token_ttl: chrono::Duration::hours(DEFAULT_REFRESH_TOKEN_TTL_HOURS),
            database_url: None,
            blob_dir: None,
            default_tenant_id: TenantId::new(),
            bootstrap_admin_name: None,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

fn parse<T>(key: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse::<T>().map_err(|e| ConfigError::Invalid { key, reason: e.to_string() })
}

fn positive(key: &'static str, raw: Option<String>, default: i64) -> Result<i64, ConfigError> {
    let Some(raw) = raw else {
        return Ok(default);
    };
    let value = parse::<i64>(key, &raw)?;
    if value <= 0 {
        return Err(ConfigError::Invalid { key, reason: "must be greater than zero".to_string() });
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(pairs: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let env: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        AppConfig::from_lookup(|k| env.get(k).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let cfg = config(&[]).unwrap();
        assert_eq!(cfg.bind_address.to_string(), DEFAULT_BIND_ADDRESS);
        assert_eq!(cfg.jwt_secret, DEV_JWT_SECRET);
        assert_eq!(cfg.access_token_ttl, chrono::Duration::minutes(60));
        assert_eq!(cfg.refresh_token_ttl, chrono::Duration::hours(720));
        assert_eq!(cfg.max_upload_bytes, 5 * 1024 * 1024);
        assert!(cfg.database_url.is_none());
        assert!(cfg.blob_dir.is_none());
    }

    #[test]
    fn values_are_read_and_blank_means_unset() {
        let tenant = TenantId::new();
        let cfg = config(&[
            ("BIND_ADDRESS", "127.0.0.1:9000"),
            ("JWT_SECRET", "s3cret"),
            ("ACCESS_TOKEN_TTL_MINUTES", "5"),
            ("DATABASE_URL", "  "),
            ("DEFAULT_TENANT_ID", &tenant.to_string()),
            ("BOOTSTRAP_ADMIN_NAME", "Keeper"),
        ])
        .unwrap();
        assert_eq!(cfg.bind_address.port(), 9000);
        assert_eq!(cfg.jwt_secret, "s3cret");
        assert_eq!(cfg.access_token_ttl, chrono::Duration::minutes(5));
        assert!(cfg.database_url.is_none());
        assert_eq!(cfg.default_tenant_id, tenant);
        assert_eq!(cfg.bootstrap_admin_name.as_deref(), Some("Keeper"));
    }

    #[test]
    fn malformed_values_name_their_key() {
        assert!(matches!(
            config(&[("ACCESS_TOKEN_TTL_MINUTES", "0")]),
            Err(ConfigError::Invalid { key: "ACCESS_TOKEN_TTL_MINUTES", .. })
        ));
        assert!(matches!(
            config(&[("DEFAULT_TENANT_ID", "nope")]),
            Err(ConfigError::Invalid { key: "DEFAULT_TENANT_ID", .. })
        ));
        assert!(matches!(
            config(&[("BIND_ADDRESS", "localhost")]),
            Err(ConfigError::Invalid { key: "BIND_ADDRESS", .. })
        ));
    }
}
