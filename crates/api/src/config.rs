use shopfront_infra::services::DEFAULT_CONFLICT_RETRIES;
use shopfront_observability::LogFormat;
use thiserror::Error;

const DEV_JWT_SECRET: &str = "dev-secret";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} has invalid value '{value}': {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// Server configuration loaded from environment variables.
///
/// | Env Var                    | Default     |
/// |----------------------------|-------------|
/// | `HOST`                     | `0.0.0.0`   |
/// | `PORT`                     | `8080`      |
/// | `JWT_SECRET`               | dev secret  |
/// | `DATABASE_URL`             | in-memory   |
/// | `DATABASE_MAX_CONNECTIONS` | `10`        |
/// | `PRICING_CONFLICT_RETRIES` | `2`         |
/// | `LOG_FORMAT`               | `json`      |
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
    pub jwt_secret: String,
    /// Postgres connection string; the in-memory store is used when unset.
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    /// Extra attempts for a bulk adjustment that lost a version race.
    pub conflict_retries: u32,
    pub log_format: LogFormat,
}

impl ApiConfig {
    /// Load `.env` (if present) and read the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// In-memory configuration, mainly for tests.
    pub fn in_memory(jwt_secret: impl Into<String>) -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 0,
            jwt_secret: jwt_secret.into(),
            database_url: None,
            database_max_connections: 10,
            conflict_retries: DEFAULT_CONFLICT_RETRIES,
            log_format: LogFormat::Pretty,
        }
    }

    /// True when `JWT_SECRET` was missing and the insecure default is in use.
    pub fn uses_dev_secret(&self) -> bool {
        self.jwt_secret == DEV_JWT_SECRET
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let host = lookup("HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port = parse_or(&lookup, "PORT", 8080u16)?;

        let jwt_secret = lookup("JWT_SECRET")
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEV_JWT_SECRET.to_string());

        let database_url = lookup("DATABASE_URL").filter(|s| !s.trim().is_empty());
        let database_max_connections = parse_or(&lookup, "DATABASE_MAX_CONNECTIONS", 10u32)?;
        let conflict_retries = parse_or(&lookup, "PRICING_CONFLICT_RETRIES", DEFAULT_CONFLICT_RETRIES)?;

        let log_format = match lookup("LOG_FORMAT") {
            Some(value) => value.parse().map_err(|e: shopfront_observability::UnknownLogFormat| {
                ConfigError::Invalid {
                    var: "LOG_FORMAT",
                    value: value.clone(),
                    reason: e.to_string(),
                }
            })?,
            None => LogFormat::default(),
        };

        Ok(Self {
            host,
            port,
            jwt_secret,
            database_url,
            database_max_connections,
            conflict_retries,
            log_format,
        })
    }
}

fn parse_or<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(var) {
        Some(value) => value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            var,
            reason: e.to_string(),
            value,
        }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<ApiConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ApiConfig::from_lookup(|k| vars.get(k).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let cfg = load(&[]).unwrap();
        assert_eq!(cfg.bind_addr(), "0.0.0.0:8080");
        assert!(cfg.uses_dev_secret());
        assert_eq!(cfg.database_url, None);
        assert_eq!(cfg.database_max_connections, 10);
        assert_eq!(cfg.conflict_retries, 2);
        assert_eq!(cfg.log_format, LogFormat::Json);
    }

    #[test]
    fn reads_overrides() {
        let cfg = load(&[
            ("PORT", "9000"),
            ("JWT_SECRET", "s3cret"),
            ("DATABASE_URL", "postgres://localhost/shop"),
            ("PRICING_CONFLICT_RETRIES", "5"),
            ("LOG_FORMAT", "pretty"),
        ])
        .unwrap();
        assert_eq!(cfg.port, 9000);
        assert_eq!(cfg.jwt_secret, "s3cret");
        assert!(!cfg.uses_dev_secret());
        assert_eq!(cfg.database_url.as_deref(), Some("postgres://localhost/shop"));
        assert_eq!(cfg.conflict_retries, 5);
        assert_eq!(cfg.log_format, LogFormat::Pretty);
    }

    #[test]
    fn blank_database_url_means_in_memory() {
        let cfg = load(&[("DATABASE_URL", "  ")]).unwrap();
        assert_eq!(cfg.database_url, None);
    }

    #[test]
    fn invalid_values_are_reported() {
        let err = load(&[("PORT", "http")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: "PORT", .. }));

        let err = load(&[("LOG_FORMAT", "xml")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: "LOG_FORMAT", .. }));
    }
}
