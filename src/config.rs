use std::env;
use std::path::PathBuf;

use thiserror::Error;
use url::Url;

const DEFAULT_PORT: u16 = 3001;
const DEFAULT_DB_PORT: u16 = 5432;
const DEFAULT_MAX_UPLOAD_FILES: usize = 10;
const DEFAULT_MAX_UPLOAD_BYTES: usize = 200 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} is not a valid number: {value}")]
    InvalidNumber { name: &'static str, value: String },

    #[error("cannot build a database URL from DB_* variables: {0}")]
    InvalidDatabaseUrl(String),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub admin_secret: String,
    pub jwt_secret: String,
    /// Base used for generated media links. When unset, links are derived
    /// from the inbound request's host.
    pub public_base_url: Option<String>,
    /// Empty means any origin is allowed.
    pub cors_origins: Vec<String>,
    pub upload_dir: PathBuf,
    pub port: u16,
    pub max_upload_files: usize,
    pub max_upload_bytes: usize,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let database_url = match var("DATABASE_URL") {
            Some(url) => url,
            None => {
                let user = var("DB_USER").ok_or(ConfigError::Missing("DATABASE_URL or DB_USER"))?;
                let host = var("DB_HOST").unwrap_or_else(|| "localhost".to_string());
                let name = var("DB_NAME").ok_or(ConfigError::Missing("DB_NAME"))?;
                let port = parse_or("DB_PORT", var("DB_PORT"), DEFAULT_DB_PORT)?;
                database_url_from_parts(&user, var("DB_PASSWORD").as_deref(), &host, port, &name)?
            }
        };

        let admin_secret = var("ADMIN_SECRET").ok_or(ConfigError::Missing("ADMIN_SECRET"))?;
        let jwt_secret = var("JWT_SECRET").ok_or(ConfigError::Missing("JWT_SECRET"))?;

        let public_base_url = var("PUBLIC_BASE_URL").map(|u| u.trim_end_matches('/').to_string());

        let cors_origins = var("CORS_ORIGINS")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|o| !o.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let upload_dir = var("UPLOAD_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("uploads"));

        Ok(Self {
            database_url,
            admin_secret,
            jwt_secret,
            public_base_url,
            cors_origins,
            upload_dir,
            port: parse_or("PORT", var("PORT"), DEFAULT_PORT)?,
            max_upload_files: parse_or("MAX_UPLOAD_FILES", var("MAX_UPLOAD_FILES"), DEFAULT_MAX_UPLOAD_FILES)?,
            max_upload_bytes: parse_or("MAX_UPLOAD_BYTES", var("MAX_UPLOAD_BYTES"), DEFAULT_MAX_UPLOAD_BYTES)?,
        })
    }
}

/// Credentials are percent-encoded, so reserved characters in a password survive.
fn database_url_from_parts(
    user: &str,
    password: Option<&str>,
    host: &str,
    port: u16,
    name: &str,
) -> Result<String, ConfigError> {
    let invalid = |what: &str| ConfigError::InvalidDatabaseUrl(what.to_string());

    let mut url = Url::parse(&format!("postgres://{host}"))
        .map_err(|e| ConfigError::InvalidDatabaseUrl(format!("DB_HOST: {e}")))?;
    url.set_port(Some(port)).map_err(|_| invalid("DB_PORT"))?;
    url.set_username(user).map_err(|_| invalid("DB_USER"))?;
    url.set_password(password).map_err(|_| invalid("DB_PASSWORD"))?;
    url.path_segments_mut()
        .map_err(|_| invalid("DB_NAME"))?
        .push(name);

    Ok(url.into())
}

fn parse_or<T: std::str::FromStr>(
    name: &'static str,
    value: Option<String>,
    default: T,
) -> Result<T, ConfigError> {
    match value {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidNumber { name, value: raw }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn database_url_is_assembled_from_parts() {
        let config = Config::from_lookup(lookup(&[
            ("DB_USER", "me"),
            ("DB_PASSWORD", "pw"),
            ("DB_HOST", "db"),
            ("DB_NAME", "portfolio"),
            ("ADMIN_SECRET", "s"),
            ("JWT_SECRET", "j"),
        ]))
        .unwrap();

        assert_eq!(config.database_url, "postgres://me:pw@db:5432/portfolio");
        assert_eq!(config.port, 3001);
        assert_eq!(config.max_upload_files, 10);
        assert_eq!(config.upload_dir, PathBuf::from("uploads"));
        assert!(config.cors_origins.is_empty());
        assert!(config.public_base_url.is_none());
    }

    #[test]
    fn reserved_characters_in_credentials_are_encoded() {
        let config = Config::from_lookup(lookup(&[
            ("DB_USER", "app user"),
            ("DB_PASSWORD", "p@ss/w:rd"),
            ("DB_HOST", "db.internal"),
            ("DB_PORT", "6543"),
            ("DB_NAME", "portfolio"),
            ("ADMIN_SECRET", "s"),
            ("JWT_SECRET", "j"),
        ]))
        .unwrap();

        let url = Url::parse(&config.database_url).unwrap();
        assert_eq!(url.host_str(), Some("db.internal"));
        assert_eq!(url.port(), Some(6543));
        assert_eq!(url.username(), "app%20user");
        assert_eq!(url.password(), Some("p%40ss%2Fw%3Ard"));
        assert_eq!(url.path(), "/portfolio");
    }

    #[test]
    fn password_is_optional() {
        let config = Config::from_lookup(lookup(&[
            ("DB_USER", "me"),
            ("DB_NAME", "portfolio"),
            ("ADMIN_SECRET", "s"),
            ("JWT_SECRET", "j"),
        ]))
        .unwrap();

        assert_eq!(config.database_url, "postgres://me@localhost:5432/portfolio");
    }

    #[test]
    fn explicit_values_override_defaults() {
        let config = Config::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://x/y"),
            ("ADMIN_SECRET", "s"),
            ("JWT_SECRET", "j"),
            ("PUBLIC_BASE_URL", "https://media.example.com/"),
            ("CORS_ORIGINS", "https://a.example.com, https://b.example.com,"),
            ("PORT", "8080"),
            ("MAX_UPLOAD_FILES", "3"),
        ]))
        .unwrap();

        assert_eq!(config.public_base_url.as_deref(), Some("https://media.example.com"));
        assert_eq!(
            config.cors_origins,
            vec!["https://a.example.com".to_string(), "https://b.example.com".to_string()]
        );
        assert_eq!(config.port, 8080);
        assert_eq!(config.max_upload_files, 3);
    }

    #[test]
    fn missing_secret_is_an_error() {
        let err = Config::from_lookup(lookup(&[("DATABASE_URL", "postgres://x/y"), ("JWT_SECRET", "j")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Missing("ADMIN_SECRET")));
    }

    #[test]
    fn invalid_port_is_an_error() {
        let err = Config::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://x/y"),
            ("ADMIN_SECRET", "s"),
            ("JWT_SECRET", "j"),
            ("PORT", "eighty"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidNumber { name: "PORT", .. }));
    }
}
