use std::env;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{key} has an invalid value {value:?}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Mongo,
    Memory,
}

#[derive(Debug, Clone)]
pub struct TimingsConfig {
    pub base_url: String,
    /// Calculation convention id passed as `method`.
    pub method: u8,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub store_backend: StoreBackend,
    pub mongo_uri: Option<String>,
    pub database_name: String,
    pub jwt_secret: String,
    pub bind_addr: String,
    pub frontend_origin: String,
    pub timings: TimingsConfig,
    pub bcrypt_cost: u32,
    pub superadmin_email: Option<String>,
    pub superadmin_password: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let store_backend = match lookup("STORE_BACKEND").as_deref() {
            None | Some("mongo") => StoreBackend::Mongo,
            Some("memory") => StoreBackend::Memory,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    key: "STORE_BACKEND",
                    value: other.to_string(),
                })
            }
        };

        let mongo_uri = lookup("MONGO_URI");
        if store_backend == StoreBackend::Mongo && mongo_uri.is_none() {
            return Err(ConfigError::Missing("MONGO_URI"));
        }

        Ok(Self {
            store_backend,
            mongo_uri,
            database_name: lookup("DATABASE_NAME").unwrap_or_else(|| "salah_directory".to_string()),
            jwt_secret: lookup("JWT_SECRET").ok_or(ConfigError::Missing("JWT_SECRET"))?,
            bind_addr: lookup("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:8080".to_string()),
            frontend_origin: lookup("FRONTEND_ORIGIN")
                .unwrap_or_else(|| "http://localhost:3000".to_string()),
            timings: TimingsConfig {
                base_url: lookup("TIMINGS_BASE_URL")
                    .unwrap_or_else(|| "http://api.aladhan.com/v1".to_string()),
                method: parse_or(&lookup, "TIMINGS_METHOD", 2)?,
                timeout_secs: parse_or(&lookup, "TIMINGS_TIMEOUT_SECS", 10)?,
            },
            bcrypt_cost: parse_or(&lookup, "BCRYPT_COST", bcrypt::DEFAULT_COST)?,
            superadmin_email: lookup("SUPERADMIN_EMAIL"),
            superadmin_password: lookup("SUPERADMIN_PASSWORD"),
        })
    }
}

fn parse_or<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(key) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
    }
}
