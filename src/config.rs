use std::{env, str::FromStr, time::Duration};

use derive_more::{Display, Error};

#[derive(Debug, Display, Error)]
#[display(fmt = "invalid value '{}' for {}", value, name)]
pub struct ConfigError {
    pub name: &'static str,
    pub value: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_host: String,
    pub bind_port: u16,
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub public_base_url: String,
    pub store_timeout: Duration,
    pub qr: QrConfig,
}

/// Rendering knobs for ticket codes; none of them change what is encoded.
#[derive(Debug, Clone, Copy)]
pub struct QrConfig {
    pub size: u32,
    pub quiet_zone: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_host: "127.0.0.1".to_string(),
            bind_port: 8080,
            database_url: None,
            db_max_connections: 5,
            public_base_url: "http://127.0.0.1:8080".to_string(),
            store_timeout: Duration::from_millis(5000),
            qr: QrConfig { size: 300, quiet_zone: true },
        }
    }
}

fn parsed<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(value) => value.trim().parse().map_err(|_| ConfigError { name, value }),
        Err(_) => Ok(default),
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = AppConfig::default();
        let database_url = env::var("DATABASE_URL").ok().filter(|url| !url.trim().is_empty());
        let timeout_ms: u64 = parsed("STORE_TIMEOUT_MS", defaults.store_timeout.as_millis() as u64)?;
        if timeout_ms == 0 {
            return Err(ConfigError { name: "STORE_TIMEOUT_MS", value: "0".to_string() });
        }
        Ok(Self {
            bind_host: env::var("BIND_HOST").unwrap_or(defaults.bind_host),
            bind_port: parsed("BIND_PORT", defaults.bind_port)?,
            database_url,
            db_max_connections: parsed("DB_MAX_CONNECTIONS", defaults.db_max_connections)?,
            public_base_url: env::var("PUBLIC_BASE_URL").unwrap_or(defaults.public_base_url),
            store_timeout: Duration::from_millis(timeout_ms),
            qr: QrConfig {
                size: parsed("QR_SIZE", defaults.qr.size)?,
                quiet_zone: parsed("QR_QUIET_ZONE", defaults.qr.quiet_zone)?,
            },
        })
    }
}
