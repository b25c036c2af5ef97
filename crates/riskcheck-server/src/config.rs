use std::str::FromStr;
use std::time::Duration;

use crate::error::ServerError;

pub const ENV_TRANSPORT: &str = "RISKCHECKD_TRANSPORT";
pub const ENV_HTTP_ADDR: &str = "RISKCHECK_HTTP_ADDR";
pub const ENV_MEMO_CAPACITY: &str = "RISKCHECK_MEMO_CAPACITY";
pub const ENV_HTTP_TIMEOUT_MS: &str = "RISKCHECK_HTTP_TIMEOUT_MS";

const DEFAULT_HTTP_ADDR: &str = "127.0.0.1:8797";
const DEFAULT_MEMO_CAPACITY: usize = 256;
const MAX_MEMO_CAPACITY: usize = 65_536;
const DEFAULT_HTTP_TIMEOUT_MS: u64 = 5_000;
const MIN_HTTP_TIMEOUT_MS: u64 = 10;
const MAX_HTTP_TIMEOUT_MS: u64 = 600_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Stdio,
    Http,
}

impl FromStr for Transport {
    type Err = ServerError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "stdio" => Ok(Self::Stdio),
            "http" => Ok(Self::Http),
            other => Err(ServerError::Config(format!(
                "{ENV_TRANSPORT} must be stdio or http, got `{other}`"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub transport: Transport,
    pub http_addr: String,
    /// Memo cache entries; 0 disables the cache.
    pub memo_capacity: usize,
    /// Per-connection read and write timeout for the HTTP transport.
    pub http_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            transport: Transport::Stdio,
            http_addr: DEFAULT_HTTP_ADDR.to_string(),
            memo_capacity: DEFAULT_MEMO_CAPACITY,
            http_timeout: Duration::from_millis(DEFAULT_HTTP_TIMEOUT_MS),
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ServerError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the config from any variable source. Unset or blank values fall
    /// back to defaults; an unknown transport is an error.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ServerError> {
        let defaults = Self::default();
        let var = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let transport = match var(ENV_TRANSPORT) {
            Some(raw) => raw.parse()?,
            None => defaults.transport,
        };
        let http_addr = var(ENV_HTTP_ADDR).unwrap_or(defaults.http_addr);
        let memo_capacity = var(ENV_MEMO_CAPACITY)
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(defaults.memo_capacity)
            .min(MAX_MEMO_CAPACITY);
        let http_timeout = var(ENV_HTTP_TIMEOUT_MS)
            .and_then(|v| v.parse::<u64>().ok())
            .map_or(defaults.http_timeout, |ms| {
                Duration::from_millis(ms.clamp(MIN_HTTP_TIMEOUT_MS, MAX_HTTP_TIMEOUT_MS))
            });

        Ok(Self {
            transport,
            http_addr,
            memo_capacity,
            http_timeout,
        })
    }
}
