//! Runtime configuration from environment variables.

use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Operator HTTP listener port.
    pub http_port: u16,
    /// Caller RPC listener port.
    pub rpc_port: u16,
    /// Admission cap on queued requests.
    pub max_pending_requests: usize,
    /// Long-poll deadline for operator takes.
    pub http_timeout: Duration,
    /// Deadline for reading a submit body.
    pub submit_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_port: 8000,
            rpc_port: 50051,
            max_pending_requests: 1000,
            http_timeout: Duration::from_secs(30),
            submit_timeout: Duration::from_secs(5),
        }
    }
}

impl Config {
    /// Loads configuration from the environment. Unset or malformed variables
    /// fall back to the defaults.
    pub fn from_env() -> Self {
        let mut cfg = Config::default();

        if let Some(port) = env_parse("HTTP_PORT") {
            cfg.http_port = port;
        }
        if let Some(port) = env_parse("RPC_PORT") {
            cfg.rpc_port = port;
        }
        if let Some(limit) = env_parse("MAX_PENDING_REQUESTS") {
            cfg.max_pending_requests = limit;
        }
        if let Some(timeout) = env_duration("HTTP_TIMEOUT") {
            cfg.http_timeout = timeout;
        }
        if let Some(timeout) = env_duration("SUBMIT_TIMEOUT") {
            cfg.submit_timeout = timeout;
        }

        cfg
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok()?.parse().ok()
}

fn env_duration(key: &str) -> Option<Duration> {
    parse_duration(&std::env::var(key).ok()?).ok()
}

/// Parses suffixed duration strings: `"1500ms"`, `"30s"`, `"2m"`, `"1h"`.
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    if let Some(val) = s.strip_suffix("ms") {
        let n: u64 = val.parse().map_err(|e| format!("invalid duration: {e}"))?;
        Ok(Duration::from_millis(n))
    } else if let Some(val) = s.strip_suffix('s') {
        let n: u64 = val.parse().map_err(|e| format!("invalid duration: {e}"))?;
        Ok(Duration::from_secs(n))
    } else if let Some(val) = s.strip_suffix('m') {
        let n: u64 = val.parse().map_err(|e| format!("invalid duration: {e}"))?;
        Ok(Duration::from_secs(n * 60))
    } else if let Some(val) = s.strip_suffix('h') {
        let n: u64 = val.parse().map_err(|e| format!("invalid duration: {e}"))?;
        Ok(Duration::from_secs(n * 3600))
    } else {
        Err(format!("unknown duration format: {s}"))
    }
}
