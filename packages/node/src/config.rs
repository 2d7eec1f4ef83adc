//! Host configuration, populated from environment variables.

use std::net::SocketAddr;

use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
#[error("{var} is invalid: {reason} (got '{value}')")]
pub struct ConfigError {
    pub var: &'static str,
    pub value: String,
    pub reason: &'static str,
}

/// Runtime configuration for a keyhost host.
///
/// All fields are populated from environment variables with sensible
/// defaults, so a host can be started with zero configuration.
///
/// | Variable | Default | Description |
/// |----------|---------|-------------|
/// | `KEYHOST_BIND` | `0.0.0.0:6286` | TCP socket address to listen on |
/// | `KEYHOST_PUBLIC_URL` | derived from `KEYHOST_BIND` | Base URL published in the host's endpoint record |
/// | `KEYHOST_SECRET` | (absent = generated) | 64 hex characters; the host's Ed25519 secret key |
/// | `KEYHOST_NAME` | (absent) | Human-readable host name |
/// | `KEYHOST_SESSION_TTL_SECS` | `86400` | Lifetime of issued sessions |
/// | `KEYHOST_RECORD_TTL_SECS` | `3600` | TTL of the host's own endpoint record |
/// | `KEYHOST_RELAYS` | (absent) | Comma-separated external relays to announce the host to |
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Socket address the server binds to.
    pub bind_addr: SocketAddr,

    /// Base URL under which `/{identity}/{path}` is served.
    /// Example: `"https://host.example.com"`.
    pub public_url: String,

    /// Hex-encoded secret key. `None` means generate one at startup.
    pub secret_hex: Option<String>,

    /// Human-readable name, shown in the discovery document.
    pub name: Option<String>,

    pub session_ttl_secs: u64,

    pub record_ttl_secs: u32,

    /// External record relays the host publishes itself to.
    pub relays: Vec<String>,
}

impl NodeConfig {
    /// Populate config from environment variables, applying defaults where absent.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let bind = var("KEYHOST_BIND").unwrap_or_else(|| "0.0.0.0:6286".into());
        let bind_addr: SocketAddr = bind.parse().map_err(|_| ConfigError {
            var: "KEYHOST_BIND",
            value: bind.clone(),
            reason: "expected a socket address such as 0.0.0.0:6286",
        })?;

        let public_url = var("KEYHOST_PUBLIC_URL")
            .unwrap_or_else(|| format!("http://{bind_addr}"))
            .trim_end_matches('/')
            .to_string();

        let session_ttl_secs = parse_number(&var, "KEYHOST_SESSION_TTL_SECS", 86_400)?;
        let record_ttl_secs = parse_number(&var, "KEYHOST_RECORD_TTL_SECS", 3600)?;

        let relays = var("KEYHOST_RELAYS")
            .map(|v| {
                v.split(',')
                    .map(str::trim)
                    .filter(|r| !r.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            bind_addr,
            public_url,
            secret_hex: var("KEYHOST_SECRET"),
            name: var("KEYHOST_NAME"),
            session_ttl_secs,
            record_ttl_secs,
            relays,
        })
    }

    /// Defaults suitable for an in-process test host at `public_url`.
    pub fn for_url(public_url: impl Into<String>) -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            public_url: public_url.into().trim_end_matches('/').to_string(),
            secret_hex: None,
            name: None,
            session_ttl_secs: 86_400,
            record_ttl_secs: 3600,
            relays: Vec::new(),
        }
    }
}

fn parse_number<T: std::str::FromStr>(
    var: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match var(name) {
        Some(v) => v.parse().map_err(|_| ConfigError {
            var: name,
            value: v,
            reason: "expected a non-negative integer",
        }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<NodeConfig, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        NodeConfig::from_vars(|k| vars.get(k).cloned())
    }

    #[test]
    fn defaults() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.bind_addr, "0.0.0.0:6286".parse().unwrap());
        assert_eq!(config.public_url, "http://0.0.0.0:6286");
        assert_eq!(config.session_ttl_secs, 86_400);
        assert!(config.relays.is_empty());
        assert!(config.secret_hex.is_none());
    }

    #[test]
    fn explicit_values() {
        let config = config_from(&[
            ("KEYHOST_BIND", "127.0.0.1:9000"),
            ("KEYHOST_PUBLIC_URL", "https://host.example.com/"),
            ("KEYHOST_RELAYS", "https://r1, https://r2"),
            ("KEYHOST_SESSION_TTL_SECS", "60"),
        ])
        .unwrap();
        assert_eq!(config.public_url, "https://host.example.com");
        assert_eq!(config.relays, vec!["https://r1", "https://r2"]);
        assert_eq!(config.session_ttl_secs, 60);
    }

    #[test]
    fn invalid_values_are_reported() {
        let err = config_from(&[("KEYHOST_BIND", "nowhere")]).unwrap_err();
        assert_eq!(err.var, "KEYHOST_BIND");

        let err = config_from(&[("KEYHOST_RECORD_TTL_SECS", "-1")]).unwrap_err();
        assert_eq!(err.var, "KEYHOST_RECORD_TTL_SECS");
    }
}
