//! Client configuration, optionally populated from environment variables.

use std::sync::Arc;
use std::time::Duration;

use keyhost_core::{Endpoint, PublicIdentity};

use crate::error::{Error, Result};
use crate::resolver::{LookupBackend, RelayBackend, StaticRegistry};

pub const DEFAULT_RELAY: &str = "https://relay.keyhost.dev";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_MIN_CACHE_TTL: Duration = Duration::from_secs(60);
pub const DEFAULT_MAX_CACHE_TTL: Duration = Duration::from_secs(3600);

/// Which lookup network a client resolves identities through.
#[derive(Debug, Clone)]
pub enum NetworkProfile {
    /// Public record relays, queried over HTTP in the given order.
    Mainnet { relays: Vec<String> },

    /// A local in-memory registry shared explicitly between clients.
    Testnet { registry: StaticRegistry },
}

impl NetworkProfile {
    pub fn mainnet() -> Self {
        Self::Mainnet {
            relays: vec![DEFAULT_RELAY.to_string()],
        }
    }

    pub fn testnet(registry: StaticRegistry) -> Self {
        Self::Testnet { registry }
    }

    pub(crate) fn backend(&self, http: reqwest::Client) -> Arc<dyn LookupBackend> {
        match self {
            Self::Mainnet { relays } => Arc::new(RelayBackend::new(http, relays.clone())),
            Self::Testnet { registry } => Arc::new(registry.clone()),
        }
    }
}

impl Default for NetworkProfile {
    fn default() -> Self {
        Self::mainnet()
    }
}

/// Runtime configuration for a [`Client`](crate::Client).
///
/// | Variable | Default | Description |
/// |----------|---------|-------------|
/// | `KEYHOST_NETWORK` | `mainnet` | `mainnet` or `testnet` |
/// | `KEYHOST_RELAYS` | `https://relay.keyhost.dev` | Comma-separated relay base URLs |
/// | `KEYHOST_TESTNET_HOST` | (absent) | `<identity>@<url>` pinned into the testnet registry |
/// | `KEYHOST_TIMEOUT_SECS` | `30` | HTTP request timeout |
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub profile: NetworkProfile,
    pub request_timeout: Duration,
    /// Floor applied to record TTLs in the resolver cache.
    pub min_cache_ttl: Duration,
    /// Ceiling applied to record TTLs in the resolver cache.
    pub max_cache_ttl: Duration,
    /// Host pinned from `KEYHOST_TESTNET_HOST`, if any.
    pub testnet_host: Option<PublicIdentity>,
}

impl ClientConfig {
    pub fn new(profile: NetworkProfile) -> Self {
        Self {
            profile,
            request_timeout: DEFAULT_TIMEOUT,
            min_cache_ttl: DEFAULT_MIN_CACHE_TTL,
            max_cache_ttl: DEFAULT_MAX_CACHE_TTL,
            testnet_host: None,
        }
    }

    /// Point `identity` at the pinned testnet host in the testnet registry.
    ///
    /// A registry built from the environment lives only as long as the
    /// process, so records published by an earlier run are gone. Returns
    /// `false` when there is no testnet host to point at.
    pub fn pin_testnet_home(&self, identity: PublicIdentity) -> bool {
        let (NetworkProfile::Testnet { registry }, Some(host)) = (&self.profile, self.testnet_host)
        else {
            return false;
        };
        if identity != host {
            registry.pin(identity, vec![Endpoint::host(host, 0)]);
        }
        true
    }

    /// Populate config from environment variables, applying defaults where absent.
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let network = var("KEYHOST_NETWORK").unwrap_or_else(|| "mainnet".into());
        let mut testnet_host = None;

        let profile = match network.as_str() {
            "mainnet" => {
                let relays: Vec<String> = var("KEYHOST_RELAYS")
                    .unwrap_or_else(|| DEFAULT_RELAY.into())
                    .split(',')
                    .map(str::trim)
                    .filter(|r| !r.is_empty())
                    .map(String::from)
                    .collect();
                if relays.is_empty() {
                    return Err(Error::Config("KEYHOST_RELAYS lists no relays".into()));
                }
                NetworkProfile::Mainnet { relays }
            }
            "testnet" => {
                let registry = StaticRegistry::new();
                if let Some(pair) = var("KEYHOST_TESTNET_HOST") {
                    let (identity, url) = parse_host_pair(&pair)?;
                    registry.pin_host(identity, url);
                    testnet_host = Some(identity);
                }
                NetworkProfile::Testnet { registry }
            }
            other => {
                return Err(Error::Config(format!(
                    "KEYHOST_NETWORK must be 'mainnet' or 'testnet', got '{other}'"
                )))
            }
        };

        let request_timeout = match var("KEYHOST_TIMEOUT_SECS") {
            Some(v) => Duration::from_secs(v.parse::<u64>().map_err(|_| {
                Error::Config(format!("KEYHOST_TIMEOUT_SECS must be a number of seconds, got '{v}'"))
            })?),
            None => DEFAULT_TIMEOUT,
        };

        Ok(Self {
            request_timeout,
            testnet_host,
            ..Self::new(profile)
        })
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new(NetworkProfile::default())
    }
}

/// Split `<identity>@<url>`.
fn parse_host_pair(pair: &str) -> Result<(PublicIdentity, String)> {
    let (identity, url) = pair.split_once('@').ok_or_else(|| {
        Error::Config(format!("KEYHOST_TESTNET_HOST must look like <identity>@<url>, got '{pair}'"))
    })?;
    if url.is_empty() {
        return Err(Error::Config("KEYHOST_TESTNET_HOST has an empty url".into()));
    }
    Ok((PublicIdentity::decode(identity)?, url.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::LookupAnswer;
    use keyhost_core::Keypair;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<ClientConfig> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ClientConfig::from_vars(|k| vars.get(k).cloned())
    }

    #[test]
    fn defaults_to_mainnet() {
        let config = config_from(&[]).unwrap();
        match config.profile {
            NetworkProfile::Mainnet { relays } => assert_eq!(relays, vec![DEFAULT_RELAY]),
            other => panic!("unexpected profile: {other:?}"),
        }
        assert_eq!(config.request_timeout, DEFAULT_TIMEOUT);
        assert_eq!(config.min_cache_ttl, DEFAULT_MIN_CACHE_TTL);
    }

    #[test]
    fn relays_are_split_and_trimmed() {
        let config = config_from(&[("KEYHOST_RELAYS", "http://a, http://b ,")]).unwrap();
        match config.profile {
            NetworkProfile::Mainnet { relays } => assert_eq!(relays, vec!["http://a", "http://b"]),
            other => panic!("unexpected profile: {other:?}"),
        }
    }

    #[tokio::test]
    async fn testnet_host_is_pinned() {
        let host = Keypair::generate().public_identity();
        let pair = format!("{host}@http://127.0.0.1:6286");
        let config = config_from(&[("KEYHOST_NETWORK", "testnet"), ("KEYHOST_TESTNET_HOST", &pair)])
            .unwrap();

        let NetworkProfile::Testnet { registry } = config.profile else {
            panic!("expected testnet profile");
        };
        assert!(matches!(
            registry.lookup(&host).await.unwrap(),
            Some(LookupAnswer::Pinned { .. })
        ));
    }

    #[tokio::test]
    async fn testnet_home_delegates_to_pinned_host() {
        let host = Keypair::generate().public_identity();
        let user = Keypair::generate().public_identity();
        let pair = format!("{host}@http://127.0.0.1:6286");
        let config = config_from(&[("KEYHOST_NETWORK", "testnet"), ("KEYHOST_TESTNET_HOST", &pair)])
            .unwrap();
        assert_eq!(config.testnet_host, Some(host));

        assert!(config.pin_testnet_home(user));
        let NetworkProfile::Testnet { registry } = &config.profile else {
            panic!("expected testnet profile");
        };
        match registry.lookup(&user).await.unwrap() {
            Some(LookupAnswer::Pinned { endpoints, .. }) => {
                assert_eq!(endpoints, vec![Endpoint::host(host, 0)])
            }
            other => panic!("unexpected answer: {other:?}"),
        }
    }

    #[test]
    fn no_testnet_home_on_mainnet() {
        let config = config_from(&[]).unwrap();
        assert!(!config.pin_testnet_home(Keypair::generate().public_identity()));
    }

    #[test]
    fn rejects_bad_values() {
        assert!(matches!(
            config_from(&[("KEYHOST_NETWORK", "devnet")]),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            config_from(&[("KEYHOST_TIMEOUT_SECS", "soon")]),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            config_from(&[("KEYHOST_NETWORK", "testnet"), ("KEYHOST_TESTNET_HOST", "nohost")]),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            config_from(&[
                ("KEYHOST_NETWORK", "testnet"),
                ("KEYHOST_TESTNET_HOST", "short@http://h")
            ]),
            Err(Error::MalformedIdentity { .. })
        ));
    }
}
