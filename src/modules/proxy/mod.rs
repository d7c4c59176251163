//! Proxy routing and the process-wide network policy.
//!
//! The route is always an HTTP forward proxy. Environment and system proxy
//! settings (including `ALL_PROXY=socks5://…`) are never consulted by clients
//! built under the default [`NetworkPolicy`], so they cannot silently replace
//! the configured route.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr};

use once_cell::sync::OnceCell;
use reqwest::blocking::ClientBuilder;
use reqwest::header::HeaderValue;

use crate::config::{ConfigError, ProxyConfig};

const PROXY_ENV_KEYS: [&str; 6] = [
    "ALL_PROXY",
    "all_proxy",
    "HTTPS_PROXY",
    "https_proxy",
    "HTTP_PROXY",
    "http_proxy",
];

static INSTALLED_POLICY: OnceCell<NetworkPolicy> = OnceCell::new();

/// Immutable networking policy shared by every client in the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkPolicy {
    /// Ignore `HTTP(S)_PROXY`/`ALL_PROXY` and platform proxy settings.
    pub ignore_system_proxies: bool,
    /// Reject SOCKS signals from the environment, logging what was dropped.
    pub suppress_socks: bool,
    /// Bind outgoing sockets to IPv4.
    pub prefer_ipv4: bool,
}

impl Default for NetworkPolicy {
    fn default() -> Self {
        Self {
            ignore_system_proxies: true,
            suppress_socks: true,
            prefer_ipv4: false,
        }
    }
}

impl NetworkPolicy {
    /// Installs the policy for the process. Only the first call takes effect;
    /// later calls with a different policy are logged and ignored.
    pub fn install(self) -> &'static NetworkPolicy {
        let mut installed_now = false;
        let policy = INSTALLED_POLICY.get_or_init(|| {
            installed_now = true;
            self
        });

        if installed_now {
            log::info!(
                "network policy installed: ignore_system={} suppress_socks={} prefer_ipv4={}",
                policy.ignore_system_proxies,
                policy.suppress_socks,
                policy.prefer_ipv4
            );
            if policy.suppress_socks {
                for (key, value) in socks_signals(|key| std::env::var(key).ok()) {
                    log::warn!("ignoring SOCKS proxy from environment {key}={value}");
                }
            }
        } else if *policy != self {
            log::warn!("network policy already installed, ignoring conflicting policy {self:?}");
        }
        policy
    }

    /// The installed policy, or the default if none was installed yet.
    pub fn current() -> NetworkPolicy {
        INSTALLED_POLICY.get().copied().unwrap_or_default()
    }

    /// Applies routing rules to a client builder.
    ///
    /// The explicit route, when present, replaces any proxy the environment
    /// would otherwise contribute.
    pub fn apply(
        &self,
        mut builder: ClientBuilder,
        route: Option<reqwest::Proxy>,
    ) -> ClientBuilder {
        if self.ignore_system_proxies || self.suppress_socks {
            builder = builder.no_proxy();
        }
        if let Some(proxy) = route {
            builder = builder.proxy(proxy);
        }
        if self.prefer_ipv4 {
            builder = builder.local_address(IpAddr::V4(Ipv4Addr::UNSPECIFIED));
        }
        builder
    }
}

/// Proxy environment variables pointing at a SOCKS endpoint.
pub fn socks_signals<F>(lookup: F) -> Vec<(&'static str, String)>
where
    F: Fn(&str) -> Option<String>,
{
    PROXY_ENV_KEYS
        .iter()
        .filter_map(|key| lookup(key).map(|value| (*key, value)))
        .filter(|(_, value)| value.trim().to_ascii_lowercase().starts_with("socks"))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProxyRouteError {
    #[error("proxy host '{0}' uses a non-HTTP scheme; only HTTP forward proxies are supported")]
    NonHttpScheme(String),
    #[error("invalid proxy endpoint '{0}'")]
    InvalidEndpoint(String),
}

/// HTTP forward proxy endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyRoute {
    host: String,
    port: u16,
}

impl ProxyRoute {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Route for an enabled proxy configuration, `None` when the proxy is off.
    pub fn from_config(config: &ProxyConfig) -> Result<Option<Self>, ProxyRouteError> {
        if !config.is_proxy_enabled() {
            return Ok(None);
        }
        let host = config.host().trim();
        if host.contains("://") {
            return Err(ProxyRouteError::NonHttpScheme(host.to_string()));
        }
        if host.contains(['/', '@', ' ']) {
            return Err(ProxyRouteError::InvalidEndpoint(host.to_string()));
        }
        if config.port().trim().parse::<u16>().is_err() {
            log::warn!(
                "{}; using {}",
                ConfigError::InvalidPort(config.port().to_string()),
                config.port_as_int()
            );
        }
        Ok(Some(Self::new(host, config.port_as_int())))
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    /// Builds the reqwest proxy for this route, optionally carrying a
    /// preemptive `Proxy-Authorization` value.
    pub fn to_reqwest(
        &self,
        authorization: Option<HeaderValue>,
    ) -> Result<reqwest::Proxy, ProxyRouteError> {
        let mut proxy = reqwest::Proxy::all(self.url())
            .map_err(|_| ProxyRouteError::InvalidEndpoint(self.url()))?;
        if let Some(value) = authorization {
            proxy = proxy.custom_http_auth(value);
        }
        Ok(proxy)
    }
}

impl fmt::Display for ProxyRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}
