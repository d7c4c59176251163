//! Composes proxy route, credentials, TLS trust and timeouts into a client.
//!
//! Building never touches the network. The resulting [`ClientHandle`] owns the
//! connection pool; dropping it releases every pooled connection.

use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use http::HeaderValue;
use reqwest::blocking::Client;
use thiserror::Error;

use super::profile::{ClientProfile, Timeouts};
use super::transport::{HttpTransport, ReqwestTransport};
use crate::config::ProxyConfig;
use crate::modules::auth::{AuthError, AuthScheme, CredentialSet, ResolvedCredential};
use crate::modules::proxy::{NetworkPolicy, ProxyRoute, ProxyRouteError};
use crate::modules::tls::{TlsConfig, TlsPolicy, TlsSetupError};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Route(#[from] ProxyRouteError),
    #[error(transparent)]
    Tls(#[from] TlsSetupError),
    #[error("failed to build HTTP client: {0}")]
    Build(#[from] reqwest::Error),
}

/// `Proxy-Authorization` value for Basic: `Basic base64(user:password)`.
pub fn basic_proxy_authorization(username: &str, password: &str) -> Result<HeaderValue, AuthError> {
    let encoded = STANDARD.encode(format!("{username}:{password}"));
    let mut value = HeaderValue::from_str(&format!("Basic {encoded}")).map_err(|_| {
        AuthError::InvalidCredentialFormat {
            scheme: AuthScheme::Basic,
            reason: "not representable as a header value",
        }
    })?;
    value.set_sensitive(true);
    Ok(value)
}

/// Fluent builder for [`ClientHandle`].
pub struct HttpClientBuilder {
    profile: ClientProfile,
    proxy: ProxyConfig,
    credentials: CredentialSet,
    tls: TlsConfig,
    timeouts: Timeouts,
    network_policy: NetworkPolicy,
    preemptive_auth: bool,
}

impl HttpClientBuilder {
    pub fn new(profile: ClientProfile) -> Self {
        Self {
            profile,
            proxy: ProxyConfig::default(),
            credentials: CredentialSet::new(),
            tls: TlsConfig::default(),
            timeouts: profile.timeouts(),
            network_policy: NetworkPolicy::current(),
            preemptive_auth: true,
        }
    }

    pub fn with_proxy_config(mut self, config: ProxyConfig) -> Self {
        self.proxy = config;
        self
    }

    pub fn with_credentials(mut self, credentials: CredentialSet) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn with_tls_config(mut self, tls: TlsConfig) -> Self {
        self.tls = tls;
        self
    }

    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn with_network_policy(mut self, policy: NetworkPolicy) -> Self {
        self.network_policy = policy;
        self
    }

    /// Sends Basic proxy credentials on the first request instead of waiting
    /// for a 407. The blocking backend cannot answer proxy challenges, so
    /// disabling this leaves Basic unusable.
    pub fn preemptive_auth(mut self, enabled: bool) -> Self {
        self.preemptive_auth = enabled;
        self
    }

    /// Builds a reqwest-backed client.
    pub fn build(self) -> Result<ClientHandle, ClientError> {
        let plan = self.plan()?;

        let mut builder = Client::builder()
            .connect_timeout(self.timeouts.connect)
            .timeout(self.timeouts.total())
            .pool_max_idle_per_host(self.profile.max_idle_per_host())
            .user_agent(self.profile.user_agent());

        let proxy = match &plan.route {
            Some(route) => Some(route.to_reqwest(plan.preemptive_authorization.clone())?),
            None => None,
        };
        builder = self.network_policy.apply(builder, proxy);
        builder = self.tls.apply(builder, &plan.label)?;

        let client = builder.build()?;
        log::info!(
            "{} client ready (connect {}s, total {}s, tls {})",
            plan.label,
            self.timeouts.connect.as_secs(),
            self.timeouts.total().as_secs(),
            self.tls.policy
        );

        let transport = ReqwestTransport::new(client, self.profile.retry_on_connection_failure());
        Ok(self.into_handle(plan, Box::new(transport)))
    }

    /// Builds a handle around a caller-supplied transport. Routing, credential
    /// and TLS decisions are still made and recorded on the handle.
    pub fn build_with_transport(
        self,
        transport: Box<dyn HttpTransport>,
    ) -> Result<ClientHandle, ClientError> {
        let plan = self.plan()?;
        self.tls.announce(&plan.label);
        Ok(self.into_handle(plan, transport))
    }

    fn plan(&self) -> Result<ClientPlan, ClientError> {
        let route = ProxyRoute::from_config(&self.proxy)?;
        let label = match &route {
            Some(route) => format!("{} via {route}", self.profile),
            None => format!("{} direct", self.profile),
        };

        let mut preferred_scheme = None;
        let mut active_scheme = None;
        let mut preemptive_authorization = None;

        match &route {
            Some(route) => {
                for (scope, credential) in self.credentials.iter() {
                    if scope.host != route.host() || scope.port != route.port() {
                        log::warn!(
                            "{} credential bound to {}:{} does not match proxy {route}, skipping",
                            scope.scheme,
                            scope.host,
                            scope.port
                        );
                        continue;
                    }
                    preferred_scheme.get_or_insert(scope.scheme);
                    match self.attach(credential) {
                        Ok(header) => {
                            active_scheme = Some(scope.scheme);
                            preemptive_authorization = header;
                            break;
                        }
                        Err(err) => log::warn!("{err}; falling back to the next scheme"),
                    }
                }
                if active_scheme.is_none() && !self.credentials.is_empty() {
                    log::warn!(
                        "all offered proxy auth schemes exhausted, continuing unauthenticated"
                    );
                }
                log::info!("using HTTP proxy {route} (system and SOCKS proxies disabled)");
            }
            None if !self.credentials.is_empty() => {
                log::info!("proxy disabled, ignoring configured proxy credentials");
            }
            None => {}
        }

        Ok(ClientPlan {
            route,
            label,
            preferred_scheme,
            active_scheme,
            preemptive_authorization,
        })
    }

    fn attach(&self, credential: &ResolvedCredential) -> Result<Option<HeaderValue>, AuthError> {
        match credential {
            ResolvedCredential::Basic { username, password } if self.preemptive_auth => {
                let header = basic_proxy_authorization(username, password.expose())?;
                log::info!("preemptive Basic proxy authorization enabled for user {username}");
                Ok(Some(header))
            }
            ResolvedCredential::None => Ok(None),
            other => Err(AuthError::Unsupported {
                scheme: other.scheme().unwrap_or(AuthScheme::Basic),
            }),
        }
    }

    fn into_handle(self, plan: ClientPlan, transport: Box<dyn HttpTransport>) -> ClientHandle {
        ClientHandle {
            transport,
            label: plan.label,
            route: plan.route,
            credentials: self.credentials,
            preferred_scheme: plan.preferred_scheme,
            active_scheme: plan.active_scheme,
            preemptive_authorization: plan.preemptive_authorization,
            tls_policy: self.tls.policy,
            profile: self.profile,
            timeouts: self.timeouts,
        }
    }
}

struct ClientPlan {
    route: Option<ProxyRoute>,
    label: String,
    preferred_scheme: Option<AuthScheme>,
    active_scheme: Option<AuthScheme>,
    preemptive_authorization: Option<HeaderValue>,
}

/// Configured client: transport plus the decisions made while building it.
pub struct ClientHandle {
    transport: Box<dyn HttpTransport>,
    label: String,
    route: Option<ProxyRoute>,
    credentials: CredentialSet,
    preferred_scheme: Option<AuthScheme>,
    active_scheme: Option<AuthScheme>,
    preemptive_authorization: Option<HeaderValue>,
    tls_policy: TlsPolicy,
    profile: ClientProfile,
    timeouts: Timeouts,
}

impl ClientHandle {
    pub fn transport(&self) -> &dyn HttpTransport {
        self.transport.as_ref()
    }

    pub fn route(&self) -> Option<&ProxyRoute> {
        self.route.as_ref()
    }

    pub fn credentials(&self) -> &CredentialSet {
        &self.credentials
    }

    /// Scheme whose credentials are actually sent to the proxy.
    pub fn active_scheme(&self) -> Option<AuthScheme> {
        self.active_scheme
    }

    /// Most preferred scheme offered for the proxy, whether or not it could
    /// be used.
    pub fn preferred_scheme(&self) -> Option<AuthScheme> {
        self.preferred_scheme
    }

    /// One line describing which proxy auth scheme is in effect and, when it
    /// differs from the preferred one, that a fallback happened.
    pub fn auth_summary(&self) -> String {
        match (self.preferred_scheme, self.active_scheme) {
            (None, _) => "no proxy authentication".to_string(),
            (Some(preferred), Some(active)) if preferred == active => {
                format!("proxy authentication: {active}")
            }
            (Some(preferred), Some(active)) => format!(
                "proxy authentication: {active} (proxy prefers {preferred}, \
                 which this client cannot send)"
            ),
            (Some(preferred), None) => format!(
                "proxy authentication: none (no offered scheme usable, preferred {preferred})"
            ),
        }
    }

    pub fn preemptive_authorization(&self) -> Option<&HeaderValue> {
        self.preemptive_authorization.as_ref()
    }

    pub fn tls_policy(&self) -> TlsPolicy {
        self.tls_policy
    }

    pub fn profile(&self) -> ClientProfile {
        self.profile
    }

    pub fn timeouts(&self) -> Timeouts {
        self.timeouts
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

impl fmt::Debug for ClientHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientHandle")
            .field("label", &self.label)
            .field("route", &self.route)
            .field("active_scheme", &self.active_scheme)
            .field("tls_policy", &self.tls_policy)
            .field("profile", &self.profile)
            .finish_non_exhaustive()
    }
}

impl Drop for ClientHandle {
    fn drop(&mut self) {
        log::debug!("{}: releasing client and pooled connections", self.label);
    }
}
