//! Proxy authentication scheme selection and credential material.
//!
//! Produces an ordered preference list of schemes for a resolved
//! [`ProxyConfig`] and the credential to bind for each of them. Nothing here
//! performs a handshake; the client backend decides which schemes it can
//! actually drive.

use std::fmt;

use thiserror::Error;

use crate::config::{ConfigError, ProxyConfig};

/// Proxy authentication schemes this crate knows how to describe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthScheme {
    Basic,
    Ntlm,
    Negotiate,
}

impl AuthScheme {
    pub fn as_str(self) -> &'static str {
        match self {
            AuthScheme::Basic => "Basic",
            AuthScheme::Ntlm => "NTLM",
            AuthScheme::Negotiate => "Negotiate",
        }
    }
}

impl fmt::Display for AuthScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Password wrapper that never prints its value.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(<redacted>)")
    }
}

/// Credential material for one scheme.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedCredential {
    None,
    Basic {
        username: String,
        password: Secret,
    },
    Ntlm {
        username: String,
        password: Secret,
        domain: String,
        workstation: String,
    },
    Negotiate {
        principal: String,
    },
}

impl ResolvedCredential {
    pub fn scheme(&self) -> Option<AuthScheme> {
        match self {
            ResolvedCredential::None => None,
            ResolvedCredential::Basic { .. } => Some(AuthScheme::Basic),
            ResolvedCredential::Ntlm { .. } => Some(AuthScheme::Ntlm),
            ResolvedCredential::Negotiate { .. } => Some(AuthScheme::Negotiate),
        }
    }
}

/// Binding key for a credential: the proxy endpoint plus the scheme.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AuthScope {
    pub host: String,
    pub port: u16,
    pub scheme: AuthScheme,
}

/// Ordered `(scope, credential)` bindings, most preferred first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CredentialSet {
    bindings: Vec<(AuthScope, ResolvedCredential)>,
}

impl CredentialSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(&mut self, scope: AuthScope, credential: ResolvedCredential) {
        self.bindings.retain(|(existing, _)| *existing != scope);
        self.bindings.push((scope, credential));
    }

    pub fn get(&self, scheme: AuthScheme) -> Option<&ResolvedCredential> {
        self.bindings
            .iter()
            .find(|(scope, _)| scope.scheme == scheme)
            .map(|(_, credential)| credential)
    }

    pub fn schemes(&self) -> Vec<AuthScheme> {
        self.bindings.iter().map(|(scope, _)| scope.scheme).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(AuthScope, ResolvedCredential)> {
        self.bindings.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid {scheme} credential: {reason}")]
    InvalidCredentialFormat {
        scheme: AuthScheme,
        reason: &'static str,
    },
    #[error("{scheme} proxy authentication is not supported by this client backend")]
    Unsupported { scheme: AuthScheme },
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Signals about the execution environment relevant to integrated auth.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthEnvironment {
    /// A Kerberos ticket cache or a domain-joined session is visible.
    pub integrated_auth: bool,
    /// Domain of the logged-in session, used for NTLM when none is configured.
    pub default_domain: Option<String>,
    pub workstation: String,
}

impl Default for AuthEnvironment {
    fn default() -> Self {
        Self {
            integrated_auth: false,
            default_domain: None,
            workstation: "localhost".to_string(),
        }
    }
}

impl AuthEnvironment {
    /// Probes the process environment.
    pub fn detect() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let dns_domain = non_empty("USERDNSDOMAIN");
        let integrated_auth = non_empty("KRB5CCNAME").is_some() || dns_domain.is_some();
        let default_domain = dns_domain.or_else(|| non_empty("USERDOMAIN"));
        let workstation = non_empty("COMPUTERNAME")
            .or_else(|| non_empty("HOSTNAME"))
            .unwrap_or_else(|| "localhost".to_string());

        Self {
            integrated_auth,
            default_domain,
            workstation,
        }
    }
}

/// Decides which proxy schemes to offer and builds their credentials.
#[derive(Debug, Clone)]
pub struct AuthSchemeSelector {
    environment: AuthEnvironment,
    allowed: Vec<AuthScheme>,
}

impl AuthSchemeSelector {
    pub fn new(environment: AuthEnvironment) -> Self {
        Self {
            environment,
            allowed: vec![AuthScheme::Negotiate, AuthScheme::Ntlm, AuthScheme::Basic],
        }
    }

    /// Restricts the offered schemes, e.g. for clients that can only send
    /// static headers.
    pub fn with_allowed(mut self, allowed: &[AuthScheme]) -> Self {
        self.allowed = allowed.to_vec();
        self
    }

    pub fn environment(&self) -> &AuthEnvironment {
        &self.environment
    }

    /// Ordered candidate schemes, most preferred first.
    pub fn select(&self, config: &ProxyConfig) -> Vec<AuthScheme> {
        if !config.has_credentials() {
            return Vec::new();
        }

        let preference: &[AuthScheme] = if config.effective_domain().is_some() {
            &[AuthScheme::Ntlm, AuthScheme::Basic]
        } else if self.environment.integrated_auth {
            &[AuthScheme::Negotiate, AuthScheme::Ntlm, AuthScheme::Basic]
        } else {
            &[AuthScheme::Basic]
        };

        preference
            .iter()
            .copied()
            .filter(|scheme| self.allowed.contains(scheme))
            .collect()
    }

    /// Credential material for a single scheme.
    pub fn credential_for(
        &self,
        scheme: AuthScheme,
        config: &ProxyConfig,
    ) -> Result<ResolvedCredential, AuthError> {
        let username = config.bare_username().trim();
        match scheme {
            AuthScheme::Basic => {
                require_user_and_password(scheme, username, config.password())?;
                Ok(ResolvedCredential::Basic {
                    username: username.to_string(),
                    password: Secret::new(config.password()),
                })
            }
            AuthScheme::Ntlm => {
                require_user_and_password(scheme, username, config.password())?;
                let domain = config
                    .effective_domain()
                    .map(str::to_string)
                    .or_else(|| self.environment.default_domain.clone())
                    .ok_or(ConfigError::MissingDomain)?;
                Ok(ResolvedCredential::Ntlm {
                    username: username.to_string(),
                    password: Secret::new(config.password()),
                    domain,
                    workstation: self.environment.workstation.clone(),
                })
            }
            AuthScheme::Negotiate => {
                if username.is_empty() {
                    return Err(AuthError::InvalidCredentialFormat {
                        scheme,
                        reason: "principal is empty",
                    });
                }
                let principal = match config.effective_domain() {
                    Some(domain) if !username.contains('@') => {
                        format!("{username}@{}", domain.to_ascii_uppercase())
                    }
                    _ => username.to_string(),
                };
                Ok(ResolvedCredential::Negotiate { principal })
            }
        }
    }

    /// Builds a credential set bound to the proxy endpoint. Schemes whose
    /// credentials cannot be built are logged and skipped.
    pub fn resolve(&self, config: &ProxyConfig) -> CredentialSet {
        let mut set = CredentialSet::new();
        for scheme in self.select(config) {
            match self.credential_for(scheme, config) {
                Ok(credential) => {
                    set.bind(
                        AuthScope {
                            host: config.host().to_string(),
                            port: config.port_as_int(),
                            scheme,
                        },
                        credential,
                    );
                }
                Err(err) => {
                    log::warn!("skipping {scheme} proxy authentication: {err}");
                }
            }
        }

        if set.is_empty() {
            log::info!("no proxy authentication offered");
        } else {
            let offered: Vec<&str> = set.schemes().into_iter().map(AuthScheme::as_str).collect();
            log::info!(
                "proxy authentication offered for {}:{} -> [{}]",
                config.host(),
                config.port_as_int(),
                offered.join(", ")
            );
        }
        set
    }
}

fn require_user_and_password(
    scheme: AuthScheme,
    username: &str,
    password: &str,
) -> Result<(), AuthError> {
    if username.is_empty() {
        return Err(AuthError::InvalidCredentialFormat {
            scheme,
            reason: "username is empty",
        });
    }
    if password.trim().is_empty() {
        return Err(AuthError::InvalidCredentialFormat {
            scheme,
            reason: "password is empty",
        });
    }
    Ok(())
}
