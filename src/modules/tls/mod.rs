//! TLS trust policy for the upstream connection.
//!
//! `Strict` keeps the platform trust store and hostname verification.
//! `TrustAll` accepts any certificate for any host and exists only for
//! controlled diagnostics behind intercepting proxies; selecting it always
//! logs a warning.

use std::fmt;
use std::fs;
use std::path::PathBuf;
use std::str::FromStr;

use reqwest::blocking::ClientBuilder;
use reqwest::tls::Version;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TlsPolicy {
    #[default]
    Strict,
    TrustAll,
}

impl TlsPolicy {
    pub fn from_trust_all(trust_all: bool) -> Self {
        if trust_all {
            TlsPolicy::TrustAll
        } else {
            TlsPolicy::Strict
        }
    }
}

impl fmt::Display for TlsPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TlsPolicy::Strict => f.write_str("strict"),
            TlsPolicy::TrustAll => f.write_str("trust-all"),
        }
    }
}

/// Minimum TLS protocol version accepted from the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlsProtocol {
    Tls10,
    Tls11,
    Tls12,
}

impl TlsProtocol {
    fn version(self) -> Version {
        match self {
            TlsProtocol::Tls10 => Version::TLS_1_0,
            TlsProtocol::Tls11 => Version::TLS_1_1,
            TlsProtocol::Tls12 => Version::TLS_1_2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown TLS protocol '{0}'")]
pub struct UnknownTlsProtocol(String);

impl FromStr for TlsProtocol {
    type Err = UnknownTlsProtocol;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.trim_start_matches("tlsv").trim_start_matches("tls") {
            "1" | "1.0" => Ok(TlsProtocol::Tls10),
            "1.1" => Ok(TlsProtocol::Tls11),
            "1.2" => Ok(TlsProtocol::Tls12),
            _ => Err(UnknownTlsProtocol(value.to_string())),
        }
    }
}

/// Complete TLS settings for one client.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TlsConfig {
    pub policy: TlsPolicy,
    pub min_protocol: Option<TlsProtocol>,
    /// Extra PEM root certificates, e.g. a corporate interception CA.
    pub extra_root_pem: Option<PathBuf>,
}

#[derive(Debug, thiserror::Error)]
pub enum TlsSetupError {
    #[error("failed to read CA bundle {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid CA bundle {}: {source}", path.display())]
    Certificate {
        path: PathBuf,
        #[source]
        source: reqwest::Error,
    },
}

impl TlsConfig {
    pub fn strict() -> Self {
        Self::default()
    }

    pub fn trust_all() -> Self {
        Self {
            policy: TlsPolicy::TrustAll,
            ..Self::default()
        }
    }

    /// Logs the policy for one client construction; trust-all is a warning.
    pub fn announce(&self, label: &str) {
        match self.policy {
            TlsPolicy::Strict => log::debug!("{label}: strict TLS verification"),
            TlsPolicy::TrustAll => log::warn!(
                "{label}: TLS trust-all policy selected, certificate and hostname \
                 verification are DISABLED (diagnostics only)"
            ),
        }
    }

    /// Applies the trust settings to a client builder.
    ///
    /// `label` names the client in the trust-all warning.
    pub fn apply(
        &self,
        mut builder: ClientBuilder,
        label: &str,
    ) -> Result<ClientBuilder, TlsSetupError> {
        if let Some(path) = &self.extra_root_pem {
            let pem = fs::read(path).map_err(|source| TlsSetupError::Read {
                path: path.clone(),
                source,
            })?;
            let certificates = reqwest::Certificate::from_pem_bundle(&pem).map_err(|source| {
                TlsSetupError::Certificate {
                    path: path.clone(),
                    source,
                }
            })?;
            log::info!(
                "added {} root certificate(s) from {}",
                certificates.len(),
                path.display()
            );
            for certificate in certificates {
                builder = builder.add_root_certificate(certificate);
            }
        }

        if let Some(protocol) = self.min_protocol {
            builder = builder.min_tls_version(protocol.version());
        }

        self.announce(label);
        if self.policy == TlsPolicy::TrustAll {
            builder = builder
                .danger_accept_invalid_certs(true)
                .danger_accept_invalid_hostnames(true);
        }

        Ok(builder)
    }
}
