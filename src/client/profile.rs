//! Client profiles.
//!
//! A profile bundles the defaults that used to differ between the ad-hoc
//! client variants: timeouts, retry, pooling and which auth schemes may be
//! offered.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::modules::auth::AuthScheme;

/// Per-phase timeouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub connect: Duration,
    pub read: Duration,
    pub write: Duration,
}

impl Timeouts {
    pub fn new(connect: Duration, read: Duration, write: Duration) -> Self {
        Self {
            connect,
            read,
            write,
        }
    }

    /// Whole-request timeout used by backends without separate read/write
    /// deadlines.
    pub fn total(&self) -> Duration {
        self.read.max(self.write)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ClientProfile {
    /// Pooled client with moderate timeouts and one transparent retry.
    Pooled,
    /// Corporate-network client: long timeouts and a larger pool.
    #[default]
    Enterprise,
    /// Single-connection client that only sends a static Basic header.
    Minimal,
}

impl ClientProfile {
    pub fn timeouts(self) -> Timeouts {
        match self {
            ClientProfile::Pooled => Timeouts::new(
                Duration::from_secs(30),
                Duration::from_secs(60),
                Duration::from_secs(60),
            ),
            ClientProfile::Enterprise => Timeouts::new(
                Duration::from_secs(60),
                Duration::from_secs(120),
                Duration::from_secs(120),
            ),
            ClientProfile::Minimal => Timeouts::new(
                Duration::from_secs(10),
                Duration::from_secs(30),
                Duration::from_secs(30),
            ),
        }
    }

    /// Retry once when the connection itself fails.
    pub fn retry_on_connection_failure(self) -> bool {
        !matches!(self, ClientProfile::Minimal)
    }

    pub fn max_idle_per_host(self) -> usize {
        match self {
            ClientProfile::Pooled => 5,
            ClientProfile::Enterprise => 20,
            ClientProfile::Minimal => 0,
        }
    }

    pub fn allowed_schemes(self) -> &'static [AuthScheme] {
        match self {
            ClientProfile::Minimal => &[AuthScheme::Basic],
            _ => &[AuthScheme::Negotiate, AuthScheme::Ntlm, AuthScheme::Basic],
        }
    }

    pub fn user_agent(self) -> String {
        format!("proxyprobe/{} ({self})", env!("CARGO_PKG_VERSION"))
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ClientProfile::Pooled => "pooled",
            ClientProfile::Enterprise => "enterprise",
            ClientProfile::Minimal => "minimal",
        }
    }
}

impl fmt::Display for ClientProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown client profile '{0}'")]
pub struct UnknownProfile(String);

impl FromStr for ClientProfile {
    type Err = UnknownProfile;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pooled" => Ok(ClientProfile::Pooled),
            "enterprise" | "corporate" => Ok(ClientProfile::Enterprise),
            "minimal" => Ok(ClientProfile::Minimal),
            _ => Err(UnknownProfile(value.to_string())),
        }
    }
}
