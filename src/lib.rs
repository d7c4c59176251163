//! # proxyprobe-rs
//!
//! Diagnostic HTTP client for corporate networks: resolves proxy settings
//! from a properties file and the command line, picks a proxy authentication
//! scheme, applies a TLS trust policy and runs a GET plus a JSON POST through
//! the configured proxy.
//!
//! ## Features
//!
//! - File-then-CLI proxy configuration with redacted logging
//! - Basic, NTLM and Negotiate scheme selection with ordered fallback
//! - Preemptive `Proxy-Authorization` for Basic
//! - Strict or trust-all TLS, optional extra root certificates
//! - System and SOCKS proxy suppression
//!
//! ## Example
//!
//! ```no_run
//! use proxyprobe_rs::{
//!     AuthEnvironment, AuthSchemeSelector, ClientProfile, HttpClientBuilder, ProxyConfig,
//!     RequestExecutor,
//! };
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut proxy = ProxyConfig::new();
//!     proxy.set_host("proxy.corp.example");
//!     proxy.set_port("8080");
//!     proxy.set_username("alice");
//!     proxy.set_password("secret");
//!
//!     let credentials = AuthSchemeSelector::new(AuthEnvironment::detect()).resolve(&proxy);
//!     let client = HttpClientBuilder::new(ClientProfile::Enterprise)
//!         .with_proxy_config(proxy)
//!         .with_credentials(credentials)
//!         .build()?;
//!
//!     let outcome = RequestExecutor::with_logging().get(&client, "https://example.com")?;
//!     println!("{}: {}", outcome.status, outcome.body);
//!     Ok(())
//! }
//! ```

mod probe;

pub mod client;
pub mod config;
pub mod modules;

pub use crate::probe::{PING_MESSAGE, PingPayload, ProbeError, ProbeRunner, ProbeStep, RunReport};

pub use crate::client::{
    ClientError,
    ClientHandle,
    ClientProfile,
    HttpClientBuilder,
    HttpOutcome,
    HttpTransport,
    OutboundRequest,
    RequestError,
    RequestExecutor,
    Timeouts,
    TransportError,
    TransportErrorKind,
    TransportResponse,
};

pub use crate::config::{
    AppSettings,
    ConfigError,
    CredentialResolver,
    PropertiesFile,
    ProxyConfig,
    config_path_from_args,
};

pub use crate::modules::{
    AuthEnvironment,
    AuthError,
    AuthScheme,
    AuthSchemeSelector,
    CredentialSet,
    EventDispatcher,
    EventHandler,
    LoggingHandler,
    NetworkPolicy,
    ProbeEvent,
    ResolvedCredential,
    TlsConfig,
    TlsPolicy,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
