//! Cross-cutting services module
//!
//! Authentication scheme selection, TLS trust, proxy routing and request
//! lifecycle events used by the client layer.

pub mod auth;
pub mod events;
pub mod proxy;
pub mod tls;

// Re-export commonly used types
pub use auth::{
    AuthEnvironment, AuthError, AuthSchemeSelector, AuthScheme, AuthScope, CredentialSet,
    ResolvedCredential, Secret,
};
pub use events::{
    EventDispatcher, EventHandler, FailureEvent, LoggingHandler, PostResponseEvent,
    PreRequestEvent, ProbeEvent,
};
pub use proxy::{NetworkPolicy, ProxyRoute, ProxyRouteError, socks_signals};
pub use tls::{TlsConfig, TlsPolicy, TlsProtocol, TlsSetupError};
