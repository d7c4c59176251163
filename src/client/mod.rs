//! HTTP client layer.
//!
//! Profiles describe the defaults, the builder turns proxy, credential and
//! TLS decisions into a [`ClientHandle`], and the executor sends requests
//! through it.

pub mod builder;
pub mod executor;
pub mod profile;
pub mod transport;

pub use builder::{ClientError, ClientHandle, HttpClientBuilder, basic_proxy_authorization};
pub use executor::{HttpOutcome, RequestError, RequestExecutor};
pub use profile::{ClientProfile, Timeouts};
pub use transport::{
    HttpTransport, OutboundRequest, ReqwestTransport, TransportError, TransportErrorKind,
    TransportResponse,
};
