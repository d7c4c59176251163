//! Transport seam between the executor and the concrete HTTP client.
//!
//! [`ReqwestTransport`] wraps a blocking `reqwest::Client`; tests plug in
//! their own [`HttpTransport`] to observe outbound requests.

use std::error::Error as StdError;
use std::fmt;

use bytes::Bytes;
use http::{HeaderMap, Method};
use reqwest::blocking::Client;
use thiserror::Error;
use url::Url;

/// Request handed to a transport.
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
}

impl OutboundRequest {
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
            body: None,
        }
    }

    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }
}

/// Raw response produced by a transport.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub url: Url,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    Timeout,
    Connect,
    Tls,
    /// The proxy kept answering 407.
    ProxyAuthentication,
    /// The proxy refused to open a CONNECT tunnel.
    ProxyTunnel,
    Body,
    Request,
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TransportErrorKind::Timeout => "timeout",
            TransportErrorKind::Connect => "connection failed",
            TransportErrorKind::Tls => "TLS handshake failed",
            TransportErrorKind::ProxyAuthentication => "proxy authentication failed",
            TransportErrorKind::ProxyTunnel => "proxy tunnel refused",
            TransportErrorKind::Body => "failed to read body",
            TransportErrorKind::Request => "request failed",
        };
        f.write_str(label)
    }
}

/// Connection-level failure with enough context to diagnose it from a log.
#[derive(Debug, Error)]
#[error("{kind} for {target} (proxy: {proxy}, auth: {scheme}): {message}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub target: String,
    pub proxy: String,
    pub scheme: String,
    pub message: String,
    pub status: Option<u16>,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            target: "<unknown>".to_string(),
            proxy: "direct".to_string(),
            scheme: "none".to_string(),
            message: message.into(),
            status: None,
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    /// Fills in the target host, proxy endpoint and auth scheme.
    pub fn with_context(
        mut self,
        target: &Url,
        proxy: Option<&str>,
        scheme: Option<&str>,
    ) -> Self {
        self.target = target.host_str().unwrap_or("<no host>").to_string();
        if let Some(proxy) = proxy {
            self.proxy = proxy.to_string();
        }
        if let Some(scheme) = scheme {
            self.scheme = scheme.to_string();
        }
        self
    }

    fn from_reqwest(err: &reqwest::Error) -> Self {
        let mut error = Self::new(classify(err), error_chain(err));
        if let Some(status) = err.status() {
            error.status = Some(status.as_u16());
        }
        error
    }
}

/// Contract that abstracts the blocking HTTP transport.
pub trait HttpTransport: Send + Sync {
    fn send(&self, request: &OutboundRequest) -> Result<TransportResponse, TransportError>;
}

/// Reqwest-backed transport.
pub struct ReqwestTransport {
    client: Client,
    retry_on_connection_failure: bool,
}

impl ReqwestTransport {
    pub fn new(client: Client, retry_on_connection_failure: bool) -> Self {
        Self {
            client,
            retry_on_connection_failure,
        }
    }

    fn send_once(&self, request: &OutboundRequest) -> Result<TransportResponse, reqwest::Error> {
        let mut builder = self
            .client
            .request(request.method.clone(), request.url.clone())
            .headers(request.headers.clone());
        if let Some(body) = &request.body {
            builder = builder.body(body.to_vec());
        }

        let response = builder.send()?;
        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let url = response.url().clone();
        let body = response.bytes()?;
        Ok(TransportResponse {
            status,
            headers,
            body,
            url,
        })
    }
}

impl HttpTransport for ReqwestTransport {
    fn send(&self, request: &OutboundRequest) -> Result<TransportResponse, TransportError> {
        match self.send_once(request) {
            Ok(response) => Ok(response),
            Err(err) if self.retry_on_connection_failure && err.is_connect() => {
                log::warn!(
                    "connection to {} failed, retrying once: {}",
                    request.url,
                    error_chain(&err)
                );
                self.send_once(request)
                    .map_err(|err| TransportError::from_reqwest(&err))
            }
            Err(err) => Err(TransportError::from_reqwest(&err)),
        }
    }
}

/// Maps a reqwest failure to a kind. Only the source chain is inspected;
/// the top-level message embeds the request URL and says nothing about
/// the cause.
fn classify(err: &reqwest::Error) -> TransportErrorKind {
    if err.is_timeout() {
        return TransportErrorKind::Timeout;
    }
    let mut source = err.source();
    while let Some(cause) = source {
        if let Some(kind) = classify_cause(cause) {
            return kind;
        }
        source = cause.source();
    }
    if err.is_connect() {
        TransportErrorKind::Connect
    } else if err.is_body() || err.is_decode() {
        TransportErrorKind::Body
    } else {
        TransportErrorKind::Request
    }
}

fn classify_cause(cause: &(dyn StdError + 'static)) -> Option<TransportErrorKind> {
    if cause.downcast_ref::<native_tls::Error>().is_some() {
        return Some(TransportErrorKind::Tls);
    }
    let text = cause.to_string().to_ascii_lowercase();
    if text.contains("proxy authentication required")
        || text.contains("proxy authorization required")
    {
        Some(TransportErrorKind::ProxyAuthentication)
    } else if text.starts_with("tunnel error") && cause.source().is_none() {
        // Tunnel errors wrapping an io or connect failure are classified
        // by their inner cause.
        Some(TransportErrorKind::ProxyTunnel)
    } else if text.contains("certificate verify failed")
        || text.contains("handshake failure")
        || text.contains("invalid peer certificate")
    {
        Some(TransportErrorKind::Tls)
    } else {
        None
    }
}

/// Flattens an error and its sources into one line.
fn error_chain(err: &(dyn StdError + 'static)) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = cause.source();
    }
    message
}
