//! Request execution on top of a configured [`ClientHandle`].

use std::time::Instant;

use chrono::Utc;
use http::header::{ACCEPT, CONTENT_TYPE};
use http::{HeaderMap, HeaderValue, Method, StatusCode};
use serde::Serialize;
use thiserror::Error;
use url::Url;

use super::builder::ClientHandle;
use super::transport::{OutboundRequest, TransportError, TransportErrorKind};
use crate::modules::events::{
    EventDispatcher, FailureEvent, PostResponseEvent, PreRequestEvent, ProbeEvent,
};

const APPLICATION_JSON: &str = "application/json";

/// Result of a completed exchange. Any status code lands here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpOutcome {
    pub status: u16,
    pub body: String,
    pub url: Url,
}

impl HttpOutcome {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[derive(Debug, Error)]
pub enum RequestError {
    #[error("invalid URL '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("failed to serialize request body: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Executes GET and JSON POST requests and reports them as events.
#[derive(Clone, Default)]
pub struct RequestExecutor {
    events: EventDispatcher,
}

impl RequestExecutor {
    pub fn new(events: EventDispatcher) -> Self {
        Self { events }
    }

    pub fn with_logging() -> Self {
        Self::new(EventDispatcher::with_logging())
    }

    pub fn get(&self, client: &ClientHandle, url: &str) -> Result<HttpOutcome, RequestError> {
        self.execute(client, Method::GET, url, None)
    }

    /// POSTs an already-encoded JSON document.
    pub fn post(
        &self,
        client: &ClientHandle,
        url: &str,
        json_body: impl Into<String>,
    ) -> Result<HttpOutcome, RequestError> {
        self.execute(client, Method::POST, url, Some(json_body.into()))
    }

    pub fn post_json<T: Serialize + ?Sized>(
        &self,
        client: &ClientHandle,
        url: &str,
        payload: &T,
    ) -> Result<HttpOutcome, RequestError> {
        let body = serde_json::to_string(payload)?;
        self.post(client, url, body)
    }

    fn execute(
        &self,
        client: &ClientHandle,
        method: Method,
        url: &str,
        body: Option<String>,
    ) -> Result<HttpOutcome, RequestError> {
        let proxy = client.route().map(|route| route.to_string());
        let scheme = client.active_scheme().map(|scheme| scheme.to_string());

        let parsed = match Url::parse(url) {
            Ok(parsed) => parsed,
            Err(source) => {
                let error = RequestError::InvalidUrl {
                    url: url.to_string(),
                    source,
                };
                self.fail(url, &method, &proxy, &scheme, &error);
                return Err(error);
            }
        };

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(APPLICATION_JSON));
        let mut request = OutboundRequest::new(method.clone(), parsed.clone());
        if let Some(body) = body {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static(APPLICATION_JSON));
            request = request.with_body(body);
        }
        let request = request.with_headers(headers);

        self.events.dispatch(ProbeEvent::PreRequest(PreRequestEvent {
            url: parsed.clone(),
            method: method.clone(),
            proxy: proxy.clone(),
            scheme: scheme.clone(),
            timestamp: Utc::now(),
        }));

        let started = Instant::now();
        let result = client.transport().send(&request).and_then(|response| {
            let status = response.status;
            if client.route().is_some() && status == StatusCode::PROXY_AUTHENTICATION_REQUIRED {
                return Err(TransportError::new(
                    TransportErrorKind::ProxyAuthentication,
                    "proxy answered 407 after all offered credentials",
                )
                .with_status(status));
            }
            Ok(response)
        });

        let response = match result {
            Ok(response) => response,
            Err(err) => {
                let error = RequestError::Transport(err.with_context(
                    &parsed,
                    proxy.as_deref(),
                    scheme.as_deref(),
                ));
                self.fail(url, &method, &proxy, &scheme, &error);
                return Err(error);
            }
        };

        let outcome = HttpOutcome {
            status: response.status,
            body: String::from_utf8_lossy(&response.body).into_owned(),
            url: response.url,
        };
        self.events.dispatch(ProbeEvent::PostResponse(PostResponseEvent {
            url: parsed,
            method,
            status: outcome.status,
            body_len: response.body.len(),
            latency: started.elapsed(),
            timestamp: Utc::now(),
        }));
        Ok(outcome)
    }

    fn fail(
        &self,
        url: &str,
        method: &Method,
        proxy: &Option<String>,
        scheme: &Option<String>,
        error: &RequestError,
    ) {
        self.events.dispatch(ProbeEvent::Failure(FailureEvent {
            url: url.to_string(),
            method: method.clone(),
            proxy: proxy.clone(),
            scheme: scheme.clone(),
            error: error.to_string(),
            timestamp: Utc::now(),
        }));
    }
}
