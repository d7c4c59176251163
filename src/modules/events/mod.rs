//! Request lifecycle events.
//!
//! The executor reports what it is about to send and what came back; handlers
//! decide what to do with it (logging by default, counters in tests).

use chrono::{DateTime, Utc};
use http::Method;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Structured pre-request event.
#[derive(Debug, Clone)]
pub struct PreRequestEvent {
    pub url: Url,
    pub method: Method,
    pub proxy: Option<String>,
    pub scheme: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Structured post-response event.
#[derive(Debug, Clone)]
pub struct PostResponseEvent {
    pub url: Url,
    pub method: Method,
    pub status: u16,
    pub body_len: usize,
    pub latency: Duration,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct FailureEvent {
    pub url: String,
    pub method: Method,
    pub proxy: Option<String>,
    pub scheme: Option<String>,
    pub error: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub enum ProbeEvent {
    PreRequest(PreRequestEvent),
    PostResponse(PostResponseEvent),
    Failure(FailureEvent),
}

/// Trait implemented by event handlers.
pub trait EventHandler: Send + Sync {
    fn handle(&self, event: &ProbeEvent);
}

/// Dispatcher that broadcasts events to registered handlers.
#[derive(Default, Clone)]
pub struct EventDispatcher {
    handlers: Vec<Arc<dyn EventHandler>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self { handlers: Vec::new() }
    }

    /// Dispatcher with the [`LoggingHandler`] already registered.
    pub fn with_logging() -> Self {
        let mut dispatcher = Self::new();
        dispatcher.register_handler(Arc::new(LoggingHandler));
        dispatcher
    }

    pub fn register_handler(&mut self, handler: Arc<dyn EventHandler>) {
        self.handlers.push(handler);
    }

    pub fn dispatch(&self, event: ProbeEvent) {
        for handler in &self.handlers {
            handler.handle(&event);
        }
    }
}

/// Logs events using the `log` crate.
#[derive(Debug)]
pub struct LoggingHandler;

impl EventHandler for LoggingHandler {
    fn handle(&self, event: &ProbeEvent) {
        match event {
            ProbeEvent::PreRequest(pre) => {
                log::info!(
                    "-> {} {} via {} (auth: {})",
                    pre.method,
                    pre.url,
                    pre.proxy.as_deref().unwrap_or("direct"),
                    pre.scheme.as_deref().unwrap_or("none")
                );
            }
            ProbeEvent::PostResponse(post) => {
                let line = format!(
                    "<- {} {} -> {} ({} bytes, {:.2}s)",
                    post.method,
                    post.url,
                    post.status,
                    post.body_len,
                    post.latency.as_secs_f64()
                );
                if (200..300).contains(&post.status) {
                    log::info!("{line}");
                } else {
                    log::warn!("{line}");
                }
            }
            ProbeEvent::Failure(failure) => {
                log::error!(
                    "{} {} failed via {} (auth: {}): {}",
                    failure.method,
                    failure.url,
                    failure.proxy.as_deref().unwrap_or("direct"),
                    failure.scheme.as_deref().unwrap_or("none"),
                    failure.error
                );
            }
        }
    }
}
