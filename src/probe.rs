//! Probe orchestration.
//!
//! Wires the resolved proxy configuration, credential selection, TLS trust
//! and network policy into one client, then runs the diagnostic exchange:
//! a GET followed by a JSON POST.

use http::Method;
use serde::Serialize;
use thiserror::Error;

use crate::client::{
    ClientError, ClientHandle, HttpClientBuilder, HttpOutcome, RequestError, RequestExecutor,
};
use crate::config::{AppSettings, ProxyConfig};
use crate::modules::auth::{AuthEnvironment, AuthSchemeSelector};
use crate::modules::proxy::NetworkPolicy;

/// Payload sent by the POST step.
#[derive(Debug, Clone, Serialize)]
pub struct PingPayload<'a> {
    pub ping: &'a str,
}

pub const PING_MESSAGE: &str = "hello-from-cli";

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("client construction failed: {0}")]
    Client(#[from] ClientError),
}

/// One executed request and what came of it.
#[derive(Debug)]
pub struct ProbeStep {
    pub method: Method,
    pub url: String,
    pub result: Result<HttpOutcome, RequestError>,
}

impl ProbeStep {
    pub fn succeeded(&self) -> bool {
        matches!(&self.result, Ok(outcome) if outcome.is_success())
    }
}

#[derive(Debug, Default)]
pub struct RunReport {
    pub steps: Vec<ProbeStep>,
}

impl RunReport {
    pub fn failures(&self) -> usize {
        self.steps.iter().filter(|step| !step.succeeded()).count()
    }

    /// `0` unless `strict` is set and at least one step failed.
    pub fn exit_code(&self, strict: bool) -> i32 {
        if strict && self.failures() > 0 { 1 } else { 0 }
    }
}

pub struct ProbeRunner {
    settings: AppSettings,
    proxy: ProxyConfig,
    environment: AuthEnvironment,
    network_policy: NetworkPolicy,
    executor: RequestExecutor,
}

impl ProbeRunner {
    pub fn new(settings: AppSettings, proxy: ProxyConfig) -> Self {
        Self {
            settings,
            proxy,
            environment: AuthEnvironment::detect(),
            network_policy: NetworkPolicy::default(),
            executor: RequestExecutor::with_logging(),
        }
    }

    pub fn with_environment(mut self, environment: AuthEnvironment) -> Self {
        self.environment = environment;
        self
    }

    pub fn with_network_policy(mut self, policy: NetworkPolicy) -> Self {
        self.network_policy = policy;
        self
    }

    pub fn with_executor(mut self, executor: RequestExecutor) -> Self {
        self.executor = executor;
        self
    }

    pub fn settings(&self) -> &AppSettings {
        &self.settings
    }

    /// Builder carrying every decision for this run: profile, proxy route,
    /// offered credentials and TLS trust.
    pub fn client_builder(&self) -> HttpClientBuilder {
        let profile = self.settings.profile;
        let selector = AuthSchemeSelector::new(self.environment.clone())
            .with_allowed(profile.allowed_schemes());
        let credentials = selector.resolve(&self.proxy);

        HttpClientBuilder::new(profile)
            .with_proxy_config(self.proxy.clone())
            .with_credentials(credentials)
            .with_tls_config(self.settings.tls.clone())
    }

    /// Installs the network policy, builds the client and runs both steps.
    pub fn run(&self) -> Result<RunReport, ProbeError> {
        let policy = *self.network_policy.install();
        let client = self.client_builder().with_network_policy(policy).build()?;
        Ok(self.run_with(&client))
    }

    /// Runs both steps on an already built client. Request failures are
    /// recorded in the report, never propagated.
    pub fn run_with(&self, client: &ClientHandle) -> RunReport {
        log::info!(
            "starting probe with {} (tls {})",
            client.label(),
            client.tls_policy()
        );
        if client.route().is_some() {
            log::info!("{}", client.auth_summary());
        }

        let mut report = RunReport::default();

        let get = self.executor.get(client, &self.settings.get_url);
        report.steps.push(record(Method::GET, &self.settings.get_url, get));

        let payload = PingPayload { ping: PING_MESSAGE };
        let post = self
            .executor
            .post_json(client, &self.settings.post_url, &payload);
        report
            .steps
            .push(record(Method::POST, &self.settings.post_url, post));

        log::info!(
            "probe finished: {} request(s), {} failed",
            report.steps.len(),
            report.failures()
        );
        report
    }
}

fn record(method: Method, url: &str, result: Result<HttpOutcome, RequestError>) -> ProbeStep {
    match &result {
        Ok(outcome) => log::info!(
            "{method} {url} response code: {}, body: {}",
            outcome.status,
            outcome.body
        ),
        Err(err) => log::error!("{method} {url} failed: {err}"),
    }
    ProbeStep {
        method,
        url: url.to_string(),
        result,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{
        ClientProfile, HttpTransport, OutboundRequest, TransportError, TransportErrorKind,
        TransportResponse,
    };
    use crate::modules::auth::AuthScheme;
    use bytes::Bytes;
    use http::HeaderMap;
    use std::sync::{Arc, Mutex};

    struct ScriptedTransport {
        statuses: Mutex<Vec<Result<u16, TransportErrorKind>>>,
        seen: Arc<Mutex<Vec<OutboundRequest>>>,
    }

    impl ScriptedTransport {
        fn new(
            statuses: Vec<Result<u16, TransportErrorKind>>,
        ) -> (Self, Arc<Mutex<Vec<OutboundRequest>>>) {
            let seen = Arc::new(Mutex::new(Vec::new()));
            let transport = Self {
                statuses: Mutex::new(statuses.into_iter().rev().collect()),
                seen: seen.clone(),
            };
            (transport, seen)
        }
    }

    impl HttpTransport for ScriptedTransport {
        fn send(&self, request: &OutboundRequest) -> Result<TransportResponse, TransportError> {
            self.seen.lock().unwrap().push(request.clone());
            match self.statuses.lock().unwrap().pop() {
                Some(Ok(status)) => Ok(TransportResponse {
                    status,
                    headers: HeaderMap::new(),
                    body: Bytes::from_static(b"{}"),
                    url: request.url.clone(),
                }),
                Some(Err(kind)) => Err(TransportError::new(kind, "scripted failure")),
                None => Err(TransportError::new(TransportErrorKind::Request, "no script left")),
            }
        }
    }

    fn settings() -> AppSettings {
        AppSettings {
            get_url: "https://example.test/todos/1".into(),
            post_url: "https://example.test/post".into(),
            ..AppSettings::default()
        }
    }

    fn proxy() -> ProxyConfig {
        let mut config = ProxyConfig::new();
        config.set_host("http://proxy.local");
        config.set_port("8080");
        config.set_username("alice");
        config.set_password("secret");
        config
    }

    fn runner(settings: AppSettings, proxy: ProxyConfig) -> ProbeRunner {
        ProbeRunner::new(settings, proxy)
            .with_environment(AuthEnvironment::default())
            .with_executor(RequestExecutor::default())
    }

    #[test]
    fn runs_get_then_post_ping() {
        let (transport, seen) = ScriptedTransport::new(vec![Ok(200), Ok(200)]);
        let runner = runner(settings(), proxy());
        let client = runner
            .client_builder()
            .build_with_transport(Box::new(transport))
            .unwrap();

        let report = runner.run_with(&client);
        assert_eq!(report.failures(), 0);
        assert_eq!(report.exit_code(true), 0);

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].method, Method::GET);
        assert_eq!(seen[1].method, Method::POST);
        assert_eq!(
            seen[1].body.as_deref(),
            Some(br#"{"ping":"hello-from-cli"}"#.as_slice())
        );
    }

    #[test]
    fn failures_do_not_stop_the_run() {
        let (transport, seen) =
            ScriptedTransport::new(vec![Err(TransportErrorKind::Connect), Ok(500)]);
        let runner = runner(settings(), proxy());
        let client = runner
            .client_builder()
            .build_with_transport(Box::new(transport))
            .unwrap();

        let report = runner.run_with(&client);
        assert_eq!(seen.lock().unwrap().len(), 2);
        assert_eq!(report.failures(), 2);
        assert_eq!(report.exit_code(false), 0);
        assert_eq!(report.exit_code(true), 1);
    }

    #[test]
    fn minimal_profile_only_offers_basic() {
        let mut settings = settings();
        settings.profile = ClientProfile::Minimal;
        let mut proxy = proxy();
        proxy.set_domain("CORP");
        let runner = runner(settings, proxy).with_environment(AuthEnvironment {
            integrated_auth: true,
            ..AuthEnvironment::default()
        });

        let (transport, _) = ScriptedTransport::new(Vec::new());
        let client = runner
            .client_builder()
            .build_with_transport(Box::new(transport))
            .unwrap();
        assert_eq!(client.credentials().schemes(), vec![AuthScheme::Basic]);
        assert_eq!(client.active_scheme(), Some(AuthScheme::Basic));
    }

    #[test]
    fn direct_run_without_proxy() {
        let (transport, seen) = ScriptedTransport::new(vec![Ok(200), Ok(201)]);
        let runner = runner(settings(), ProxyConfig::new());
        let client = runner
            .client_builder()
            .build_with_transport(Box::new(transport))
            .unwrap();
        assert!(client.route().is_none());
        assert!(client.credentials().is_empty());

        let report = runner.run_with(&client);
        assert_eq!(report.failures(), 0);
        assert_eq!(seen.lock().unwrap().len(), 2);
    }
}
