use std::io::{Read, Write};
use std::net::TcpListener;
use std::path::PathBuf;
use std::sync::{Mutex, OnceLock};
use std::thread;

use log::{Level, LevelFilter, Metadata, Record};
use native_tls::{Identity, TlsAcceptor};
use proxyprobe_rs::{
    ClientProfile, HttpClientBuilder, RequestError, RequestExecutor, TlsConfig, TlsPolicy,
    TransportErrorKind,
};

const CERT: &[u8] = include_bytes!("fixtures/localhost-cert.pem");
const KEY: &[u8] = include_bytes!("fixtures/localhost-key.pem");

struct CaptureLogger {
    warnings: Mutex<Vec<String>>,
}

impl log::Log for CaptureLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= Level::Warn
    }

    fn log(&self, record: &Record<'_>) {
        if record.level() == Level::Warn {
            self.warnings.lock().unwrap().push(record.args().to_string());
        }
    }

    fn flush(&self) {}
}

fn logger() -> &'static CaptureLogger {
    static LOGGER: OnceLock<&'static CaptureLogger> = OnceLock::new();
    LOGGER.get_or_init(|| {
        let logger: &'static CaptureLogger = Box::leak(Box::new(CaptureLogger {
            warnings: Mutex::new(Vec::new()),
        }));
        log::set_logger(logger).unwrap();
        log::set_max_level(LevelFilter::Warn);
        logger
    })
}

/// Self-signed HTTPS server that answers every connection with `{"ok":true}`.
fn start_tls_server() -> u16 {
    let identity = Identity::from_pkcs8(CERT, KEY).unwrap();
    let acceptor = TlsAcceptor::new(identity).unwrap();
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();

    thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(stream) = stream else { break };
            let Ok(mut tls) = acceptor.accept(stream) else {
                continue;
            };
            let mut buffer = [0u8; 4096];
            let _ = tls.read(&mut buffer);
            let body = r#"{"ok":true}"#;
            let response = format!(
                concat!(
                    "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\n",
                    "Content-Length: {}\r\nConnection: close\r\n\r\n{}"
                ),
                body.len(),
                body
            );
            let _ = tls.write_all(response.as_bytes());
            let _ = tls.flush();
        }
    });

    port
}

#[test]
fn strict_policy_rejects_self_signed_certificate() {
    let port = start_tls_server();
    let client = HttpClientBuilder::new(ClientProfile::Minimal)
        .with_tls_config(TlsConfig::strict())
        .build()
        .unwrap();
    assert_eq!(client.tls_policy(), TlsPolicy::Strict);

    let err = RequestExecutor::default()
        .get(&client, &format!("https://127.0.0.1:{port}/"))
        .unwrap_err();
    let RequestError::Transport(err) = err else {
        panic!("expected a transport error, got {err}");
    };
    assert_eq!(err.kind, TransportErrorKind::Tls, "{err}");
    assert_eq!(err.target, "127.0.0.1");
}

#[test]
fn trust_all_accepts_self_signed_certificate_and_warns_once() {
    let logger = logger();
    let port = start_tls_server();
    let client = HttpClientBuilder::new(ClientProfile::Minimal)
        .with_tls_config(TlsConfig::trust_all())
        .build()
        .unwrap();

    let outcome = RequestExecutor::default()
        .get(&client, &format!("https://127.0.0.1:{port}/"))
        .unwrap();
    assert_eq!(outcome.status, 200);
    assert_eq!(outcome.body, r#"{"ok":true}"#);

    let trust_all_warnings = logger
        .warnings
        .lock()
        .unwrap()
        .iter()
        .filter(|line| line.contains("trust-all"))
        .count();
    assert_eq!(trust_all_warnings, 1);
}

#[test]
fn extra_root_certificate_makes_strict_succeed() {
    let port = start_tls_server();
    let tls = TlsConfig {
        extra_root_pem: Some(PathBuf::from(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/tests/fixtures/localhost-cert.pem"
        ))),
        ..TlsConfig::strict()
    };
    let client = HttpClientBuilder::new(ClientProfile::Minimal)
        .with_tls_config(tls)
        .build()
        .unwrap();

    let outcome = RequestExecutor::default()
        .get(&client, &format!("https://127.0.0.1:{port}/"))
        .unwrap();
    assert!(outcome.is_success());
}
