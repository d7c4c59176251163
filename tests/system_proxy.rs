//! Environment proxy variables are process-global, so everything that sets
//! them lives in this one test binary and one test function.

use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;

use proxyprobe_rs::{ClientProfile, HttpClientBuilder, NetworkPolicy, ProxyConfig, RequestExecutor};

/// HTTP listener that records request lines and answers `200 {}`.
struct Recorder {
    port: u16,
    lines: Arc<Mutex<Vec<String>>>,
}

impl Recorder {
    fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let lines = Arc::new(Mutex::new(Vec::new()));
        let sink = lines.clone();

        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { break };
                answer(stream, &sink);
            }
        });

        Self { port, lines }
    }

    fn url(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }

    fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap().clone()
    }
}

fn answer(stream: TcpStream, sink: &Mutex<Vec<String>>) -> Option<()> {
    let mut reader = BufReader::new(stream.try_clone().ok()?);
    let mut request_line = String::new();
    reader.read_line(&mut request_line).ok()?;
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line).ok()? == 0 || line.trim_end().is_empty() {
            break;
        }
    }
    sink.lock().unwrap().push(request_line.trim_end().to_string());

    let mut stream = stream;
    stream
        .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\nConnection: close\r\n\r\n{}")
        .ok()?;
    stream.flush().ok()
}

fn direct_client(policy: NetworkPolicy) -> proxyprobe_rs::ClientHandle {
    HttpClientBuilder::new(ClientProfile::Minimal)
        .with_network_policy(policy)
        .build()
        .unwrap()
}

fn set_env(key: &str, value: &str) {
    // SAFETY: this binary runs a single test, no other thread reads the
    // environment concurrently.
    unsafe { std::env::set_var(key, value) }
}

fn remove_env(key: &str) {
    // SAFETY: see `set_env`.
    unsafe { std::env::remove_var(key) }
}

#[test]
fn environment_proxies_never_replace_the_route() {
    let upstream = Recorder::start();
    let route = Recorder::start();
    let env_proxy = Recorder::start();

    for key in ["NO_PROXY", "no_proxy", "HTTPS_PROXY", "https_proxy", "REQUEST_METHOD"] {
        remove_env(key);
    }
    set_env("HTTP_PROXY", &env_proxy.url());
    set_env("http_proxy", &env_proxy.url());
    set_env("ALL_PROXY", "socks5://127.0.0.1:1");
    set_env("all_proxy", "socks5://127.0.0.1:1");

    let executor = RequestExecutor::default();
    let target = format!("{}/todos/1", upstream.url());

    // Default policy, no route: the request goes straight to the server.
    let outcome = executor
        .get(&direct_client(NetworkPolicy::default()), &target)
        .unwrap();
    assert_eq!(outcome.status, 200);
    assert_eq!(upstream.lines(), vec!["GET /todos/1 HTTP/1.1".to_string()]);
    assert!(env_proxy.lines().is_empty());

    // Default policy with a configured route: only the route sees traffic.
    let mut config = ProxyConfig::new();
    config.set_host("127.0.0.1");
    config.set_port(route.port.to_string());
    let proxied = HttpClientBuilder::new(ClientProfile::Minimal)
        .with_proxy_config(config)
        .with_network_policy(NetworkPolicy::default())
        .build()
        .unwrap();
    executor.get(&proxied, "http://example.test/get").unwrap();
    assert_eq!(route.lines(), vec!["GET http://example.test/get HTTP/1.1".to_string()]);
    assert!(env_proxy.lines().is_empty());

    // Only a SOCKS signal left in the environment: still direct.
    remove_env("HTTP_PROXY");
    remove_env("http_proxy");
    let outcome = executor
        .get(&direct_client(NetworkPolicy::default()), &target)
        .unwrap();
    assert_eq!(outcome.status, 200);
    assert_eq!(upstream.lines().len(), 2);

    // Control: with suppression switched off the environment proxy takes over.
    set_env("HTTP_PROXY", &env_proxy.url());
    set_env("http_proxy", &env_proxy.url());
    let honouring_env = NetworkPolicy {
        ignore_system_proxies: false,
        suppress_socks: false,
        prefer_ipv4: false,
    };
    executor.get(&direct_client(honouring_env), &target).unwrap();
    assert_eq!(env_proxy.lines(), vec![format!("GET {target} HTTP/1.1")]);
    assert_eq!(upstream.lines().len(), 2);
}
