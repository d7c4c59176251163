//! Proxy connection and credential parameters.
//!
//! Values are kept as best-effort strings: an empty string means "not
//! configured". Normalization happens on write so every reader sees the same
//! shape regardless of where the value came from (file, CLI, tests).

/// Port used when the configured value cannot be parsed.
pub const DEFAULT_PROXY_PORT: u16 = 8080;

const SCHEME_PREFIXES: [&str; 2] = ["http://", "https://"];

/// Resolved proxy connection and authentication parameters.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ProxyConfig {
    host: String,
    port: String,
    username: String,
    password: String,
    domain: String,
}

impl ProxyConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores the host with one leading `http://` or `https://` removed.
    pub fn set_host(&mut self, host: impl AsRef<str>) {
        self.host = strip_scheme(host.as_ref().trim()).to_string();
    }

    pub fn set_port(&mut self, port: impl AsRef<str>) {
        self.port = port.as_ref().trim().to_string();
    }

    /// Stores the username verbatim, including any `DOMAIN\` prefix.
    pub fn set_username(&mut self, username: impl AsRef<str>) {
        self.username = username.as_ref().trim().to_string();
    }

    pub fn set_password(&mut self, password: impl Into<String>) {
        self.password = password.into();
    }

    pub fn set_domain(&mut self, domain: impl AsRef<str>) {
        self.domain = domain.as_ref().trim().to_string();
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> &str {
        &self.port
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn is_proxy_enabled(&self) -> bool {
        !is_blank(&self.host) && !is_blank(&self.port)
    }

    pub fn has_credentials(&self) -> bool {
        !is_blank(&self.username) && !is_blank(&self.password)
    }

    /// Numeric port, falling back to [`DEFAULT_PROXY_PORT`] for anything that
    /// is not a valid port number.
    pub fn port_as_int(&self) -> u16 {
        self.port.trim().parse().unwrap_or(DEFAULT_PROXY_PORT)
    }

    /// Authentication domain.
    ///
    /// An explicitly configured domain wins over one embedded in a
    /// `DOMAIN\user` username.
    pub fn effective_domain(&self) -> Option<&str> {
        if !is_blank(&self.domain) {
            return Some(self.domain.trim());
        }
        self.username
            .split_once('\\')
            .map(|(domain, _)| domain.trim())
            .filter(|domain| !domain.is_empty())
    }

    /// Username sent to the proxy.
    ///
    /// A `DOMAIN\` prefix is removed only when it supplies the domain; with
    /// an explicit domain the username is used as written.
    pub fn bare_username(&self) -> &str {
        if !is_blank(&self.domain) {
            return &self.username;
        }
        match self.username.split_once('\\') {
            Some((_, user)) => user,
            None => &self.username,
        }
    }

    pub fn is_host_empty(&self) -> bool {
        is_blank(&self.host)
    }

    pub fn is_port_empty(&self) -> bool {
        is_blank(&self.port)
    }

    pub fn is_username_empty(&self) -> bool {
        is_blank(&self.username)
    }

    pub fn is_password_empty(&self) -> bool {
        is_blank(&self.password)
    }

    pub fn is_domain_empty(&self) -> bool {
        is_blank(&self.domain)
    }
}

impl std::fmt::Debug for ProxyConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxyConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &redact(&self.password))
            .field("domain", &self.domain)
            .finish()
    }
}

/// Marker used wherever a password would otherwise be printed.
pub fn redact(secret: &str) -> &'static str {
    if is_blank(secret) {
        "<empty>"
    } else {
        "<configured>"
    }
}

fn strip_scheme(host: &str) -> &str {
    for prefix in SCHEME_PREFIXES {
        if let Some(head) = host.get(..prefix.len())
            && head.eq_ignore_ascii_case(prefix)
        {
            return &host[prefix.len()..];
        }
    }
    host
}

fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}
