//! Merges file-provided proxy settings with CLI overrides.
//!
//! The merge is "first writer wins": values loaded from the configuration file
//! are kept, and a CLI flag only fills a field that is still empty.

use super::properties::PropertiesFile;
use super::proxy::{ProxyConfig, redact};

/// Proxy fields that can be supplied from the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyField {
    Host,
    Port,
    Username,
    Password,
    Domain,
}

impl ProxyField {
    pub const ALL: [ProxyField; 5] = [
        ProxyField::Host,
        ProxyField::Port,
        ProxyField::Username,
        ProxyField::Password,
        ProxyField::Domain,
    ];

    pub fn from_flag(flag: &str) -> Option<Self> {
        match flag {
            "-proxyHost" => Some(ProxyField::Host),
            "-proxyPort" => Some(ProxyField::Port),
            "-proxyUser" => Some(ProxyField::Username),
            "-proxyPassword" => Some(ProxyField::Password),
            "-proxyDomain" => Some(ProxyField::Domain),
            _ => None,
        }
    }

    /// Properties keys for this field, preferred key first.
    pub fn property_keys(self) -> [&'static str; 2] {
        match self {
            ProxyField::Host => ["proxy.host", "app.proxy.host"],
            ProxyField::Port => ["proxy.port", "app.proxy.port"],
            ProxyField::Username => ["proxy.username", "app.proxy.username"],
            ProxyField::Password => ["proxy.password", "app.proxy.password"],
            ProxyField::Domain => ["proxy.domain", "app.proxy.domain"],
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ProxyField::Host => "host",
            ProxyField::Port => "port",
            ProxyField::Username => "username",
            ProxyField::Password => "password",
            ProxyField::Domain => "domain",
        }
    }

    fn is_empty(self, config: &ProxyConfig) -> bool {
        match self {
            ProxyField::Host => config.is_host_empty(),
            ProxyField::Port => config.is_port_empty(),
            ProxyField::Username => config.is_username_empty(),
            ProxyField::Password => config.is_password_empty(),
            ProxyField::Domain => config.is_domain_empty(),
        }
    }

    fn apply(self, config: &mut ProxyConfig, value: &str) {
        match self {
            ProxyField::Host => config.set_host(value),
            ProxyField::Port => config.set_port(value),
            ProxyField::Username => config.set_username(value),
            ProxyField::Password => config.set_password(value),
            ProxyField::Domain => config.set_domain(value),
        }
    }

    fn display(self, config: &ProxyConfig) -> String {
        let value = match self {
            ProxyField::Host => config.host(),
            ProxyField::Port => config.port(),
            ProxyField::Username => config.username(),
            ProxyField::Password => return redact(config.password()).to_string(),
            ProxyField::Domain => config.domain(),
        };
        if value.trim().is_empty() {
            "<empty>".to_string()
        } else {
            value.to_string()
        }
    }
}

/// Resolves the effective [`ProxyConfig`] from file values and CLI pairs.
#[derive(Debug, Clone, Copy, Default)]
pub struct CredentialResolver;

impl CredentialResolver {
    pub fn new() -> Self {
        Self
    }

    /// Builds the base configuration from the `proxy.*` (or `app.proxy.*`)
    /// keys of a properties file.
    pub fn base_from_properties(&self, properties: &PropertiesFile) -> ProxyConfig {
        let mut config = ProxyConfig::new();
        for field in ProxyField::ALL {
            if let Some(value) = properties.first_of(&field.property_keys()) {
                field.apply(&mut config, value);
            }
        }
        config
    }

    /// Applies CLI `-flag value` pairs on top of `base`.
    ///
    /// Pure with respect to its inputs: `base` is cloned, never mutated.
    pub fn resolve<S: AsRef<str>>(&self, base: &ProxyConfig, args: &[S]) -> ProxyConfig {
        let mut config = base.clone();
        let mut index = 0;
        while index < args.len() {
            let Some(field) = ProxyField::from_flag(args[index].as_ref()) else {
                index += 1;
                continue;
            };
            let Some(value) = args.get(index + 1).map(AsRef::as_ref) else {
                log::debug!("flag {} has no value, ignoring", args[index].as_ref());
                break;
            };

            if field.is_empty(&config) {
                field.apply(&mut config, value);
                log::info!("proxy {} taken from command line", field.label());
            } else {
                log::info!(
                    "proxy {} already configured, command line value not applied",
                    field.label()
                );
            }
            index += 2;
        }

        for line in summary_lines(&config) {
            log::info!("{line}");
        }
        config
    }
}

/// One redacted line per proxy field, describing the effective configuration.
pub fn summary_lines(config: &ProxyConfig) -> Vec<String> {
    ProxyField::ALL
        .iter()
        .map(|field| format!("effective proxy {}: {}", field.label(), field.display(config)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn file_value_wins_over_cli() {
        let mut base = ProxyConfig::new();
        base.set_host("a");
        let resolved = CredentialResolver::new().resolve(&base, &args(&["-proxyHost", "b"]));
        assert_eq!(resolved.host(), "a");
    }

    #[test]
    fn cli_fills_empty_fields() {
        let base = ProxyConfig::new();
        let resolved = CredentialResolver::new().resolve(
            &base,
            &args(&[
                "-proxyHost",
                "https://b",
                "-proxyPort",
                "3128",
                "-proxyUser",
                "CORP\\alice",
                "-proxyPassword",
                "secret",
                "-proxyDomain",
                "EMEA",
            ]),
        );
        assert_eq!(resolved.host(), "b");
        assert_eq!(resolved.port_as_int(), 3128);
        assert_eq!(resolved.username(), "CORP\\alice");
        assert_eq!(resolved.password(), "secret");
        assert_eq!(resolved.domain(), "EMEA");
    }

    #[test]
    fn first_cli_occurrence_wins() {
        let resolved = CredentialResolver::new().resolve(
            &ProxyConfig::new(),
            &args(&["-proxyPort", "3128", "-proxyPort", "8888"]),
        );
        assert_eq!(resolved.port(), "3128");
    }

    #[test]
    fn unknown_flags_and_dangling_values_are_ignored() {
        let resolved = CredentialResolver::new().resolve(
            &ProxyConfig::new(),
            &args(&["--verbose", "-foo", "bar", "-proxyHost", "proxy.local", "-proxyPort"]),
        );
        assert_eq!(resolved.host(), "proxy.local");
        assert!(resolved.is_port_empty());
    }

    #[test]
    fn resolution_is_idempotent() {
        let mut base = ProxyConfig::new();
        base.set_port("8080");
        let cli = args(&["-proxyHost", "proxy.local", "-proxyPort", "9999"]);
        let resolver = CredentialResolver::new();
        let first = resolver.resolve(&base, &cli);
        let second = resolver.resolve(&base, &cli);
        assert_eq!(first, second);
        assert!(base.is_host_empty());
    }

    #[test]
    fn base_reads_aliases() {
        let props = PropertiesFile::parse(
            "proxy.host=http://proxy.local\napp.proxy.port=3128\nproxy.username=alice\n",
        );
        let base = CredentialResolver::new().base_from_properties(&props);
        assert_eq!(base.host(), "proxy.local");
        assert_eq!(base.port(), "3128");
        assert_eq!(base.username(), "alice");
    }

    #[test]
    fn escaped_domain_username_from_file() {
        let props = PropertiesFile::parse("proxy.username=CORP\\\\alice\nproxy.password=secret\n");
        let base = CredentialResolver::new().base_from_properties(&props);
        assert_eq!(base.username(), "CORP\\alice");
        assert_eq!(base.effective_domain(), Some("CORP"));
        assert_eq!(base.bare_username(), "alice");
    }

    #[test]
    fn summary_never_contains_password() {
        let mut config = ProxyConfig::new();
        config.set_username("alice");
        config.set_password("s3cr3t-value");
        let lines = summary_lines(&config);
        assert_eq!(lines.len(), 5);
        assert!(lines.iter().all(|line| !line.contains("s3cr3t-value")));
        assert!(lines.iter().all(|line| !line.contains("12")));
        assert!(lines.contains(&"effective proxy password: <configured>".to_string()));

        let empty = summary_lines(&ProxyConfig::new());
        assert!(empty.contains(&"effective proxy password: <empty>".to_string()));
    }
}
