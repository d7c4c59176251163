//! Run-level settings: target endpoints, client profile, TLS options.

use std::path::PathBuf;

use super::ConfigError;
use super::properties::PropertiesFile;
use crate::client::profile::ClientProfile;
use crate::modules::tls::{TlsConfig, TlsPolicy, TlsProtocol};

pub const DEFAULT_CONFIG_PATH: &str = "application.properties";
pub const DEFAULT_GET_URL: &str = "https://jsonplaceholder.typicode.com/todos/1";
pub const DEFAULT_POST_URL: &str = "https://httpbin.org/post";

/// Settings for one probe run.
#[derive(Debug, Clone)]
pub struct AppSettings {
    pub get_url: String,
    pub post_url: String,
    pub profile: ClientProfile,
    pub tls: TlsConfig,
    /// Exit non-zero when a request fails.
    pub strict_exit: bool,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            get_url: DEFAULT_GET_URL.to_string(),
            post_url: DEFAULT_POST_URL.to_string(),
            profile: ClientProfile::default(),
            tls: TlsConfig::default(),
            strict_exit: false,
        }
    }
}

impl AppSettings {
    /// Reads `app.*` and `tls.*` keys, then applies CLI switches.
    ///
    /// Unlike the proxy fields, CLI switches here override the file: they are
    /// explicit per-run choices.
    pub fn resolve<S: AsRef<str>>(properties: &PropertiesFile, args: &[S]) -> Self {
        let mut settings = Self::default();

        if let Some(url) = properties.first_of(&["app.get.url"]) {
            settings.get_url = url.to_string();
        }
        if let Some(url) = properties.first_of(&["app.post.url"]) {
            settings.post_url = url.to_string();
        }
        if let Some(value) = properties.first_of(&["app.profile"]) {
            match value.parse::<ClientProfile>() {
                Ok(profile) => settings.profile = profile,
                Err(err) => log::warn!("{err}; keeping {} profile", settings.profile),
            }
        }
        if let Some(value) = properties.first_of(&["app.strict"]) {
            apply_bool("app.strict", value, &mut settings.strict_exit);
        }
        if let Some(value) = properties.first_of(&["tls.trust-all"]) {
            let mut trust_all = false;
            apply_bool("tls.trust-all", value, &mut trust_all);
            settings.tls.policy = TlsPolicy::from_trust_all(trust_all);
        }
        if let Some(value) = properties.first_of(&["tls.min-protocol"]) {
            match value.parse::<TlsProtocol>() {
                Ok(protocol) => settings.tls.min_protocol = Some(protocol),
                Err(err) => log::warn!("{err}; using the TLS backend default"),
            }
        }
        if let Some(path) = properties.first_of(&["tls.ca-file"]) {
            settings.tls.extra_root_pem = Some(PathBuf::from(path));
        }

        let mut index = 0;
        while index + 1 < args.len() {
            let flag = args[index].as_ref();
            let value = args[index + 1].as_ref();
            let consumed = match flag {
                "-useMinimal" => {
                    let mut minimal = settings.profile == ClientProfile::Minimal;
                    apply_bool(flag, value, &mut minimal);
                    if minimal {
                        settings.profile = ClientProfile::Minimal;
                    } else if settings.profile == ClientProfile::Minimal {
                        settings.profile = ClientProfile::default();
                    }
                    true
                }
                "-trustAll" => {
                    let mut trust_all = settings.tls.policy == TlsPolicy::TrustAll;
                    apply_bool(flag, value, &mut trust_all);
                    settings.tls.policy = TlsPolicy::from_trust_all(trust_all);
                    true
                }
                "-strict" => {
                    apply_bool(flag, value, &mut settings.strict_exit);
                    true
                }
                _ => false,
            };
            index += if consumed { 2 } else { 1 };
        }

        settings
    }
}

/// Value of `-config <path>`, or the default properties file.
pub fn config_path_from_args<S: AsRef<str>>(args: &[S]) -> PathBuf {
    args.windows(2)
        .find(|pair| pair[0].as_ref() == "-config")
        .map(|pair| PathBuf::from(pair[1].as_ref()))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "y" | "1" | "on" => Some(true),
        "false" | "no" | "n" | "0" | "off" => Some(false),
        _ => None,
    }
}

fn apply_bool(key: &str, value: &str, target: &mut bool) {
    match parse_bool(value) {
        Some(parsed) => *target = parsed,
        None => log::warn!(
            "{}",
            ConfigError::InvalidValue {
                key: key.to_string(),
                value: value.to_string(),
            }
        ),
    }
}
