//! Configuration loading and merging.
//!
//! - properties file parsing
//! - proxy parameter normalization
//! - file/CLI merge with redacted logging
//! - run-level settings

use std::path::PathBuf;

use thiserror::Error;

pub mod properties;
pub mod proxy;
pub mod resolver;
pub mod settings;

pub use properties::PropertiesFile;
pub use proxy::{DEFAULT_PROXY_PORT, ProxyConfig};
pub use resolver::{CredentialResolver, ProxyField, summary_lines};
pub use settings::{AppSettings, config_path_from_args};

/// Configuration problems. None of these abort a run; callers log them and
/// fall back to defaults.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid proxy port '{0}'")]
    InvalidPort(String),
    #[error("no NTLM domain configured; set proxy.domain or use DOMAIN\\user")]
    MissingDomain,
    #[error("invalid value '{value}' for {key}")]
    InvalidValue { key: String, value: String },
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
