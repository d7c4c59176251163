//! Properties file support.
//!
//! Follows the `java.util.Properties` text format: `#`/`!` comment lines,
//! keys ending at the first unescaped `=`, `:` or whitespace, lines
//! continued by an odd number of trailing backslashes, and the escapes
//! `\t`, `\n`, `\r`, `\f`, `\uXXXX` and `\<char>`. So `CORP\\alice` in the
//! file reads as `CORP\alice`. A missing file is not an error; it simply
//! yields no entries.

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use super::ConfigError;

/// Parsed key/value pairs from a properties file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropertiesFile {
    entries: HashMap<String, String>,
}

impl PropertiesFile {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads `path`, returning an empty set when the file does not exist.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(contents) => {
                log::debug!("loaded configuration file {}", path.display());
                Ok(Self::parse(&contents))
            }
            Err(err) if err.kind() == ErrorKind::NotFound => {
                log::info!(
                    "configuration file {} not found, continuing with CLI values only",
                    path.display()
                );
                Ok(Self::new())
            }
            Err(source) => Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    pub fn parse(contents: &str) -> Self {
        let mut entries = HashMap::new();
        for line in logical_lines(contents) {
            let (raw_key, raw_value) = split_entry(&line);
            let key = unescape(raw_key);
            if !key.is_empty() {
                entries.insert(key, unescape(raw_value));
            }
        }
        Self { entries }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// First non-empty value among `keys`.
    pub fn first_of(&self, keys: &[&str]) -> Option<&str> {
        keys.iter()
            .filter_map(|key| self.get(key))
            .find(|value| !value.is_empty())
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), value.into());
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn is_blank(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\x0c')
}

/// Joins continued physical lines and drops blanks and comments.
fn logical_lines(contents: &str) -> Vec<String> {
    let mut lines = Vec::new();
    let mut pending: Option<String> = None;

    for physical in contents.lines() {
        let trimmed = physical.trim_start_matches(is_blank);
        let mut current = match pending.take() {
            Some(joined) => joined,
            None if trimmed.is_empty() || trimmed.starts_with(['#', '!']) => continue,
            None => String::new(),
        };

        let trailing = trimmed.chars().rev().take_while(|c| *c == '\\').count();
        if trailing % 2 == 1 {
            current.push_str(&trimmed[..trimmed.len() - 1]);
            pending = Some(current);
        } else {
            current.push_str(trimmed);
            lines.push(current);
        }
    }
    if let Some(last) = pending {
        lines.push(last);
    }
    lines
}

/// Splits a logical line into its raw (still escaped) key and value.
fn split_entry(line: &str) -> (&str, &str) {
    let mut key_end = line.len();
    let mut value_start = line.len();
    let mut explicit_separator = false;
    let mut escaped = false;

    for (index, c) in line.char_indices() {
        if escaped {
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == '=' || c == ':' {
            key_end = index;
            value_start = index + 1;
            explicit_separator = true;
            break;
        } else if is_blank(c) {
            key_end = index;
            value_start = index;
            break;
        }
    }

    let mut value = line[value_start..].trim_start_matches(is_blank);
    if !explicit_separator {
        if let Some(rest) = value.strip_prefix(['=', ':']) {
            value = rest.trim_start_matches(is_blank);
        }
    }
    (&line[..key_end], value)
}

fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('t') => out.push('\t'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('f') => out.push('\x0c'),
            Some('u') => {
                let digits: String = chars.by_ref().take(4).collect();
                let decoded = (digits.len() == 4 && digits.chars().all(|c| c.is_ascii_hexdigit()))
                    .then(|| u32::from_str_radix(&digits, 16).ok())
                    .flatten()
                    .and_then(char::from_u32);
                match decoded {
                    Some(decoded) => out.push(decoded),
                    _ => {
                        log::warn!("malformed \\u escape '\\u{digits}' kept as written");
                        out.push_str("\\u");
                        out.push_str(&digits);
                    }
                }
            }
            Some(other) => out.push(other),
            None => {}
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn parses_both_separators_and_skips_comments() {
        let props = PropertiesFile::parse(
            "# proxy settings\n\
             ! legacy comment\n\
             \n\
             proxy.host = proxy.corp.local\n\
             proxy.port: 3128\n\
             app.get.url=https://example.test/get?a=b\n",
        );
        assert_eq!(props.len(), 3);
        assert_eq!(props.get("proxy.host"), Some("proxy.corp.local"));
        assert_eq!(props.get("proxy.port"), Some("3128"));
        assert_eq!(props.get("app.get.url"), Some("https://example.test/get?a=b"));
    }

    #[test]
    fn first_of_skips_empty_values() {
        let props = PropertiesFile::parse("proxy.host=\napp.proxy.host=fallback\n");
        assert_eq!(
            props.first_of(&["proxy.host", "app.proxy.host"]),
            Some("fallback")
        );
        assert_eq!(props.first_of(&["missing"]), None);
    }

    #[test]
    fn missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let props = PropertiesFile::load(dir.path().join("absent.properties")).unwrap();
        assert!(props.is_empty());
    }

    #[test]
    fn loads_existing_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "proxy.username=CORP\\\\alice").unwrap();
        let props = PropertiesFile::load(file.path()).unwrap();
        assert_eq!(props.get("proxy.username"), Some("CORP\\alice"));
    }

    #[test]
    fn backslash_escapes_are_decoded() {
        let props = PropertiesFile::parse(
            "proxy.username=CORP\\\\alice\n\
             proxy.password=p\\u00e9ss\\tword\n\
             proxy.domain=\\ CORP\n",
        );
        assert_eq!(props.get("proxy.username"), Some("CORP\\alice"));
        assert_eq!(props.get("proxy.password"), Some("p\u{e9}ss\tword"));
        assert_eq!(props.get("proxy.domain"), Some(" CORP"));
    }

    #[test]
    fn single_backslash_is_dropped() {
        let props = PropertiesFile::parse("proxy.username=CORP\\alice\n");
        assert_eq!(props.get("proxy.username"), Some("CORPalice"));
    }

    #[test]
    fn escaped_separators_stay_in_the_key() {
        let props = PropertiesFile::parse("url\\:get\\=x = value\nproxy.host proxy.local\n");
        assert_eq!(props.get("url:get=x"), Some("value"));
        assert_eq!(props.get("proxy.host"), Some("proxy.local"));
    }

    #[test]
    fn trailing_backslash_continues_the_line() {
        let props = PropertiesFile::parse(
            "app.get.url=https://example.test/\\\n    todos/1\n\
             proxy.port=3128\n",
        );
        assert_eq!(props.get("app.get.url"), Some("https://example.test/todos/1"));
        assert_eq!(props.get("proxy.port"), Some("3128"));
    }

    #[test]
    fn even_trailing_backslashes_end_the_line() {
        let props = PropertiesFile::parse("share=\\\\\\\\\nproxy.port=3128\n");
        assert_eq!(props.get("share"), Some("\\\\"));
        assert_eq!(props.get("proxy.port"), Some("3128"));
    }

    #[test]
    fn malformed_unicode_escape_is_kept() {
        let props = PropertiesFile::parse("name=\\u12zz\n");
        assert_eq!(props.get("name"), Some("\\u12zz"));
    }
}
