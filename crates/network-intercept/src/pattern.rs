//! URL match patterns for interception rules.

use std::fmt;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::InterceptError;

/// A request URL pattern such as `https://wallpaperaccess.com/full/*.jpg`.
///
/// Scheme, host and port must match exactly (host case-insensitively). The
/// path is a glob where `*` matches any run of characters, `/` included.
/// Query strings and fragments of the request are ignored. A pattern that
/// starts with `/` has no origin and matches the path on any host.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UrlPattern {
    raw: String,
    origin: Option<Origin>,
    path: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct Origin {
    scheme: String,
    host: String,
    port: Option<u16>,
}

impl UrlPattern {
    pub fn parse(raw: &str) -> Result<Self, InterceptError> {
        let invalid = |reason: &str| InterceptError::InvalidPattern {
            pattern: raw.to_string(),
            reason: reason.to_string(),
        };

        if raw.starts_with('/') {
            return Ok(Self {
                raw: raw.to_string(),
                origin: None,
                path: raw.to_string(),
            });
        }

        let (scheme, rest) = raw
            .split_once("://")
            .ok_or_else(|| invalid("expected `scheme://host/path` or `/path`"))?;
        if scheme.is_empty() {
            return Err(invalid("empty scheme"));
        }
        let (authority, path) = match rest.find('/') {
            Some(idx) => (&rest[..idx], &rest[idx..]),
            None => (rest, "/"),
        };
        if authority.is_empty() {
            return Err(invalid("empty host"));
        }
        if authority.contains('*') {
            return Err(invalid("wildcards are only supported in the path"));
        }
        let (host, port) = match authority.rsplit_once(':') {
            Some((host, port)) => {
                let port = port.parse::<u16>().map_err(|_| invalid("invalid port"))?;
                (host, Some(port))
            }
            None => (authority, None),
        };

        Ok(Self {
            raw: raw.to_string(),
            origin: Some(Origin {
                scheme: scheme.to_ascii_lowercase(),
                host: host.to_ascii_lowercase(),
                port,
            }),
            path: path.to_string(),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Whether `url` is covered by this pattern. Unparseable URLs never match.
    pub fn matches(&self, url: &str) -> bool {
        let Ok(parsed) = Url::parse(url) else {
            return false;
        };
        if let Some(origin) = &self.origin {
            if parsed.scheme() != origin.scheme {
                return false;
            }
            match parsed.host_str() {
                Some(host) if host.eq_ignore_ascii_case(&origin.host) => {}
                _ => return false,
            }
            // an omitted port means the scheme default
            if parsed.port_or_known_default() != origin.port.or(default_port(&origin.scheme)) {
                return false;
            }
        }
        glob_match(&self.path, parsed.path())
    }
}

impl fmt::Display for UrlPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl TryFrom<String> for UrlPattern {
    type Error = InterceptError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<UrlPattern> for String {
    fn from(value: UrlPattern) -> Self {
        value.raw
    }
}

fn default_port(scheme: &str) -> Option<u16> {
    match scheme {
        "http" | "ws" => Some(80),
        "https" | "wss" => Some(443),
        _ => None,
    }
}

fn glob_match(pattern: &str, text: &str) -> bool {
    let parts: Vec<&str> = pattern.split('*').collect();
    if parts.len() == 1 {
        return pattern == text;
    }

    let first = parts[0];
    let last = parts[parts.len() - 1];
    if !text.starts_with(first) {
        return false;
    }
    let mut cursor = first.len();
    let tail_start = match text.len().checked_sub(last.len()) {
        Some(start) if start >= cursor && text.ends_with(last) => start,
        _ => return false,
    };

    for middle in &parts[1..parts.len() - 1] {
        if middle.is_empty() {
            continue;
        }
        match text[cursor..tail_start].find(middle) {
            Some(offset) => cursor += offset + middle.len(),
            None => return false,
        }
    }
    true
}
