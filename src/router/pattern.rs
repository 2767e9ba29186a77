use std::fmt;

use url::Url;

use crate::Error;

/// A `scheme://host[:port]` pattern selecting a mounted transport.
///
/// * scheme is exact, or `all` for any scheme.
/// * host is `*` (or empty) for any host, `*.suffix` for strict subdomains,
///   `*suffix` for the suffix itself and anything ending in it, or an exact
///   case-insensitive name.
/// * port, when present, must match exactly. Default ports count.
#[derive(Clone, PartialEq, Eq)]
pub struct MountPattern {
    raw: String,
    scheme: Option<String>,
    host: HostMatch,
    port: Option<u16>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum HostMatch {
    Any,
    // "*.example.com" -> ".example.com"
    Subdomain(String),
    // "*example.com" -> "example.com"
    Suffix(String),
    Exact(String),
}

impl MountPattern {
    /// Parse a pattern.
    pub fn parse(pattern: &str) -> Result<MountPattern, Error> {
        let invalid = || Error::InvalidMountPattern(pattern.to_string());

        let (scheme, rest) = pattern.split_once("://").ok_or_else(invalid)?;

        let scheme = scheme.to_ascii_lowercase();
        let scheme = match scheme.as_str() {
            "all" => None,
            "" => return Err(invalid()),
            _ => Some(scheme),
        };

        let rest = rest.trim_end_matches('/');

        let (host, port) = match rest.rsplit_once(':') {
            // IPv6 literal without port
            Some((h, _)) if h.starts_with('[') && !h.ends_with(']') => (rest, None),
            Some((h, p)) => {
                let port = p.parse::<u16>().map_err(|_| invalid())?;
                (h, Some(port))
            }
            None => (rest, None),
        };

        let host = host.to_ascii_lowercase();

        let host = if host.is_empty() || host == "*" {
            HostMatch::Any
        } else if let Some(suffix) = host.strip_prefix("*.") {
            HostMatch::Subdomain(format!(".{}", suffix))
        } else if let Some(suffix) = host.strip_prefix('*') {
            HostMatch::Suffix(suffix.to_string())
        } else {
            HostMatch::Exact(host)
        };

        Ok(MountPattern {
            raw: pattern.to_string(),
            scheme,
            host,
            port,
        })
    }

    /// Score against `url`. `None` when the pattern does not match.
    ///
    /// Scheme adds 0 for `all`, 1 for an exact match. Any host match adds 2.
    /// A matching port adds 4.
    pub fn score(&self, url: &Url) -> Option<u32> {
        let mut score = 0;

        if let Some(scheme) = &self.scheme {
            if scheme != url.scheme() {
                return None;
            }
            score += 1;
        }

        let host = url.host_str().unwrap_or_default().to_ascii_lowercase();
        let host_match = match &self.host {
            HostMatch::Any => true,
            HostMatch::Subdomain(dot_suffix) => host.ends_with(dot_suffix.as_str()),
            HostMatch::Suffix(suffix) => {
                host == *suffix || host.ends_with(&format!(".{}", suffix))
            }
            HostMatch::Exact(exact) => host == *exact,
        };
        if !host_match {
            return None;
        }
        score += 2;

        if let Some(port) = self.port {
            if url.port_or_known_default() != Some(port) {
                return None;
            }
            score += 4;
        }

        Some(score)
    }

    /// The pattern as given.
    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl fmt::Debug for MountPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MountPattern({})", self.raw)
    }
}
