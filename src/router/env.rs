use std::collections::HashMap;
use std::fmt;

use url::Url;

use super::MountPattern;
use crate::Error;

/// Source of environment variables.
pub trait Environment: Send + Sync {
    /// Value of the variable `name`, if set.
    fn var(&self, name: &str) -> Option<String>;
}

/// The process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEnv;

impl Environment for SystemEnv {
    fn var(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}

impl Environment for HashMap<String, String> {
    fn var(&self, name: &str) -> Option<String> {
        self.get(name).cloned()
    }
}

/// Look up `NAME`, then `name`. Empty values count as unset.
fn lookup(env: &dyn Environment, name: &str) -> Option<String> {
    env.var(&name.to_ascii_uppercase())
        .or_else(|| env.var(&name.to_ascii_lowercase()))
        .filter(|v| !v.trim().is_empty())
}

/// A proxy server taken from the environment.
#[derive(Clone, PartialEq, Eq)]
pub struct Proxy {
    url: Url,
}

impl Proxy {
    /// Parse a proxy url. A bare `host:port` means `http://host:port`.
    pub fn parse(s: &str) -> Result<Proxy, Error> {
        let s = s.trim();
        let url = if s.contains("://") {
            Url::parse(s)
        } else {
            Url::parse(&format!("http://{}", s))
        }
        .map_err(|e| Error::Proxy(format!("invalid proxy url: {}", e)))?;

        if url.host_str().is_none() {
            return Err(Error::Proxy("proxy url without host".into()));
        }

        Ok(Proxy { url })
    }

    /// The proxy url, credentials included.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Cache key: scheme, host and port only.
    pub(crate) fn key(&self) -> String {
        format!(
            "{}://{}:{}",
            self.url.scheme(),
            self.url.host_str().unwrap_or_default(),
            self.url.port_or_known_default().unwrap_or_default()
        )
    }
}

impl fmt::Debug for Proxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // never print proxy credentials
        write!(
            f,
            "Proxy({}://{})",
            self.url.scheme(),
            self.url.host_str().unwrap_or_default()
        )
    }
}

/// Hosts excluded from proxying, from `NO_PROXY`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct NoProxy {
    inner: String,
}

impl NoProxy {
    pub(crate) fn from_env(env: &dyn Environment) -> Option<NoProxy> {
        lookup(env, "no_proxy").map(|inner| NoProxy { inner })
    }

    /// Tell if `url` should bypass the proxy.
    ///
    /// `*` matches everything. An entry matches the equal host and its
    /// subdomains, `.entry` and `*.entry` only subdomains. Entries
    /// containing `://` are mount patterns.
    pub(crate) fn matches(&self, url: &Url) -> bool {
        let host = url.host_str().unwrap_or_default().to_ascii_lowercase();

        for entry in self.inner.split(',') {
            let entry = entry.trim().to_ascii_lowercase();
            if entry.is_empty() {
                continue;
            }

            if entry == "*" {
                return true;
            }

            if entry.contains("://") {
                match MountPattern::parse(&entry) {
                    Ok(p) if p.score(url).is_some() => return true,
                    Ok(_) => {}
                    Err(_) => debug!("Ignore malformed no_proxy entry: {}", entry),
                }
                continue;
            }

            if let Some(suffix) = entry.strip_prefix("*.") {
                if host.ends_with(&format!(".{}", suffix)) {
                    return true;
                }
                continue;
            }

            if entry.starts_with('.') {
                if host.ends_with(entry.as_str()) {
                    return true;
                }
                continue;
            }

            if host == entry || host.ends_with(&format!(".{}", entry)) {
                return true;
            }
        }

        false
    }
}

/// The proxy for `url` according to `env`, if any.
///
/// `HTTPS_PROXY` applies to https targets, `HTTP_PROXY` to http targets,
/// `ALL_PROXY` to both. `NO_PROXY` excludes hosts.
pub(crate) fn env_proxy(env: &dyn Environment, url: &Url) -> Result<Option<Proxy>, Error> {
    if let Some(no_proxy) = NoProxy::from_env(env) {
        if no_proxy.matches(url) {
            trace!("no_proxy excludes {}", url.host_str().unwrap_or_default());
            return Ok(None);
        }
    }

    let specific = match url.scheme() {
        "https" => lookup(env, "https_proxy"),
        "http" => lookup(env, "http_proxy"),
        _ => None,
    };

    match specific.or_else(|| lookup(env, "all_proxy")) {
        Some(v) => Ok(Some(Proxy::parse(&v)?)),
        None => Ok(None),
    }
}
