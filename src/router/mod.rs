//! Transport selection.
//!
//! Each exchange is routed on its own, so the legs of a redirect chain may
//! go through different transports. The order is:
//!
//! 1. The mounted transport with the highest scoring [`MountPattern`]. Ties
//!    go to the first registered.
//! 2. With a trusted environment, a proxy transport from `HTTPS_PROXY`,
//!    `HTTP_PROXY` or `ALL_PROXY`, unless `NO_PROXY` excludes the host.
//! 3. The default transport.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use url::Url;

use crate::Error;

mod env;
mod pattern;

pub use env::{Environment, Proxy, SystemEnv};
pub use pattern::MountPattern;

/// Builds a transport talking through a proxy.
pub type ProxyConnector<T> = Arc<dyn Fn(&Proxy) -> Result<Arc<T>, Error> + Send + Sync>;

/// Picks the transport for each exchange.
///
/// `T` is `dyn Transport` for the blocking client and `dyn AsyncTransport` for
/// the async one.
pub struct Router<T: ?Sized> {
    default: Arc<T>,
    mounts: Vec<(MountPattern, Arc<T>)>,
    trust_env: bool,
    env: Arc<dyn Environment>,
    connector: Option<ProxyConnector<T>>,
    proxies: Mutex<HashMap<String, Arc<T>>>,
}

impl<T: ?Sized> Router<T> {
    /// Route everything to `default`.
    pub fn new(default: Arc<T>) -> Self {
        Router {
            default,
            mounts: Vec::new(),
            trust_env: true,
            env: Arc::new(SystemEnv),
            connector: None,
            proxies: Mutex::new(HashMap::new()),
        }
    }

    /// Register a transport for `pattern`.
    pub fn mount(&mut self, pattern: &str, transport: Arc<T>) -> Result<(), Error> {
        let pattern = MountPattern::parse(pattern)?;
        debug!("Mount {:?}", pattern);
        self.mounts.push((pattern, transport));
        Ok(())
    }

    /// Whether proxy variables are read from the environment.
    pub fn set_trust_env(&mut self, trust_env: bool) {
        self.trust_env = trust_env;
    }

    /// Replace the environment the proxy variables are read from.
    pub fn set_environment(&mut self, env: Arc<dyn Environment>) {
        self.env = env;
    }

    /// Set how proxy transports are built.
    pub fn set_proxy_connector(&mut self, connector: ProxyConnector<T>) {
        self.connector = Some(connector);
    }

    /// Select the transport for `url`.
    pub fn route(&self, url: &Url) -> Result<Arc<T>, Error> {
        let mut best: Option<(u32, &Arc<T>)> = None;

        for (pattern, transport) in &self.mounts {
            let Some(score) = pattern.score(url) else {
                continue;
            };
            // strictly greater keeps the first registered on ties
            if best.map(|(s, _)| score > s).unwrap_or(true) {
                best = Some((score, transport));
            }
        }

        if let Some((score, transport)) = best {
            trace!("Route {} to mount, score {}", url, score);
            return Ok(transport.clone());
        }

        if self.trust_env {
            if let Some(proxy) = env::env_proxy(&*self.env, url)? {
                return self.proxy_transport(&proxy);
            }
        }

        Ok(self.default.clone())
    }

    fn proxy_transport(&self, proxy: &Proxy) -> Result<Arc<T>, Error> {
        let Some(connector) = &self.connector else {
            warn!("{:?} from environment, but no proxy connector configured", proxy);
            return Ok(self.default.clone());
        };

        let key = proxy.key();

        if let Some(t) = self.proxies.lock().get(&key) {
            return Ok(t.clone());
        }

        // Build outside the lock, the connector may be slow.
        debug!("Connect {:?}", proxy);
        let transport = connector(proxy)?;

        let mut proxies = self.proxies.lock();
        let t = proxies.entry(key).or_insert(transport);
        Ok(t.clone())
    }
}

impl<T: ?Sized> fmt::Debug for Router<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mounts: Vec<&str> = self.mounts.iter().map(|(p, _)| p.as_str()).collect();
        f.debug_struct("Router")
            .field("mounts", &mounts)
            .field("trust_env", &self.trust_env)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    // Transports stand-in, routes are identified by name.
    type Named = str;

    fn named(s: &'static str) -> Arc<Named> {
        Arc::from(s)
    }

    fn env(vars: &[(&str, &str)]) -> Arc<dyn Environment> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Arc::new(map)
    }

    fn route(router: &Router<Named>, url: &str) -> String {
        router.route(&Url::parse(url).unwrap()).unwrap().to_string()
    }

    #[test]
    fn test_highest_score_wins() {
        let mut r: Router<Named> = Router::new(named("default"));
        r.set_trust_env(false);
        r.mount("all://*", named("catch-all")).unwrap();
        r.mount("https://*.example.com", named("sub")).unwrap();
        r.mount("all://api.example.com:8443", named("port")).unwrap();

        assert_eq!(route(&r, "https://api.example.com/"), "sub");
        assert_eq!(route(&r, "https://example.com/"), "catch-all");
        assert_eq!(route(&r, "https://api.example.com:8443/"), "port");
    }

    #[test]
    fn test_tie_keeps_first_registered() {
        let mut r: Router<Named> = Router::new(named("default"));
        r.set_trust_env(false);
        r.mount("all://example.com", named("first")).unwrap();
        r.mount("all://*example.com", named("second")).unwrap();
        assert_eq!(route(&r, "http://example.com/"), "first");
    }

    #[test]
    fn test_no_match_falls_back() {
        let mut r: Router<Named> = Router::new(named("default"));
        r.set_environment(env(&[]));
        r.mount("http://only.test", named("only")).unwrap();
        assert_eq!(route(&r, "https://only.test/"), "default");
    }

    #[test]
    fn test_invalid_mount() {
        let mut r: Router<Named> = Router::new(named("default"));
        assert!(matches!(
            r.mount("example.com", named("x")),
            Err(Error::InvalidMountPattern(_))
        ));
    }

    #[test]
    fn test_env_proxy_with_connector_is_cached() {
        let built = Arc::new(AtomicUsize::new(0));
        let counter = built.clone();

        let mut r: Router<Named> = Router::new(named("default"));
        r.set_environment(env(&[("HTTPS_PROXY", "http://proxy.test:3128")]));
        r.set_proxy_connector(Arc::new(move |p: &Proxy| -> Result<Arc<Named>, Error> {
            counter.fetch_add(1, Ordering::SeqCst);
            assert_eq!(p.url().host_str(), Some("proxy.test"));
            Ok(named("proxied"))
        }));

        assert_eq!(route(&r, "https://a.test/"), "proxied");
        assert_eq!(route(&r, "https://b.test/"), "proxied");
        assert_eq!(route(&r, "http://a.test/"), "default");
        assert_eq!(built.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_env_proxy_without_connector_uses_default() {
        let mut r: Router<Named> = Router::new(named("default"));
        r.set_environment(env(&[("ALL_PROXY", "proxy.test:3128")]));
        assert_eq!(route(&r, "http://a.test/"), "default");
    }

    #[test]
    fn test_untrusted_env_ignored() {
        let mut r: Router<Named> = Router::new(named("default"));
        r.set_environment(env(&[("ALL_PROXY", "proxy.test:3128")]));
        r.set_proxy_connector(Arc::new(|_: &Proxy| -> Result<Arc<Named>, Error> {
            Ok(named("proxied"))
        }));
        r.set_trust_env(false);
        assert_eq!(route(&r, "http://a.test/"), "default");
    }

    #[test]
    fn test_mount_beats_env_proxy() {
        let mut r: Router<Named> = Router::new(named("default"));
        r.set_environment(env(&[("ALL_PROXY", "proxy.test:3128")]));
        r.set_proxy_connector(Arc::new(|_: &Proxy| -> Result<Arc<Named>, Error> {
            Ok(named("proxied"))
        }));
        r.mount("all://a.test", named("mounted")).unwrap();
        assert_eq!(route(&r, "http://a.test/"), "mounted");
        assert_eq!(route(&r, "http://b.test/"), "proxied");
    }
}
