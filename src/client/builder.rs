use std::sync::Arc;
use std::time::Duration;

use http::{HeaderMap, HeaderName, HeaderValue};
use parking_lot::Mutex;
use url::Url;

use crate::auth::Auth;
use crate::cookies::CookieJar;
use crate::redirect::DEFAULT_MAX_REDIRECTS;
use crate::request::Request;
use crate::response::Response;
use crate::router::{Environment, ProxyConnector, Router};
use crate::transport::Transport;
use crate::Error;

use super::{Client, Shared};

/// Called with each request just before it goes to the transport.
pub type RequestHook = Arc<dyn Fn(&mut Request) -> Result<(), Error> + Send + Sync>;

/// Called with each response as soon as the transport returns it.
pub type ResponseHook = Arc<dyn Fn(&mut Response) -> Result<(), Error> + Send + Sync>;

/// Default number of concurrent calls on an async client.
pub const DEFAULT_MAX_IN_FLIGHT: usize = 100;

/// Default wait for an admission permit on an async client.
pub const DEFAULT_POOL_TIMEOUT: Duration = Duration::from_secs(5);

/// Configuration of a [`Client`] (or `AsyncClient`).
///
/// `T` is the transport trait object, `dyn Transport` for the blocking client.
///
/// ```
/// use std::sync::Arc;
/// use ureq_relay::{Auth, Client};
/// use ureq_relay::transport::mock::MockTransport;
///
/// let mock = Arc::new(MockTransport::sequence([]));
///
/// let client = Client::builder(mock)
///     .auth(Auth::basic("martin", "secret"))
///     .max_redirects(5)
///     .default_header("user-agent", "relay/1")
///     .build()
///     .unwrap();
/// ```
pub struct ClientBuilder<T: ?Sized = dyn Transport> {
    transport: Arc<T>,
    mounts: Vec<(String, Arc<T>)>,
    auth: Option<Auth>,
    follow_redirects: bool,
    max_redirects: usize,
    trust_env: bool,
    environment: Option<Arc<dyn Environment>>,
    proxy_connector: Option<ProxyConnector<T>>,
    default_headers: HeaderMap,
    base_url: Option<String>,
    cookies: Option<CookieJar>,
    on_request: Vec<RequestHook>,
    on_response: Vec<ResponseHook>,
    pub(crate) max_in_flight: usize,
    pub(crate) pool_timeout: Duration,
    // First configuration error, reported by build().
    error: Option<Error>,
}

impl<T: ?Sized> ClientBuilder<T> {
    /// Builder sending everything through `transport`.
    pub fn new(transport: Arc<T>) -> Self {
        ClientBuilder {
            transport,
            mounts: Vec::new(),
            auth: None,
            follow_redirects: true,
            max_redirects: DEFAULT_MAX_REDIRECTS,
            trust_env: true,
            environment: None,
            proxy_connector: None,
            default_headers: HeaderMap::new(),
            base_url: None,
            cookies: None,
            on_request: Vec::new(),
            on_response: Vec::new(),
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
            pool_timeout: DEFAULT_POOL_TIMEOUT,
            error: None,
        }
    }

    /// Route urls matching `pattern` to `transport`.
    ///
    /// See [`MountPattern`](crate::router::MountPattern) for the syntax.
    pub fn mount(mut self, pattern: impl Into<String>, transport: Arc<T>) -> Self {
        self.mounts.push((pattern.into(), transport));
        self
    }

    /// Authentication for every call, unless overridden per call.
    pub fn auth(mut self, auth: Auth) -> Self {
        self.auth = Some(auth);
        self
    }

    /// Whether to follow redirects. Defaults to `true`.
    pub fn follow_redirects(mut self, follow: bool) -> Self {
        self.follow_redirects = follow;
        self
    }

    /// Cap on followed redirects per call. Defaults to 20.
    pub fn max_redirects(mut self, max: usize) -> Self {
        self.max_redirects = max;
        self
    }

    /// Whether to read proxy settings from the environment. Defaults to `true`.
    pub fn trust_env(mut self, trust: bool) -> Self {
        self.trust_env = trust;
        self
    }

    /// Where environment variables are read from. Defaults to the process
    /// environment.
    pub fn environment(mut self, env: Arc<dyn Environment>) -> Self {
        self.environment = Some(env);
        self
    }

    /// How transports for environment proxies are built.
    pub fn proxy_connector(mut self, connector: ProxyConnector<T>) -> Self {
        self.proxy_connector = Some(connector);
        self
    }

    /// Header sent with every request that does not set it itself.
    pub fn default_header<K, V>(mut self, key: K, value: V) -> Self
    where
        HeaderName: TryFrom<K>,
        <HeaderName as TryFrom<K>>::Error: Into<http::Error>,
        HeaderValue: TryFrom<V>,
        <HeaderValue as TryFrom<V>>::Error: Into<http::Error>,
    {
        let name: Result<HeaderName, http::Error> =
            <HeaderName as TryFrom<K>>::try_from(key).map_err(Into::into);
        let value: Result<HeaderValue, http::Error> =
            <HeaderValue as TryFrom<V>>::try_from(value).map_err(Into::into);

        match (name, value) {
            (Ok(n), Ok(v)) => {
                self.default_headers.append(n, v);
            }
            (Err(e), _) | (_, Err(e)) => self.set_error(e.into()),
        }

        self
    }

    /// Url that relative request urls are resolved against.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Start with a pre-filled cookie jar.
    pub fn cookies(mut self, jar: CookieJar) -> Self {
        self.cookies = Some(jar);
        self
    }

    /// Add a request hook. Hooks run in the order added.
    pub fn on_request<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut Request) -> Result<(), Error> + Send + Sync + 'static,
    {
        self.on_request.push(Arc::new(hook));
        self
    }

    /// Add a response hook. Hooks run in the order added.
    ///
    /// A failing hook closes the response body before the error is returned.
    pub fn on_response<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut Response) -> Result<(), Error> + Send + Sync + 'static,
    {
        self.on_response.push(Arc::new(hook));
        self
    }

    fn set_error(&mut self, e: Error) {
        if self.error.is_none() {
            self.error = Some(e);
        }
    }

    pub(crate) fn into_shared(self) -> Result<Shared<T>, Error> {
        if let Some(e) = self.error {
            return Err(e);
        }

        let base_url = match self.base_url {
            Some(v) => Some(Url::parse(&v)?),
            None => None,
        };

        let mut router = Router::new(self.transport);
        router.set_trust_env(self.trust_env);
        if let Some(env) = self.environment {
            router.set_environment(env);
        }
        if let Some(c) = self.proxy_connector {
            router.set_proxy_connector(c);
        }
        for (pattern, transport) in self.mounts {
            router.mount(&pattern, transport)?;
        }

        Ok(Shared {
            router,
            jar: Arc::new(Mutex::new(self.cookies.unwrap_or_default())),
            auth: self.auth,
            follow_redirects: self.follow_redirects,
            max_redirects: self.max_redirects,
            default_headers: self.default_headers,
            base_url,
            on_request: self.on_request,
            on_response: self.on_response,
        })
    }
}

impl ClientBuilder<dyn Transport> {
    /// Create the blocking client.
    pub fn build(self) -> Result<Client, Error> {
        Ok(Client {
            shared: Arc::new(self.into_shared()?),
        })
    }
}
