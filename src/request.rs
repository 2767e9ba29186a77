use std::fmt;

use http::{header, HeaderMap, HeaderName, HeaderValue, Method};
use url::Url;

use crate::body::Body;
use crate::util::Redacted;
use crate::Error;

/// An outgoing request.
///
/// The request owns its headers. The transport and the orchestration both
/// operate on the same instance through `&mut Request`, so a header set by an
/// auth flow is exactly what the transport sees.
pub struct Request {
    method: Method,
    url: Url,
    headers: HeaderMap,
    body: Body,
    // Cookie header was written from the jar, not by the caller.
    jar_cookie: bool,
}

/// Snapshot of a request's method, url and headers.
///
/// Responses refer back to the request that produced them through this.
/// It does not own the body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestHead {
    /// Request method.
    pub method: Method,
    /// Request url.
    pub url: Url,
    /// Request headers as sent.
    pub headers: HeaderMap,
}

impl Request {
    /// Create a request without headers or body.
    pub fn new(method: Method, url: Url) -> Self {
        Request {
            method,
            url,
            headers: HeaderMap::new(),
            body: Body::Empty,
            jar_cookie: false,
        }
    }

    /// Parse `url` and create a request.
    pub fn parse(method: Method, url: &str) -> Result<Self, Error> {
        Ok(Request::new(method, Url::parse(url)?))
    }

    /// Builder style setter of the body.
    pub fn with_body(mut self, body: impl Into<Body>) -> Self {
        self.body = body.into();
        self
    }

    /// Builder style append of a header.
    pub fn with_header<K, V>(mut self, key: K, value: V) -> Result<Self, Error>
    where
        HeaderName: TryFrom<K>,
        <HeaderName as TryFrom<K>>::Error: Into<http::Error>,
        HeaderValue: TryFrom<V>,
        <HeaderValue as TryFrom<V>>::Error: Into<http::Error>,
    {
        self.append_header(key, value)?;
        Ok(self)
    }

    /// Request method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Change the method.
    pub fn set_method(&mut self, method: Method) {
        self.method = method;
    }

    /// Request url.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Replace the url.
    pub fn set_url(&mut self, url: Url) {
        self.url = url;
    }

    /// Request headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Mutable request headers.
    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Set a header, replacing any previous values.
    pub fn set_header<K, V>(&mut self, key: K, value: V) -> Result<(), Error>
    where
        HeaderName: TryFrom<K>,
        <HeaderName as TryFrom<K>>::Error: Into<http::Error>,
        HeaderValue: TryFrom<V>,
        <HeaderValue as TryFrom<V>>::Error: Into<http::Error>,
    {
        let (name, value) = header_pair(key, value)?;
        self.headers.insert(name, value);
        Ok(())
    }

    /// Append a header, keeping previous values.
    pub fn append_header<K, V>(&mut self, key: K, value: V) -> Result<(), Error>
    where
        HeaderName: TryFrom<K>,
        <HeaderName as TryFrom<K>>::Error: Into<http::Error>,
        HeaderValue: TryFrom<V>,
        <HeaderValue as TryFrom<V>>::Error: Into<http::Error>,
    {
        let (name, value) = header_pair(key, value)?;
        self.headers.append(name, value);
        Ok(())
    }

    /// Request body.
    pub fn body(&self) -> &Body {
        &self.body
    }

    /// Mutable request body. Transports read the body through this.
    pub fn body_mut(&mut self) -> &mut Body {
        &mut self.body
    }

    /// Replace the body.
    pub fn set_body(&mut self, body: impl Into<Body>) {
        self.body = body.into();
    }

    /// Snapshot method, url and headers.
    pub fn head(&self) -> RequestHead {
        RequestHead {
            method: self.method.clone(),
            url: self.url.clone(),
            headers: self.headers.clone(),
        }
    }

    /// Apply a `Cookie` header rendered from the jar.
    ///
    /// A `Cookie` header set by the caller is left alone. A header previously
    /// written from the jar is replaced, or removed if the jar now renders nothing.
    pub(crate) fn apply_jar_cookie(&mut self, rendered: Option<String>) -> Result<(), Error> {
        if self.headers.contains_key(header::COOKIE) && !self.jar_cookie {
            return Ok(());
        }

        match rendered {
            Some(v) => {
                self.headers
                    .insert(header::COOKIE, HeaderValue::try_from(v)?);
                self.jar_cookie = true;
            }
            None => {
                self.headers.remove(header::COOKIE);
                self.jar_cookie = false;
            }
        }

        Ok(())
    }

    /// Forget any `Cookie` header, regardless of where it came from.
    pub(crate) fn clear_cookie(&mut self) {
        self.headers.remove(header::COOKIE);
        self.jar_cookie = false;
    }
}

fn header_pair<K, V>(key: K, value: V) -> Result<(HeaderName, HeaderValue), Error>
where
    HeaderName: TryFrom<K>,
    <HeaderName as TryFrom<K>>::Error: Into<http::Error>,
    HeaderValue: TryFrom<V>,
    <HeaderValue as TryFrom<V>>::Error: Into<http::Error>,
{
    let name = <HeaderName as TryFrom<K>>::try_from(key)
        .map_err(|e| Error::BadHeader(e.into().to_string()))?;
    let value = <HeaderValue as TryFrom<V>>::try_from(value)
        .map_err(|e| Error::BadHeader(e.into().to_string()))?;
    Ok((name, value))
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("method", &self.method)
            .field("url", &self.url.as_str())
            .field("headers", &Redacted(&self.headers))
            .field("body", &self.body)
            .finish()
    }
}
