use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use http::{header, HeaderMap, StatusCode, Version};
use url::Url;

use crate::body::Body;
use crate::ext::StatusExt;
use crate::request::{Request, RequestHead};
use crate::Error;

/// A response, together with the responses that led up to it.
pub struct Response {
    status: StatusCode,
    version: Version,
    headers: HeaderMap,
    body: Body,
    url: Url,
    request: Option<Arc<RequestHead>>,
    pub(crate) history: Vec<Response>,
    pub(crate) next_request: Option<Request>,
}

impl Response {
    /// Create a response for `url`.
    ///
    /// Transports normally use this. The back-reference to the request is filled
    /// in by the client once the exchange is done.
    pub fn new(status: StatusCode, url: Url) -> Self {
        Response {
            status,
            version: Version::HTTP_11,
            headers: HeaderMap::new(),
            body: Body::Empty,
            url,
            request: None,
            history: Vec::new(),
            next_request: None,
        }
    }

    /// Builder style setter of the headers.
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    /// Builder style setter of the body.
    pub fn with_body(mut self, body: impl Into<Body>) -> Self {
        self.body = body.into();
        self
    }

    /// Builder style setter of the url.
    pub fn with_url(mut self, url: Url) -> Self {
        self.url = url;
        self
    }

    /// Builder style setter of the version.
    pub fn with_version(mut self, version: Version) -> Self {
        self.version = version;
        self
    }

    /// Response status.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Response HTTP version.
    pub fn version(&self) -> Version {
        self.version
    }

    /// Response headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Mutable response headers.
    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// The url this response came from.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// The request that produced this response.
    pub fn request(&self) -> Option<&RequestHead> {
        self.request.as_deref()
    }

    pub(crate) fn set_request(&mut self, head: Arc<RequestHead>) {
        self.request = Some(head);
    }

    /// Earlier responses in this call, oldest first.
    ///
    /// These are auth challenges and followed redirects.
    pub fn history(&self) -> &[Response] {
        &self.history
    }

    /// The redirect request that was not followed.
    ///
    /// Only set when redirects are disabled and this response is a redirect.
    pub fn next_request(&self) -> Option<&Request> {
        self.next_request.as_ref()
    }

    /// Take the redirect request that was not followed.
    pub fn take_next_request(&mut self) -> Option<Request> {
        self.next_request.take()
    }

    /// Response body.
    pub fn body_mut(&mut self) -> &mut Body {
        &mut self.body
    }

    /// Tell if this is a redirect status carrying a `Location`.
    pub fn has_redirect_location(&self) -> bool {
        self.status.is_followable_redirect() && self.headers.contains_key(header::LOCATION)
    }

    /// Buffer the whole body in memory, using blocking reads.
    pub fn read(&mut self) -> Result<Bytes, Error> {
        let bytes = self.body.read_all()?;
        self.body = Body::Full(bytes.clone());
        Ok(bytes)
    }

    /// Buffer the whole body in memory.
    pub async fn read_async(&mut self) -> Result<Bytes, Error> {
        let bytes = self.body.read_all_async().await?;
        self.body = Body::Full(bytes.clone());
        Ok(bytes)
    }

    /// Body as text, lossy utf-8.
    ///
    /// The body must have been buffered with `read()` first.
    pub fn text(&self) -> Option<String> {
        match &self.body {
            Body::Empty => Some(String::new()),
            Body::Full(b) => Some(String::from_utf8_lossy(b).into_owned()),
            _ => None,
        }
    }

    /// Release the body stream without reading it.
    pub fn close(&mut self) {
        self.body.close();
    }
}

impl fmt::Debug for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Response")
            .field("status", &self.status)
            .field("url", &self.url.as_str())
            .field("history", &self.history.len())
            .field("body", &self.body)
            .finish()
    }
}
