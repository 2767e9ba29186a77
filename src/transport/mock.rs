//! A scripted transport for tests.
//!
//! ```
//! use ureq_relay::transport::mock::{MockTransport, Reply};
//!
//! let mock = MockTransport::sequence([
//!     Reply::raw("HTTP/1.1 302 Found\r\nLocation: /next\r\n\r\n"),
//!     Reply::raw("HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\nok"),
//! ]);
//! ```

use std::collections::VecDeque;
use std::fmt;

use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Version};
use parking_lot::Mutex;
use url::Url;

use crate::body::Body;
use crate::request::Request;
use crate::response::Response;
use crate::Error;

use super::Transport;

/// What the mock saw of one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    /// Request method.
    pub method: Method,
    /// Request url.
    pub url: Url,
    /// Request headers.
    pub headers: HeaderMap,
    /// The body, read in full.
    pub body: Bytes,
}

/// One scripted answer.
pub enum Reply {
    /// Raw HTTP/1.1 response bytes.
    Raw(Vec<u8>),
    /// A ready made response. The url is replaced by the request url.
    Response(Response),
    /// Fail the exchange.
    Fail(Error),
}

impl Reply {
    /// Raw HTTP/1.1 response bytes.
    pub fn raw(bytes: impl AsRef<[u8]>) -> Self {
        Reply::Raw(bytes.as_ref().to_vec())
    }

    /// Fail the exchange with `err`.
    pub fn fail(err: Error) -> Self {
        Reply::Fail(err)
    }
}

type Handler = Box<dyn Fn(&RecordedRequest) -> Result<Response, Error> + Send + Sync>;

/// Transport answering from a closure or a script.
pub struct MockTransport {
    source: Source,
    seen: Mutex<Vec<RecordedRequest>>,
}

enum Source {
    Handler(Handler),
    Script(Mutex<VecDeque<Reply>>),
}

impl MockTransport {
    /// Answer every request with `f`.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&RecordedRequest) -> Result<Response, Error> + Send + Sync + 'static,
    {
        MockTransport {
            source: Source::Handler(Box::new(f)),
            seen: Mutex::new(Vec::new()),
        }
    }

    /// Answer requests in order. Once the script runs out, requests fail
    /// with [`Error::Connect`].
    pub fn sequence<I>(replies: I) -> Self
    where
        I: IntoIterator<Item = Reply>,
    {
        MockTransport {
            source: Source::Script(Mutex::new(replies.into_iter().collect())),
            seen: Mutex::new(Vec::new()),
        }
    }

    /// The requests handled so far, oldest first.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.seen.lock().clone()
    }

    /// Number of requests handled so far.
    pub fn count(&self) -> usize {
        self.seen.lock().len()
    }

    fn respond(&self, recorded: RecordedRequest) -> Result<Response, Error> {
        let result = match &self.source {
            Source::Handler(f) => f(&recorded),
            Source::Script(script) => {
                let next = script.lock().pop_front();
                let url = recorded.url.clone();
                match next {
                    Some(Reply::Raw(raw)) => parse_response(&raw, url),
                    Some(Reply::Response(res)) => Ok(res.with_url(url)),
                    Some(Reply::Fail(err)) => Err(err),
                    None => Err(Error::Connect("mock script exhausted".into())),
                }
            }
        };

        self.seen.lock().push(recorded);
        result
    }
}

impl Transport for MockTransport {
    fn handle(&self, request: &mut Request) -> Result<Response, Error> {
        let body = request.body_mut().read_all()?;
        self.respond(record(request, body))
    }
}

#[cfg(feature = "async")]
#[async_trait::async_trait]
impl super::AsyncTransport for MockTransport {
    async fn handle(&self, request: &mut Request) -> Result<Response, Error> {
        let body = request.body_mut().read_all_async().await?;
        self.respond(record(request, body))
    }
}

fn record(request: &Request, body: Bytes) -> RecordedRequest {
    trace!("Mock handle {} {}", request.method(), request.url());
    RecordedRequest {
        method: request.method().clone(),
        url: request.url().clone(),
        headers: request.headers().clone(),
        body,
    }
}

/// Parse raw HTTP/1.1 response bytes.
///
/// The body is what follows the head, cut to `Content-Length` when given.
pub fn parse_response(raw: &[u8], url: Url) -> Result<Response, Error> {
    let mut headers = [httparse::EMPTY_HEADER; 64];
    let mut res = httparse::Response::new(&mut headers);

    let head_len = match res.parse(raw) {
        Ok(httparse::Status::Complete(n)) => n,
        Ok(httparse::Status::Partial) => {
            return Err(Error::Protocol("incomplete response head".into()))
        }
        Err(e) => return Err(Error::Protocol(format!("bad response: {}", e))),
    };

    let status = res
        .code
        .and_then(|c| StatusCode::from_u16(c).ok())
        .ok_or_else(|| Error::Protocol("bad response status".into()))?;

    let version = match res.version {
        Some(0) => Version::HTTP_10,
        _ => Version::HTTP_11,
    };

    let mut map = HeaderMap::new();
    let mut content_length = None;

    for h in res.headers.iter() {
        let name = HeaderName::from_bytes(h.name.as_bytes())?;
        let value = HeaderValue::from_bytes(h.value)?;
        if name == http::header::CONTENT_LENGTH {
            content_length = value.to_str().ok().and_then(|v| v.parse::<usize>().ok());
        }
        map.append(name, value);
    }

    let mut body = &raw[head_len..];
    if let Some(len) = content_length {
        if len < body.len() {
            body = &body[..len];
        }
    }

    let body = if body.is_empty() {
        Body::Empty
    } else {
        Body::Full(Bytes::copy_from_slice(body))
    };

    Ok(Response::new(status, url)
        .with_version(version)
        .with_headers(map)
        .with_body(body))
}

impl fmt::Debug for MockTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockTransport")
            .field("seen", &self.count())
            .finish()
    }
}
