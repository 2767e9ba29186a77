//! Following redirects.
//!
//! The redirect chain of one call is a [`Chain`] moving between three states.
//!
//! ```text
//!              ┌──────────────┐
//!         ┌───▶│   Sending    │
//!         │    └──────────────┘
//!         │            │ receive()
//!         │            ▼
//!         │    ┌──────────────┐      ┌──────────────┐
//!         └────│  Redirected  │      │     Done     │
//!    proceed() └──────────────┘      └──────────────┘
//! ```
//!
//! In `Sending` the caller performs the exchange for [`Chain::request_mut()`]
//! and hands the response to [`Chain::receive()`]. A response that is not a
//! redirect (or any response, with redirects disabled) ends the chain.

use std::fmt;
use std::marker::PhantomData;
use std::mem;

use http::{header, Method};
use url::Url;

use crate::body::Body;
use crate::cookies::CookieJar;
use crate::ext::{HeaderMapExt, MethodExt, StatusExt, UrlExt};
use crate::request::Request;
use crate::response::Response;
use crate::Error;

/// Default cap on the history length of one call.
pub const DEFAULT_MAX_REDIRECTS: usize = 20;

/// Type state for [`Chain`].
pub mod state {
    pub(crate) trait Named {
        fn name() -> &'static str;
    }

    macro_rules! chain_state {
        ($n:tt) => {
            #[doc(hidden)]
            pub struct $n(());
            impl Named for $n {
                fn name() -> &'static str {
                    stringify!($n)
                }
            }
        };
    }

    chain_state!(Sending);
    chain_state!(Redirected);
    chain_state!(Done);
}
use self::state::*;

/// The redirect chain of one call.
pub struct Chain<State> {
    inner: Inner,
    _ph: PhantomData<State>,
}

struct Inner {
    request: Request,
    response: Option<Response>,
    next: Option<Request>,
    history: Vec<Response>,
    redirects: usize,
    max_redirects: usize,
    follow: bool,
}

impl<S: Named> Chain<S> {
    fn wrap(inner: Inner) -> Chain<S> {
        let wrapped = Chain {
            inner,
            _ph: PhantomData,
        };

        debug!("{:?}", wrapped);

        wrapped
    }
}

// //////////////////////////////////////////////////////////////////////////////////////////// SENDING

impl Chain<Sending> {
    /// Start a chain with `request`.
    ///
    /// `history` holds responses that precede the chain, such as auth
    /// challenges. They end up first in the final history and count towards
    /// `max_redirects`, which caps the history length.
    pub fn new(request: Request, history: Vec<Response>, max_redirects: usize, follow: bool) -> Self {
        Chain::wrap(Inner {
            request,
            response: None,
            next: None,
            history,
            redirects: 0,
            max_redirects,
            follow,
        })
    }

    /// The request to send.
    pub fn request(&self) -> &Request {
        &self.inner.request
    }

    /// The request to send, for the transport.
    pub fn request_mut(&mut self) -> &mut Request {
        &mut self.inner.request
    }

    /// Number of redirects followed so far.
    pub fn redirects(&self) -> usize {
        self.inner.redirects
    }

    /// Feed the response to the request.
    pub fn receive(mut self, mut response: Response) -> Result<ReceiveResult, Error> {
        if !response.has_redirect_location() {
            self.inner.response = Some(response);
            return Ok(ReceiveResult::Done(Chain::wrap(self.inner)));
        }

        if !self.inner.follow {
            // Computed with the same rules, for the caller to follow by hand.
            let next = match build_next(&mut self.inner.request, &response, true) {
                Ok(v) => v,
                Err(e) => {
                    response.close();
                    return Err(e);
                }
            };
            response.next_request = Some(next);
            self.inner.response = Some(response);
            return Ok(ReceiveResult::Done(Chain::wrap(self.inner)));
        }

        if self.inner.history.len() >= self.inner.max_redirects {
            response.close();
            return Err(Error::TooManyRedirects {
                url: response.url().clone(),
                history: self.inner.history.len(),
            });
        }

        let next = match build_next(&mut self.inner.request, &response, false) {
            Ok(v) => v,
            Err(e) => {
                response.close();
                return Err(e);
            }
        };

        self.inner.next = Some(next);
        self.inner.response = Some(response);

        Ok(ReceiveResult::Redirect(Chain::wrap(self.inner)))
    }
}

/// Outcome of [`Chain::receive()`].
pub enum ReceiveResult {
    /// Follow the redirect.
    Redirect(Chain<Redirected>),
    /// The chain is over.
    Done(Chain<Done>),
}

// //////////////////////////////////////////////////////////////////////////////////////////// REDIRECTED

impl Chain<Redirected> {
    /// The redirect response.
    ///
    /// The caller buffers its body here before proceeding.
    pub fn response_mut(&mut self) -> Option<&mut Response> {
        self.inner.response.as_mut()
    }

    /// The request about to be sent.
    pub fn next_request(&self) -> Option<&Request> {
        self.inner.next.as_ref()
    }

    /// Move on to the next leg.
    ///
    /// The redirect response goes to history, and the jar is applied to
    /// the new request.
    pub fn proceed(mut self, jar: &CookieJar) -> Result<Chain<Sending>, Error> {
        let Some(mut next) = self.inner.next.take() else {
            return Err(Error::Protocol("redirect without next request".into()));
        };

        next.apply_jar_cookie(jar.header_value())?;

        if let Some(response) = self.inner.response.take() {
            self.inner.history.push(response);
        }

        self.inner.request = next;
        self.inner.redirects += 1;

        Ok(Chain::wrap(self.inner))
    }
}

// //////////////////////////////////////////////////////////////////////////////////////////// DONE

impl Chain<Done> {
    /// The final response, carrying the history.
    pub fn into_response(mut self) -> Result<Response, Error> {
        let Some(mut response) = self.inner.response.take() else {
            return Err(Error::Protocol("chain done without response".into()));
        };
        response.history = mem::take(&mut self.inner.history);
        Ok(response)
    }
}

// ////////////////////////////////////////////////////////////////////////////////////////////

/// Build the request following `response`.
///
/// With `lenient`, a drained stream body is passed on as is and fails once
/// sent. Otherwise it fails here.
fn build_next(previous: &mut Request, response: &Response, lenient: bool) -> Result<Request, Error> {
    let location = response
        .headers()
        .first_str(&header::LOCATION)
        .ok_or_else(|| {
            Error::RemoteProtocol(format!(
                "invalid redirect location header from {}",
                response.url()
            ))
        })?;

    let mut url = resolve_location(previous.url(), location)?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(Error::UnsupportedProtocol(format!(
            "redirect from {} to scheme: {}",
            response.url(),
            url.scheme()
        )));
    }

    if url.fragment().is_none() {
        if let Some(fragment) = previous.url().fragment() {
            url.set_fragment(Some(fragment));
        }
    }

    let status = response.status();
    let method = previous.method().clone();

    // 301/302/303 turn anything but GET/HEAD into GET, without a body.
    let downgrade = !status.is_redirect_retaining_method() && !method.is_get_or_head();

    let mut headers = previous.headers().clone();

    let body = if downgrade {
        headers.remove(header::CONTENT_LENGTH);
        headers.remove(header::TRANSFER_ENCODING);
        Body::Empty
    } else if lenient && previous.body().is_consumed() {
        mem::take(previous.body_mut())
    } else {
        previous.body_mut().take_for_resend().map_err(|e| {
            debug!("Redirect from {} cannot resend body: {}", previous.url(), e);
            e
        })?
    };

    headers.remove(header::HOST);

    if !can_redirect_auth_header(previous.url(), &url) {
        headers.remove(header::AUTHORIZATION);
    }

    let new_method = if downgrade { Method::GET } else { method };

    debug!("Redirect {} {} -> {} {}", status, previous.method(), new_method, url);

    let mut next = Request::new(new_method, url);
    *next.headers_mut() = headers;
    next.clear_cookie();
    next.set_body(body);

    Ok(next)
}

/// Resolve a `Location` value against the url of the request.
pub(crate) fn resolve_location(base: &Url, location: &str) -> Result<Url, Error> {
    let location = location.trim();

    let repaired;
    let mut location = location;

    if let Some((scheme, rest)) = split_scheme(location) {
        let end = rest.find(['/', '?', '#']).unwrap_or(rest.len());
        let authority = &rest[..end];
        let host = authority.rsplit('@').next().unwrap_or(authority);

        if !host.is_ascii() {
            return Err(Error::RemoteProtocol(format!(
                "invalid redirect location from {}, non-ascii host: {}",
                base, location
            )));
        }

        if host.is_empty() {
            // "https:///path" keeps the host we came from
            repaired = format!("{}://{}{}", scheme, base.authority_str(), &rest[end..]);
            location = &repaired;
        }
    }

    base.join(location)
        .map_err(|e| {
            Error::RemoteProtocol(format!(
                "invalid redirect location from {} {}: {}",
                base, location, e
            ))
        })
}

/// `("https", "host/path")` from `"https://host/path"`.
fn split_scheme(s: &str) -> Option<(&str, &str)> {
    let (scheme, rest) = s.split_once("://")?;
    let mut chars = scheme.chars();
    let first = chars.next()?;
    let valid = first.is_ascii_alphabetic()
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
    valid.then_some((scheme, rest))
}

/// Authorization survives when the host is unchanged and the scheme is
/// unchanged or upgraded to https.
fn can_redirect_auth_header(prev: &Url, next: &Url) -> bool {
    prev.same_host(next) && (prev.scheme() == next.scheme() || next.scheme() == "https")
}

impl<State: Named> fmt::Debug for Chain<State> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Chain<{}>", State::name())
    }
}
