//! Authentication strategies.
//!
//! Authentication is a round based protocol. The client asks the strategy for
//! an [`AuthFlow`], which amends the outgoing request in [`AuthFlow::start`].
//! After each exchange the client hands the response to [`AuthFlow::resume`],
//! which either amends the request for another round ([`AuthStep::SendRequest`])
//! or ends the flow ([`AuthStep::Done`]).
//!
//! ```text
//!            ┌──────────────┐
//!            │    start     │
//!            └──────────────┘
//!                    │
//!                    ▼
//!            ┌──────────────┐
//!       ┌───▶│   exchange   │
//!       │    └──────────────┘
//!       │            │
//!       │            ▼
//!       │    ┌──────────────┐
//!       └────│    resume    │
//! SendRequest└──────────────┘
//!                    │ Done
//!                    ▼
//! ```
//!
//! Rounds are strictly sequential. A transport failure aborts the flow, no
//! further rounds are run.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use crate::request::Request;
use crate::response::Response;
use crate::Error;

mod basic;
mod digest;
mod netrc;

pub use basic::BasicAuth;
pub use digest::{Algorithm, Challenge, DigestAuth};
pub use netrc::{NetRc, NetRcAuth};

/// Outcome of an auth round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStep {
    /// Send the (amended) request.
    SendRequest,
    /// The flow is over, the last response is the result.
    Done,
}

/// State of one auth conversation.
///
/// The request is passed by `&mut` so a flow can amend headers or replace it
/// wholesale between rounds.
pub trait AuthFlow: Send {
    /// Prepare the first request.
    fn start(&mut self, request: &mut Request) -> Result<(), Error>;

    /// Inspect the response to the last request and decide on another round.
    fn resume(&mut self, request: &mut Request, response: &Response) -> Result<AuthStep, Error>;

    /// Buffer the request body before starting, so it can be resent.
    fn requires_request_body(&self) -> bool {
        false
    }

    /// Buffer each response body before calling `resume()`.
    fn requires_response_body(&self) -> bool {
        false
    }
}

/// User provided strategy producing its own flows.
pub trait AuthStrategy: Send + Sync {
    /// Begin a new flow for one call.
    fn flow(&self) -> Box<dyn AuthFlow>;
}

/// Closure amending a request, without any extra round trip.
pub type AuthFn = Arc<dyn Fn(&mut Request) -> Result<(), Error> + Send + Sync>;

/// The supported authentication strategies.
#[derive(Clone)]
#[non_exhaustive]
pub enum Auth {
    /// `Authorization: Basic`, single round.
    Basic(BasicAuth),
    /// Digest challenge/response, up to two rounds.
    Digest(DigestAuth),
    /// Basic credentials looked up in a `.netrc` file.
    NetRc(NetRcAuth),
    /// Synchronous request mutation.
    Function(AuthFn),
    /// Custom multi round strategy.
    Custom(Arc<dyn AuthStrategy>),
}

impl Auth {
    /// Basic auth.
    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        Auth::Basic(BasicAuth::new(username, password))
    }

    /// Digest auth.
    pub fn digest(username: impl Into<String>, password: impl Into<String>) -> Self {
        Auth::Digest(DigestAuth::new(username, password))
    }

    /// Credentials from `$HOME/.netrc`.
    pub fn netrc() -> Result<Self, Error> {
        Ok(Auth::NetRc(NetRcAuth::from_home()?))
    }

    /// Credentials from a netrc file at `path`.
    pub fn netrc_file(path: impl AsRef<Path>) -> Result<Self, Error> {
        Ok(Auth::NetRc(NetRcAuth::from_file(path)?))
    }

    /// Amend each request with a closure.
    pub fn function<F>(f: F) -> Self
    where
        F: Fn(&mut Request) -> Result<(), Error> + Send + Sync + 'static,
    {
        Auth::Function(Arc::new(f))
    }

    /// Custom strategy.
    pub fn custom(strategy: impl AuthStrategy + 'static) -> Self {
        Auth::Custom(Arc::new(strategy))
    }

    /// Begin a flow for one call.
    pub fn flow(&self) -> Box<dyn AuthFlow> {
        match self {
            Auth::Basic(v) => {
                let v = v.clone();
                Box::new(SingleRound::new(move |r: &mut Request| v.apply(r)))
            }
            Auth::Digest(v) => Box::new(v.flow()),
            Auth::NetRc(v) => {
                let v = v.clone();
                Box::new(SingleRound::new(move |r: &mut Request| v.apply(r)))
            }
            Auth::Function(f) => {
                let f = f.clone();
                Box::new(SingleRound::new(move |r: &mut Request| f(r)))
            }
            Auth::Custom(s) => s.flow(),
        }
    }
}

impl fmt::Debug for Auth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Auth::Basic(v) => write!(f, "Basic({:?})", v),
            Auth::Digest(v) => write!(f, "Digest({:?})", v),
            Auth::NetRc(_) => write!(f, "NetRc"),
            Auth::Function(_) => write!(f, "Function"),
            Auth::Custom(_) => write!(f, "Custom"),
        }
    }
}

/// No auth at all. Used when neither call nor client configures any.
pub(crate) struct NoAuth;

impl AuthFlow for NoAuth {
    fn start(&mut self, _: &mut Request) -> Result<(), Error> {
        Ok(())
    }

    fn resume(&mut self, _: &mut Request, _: &Response) -> Result<AuthStep, Error> {
        Ok(AuthStep::Done)
    }
}

/// Amend the request once, never look at the response.
struct SingleRound<F> {
    apply: F,
}

impl<F> SingleRound<F> {
    fn new(apply: F) -> Self {
        SingleRound { apply }
    }
}

impl<F> AuthFlow for SingleRound<F>
where
    F: Fn(&mut Request) -> Result<(), Error> + Send,
{
    fn start(&mut self, request: &mut Request) -> Result<(), Error> {
        (self.apply)(request)
    }

    fn resume(&mut self, _: &mut Request, _: &Response) -> Result<AuthStep, Error> {
        Ok(AuthStep::Done)
    }
}
