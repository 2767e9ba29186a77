//! The transport seam.
//!
//! A transport performs one exchange: it writes the request (consuming the
//! body), and returns the response head with a lazy body. Connection pooling,
//! TLS and framing all live behind this trait. Failures are reported with the
//! transport variants of [`Error`] and are never retried by the client.

use crate::request::Request;
use crate::response::Response;
use crate::Error;

pub mod mock;

/// Blocking transport.
///
/// The request is lent mutably so the transport reads the body through the
/// same instance the client keeps. After `handle` returns, a streamed body is
/// drained.
pub trait Transport: Send + Sync {
    /// Perform one request/response exchange.
    fn handle(&self, request: &mut Request) -> Result<Response, Error>;
}

impl<F> Transport for F
where
    F: Fn(&mut Request) -> Result<Response, Error> + Send + Sync,
{
    fn handle(&self, request: &mut Request) -> Result<Response, Error> {
        (self)(request)
    }
}

/// Async transport.
#[cfg(feature = "async")]
#[async_trait::async_trait]
pub trait AsyncTransport: Send + Sync {
    /// Perform one request/response exchange.
    async fn handle(&self, request: &mut Request) -> Result<Response, Error>;
}
