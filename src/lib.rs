//! Request orchestration for HTTP clients.
//!
//! This crate sits between a verb level API (`get`, `post`, ...) and a
//! pluggable [`Transport`](transport::Transport) that does the actual wire I/O.
//! It turns one logical call into the exchanges needed to satisfy
//! authentication challenges and redirect chains, while keeping:
//!
//! * the history of intermediate responses,
//! * the client's cookie jar in sync with every `Set-Cookie`,
//! * an at-most-once guarantee for streamed request bodies.
//!
//! Connection pooling, TLS and HTTP framing are the transport's business.
//!
//! # Pieces
//!
//! * [`body`] - request/response bodies, [`StreamGuard`] for one-shot streams.
//! * [`auth`] - Basic, Digest, netrc, closures and custom multi round flows.
//! * [`cookies`] - the client scoped cookie jar.
//! * [`router`] - mount patterns and environment proxies.
//! * [`redirect`] - the redirect [`Chain`](redirect::Chain) state machine.
//! * [`client`] - the blocking [`Client`] and the [`AsyncClient`].
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use ureq_relay::{Auth, Client};
//! use ureq_relay::transport::mock::{MockTransport, Reply};
//!
//! let mock = Arc::new(MockTransport::sequence([
//!     Reply::raw(
//!         "HTTP/1.1 401 Unauthorized\r\n\
//!          WWW-Authenticate: Digest realm=\"test\", nonce=\"abc123\", qop=\"auth\"\r\n\
//!          \r\n",
//!     ),
//!     Reply::raw("HTTP/1.1 200 OK\r\n\r\n"),
//! ]));
//!
//! let client = Client::builder(mock.clone()).build().unwrap();
//!
//! let res = client
//!     .get("https://q.test/private")
//!     .auth(Auth::digest("user", "pass"))
//!     .send()
//!     .unwrap();
//!
//! assert_eq!(res.status(), 200);
//! assert_eq!(res.history().len(), 1);
//!
//! let retry = &mock.requests()[1];
//! let authorization = retry.headers.get("authorization").unwrap().to_str().unwrap();
//! assert!(authorization.starts_with("Digest username=\"user\""));
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all)]
#![deny(missing_docs)]

#[macro_use]
extern crate log;

mod error;
mod ext;
mod util;

pub mod auth;
pub mod body;
pub mod cookies;
pub mod redirect;
pub mod router;
pub mod transport;

mod request;
mod response;

#[cfg(feature = "client")]
pub mod client;

pub use error::{Error, ErrorCategory, TimeoutKind};

pub use auth::Auth;
pub use body::{Body, StreamGuard};
pub use cookies::{CookieJar, SharedJar};
pub use request::{Request, RequestHead};
pub use response::Response;

#[cfg(feature = "client")]
pub use client::{Client, ClientBuilder, RequestBuilder};

#[cfg(feature = "async")]
pub use client::{AsyncClient, AsyncClientBuilder};

// Re-export the basis for this library.
pub use http;
pub use url;
