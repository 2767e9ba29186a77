//! Digest access authentication (RFC 2617 / RFC 7616).

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::SystemTime;

use http::{header, Method, StatusCode};
use md5::Md5;
use parking_lot::Mutex;
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha512};

use crate::ext::{HeaderMapExt, UrlExt};
use crate::request::Request;
use crate::response::Response;
use crate::util::{split_quoted_list, unquote};
use crate::Error;

use super::{AuthFlow, AuthStep};

/// Produces the client nonce from `(nonce_count, server_nonce)`.
pub type CnonceFn = Arc<dyn Fn(u32, &str) -> String + Send + Sync>;

/// Digest credentials plus the challenges learned so far.
///
/// Clones share the challenge cache, which is keyed by host. A later call to the
/// same host pre-authenticates using the cached challenge instead of waiting
/// for a 401.
#[derive(Clone)]
pub struct DigestAuth {
    username: String,
    password: String,
    cache: Arc<Mutex<HashMap<String, Cached>>>,
    cnonce: CnonceFn,
}

#[derive(Debug, Clone)]
struct Cached {
    challenge: Challenge,
    // Next nonce count to use.
    nonce_count: u32,
}

/// Hash algorithm named in a digest challenge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum Algorithm {
    Md5,
    Md5Sess,
    Sha,
    ShaSess,
    Sha256,
    Sha256Sess,
    Sha512,
    Sha512Sess,
}

impl Algorithm {
    /// Parse an algorithm name, case-insensitive.
    pub fn parse(s: &str) -> Result<Algorithm, Error> {
        let a = match s.to_ascii_uppercase().as_str() {
            "MD5" => Algorithm::Md5,
            "MD5-SESS" => Algorithm::Md5Sess,
            "SHA" => Algorithm::Sha,
            "SHA-SESS" => Algorithm::ShaSess,
            "SHA-256" => Algorithm::Sha256,
            "SHA-256-SESS" => Algorithm::Sha256Sess,
            "SHA-512" => Algorithm::Sha512,
            "SHA-512-SESS" => Algorithm::Sha512Sess,
            _ => {
                return Err(Error::Protocol(format!(
                    "unsupported digest algorithm: {}",
                    s
                )))
            }
        };
        Ok(a)
    }

    /// Whether A1 is derived per session.
    pub fn is_sess(&self) -> bool {
        matches!(
            self,
            Algorithm::Md5Sess | Algorithm::ShaSess | Algorithm::Sha256Sess | Algorithm::Sha512Sess
        )
    }

    /// Lower case hex digest of `data`.
    pub fn hash_hex(&self, data: &[u8]) -> String {
        match self {
            Algorithm::Md5 | Algorithm::Md5Sess => hex::encode(Md5::digest(data)),
            Algorithm::Sha | Algorithm::ShaSess => hex::encode(Sha1::digest(data)),
            Algorithm::Sha256 | Algorithm::Sha256Sess => hex::encode(Sha256::digest(data)),
            Algorithm::Sha512 | Algorithm::Sha512Sess => hex::encode(Sha512::digest(data)),
        }
    }
}

/// A parsed `WWW-Authenticate: Digest ...` challenge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Challenge {
    /// Protection space.
    pub realm: String,
    /// Server nonce.
    pub nonce: String,
    /// Opaque value to echo back.
    pub opaque: Option<String>,
    /// Offered quality of protection, as sent (e.g. `auth,auth-int`).
    pub qop: Option<String>,
    /// Algorithm name as sent. `MD5` when absent.
    pub algorithm: String,
}

impl Challenge {
    /// Parse a header value such as `Digest realm="x", nonce="y"`.
    pub fn parse(value: &str) -> Result<Challenge, Error> {
        let value = value.trim();
        let (scheme, fields) = value.split_once(' ').unwrap_or((value, ""));

        if !scheme.eq_ignore_ascii_case("digest") {
            return Err(Error::Protocol(format!(
                "not a digest challenge: {}",
                scheme
            )));
        }

        let items = split_quoted_list(fields).ok_or_else(|| {
            Error::Protocol("malformed digest challenge: unbalanced quotes".into())
        })?;

        let mut realm = None;
        let mut nonce = None;
        let mut opaque = None;
        let mut qop = None;
        let mut algorithm = None;

        for item in items {
            let Some((key, val)) = item.split_once('=') else {
                return Err(Error::Protocol(format!(
                    "malformed digest challenge field: {}",
                    item
                )));
            };

            let val = unquote(val);
            match key.trim().to_ascii_lowercase().as_str() {
                "realm" => realm = Some(val),
                "nonce" => nonce = Some(val),
                "opaque" => opaque = Some(val),
                "qop" => qop = Some(val),
                "algorithm" => algorithm = Some(val),
                _ => {}
            }
        }

        let (Some(realm), Some(nonce)) = (realm, nonce) else {
            return Err(Error::Protocol(
                "malformed digest challenge: missing realm or nonce".into(),
            ));
        };

        Ok(Challenge {
            realm,
            nonce,
            opaque,
            qop,
            algorithm: algorithm.unwrap_or_else(|| "MD5".to_string()),
        })
    }

    /// Pick the qop to answer with.
    ///
    /// `None` when the server offered none (legacy RFC 2069 digest).
    fn resolve_qop(&self) -> Result<Option<&'static str>, Error> {
        let Some(qop) = &self.qop else {
            return Ok(None);
        };

        let offered: Vec<&str> = qop.split(',').map(|s| s.trim()).collect();

        if offered.iter().any(|q| *q == "auth") {
            Ok(Some("auth"))
        } else if offered == ["auth-int"] {
            Err(Error::Unimplemented("digest qop auth-int"))
        } else {
            Err(Error::Protocol(format!(
                "unexpected qop value in digest challenge: {}",
                qop
            )))
        }
    }
}

/// Compute the `Authorization` header value for one request.
pub(crate) fn authorization(
    username: &str,
    password: &str,
    challenge: &Challenge,
    method: &Method,
    uri: &str,
    nonce_count: u32,
    cnonce: &str,
) -> Result<String, Error> {
    let algorithm = Algorithm::parse(&challenge.algorithm)?;
    let qop = challenge.resolve_qop()?;

    let h = |s: &str| algorithm.hash_hex(s.as_bytes());

    let nc = format!("{:08x}", nonce_count);

    let mut ha1 = h(&format!("{}:{}:{}", username, challenge.realm, password));
    if algorithm.is_sess() {
        ha1 = h(&format!("{}:{}:{}", ha1, challenge.nonce, cnonce));
    }

    let ha2 = h(&format!("{}:{}", method.as_str(), uri));

    let response = match qop {
        Some(qop) => h(&format!(
            "{}:{}:{}:{}:{}:{}",
            ha1, challenge.nonce, nc, cnonce, qop, ha2
        )),
        None => h(&format!("{}:{}:{}", ha1, challenge.nonce, ha2)),
    };

    let mut v = format!(
        "Digest username=\"{}\", realm=\"{}\", nonce=\"{}\", uri=\"{}\", response=\"{}\", algorithm={}",
        username, challenge.realm, challenge.nonce, uri, response, challenge.algorithm
    );

    if let Some(opaque) = &challenge.opaque {
        v.push_str(&format!(", opaque=\"{}\"", opaque));
    }

    if let Some(qop) = qop {
        v.push_str(&format!(", qop={}, nc={}, cnonce=\"{}\"", qop, nc, cnonce));
    }

    Ok(v)
}

/// Client nonce: unpredictable, not guaranteed unique.
fn default_cnonce(nonce_count: u32, nonce: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(nonce_count.to_string().as_bytes());
    hasher.update(nonce.as_bytes());
    hasher.update(httpdate::fmt_http_date(SystemTime::now()).as_bytes());
    hasher.update(rand::random::<[u8; 8]>());
    let mut s = hex::encode(hasher.finalize());
    s.truncate(16);
    s
}

impl DigestAuth {
    /// Create from username and password.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        DigestAuth {
            username: username.into(),
            password: password.into(),
            cache: Arc::new(Mutex::new(HashMap::new())),
            cnonce: Arc::new(default_cnonce),
        }
    }

    /// Replace the client nonce source.
    pub fn with_cnonce<F>(mut self, f: F) -> Self
    where
        F: Fn(u32, &str) -> String + Send + Sync + 'static,
    {
        self.cnonce = Arc::new(f);
        self
    }

    /// The challenge cached for `host`, if any.
    pub fn cached_challenge(&self, host: &str) -> Option<Challenge> {
        self.cache.lock().get(host).map(|c| c.challenge.clone())
    }

    pub(crate) fn flow(&self) -> DigestFlow {
        DigestFlow {
            auth: self.clone(),
            retried: false,
        }
    }

    /// Remember a new challenge. The nonce count restarts when the nonce changed.
    fn store(&self, host: &str, challenge: Challenge) {
        let mut cache = self.cache.lock();
        match cache.get_mut(host) {
            Some(c) if c.challenge.nonce == challenge.nonce => {
                c.challenge = challenge;
            }
            _ => {
                debug!("New digest nonce for {}", host);
                cache.insert(
                    host.to_string(),
                    Cached {
                        challenge,
                        nonce_count: 1,
                    },
                );
            }
        }
    }

    fn authorize(&self, request: &mut Request) -> Result<bool, Error> {
        let host = request.url().authority_str();

        // Take the count under the lock, compute outside it.
        let (challenge, nonce_count) = {
            let mut cache = self.cache.lock();
            let Some(c) = cache.get_mut(&host) else {
                return Ok(false);
            };
            let n = c.nonce_count;
            c.nonce_count = c.nonce_count.wrapping_add(1);
            (c.challenge.clone(), n)
        };

        let cnonce = (self.cnonce)(nonce_count, &challenge.nonce);
        let value = authorization(
            &self.username,
            &self.password,
            &challenge,
            request.method(),
            &request.url().raw_path(),
            nonce_count,
            &cnonce,
        )?;

        request.set_header(header::AUTHORIZATION, value)?;
        Ok(true)
    }
}

impl fmt::Debug for DigestAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DigestAuth")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

pub(crate) struct DigestFlow {
    auth: DigestAuth,
    retried: bool,
}

impl AuthFlow for DigestFlow {
    fn start(&mut self, request: &mut Request) -> Result<(), Error> {
        if self.auth.authorize(request)? {
            debug!("Digest pre-authenticated from cached challenge");
        }
        Ok(())
    }

    fn resume(&mut self, request: &mut Request, response: &Response) -> Result<AuthStep, Error> {
        if self.retried || response.status() != StatusCode::UNAUTHORIZED {
            return Ok(AuthStep::Done);
        }

        let found = response
            .headers()
            .all_str(&header::WWW_AUTHENTICATE)
            .into_iter()
            .find(|v| {
                v.get(..7)
                    .map(|p| p.eq_ignore_ascii_case("digest "))
                    .unwrap_or(false)
            });

        let Some(value) = found else {
            debug!("401 without digest challenge");
            return Ok(AuthStep::Done);
        };

        let challenge = Challenge::parse(value)?;
        let host = request.url().authority_str();
        self.auth.store(&host, challenge);

        self.auth.authorize(request)?;
        self.retried = true;

        Ok(AuthStep::SendRequest)
    }
}
