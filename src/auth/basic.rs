use std::fmt;

use base64::prelude::BASE64_STANDARD;
use base64::Engine;
use http::header;

use crate::request::Request;
use crate::Error;

/// Username and password sent as `Authorization: Basic`.
#[derive(Clone, PartialEq, Eq)]
pub struct BasicAuth {
    username: String,
    password: String,
}

impl BasicAuth {
    /// Create from username and password.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        BasicAuth {
            username: username.into(),
            password: password.into(),
        }
    }

    /// The `Authorization` header value.
    pub fn header_value(&self) -> String {
        basic_header(&self.username, &self.password)
    }

    pub(crate) fn apply(&self, request: &mut Request) -> Result<(), Error> {
        request.set_header(header::AUTHORIZATION, self.header_value())
    }
}

pub(crate) fn basic_header(username: &str, password: &str) -> String {
    let creds = BASE64_STANDARD.encode(format!("{}:{}", username, password));
    format!("Basic {}", creds)
}

impl fmt::Debug for BasicAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BasicAuth")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}
