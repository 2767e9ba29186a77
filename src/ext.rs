use http::header::HeaderName;
use http::{HeaderMap, Method, StatusCode};
use url::Url;

pub(crate) trait MethodExt {
    fn is_get_or_head(&self) -> bool;
}

impl MethodExt for Method {
    fn is_get_or_head(&self) -> bool {
        self == Method::GET || self == Method::HEAD
    }
}

pub(crate) trait StatusExt {
    /// The statuses we follow when there is a `Location` header.
    fn is_followable_redirect(&self) -> bool;

    /// 307 and 308 keep both method and body.
    fn is_redirect_retaining_method(&self) -> bool;
}

impl StatusExt for StatusCode {
    fn is_followable_redirect(&self) -> bool {
        matches!(
            *self,
            StatusCode::MOVED_PERMANENTLY
                | StatusCode::FOUND
                | StatusCode::SEE_OTHER
                | StatusCode::TEMPORARY_REDIRECT
                | StatusCode::PERMANENT_REDIRECT
        )
    }

    fn is_redirect_retaining_method(&self) -> bool {
        *self == StatusCode::TEMPORARY_REDIRECT || *self == StatusCode::PERMANENT_REDIRECT
    }
}

pub(crate) trait HeaderMapExt {
    /// All values for `name` that are valid strings, in header order.
    fn all_str<'a>(&'a self, name: &HeaderName) -> Vec<&'a str>;

    /// First value for `name` as a string.
    fn first_str(&self, name: &HeaderName) -> Option<&str>;
}

impl HeaderMapExt for HeaderMap {
    fn all_str<'a>(&'a self, name: &HeaderName) -> Vec<&'a str> {
        self.get_all(name)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .collect()
    }

    fn first_str(&self, name: &HeaderName) -> Option<&str> {
        self.get(name).and_then(|v| v.to_str().ok())
    }
}

pub(crate) trait UrlExt {
    /// `host[:port]`, port only when explicit and not the scheme default.
    fn authority_str(&self) -> String;

    /// Path plus `?query`. This is what goes on the request line.
    fn raw_path(&self) -> String;

    /// Host compared case-insensitively.
    fn same_host(&self, other: &Url) -> bool;
}

impl UrlExt for Url {
    fn authority_str(&self) -> String {
        let host = self.host_str().unwrap_or_default();
        match self.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        }
    }

    fn raw_path(&self) -> String {
        match self.query() {
            Some(q) => format!("{}?{}", self.path(), q),
            None => self.path().to_string(),
        }
    }

    fn same_host(&self, other: &Url) -> bool {
        match (self.host_str(), other.host_str()) {
            (Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
            _ => false,
        }
    }
}
