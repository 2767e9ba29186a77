//! Client scoped cookie jar.
//!
//! The jar is a plain `name -> value` map with an optional expiry per entry.
//! After every exchange the response's `Set-Cookie` headers are synced into the
//! jar, and before every exchange the jar is rendered into a `Cookie` header.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use http::{header, HeaderMap};
use parking_lot::Mutex;

use crate::ext::HeaderMapExt;

/// Jar handle shared by a client and all its in-flight calls.
///
/// Every read or write locks the jar on its own. Two concurrent calls on the
/// same client may interleave their syncs; there is no call-level atomicity.
pub type SharedJar = Arc<Mutex<CookieJar>>;

/// One jar entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cookie {
    /// Cookie value.
    pub value: String,
    /// When the cookie stops being sent.
    pub expires: Option<SystemTime>,
}

/// Cookie storage keyed by cookie name.
#[derive(Debug, Clone, Default)]
pub struct CookieJar {
    entries: BTreeMap<String, Cookie>,
}

impl CookieJar {
    /// Empty jar.
    pub fn new() -> Self {
        CookieJar::default()
    }

    /// Insert or replace a cookie without expiry.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(
            name.into(),
            Cookie {
                value: value.into(),
                expires: None,
            },
        );
    }

    /// Value of a live cookie.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.get_at(name, SystemTime::now())
    }

    fn get_at(&self, name: &str, now: SystemTime) -> Option<&str> {
        self.entries
            .get(name)
            .filter(|c| is_live(c, now))
            .map(|c| c.value.as_str())
    }

    /// Remove a cookie.
    pub fn remove(&mut self, name: &str) -> Option<Cookie> {
        self.entries.remove(name)
    }

    /// Number of entries, including ones that have expired but not been purged.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Tell if the jar has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Remove everything.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Render live cookies as a `Cookie` header value.
    ///
    /// `None` when there is nothing to send.
    pub fn header_value(&self) -> Option<String> {
        self.header_value_at(SystemTime::now())
    }

    fn header_value_at(&self, now: SystemTime) -> Option<String> {
        let pairs: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, c)| is_live(c, now))
            .map(|(k, c)| format!("{}={}", k, c.value))
            .collect();

        if pairs.is_empty() {
            None
        } else {
            Some(pairs.join("; "))
        }
    }

    /// Sync `Set-Cookie` headers of a response into the jar.
    ///
    /// A cookie with an `Expires` in the past (or `Max-Age` <= 0) deletes the
    /// entry. Malformed expiry attributes are ignored and the cookie is kept.
    pub fn extract(&mut self, headers: &HeaderMap) {
        self.extract_at(headers, SystemTime::now())
    }

    pub(crate) fn extract_at(&mut self, headers: &HeaderMap, now: SystemTime) {
        for set_cookie in headers.all_str(&header::SET_COOKIE) {
            let Some(parsed) = parse_set_cookie(set_cookie, now) else {
                debug!("Ignore malformed set-cookie");
                continue;
            };

            match parsed.expires {
                Some(at) if at <= now => {
                    trace!("Cookie expired, delete: {}", parsed.name);
                    self.entries.remove(&parsed.name);
                }
                expires => {
                    trace!("Cookie set: {}", parsed.name);
                    self.entries.insert(
                        parsed.name,
                        Cookie {
                            value: parsed.value,
                            expires,
                        },
                    );
                }
            }
        }
    }
}

fn is_live(c: &Cookie, now: SystemTime) -> bool {
    match c.expires {
        Some(at) => at > now,
        None => true,
    }
}

struct SetCookie {
    name: String,
    value: String,
    expires: Option<SystemTime>,
}

fn parse_set_cookie(s: &str, now: SystemTime) -> Option<SetCookie> {
    let mut segments = s.split(';');

    let first = segments.next()?;
    let (name, value) = first.split_once('=')?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    let value = value.trim().trim_matches('"');

    let mut expires = None;
    let mut max_age = None;

    for attr in segments {
        let (key, val) = match attr.split_once('=') {
            Some((k, v)) => (k.trim(), v.trim()),
            None => (attr.trim(), ""),
        };

        if key.eq_ignore_ascii_case("expires") {
            match httpdate::parse_http_date(val) {
                Ok(at) => expires = Some(at),
                Err(_) => trace!("Ignore malformed expires on cookie {}", name),
            }
        } else if key.eq_ignore_ascii_case("max-age") {
            match val.parse::<i64>() {
                Ok(secs) => max_age = Some(secs),
                Err(_) => trace!("Ignore malformed max-age on cookie {}", name),
            }
        }
    }

    // Max-Age wins over Expires (RFC 6265 5.3.3)
    if let Some(secs) = max_age {
        if secs <= 0 {
            expires = Some(SystemTime::UNIX_EPOCH);
        } else {
            // Beyond what SystemTime can hold: keep the cookie without expiry.
            expires = now.checked_add(Duration::from_secs(secs as u64));
            if expires.is_none() {
                trace!("Max-Age out of range on cookie {}", name);
            }
        }
    }

    Some(SetCookie {
        name: name.to_string(),
        value: value.to_string(),
        expires,
    })
}
