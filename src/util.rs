use std::fmt;

use http::{header, HeaderMap};

/// Split a comma separated header list, keeping commas inside quoted strings.
///
/// Backslash escapes inside quotes are kept verbatim. Returns `None` when a
/// quoted string is not terminated.
pub(crate) fn split_quoted_list(s: &str) -> Option<Vec<String>> {
    let mut items = Vec::new();
    let mut cur = String::new();
    let mut in_quote = false;
    let mut escape = false;

    for c in s.chars() {
        if escape {
            cur.push(c);
            escape = false;
            continue;
        }

        match c {
            '\\' if in_quote => {
                cur.push(c);
                escape = true;
            }
            '"' => {
                cur.push(c);
                in_quote = !in_quote;
            }
            ',' if !in_quote => {
                let item = cur.trim();
                if !item.is_empty() {
                    items.push(item.to_string());
                }
                cur.clear();
            }
            _ => cur.push(c),
        }
    }

    if in_quote {
        return None;
    }

    let item = cur.trim();
    if !item.is_empty() {
        items.push(item.to_string());
    }

    Some(items)
}

/// Remove surrounding quotes and backslash escapes.
pub(crate) fn unquote(s: &str) -> String {
    let s = s.trim();
    if s.len() >= 2 && s.starts_with('"') && s.ends_with('"') {
        let inner = &s[1..s.len() - 1];
        let mut out = String::with_capacity(inner.len());
        let mut escape = false;
        for c in inner.chars() {
            if escape {
                out.push(c);
                escape = false;
            } else if c == '\\' {
                escape = true;
            } else {
                out.push(c);
            }
        }
        out
    } else {
        s.to_string()
    }
}

/// Debug view of headers that never prints credentials.
pub(crate) struct Redacted<'a>(pub &'a HeaderMap);

impl fmt::Debug for Redacted<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut m = f.debug_map();
        for (k, v) in self.0 {
            let secret = k == header::AUTHORIZATION
                || k == header::PROXY_AUTHORIZATION
                || k == header::COOKIE;
            if secret {
                m.entry(k, &"***");
            } else {
                m.entry(k, v);
            }
        }
        m.finish()
    }
}
