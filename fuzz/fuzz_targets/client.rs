#![no_main]

use std::sync::Arc;

use libfuzzer_sys::fuzz_target;
use ureq_relay::transport::mock::{MockTransport, Reply};
use ureq_relay::{Auth, Client};

// Statuses that drive the redirect and auth logic.
const STATUSES: &[u16] = &[200, 204, 301, 302, 303, 307, 308, 401, 404, 500];

const LOCATIONS: &[&str] = &[
    "/next",
    "next",
    "../up",
    "?q=1",
    "//other.test/x",
    "https://other.test/y",
    "http://q.test/downgrade",
    "ftp://q.test/file",
    "https:///no-host",
    "https://bücher.test/",
    "",
];

const CHALLENGES: &[&str] = &[
    "Digest realm=\"r\", nonce=\"n\"",
    "Digest realm=\"r\", nonce=\"n\", qop=\"auth\", algorithm=SHA-256",
    "Digest realm=\"r\", nonce=\"n\", qop=\"auth-int\"",
    "Digest realm=\"r\", nonce=\"n\", algorithm=UNKNOWN",
    "Digest realm=\"unterminated, nonce=\"n\"",
    "Basic realm=\"r\"",
];

fuzz_target!(|data: &[u8]| {
    let mut replies = Vec::new();

    for chunk in data.chunks(4).take(32) {
        let status = STATUSES[chunk[0] as usize % STATUSES.len()];

        let mut raw = format!("HTTP/1.1 {} Fuzz\r\n", status);

        if let Some(b) = chunk.get(1) {
            raw.push_str(&format!(
                "Location: {}\r\n",
                LOCATIONS[*b as usize % LOCATIONS.len()]
            ));
        }
        if let Some(b) = chunk.get(2) {
            raw.push_str(&format!(
                "WWW-Authenticate: {}\r\n",
                CHALLENGES[*b as usize % CHALLENGES.len()]
            ));
        }
        if let Some(b) = chunk.get(3) {
            raw.push_str(&format!("Set-Cookie: c{}={}; Max-Age={}\r\n", b % 4, b, b % 3));
        }

        raw.push_str("\r\n");
        replies.push(Reply::raw(raw));
    }

    let mock = Arc::new(MockTransport::sequence(replies));

    let Ok(client) = Client::builder(mock)
        .trust_env(false)
        .max_redirects(8)
        .build()
    else {
        return;
    };

    let follow = data.first().map(|b| b & 1 == 0).unwrap_or(true);

    let _ = client
        .post("https://q.test/start")
        .body("payload")
        .auth(Auth::digest("user", "pass"))
        .follow_redirects(follow)
        .send();
});
