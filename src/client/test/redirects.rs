use std::io;

use bytes::Bytes;
use http::{header, Method, StatusCode};

use crate::auth::Auth;
use crate::body::Body;
use crate::client::test::scenario::Scenario;
use crate::Error;

#[test]
fn follow_relative_location() {
    let scenario = Scenario::builder().redirect(302, "/b?x=1").ok().build();

    let res = scenario.client.get("https://q.test/a").send().unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.url().as_str(), "https://q.test/b?x=1");
    assert_eq!(res.history().len(), 1);
    assert_eq!(res.history()[0].status(), StatusCode::FOUND);
    assert_eq!(res.history()[0].url().as_str(), "https://q.test/a");

    let head = res.request().unwrap();
    assert_eq!(head.url.as_str(), "https://q.test/b?x=1");
}

#[test]
fn post_301_becomes_get_without_body() {
    let scenario = Scenario::builder().redirect(301, "/done").ok().build();

    scenario
        .client
        .post("https://q.test/form")
        .header("content-length", "4")
        .body("data")
        .send()
        .unwrap();

    let second = scenario.request(1);
    assert_eq!(second.method, Method::GET);
    assert!(second.body.is_empty());
    assert!(second.headers.get(header::CONTENT_LENGTH).is_none());
}

#[test]
fn head_302_stays_head() {
    let scenario = Scenario::builder().redirect(302, "/b").ok().build();

    scenario.client.head("https://q.test/a").send().unwrap();

    assert_eq!(scenario.request(1).method, Method::HEAD);
}

#[test]
fn post_307_resends_identical_body() {
    let scenario = Scenario::builder().redirect(307, "/v2/upload").ok().build();

    scenario
        .client
        .post("https://q.test/upload")
        .body("abc")
        .send()
        .unwrap();

    let seen = scenario.requests();
    assert_eq!(seen[1].method, Method::POST);
    assert_eq!(seen[0].body, "abc");
    assert_eq!(seen[1].body, "abc");
}

#[test]
fn streamed_body_is_not_resent() {
    let scenario = Scenario::builder().redirect(308, "/v2/upload").ok().build();

    let chunks = vec![
        Ok::<_, io::Error>(Bytes::from_static(b"ab")),
        Ok(Bytes::from_static(b"c")),
    ];

    let err = scenario
        .client
        .post("https://q.test/upload")
        .body(Body::from_chunks(chunks))
        .send()
        .unwrap_err();

    assert_eq!(err, Error::StreamConsumed);

    // The stream went out once, never a second time.
    assert_eq!(scenario.mock.count(), 1);
    assert_eq!(scenario.request(0).body, "abc");
}

#[test]
fn too_many_redirects() {
    let mut builder = Scenario::builder();
    for i in 0..21 {
        builder = builder.redirect(302, &format!("/r{}", i + 1));
    }
    let scenario = builder.build();

    let err = scenario.client.get("https://q.test/r0").send().unwrap_err();

    match err {
        Error::TooManyRedirects { url, history } => {
            assert_eq!(history, 20);
            assert_eq!(url.as_str(), "https://q.test/r20");
        }
        e => panic!("unexpected error: {:?}", e),
    }

    assert_eq!(scenario.mock.count(), 21);
}

#[test]
fn max_redirects_is_configurable() {
    let scenario = Scenario::builder()
        .redirect(302, "/1")
        .redirect(302, "/2")
        .configure(|b| b.max_redirects(1))
        .build();

    let err = scenario.client.get("https://q.test/").send().unwrap_err();

    assert!(matches!(err, Error::TooManyRedirects { history: 1, .. }));
}

#[test]
fn authorization_dropped_across_hosts() {
    let scenario = Scenario::builder()
        .redirect(302, "https://other.test/b")
        .redirect(302, "https://q.test/c")
        .ok()
        .build();

    scenario
        .client
        .get("https://q.test/a")
        .auth(Auth::basic("user", "pass"))
        .send()
        .unwrap();

    let seen = scenario.requests();
    assert!(seen[0].headers.contains_key(header::AUTHORIZATION));
    assert!(!seen[1].headers.contains_key(header::AUTHORIZATION));
    assert!(!seen[2].headers.contains_key(header::AUTHORIZATION));
}

#[test]
fn authorization_kept_on_same_host() {
    let scenario = Scenario::builder().redirect(302, "/b").ok().build();

    scenario
        .client
        .get("https://q.test/a")
        .auth(Auth::basic("user", "pass"))
        .send()
        .unwrap();

    assert!(scenario
        .request(1)
        .headers
        .contains_key(header::AUTHORIZATION));
}

#[test]
fn https_to_http_drops_authorization() {
    let scenario = Scenario::builder()
        .redirect(302, "http://q.test/b")
        .ok()
        .build();

    scenario
        .client
        .get("https://q.test/a")
        .auth(Auth::basic("user", "pass"))
        .send()
        .unwrap();

    assert!(!scenario
        .request(1)
        .headers
        .contains_key(header::AUTHORIZATION));
}

#[test]
fn unsupported_location_scheme() {
    let scenario = Scenario::builder()
        .redirect(302, "ftp://q.test/file")
        .build();

    let err = scenario.client.get("https://q.test/").send().unwrap_err();

    assert!(matches!(err, Error::UnsupportedProtocol(_)));
    assert_eq!(scenario.mock.count(), 1);
}

#[test]
fn fragment_carries_over() {
    let scenario = Scenario::builder().redirect(302, "/b").ok().build();

    let res = scenario.client.get("https://q.test/a#frag").send().unwrap();

    assert_eq!(res.url().fragment(), Some("frag"));
}

#[test]
fn disabled_redirect_offers_next_request() {
    let scenario = Scenario::builder()
        .redirect(303, "/other")
        .ok()
        .configure(|b| b.follow_redirects(false))
        .build();

    let mut res = scenario
        .client
        .post("https://q.test/a")
        .body("x")
        .send()
        .unwrap();

    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    assert!(res.history().is_empty());
    assert_eq!(scenario.mock.count(), 1);

    let next = res.take_next_request().unwrap();
    assert_eq!(next.method(), Method::GET);
    assert_eq!(next.url().as_str(), "https://q.test/other");

    // Follow by hand.
    let res = scenario.client.send(next).unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(scenario.request(1).method, Method::GET);
}

#[test]
fn per_call_follow_overrides_client() {
    let scenario = Scenario::builder().redirect(302, "/b").build();

    let res = scenario
        .client
        .get("https://q.test/a")
        .follow_redirects(false)
        .send()
        .unwrap();

    assert_eq!(res.status(), StatusCode::FOUND);
    assert!(res.next_request().is_some());
}

#[test]
fn non_redirect_has_no_next_request() {
    let scenario = Scenario::builder()
        .ok()
        .configure(|b| b.follow_redirects(false))
        .build();

    let res = scenario.client.get("https://q.test/").send().unwrap();

    assert!(res.next_request().is_none());
}

#[test]
fn auth_then_redirect_history_order() {
    let scenario = Scenario::builder()
        .reply(
            "HTTP/1.1 401 Unauthorized\r\n\
             WWW-Authenticate: Digest realm=\"r\", nonce=\"n\"\r\n\
             \r\n",
        )
        .redirect(302, "/b")
        .ok()
        .build();

    let res = scenario
        .client
        .get("https://q.test/a")
        .auth(Auth::digest("user", "pass"))
        .send()
        .unwrap();

    let statuses: Vec<u16> = res.history().iter().map(|r| r.status().as_u16()).collect();
    assert_eq!(statuses, vec![401, 302]);
}

#[test]
fn auth_round_counts_towards_redirect_cap() {
    let mut builder = Scenario::builder().reply(
        "HTTP/1.1 401 Unauthorized\r\n\
         WWW-Authenticate: Digest realm=\"r\", nonce=\"n\"\r\n\
         \r\n",
    );
    for i in 0..20 {
        builder = builder.redirect(302, &format!("/r{}", i + 1));
    }
    let scenario = builder.ok().build();

    let err = scenario
        .client
        .get("https://q.test/r0")
        .auth(Auth::digest("user", "pass"))
        .send()
        .unwrap_err();

    match err {
        Error::TooManyRedirects { url, history } => {
            assert_eq!(history, 20);
            assert_eq!(url.as_str(), "https://q.test/r19");
        }
        e => panic!("unexpected error: {:?}", e),
    }

    // the final 200 is never requested
    assert_eq!(scenario.mock.count(), 21);
}
