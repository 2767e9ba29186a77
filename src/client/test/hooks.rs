use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use http::{Method, StatusCode};

use crate::body::Body;
use crate::client::Client;
use crate::client::test::scenario::Scenario;
use crate::request::Request;
use crate::response::Response;
use crate::transport::mock::MockTransport;
use crate::Error;

#[test]
fn request_hook_runs_per_leg() {
    let calls = Arc::new(AtomicUsize::new(0));

    let scenario = Scenario::builder()
        .redirect(302, "/b")
        .ok()
        .configure({
            let calls = calls.clone();
            move |b| {
                b.on_request(move |r: &mut Request| {
                    let n = calls.fetch_add(1, Ordering::SeqCst);
                    r.set_header("x-leg", n.to_string())
                })
            }
        })
        .build();

    scenario.client.get("https://q.test/a").send().unwrap();

    let seen = scenario.requests();
    assert_eq!(seen[0].headers.get("x-leg").unwrap(), "0");
    assert_eq!(seen[1].headers.get("x-leg").unwrap(), "1");
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[test]
fn request_hook_error_stops_before_transport() {
    let scenario = Scenario::builder()
        .ok()
        .configure(|b| b.on_request(|_: &mut Request| Err(Error::Hook("denied".into()))))
        .build();

    let err = scenario.client.get("https://q.test/").send().unwrap_err();

    assert_eq!(err, Error::Hook("denied".into()));
    assert_eq!(scenario.mock.count(), 0);
}

#[test]
fn response_hook_runs_after_cookie_sync() {
    let seen = Arc::new(AtomicBool::new(false));

    let scenario = Scenario::builder()
        .reply("HTTP/1.1 200 OK\r\nSet-Cookie: a=1\r\n\r\n")
        .configure({
            let seen = seen.clone();
            move |b| {
                b.on_response(move |r: &mut Response| {
                    assert_eq!(r.status(), StatusCode::OK);
                    assert_eq!(r.request().unwrap().url.as_str(), "https://q.test/");
                    seen.store(true, Ordering::SeqCst);
                    Ok(())
                })
            }
        })
        .build();

    scenario.client.get("https://q.test/").send().unwrap();

    assert!(seen.load(Ordering::SeqCst));
    assert_eq!(scenario.client.cookies().lock().get("a"), Some("1"));
}

#[test]
fn response_hook_error_closes_body() {
    let client = Client::builder(Arc::new(MockTransport::sequence([])))
        .on_response(|_: &mut Response| Err(Error::Hook("reject".into())))
        .build()
        .unwrap();

    let request = Request::parse(Method::GET, "https://q.test/").unwrap();
    let chunks = vec![Ok::<_, io::Error>(Bytes::from_static(b"unread"))];
    let mut response = Response::new(StatusCode::OK, request.url().clone())
        .with_body(Body::from_chunks(chunks));

    let err = client
        .shared
        .after_receive(Arc::new(request.head()), &mut response)
        .unwrap_err();

    assert_eq!(err, Error::Hook("reject".into()));
    assert!(response.body_mut().is_consumed());
}

#[test]
fn response_hook_error_fails_call() {
    let scenario = Scenario::builder()
        .redirect(302, "/b")
        .ok()
        .configure(|b| {
            b.on_response(|r: &mut Response| {
                if r.status().is_redirection() {
                    Err(Error::Hook("no redirects here".into()))
                } else {
                    Ok(())
                }
            })
        })
        .build();

    let err = scenario.client.get("https://q.test/a").send().unwrap_err();

    assert_eq!(err, Error::Hook("no redirects here".into()));
    assert_eq!(scenario.mock.count(), 1);
}
