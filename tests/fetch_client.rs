//! Drives the real ureq transport against a local fake interpreter.

use std::{
    net::TcpListener,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Instant,
};

use city_buildings::{
    overpass::{FetchConfig, OverpassClient, PlaceQuery},
    types::FetchError,
};
use mockito::Matcher;
use serde_json::json;

const PATH: &str = "/api/interpreter";

fn config(endpoint_url: String) -> FetchConfig {
    FetchConfig {
        endpoint_url,
        timeout_seconds: 2.0,
        max_retries: 2,
        backoff_base_seconds: 0.05,
        deadline_seconds: 10.0,
        ..FetchConfig::default()
    }
}

fn bangkok() -> PlaceQuery {
    PlaceQuery::new("Bangkok").unwrap()
}

#[test]
fn test_success_relays_payload() {
    let mut server = mockito::Server::new();
    let mock = server
        .mock("POST", PATH)
        .match_body(Matcher::Regex(r#"area\["name"="Bangkok"\]->\.searchArea;"#.into()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"elements": []}"#)
        .expect(1)
        .create();

    let client = OverpassClient::new(config(format!("{}{PATH}", server.url())));
    let result = client.fetch(&bangkok());

    mock.assert();
    assert_eq!(result, Ok(json!({"elements": []})));
}

#[test]
fn test_not_found_is_not_retried() {
    let mut server = mockito::Server::new();
    let mock = server
        .mock("POST", PATH)
        .with_status(404)
        .with_body("<html><body><p>Error: no such endpoint</p></body></html>")
        .expect(1)
        .create();

    let client = OverpassClient::new(config(format!("{}{PATH}", server.url())));
    let result = client.fetch(&bangkok());

    mock.assert();
    assert_eq!(
        result,
        Err(FetchError::upstream(404, "Error: no such endpoint"))
    );
}

#[test]
fn test_unavailable_is_retried_until_exhausted() {
    let mut server = mockito::Server::new();
    let mock = server
        .mock("POST", PATH)
        .with_status(503)
        .with_header("Retry-After", "0")
        .with_body("Too busy")
        .expect(3)
        .create();

    let client = OverpassClient::new(config(format!("{}{PATH}", server.url())));
    let result = client.fetch(&bangkok());

    mock.assert();
    assert_eq!(result, Err(FetchError::upstream(503, "Too busy")));
}

#[test]
fn test_malformed_body_is_transport_error() {
    let mut server = mockito::Server::new();
    let mock = server
        .mock("POST", PATH)
        .with_status(200)
        .with_body("{\"elements\": [")
        .expect(1)
        .create();

    let client = OverpassClient::new(config(format!("{}{PATH}", server.url())));
    let result = client.fetch(&bangkok());

    mock.assert();
    assert_eq!(result, Err(FetchError::transport("malformed response body")));
}

#[test]
fn test_oversized_body_is_not_retried() {
    let mut server = mockito::Server::new();
    let mock = server
        .mock("POST", PATH)
        .with_status(200)
        .with_body(format!("{{\"elements\": [], \"pad\": \"{}\"}}", "x".repeat(4096)))
        .expect(1)
        .create();

    let client = OverpassClient::new(FetchConfig {
        max_body_bytes: 1024,
        ..config(format!("{}{PATH}", server.url()))
    });
    let result = client.fetch(&bangkok());

    mock.assert();
    assert!(matches!(result, Err(FetchError::Transport { .. })), "{result:?}");
}

#[test]
fn test_connection_refused_retries_with_backoff() {
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let config = config(format!("http://127.0.0.1:{port}{PATH}"));
    let backoffs = config.backoff(1) + config.backoff(2);

    let started = Instant::now();
    let result = OverpassClient::new(config).fetch(&bangkok());

    assert!(matches!(result, Err(FetchError::Transport { .. })), "{result:?}");
    assert!(started.elapsed() >= backoffs);
}

#[test]
fn test_silent_server_times_out_on_every_attempt() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    let connections = Arc::new(AtomicUsize::new(0));
    {
        let connections = connections.clone();
        // Accept and hold every connection without ever answering.
        std::thread::spawn(move || {
            let mut held = Vec::new();
            for stream in listener.incoming().flatten() {
                connections.fetch_add(1, Ordering::SeqCst);
                held.push(stream);
            }
        });
    }

    let config = FetchConfig {
        timeout_seconds: 0.2,
        ..config(format!("http://127.0.0.1:{port}{PATH}"))
    };
    let backoffs = config.backoff(1) + config.backoff(2);

    let started = Instant::now();
    let result = OverpassClient::new(config).fetch(&bangkok());

    assert!(matches!(result, Err(FetchError::Transport { .. })), "{result:?}");
    assert_eq!(connections.load(Ordering::SeqCst), 3);
    assert!(started.elapsed() >= backoffs);
}
