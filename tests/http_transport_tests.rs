//! `HttpTransport` against a loopback `tiny_http` server.
use std::io::Read;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use serde_json::json;
use tiny_http::{Header, Response, Server};

use coverdeck::error::ClientError;
use coverdeck::transport::Transport;
use coverdeck::transport::http::HttpTransport;

/// What the server saw for one request.
#[derive(Debug)]
struct Seen {
    method: String,
    url: String,
    body: String,
}

/// Serve the given `(status, body)` replies in order, one per request.
fn serve(replies: Vec<(u16, &'static str)>) -> (HttpTransport, JoinHandle<Vec<Seen>>) {
    let server = Server::http("127.0.0.1:0").expect("bind loopback server");
    let addr = server.server_addr().to_ip().expect("ip listener");
    let base = format!("http://{addr}");

    let handle = thread::spawn(move || {
        let mut seen = Vec::new();
        for (status, body) in replies {
            let mut request = server.recv().expect("request");
            let mut content = String::new();
            let _ = request.as_reader().read_to_string(&mut content);
            seen.push(Seen {
                method: request.method().to_string(),
                url: request.url().to_string(),
                body: content,
            });
            let header = Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..])
                .expect("static header");
            let response = Response::from_string(body)
                .with_status_code(status)
                .with_header(header);
            let _ = request.respond(response);
        }
        seen
    });

    (HttpTransport::new(&base, Duration::from_secs(5)), handle)
}

#[test]
fn get_sends_query_and_decodes_json() {
    let (transport, server) = serve(vec![(200, r#"[{"path":"src","type":"DIR"}]"#)]);

    let value = transport
        .get_json("/coverage-dashboard/children", &[("parentPath", "src".to_string())])
        .unwrap();
    assert_eq!(value, json!([{"path": "src", "type": "DIR"}]));

    let seen = server.join().unwrap();
    assert_eq!(seen[0].method, "GET");
    assert_eq!(seen[0].url, "/coverage-dashboard/children?parentPath=src");
}

#[test]
fn post_sends_json_body() {
    let (transport, server) = serve(vec![(200, r#"{"sessionId":"s1"}"#)]);

    let body = json!({"filePath": "src/Cart.java"});
    let value = transport
        .post_json("/api/coverage/file/improve-async", Some(&body))
        .unwrap();
    assert_eq!(value["sessionId"], "s1");

    let seen = server.join().unwrap();
    assert_eq!(seen[0].method, "POST");
    let sent: serde_json::Value = serde_json::from_str(&seen[0].body).unwrap();
    assert_eq!(sent, body);
}

#[test]
fn empty_body_decodes_as_null() {
    let (transport, server) = serve(vec![(200, "")]);
    let value = transport.post_json("/api/coverage/session/s1/cancel", None).unwrap();
    assert!(value.is_null());
    server.join().unwrap();
}

#[test]
fn error_status_is_a_network_error() {
    let (transport, server) = serve(vec![(500, r#"{"error":"boom"}"#)]);
    match transport.get_json("/api/repository/1/dashboard/summary", &[]) {
        Err(ClientError::Network { path, reason }) => {
            assert_eq!(path, "/api/repository/1/dashboard/summary");
            assert!(reason.contains("500"));
        }
        other => panic!("expected a network error, got {other:?}"),
    }
    server.join().unwrap();
}

#[test]
fn malformed_json_is_a_protocol_error() {
    let (transport, server) = serve(vec![(200, "<html>oops</html>")]);
    assert!(matches!(
        transport.get_json("/sonar/issue/fix-status/op", &[]),
        Err(ClientError::Protocol(_))
    ));
    server.join().unwrap();
}

#[test]
fn unreachable_backend_is_a_network_error() {
    // Bind, then drop, to get a port nobody listens on.
    let port = {
        let server = Server::http("127.0.0.1:0").unwrap();
        server.server_addr().to_ip().unwrap().port()
    };
    let transport = HttpTransport::new(&format!("http://127.0.0.1:{port}"), Duration::from_secs(2));
    assert!(matches!(
        transport.get_json("/coverage-dashboard/children", &[]),
        Err(ClientError::Network { .. })
    ));
}
