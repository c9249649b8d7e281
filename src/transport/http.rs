/// Blocking REST transport backed by `ureq`.
///
/// One agent is built per client and reused for every request, so
/// connections to the backend are pooled. Non-2xx statuses and transport
/// failures both surface as [`ClientError::Network`]; a body that isn't
/// JSON surfaces as [`ClientError::Protocol`].
use std::time::Duration;

use serde_json::Value;

use super::Transport;
use crate::config::BackendConfig;
use crate::error::{ClientError, Result};

#[derive(Debug, Clone)]
pub struct HttpTransport {
    base_url: String,
    agent: ureq::Agent,
}

impl HttpTransport {
    /// Build a transport from the resolved backend config.
    pub fn from_config(config: &BackendConfig) -> Self {
        Self::new(&config.base_url, Duration::from_millis(config.timeout_ms))
    }

    pub fn new(base_url: &str, timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            agent,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", pin_loopback(&self.base_url), path)
    }
}

/// Rewrite a `localhost` host to `127.0.0.1`. "localhost" may resolve to
/// ::1 first and stall when the backend only binds IPv4. Only the exact
/// host is touched; `localhost.corp` and friends pass through.
fn pin_loopback(base_url: &str) -> String {
    let Some((scheme, rest)) = base_url.split_once("://") else {
        return base_url.to_string();
    };
    let authority_end = rest.find(['/', '?', '#']).unwrap_or(rest.len());
    let (authority, tail) = rest.split_at(authority_end);
    let (userinfo, host_port) = match authority.rfind('@') {
        Some(at) => authority.split_at(at + 1),
        None => ("", authority),
    };
    let (host, port) = match host_port.find(':') {
        Some(colon) => host_port.split_at(colon),
        None => (host_port, ""),
    };

    if host.eq_ignore_ascii_case("localhost") {
        format!("{scheme}://{userinfo}127.0.0.1{port}{tail}")
    } else {
        base_url.to_string()
    }
}

impl Transport for HttpTransport {
    fn get_json(&self, path: &str, query: &[(&str, String)]) -> Result<Value> {
        tracing::debug!(path, "GET");
        let mut request = self.agent.get(&self.url(path));
        for (key, value) in query {
            request = request.query(key, value);
        }
        decode(path, request.call())
    }

    fn post_json(&self, path: &str, body: Option<&Value>) -> Result<Value> {
        tracing::debug!(path, "POST");
        let request = self
            .agent
            .post(&self.url(path))
            .set("Accept", "application/json");
        let response = match body {
            Some(body) => request.send_json(body),
            None => request.call(),
        };
        decode(path, response)
    }
}

fn decode(path: &str, response: std::result::Result<ureq::Response, ureq::Error>) -> Result<Value> {
    let response = response.map_err(|err| match err {
        ureq::Error::Status(code, resp) => {
            ClientError::network(path, format!("HTTP {code} {}", resp.status_text()))
        }
        ureq::Error::Transport(transport) => ClientError::network(path, transport.to_string()),
    })?;

    let text = response
        .into_string()
        .map_err(|e| ClientError::network(path, format!("failed reading body: {e}")))?;

    // Some acks come back with an empty body.
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(&text)
        .map_err(|e| ClientError::protocol(format!("invalid JSON from {path}: {e}")))
}
