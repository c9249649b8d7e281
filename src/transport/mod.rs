//! Backend transports.
//!
//! Every component takes its transport through the constructor, so tests
//! swap in fakes:
//!
//! - [`Transport`]: JSON request/response over REST ([`http::HttpTransport`])
//! - [`ChannelFactory`]: push channel per session ([`ws::WsChannelFactory`])

pub mod http;
pub mod ws;

use serde_json::Value;

use crate::error::Result;

/// JSON-over-HTTP seam used by the session client, dashboard loader,
/// remediation flow and coverage browser.
pub trait Transport: Send + Sync {
    /// `GET path?query` and decode the JSON body.
    fn get_json(&self, path: &str, query: &[(&str, String)]) -> Result<Value>;

    /// `POST path` with an optional JSON body and decode the JSON reply.
    fn post_json(&self, path: &str, body: Option<&Value>) -> Result<Value>;
}

/// One read from a push channel.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// A text message.
    Text(String),
    /// Nothing arrived within the read timeout.
    Idle,
    /// The remote side closed the channel.
    Closed,
}

/// An open push channel. Reads block for at most a short timeout.
pub trait ProgressSource: Send {
    fn next_frame(&mut self) -> Result<Frame>;

    /// Close the underlying connection. Must tolerate repeated calls.
    fn close(&mut self);
}

/// Opens push channels for sessions.
pub trait ChannelFactory: Send + Sync {
    fn open(&self, session_id: &str) -> Result<Box<dyn ProgressSource>>;
}

/// `deserialize_with` helper: a JSON `null` decodes as the type's default.
/// The backend serializes absent lists as `null` rather than omitting them.
pub(crate) fn nullable<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: serde::Deserialize<'de> + Default,
{
    use serde::Deserialize;
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Decode a JSON reply into `T`. An empty body decodes as `T::default()`.
pub(crate) fn decode<T>(path: &str, value: Value) -> Result<T>
where
    T: serde::de::DeserializeOwned + Default,
{
    if value.is_null() {
        return Ok(T::default());
    }
    serde_json::from_value(value)
        .map_err(|e| crate::error::ClientError::protocol(format!("unexpected reply from {path}: {e}")))
}
