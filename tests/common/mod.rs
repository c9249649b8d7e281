//! Fakes shared by the integration tests.
#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use serde_json::Value;

use coverdeck::error::{ClientError, Result};
use coverdeck::transport::{ChannelFactory, Frame, ProgressSource, Transport};

/// One request seen by [`FakeTransport`].
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub method: &'static str,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl Call {
    pub fn query(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Route-scripted transport. Each path replays its replies in order and
/// keeps repeating the last one. Unscripted paths fail with a 404.
#[derive(Default)]
pub struct FakeTransport {
    routes: Mutex<HashMap<String, VecDeque<Result<Value>>>>,
    calls: Mutex<Vec<Call>>,
}

impl FakeTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn on(&self, path: &str, reply: Value) -> &Self {
        self.script(path, Ok(reply))
    }

    pub fn fail(&self, path: &str, err: ClientError) -> &Self {
        self.script(path, Err(err))
    }

    fn script(&self, path: &str, reply: Result<Value>) -> &Self {
        self.routes
            .lock()
            .unwrap()
            .entry(path.to_string())
            .or_default()
            .push_back(reply);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_to(&self, path: &str) -> Vec<Call> {
        self.calls().into_iter().filter(|c| c.path == path).collect()
    }

    pub fn paths(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.path).collect()
    }

    fn reply(&self, call: Call) -> Result<Value> {
        let path = call.path.clone();
        self.calls.lock().unwrap().push(call);

        let mut routes = self.routes.lock().unwrap();
        let Some(queue) = routes.get_mut(&path) else {
            return Err(ClientError::network(&path, "HTTP 404 Not Found"));
        };
        match queue.len() {
            0 => Err(ClientError::network(&path, "HTTP 404 Not Found")),
            1 => queue[0].clone(),
            _ => queue.pop_front().unwrap_or(Ok(Value::Null)),
        }
    }
}

impl Transport for FakeTransport {
    fn get_json(&self, path: &str, query: &[(&str, String)]) -> Result<Value> {
        self.reply(Call {
            method: "GET",
            path: path.to_string(),
            query: query
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
            body: None,
        })
    }

    fn post_json(&self, path: &str, body: Option<&Value>) -> Result<Value> {
        self.reply(Call {
            method: "POST",
            path: path.to_string(),
            query: Vec::new(),
            body: body.cloned(),
        })
    }
}

/// Push channel that plays back scripted frames, then idles.
pub struct ScriptedSource {
    frames: VecDeque<Result<Frame>>,
    closed: Arc<Mutex<bool>>,
}

impl ProgressSource for ScriptedSource {
    fn next_frame(&mut self) -> Result<Frame> {
        match self.frames.pop_front() {
            Some(frame) => frame,
            None => {
                thread::sleep(Duration::from_millis(2));
                Ok(Frame::Idle)
            }
        }
    }

    fn close(&mut self) {
        *self.closed.lock().unwrap() = true;
    }
}

/// Hands out one [`ScriptedSource`], or refuses to connect.
pub struct FakeChannelFactory {
    frames: Mutex<Option<Vec<Result<Frame>>>>,
    refuse: bool,
    closed: Arc<Mutex<bool>>,
}

impl FakeChannelFactory {
    pub fn with_frames(frames: Vec<Result<Frame>>) -> Arc<Self> {
        Arc::new(Self {
            frames: Mutex::new(Some(frames)),
            refuse: false,
            closed: Arc::new(Mutex::new(false)),
        })
    }

    pub fn refusing() -> Arc<Self> {
        Arc::new(Self {
            frames: Mutex::new(None),
            refuse: true,
            closed: Arc::new(Mutex::new(false)),
        })
    }

    /// Whether the handed-out source was closed.
    pub fn source_closed(&self) -> bool {
        *self.closed.lock().unwrap()
    }
}

impl ChannelFactory for FakeChannelFactory {
    fn open(&self, session_id: &str) -> Result<Box<dyn ProgressSource>> {
        if self.refuse {
            return Err(ClientError::network(
                &format!("/ws/coverage-progress/{session_id}"),
                "connection refused",
            ));
        }
        let frames = self.frames.lock().unwrap().take().unwrap_or_default();
        Ok(Box::new(ScriptedSource {
            frames: frames.into(),
            closed: Arc::clone(&self.closed),
        }))
    }
}

/// A progress frame as the backend sends it.
pub fn progress_frame(session_id: &str, progress: f64, step: &str) -> Result<Frame> {
    Ok(Frame::Text(
        serde_json::json!({
            "sessionId": session_id,
            "progress": progress,
            "currentStep": step,
        })
        .to_string(),
    ))
}
