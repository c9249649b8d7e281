/// Push channel for a session's progress frames.
///
/// A reader thread pulls frames from a [`ProgressSource`] and hands each
/// decoded [`ProgressUpdate`] to one callback, in the order the socket
/// delivered them. Malformed frames are logged and skipped. A transport
/// error is delivered once and ends the channel. Nothing reconnects.
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};

use super::ProgressUpdate;
use crate::error::{ClientError, Result};
use crate::transport::{ChannelFactory, Frame, ProgressSource};

/// What the reader thread reports.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    Progress(ProgressUpdate),
    Error(ClientError),
    /// The server closed the channel.
    Closed,
}

/// Handle to an open channel. Closing is idempotent and happens on drop.
#[derive(Debug)]
pub struct ProgressChannel {
    session_id: String,
    stop: Arc<AtomicBool>,
    reader: Option<JoinHandle<()>>,
}

impl ProgressChannel {
    /// Connect and start delivering events to `on_event`. Connection
    /// failures come back synchronously so the caller can fall back.
    pub fn open<C>(factory: &dyn ChannelFactory, session_id: &str, on_event: C) -> Result<Self>
    where
        C: FnMut(ChannelEvent) + Send + 'static,
    {
        let source = factory.open(session_id)?;
        let stop = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop);
        let id = session_id.to_string();

        let reader = thread::Builder::new()
            .name(format!("progress-{session_id}"))
            .spawn(move || read_loop(source, &id, &flag, on_event))
            .map_err(|e| ClientError::network(session_id, format!("failed to spawn reader: {e}")))?;

        tracing::debug!(session_id, "progress channel open");
        Ok(Self {
            session_id: session_id.to_string(),
            stop,
            reader: Some(reader),
        })
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Whether the reader is still delivering frames.
    pub fn is_open(&self) -> bool {
        !self.stop.load(Ordering::SeqCst)
            && self.reader.as_ref().is_some_and(|r| !r.is_finished())
    }

    /// Stop the reader and close the socket. No events are delivered after
    /// this returns.
    pub fn close(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(reader) = self.reader.take() {
            // Closing from inside the callback must not join the reader itself.
            if reader.thread().id() != thread::current().id() {
                let _ = reader.join();
            }
            tracing::debug!(session_id = %self.session_id, "progress channel closed");
        }
    }
}

impl Drop for ProgressChannel {
    fn drop(&mut self) {
        self.close();
    }
}

fn read_loop<C>(mut source: Box<dyn ProgressSource>, session_id: &str, stop: &AtomicBool, mut on_event: C)
where
    C: FnMut(ChannelEvent),
{
    while !stop.load(Ordering::SeqCst) {
        match source.next_frame() {
            Ok(Frame::Text(raw)) => match ProgressUpdate::parse(&raw) {
                Ok(update) => {
                    if stop.load(Ordering::SeqCst) {
                        break;
                    }
                    on_event(ChannelEvent::Progress(update));
                }
                Err(err) => {
                    tracing::warn!(session_id, "skipping malformed progress frame: {err}");
                }
            },
            Ok(Frame::Idle) => {}
            Ok(Frame::Closed) => {
                if !stop.load(Ordering::SeqCst) {
                    on_event(ChannelEvent::Closed);
                }
                break;
            }
            Err(err) => {
                tracing::error!(session_id, "progress channel failed: {err}");
                if !stop.load(Ordering::SeqCst) {
                    on_event(ChannelEvent::Error(err));
                }
                break;
            }
        }
    }
    source.close();
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
