//! Background interval worker.
//!
//! Runs a callback every `period` on its own thread until the callback
//! asks to stop or the handle is stopped/dropped. The next wait only starts
//! after the callback returns, so ticks never overlap.

use std::ops::ControlFlow;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Sender, bounded, select};

use crate::error::{ClientError, Result};

/// Handle to a running interval. Stopping is idempotent.
#[derive(Debug)]
pub struct IntervalHandle {
    stop_tx: Option<Sender<()>>,
    worker: Option<JoinHandle<()>>,
}

impl IntervalHandle {
    /// Spawn an interval worker. The first tick fires after one `period`.
    /// Failing to start the thread is a [`ClientError::Network`] naming it.
    pub fn spawn<F>(name: &str, period: Duration, mut on_tick: F) -> Result<Self>
    where
        F: FnMut() -> ControlFlow<()> + Send + 'static,
    {
        let (stop_tx, stop_rx) = bounded::<()>(1);
        let worker = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                loop {
                    select! {
                        // Either an explicit stop or the handle being dropped.
                        recv(stop_rx) -> _ => break,
                        default(period) => {
                            if on_tick().is_break() {
                                break;
                            }
                        }
                    }
                }
            })
            .map_err(|err| spawn_failed(name, &err))?;

        Ok(Self {
            stop_tx: Some(stop_tx),
            worker: Some(worker),
        })
    }

    /// Whether the worker is still scheduling ticks.
    pub fn is_running(&self) -> bool {
        self.worker.as_ref().is_some_and(|w| !w.is_finished())
    }

    /// Cancel the interval and wait for an in-progress tick to finish.
    pub fn stop(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.try_send(());
        }
        if let Some(worker) = self.worker.take() {
            // A tick callback that drops its own handle must not join itself.
            if worker.thread().id() != thread::current().id() {
                let _ = worker.join();
            }
        }
    }
}

fn spawn_failed(name: &str, err: &std::io::Error) -> ClientError {
    tracing::error!("failed to spawn interval thread '{name}': {err}");
    ClientError::network(name, format!("failed to spawn interval thread: {err}"))
}

impl Drop for IntervalHandle {
    fn drop(&mut self) {
        self.stop();
    }
}
