/// Status polling over a step log.
///
/// Each tick fetches a [`StatusSnapshot`], emits only step lines that have
/// not been emitted before, and stops once the snapshot is terminal. The
/// worker waits for a fetch to return before scheduling the next one, so a
/// slow backend delays polling instead of stacking requests.
///
/// Terminal detection prefers the structured `status` field. Endpoints that
/// only return free-text steps (the issue-fix status route) fall back to
/// [`classify_step`], which looks for fixed sentinel phrases. Sentinels are
/// brittle: a step that merely mentions the phrase ends polling.
use std::collections::HashSet;
use std::ops::ControlFlow;
use std::time::Duration;

use super::SessionState;
use crate::error::{ClientError, Result};
use crate::timer::IntervalHandle;

/// Step text marking a successful run.
pub const SUCCESS_SENTINEL: &str = "✅ Completed";

/// Step text marking a failed run.
pub const FAILURE_SENTINEL: &str = "❌ Failed";

/// How a tracked operation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Succeeded,
    Failed,
    Cancelled,
}

/// The single sentinel predicate.
pub fn classify_step(step: &str) -> Option<Outcome> {
    if step.contains(SUCCESS_SENTINEL) {
        Some(Outcome::Succeeded)
    } else if step.contains(FAILURE_SENTINEL) {
        Some(Outcome::Failed)
    } else {
        None
    }
}

/// What one poll returned.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatusSnapshot {
    pub steps: Vec<String>,
    /// Backend lifecycle name (`COMPLETED`, `FAILED`, ...) when provided.
    pub status: Option<String>,
}

impl StatusSnapshot {
    pub fn from_steps<I, S>(steps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            steps: steps.into_iter().map(Into::into).collect(),
            status: None,
        }
    }

    /// Terminal outcome, if any. With both sentinels present the earliest
    /// matching step decides.
    pub fn outcome(&self) -> Option<Outcome> {
        let structured = self
            .status
            .as_deref()
            .and_then(SessionState::from_backend_status)
            .and_then(|state| match state {
                SessionState::Completed => Some(Outcome::Succeeded),
                SessionState::Failed => Some(Outcome::Failed),
                SessionState::Cancelled => Some(Outcome::Cancelled),
                _ => None,
            });
        structured.or_else(|| self.steps.iter().find_map(|s| classify_step(s)))
    }
}

/// Render events produced by the poller.
#[derive(Debug, Clone, PartialEq)]
pub enum PollEvent {
    /// A step line seen for the first time.
    Step(String),
    /// Polling stopped on a terminal snapshot. Emitted exactly once.
    Finished(Outcome),
    /// The fetch failed; polling stopped without retrying.
    Error(ClientError),
}

/// Poll state plus the fetch function it drives.
pub struct StatusPoller<F> {
    fetch: F,
    seen: HashSet<String>,
    finished: bool,
}

impl<F> StatusPoller<F>
where
    F: FnMut() -> Result<StatusSnapshot>,
{
    pub fn new(fetch: F) -> Self {
        Self {
            fetch,
            seen: HashSet::new(),
            finished: false,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Run one poll. Returns no events once the poller has finished.
    pub fn tick(&mut self) -> Vec<PollEvent> {
        if self.finished {
            return Vec::new();
        }
        match (self.fetch)() {
            Ok(snapshot) => self.absorb(&snapshot),
            Err(err) => {
                tracing::error!("status poll failed: {err}");
                self.finished = true;
                vec![PollEvent::Error(err)]
            }
        }
    }

    fn absorb(&mut self, snapshot: &StatusSnapshot) -> Vec<PollEvent> {
        let mut events: Vec<PollEvent> = snapshot
            .steps
            .iter()
            .filter(|step| self.seen.insert((*step).clone()))
            .map(|step| PollEvent::Step(step.clone()))
            .collect();

        if let Some(outcome) = snapshot.outcome() {
            self.finished = true;
            events.push(PollEvent::Finished(outcome));
        }
        events
    }
}

impl<F> StatusPoller<F>
where
    F: FnMut() -> Result<StatusSnapshot> + Send + 'static,
{
    /// Tick every `period` on a worker thread, handing events to `on_event`
    /// in order. The worker ends by itself on a terminal snapshot or error.
    pub fn spawn<E>(mut self, name: &str, period: Duration, mut on_event: E) -> Result<IntervalHandle>
    where
        E: FnMut(PollEvent) + Send + 'static,
    {
        IntervalHandle::spawn(name, period, move || {
            for event in self.tick() {
                on_event(event);
            }
            if self.is_finished() {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        })
    }
}

impl<F> std::fmt::Debug for StatusPoller<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatusPoller")
            .field("seen", &self.seen.len())
            .field("finished", &self.finished)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use super::*;

    fn scripted(
        responses: Vec<Result<StatusSnapshot>>,
    ) -> StatusPoller<impl FnMut() -> Result<StatusSnapshot>> {
        let mut queue: VecDeque<_> = responses.into();
        StatusPoller::new(move || {
            queue
                .pop_front()
                .unwrap_or_else(|| Ok(StatusSnapshot::default()))
        })
    }

    fn steps(events: &[PollEvent]) -> Vec<&str> {
        events
            .iter()
            .filter_map(|e| match e {
                PollEvent::Step(s) => Some(s.as_str()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn identical_polls_emit_no_duplicates() {
        let snap = StatusSnapshot::from_steps(["Cloning", "Analyzing"]);
        let mut poller = scripted(vec![Ok(snap.clone()), Ok(snap)]);

        let first = poller.tick();
        assert_eq!(steps(&first), ["Cloning", "Analyzing"]);

        let second = poller.tick();
        assert!(second.is_empty());
        assert!(!poller.is_finished());
    }

    #[test]
    fn only_the_delta_is_emitted() {
        let mut poller = scripted(vec![
            Ok(StatusSnapshot::from_steps(["a"])),
            Ok(StatusSnapshot::from_steps(["a", "b", "c"])),
        ]);
        poller.tick();
        assert_eq!(steps(&poller.tick()), ["b", "c"]);
    }

    #[test]
    fn success_sentinel_stops_polling_once() {
        let done = StatusSnapshot::from_steps(["Fixing", "✅ Completed"]);
        let mut poller = scripted(vec![Ok(done.clone()), Ok(done)]);

        let events = poller.tick();
        assert_eq!(events.last(), Some(&PollEvent::Finished(Outcome::Succeeded)));
        assert!(poller.is_finished());
        assert!(poller.tick().is_empty());
    }

    #[test]
    fn failure_sentinel_stops_polling() {
        let mut poller = scripted(vec![Ok(StatusSnapshot::from_steps(["❌ Failed: no diff"]))]);
        let events = poller.tick();
        let finishes: Vec<_> = events
            .iter()
            .filter(|e| matches!(e, PollEvent::Finished(_)))
            .collect();
        assert_eq!(finishes, [&PollEvent::Finished(Outcome::Failed)]);
    }

    #[test]
    fn both_sentinels_first_seen_wins() {
        let mut poller = scripted(vec![Ok(StatusSnapshot::from_steps([
            "❌ Failed to push branch",
            "✅ Completed",
        ]))]);
        let events = poller.tick();
        let finishes: Vec<_> = events
            .iter()
            .filter(|e| matches!(e, PollEvent::Finished(_)))
            .collect();
        assert_eq!(finishes, [&PollEvent::Finished(Outcome::Failed)]);
        assert!(poller.tick().is_empty());
    }

    #[test]
    fn structured_status_beats_sentinels() {
        let snap = StatusSnapshot {
            steps: vec!["✅ Completed analysis".into()],
            status: Some("GENERATING_TESTS".into()),
        };
        assert_eq!(snap.outcome(), Some(Outcome::Succeeded));

        let cancelled = StatusSnapshot {
            steps: vec![],
            status: Some("CANCELLED".into()),
        };
        assert_eq!(cancelled.outcome(), Some(Outcome::Cancelled));
    }

    #[test]
    fn transport_error_stops_without_retry() {
        let mut poller = scripted(vec![
            Err(ClientError::network("/status", "HTTP 500")),
            Ok(StatusSnapshot::from_steps(["never seen"])),
        ]);
        let events = poller.tick();
        assert!(matches!(events.as_slice(), [PollEvent::Error(_)]));
        assert!(poller.is_finished());
        assert!(poller.tick().is_empty());
    }

    #[test]
    fn spawned_poller_delivers_in_order_and_ends_itself() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let poller = scripted(vec![
            Ok(StatusSnapshot::from_steps(["one"])),
            Ok(StatusSnapshot::from_steps(["one", "two", "✅ Completed"])),
        ]);
        let mut handle = poller.spawn("test-poller", Duration::from_millis(5), move |e| {
            let _ = tx.send(e);
        })
        .unwrap();

        let events: Vec<PollEvent> = rx.iter().take(4).collect();
        assert_eq!(
            events,
            vec![
                PollEvent::Step("one".into()),
                PollEvent::Step("two".into()),
                PollEvent::Step("✅ Completed".into()),
                PollEvent::Finished(Outcome::Succeeded),
            ]
        );
        handle.stop();
        handle.stop();
    }
}
