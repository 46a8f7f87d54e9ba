use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread::JoinHandle,
    time::Duration,
};

use crossbeam_channel::{Receiver, RecvTimeoutError};
use serde::Serialize;
use uuid::Uuid;

use crate::orchestrator::ExhaustionReason;

/// How often a blocked `recv` looks at the cancellation flag.
const CANCEL_POLL: Duration = Duration::from_millis(50);

/// The kind of a live progress event.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
pub enum ProgressKind {
    /// Periodic throughput report. Dropped when the consumer lags behind.
    Progress,
    /// Every candidate of a length tier was tested.
    PhaseComplete,
    Cracked,
    Exhausted,
}

impl ProgressKind {
    /// Returns true if events of this kind are never dropped.
    pub fn is_reliable(&self) -> bool {
        !matches!(self, Self::Progress)
    }
}

/// An event to track the progress of a live brute force.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEvent {
    pub session_id: Uuid,
    pub kind: ProgressKind,
    /// The candidate being tested, or the password for `Cracked`.
    pub candidate: Option<String>,
    pub attempts_so_far: u64,
    pub elapsed_ms: u64,
    /// The rate since the previous report for `Progress`, the average since the start otherwise.
    pub hashes_per_second: f64,
    /// The password length being enumerated.
    pub tier: Option<u8>,
    pub reason: Option<ExhaustionReason>,
}

/// How a live brute force ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LiveOutcome {
    Cracked { password: String, attempts: u64 },
    Exhausted { reason: ExhaustionReason, attempts: u64 },
    Cancelled { attempts: u64 },
}

impl LiveOutcome {
    pub fn attempts(&self) -> u64 {
        match self {
            Self::Cracked { attempts, .. }
            | Self::Exhausted { attempts, .. }
            | Self::Cancelled { attempts } => *attempts,
        }
    }
}

/// A handle on a live brute force running on its own thread.
/// Dropping the handle cancels the worker.
pub struct LiveHandle {
    pub(crate) session_id: Uuid,
    pub(crate) thread_handle: Option<JoinHandle<LiveOutcome>>,
    pub(crate) receiver: Receiver<ProgressEvent>,
    pub(crate) cancel: Arc<AtomicBool>,
}

impl LiveHandle {
    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }

    /// Blocks until an event is received.
    /// Returns `None` if the brute force is finished or cancelled.
    pub fn recv(&self) -> Option<ProgressEvent> {
        loop {
            if self.is_cancelled() {
                return None;
            }

            match self.receiver.recv_timeout(CANCEL_POLL) {
                Ok(event) => return (!self.is_cancelled()).then_some(event),
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => return None,
            }
        }
    }

    /// Blocks until an event is received or the timeout expires.
    /// A cancelled brute force reports `Disconnected`.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<ProgressEvent, RecvTimeoutError> {
        if self.is_cancelled() {
            return Err(RecvTimeoutError::Disconnected);
        }

        let event = self.receiver.recv_timeout(timeout)?;
        if self.is_cancelled() {
            return Err(RecvTimeoutError::Disconnected);
        }

        Ok(event)
    }

    /// Returns a pending event, if any.
    pub fn try_recv(&self) -> Option<ProgressEvent> {
        if self.is_cancelled() {
            return None;
        }

        self.receiver.try_recv().ok()
    }

    /// Asks the worker to stop. It stops before testing its next candidate.
    /// Buffered events are discarded and no further event is delivered.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
        self.receiver.try_iter().for_each(drop);
    }

    /// Returns true once the worker thread has ended.
    pub fn is_finished(&self) -> bool {
        self.thread_handle
            .as_ref()
            .map_or(true, JoinHandle::is_finished)
    }

    /// Returns the outcome of the brute force.
    /// Blocks until the worker ends, discarding the events not received yet.
    pub fn join(mut self) -> LiveOutcome {
        // the worker owns the only sender, so the channel closes when it ends
        self.receiver.iter().for_each(drop);

        match self.thread_handle.take() {
            Some(thread_handle) => thread_handle
                .join()
                .unwrap_or_else(|panic| std::panic::resume_unwind(panic)),
            None => LiveOutcome::Cancelled { attempts: 0 },
        }
    }
}

impl Drop for LiveHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}
