use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
    time::{Duration, Instant},
};

use crossbeam_channel::{SendTimeoutError, Sender, TrySendError};
use parking_lot::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    ctx::{BruteForceCtx, BruteForceCtxBuilder},
    error::CrackResult,
    event::{LiveHandle, LiveOutcome, ProgressEvent, ProgressKind},
    hash::HashTarget,
    orchestrator::ExhaustionReason,
    report::hashes_per_second,
    scheduling::Cadence,
    DEFAULT_CHANNEL_CAPACITY, DEFAULT_PROGRESS_EVERY, DEFAULT_PROGRESS_INTERVAL,
};

/// How long a reliable send waits before checking the cancellation flag again.
const RELIABLE_POLL: Duration = Duration::from_millis(50);

/// How many candidates are tested between two checks of the time budget.
const DEADLINE_CHECK_EVERY: u64 = 1024;

/// Options of a live brute force.
#[derive(Clone, Debug)]
pub struct LiveOptions {
    session_id: Option<Uuid>,
    brute_force: BruteForceCtxBuilder,
    progress_every: u64,
    progress_interval: Duration,
    channel_capacity: usize,
    time_budget: Option<Duration>,
}

impl Default for LiveOptions {
    fn default() -> Self {
        Self {
            session_id: None,
            brute_force: BruteForceCtxBuilder::default(),
            progress_every: DEFAULT_PROGRESS_EVERY,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            time_budget: None,
        }
    }
}

impl LiveOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the session id. Starting a worker for an id that already has one
    /// cancels the previous worker.
    pub fn session_id(mut self, session_id: Uuid) -> Self {
        self.session_id = Some(session_id);

        self
    }

    /// Sets the search space.
    pub fn brute_force(mut self, brute_force: BruteForceCtxBuilder) -> Self {
        self.brute_force = brute_force;

        self
    }

    /// Sets the number of candidates between two progress events.
    pub fn progress_every(mut self, progress_every: u64) -> Self {
        self.progress_every = progress_every;

        self
    }

    /// Sets the maximum time between two progress events.
    pub fn progress_interval(mut self, progress_interval: Duration) -> Self {
        self.progress_interval = progress_interval;

        self
    }

    /// Sets the number of events buffered before progress events are dropped.
    pub fn channel_capacity(mut self, channel_capacity: usize) -> Self {
        self.channel_capacity = channel_capacity;

        self
    }

    pub fn time_budget(mut self, time_budget: Option<Duration>) -> Self {
        self.time_budget = time_budget;

        self
    }
}

/// Tracks the running live workers. At most one worker runs per session id.
#[derive(Debug, Default)]
pub struct LiveRegistry {
    workers: Mutex<HashMap<Uuid, Arc<AtomicBool>>>,
}

impl LiveRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new worker and returns its cancellation flag.
    /// The previous worker of the same session is cancelled.
    pub fn register(&self, session_id: Uuid) -> Arc<AtomicBool> {
        let cancel = Arc::new(AtomicBool::new(false));

        if let Some(previous) = self.workers.lock().insert(session_id, cancel.clone()) {
            debug!(session = %session_id, "cancelling the previous live worker");
            previous.store(true, Ordering::Relaxed);
        }

        cancel
    }

    /// Removes a worker, unless it was already replaced by a newer one.
    pub fn release(&self, session_id: Uuid, cancel: &Arc<AtomicBool>) {
        let mut workers = self.workers.lock();
        if workers
            .get(&session_id)
            .is_some_and(|current| Arc::ptr_eq(current, cancel))
        {
            workers.remove(&session_id);
        }
    }

    /// Returns the number of running workers.
    pub fn len(&self) -> usize {
        self.workers.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

struct LiveWorker {
    session_id: Uuid,
    target: HashTarget,
    ctx: BruteForceCtx,
    sender: Sender<ProgressEvent>,
    cancel: Arc<AtomicBool>,
    registry: Arc<LiveRegistry>,
    progress_every: u64,
    progress_interval: Duration,
    time_budget: Option<Duration>,
}

impl LiveWorker {
    fn run(self) -> LiveOutcome {
        let outcome = self.search();
        self.registry.release(self.session_id, &self.cancel);
        info!(session = %self.session_id, ?outcome, "live brute force ended");

        outcome
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }

    fn event(&self, kind: ProgressKind, started: Instant, attempts: u64) -> ProgressEvent {
        let elapsed_ms = started.elapsed().as_millis() as u64;

        ProgressEvent {
            session_id: self.session_id,
            kind,
            candidate: None,
            attempts_so_far: attempts,
            elapsed_ms,
            hashes_per_second: hashes_per_second(attempts, elapsed_ms),
            tier: None,
            reason: None,
        }
    }

    /// Sends an event that must not be dropped.
    /// Returns false if the consumer is gone or the worker was cancelled meanwhile.
    fn send_reliable(&self, mut event: ProgressEvent) -> bool {
        loop {
            match self.sender.send_timeout(event, RELIABLE_POLL) {
                Ok(()) => return true,
                Err(SendTimeoutError::Disconnected(_)) => return false,
                Err(SendTimeoutError::Timeout(returned)) => {
                    if self.is_cancelled() {
                        return false;
                    }
                    event = returned;
                }
            }
        }
    }

    fn exhausted(&self, reason: ExhaustionReason, started: Instant, attempts: u64) -> LiveOutcome {
        let mut event = self.event(ProgressKind::Exhausted, started, attempts);
        event.reason = Some(reason);
        self.send_reliable(event);

        LiveOutcome::Exhausted { reason, attempts }
    }

    fn search(&self) -> LiveOutcome {
        let started = Instant::now();
        let deadline = self.time_budget.map(|budget| started + budget);
        let mut matcher = self.target.matcher();
        let mut cadence = Cadence::new(self.progress_every, self.progress_interval);
        let mut attempts = 0;

        for tier in self.ctx.tiers() {
            debug!(session = %self.session_id, length = tier.length, "starting tier");

            for counter in tier.counters {
                if self.is_cancelled() {
                    return LiveOutcome::Cancelled { attempts };
                }

                let plaintext = self.ctx.counter_to_plaintext(counter);
                attempts += 1;

                if matcher.matches(&plaintext) {
                    let mut event = self.event(ProgressKind::Cracked, started, attempts);
                    event.candidate = Some(plaintext.clone());
                    event.tier = Some(tier.length);
                    self.send_reliable(event);

                    return LiveOutcome::Cracked {
                        password: plaintext,
                        attempts,
                    };
                }

                if attempts % DEADLINE_CHECK_EVERY == 0
                    && deadline.is_some_and(|deadline| Instant::now() >= deadline)
                {
                    return self.exhausted(ExhaustionReason::TimedOut, started, attempts);
                }

                if let Some(window) = cadence.tick() {
                    let mut event = self.event(ProgressKind::Progress, started, attempts);
                    event.hashes_per_second = window.hashes_per_second();
                    event.candidate = Some(plaintext);
                    event.tier = Some(tier.length);

                    // a full channel means the consumer lags behind, the next report supersedes this one
                    if let Err(TrySendError::Disconnected(_)) = self.sender.try_send(event) {
                        return LiveOutcome::Cancelled { attempts };
                    }
                }
            }

            let mut event = self.event(ProgressKind::PhaseComplete, started, attempts);
            event.tier = Some(tier.length);
            if !self.send_reliable(event) {
                return LiveOutcome::Cancelled { attempts };
            }
        }

        self.exhausted(ExhaustionReason::Clean, started, attempts)
    }
}

/// Starts an incremental brute force on its own thread.
/// The search space is validated before the thread starts.
pub fn start_live_brute_force(
    target: HashTarget,
    options: LiveOptions,
    registry: Arc<LiveRegistry>,
) -> CrackResult<LiveHandle> {
    let ctx = options.brute_force.build()?;
    let session_id = options.session_id.unwrap_or_else(Uuid::new_v4);
    let (sender, receiver) = crossbeam_channel::bounded(options.channel_capacity.max(1));
    let cancel = registry.register(session_id);

    info!(
        session = %session_id,
        hash_function = %target.hash_function,
        candidates = ctx.candidate_count(),
        "live brute force started"
    );

    let worker = LiveWorker {
        session_id,
        target,
        ctx,
        sender,
        cancel: cancel.clone(),
        registry: registry.clone(),
        progress_every: options.progress_every,
        progress_interval: options.progress_interval,
        time_budget: options.time_budget,
    };

    let spawned = thread::Builder::new()
        .name(format!("live-{session_id}"))
        .spawn(move || worker.run());

    let thread_handle = match spawned {
        Ok(thread_handle) => thread_handle,
        Err(err) => {
            registry.release(session_id, &cancel);
            return Err(err.into());
        }
    };

    Ok(LiveHandle {
        session_id,
        thread_handle: Some(thread_handle),
        receiver,
        cancel,
    })
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{atomic::Ordering, Arc},
        time::Duration,
    };

    use itertools::Itertools;
    use uuid::Uuid;

    use crate::{
        ctx::BruteForceCtxBuilder,
        error::ErrorKind,
        event::{LiveOutcome, ProgressKind},
        hash::{HashFunction, HashTarget},
        orchestrator::ExhaustionReason,
    };

    use super::{start_live_brute_force, LiveOptions, LiveRegistry};

    fn md5(plaintext: &str) -> HashTarget {
        HashTarget::new(&HashFunction::Md5.hash_hex(plaintext), None).unwrap()
    }

    fn abc_options() -> LiveOptions {
        LiveOptions::new().brute_force(
            BruteForceCtxBuilder::new()
                .charset(b"abc")
                .max_password_length(3),
        )
    }

    #[test]
    fn test_live_crack() {
        let registry = Arc::new(LiveRegistry::new());
        let handle = start_live_brute_force(md5("abc"), abc_options(), registry.clone()).unwrap();

        let events = std::iter::from_fn(|| handle.recv()).collect_vec();
        let last = events.last().unwrap();
        assert_eq!(ProgressKind::Cracked, last.kind);
        assert_eq!(Some("abc".to_owned()), last.candidate);
        assert_eq!(18, last.attempts_so_far);

        let tiers = events
            .iter()
            .filter(|e| e.kind == ProgressKind::PhaseComplete)
            .map(|e| e.tier)
            .collect_vec();
        assert_eq!(vec![Some(1), Some(2)], tiers);

        assert_eq!(
            LiveOutcome::Cracked {
                password: "abc".to_owned(),
                attempts: 18
            },
            handle.join()
        );
        assert!(registry.is_empty());
    }

    #[test]
    fn test_reliable_events_survive_a_full_channel() {
        let options = abc_options().channel_capacity(1).progress_every(1);
        let handle =
            start_live_brute_force(md5("zzz"), options, Arc::new(LiveRegistry::new())).unwrap();

        // let the worker fill the channel before consuming
        std::thread::sleep(Duration::from_millis(100));
        let events = std::iter::from_fn(|| handle.recv()).collect_vec();

        let reliable = events.iter().filter(|e| e.kind.is_reliable()).collect_vec();
        assert_eq!(4, reliable.len());
        assert_eq!(ProgressKind::Exhausted, reliable[3].kind);
        assert_eq!(Some(ExhaustionReason::Clean), reliable[3].reason);
        assert!(events.len() < 39 + 4);

        assert_eq!(
            LiveOutcome::Exhausted {
                reason: ExhaustionReason::Clean,
                attempts: 39
            },
            handle.join()
        );
    }

    #[test]
    fn test_cancel_stops_the_stream() {
        let options = LiveOptions::new()
            .brute_force(
                BruteForceCtxBuilder::new()
                    .min_password_length(8)
                    .max_password_length(8),
            )
            .progress_every(1);
        let handle =
            start_live_brute_force(md5("~"), options, Arc::new(LiveRegistry::new())).unwrap();

        for _ in 0..3 {
            assert_eq!(ProgressKind::Progress, handle.recv().unwrap().kind);
        }

        // let the worker refill the channel
        std::thread::sleep(Duration::from_millis(50));
        handle.cancel();

        assert_eq!(None, handle.try_recv());
        assert!(handle.recv_timeout(Duration::from_millis(10)).is_err());
        assert_eq!(0, std::iter::from_fn(|| handle.recv()).count());

        for _ in 0..200 {
            if handle.is_finished() {
                break;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        assert!(handle.is_finished());
        assert!(matches!(handle.join(), LiveOutcome::Cancelled { .. }));
    }

    #[test]
    fn test_dropped_handle_releases_the_worker() {
        let registry = Arc::new(LiveRegistry::new());
        let options = LiveOptions::new().brute_force(
            BruteForceCtxBuilder::new()
                .min_password_length(8)
                .max_password_length(8),
        );
        let handle = start_live_brute_force(md5("~"), options, registry.clone()).unwrap();
        drop(handle);

        for _ in 0..200 {
            if registry.is_empty() {
                break;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        assert!(registry.is_empty());
    }

    #[test]
    fn test_time_budget() {
        let options = LiveOptions::new()
            .brute_force(BruteForceCtxBuilder::new().max_password_length(8))
            .time_budget(Some(Duration::ZERO));
        let handle =
            start_live_brute_force(md5("~"), options, Arc::new(LiveRegistry::new())).unwrap();

        assert!(matches!(
            handle.join(),
            LiveOutcome::Exhausted {
                reason: ExhaustionReason::TimedOut,
                ..
            }
        ));
    }

    #[test]
    fn test_one_worker_per_session() {
        let registry = LiveRegistry::new();
        let id = Uuid::new_v4();

        let first = registry.register(id);
        let second = registry.register(id);
        assert!(first.load(Ordering::Relaxed));
        assert!(!second.load(Ordering::Relaxed));

        // a replaced worker does not remove its successor
        registry.release(id, &first);
        assert_eq!(1, registry.len());
        registry.release(id, &second);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_invalid_space_fails_before_starting() {
        let options =
            LiveOptions::new().brute_force(BruteForceCtxBuilder::new().charset(b""));
        let err = start_live_brute_force(md5("a"), options, Arc::new(LiveRegistry::new()))
            .err()
            .unwrap();
        assert_eq!(ErrorKind::InputValidation, err.kind());
    }
}
