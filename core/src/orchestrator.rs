use std::{
    fmt::Display,
    time::{Duration, Instant},
};

use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    candidate::{Candidate, GeneratorKind},
    error::{CrackError, CrackResult},
    generator::{CandidateGenerator, Capped, Generator},
    hash::HashTarget,
    report::{hashes_per_second, AttackResult, PhaseReport, SubPhaseReport},
    DEFAULT_BATCH_SIZE,
};

/// The lifecycle of a session. Transitions only go forward.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
pub enum SessionStatus {
    Pending,
    Running,
    Cracked,
    Exhausted,
    Cancelled,
}

impl SessionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Cracked | Self::Exhausted | Self::Cancelled)
    }
}

impl Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(self, f)
    }
}

/// Why a session ended without a match.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
pub enum ExhaustionReason {
    /// Every phase ran dry or reached its cap.
    Clean,
    /// The time budget expired.
    TimedOut,
}

/// One phase of a session and its statistics.
#[derive(Clone, Debug)]
pub struct AttackPhase {
    pub name: &'static str,
    pub kind: GeneratorKind,
    /// 1-based position in the plan.
    pub ordinal: usize,
    pub attempts: u64,
    pub elapsed: Duration,
    pub success: bool,
    pub found: Option<Candidate>,
    /// True if the phase stopped because of its cap.
    pub capped: bool,
    pub sub_phases: Vec<SubPhaseReport>,
}

impl AttackPhase {
    fn new(kind: GeneratorKind, ordinal: usize) -> Self {
        Self {
            name: kind.name(),
            kind,
            ordinal,
            attempts: 0,
            elapsed: Duration::ZERO,
            success: false,
            found: None,
            capped: false,
            sub_phases: Vec::new(),
        }
    }
}

/// How a phase ended.
enum PhaseEnd {
    Cracked,
    Exhausted,
    TimedOut,
}

/// Pulls batches out of a generator and hashes them in parallel until a match,
/// the end of the generator or the deadline.
///
/// The first matching index in generation order wins, so the winner and the
/// attempt count are the same as in a sequential run.
fn run_phase<G: CandidateGenerator>(
    generator: &mut G,
    target: &HashTarget,
    batch_size: usize,
    deadline: Option<Instant>,
    phase: &mut AttackPhase,
) -> CrackResult<PhaseEnd> {
    let mut batch = Vec::with_capacity(batch_size);

    loop {
        batch.clear();
        let count = generator.next_batch(batch_size, &mut batch)?;
        if count == 0 {
            return Ok(PhaseEnd::Exhausted);
        }

        let hit = batch
            .par_iter()
            .map_init(
                || target.matcher(),
                |matcher, candidate| matcher.matches(&candidate.password),
            )
            .position_first(|matched| matched);

        if let Some(i) = hit {
            phase.attempts += i as u64 + 1;
            phase.success = true;
            phase.found = Some(batch.swap_remove(i));
            return Ok(PhaseEnd::Cracked);
        }

        phase.attempts += count as u64;

        if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            return Ok(PhaseEnd::TimedOut);
        }
    }
}

/// An attack on one hash: an ordered plan of phases run until the first match.
pub struct AttackSession {
    id: Uuid,
    target: HashTarget,
    plan: Vec<Capped<Generator>>,
    phases: Vec<AttackPhase>,
    status: SessionStatus,
    reason: Option<ExhaustionReason>,
    aborted: bool,
    started: Option<Instant>,
    elapsed: Duration,
    batch_size: usize,
    time_budget: Option<Duration>,
}

impl AttackSession {
    pub fn new(target: HashTarget, plan: Vec<Capped<Generator>>) -> Self {
        Self {
            id: Uuid::new_v4(),
            target,
            plan,
            phases: Vec::new(),
            status: SessionStatus::Pending,
            reason: None,
            aborted: false,
            started: None,
            elapsed: Duration::ZERO,
            batch_size: DEFAULT_BATCH_SIZE,
            time_budget: None,
        }
    }

    /// Sets the number of candidates hashed per batch.
    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);

        self
    }

    /// Sets the wall-clock budget of the whole session.
    pub fn time_budget(mut self, time_budget: Option<Duration>) -> Self {
        self.time_budget = time_budget;

        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn target(&self) -> &HashTarget {
        &self.target
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn exhaustion_reason(&self) -> Option<ExhaustionReason> {
        self.reason
    }

    /// Returns the phases started so far.
    pub fn phases(&self) -> &[AttackPhase] {
        &self.phases
    }

    /// Returns the number of candidates tested by all phases.
    pub fn total_attempts(&self) -> u64 {
        self.phases.iter().map(|phase| phase.attempts).sum()
    }

    fn elapsed(&self) -> Duration {
        match self.started {
            Some(started) if !self.status.is_terminal() => started.elapsed(),
            _ => self.elapsed,
        }
    }

    fn finish(&mut self, status: SessionStatus, reason: Option<ExhaustionReason>) {
        self.status = status;
        self.reason = reason;
        self.elapsed = self.started.map_or(Duration::ZERO, |started| started.elapsed());

        info!(
            session = %self.id,
            %status,
            attempts = self.total_attempts(),
            elapsed_ms = self.elapsed.as_millis() as u64,
            "session ended"
        );
    }

    /// Stops the session before its next phase.
    pub fn cancel(&mut self) {
        if !self.status.is_terminal() {
            self.finish(SessionStatus::Cancelled, None);
        }
    }

    /// Runs the next phase of the plan and returns the resulting status.
    pub fn step(&mut self) -> CrackResult<SessionStatus> {
        if self.status.is_terminal() {
            return Ok(self.status);
        }

        let started = *self.started.get_or_insert_with(Instant::now);
        if self.status == SessionStatus::Pending {
            self.status = SessionStatus::Running;
            info!(
                session = %self.id,
                hash_function = %self.target.hash_function,
                phases = self.plan.len(),
                "session started"
            );
        }

        let deadline = self.time_budget.map(|budget| started + budget);
        if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            self.finish(SessionStatus::Exhausted, Some(ExhaustionReason::TimedOut));
            return Ok(self.status);
        }

        let index = self.phases.len();
        let Some(generator) = self.plan.get_mut(index) else {
            self.finish(SessionStatus::Exhausted, Some(ExhaustionReason::Clean));
            return Ok(self.status);
        };

        let mut phase = AttackPhase::new(generator.kind(), index + 1);
        debug!(phase = phase.name, ordinal = phase.ordinal, batch_size = self.batch_size, "phase started");

        let phase_start = Instant::now();
        let end = run_phase(generator, &self.target, self.batch_size, deadline, &mut phase);
        phase.elapsed = phase_start.elapsed();
        phase.capped = generator.is_capped();
        phase.sub_phases = generator.sub_phases();

        info!(
            session = %self.id,
            phase = phase.name,
            attempts = phase.attempts,
            elapsed_ms = phase.elapsed.as_millis() as u64,
            success = phase.success,
            capped = phase.capped,
            "phase completed"
        );
        self.phases.push(phase);

        match end {
            Err(source) => {
                self.aborted = true;
                self.finish(SessionStatus::Cancelled, None);
                warn!(session = %self.id, error = %source, "session aborted");

                return Err(CrackError::Aborted {
                    source: Box::new(source),
                    partial: Box::new(self.result()),
                });
            }
            Ok(PhaseEnd::Cracked) => self.finish(SessionStatus::Cracked, None),
            Ok(PhaseEnd::TimedOut) => {
                self.finish(SessionStatus::Exhausted, Some(ExhaustionReason::TimedOut))
            }
            Ok(PhaseEnd::Exhausted) if self.phases.len() == self.plan.len() => {
                self.finish(SessionStatus::Exhausted, Some(ExhaustionReason::Clean))
            }
            Ok(PhaseEnd::Exhausted) => (),
        }

        Ok(self.status)
    }

    /// Runs every remaining phase until the session ends.
    pub fn run(&mut self) -> CrackResult<AttackResult> {
        while !self.step()?.is_terminal() {}

        Ok(self.result())
    }

    /// Returns the statistics of the session so far.
    pub fn result(&self) -> AttackResult {
        let winner = self.phases.iter().find(|phase| phase.success);
        let attempts = self.total_attempts();
        let time_ms = self.elapsed().as_millis() as u64;

        AttackResult {
            session_id: self.id,
            cracked: winner.is_some(),
            password: winner
                .and_then(|phase| phase.found.as_ref())
                .map(|candidate| candidate.password.clone()),
            method: winner.map_or("None", |phase| phase.name).to_owned(),
            status: self.status,
            exhaustion_reason: self.reason,
            aborted: self.aborted,
            attempts,
            time_ms,
            hashes_per_second: hashes_per_second(attempts, time_ms),
            phases: self.phases.iter().map(PhaseReport::from).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{io::Write, sync::Arc, time::Duration};

    use itertools::Itertools;

    use crate::{
        ctx::BruteForceCtxBuilder,
        error::ErrorKind,
        generator::{
            BruteForceGenerator, Capped, DictionaryGenerator, Generator, RuleCatalog,
            RuleGenerator, Wordlist,
        },
        hash::{HashFunction, HashTarget},
    };

    use super::{AttackSession, ExhaustionReason, SessionStatus};

    fn words(list: &[&str]) -> Wordlist {
        list.iter().map(|&w| Arc::from(w)).collect()
    }

    fn md5(plaintext: &str) -> HashTarget {
        HashTarget::new(&HashFunction::Md5.hash_hex(plaintext), None).unwrap()
    }

    fn dictionary(list: &[&str]) -> Capped<Generator> {
        Capped::new(Generator::Dictionary(DictionaryGenerator::new(words(list))), None)
    }

    fn rules(list: &[&str]) -> Capped<Generator> {
        let catalog = Arc::new(RuleCatalog::standard(2024));
        Capped::new(Generator::Rules(RuleGenerator::new(words(list), catalog)), None)
    }

    fn brute_force(charset: &[u8], min: u8, max: u8) -> Capped<Generator> {
        let ctx = BruteForceCtxBuilder::new()
            .charset(charset)
            .min_password_length(min)
            .max_password_length(max)
            .build()
            .unwrap();
        Capped::new(Generator::BruteForce(BruteForceGenerator::new(ctx)), None)
    }

    #[test]
    fn test_dictionary_crack() {
        let plan = vec![dictionary(&["123456", "qwerty", "password", "letmein"])];
        let result = AttackSession::new(md5("password"), plan).run().unwrap();

        assert!(result.cracked);
        assert_eq!(Some("password".to_owned()), result.password);
        assert_eq!("Dictionary", result.method);
        assert_eq!(SessionStatus::Cracked, result.status);
        assert_eq!(3, result.attempts);
        assert_eq!(Some("password".to_owned()), result.phases[0].cracked_with);
    }

    #[test]
    fn test_brute_force_crack() {
        let plan = vec![brute_force(b"0123456789", 6, 6)];
        let result = AttackSession::new(md5("123456"), plan).run().unwrap();

        assert_eq!(Some("123456".to_owned()), result.password);
        assert_eq!("Brute-Force", result.method);
        assert_eq!(123_457, result.attempts);
    }

    #[test]
    fn test_first_match_stops_the_session() {
        let plan = vec![
            dictionary(&["summer"]),
            rules(&["summer"]),
            brute_force(b"abc", 1, 3),
        ];
        let mut session = AttackSession::new(md5("Summer"), plan);
        let result = session.run().unwrap();

        assert_eq!("Rule-Mutation", result.method);
        assert_eq!(2, result.phases.len());
        assert_eq!(1, result.phases.iter().filter(|p| p.success).count());
        assert_eq!(Some("summer".to_owned()), result.phases[1].base_word);
        assert_eq!(Some("capitalize".to_owned()), result.phases[1].rule);
        assert_eq!(SessionStatus::Cracked, session.status());
    }

    #[test]
    fn test_exhausted_session_statistics() {
        let plan = vec![
            dictionary(&["alpha", "beta"]),
            rules(&["alpha", "beta"]),
            brute_force(b"xyz", 1, 2),
        ];
        let mut session = AttackSession::new(md5("not in any phase"), plan).batch_size(7);
        let result = session.run().unwrap();

        assert!(!result.cracked);
        assert_eq!("None", result.method);
        assert_eq!(None, result.password);
        assert_eq!(SessionStatus::Exhausted, result.status);
        assert_eq!(Some(ExhaustionReason::Clean), result.exhaustion_reason);

        assert_eq!(
            result.attempts,
            result.phases.iter().map(|p| p.attempted).sum::<u64>()
        );
        assert_eq!(12, result.phases[2].attempted);
        assert_eq!(
            vec![1, 2, 3],
            result.phases.iter().map(|p| p.ordinal).collect_vec()
        );
    }

    #[test]
    fn test_step_by_step() {
        let plan = vec![dictionary(&["a"]), dictionary(&["b"])];
        let mut session = AttackSession::new(md5("b"), plan);

        assert_eq!(SessionStatus::Pending, session.status());
        assert_eq!(SessionStatus::Running, session.step().unwrap());
        assert_eq!(SessionStatus::Cracked, session.step().unwrap());
        assert_eq!(SessionStatus::Cracked, session.step().unwrap());
        assert_eq!(2, session.phases().len());
    }

    #[test]
    fn test_deterministic_runs() {
        let run = || {
            let plan = vec![rules(&["dragon", "monkey"]), brute_force(b"ab", 1, 4)];
            AttackSession::new(md5("monkey2020"), plan)
                .batch_size(16)
                .run()
                .unwrap()
        };

        let (first, second) = (run(), run());
        assert_eq!(first.password, second.password);
        assert_eq!(first.attempts, second.attempts);
        assert_eq!(Some("monkey2020".to_owned()), first.password);
    }

    #[test]
    fn test_time_budget() {
        let plan = vec![brute_force(b"abc", 1, 3)];
        let result = AttackSession::new(md5("zzz"), plan)
            .time_budget(Some(Duration::ZERO))
            .run()
            .unwrap();

        assert_eq!(SessionStatus::Exhausted, result.status);
        assert_eq!(Some(ExhaustionReason::TimedOut), result.exhaustion_reason);
        assert!(!result.cracked);
    }

    #[test]
    fn test_generator_fault_aborts() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"fine\n\xff\n").unwrap();

        let plan = vec![
            Capped::new(
                Generator::Dictionary(DictionaryGenerator::from_file(file.path()).unwrap()),
                None,
            ),
            brute_force(b"abc", 1, 3),
        ];
        let mut session = AttackSession::new(md5("cab"), plan);
        let err = session.run().unwrap_err();

        assert_eq!(ErrorKind::InternalGeneratorFault, err.kind());
        let partial = err.partial_result().unwrap();
        assert!(partial.aborted);
        assert_eq!(SessionStatus::Cancelled, partial.status);
        assert_eq!(1, partial.phases.len());
        assert_eq!(1, partial.attempts);
        assert_eq!(SessionStatus::Cancelled, session.status());
    }

    #[test]
    fn test_word_before_a_read_failure_is_cracked() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"other\nfine\n\xff\n").unwrap();

        let plan = vec![Capped::new(
            Generator::Dictionary(DictionaryGenerator::from_file(file.path()).unwrap()),
            None,
        )];
        let result = AttackSession::new(md5("fine"), plan).run().unwrap();

        assert!(result.cracked);
        assert_eq!(Some("fine".to_owned()), result.password);
        assert_eq!(2, result.attempts);
        assert_eq!(SessionStatus::Cracked, result.status);
    }

    #[test]
    fn test_cancel() {
        let mut session = AttackSession::new(md5("b"), vec![dictionary(&["a"])]);
        session.cancel();
        assert_eq!(SessionStatus::Cancelled, session.step().unwrap());
        assert!(session.phases().is_empty());
    }
}
