use serde::Serialize;
use uuid::Uuid;

use crate::{
    candidate::{Candidate, Word},
    orchestrator::{AttackPhase, ExhaustionReason, SessionStatus},
};

/// Returns the throughput of a run, 0 when no time elapsed.
#[inline]
pub fn hashes_per_second(attempts: u64, elapsed_ms: u64) -> f64 {
    if elapsed_ms == 0 {
        0.
    } else {
        attempts as f64 / (elapsed_ms as f64 / 1000.)
    }
}

/// The number of candidates a named sub-phase produced.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubPhaseReport {
    pub name: String,
    pub count: u64,
    pub description: String,
}

/// The statistics of one phase of a session.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseReport {
    pub phase: String,
    pub ordinal: usize,
    pub attempted: u64,
    pub time_ms: u64,
    pub hashes_per_second: f64,
    pub success: bool,
    pub base_word: Option<String>,
    pub rule: Option<String>,
    pub cracked_with: Option<String>,
    pub capped: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sub_phases: Vec<SubPhaseReport>,
}

impl From<&AttackPhase> for PhaseReport {
    fn from(phase: &AttackPhase) -> Self {
        let time_ms = phase.elapsed.as_millis() as u64;
        let provenance = phase.found.as_ref().map(|candidate| &candidate.provenance);
        let to_string = |word: &Option<Word>| word.as_deref().map(str::to_owned);

        Self {
            phase: phase.name.to_owned(),
            ordinal: phase.ordinal,
            attempted: phase.attempts,
            time_ms,
            hashes_per_second: hashes_per_second(phase.attempts, time_ms),
            success: phase.success,
            base_word: provenance.and_then(|p| to_string(&p.base_word)),
            rule: provenance.and_then(|p| to_string(&p.rule)),
            cracked_with: phase.found.as_ref().map(|c| c.password.clone()),
            capped: phase.capped,
            sub_phases: phase.sub_phases.clone(),
        }
    }
}

/// The outcome of a session.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttackResult {
    pub session_id: Uuid,
    pub cracked: bool,
    pub password: Option<String>,
    /// The name of the winning phase, or `None`.
    pub method: String,
    pub status: SessionStatus,
    pub exhaustion_reason: Option<ExhaustionReason>,
    /// True if a generator fault stopped the session before its end.
    pub aborted: bool,
    pub attempts: u64,
    pub time_ms: u64,
    pub hashes_per_second: f64,
    pub phases: Vec<PhaseReport>,
}

/// A guess produced without any target hash.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Guess {
    pub password: String,
    /// The pattern that produced the guess.
    pub pattern: String,
    /// The generator or external source the guess comes from.
    pub source: String,
}

impl Guess {
    pub fn from_candidate(candidate: Candidate, source: &str) -> Self {
        Self {
            pattern: candidate.provenance.pattern.to_string(),
            password: candidate.password,
            source: source.to_owned(),
        }
    }
}

/// The guesses of a source and the breakdown by sub-phase.
#[derive(Clone, Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GuessReport {
    pub guesses: Vec<Guess>,
    pub sub_phases: Vec<SubPhaseReport>,
}

#[cfg(test)]
mod tests {
    use super::hashes_per_second;

    #[test]
    fn test_hashes_per_second() {
        assert_eq!(0., hashes_per_second(1000, 0));
        assert_eq!(2000., hashes_per_second(1000, 500));
    }
}
