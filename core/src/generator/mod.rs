mod brute_force;
mod dictionary;
mod hybrid;
mod markov;
mod profile;
mod rules;

pub use {
    brute_force::BruteForceGenerator,
    dictionary::{load_wordlist, DictionaryGenerator, WordSource, Wordlist},
    hybrid::HybridGenerator,
    markov::{MarkovConfig, MarkovGenerator, MarkovModel},
    profile::{Profile, ProfileGenerator},
    rules::{leet, Mangle, Rule, RuleCatalog, RuleGenerator},
};

use crate::{
    candidate::{Candidate, GeneratorKind},
    error::CrackResult,
    report::SubPhaseReport,
};

/// Trait that candidate generation strategies implement.
///
/// A generator yields a finite sequence of candidates, in a deterministic order,
/// materialized lazily batch by batch. Calling `reset` restarts the exact same sequence.
pub trait CandidateGenerator {
    /// Returns the strategy of this generator.
    fn kind(&self) -> GeneratorKind;

    /// Appends at most `max` candidates to `out` and returns how many were appended.
    /// Returns 0 only once the generator is exhausted.
    fn next_batch(&mut self, max: usize, out: &mut Vec<Candidate>) -> CrackResult<usize>;

    /// Returns true if no candidate is left.
    fn is_exhausted(&self) -> bool;

    /// Restarts the sequence from its first candidate.
    fn reset(&mut self) -> CrackResult<()>;

    /// Returns true if the generator stopped because of a cap rather than running dry.
    fn is_capped(&self) -> bool {
        false
    }

    /// Returns the candidates emitted so far by named sub-phases, if the strategy has any.
    fn sub_phases(&self) -> Vec<SubPhaseReport> {
        Vec::new()
    }
}

/// Forwards a call to the generator held by a `Generator` variant.
macro_rules! dispatch {
    ($self:expr, $gen:ident => $call:expr) => {
        match $self {
            Generator::Dictionary($gen) => $call,
            Generator::Rules($gen) => $call,
            Generator::Markov($gen) => $call,
            Generator::Profile($gen) => $call,
            Generator::Hybrid($gen) => $call,
            Generator::BruteForce($gen) => $call,
        }
    };
}

/// Any of the supported generators.
pub enum Generator {
    Dictionary(DictionaryGenerator),
    Rules(RuleGenerator),
    Markov(MarkovGenerator),
    Profile(ProfileGenerator),
    Hybrid(HybridGenerator),
    BruteForce(BruteForceGenerator),
}

impl CandidateGenerator for Generator {
    fn kind(&self) -> GeneratorKind {
        dispatch!(self, gen => gen.kind())
    }

    fn next_batch(&mut self, max: usize, out: &mut Vec<Candidate>) -> CrackResult<usize> {
        dispatch!(self, gen => gen.next_batch(max, out))
    }

    fn is_exhausted(&self) -> bool {
        dispatch!(self, gen => gen.is_exhausted())
    }

    fn reset(&mut self) -> CrackResult<()> {
        dispatch!(self, gen => gen.reset())
    }

    fn is_capped(&self) -> bool {
        dispatch!(self, gen => gen.is_capped())
    }

    fn sub_phases(&self) -> Vec<SubPhaseReport> {
        dispatch!(self, gen => gen.sub_phases())
    }
}

/// Bounds the number of candidates a generator may emit.
pub struct Capped<G> {
    inner: G,
    cap: Option<u64>,
    emitted: u64,
}

impl<G: CandidateGenerator> Capped<G> {
    pub fn new(inner: G, cap: Option<u64>) -> Self {
        Self {
            inner,
            cap,
            emitted: 0,
        }
    }

    /// Returns the number of candidates emitted since the last reset.
    pub fn emitted(&self) -> u64 {
        self.emitted
    }

    pub fn into_inner(self) -> G {
        self.inner
    }

    fn remaining(&self) -> u64 {
        self.cap.map_or(u64::MAX, |cap| cap.saturating_sub(self.emitted))
    }
}

impl<G: CandidateGenerator> CandidateGenerator for Capped<G> {
    fn kind(&self) -> GeneratorKind {
        self.inner.kind()
    }

    fn next_batch(&mut self, max: usize, out: &mut Vec<Candidate>) -> CrackResult<usize> {
        let max = (max as u64).min(self.remaining()) as usize;
        if max == 0 {
            return Ok(0);
        }

        let count = self.inner.next_batch(max, out)?;
        self.emitted += count as u64;

        Ok(count)
    }

    fn is_exhausted(&self) -> bool {
        self.remaining() == 0 || self.inner.is_exhausted()
    }

    fn reset(&mut self) -> CrackResult<()> {
        self.emitted = 0;
        self.inner.reset()
    }

    fn is_capped(&self) -> bool {
        self.remaining() == 0 && !self.inner.is_exhausted()
    }

    fn sub_phases(&self) -> Vec<SubPhaseReport> {
        self.inner.sub_phases()
    }
}

/// Pulls every candidate out of a generator. Meant for small, capped generators.
pub fn drain<G: CandidateGenerator>(generator: &mut G, limit: usize) -> CrackResult<Vec<Candidate>> {
    let mut candidates = Vec::new();

    while candidates.len() < limit {
        let count = generator.next_batch(limit - candidates.len(), &mut candidates)?;
        if count == 0 {
            break;
        }
    }

    Ok(candidates)
}
