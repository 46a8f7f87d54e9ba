use super::CandidateGenerator;
use crate::{
    candidate::{Candidate, GeneratorKind, Word},
    ctx::BruteForceCtx,
    error::CrackResult,
};

/// Enumerates every string of the search space, shortest first.
pub struct BruteForceGenerator {
    ctx: BruteForceCtx,
    counter: u64,
    pattern: Word,
}

impl BruteForceGenerator {
    pub fn new(ctx: BruteForceCtx) -> Self {
        let pattern = Word::from(format!(
            "incremental-{}..={}",
            ctx.min_password_length, ctx.max_password_length
        ));

        Self {
            counter: ctx.first_counter(),
            ctx,
            pattern,
        }
    }

    pub fn ctx(&self) -> &BruteForceCtx {
        &self.ctx
    }
}

impl CandidateGenerator for BruteForceGenerator {
    fn kind(&self) -> GeneratorKind {
        GeneratorKind::BruteForce
    }

    fn next_batch(&mut self, max: usize, out: &mut Vec<Candidate>) -> CrackResult<usize> {
        let end = self.counter.saturating_add(max as u64).min(self.ctx.n);
        out.extend((self.counter..end).map(|counter| {
            Candidate::new(
                self.ctx.counter_to_plaintext(counter),
                GeneratorKind::BruteForce,
                &self.pattern,
            )
        }));

        let count = (end - self.counter) as usize;
        self.counter = end;

        Ok(count)
    }

    fn is_exhausted(&self) -> bool {
        self.counter >= self.ctx.n
    }

    fn reset(&mut self) -> CrackResult<()> {
        self.counter = self.ctx.first_counter();

        Ok(())
    }
}
