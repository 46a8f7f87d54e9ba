use std::{
    ops::Range,
    time::{Duration, Instant},
};

use crate::ctx::BruteForceCtx;

/// A length tier of a brute force: every password of one length.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Tier {
    pub length: u8,
    pub counters: Range<u64>,
}

/// An iterator over the length tiers of a brute force context, shortest first.
#[derive(Clone)]
pub struct TierIterator {
    length: u8,
    max_length: u8,
    search_spaces: Vec<u64>,
    n: u64,
}

impl TierIterator {
    pub fn new(ctx: &BruteForceCtx) -> Self {
        Self {
            length: ctx.min_password_length,
            max_length: ctx.max_password_length,
            search_spaces: ctx.search_spaces.clone(),
            n: ctx.n,
        }
    }
}

impl Iterator for TierIterator {
    type Item = Tier;

    fn next(&mut self) -> Option<Self::Item> {
        if self.length > self.max_length {
            return None;
        }

        let start = self.search_spaces[self.length as usize];
        // the last tier ends where the whole search space ends
        let end = self
            .search_spaces
            .get(self.length as usize + 1)
            .copied()
            .unwrap_or(self.n);

        let tier = Tier {
            length: self.length,
            counters: start..end,
        };
        self.length += 1;

        Some(tier)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let len = (self.max_length + 1).saturating_sub(self.length) as usize;
        (len, Some(len))
    }
}

impl ExactSizeIterator for TierIterator {}

/// The candidates tested since the previous progress report.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Window {
    pub candidates: u64,
    pub elapsed: Duration,
}

impl Window {
    /// The instantaneous hash rate, 0 when no time elapsed.
    pub fn hashes_per_second(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs == 0. {
            return 0.;
        }

        self.candidates as f64 / secs
    }
}

/// Decides when a progress report is due: every `every` candidates
/// or every `interval`, whichever comes first.
#[derive(Debug)]
pub struct Cadence {
    every: u64,
    interval: Duration,
    since_last: u64,
    last: Instant,
}

impl Cadence {
    pub fn new(every: u64, interval: Duration) -> Self {
        Self {
            every: every.max(1),
            interval,
            since_last: 0,
            last: Instant::now(),
        }
    }

    /// Registers one candidate.
    /// Returns the window closed by this candidate if a report is due.
    #[inline]
    pub fn tick(&mut self) -> Option<Window> {
        self.since_last += 1;

        // checking the clock on every candidate is too expensive
        let due = self.since_last >= self.every
            || (self.since_last % 1024 == 0 && self.last.elapsed() >= self.interval);

        if !due {
            return None;
        }

        let now = Instant::now();
        let window = Window {
            candidates: self.since_last,
            elapsed: now.duration_since(self.last),
        };
        self.since_last = 0;
        self.last = now;

        Some(window)
    }
}
