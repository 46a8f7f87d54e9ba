//! Multi-strategy password guessing: dictionary, rules, Markov chains,
//! personal profiles and incremental brute force against MD5, SHA1 and SHA256 digests.

pub mod artifact;
pub mod candidate;
pub mod ctx;
pub mod engine;
pub mod error;
pub mod event;
pub mod generator;
pub mod hash;
pub mod live;
pub mod orchestrator;
pub mod report;
pub mod scheduling;
pub mod strength;

use std::time::Duration;

pub use {
    artifact::Artifact,
    candidate::{Candidate, GeneratorKind, Provenance},
    ctx::{BruteForceCtx, BruteForceCtxBuilder},
    engine::{AttackOptions, Engine, EngineConfig, GuessOptions, GuessSource, MarkovSource},
    error::{CrackError, CrackResult, ErrorKind},
    event::{LiveHandle, LiveOutcome, ProgressEvent, ProgressKind},
    generator::{MarkovConfig, MarkovModel, Profile, WordSource},
    hash::{identify_hash, HashFunction, HashIdentification, HashStrength, HashTarget},
    live::LiveOptions,
    orchestrator::{AttackSession, ExhaustionReason, SessionStatus},
    report::{AttackResult, Guess, GuessReport, PhaseReport, SubPhaseReport},
    strength::{StrengthClass, StrengthPrediction},
};

/// The default charset.
pub const DEFAULT_CHARSET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// The default maximum password length.
pub const DEFAULT_MAX_PASSWORD_LENGTH: u8 = 6;

/// The maximum password size allowed.
pub const MAX_PASSWORD_LENGTH_ALLOWED: usize = 10;

/// The default number of candidates hashed per batch.
pub const DEFAULT_BATCH_SIZE: usize = 4096;

/// The default maximum number of candidates of the rule phase.
pub const DEFAULT_RULE_CAP: u64 = 500_000;

/// The default maximum number of candidates of the hybrid phase.
pub const DEFAULT_HYBRID_CAP: u64 = 1_000_000;

/// The default context length of a trained Markov model.
pub const DEFAULT_MARKOV_ORDER: usize = 3;

/// The default number of partial strings kept at each step of the beam search.
pub const DEFAULT_BEAM_WIDTH: usize = 1024;

/// The default shortest candidate of the Markov phase.
pub const DEFAULT_MARKOV_MIN_LENGTH: usize = 4;

/// The default longest candidate of the Markov phase.
pub const DEFAULT_MARKOV_MAX_LENGTH: usize = 10;

/// The default maximum number of candidates of the Markov phase.
pub const DEFAULT_MARKOV_CAP: usize = 10_000;

/// The default number of candidates between two live progress events.
pub const DEFAULT_PROGRESS_EVERY: u64 = 50_000;

/// The default maximum time between two live progress events.
pub const DEFAULT_PROGRESS_INTERVAL: Duration = Duration::from_millis(250);

/// The default number of live events buffered for a slow consumer.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// The default number of guesses returned when no hash is attacked.
pub const DEFAULT_GUESS_LIMIT: usize = 1000;

/// Common passwords, one per line, most common first.
pub const COMMON_PASSWORDS: &str = include_str!("../data/common_passwords.txt");
