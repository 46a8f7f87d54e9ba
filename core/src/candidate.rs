use std::{fmt::Display, sync::Arc};

use serde::{Deserialize, Serialize};

/// A word shared between generators without copying it.
pub type Word = Arc<str>;

/// The closed set of candidate generation strategies.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GeneratorKind {
    Dictionary,
    Rules,
    Markov,
    Profile,
    Hybrid,
    BruteForce,
}

impl GeneratorKind {
    /// The phase plan used when the caller does not provide one.
    pub const DEFAULT_PLAN: [GeneratorKind; 6] = [
        Self::Dictionary,
        Self::Rules,
        Self::Markov,
        Self::Profile,
        Self::Hybrid,
        Self::BruteForce,
    ];

    /// Returns the name reported for phases of this kind.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Dictionary => "Dictionary",
            Self::Rules => "Rule-Mutation",
            Self::Markov => "Markov",
            Self::Profile => "Profile-Heuristic",
            Self::Hybrid => "Hybrid",
            Self::BruteForce => "Brute-Force",
        }
    }
}

impl Display for GeneratorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Where a candidate comes from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Provenance {
    pub kind: GeneratorKind,
    /// The pattern that produced the candidate: a rule name, a profile sub-phase...
    pub pattern: Word,
    pub base_word: Option<Word>,
    pub rule: Option<Word>,
}

/// A plaintext hypothesis. Discarded once tested unless it is the winner.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Candidate {
    pub password: String,
    pub provenance: Provenance,
}

impl Candidate {
    pub fn new(password: String, kind: GeneratorKind, pattern: &Word) -> Self {
        Self {
            password,
            provenance: Provenance {
                kind,
                pattern: pattern.clone(),
                base_word: None,
                rule: None,
            },
        }
    }

    /// Creates a candidate derived from a base word by a rule.
    pub fn mutated(password: String, kind: GeneratorKind, base_word: &Word, rule: &Word) -> Self {
        Self {
            password,
            provenance: Provenance {
                kind,
                pattern: rule.clone(),
                base_word: Some(base_word.clone()),
                rule: Some(rule.clone()),
            },
        }
    }
}
