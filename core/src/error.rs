use std::io;

use serde::Serialize;
use thiserror::Error;

use crate::report::AttackResult;

pub type CrackResult<T> = std::result::Result<T, CrackError>;

/// The stable classification of an error, safe to expose to callers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    /// The caller supplied malformed input. Nothing was attempted.
    InputValidation,
    /// The engine is not configured for the request.
    UnsupportedConfiguration,
    /// A generator failed while a session was running.
    InternalGeneratorFault,
}

#[derive(Error, Debug)]
pub enum CrackError {
    #[error("`{0}` is not a hexadecimal MD5, SHA1 or SHA256 digest")]
    InvalidHashFormat(String),

    #[error("The {algorithm} digest should be {expected} hexadecimal characters long, got {actual}")]
    HashLengthMismatch {
        algorithm: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Unsupported hash algorithm `{0}`, expected one of md5, sha1, sha256")]
    UnsupportedAlgorithm(String),

    #[error("The profile field `{0}` is required")]
    MissingRequiredProfileField(&'static str),

    #[error("The profile field `{field}` is invalid: {reason}")]
    InvalidProfileField { field: &'static str, reason: String },

    #[error("The charset should only contain ASCII characters and not be empty")]
    EmptyCharset,

    #[error("The maximum password length is {0}")]
    MaxPasswordLengthExceeded(u8),

    #[error("Invalid length range {min}..={max}")]
    InvalidLengthRange { min: u8, max: u8 },

    #[error("Only search spaces up to 2^64 are supported, but the provided space is 2^{0}")]
    Space(u8),

    #[error("The phases should follow the order {expected} without repetition, got {actual}")]
    InvalidPhasePlan { expected: String, actual: String },

    #[error("A Markov phase was requested but no Markov model is loaded")]
    MissingMarkovModel,

    #[error("The strength network is malformed: {0}")]
    InvalidNetwork(String),

    #[error("Unable to access the file at the given path. Make sure the right permissions are available")]
    Io(#[from] io::Error),

    #[error("Failed to serialize the artifact")]
    Serialize,

    #[error("Failed to deserialize the artifact. Is the file corrupted?")]
    Deserialize,

    #[error("The {phase} generator failed: {message}")]
    PhaseGenerator { phase: &'static str, message: String },

    #[error("The session was aborted: {source}")]
    Aborted {
        #[source]
        source: Box<CrackError>,
        partial: Box<AttackResult>,
    },
}

impl CrackError {
    /// Returns the stable kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidHashFormat(_)
            | Self::HashLengthMismatch { .. }
            | Self::MissingRequiredProfileField(_)
            | Self::InvalidProfileField { .. }
            | Self::EmptyCharset
            | Self::MaxPasswordLengthExceeded(_)
            | Self::InvalidLengthRange { .. }
            | Self::InvalidPhasePlan { .. }
            | Self::Space(_) => ErrorKind::InputValidation,

            Self::UnsupportedAlgorithm(_)
            | Self::MissingMarkovModel
            | Self::InvalidNetwork(_)
            | Self::Io(_)
            | Self::Serialize
            | Self::Deserialize => ErrorKind::UnsupportedConfiguration,

            Self::PhaseGenerator { .. } | Self::Aborted { .. } => {
                ErrorKind::InternalGeneratorFault
            }
        }
    }

    /// Returns the statistics gathered before an aborted session stopped.
    pub fn partial_result(&self) -> Option<&AttackResult> {
        match self {
            Self::Aborted { partial, .. } => Some(partial),
            _ => None,
        }
    }
}
