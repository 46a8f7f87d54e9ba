use std::{fmt::Display, str::FromStr};

use digest::{Digest as _, DynDigest};
use md5::Md5;
use serde::{Deserialize, Serialize};
use sha1::Sha1;
use sha2::Sha256;

use crate::error::{CrackError, CrackResult};

/// All the supported hash functions.
#[derive(Copy, Clone, Debug, Deserialize, Serialize, PartialEq, Eq, Hash)]
pub enum HashFunction {
    Md5,
    Sha1,
    Sha256,
}

impl HashFunction {
    /// Returns the CPU implementation of this hash.
    pub fn cpu(&self) -> Box<dyn DynDigest + Send> {
        match self {
            Self::Md5 => Box::new(Md5::new()),
            Self::Sha1 => Box::new(Sha1::new()),
            Self::Sha256 => Box::new(Sha256::new()),
        }
    }

    /// Returns the size of a digest in bytes.
    pub fn digest_size(&self) -> usize {
        match self {
            Self::Md5 => 16,
            Self::Sha1 => 20,
            Self::Sha256 => 32,
        }
    }

    /// Returns the length of a digest written in hexadecimal.
    pub fn hex_len(&self) -> usize {
        self.digest_size() * 2
    }

    /// Guesses the hash function from the length of a hexadecimal digest.
    pub fn from_hex_len(len: usize) -> Option<Self> {
        match len {
            32 => Some(Self::Md5),
            40 => Some(Self::Sha1),
            64 => Some(Self::Sha256),
            _ => None,
        }
    }

    /// Returns the qualitative strength of this hash function for password storage.
    pub fn strength(&self) -> HashStrength {
        match self {
            Self::Md5 => HashStrength::VeryWeak,
            Self::Sha1 => HashStrength::Weak,
            Self::Sha256 => HashStrength::Strong,
        }
    }

    /// Hashes a plaintext and returns the digest in lowercase hexadecimal.
    pub fn hash_hex(&self, plaintext: &str) -> String {
        let mut hasher = self.cpu();
        hasher.update(plaintext.as_bytes());
        hex::encode(hasher.finalize_reset())
    }

    fn name(&self) -> &'static str {
        match self {
            Self::Md5 => "MD5",
            Self::Sha1 => "SHA1",
            Self::Sha256 => "SHA256",
        }
    }
}

impl Display for HashFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for HashFunction {
    type Err = CrackError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "md5" => Ok(Self::Md5),
            "sha1" | "sha-1" => Ok(Self::Sha1),
            "sha256" | "sha-256" | "sha2-256" => Ok(Self::Sha256),
            _ => Err(CrackError::UnsupportedAlgorithm(s.to_owned())),
        }
    }
}

/// Advisory rating of a hash function. It never influences the attack plan.
#[derive(Copy, Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum HashStrength {
    VeryWeak,
    Weak,
    Strong,
}

impl Display for HashStrength {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::VeryWeak => "Very Weak",
            Self::Weak => "Weak",
            Self::Strong => "Strong",
        })
    }
}

/// What can be inferred from a hash string alone.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct HashIdentification {
    #[serde(rename = "type")]
    pub hash_function: HashFunction,
    pub length: usize,
    pub strength: HashStrength,
}

/// Classifies a hash string by its length and charset.
pub fn identify_hash(hash: &str) -> CrackResult<HashIdentification> {
    let hash = hash.trim();
    if !hash.bytes().all(|c| c.is_ascii_hexdigit()) {
        return Err(CrackError::InvalidHashFormat(hash.to_owned()));
    }

    let hash_function = HashFunction::from_hex_len(hash.len())
        .ok_or_else(|| CrackError::InvalidHashFormat(hash.to_owned()))?;

    Ok(HashIdentification {
        hash_function,
        length: hash.len(),
        strength: hash_function.strength(),
    })
}

/// The hash under attack. Immutable once created.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HashTarget {
    pub raw_hash: String,
    pub hash_function: HashFunction,
    pub length: usize,
    pub strength: HashStrength,
    #[serde(skip)]
    digest: Vec<u8>,
}

impl HashTarget {
    /// Creates a target, inferring the hash function from the digest length
    /// unless one is given. A given hash function must agree with the length.
    pub fn new(hash: &str, hash_function: Option<HashFunction>) -> CrackResult<Self> {
        let identification = identify_hash(hash)?;
        let hash_function = match hash_function {
            Some(hf) if hf != identification.hash_function => {
                return Err(CrackError::HashLengthMismatch {
                    algorithm: hf.name(),
                    expected: hf.hex_len(),
                    actual: identification.length,
                })
            }
            Some(hf) => hf,
            None => identification.hash_function,
        };

        let raw_hash = hash.trim().to_owned();
        let digest =
            hex::decode(&raw_hash).map_err(|_| CrackError::InvalidHashFormat(raw_hash.clone()))?;

        Ok(Self {
            raw_hash,
            hash_function,
            length: identification.length,
            strength: identification.strength,
            digest,
        })
    }

    /// Returns the decoded digest.
    pub fn digest(&self) -> &[u8] {
        &self.digest
    }

    /// Returns a hasher bound to this target.
    pub fn matcher(&self) -> DigestMatcher<'_> {
        DigestMatcher {
            hasher: self.hash_function.cpu(),
            buf: vec![0; self.hash_function.digest_size()],
            target: &self.digest,
        }
    }
}

/// A reusable hasher comparing plaintexts against a target digest.
/// Comparing decoded bytes makes the comparison insensitive to the case of the hex input.
pub struct DigestMatcher<'a> {
    hasher: Box<dyn DynDigest + Send>,
    buf: Vec<u8>,
    target: &'a [u8],
}

impl DigestMatcher<'_> {
    #[inline]
    pub fn matches(&mut self, plaintext: &str) -> bool {
        self.hasher.update(plaintext.as_bytes());
        // the buffer always has the digest size of the hasher
        if self.hasher.finalize_into_reset(&mut self.buf).is_err() {
            return false;
        }
        self.buf == self.target
    }
}
