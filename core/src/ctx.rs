use serde::{Deserialize, Serialize};

use crate::{
    error::{CrackError, CrackResult},
    scheduling::TierIterator,
    DEFAULT_CHARSET, DEFAULT_MAX_PASSWORD_LENGTH, MAX_PASSWORD_LENGTH_ALLOWED,
};

/// A builder for a brute force context.
#[derive(Clone, Debug)]
pub struct BruteForceCtxBuilder {
    charset: Vec<u8>,
    min_password_length: u8,
    max_password_length: u8,
}

impl Default for BruteForceCtxBuilder {
    fn default() -> Self {
        Self {
            charset: DEFAULT_CHARSET.to_owned(),
            min_password_length: 1,
            max_password_length: DEFAULT_MAX_PASSWORD_LENGTH,
        }
    }
}

impl BruteForceCtxBuilder {
    /// Creates a new BruteForceCtxBuilder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the charset of the context.
    pub fn charset(mut self, charset: &[u8]) -> Self {
        self.charset = charset.to_owned();

        self
    }

    /// Sets the minimum password length of the context.
    pub fn min_password_length(mut self, min_password_length: u8) -> Self {
        self.min_password_length = min_password_length;

        self
    }

    /// Sets the maximum password length of the context.
    pub fn max_password_length(mut self, max_password_length: u8) -> Self {
        self.max_password_length = max_password_length;

        self
    }

    /// Builds a BruteForceCtx with the specified parameters.
    pub fn build(mut self) -> CrackResult<BruteForceCtx> {
        if self.max_password_length > MAX_PASSWORD_LENGTH_ALLOWED as u8 {
            return Err(CrackError::MaxPasswordLengthExceeded(
                MAX_PASSWORD_LENGTH_ALLOWED as u8,
            ));
        }

        if self.min_password_length == 0 || self.min_password_length > self.max_password_length {
            return Err(CrackError::InvalidLengthRange {
                min: self.min_password_length,
                max: self.max_password_length,
            });
        }

        // lexicographic order within a length follows the charset order
        self.charset.sort_unstable();
        self.charset.dedup();
        if self.charset.is_empty() || !self.charset.is_ascii() {
            return Err(CrackError::EmptyCharset);
        }

        // create the search spaces
        let mut n: u128 = 0;
        let mut search_spaces = Vec::new();

        search_spaces.push(n as u64);
        for i in 0..self.max_password_length {
            n += (self.charset.len() as u128).pow(i as u32);
            search_spaces.push(n as u64);
        }
        n += (self.charset.len() as u128).pow(self.max_password_length as u32);

        // make sure the search space is <= 2^64
        if n > u64::MAX as u128 {
            return Err(CrackError::Space((n as f64).log2().ceil() as u8));
        }

        Ok(BruteForceCtx {
            search_spaces,
            n: n as u64,
            charset: self.charset,
            min_password_length: self.min_password_length,
            max_password_length: self.max_password_length,
        })
    }
}

/// Context used to store all parameters of an incremental brute force.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BruteForceCtx {
    /// The sorted charset used.
    pub charset: Vec<u8>,
    /// The minimum password length.
    pub min_password_length: u8,
    /// The maximum password length.
    pub max_password_length: u8,
    /// The size of the total search space, including the lengths below the minimum.
    pub n: u64,
    /// `search_spaces[len]` is the counter of the first password of length `len`.
    pub search_spaces: Vec<u64>,
}

impl BruteForceCtx {
    /// Returns the counter of the first candidate.
    pub fn first_counter(&self) -> u64 {
        self.search_spaces[self.min_password_length as usize]
    }

    /// Returns the number of candidates the context enumerates.
    pub fn candidate_count(&self) -> u64 {
        self.n - self.first_counter()
    }

    /// Returns the length tiers in enumeration order.
    pub fn tiers(&self) -> TierIterator {
        TierIterator::new(self)
    }

    /// Creates a plaintext from a counter.
    /// Within a length, counters follow the lexicographic order of the charset.
    pub fn counter_to_plaintext(&self, counter: u64) -> String {
        let len = self
            .search_spaces
            .iter()
            .rposition(|space| counter >= *space)
            .unwrap_or(0);

        let mut index = counter - self.search_spaces[len];
        let base = self.charset.len() as u64;

        let mut plaintext = vec![0; len];
        for c in plaintext.iter_mut().rev() {
            *c = charset_to_ascii(index % base, &self.charset);
            index /= base;
        }

        // the charset is checked to be ASCII when the context is built
        plaintext.into_iter().map(char::from).collect()
    }

    /// Creates a counter from a plaintext.
    /// Returns `None` if the plaintext is not part of the search space.
    pub fn plaintext_to_counter(&self, plaintext: &str) -> Option<u64> {
        let len = plaintext.len();
        if len > self.max_password_length as usize {
            return None;
        }

        let base = self.charset.len() as u64;
        let mut index = 0;
        for c in plaintext.bytes() {
            index = index * base + ascii_to_charset(c, &self.charset)? as u64;
        }

        Some(self.search_spaces[len] + index)
    }
}

/// Converts a character from a charset to its ASCII representation.
#[inline]
pub fn charset_to_ascii(n: u64, charset: &[u8]) -> u8 {
    charset[n as usize]
}

/// Converts an ASCII character to the given charset.
#[inline]
pub fn ascii_to_charset(c: u8, charset: &[u8]) -> Option<u8> {
    charset.binary_search(&c).ok().map(|i| i as u8)
}

#[cfg(test)]
pub fn build_test_ctx() -> BruteForceCtx {
    BruteForceCtxBuilder::new()
        .charset(b"cab")
        .max_password_length(3)
        .build()
        .unwrap()
}

#[cfg(test)]
mod tests {
    use crate::error::CrackError;

    use super::{ascii_to_charset, build_test_ctx, BruteForceCtxBuilder};

    #[test]
    fn test_ascii_to_charset() {
        assert_eq!(Some(0), ascii_to_charset(b'a', b"abc"));
        assert_eq!(Some(2), ascii_to_charset(b'c', b"abc"));
        assert_eq!(None, ascii_to_charset(b'z', b"abc"));
    }

    #[test]
    fn test_counter_to_plaintext() {
        let ctx = build_test_ctx();

        let plaintexts = (0..14).map(|i| ctx.counter_to_plaintext(i));

        let expected = [
            "", "a", "b", "c", "aa", "ab", "ac", "ba", "bb", "bc", "ca", "cb", "cc", "aaa",
        ];

        assert!(expected.into_iter().eq(plaintexts));
    }

    #[test]
    fn test_plaintext_to_counter() {
        let ctx = build_test_ctx();

        let counters = [
            "", "a", "b", "c", "aa", "ab", "ac", "ba", "bb", "bc", "ca", "cb", "cc", "aaa",
        ]
        .map(|plaintext| ctx.plaintext_to_counter(plaintext).unwrap());

        let expected = 0..14;

        assert!(expected.into_iter().eq(counters));
        assert_eq!(None, ctx.plaintext_to_counter("abd"));
        assert_eq!(None, ctx.plaintext_to_counter("aaaa"));
    }

    #[test]
    fn test_search_spaces() {
        let ctx = build_test_ctx();
        assert_eq!(vec![0, 1, 4, 13], ctx.search_spaces);
        assert_eq!(40, ctx.n);
        assert_eq!(39, ctx.candidate_count());
    }

    #[test]
    fn test_invalid_contexts() {
        assert!(matches!(
            BruteForceCtxBuilder::new().max_password_length(11).build(),
            Err(CrackError::MaxPasswordLengthExceeded(10))
        ));
        assert!(matches!(
            BruteForceCtxBuilder::new().min_password_length(0).build(),
            Err(CrackError::InvalidLengthRange { .. })
        ));
        assert!(matches!(
            BruteForceCtxBuilder::new().charset(b"").build(),
            Err(CrackError::EmptyCharset)
        ));

        let wide_charset: Vec<u8> = (0u8..128).collect();
        assert!(matches!(
            BruteForceCtxBuilder::new()
                .charset(&wide_charset)
                .max_password_length(10)
                .build(),
            Err(CrackError::Space(_))
        ));
    }
}
