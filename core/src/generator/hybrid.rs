use std::sync::Arc;

use super::{CandidateGenerator, RuleCatalog, Wordlist};
use crate::{
    candidate::{Candidate, GeneratorKind, Word},
    error::CrackResult,
};

/// Passes every base word through an ordered pair of distinct rules,
/// the second rule being applied to the output of the first.
pub struct HybridGenerator {
    words: Wordlist,
    catalog: Arc<RuleCatalog>,
    /// Combined rule names, `first * len + second`.
    names: Vec<Option<Word>>,
    word_index: usize,
    first: usize,
    second: usize,
}

impl HybridGenerator {
    pub fn new(words: Wordlist, catalog: Arc<RuleCatalog>) -> Self {
        let rules = catalog.rules();
        let names = rules
            .iter()
            .enumerate()
            .flat_map(|(i, first)| {
                rules.iter().enumerate().map(move |(j, second)| {
                    (i != j).then(|| Word::from(format!("{}+{}", first.name, second.name)))
                })
            })
            .collect();

        let mut generator = Self {
            words,
            catalog,
            names,
            word_index: 0,
            first: 0,
            second: 0,
        };
        generator.skip_identical_pair();

        generator
    }

    fn skip_identical_pair(&mut self) {
        if self.first == self.second {
            self.advance();
        }
    }

    fn advance(&mut self) {
        let len = self.catalog.len();

        loop {
            self.second += 1;
            if self.second == len {
                self.second = 0;
                self.first += 1;
                if self.first == len {
                    self.first = 0;
                    self.word_index += 1;
                }
            }

            if self.first != self.second || self.is_exhausted() {
                break;
            }
        }
    }

    fn apply_pair(&self) -> Option<String> {
        let words = &*self.words;
        let year = self.catalog.reference_year();
        let next = (words.len() > 1).then(|| &*words[(self.word_index + 1) % words.len()]);

        let intermediate = self.catalog.apply(self.first, words, self.word_index)?;
        self.catalog.rules()[self.second]
            .mangle
            .apply(&intermediate, next, year)
    }
}

impl CandidateGenerator for HybridGenerator {
    fn kind(&self) -> GeneratorKind {
        GeneratorKind::Hybrid
    }

    fn next_batch(&mut self, max: usize, out: &mut Vec<Candidate>) -> CrackResult<usize> {
        // a single rule cannot form a pair
        if self.catalog.len() < 2 {
            self.word_index = self.words.len();
            return Ok(0);
        }

        let mut count = 0;
        while count < max && !self.is_exhausted() {
            if let Some(password) = self.apply_pair() {
                let name = &self.names[self.first * self.catalog.len() + self.second];
                if let Some(name) = name {
                    out.push(Candidate::mutated(
                        password,
                        GeneratorKind::Hybrid,
                        &self.words[self.word_index],
                        name,
                    ));
                    count += 1;
                }
            }

            self.advance();
        }

        Ok(count)
    }

    fn is_exhausted(&self) -> bool {
        self.word_index >= self.words.len()
    }

    fn reset(&mut self) -> CrackResult<()> {
        self.word_index = 0;
        self.first = 0;
        self.second = 0;
        self.skip_identical_pair();

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use itertools::Itertools;

    use crate::generator::{drain, CandidateGenerator, Capped, Mangle, Rule, RuleCatalog};

    use super::HybridGenerator;

    fn small_catalog() -> Arc<RuleCatalog> {
        Arc::new(RuleCatalog::from_rules(
            vec![
                Rule::new("capitalize", Mangle::Capitalize),
                Rule::new("append-1", Mangle::Append("1")),
                Rule::new("reverse", Mangle::Reverse),
            ],
            2024,
        ))
    }

    #[test]
    fn test_pairs_of_distinct_rules() {
        let words: Vec<Arc<str>> = vec![Arc::from("abc")];
        let mut generator = HybridGenerator::new(words.into(), small_catalog());

        let candidates = drain(&mut generator, usize::MAX).unwrap();
        let passwords = candidates.iter().map(|c| c.password.as_str()).collect_vec();

        assert_eq!(
            vec!["Abc1", "cbA", "Abc1", "1cba", "Cba", "cba1"],
            passwords
        );
        assert_eq!(
            Some("capitalize+append-1"),
            candidates[0].provenance.rule.as_deref()
        );
        assert_eq!(Some("abc"), candidates[0].provenance.base_word.as_deref());
        assert!(generator.is_exhausted());
    }

    #[test]
    fn test_capped_and_reset() {
        let words: Vec<Arc<str>> = vec![Arc::from("abc"), Arc::from("xyz")];
        let generator = HybridGenerator::new(words.into(), small_catalog());
        let mut capped = Capped::new(generator, Some(8));

        let first = drain(&mut capped, usize::MAX).unwrap();
        assert_eq!(8, first.len());
        assert!(capped.is_capped());

        capped.reset().unwrap();
        assert_eq!(first, drain(&mut capped, usize::MAX).unwrap());
    }
}
