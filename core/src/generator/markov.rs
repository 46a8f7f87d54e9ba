use std::{
    cmp::Ordering,
    collections::{BTreeMap, HashSet},
    sync::Arc,
};

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::CandidateGenerator;
use crate::{
    artifact::Artifact,
    candidate::{Candidate, GeneratorKind, Word},
    error::{CrackError, CrackResult},
    DEFAULT_BEAM_WIDTH, DEFAULT_MARKOV_CAP, DEFAULT_MARKOV_MAX_LENGTH, DEFAULT_MARKOV_MIN_LENGTH,
};

/// Pads the beginning of every word so the first characters have a full context.
const START: char = '\u{2}';

/// A possible continuation of a context. `None` ends the word.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    pub next: Option<char>,
    pub probability: f64,
}

/// A character n-gram model.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MarkovModel {
    order: usize,
    /// Transitions of every context, most probable first.
    contexts: BTreeMap<String, Vec<Transition>>,
}

impl Artifact for MarkovModel {
    fn validate(&self) -> CrackResult<()> {
        if self.order == 0 {
            return Err(CrackError::Deserialize);
        }

        Ok(())
    }
}

impl MarkovModel {
    /// Trains a model of the given order over a corpus of words.
    pub fn train<I, S>(words: I, order: usize) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let order = order.max(1);
        let mut counts: BTreeMap<String, BTreeMap<Option<char>, u64>> = BTreeMap::new();
        let mut trained = 0;

        for word in words {
            let word = word.as_ref();
            if word.is_empty() {
                continue;
            }

            let padded = std::iter::repeat(START)
                .take(order)
                .chain(word.chars())
                .collect::<Vec<_>>();

            for (i, window) in padded.windows(order).enumerate() {
                let next = padded.get(i + order).copied();
                *counts
                    .entry(window.iter().collect())
                    .or_default()
                    .entry(next)
                    .or_default() += 1;
            }
            trained += 1;
        }

        let contexts = counts
            .into_iter()
            .map(|(context, nexts)| {
                let total = nexts.values().sum::<u64>() as f64;
                let mut transitions = nexts
                    .into_iter()
                    .map(|(next, count)| Transition {
                        next,
                        probability: count as f64 / total,
                    })
                    .collect::<Vec<_>>();

                transitions.sort_by(|a, b| {
                    b.probability
                        .partial_cmp(&a.probability)
                        .unwrap_or(Ordering::Equal)
                        .then(a.next.cmp(&b.next))
                });

                (context, transitions)
            })
            .collect::<BTreeMap<_, _>>();

        debug!(order, words = trained, contexts = contexts.len(), "trained markov model");
        Self { order, contexts }
    }

    pub fn order(&self) -> usize {
        self.order
    }

    /// Returns the transitions following the end of `text`.
    pub fn transitions(&self, text: &str) -> &[Transition] {
        let len = text.chars().count();
        let context = std::iter::repeat(START)
            .take(self.order.saturating_sub(len))
            .chain(text.chars().skip(len.saturating_sub(self.order)))
            .collect::<String>();

        self.contexts.get(&context).map_or(&[], Vec::as_slice)
    }
}

/// Parameters of the beam search.
#[derive(Clone, Debug)]
pub struct MarkovConfig {
    pub beam_width: usize,
    pub min_length: usize,
    pub max_length: usize,
    pub cap: usize,
}

impl Default for MarkovConfig {
    fn default() -> Self {
        Self {
            beam_width: DEFAULT_BEAM_WIDTH,
            min_length: DEFAULT_MARKOV_MIN_LENGTH,
            max_length: DEFAULT_MARKOV_MAX_LENGTH,
            cap: DEFAULT_MARKOV_CAP,
        }
    }
}

#[inline]
fn by_score(a: &(String, f64), b: &(String, f64)) -> Ordering {
    b.1.partial_cmp(&a.1)
        .unwrap_or(Ordering::Equal)
        .then_with(|| a.0.cmp(&b.0))
}

/// Runs a beam search over the model.
/// Returns the finished strings and their log-probability, most probable first.
pub fn beam_search(model: &MarkovModel, config: &MarkovConfig) -> Vec<(String, f64)> {
    let mut beam = vec![(String::new(), 0.0)];
    let mut finished = Vec::new();

    for length in 0..=config.max_length {
        let mut expanded = Vec::new();

        for (text, score) in &beam {
            for transition in model.transitions(text) {
                let score = score + transition.probability.ln();
                match transition.next {
                    None if length >= config.min_length => finished.push((text.clone(), score)),
                    None => (),
                    Some(c) if length < config.max_length => {
                        let mut text = text.clone();
                        text.push(c);
                        expanded.push((text, score));
                    }
                    Some(_) => (),
                }
            }
        }

        if expanded.is_empty() {
            break;
        }

        expanded.sort_unstable_by(by_score);
        expanded.truncate(config.beam_width.max(1));
        beam = expanded;
    }

    finished.sort_unstable_by(by_score);
    let mut seen = HashSet::new();
    finished.retain(|(text, _)| seen.insert(text.clone()));
    finished.truncate(config.cap);

    finished
}

/// Yields the most probable strings of a Markov model.
pub struct MarkovGenerator {
    model: Arc<MarkovModel>,
    config: MarkovConfig,
    pattern: Word,
    ranked: Option<Vec<String>>,
    position: usize,
}

impl MarkovGenerator {
    pub fn new(model: Arc<MarkovModel>, config: MarkovConfig) -> Self {
        let pattern = Word::from(format!("beam-search-{}", model.order()));

        Self {
            model,
            config,
            pattern,
            ranked: None,
            position: 0,
        }
    }
}

impl CandidateGenerator for MarkovGenerator {
    fn kind(&self) -> GeneratorKind {
        GeneratorKind::Markov
    }

    fn next_batch(&mut self, max: usize, out: &mut Vec<Candidate>) -> CrackResult<usize> {
        let ranked = self.ranked.get_or_insert_with(|| {
            beam_search(&self.model, &self.config)
                .into_iter()
                .map(|(text, _)| text)
                .collect()
        });

        let end = self.position.saturating_add(max).min(ranked.len());
        out.extend(
            ranked[self.position..end]
                .iter()
                .map(|text| Candidate::new(text.clone(), GeneratorKind::Markov, &self.pattern)),
        );
        let count = end - self.position;
        self.position = end;

        Ok(count)
    }

    fn is_exhausted(&self) -> bool {
        self.ranked
            .as_ref()
            .is_some_and(|ranked| self.position >= ranked.len())
    }

    fn reset(&mut self) -> CrackResult<()> {
        self.position = 0;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use itertools::Itertools;

    use crate::{
        artifact::Artifact,
        generator::{drain, CandidateGenerator},
    };

    use super::{beam_search, MarkovConfig, MarkovGenerator, MarkovModel};

    fn config() -> MarkovConfig {
        MarkovConfig {
            beam_width: 64,
            min_length: 4,
            max_length: 8,
            cap: 100,
        }
    }

    fn model() -> MarkovModel {
        MarkovModel::train(["password", "pass", "passport"], 2)
    }

    #[test]
    fn test_training_normalizes_counts() {
        let model = model();
        for text in ["", "p", "pa", "pass", "passwo"] {
            let total: f64 = model.transitions(text).iter().map(|t| t.probability).sum();
            assert!((total - 1.0).abs() < 1e-9);
        }

        // after "ss" the word ends, continues with 'w' or with 'p'
        assert_eq!(3, model.transitions("pass").len());
        assert!(model.transitions("zz").is_empty());
    }

    #[test]
    fn test_beam_search_ordering() {
        let ranked = beam_search(&model(), &config());

        assert_eq!("pass", ranked[0].0);
        assert!(ranked.iter().any(|(text, _)| text == "password"));
        assert!(ranked.iter().tuple_windows().all(|(a, b)| a.1 >= b.1));
        assert!(ranked.iter().all(|(text, _)| (4..=8).contains(&text.len())));
        assert_eq!(ranked.len(), ranked.iter().map(|(text, _)| text).unique().count());

        // equal scores are ranked lexicographically
        let tied = ranked
            .iter()
            .filter(|(_, score)| (score - ranked[1].1).abs() < 1e-9)
            .map(|(text, _)| text.as_str())
            .collect_vec();
        assert_eq!(vec!["passpord", "passport", "password", "passwort"], tied);
    }

    #[test]
    fn test_beam_search_cap() {
        let ranked = beam_search(
            &model(),
            &MarkovConfig {
                cap: 2,
                ..config()
            },
        );
        assert_eq!(2, ranked.len());
    }

    #[test]
    fn test_generator_replays() {
        let mut generator = MarkovGenerator::new(Arc::new(model()), config());
        assert!(!generator.is_exhausted());

        let first = drain(&mut generator, 100).unwrap();
        assert!(generator.is_exhausted());
        generator.reset().unwrap();
        assert_eq!(first, drain(&mut generator, 100).unwrap());
    }

    #[test]
    fn test_store_and_load() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let model = model();

        model.store(file.path()).unwrap();
        assert_eq!(model, MarkovModel::load(file.path()).unwrap());
    }
}
