use std::{collections::HashMap, fmt::Display};

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::{
    artifact::Artifact,
    error::{CrackError, CrackResult},
};

/// The layer sizes of the network, input first.
pub const NETWORK_SHAPE: [usize; 4] = [FEATURE_COUNT, 32, 16, CLASS_COUNT];

pub const FEATURE_COUNT: usize = 15;

pub const CLASS_COUNT: usize = 4;

/// The names of the features, in order.
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "length",
    "lowercase",
    "uppercase",
    "digits",
    "symbols",
    "character classes",
    "pool size",
    "shannon entropy",
    "entropy bits",
    "dictionary hits",
    "sequential run",
    "repeated run",
    "unique ratio",
    "keyboard walk",
    "trailing digits",
];

const KEYBOARD_ROWS: [&str; 4] = ["1234567890", "qwertyuiop", "asdfghjkl", "zxcvbnm"];

/// Shortest keyboard walk and dictionary word taken into account.
const MIN_PATTERN_LEN: usize = 4;

/// The strength classes, weakest first.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum StrengthClass {
    VeryWeak,
    Weak,
    Medium,
    Strong,
}

impl StrengthClass {
    pub const ALL: [StrengthClass; CLASS_COUNT] =
        [Self::VeryWeak, Self::Weak, Self::Medium, Self::Strong];
}

impl Display for StrengthClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::VeryWeak => "Very Weak",
            Self::Weak => "Weak",
            Self::Medium => "Medium",
            Self::Strong => "Strong",
        })
    }
}

#[inline]
fn unleet(c: char) -> char {
    match c {
        '4' | '@' => 'a',
        '3' => 'e',
        '1' => 'i',
        '0' => 'o',
        '5' | '$' => 's',
        c => c,
    }
}

fn normalize(word: &str) -> String {
    word.to_lowercase().chars().map(unleet).collect()
}

/// Returns the longest run of characters whose code points differ by `step`,
/// in either direction when `step` is not 0.
fn longest_run(chars: &[char], step: i64) -> usize {
    let mut longest = chars.len().min(1);
    let mut run = 1;
    let mut direction = 0;

    for pair in chars.windows(2) {
        let diff = pair[1] as i64 - pair[0] as i64;
        if diff.abs() == step {
            run = if run > 1 && diff == direction { run + 1 } else { 2 };
            direction = diff;
        } else {
            run = 1;
        }
        longest = longest.max(run);
    }

    longest
}

fn is_keyboard_walk(chars: &[char]) -> bool {
    let lower = chars.iter().flat_map(|c| c.to_lowercase()).collect_vec();

    lower.windows(MIN_PATTERN_LEN).any(|window| {
        let forward = window.iter().collect::<String>();
        let backward = window.iter().rev().collect::<String>();
        KEYBOARD_ROWS
            .iter()
            .any(|row| row.contains(&forward) || row.contains(&backward))
    })
}

/// 1 for a trailing year, 0.5 for other trailing digits.
fn trailing_digits(password: &str) -> f64 {
    let digits = password
        .chars()
        .rev()
        .take_while(char::is_ascii_digit)
        .collect_vec();

    let year = digits.len() >= 4
        && digits[..4]
            .iter()
            .rev()
            .collect::<String>()
            .parse::<u32>()
            .is_ok_and(|year| (1900..=2099).contains(&year));

    if year {
        1.
    } else if !digits.is_empty() {
        0.5
    } else {
        0.
    }
}

/// Extracts the features of a password.
pub fn extract_features(password: &str, dictionary: &[String]) -> [f64; FEATURE_COUNT] {
    let chars = password.chars().collect_vec();
    let len = chars.len();

    let lower = chars.iter().filter(|c| c.is_lowercase()).count();
    let upper = chars.iter().filter(|c| c.is_uppercase()).count();
    let digits = chars.iter().filter(|c| c.is_ascii_digit()).count();
    let symbols = len - lower - upper - digits;

    let classes = [(lower, 26), (upper, 26), (digits, 10), (symbols, 33)];
    let class_count = classes.iter().filter(|(count, _)| *count > 0).count();
    let pool: usize = classes
        .iter()
        .filter(|(count, _)| *count > 0)
        .map(|(_, size)| size)
        .sum();

    let mut frequencies = HashMap::new();
    for c in &chars {
        *frequencies.entry(c).or_insert(0usize) += 1;
    }
    let shannon = frequencies
        .values()
        .map(|&count| {
            let p = count as f64 / len as f64;
            -p * p.log2()
        })
        .sum::<f64>();

    let bits = if pool > 0 {
        len as f64 * (pool as f64).log2()
    } else {
        0.
    };

    let normalized = normalize(password);
    let hits = dictionary
        .iter()
        .filter(|word| normalized.contains(word.as_str()))
        .count();

    let unique_ratio = if len > 0 {
        frequencies.len() as f64 / len as f64
    } else {
        0.
    };

    [
        len as f64,
        lower as f64,
        upper as f64,
        digits as f64,
        symbols as f64,
        class_count as f64,
        pool as f64,
        shannon,
        bits,
        hits as f64,
        longest_run(&chars, 1) as f64,
        longest_run(&chars, 0) as f64,
        unique_ratio,
        if is_keyboard_walk(&chars) { 1. } else { 0. },
        trailing_digits(password),
    ]
}

/// A fully connected layer. `weights` has one row per output.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DenseLayer {
    pub weights: Vec<Vec<f64>>,
    pub biases: Vec<f64>,
}

impl DenseLayer {
    fn zeros(inputs: usize, outputs: usize) -> Self {
        Self {
            weights: vec![vec![0.; inputs]; outputs],
            biases: vec![0.; outputs],
        }
    }

    fn forward(&self, input: &[f64]) -> Vec<f64> {
        self.weights
            .iter()
            .zip(&self.biases)
            .map(|(row, bias)| row.iter().zip(input).map(|(w, x)| w * x).sum::<f64>() + bias)
            .collect()
    }
}

/// A 15→32→16→4 feedforward network with ReLU hidden layers and a softmax output.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StrengthNetwork {
    layers: Vec<DenseLayer>,
}

impl Artifact for StrengthNetwork {
    fn validate(&self) -> CrackResult<()> {
        if self.layers.len() != NETWORK_SHAPE.len() - 1 {
            return Err(CrackError::InvalidNetwork(format!(
                "expected {} layers, got {}",
                NETWORK_SHAPE.len() - 1,
                self.layers.len()
            )));
        }

        for (i, (layer, shape)) in self.layers.iter().zip(NETWORK_SHAPE.windows(2)).enumerate() {
            let (inputs, outputs) = (shape[0], shape[1]);
            let valid = layer.weights.len() == outputs
                && layer.biases.len() == outputs
                && layer.weights.iter().all(|row| row.len() == inputs);

            if !valid {
                return Err(CrackError::InvalidNetwork(format!(
                    "layer {i} should map {inputs} inputs to {outputs} outputs"
                )));
            }

            let finite = layer.weights.iter().flatten().chain(&layer.biases).all(|w| w.is_finite());
            if !finite {
                return Err(CrackError::InvalidNetwork(format!(
                    "layer {i} has non finite weights"
                )));
            }
        }

        Ok(())
    }
}

impl StrengthNetwork {
    /// Creates a network from its layers, checking their shapes.
    pub fn new(layers: Vec<DenseLayer>) -> CrackResult<Self> {
        let network = Self { layers };
        network.validate()?;

        Ok(network)
    }

    /// Returns the built-in network.
    ///
    /// The first layer forwards the features and computes how far the sequential
    /// and repeated runs go beyond two characters. The second layer scores the
    /// password from its entropy minus its penalties, split into a positive and a
    /// negative unit. The output layer turns the score into four logits whose
    /// argmax moves from `VeryWeak` to `Strong` as the score grows.
    pub fn reference() -> Self {
        let [inputs, first, second, outputs] = NETWORK_SHAPE;

        let mut l1 = DenseLayer::zeros(inputs, first);
        for i in 0..inputs {
            l1.weights[i][i] = 1.;
        }
        l1.weights[15][10] = 1.;
        l1.biases[15] = -2.;
        l1.weights[16][11] = 1.;
        l1.biases[16] = -2.;

        let mut l2 = DenseLayer::zeros(first, second);
        let score = [(8, 0.04), (9, -1.2), (13, -0.5), (14, -0.2), (15, -0.15), (16, -0.15)];
        for (input, weight) in score {
            l2.weights[0][input] = weight;
            l2.weights[1][input] = -weight;
        }

        let mut l3 = DenseLayer::zeros(second, outputs);
        let logits = [(0., 0.), (3., -2.4), (6., -7.2), (9., -15.)];
        for (k, (slope, bias)) in logits.into_iter().enumerate() {
            l3.weights[k][0] = slope;
            l3.weights[k][1] = -slope;
            l3.biases[k] = bias;
        }

        Self {
            layers: vec![l1, l2, l3],
        }
    }

    /// Returns the class probabilities of a feature vector.
    pub fn forward(&self, features: &[f64; FEATURE_COUNT]) -> [f64; CLASS_COUNT] {
        let last = self.layers.len() - 1;
        let mut activations = features.to_vec();

        for (i, layer) in self.layers.iter().enumerate() {
            activations = layer.forward(&activations);
            if i < last {
                activations.iter_mut().for_each(|a| *a = a.max(0.));
            }
        }

        softmax(&activations)
    }
}

fn softmax(logits: &[f64]) -> [f64; CLASS_COUNT] {
    let max = logits.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exps = logits.iter().map(|l| (l - max).exp()).collect_vec();
    let total: f64 = exps.iter().sum();

    let mut probabilities = [0.; CLASS_COUNT];
    for (p, e) in probabilities.iter_mut().zip(exps) {
        *p = e / total;
    }

    probabilities
}

/// The strength of a password.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StrengthPrediction {
    pub predicted_class: StrengthClass,
    pub confidence: f64,
    pub class_probabilities: [f64; CLASS_COUNT],
    pub features: [f64; FEATURE_COUNT],
}

/// Scores passwords with a network and a list of common passwords.
#[derive(Clone, Debug)]
pub struct StrengthClassifier {
    network: StrengthNetwork,
    dictionary: Vec<String>,
}

impl StrengthClassifier {
    pub fn new<'a>(network: StrengthNetwork, common_passwords: impl IntoIterator<Item = &'a str>) -> Self {
        let dictionary = common_passwords
            .into_iter()
            .filter(|word| word.chars().count() >= MIN_PATTERN_LEN)
            .map(normalize)
            .sorted()
            .dedup()
            .collect();

        Self {
            network,
            dictionary,
        }
    }

    pub fn network(&self) -> &StrengthNetwork {
        &self.network
    }

    pub fn predict(&self, password: &str) -> StrengthPrediction {
        let features = extract_features(password, &self.dictionary);
        let class_probabilities = self.network.forward(&features);

        let (index, confidence) = class_probabilities
            .iter()
            .copied()
            .enumerate()
            .fold((0, f64::NEG_INFINITY), |best, (i, p)| if p > best.1 { (i, p) } else { best });

        StrengthPrediction {
            predicted_class: StrengthClass::ALL[index],
            confidence,
            class_probabilities,
            features,
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{artifact::Artifact, error::ErrorKind, COMMON_PASSWORDS};

    use super::{
        extract_features, longest_run, trailing_digits, DenseLayer, StrengthClass,
        StrengthClassifier, StrengthNetwork,
    };

    fn classifier() -> StrengthClassifier {
        StrengthClassifier::new(StrengthNetwork::reference(), COMMON_PASSWORDS.lines())
    }

    #[test]
    fn test_reference_network_is_valid() {
        assert!(StrengthNetwork::reference().validate().is_ok());
    }

    #[test]
    fn test_features() {
        let features = extract_features("Abc123!!", &["abc".to_owned()]);
        assert_eq!(8., features[0]);
        assert_eq!([2., 1., 3., 2.], features[1..5]);
        assert_eq!(4., features[5]);
        assert_eq!(95., features[6]);
        assert_eq!(1., features[9]);
        assert_eq!(3., features[10]);
        assert_eq!(2., features[11]);
        assert_eq!(7. / 8., features[12]);
        assert_eq!(0., features[14]);
    }

    #[test]
    fn test_runs_and_suffixes() {
        let chars = "xx98765aaa".chars().collect::<Vec<_>>();
        assert_eq!(5, longest_run(&chars, 1));
        assert_eq!(3, longest_run(&chars, 0));
        assert_eq!(0, longest_run(&[], 0));

        assert_eq!(1., trailing_digits("summer2019"));
        assert_eq!(0.5, trailing_digits("summer19"));
        assert_eq!(0., trailing_digits("summer"));
    }

    #[test]
    fn test_predictions() {
        let classifier = classifier();

        assert_eq!(StrengthClass::VeryWeak, classifier.predict("password").predicted_class);
        assert_eq!(StrengthClass::VeryWeak, classifier.predict("123456").predicted_class);
        assert_eq!(StrengthClass::Medium, classifier.predict("correcthorse").predicted_class);
        assert_eq!(StrengthClass::Strong, classifier.predict("Tr0ub4dor&3xQ!").predicted_class);
    }

    #[test]
    fn test_probabilities_are_normalized() {
        let classifier = classifier();

        for password in ["", "a", "password", "Tr0ub4dor&3xQ!", "ñandú-2024"] {
            let prediction = classifier.predict(password);
            let total: f64 = prediction.class_probabilities.iter().sum();
            assert!((total - 1.).abs() < 1e-9);
            assert!(prediction.class_probabilities.iter().all(|p| (0. ..=1.).contains(p)));
            assert!(prediction.class_probabilities.contains(&prediction.confidence));
        }
    }

    #[test]
    fn test_invalid_network() {
        let err = StrengthNetwork::new(vec![DenseLayer {
            weights: vec![vec![0.; 15]; 4],
            biases: vec![0.; 4],
        }])
        .unwrap_err();
        assert_eq!(ErrorKind::UnsupportedConfiguration, err.kind());
    }

    #[test]
    fn test_store_and_load() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let network = StrengthNetwork::reference();

        network.store(file.path()).unwrap();
        assert_eq!(network, StrengthNetwork::load(file.path()).unwrap());
    }
}
