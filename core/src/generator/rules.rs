use std::sync::Arc;

use super::{CandidateGenerator, Wordlist};
use crate::{
    candidate::{Candidate, GeneratorKind, Word},
    error::CrackResult,
};

/// The classic leet substitutions.
const LEET: [(char, char); 5] = [('a', '4'), ('e', '3'), ('i', '1'), ('o', '0'), ('s', '5')];

/// How far from the reference year the year suffixes go.
const YEAR_SPAN: i32 = 10;

/// Substitutes every leet-able character of a word.
pub fn leet(word: &str) -> String {
    word.chars().map(leet_char).collect()
}

#[inline]
fn leet_char(c: char) -> char {
    LEET.iter()
        .find(|(from, _)| *from == c.to_ascii_lowercase())
        .map_or(c, |(_, to)| *to)
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

/// A deterministic transformation applied to a base word.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Mangle {
    Lowercase,
    Uppercase,
    Capitalize,
    ToggleCase,
    /// Lowercase first character, uppercase the rest.
    InvertCapitalize,
    Leet,
    /// Substitutes only the first leet-able character.
    LeetFirst,
    Append(&'static str),
    Prepend(&'static str),
    CapitalizeAppend(&'static str),
    /// Appends the reference year shifted by the given offset.
    AppendYear(i32),
    Reverse,
    Duplicate,
    /// The word followed by its reverse.
    Reflect,
    Truncate(usize),
    /// Concatenates the word with the next base word of the list.
    CombineNext,
}

impl Mangle {
    /// Applies the transformation.
    /// Returns `None` when the transformation does not apply to this word.
    pub fn apply(&self, word: &str, next: Option<&str>, reference_year: i32) -> Option<String> {
        let mangled = match self {
            Self::Lowercase => word.to_lowercase(),
            Self::Uppercase => word.to_uppercase(),
            Self::Capitalize => capitalize(word),
            Self::ToggleCase => word
                .chars()
                .map(|c| {
                    if c.is_uppercase() {
                        c.to_ascii_lowercase()
                    } else {
                        c.to_ascii_uppercase()
                    }
                })
                .collect(),
            Self::InvertCapitalize => {
                let mut chars = word.chars();
                let first = chars.next()?;
                first
                    .to_lowercase()
                    .chain(chars.flat_map(char::to_uppercase))
                    .collect()
            }
            Self::Leet => leet(word),
            Self::LeetFirst => {
                let position = word.chars().position(|c| leet_char(c) != c)?;
                word.chars()
                    .enumerate()
                    .map(|(i, c)| if i == position { leet_char(c) } else { c })
                    .collect()
            }
            Self::Append(suffix) => format!("{word}{suffix}"),
            Self::Prepend(prefix) => format!("{prefix}{word}"),
            Self::CapitalizeAppend(suffix) => format!("{}{suffix}", capitalize(word)),
            Self::AppendYear(offset) => format!("{word}{}", reference_year + offset),
            Self::Reverse => word.chars().rev().collect(),
            Self::Duplicate => word.repeat(2),
            Self::Reflect => format!("{word}{}", word.chars().rev().collect::<String>()),
            Self::Truncate(len) => {
                if word.chars().count() <= *len {
                    return None;
                }
                word.chars().take(*len).collect()
            }
            Self::CombineNext => format!("{word}{}", next?),
        };

        Some(mangled)
    }
}

/// A named mangling rule. Rules hold no state.
#[derive(Clone, Debug)]
pub struct Rule {
    pub name: Word,
    pub mangle: Mangle,
}

impl Rule {
    pub fn new(name: impl Into<Word>, mangle: Mangle) -> Self {
        Self {
            name: name.into(),
            mangle,
        }
    }
}

/// The ordered catalog of mangling rules. Built once and shared read-only.
#[derive(Clone, Debug)]
pub struct RuleCatalog {
    rules: Vec<Rule>,
    reference_year: i32,
}

impl RuleCatalog {
    /// Builds the standard catalog. Year suffixes span the reference year +/- 10.
    pub fn standard(reference_year: i32) -> Self {
        let mut rules = vec![
            Rule::new("capitalize", Mangle::Capitalize),
            Rule::new("lowercase", Mangle::Lowercase),
            Rule::new("uppercase", Mangle::Uppercase),
            Rule::new("toggle-case", Mangle::ToggleCase),
            Rule::new("invert-capitalize", Mangle::InvertCapitalize),
            Rule::new("leet", Mangle::Leet),
            Rule::new("leet-first", Mangle::LeetFirst),
        ];

        for suffix in ["1", "12", "123", "1234", "01", "007"] {
            rules.push(Rule::new(format!("append-{suffix}"), Mangle::Append(suffix)));
        }

        for suffix in ["!", "1", "123"] {
            rules.push(Rule::new(
                format!("capitalize-append-{suffix}"),
                Mangle::CapitalizeAppend(suffix),
            ));
        }

        // the closest years come first
        let mut offsets = vec![0];
        for distance in 1..=YEAR_SPAN {
            offsets.extend([-distance, distance]);
        }
        for offset in offsets {
            rules.push(Rule::new(
                format!("append-year{offset:+}"),
                Mangle::AppendYear(offset),
            ));
        }

        rules.extend([
            Rule::new("reverse", Mangle::Reverse),
            Rule::new("duplicate", Mangle::Duplicate),
            Rule::new("reflect", Mangle::Reflect),
        ]);

        for len in 4..=8 {
            rules.push(Rule::new(format!("truncate-{len}"), Mangle::Truncate(len)));
        }

        rules.push(Rule::new("combine-next", Mangle::CombineNext));

        for symbol in ["!", "@", "#", "$", "?"] {
            rules.push(Rule::new(format!("append-{symbol}"), Mangle::Append(symbol)));
        }
        for symbol in ["!", "@", "#"] {
            rules.push(Rule::new(format!("prepend-{symbol}"), Mangle::Prepend(symbol)));
        }

        Self {
            rules,
            reference_year,
        }
    }

    /// Builds a catalog from custom rules.
    pub fn from_rules(rules: Vec<Rule>, reference_year: i32) -> Self {
        Self {
            rules,
            reference_year,
        }
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn reference_year(&self) -> i32 {
        self.reference_year
    }

    /// Applies the rule at `index` to the word at `word_index` of a wordlist.
    #[inline]
    pub fn apply(&self, index: usize, words: &[Word], word_index: usize) -> Option<String> {
        let next = (words.len() > 1).then(|| &*words[(word_index + 1) % words.len()]);
        self.rules[index]
            .mangle
            .apply(&words[word_index], next, self.reference_year)
    }
}

/// Yields one mutated candidate per (base word, rule) pair, word-major then catalog order.
pub struct RuleGenerator {
    words: Wordlist,
    catalog: Arc<RuleCatalog>,
    word_index: usize,
    rule_index: usize,
}

impl RuleGenerator {
    pub fn new(words: Wordlist, catalog: Arc<RuleCatalog>) -> Self {
        Self {
            words,
            catalog,
            word_index: 0,
            rule_index: 0,
        }
    }
}

impl CandidateGenerator for RuleGenerator {
    fn kind(&self) -> GeneratorKind {
        GeneratorKind::Rules
    }

    fn next_batch(&mut self, max: usize, out: &mut Vec<Candidate>) -> CrackResult<usize> {
        let mut count = 0;

        while count < max && !self.is_exhausted() {
            if self.catalog.is_empty() {
                self.word_index = self.words.len();
                break;
            }

            let mangled = self
                .catalog
                .apply(self.rule_index, &self.words, self.word_index);
            if let Some(password) = mangled {
                out.push(Candidate::mutated(
                    password,
                    GeneratorKind::Rules,
                    &self.words[self.word_index],
                    &self.catalog.rules()[self.rule_index].name,
                ));
                count += 1;
            }

            self.rule_index += 1;
            if self.rule_index == self.catalog.len() {
                self.rule_index = 0;
                self.word_index += 1;
            }
        }

        Ok(count)
    }

    fn is_exhausted(&self) -> bool {
        self.word_index >= self.words.len()
    }

    fn reset(&mut self) -> CrackResult<()> {
        self.word_index = 0;
        self.rule_index = 0;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use itertools::Itertools;

    use crate::generator::{drain, Wordlist};

    use super::{leet, Mangle, RuleCatalog, RuleGenerator};

    fn words(list: &[&str]) -> Wordlist {
        list.iter().map(|&w| Arc::from(w)).collect()
    }

    #[test]
    fn test_catalog_size_and_unique_names() {
        let catalog = RuleCatalog::standard(2024);
        assert!(catalog.len() >= 30);

        let names = catalog.rules().iter().map(|rule| rule.name.clone()).collect_vec();
        assert_eq!(names.len(), names.iter().unique().count());
    }

    #[test]
    fn test_leet() {
        assert_eq!("p455w0rd", leet("password"));
        assert_eq!("4dm1n", leet("Admin"));
    }

    #[test]
    fn test_mangles() {
        let year = 2024;
        let apply = |mangle: Mangle, word: &str| mangle.apply(word, Some("next"), year);

        assert_eq!(Some("Password".into()), apply(Mangle::Capitalize, "pASSWORD"));
        assert_eq!(Some("PaSS".into()), apply(Mangle::ToggleCase, "pAss"));
        assert_eq!(Some("pASS".into()), apply(Mangle::InvertCapitalize, "pass"));
        assert_eq!(Some("p4ss".into()), apply(Mangle::LeetFirst, "pass"));
        assert_eq!(None, apply(Mangle::LeetFirst, "xyz"));
        assert_eq!(Some("word2014".into()), apply(Mangle::AppendYear(-10), "word"));
        assert_eq!(Some("drow".into()), apply(Mangle::Reverse, "word"));
        assert_eq!(Some("wordword".into()), apply(Mangle::Duplicate, "word"));
        assert_eq!(Some("worddrow".into()), apply(Mangle::Reflect, "word"));
        assert_eq!(Some("pass".into()), apply(Mangle::Truncate(4), "password"));
        assert_eq!(None, apply(Mangle::Truncate(8), "password"));
        assert_eq!(Some("wordnext".into()), apply(Mangle::CombineNext, "word"));
        assert_eq!(None, Mangle::CombineNext.apply("word", None, year));
        assert_eq!(Some("!word".into()), apply(Mangle::Prepend("!"), "word"));
    }

    #[test]
    fn test_years_span() {
        let catalog = RuleCatalog::standard(2024);
        let years = catalog
            .rules()
            .iter()
            .filter_map(|rule| match rule.mangle {
                Mangle::AppendYear(offset) => Some(2024 + offset),
                _ => None,
            })
            .sorted()
            .collect_vec();

        assert_eq!((2014..=2034).collect_vec(), years);
    }

    #[test]
    fn test_generator_order_and_provenance() {
        let catalog = Arc::new(RuleCatalog::standard(2024));
        let mut generator = RuleGenerator::new(words(&["summer", "dragon"]), catalog.clone());

        let candidates = drain(&mut generator, usize::MAX).unwrap();

        // word-major: every rule on the first word before the second word
        let first_dragon = candidates
            .iter()
            .position(|c| c.provenance.base_word.as_deref() == Some("dragon"))
            .unwrap();
        assert!(candidates[..first_dragon]
            .iter()
            .all(|c| c.provenance.base_word.as_deref() == Some("summer")));

        assert_eq!("Summer", candidates[0].password);
        assert_eq!(Some("capitalize"), candidates[0].provenance.rule.as_deref());
        assert!(candidates.iter().any(|c| c.password == "summerdragon"));
        assert!(candidates.iter().any(|c| c.password == "dragonsummer"));
        assert!(candidates.iter().any(|c| c.password == "summer2024"));

        // truncate-6, truncate-7 and truncate-8 do not apply to six letter words
        assert_eq!(2 * (catalog.len() - 3), candidates.len());
    }

    #[test]
    fn test_generator_is_deterministic() {
        let catalog = Arc::new(RuleCatalog::standard(2024));
        let list = words(&["alpha", "beta", "gamma"]);

        let first = drain(&mut RuleGenerator::new(list.clone(), catalog.clone()), 500).unwrap();
        let second = drain(&mut RuleGenerator::new(list, catalog), 500).unwrap();
        assert_eq!(first, second);
    }
}
