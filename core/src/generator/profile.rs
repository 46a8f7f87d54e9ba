use std::collections::{HashSet, VecDeque};

use chrono::NaiveDate;
use itertools::Itertools;
use serde::{Deserialize, Serialize};

use super::{leet, CandidateGenerator};
use crate::{
    candidate::{Candidate, GeneratorKind, Word},
    error::{CrackError, CrackResult},
    report::SubPhaseReport,
};

/// Accepted date of birth input formats.
const DOB_INPUT_FORMATS: [&str; 3] = ["%Y-%m-%d", "%d/%m/%Y", "%Y%m%d"];

/// Date of birth renderings used as fragments.
const DOB_FRAGMENT_FORMATS: [&str; 8] = ["%d%m%Y", "%m%d%Y", "%Y%m%d", "%d%m%y", "%Y", "%y", "%d%m", "%m%d"];

const SUFFIXES: [&str; 2] = ["!", "123"];

/// Personal information about the owner of the password.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub name: String,
    pub dob: Option<String>,
    pub phone: Option<String>,
    pub pet_name: Option<String>,
    pub company: Option<String>,
}

impl Profile {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Sets the date of birth.
    pub fn dob(mut self, dob: impl Into<String>) -> Self {
        self.dob = Some(dob.into());

        self
    }

    /// Sets the phone number.
    pub fn phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = Some(phone.into());

        self
    }

    /// Sets the name of a pet.
    pub fn pet_name(mut self, pet_name: impl Into<String>) -> Self {
        self.pet_name = Some(pet_name.into());

        self
    }

    /// Sets the company.
    pub fn company(mut self, company: impl Into<String>) -> Self {
        self.company = Some(company.into());

        self
    }
}

/// Returns a trimmed optional field, treating blank values as absent.
fn field(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn parse_dob(dob: &str) -> CrackResult<NaiveDate> {
    DOB_INPUT_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(dob, format).ok())
        .ok_or_else(|| CrackError::InvalidProfileField {
            field: "dob",
            reason: format!("`{dob}` is not a YYYY-MM-DD, DD/MM/YYYY or YYYYMMDD date"),
        })
}

/// Extracts the raw fragments of a profile, in a fixed order and without duplicates.
fn fragments(profile: &Profile) -> CrackResult<Vec<String>> {
    let parts = profile
        .name
        .split_whitespace()
        .map(str::to_lowercase)
        .collect_vec();

    let (Some(first), Some(last)) = (parts.first(), parts.last()) else {
        return Err(CrackError::MissingRequiredProfileField("name"));
    };

    let mut fragments = parts.clone();

    if parts.len() > 1 {
        fragments.push(parts.concat());
        fragments.push(parts.iter().filter_map(|part| part.chars().next()).collect());
        fragments.extend(first.chars().next().map(|c| format!("{c}{last}")));
        fragments.extend(last.chars().next().map(|c| format!("{first}{c}")));
    }

    for len in [3, 4] {
        for part in &parts {
            if part.chars().count() > len {
                fragments.push(part.chars().take(len).collect());
            }
        }
    }

    if let Some(dob) = field(&profile.dob) {
        let date = parse_dob(dob)?;
        fragments.extend(
            DOB_FRAGMENT_FORMATS
                .iter()
                .map(|format| date.format(format).to_string()),
        );
    }

    if let Some(phone) = field(&profile.phone) {
        let digits = phone.chars().filter(char::is_ascii_digit).collect::<String>();
        if digits.is_empty() {
            return Err(CrackError::InvalidProfileField {
                field: "phone",
                reason: "contains no digit".to_owned(),
            });
        }

        if digits.len() > 4 {
            fragments.push(digits[digits.len() - 4..].to_owned());
        }
        fragments.push(digits);
    }

    for value in [field(&profile.pet_name), field(&profile.company)]
        .into_iter()
        .flatten()
    {
        fragments.push(value.split_whitespace().join("").to_lowercase());
    }

    Ok(fragments.into_iter().unique().collect())
}

fn capitalize(fragment: &str) -> String {
    let mut chars = fragment.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// The sub-phases of a profile attack, in order.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Stage {
    Fragments,
    Leet,
    Combinations,
    Suffixes,
    Case,
}

impl Stage {
    const ALL: [Stage; 5] = [
        Self::Fragments,
        Self::Leet,
        Self::Combinations,
        Self::Suffixes,
        Self::Case,
    ];

    fn name(&self) -> &'static str {
        match self {
            Self::Fragments => "fragments",
            Self::Leet => "leet",
            Self::Combinations => "combinations",
            Self::Suffixes => "suffixes",
            Self::Case => "case",
        }
    }

    fn description(&self) -> &'static str {
        match self {
            Self::Fragments => "Name parts, initials, date of birth, phone, pet and company",
            Self::Leet => "Leet substitutions of the fragments",
            Self::Combinations => "Ordered pairs of distinct fragments",
            Self::Suffixes => "Fragments followed by a common suffix or the reference year",
            Self::Case => "Capitalized and upper-cased fragments",
        }
    }

    fn expand(&self, fragments: &[String], reference_year: i32) -> Vec<String> {
        match self {
            Self::Fragments => fragments.to_vec(),
            Self::Leet => fragments
                .iter()
                .map(|fragment| leet(fragment))
                .filter(|leeted| !fragments.contains(leeted))
                .collect(),
            Self::Combinations => fragments
                .iter()
                .permutations(2)
                .map(|pair| format!("{}{}", pair[0], pair[1]))
                .collect(),
            Self::Suffixes => {
                let year = reference_year.to_string();
                fragments
                    .iter()
                    .flat_map(|fragment| {
                        SUFFIXES
                            .iter()
                            .copied()
                            .chain([year.as_str()])
                            .map(move |suffix| format!("{fragment}{suffix}"))
                    })
                    .collect()
            }
            Self::Case => fragments
                .iter()
                .flat_map(|fragment| [capitalize(fragment), fragment.to_uppercase()])
                .collect(),
        }
    }
}

/// Derives candidates from personal information, sub-phase by sub-phase.
/// Every candidate is yielded once across the whole run.
pub struct ProfileGenerator {
    fragments: Vec<String>,
    reference_year: i32,
    patterns: Vec<Word>,
    stage: usize,
    pending: VecDeque<String>,
    seen: HashSet<String>,
    emitted: [u64; 5],
}

impl ProfileGenerator {
    /// Validates the profile and extracts its fragments.
    pub fn new(profile: &Profile, reference_year: i32) -> CrackResult<Self> {
        let fragments = fragments(profile)?;

        let mut generator = Self {
            fragments,
            reference_year,
            patterns: Stage::ALL.iter().map(|stage| Word::from(stage.name())).collect(),
            stage: 0,
            pending: VecDeque::new(),
            seen: HashSet::new(),
            emitted: [0; 5],
        };
        generator.load_stage();

        Ok(generator)
    }

    /// Returns the raw fragments of the profile.
    pub fn fragments(&self) -> &[String] {
        &self.fragments
    }

    fn load_stage(&mut self) {
        while self.pending.is_empty() && self.stage < Stage::ALL.len() {
            let expanded = Stage::ALL[self.stage].expand(&self.fragments, self.reference_year);
            self.pending = expanded
                .into_iter()
                .filter(|candidate| !candidate.is_empty() && self.seen.insert(candidate.clone()))
                .collect();

            if self.pending.is_empty() {
                self.stage += 1;
            }
        }
    }
}

impl CandidateGenerator for ProfileGenerator {
    fn kind(&self) -> GeneratorKind {
        GeneratorKind::Profile
    }

    fn next_batch(&mut self, max: usize, out: &mut Vec<Candidate>) -> CrackResult<usize> {
        let mut count = 0;

        while count < max {
            let Some(password) = self.pending.pop_front() else {
                self.stage += 1;
                self.load_stage();
                if self.is_exhausted() {
                    break;
                }
                continue;
            };

            out.push(Candidate::new(
                password,
                GeneratorKind::Profile,
                &self.patterns[self.stage],
            ));
            self.emitted[self.stage] += 1;
            count += 1;
        }

        Ok(count)
    }

    fn is_exhausted(&self) -> bool {
        self.stage >= Stage::ALL.len()
    }

    fn reset(&mut self) -> CrackResult<()> {
        self.stage = 0;
        self.pending.clear();
        self.seen.clear();
        self.emitted = [0; 5];
        self.load_stage();

        Ok(())
    }

    fn sub_phases(&self) -> Vec<SubPhaseReport> {
        Stage::ALL
            .iter()
            .zip(self.emitted)
            .map(|(stage, count)| SubPhaseReport {
                name: stage.name().to_owned(),
                count,
                description: stage.description().to_owned(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use itertools::Itertools;

    use crate::{
        error::{CrackError, ErrorKind},
        generator::{drain, CandidateGenerator},
    };

    use super::{Profile, ProfileGenerator};

    fn john() -> Profile {
        Profile::new("John Smith")
            .dob("1990-05-17")
            .phone("+1 (555) 123-4567")
            .pet_name("Rex")
            .company("Acme Corp")
    }

    #[test]
    fn test_fragments() {
        let generator = ProfileGenerator::new(&john(), 2024).unwrap();
        let fragments = generator.fragments();

        for expected in [
            "john", "smith", "johnsmith", "js", "jsmith", "johns", "joh", "smi", "smit",
            "17051990", "05171990", "19900517", "170590", "1990", "90", "1705", "0517",
            "15551234567", "4567", "rex", "acmecorp",
        ] {
            assert!(fragments.iter().any(|f| f == expected), "missing {expected}");
        }
        assert!(fragments.iter().all_unique());
    }

    #[test]
    fn test_sub_phases_order_and_uniqueness() {
        let mut generator = ProfileGenerator::new(&john(), 2024).unwrap();
        let candidates = drain(&mut generator, usize::MAX).unwrap();
        let passwords = candidates.iter().map(|c| c.password.as_str()).collect_vec();

        assert!(passwords.iter().all_unique());
        assert!(generator.is_exhausted());
        for expected in ["j0hn", "johnsmith", "smithjohn", "rex!", "john2024", "John", "SMITH"] {
            assert!(passwords.contains(&expected), "missing {expected}");
        }

        let sub_phases = generator.sub_phases();
        assert_eq!(
            vec!["fragments", "leet", "combinations", "suffixes", "case"],
            sub_phases.iter().map(|s| s.name.as_str()).collect_vec()
        );
        assert_eq!(
            candidates.len() as u64,
            sub_phases.iter().map(|s| s.count).sum::<u64>()
        );

        // candidates are grouped by sub-phase
        let patterns = candidates
            .iter()
            .map(|c| c.provenance.pattern.clone())
            .dedup()
            .collect_vec();
        assert_eq!(5, patterns.len());
    }

    #[test]
    fn test_name_only_profile() {
        let mut generator = ProfileGenerator::new(&Profile::new("alice"), 2024).unwrap();
        let passwords = drain(&mut generator, usize::MAX)
            .unwrap()
            .into_iter()
            .map(|c| c.password)
            .collect_vec();

        assert_eq!("alice", passwords[0]);
        assert!(passwords.contains(&"4l1c3".to_owned()));
        assert!(passwords.contains(&"Alice".to_owned()));
    }

    #[test]
    fn test_reset_replays() {
        let mut generator = ProfileGenerator::new(&john(), 2024).unwrap();
        let first = drain(&mut generator, 50).unwrap();
        generator.reset().unwrap();
        assert_eq!(first, drain(&mut generator, 50).unwrap());
    }

    #[test]
    fn test_invalid_profiles() {
        let err = ProfileGenerator::new(&Profile::new("   "), 2024).err().unwrap();
        assert!(matches!(err, CrackError::MissingRequiredProfileField("name")));
        assert_eq!(ErrorKind::InputValidation, err.kind());

        let err = ProfileGenerator::new(&Profile::new("John").dob("17th of May"), 2024)
            .err()
            .unwrap();
        assert!(matches!(err, CrackError::InvalidProfileField { field: "dob", .. }));

        for dob in ["1990-05-17", "17/05/1990", "19900517"] {
            assert!(ProfileGenerator::new(&Profile::new("John").dob(dob), 2024).is_ok());
        }
    }
}
