use std::{path::PathBuf, sync::Arc, time::Duration};

use chrono::Datelike;
use itertools::Itertools;
use tracing::{debug, info};

use crate::{
    artifact::Artifact,
    candidate::{GeneratorKind, Word},
    ctx::BruteForceCtxBuilder,
    error::{CrackError, CrackResult},
    event::LiveHandle,
    generator::{
        drain, load_wordlist, BruteForceGenerator, CandidateGenerator, Capped,
        DictionaryGenerator, Generator, HybridGenerator, MarkovConfig, MarkovGenerator,
        MarkovModel, Profile, ProfileGenerator, RuleCatalog, RuleGenerator, WordSource, Wordlist,
    },
    hash::{identify_hash, HashFunction, HashIdentification, HashTarget},
    live::{start_live_brute_force, LiveOptions, LiveRegistry},
    orchestrator::AttackSession,
    report::{AttackResult, Guess, GuessReport, SubPhaseReport},
    strength::{StrengthClassifier, StrengthNetwork, StrengthPrediction},
    COMMON_PASSWORDS, DEFAULT_BATCH_SIZE, DEFAULT_GUESS_LIMIT, DEFAULT_HYBRID_CAP,
    DEFAULT_MARKOV_ORDER, DEFAULT_RULE_CAP,
};

/// Where the Markov model of an engine comes from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MarkovSource {
    /// Trained on the embedded list of common passwords.
    Embedded,
    /// Trained on a wordlist file.
    Corpus(PathBuf),
    /// Loaded from a stored model.
    Artifact(PathBuf),
    /// No model. Markov phases are skipped, or rejected when requested explicitly.
    Disabled,
}

/// A builder for an engine.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    markov: MarkovSource,
    markov_order: usize,
    strength_network: Option<PathBuf>,
    reference_year: Option<i32>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            markov: MarkovSource::Embedded,
            markov_order: DEFAULT_MARKOV_ORDER,
            strength_network: None,
            reference_year: None,
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets where the Markov model comes from.
    pub fn markov(mut self, markov: MarkovSource) -> Self {
        self.markov = markov;

        self
    }

    /// Sets the order of a trained Markov model.
    pub fn markov_order(mut self, markov_order: usize) -> Self {
        self.markov_order = markov_order;

        self
    }

    /// Loads the strength network from the given path instead of using the built-in one.
    pub fn strength_network(mut self, path: impl Into<PathBuf>) -> Self {
        self.strength_network = Some(path.into());

        self
    }

    /// Sets the year year-based rules are relative to. Defaults to the current year.
    pub fn reference_year(mut self, reference_year: i32) -> Self {
        self.reference_year = Some(reference_year);

        self
    }
}

/// Options of a multi-phase attack.
#[derive(Clone, Debug)]
pub struct AttackOptions {
    phases: Option<Vec<GeneratorKind>>,
    wordlist: Option<WordSource>,
    profile: Option<Profile>,
    rule_cap: Option<u64>,
    hybrid_cap: Option<u64>,
    markov: MarkovConfig,
    brute_force: BruteForceCtxBuilder,
    brute_force_cap: Option<u64>,
    batch_size: usize,
    time_budget: Option<Duration>,
    reference_year: Option<i32>,
}

impl Default for AttackOptions {
    fn default() -> Self {
        Self {
            phases: None,
            wordlist: None,
            profile: None,
            rule_cap: Some(DEFAULT_RULE_CAP),
            hybrid_cap: Some(DEFAULT_HYBRID_CAP),
            markov: MarkovConfig::default(),
            brute_force: BruteForceCtxBuilder::default(),
            brute_force_cap: None,
            batch_size: DEFAULT_BATCH_SIZE,
            time_budget: None,
            reference_year: None,
        }
    }
}

impl AttackOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the phases to run. They must follow the default order.
    pub fn phases(mut self, phases: Vec<GeneratorKind>) -> Self {
        self.phases = Some(phases);

        self
    }

    /// Sets the base words. Defaults to the embedded list of common passwords.
    pub fn wordlist(mut self, wordlist: WordSource) -> Self {
        self.wordlist = Some(wordlist);

        self
    }

    pub fn profile(mut self, profile: Profile) -> Self {
        self.profile = Some(profile);

        self
    }

    pub fn rule_cap(mut self, rule_cap: Option<u64>) -> Self {
        self.rule_cap = rule_cap;

        self
    }

    pub fn hybrid_cap(mut self, hybrid_cap: Option<u64>) -> Self {
        self.hybrid_cap = hybrid_cap;

        self
    }

    pub fn markov(mut self, markov: MarkovConfig) -> Self {
        self.markov = markov;

        self
    }

    /// Sets the search space of the brute force phase.
    pub fn brute_force(mut self, brute_force: BruteForceCtxBuilder) -> Self {
        self.brute_force = brute_force;

        self
    }

    pub fn brute_force_cap(mut self, brute_force_cap: Option<u64>) -> Self {
        self.brute_force_cap = brute_force_cap;

        self
    }

    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;

        self
    }

    pub fn time_budget(mut self, time_budget: Option<Duration>) -> Self {
        self.time_budget = time_budget;

        self
    }

    /// Overrides the reference year of the engine for this attack.
    pub fn reference_year(mut self, reference_year: i32) -> Self {
        self.reference_year = Some(reference_year);

        self
    }
}

/// Where guesses come from.
#[derive(Clone, Debug)]
pub enum GuessSource {
    /// Base words, expanded with the rules and the Markov model if asked.
    Wordlist(WordSource),
    Profile(Profile),
    /// A list produced by an outside guess provider, reported under its own label.
    External { label: String, guesses: Wordlist },
}

/// Options of a guess generation.
#[derive(Clone, Debug)]
pub struct GuessOptions {
    pub limit: usize,
    pub rules: bool,
    pub markov: bool,
}

impl Default for GuessOptions {
    fn default() -> Self {
        Self {
            limit: DEFAULT_GUESS_LIMIT,
            rules: true,
            markov: false,
        }
    }
}

struct EngineInner {
    catalog: Arc<RuleCatalog>,
    markov: Option<Arc<MarkovModel>>,
    classifier: StrengthClassifier,
    default_wordlist: Wordlist,
    registry: Arc<LiveRegistry>,
    reference_year: i32,
}

/// The shared, read-only state every session uses.
/// Cloning an engine is cheap.
#[derive(Clone)]
pub struct Engine {
    inner: Arc<EngineInner>,
}

impl Engine {
    /// Builds the rule catalog, the Markov model and the strength network.
    pub fn new(config: EngineConfig) -> CrackResult<Self> {
        let reference_year = config
            .reference_year
            .unwrap_or_else(|| chrono::Local::now().year());

        let default_wordlist: Wordlist = COMMON_PASSWORDS
            .lines()
            .filter(|line| !line.is_empty())
            .map(Word::from)
            .collect();

        let markov = match &config.markov {
            MarkovSource::Embedded => Some(MarkovModel::train(
                default_wordlist.iter().map(|word| &**word),
                config.markov_order,
            )),
            MarkovSource::Corpus(path) => Some(MarkovModel::train(
                load_wordlist(path)?.iter().map(|word| &**word),
                config.markov_order,
            )),
            MarkovSource::Artifact(path) => Some(MarkovModel::load(path)?),
            MarkovSource::Disabled => None,
        };

        let network = match &config.strength_network {
            Some(path) => StrengthNetwork::load(path)?,
            None => StrengthNetwork::reference(),
        };

        info!(
            reference_year,
            markov = ?config.markov,
            words = default_wordlist.len(),
            "engine ready"
        );

        Ok(Self {
            inner: Arc::new(EngineInner {
                catalog: Arc::new(RuleCatalog::standard(reference_year)),
                markov: markov.map(Arc::new),
                classifier: StrengthClassifier::new(network, COMMON_PASSWORDS.lines()),
                default_wordlist,
                registry: Arc::new(LiveRegistry::new()),
                reference_year,
            }),
        })
    }

    pub fn reference_year(&self) -> i32 {
        self.inner.reference_year
    }

    pub fn markov_model(&self) -> Option<&MarkovModel> {
        self.inner.markov.as_deref()
    }

    pub fn rule_catalog(&self) -> &RuleCatalog {
        &self.inner.catalog
    }

    /// Returns the embedded list of common passwords.
    pub fn default_wordlist(&self) -> &Wordlist {
        &self.inner.default_wordlist
    }

    pub fn identify_hash(&self, hash: &str) -> CrackResult<HashIdentification> {
        identify_hash(hash)
    }

    pub fn hash_plaintext(&self, hash_function: HashFunction, plaintext: &str) -> String {
        hash_function.hash_hex(plaintext)
    }

    pub fn predict_strength(&self, password: &str) -> StrengthPrediction {
        self.inner.classifier.predict(password)
    }

    /// Runs a multi-phase attack until the first match.
    pub fn run_attack(
        &self,
        hash: &str,
        hash_function: Option<HashFunction>,
        options: &AttackOptions,
    ) -> CrackResult<AttackResult> {
        let target = HashTarget::new(hash, hash_function)?;
        self.session(target, options)?.run()
    }

    /// Creates a session without running it. Every input is validated here.
    pub fn session(&self, target: HashTarget, options: &AttackOptions) -> CrackResult<AttackSession> {
        let plan = self.plan(options)?;

        Ok(AttackSession::new(target, plan)
            .batch_size(options.batch_size)
            .time_budget(options.time_budget))
    }

    /// Starts an incremental brute force on its own thread.
    pub fn start_live_brute_force(
        &self,
        hash: &str,
        hash_function: Option<HashFunction>,
        options: LiveOptions,
    ) -> CrackResult<LiveHandle> {
        let target = HashTarget::new(hash, hash_function)?;
        start_live_brute_force(target, options, self.inner.registry.clone())
    }

    /// Produces guesses without testing them against any hash.
    pub fn generate_guesses(
        &self,
        source: &GuessSource,
        options: &GuessOptions,
    ) -> CrackResult<GuessReport> {
        let mut report = GuessReport::default();

        match source {
            GuessSource::Wordlist(words) => {
                let mut dictionary = DictionaryGenerator::from_source(words)?;
                collect_guesses(
                    &mut dictionary,
                    "verbatim wordlist entries",
                    options.limit,
                    &mut report,
                )?;

                if options.rules {
                    let mut rules = RuleGenerator::new(words.load()?, self.inner.catalog.clone());
                    collect_guesses(
                        &mut rules,
                        "wordlist entries through the rule catalog",
                        options.limit,
                        &mut report,
                    )?;
                }

                if let (true, Some(model)) = (options.markov, &self.inner.markov) {
                    let mut markov = MarkovGenerator::new(model.clone(), MarkovConfig::default());
                    collect_guesses(
                        &mut markov,
                        "most probable strings of the Markov model",
                        options.limit,
                        &mut report,
                    )?;
                }
            }
            GuessSource::Profile(profile) => {
                let mut generator = ProfileGenerator::new(profile, self.inner.reference_year)?;
                collect_guesses(&mut generator, "", options.limit, &mut report)?;
            }
            GuessSource::External { label, guesses } => {
                let candidates = drain(&mut DictionaryGenerator::new(guesses.clone()), options.limit)?;
                report.sub_phases.push(SubPhaseReport {
                    name: label.clone(),
                    count: candidates.len() as u64,
                    description: "guesses of an external provider".to_owned(),
                });
                report.guesses.extend(
                    candidates
                        .into_iter()
                        .map(|candidate| Guess::from_candidate(candidate, label)),
                );
            }
        }

        debug!(guesses = report.guesses.len(), "generated guesses");
        Ok(report)
    }

    /// Builds the generators of an attack, failing before anything runs.
    fn plan(&self, options: &AttackOptions) -> CrackResult<Vec<Capped<Generator>>> {
        let explicit = options.phases.is_some();
        let kinds = options
            .phases
            .clone()
            .unwrap_or_else(|| GeneratorKind::DEFAULT_PLAN.to_vec());

        let rank = |kind: &GeneratorKind| GeneratorKind::DEFAULT_PLAN.iter().position(|k| k == kind);
        if !kinds.iter().map(rank).tuple_windows().all(|(a, b)| a < b) {
            return Err(CrackError::InvalidPhasePlan {
                expected: GeneratorKind::DEFAULT_PLAN.iter().join(" → "),
                actual: kinds.iter().join(" → "),
            });
        }

        let catalog = match options.reference_year {
            Some(year) if year != self.inner.reference_year => Arc::new(RuleCatalog::standard(year)),
            _ => self.inner.catalog.clone(),
        };
        let reference_year = catalog.reference_year();

        let source = options
            .wordlist
            .clone()
            .unwrap_or_else(|| WordSource::Memory(self.inner.default_wordlist.clone()));
        // rules and hybrid share the same base words, loaded once
        let mut cached = None;
        let mut base_words = || -> CrackResult<Wordlist> {
            if let Some(words) = &cached {
                return Ok(Wordlist::clone(words));
            }
            let words = source.load()?;
            cached = Some(words.clone());
            Ok(words)
        };

        let mut plan = Vec::with_capacity(kinds.len());
        for kind in kinds {
            let phase = match kind {
                GeneratorKind::Dictionary => Capped::new(
                    Generator::Dictionary(DictionaryGenerator::from_source(&source)?),
                    None,
                ),
                GeneratorKind::Rules => Capped::new(
                    Generator::Rules(RuleGenerator::new(base_words()?, catalog.clone())),
                    options.rule_cap,
                ),
                GeneratorKind::Markov => match &self.inner.markov {
                    Some(model) => Capped::new(
                        Generator::Markov(MarkovGenerator::new(model.clone(), options.markov.clone())),
                        None,
                    ),
                    None if explicit => return Err(CrackError::MissingMarkovModel),
                    None => {
                        debug!("no markov model, skipping the markov phase");
                        continue;
                    }
                },
                GeneratorKind::Profile => match &options.profile {
                    Some(profile) => Capped::new(
                        Generator::Profile(ProfileGenerator::new(profile, reference_year)?),
                        None,
                    ),
                    None if explicit => return Err(CrackError::MissingRequiredProfileField("name")),
                    None => {
                        debug!("no profile, skipping the profile phase");
                        continue;
                    }
                },
                GeneratorKind::Hybrid => Capped::new(
                    Generator::Hybrid(HybridGenerator::new(base_words()?, catalog.clone())),
                    options.hybrid_cap,
                ),
                GeneratorKind::BruteForce => Capped::new(
                    Generator::BruteForce(BruteForceGenerator::new(options.brute_force.clone().build()?)),
                    options.brute_force_cap,
                ),
            };

            plan.push(phase);
        }

        debug!(
            phases = ?plan.iter().map(|phase| phase.kind()).collect_vec(),
            "built the phase plan"
        );
        Ok(plan)
    }
}

/// Pulls guesses out of a generator until the report holds `limit` guesses.
fn collect_guesses<G: CandidateGenerator>(
    generator: &mut G,
    description: &str,
    limit: usize,
    report: &mut GuessReport,
) -> CrackResult<()> {
    let remaining = limit.saturating_sub(report.guesses.len());
    let candidates = drain(generator, remaining)?;
    let source = generator.kind().name();

    let sub_phases = generator.sub_phases();
    if sub_phases.is_empty() {
        report.sub_phases.push(SubPhaseReport {
            name: source.to_owned(),
            count: candidates.len() as u64,
            description: description.to_owned(),
        });
    } else {
        report.sub_phases.extend(sub_phases);
    }

    report.guesses.extend(
        candidates
            .into_iter()
            .map(|candidate| Guess::from_candidate(candidate, source)),
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use itertools::Itertools;

    use crate::{
        artifact::Artifact,
        candidate::GeneratorKind,
        ctx::BruteForceCtxBuilder,
        error::{CrackError, ErrorKind},
        event::LiveOutcome,
        generator::{MarkovModel, Profile, WordSource, Wordlist},
        hash::HashFunction,
        live::LiveOptions,
        orchestrator::SessionStatus,
    };

    use super::{AttackOptions, Engine, EngineConfig, GuessOptions, GuessSource, MarkovSource};

    fn engine() -> Engine {
        Engine::new(
            EngineConfig::new()
                .reference_year(2024)
                .markov(MarkovSource::Disabled),
        )
        .unwrap()
    }

    fn words(list: &[&str]) -> Wordlist {
        list.iter().map(|&w| Arc::from(w)).collect()
    }

    #[test]
    fn test_password_round_trip() {
        let engine = engine();
        let hash = engine.hash_plaintext(HashFunction::Md5, "password");
        assert_eq!("5f4dcc3b5aa765d61d8327deb882cf99", hash);

        let result = engine.run_attack(&hash, None, &AttackOptions::new()).unwrap();
        assert!(result.cracked);
        assert_eq!(Some("password".to_owned()), result.password);
        assert_eq!("Dictionary", result.method);
        assert_eq!(1, result.phases.len());
    }

    #[test]
    fn test_123456_through_brute_force() {
        let options = AttackOptions::new()
            .phases(vec![GeneratorKind::BruteForce])
            .brute_force(
                BruteForceCtxBuilder::new()
                    .charset(b"0123456789")
                    .min_password_length(6)
                    .max_password_length(6),
            );
        let result = engine()
            .run_attack("e10adc3949ba59abbe56e057f20f883e", Some(HashFunction::Md5), &options)
            .unwrap();

        assert_eq!(Some("123456".to_owned()), result.password);
        assert_eq!("Brute-Force", result.method);
    }

    #[test]
    fn test_default_plan_skips_missing_inputs() {
        let engine = engine();
        let target = crate::hash::HashTarget::new(&"0".repeat(32), None).unwrap();
        let session = engine.session(target, &AttackOptions::new()).unwrap();
        let result = session.result();

        assert_eq!(SessionStatus::Pending, result.status);
        assert!(result.phases.is_empty());

        let options = AttackOptions::new()
            .wordlist(WordSource::Memory(words(&["alpha"])))
            .brute_force(BruteForceCtxBuilder::new().charset(b"ab").max_password_length(2));
        let result = engine.run_attack(&"0".repeat(32), None, &options).unwrap();
        assert_eq!(
            vec!["Dictionary", "Rule-Mutation", "Hybrid", "Brute-Force"],
            result.phases.iter().map(|p| p.phase.as_str()).collect_vec()
        );
        assert_eq!(SessionStatus::Exhausted, result.status);
    }

    #[test]
    fn test_validation_fails_fast() {
        let engine = engine();
        let hash = engine.hash_plaintext(HashFunction::Sha1, "x");

        let err = engine
            .run_attack(&hash, None, &AttackOptions::new().phases(vec![GeneratorKind::Markov]))
            .unwrap_err();
        assert!(matches!(err, CrackError::MissingMarkovModel));
        assert_eq!(ErrorKind::UnsupportedConfiguration, err.kind());

        let err = engine
            .run_attack(&hash, None, &AttackOptions::new().phases(vec![GeneratorKind::Profile]))
            .unwrap_err();
        assert!(matches!(err, CrackError::MissingRequiredProfileField("name")));

        let options = AttackOptions::new().phases(vec![GeneratorKind::BruteForce, GeneratorKind::Dictionary]);
        let err = engine.run_attack(&hash, None, &options).unwrap_err();
        assert_eq!(ErrorKind::InputValidation, err.kind());

        let err = engine
            .run_attack(&hash, Some(HashFunction::Md5), &AttackOptions::new())
            .unwrap_err();
        assert_eq!(ErrorKind::InputValidation, err.kind());

        let err = engine
            .run_attack("not a hash", None, &AttackOptions::new())
            .unwrap_err();
        assert!(matches!(err, CrackError::InvalidHashFormat(_)));
    }

    #[test]
    fn test_profile_attack() {
        let engine = engine();
        let hash = engine.hash_plaintext(HashFunction::Sha256, "Smith");
        let options = AttackOptions::new()
            .phases(vec![GeneratorKind::Profile, GeneratorKind::BruteForce])
            .profile(Profile::new("John Smith"));

        let result = engine.run_attack(&hash, None, &options).unwrap();
        assert_eq!("Profile-Heuristic", result.method);
        assert_eq!(5, result.phases[0].sub_phases.len());
    }

    #[test]
    fn test_markov_phase() {
        let engine = Engine::new(EngineConfig::new().reference_year(2024)).unwrap();
        let report = engine
            .generate_guesses(
                &GuessSource::Wordlist(WordSource::Memory(words(&[]))),
                &GuessOptions {
                    limit: 5,
                    rules: false,
                    markov: true,
                },
            )
            .unwrap();
        assert_eq!(5, report.guesses.len());
        assert!(report.guesses.iter().all(|g| g.source == "Markov"));

        let hash = engine.hash_plaintext(HashFunction::Md5, &report.guesses[2].password);
        let options = AttackOptions::new().phases(vec![GeneratorKind::Markov]);
        let result = engine.run_attack(&hash, None, &options).unwrap();
        assert_eq!("Markov", result.method);
        assert_eq!(3, result.attempts);
    }

    #[test]
    fn test_guesses_from_profile() {
        let report = engine()
            .generate_guesses(
                &GuessSource::Profile(Profile::new("John Smith")),
                &GuessOptions::default(),
            )
            .unwrap();

        let passwords = report.guesses.iter().map(|g| g.password.as_str()).collect_vec();
        assert!(passwords.contains(&"john"));
        assert!(passwords.contains(&"smith"));
        assert!(report.guesses.len() <= GuessOptions::default().limit);
        assert_eq!(
            report.guesses.len() as u64,
            report.sub_phases.iter().map(|s| s.count).sum::<u64>()
        );

        let err = engine()
            .generate_guesses(&GuessSource::Profile(Profile::new("")), &GuessOptions::default())
            .unwrap_err();
        assert!(matches!(err, CrackError::MissingRequiredProfileField("name")));
    }

    #[test]
    fn test_guesses_limit_and_sources() {
        let engine = engine();
        let report = engine
            .generate_guesses(
                &GuessSource::Wordlist(WordSource::Memory(words(&["dragon", "monkey"]))),
                &GuessOptions {
                    limit: 10,
                    ..Default::default()
                },
            )
            .unwrap();

        assert_eq!(10, report.guesses.len());
        assert_eq!("dragon", report.guesses[0].password);
        assert_eq!("Dictionary", report.guesses[0].source);
        assert_eq!("Rule-Mutation", report.guesses[2].source);

        let report = engine
            .generate_guesses(
                &GuessSource::External {
                    label: "llm".to_owned(),
                    guesses: words(&["Summer2024!", "Winter2023"]),
                },
                &GuessOptions::default(),
            )
            .unwrap();
        assert_eq!(2, report.guesses.len());
        assert!(report.guesses.iter().all(|g| g.source == "llm"));
    }

    #[test]
    fn test_markov_artifact() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let model = MarkovModel::train(["alpha", "alpine", "altitude"], 2);
        model.store(file.path()).unwrap();

        let engine = Engine::new(
            EngineConfig::new().markov(MarkovSource::Artifact(file.path().to_owned())),
        )
        .unwrap();
        assert_eq!(Some(&model), engine.markov_model());

        let err = Engine::new(EngineConfig::new().markov(MarkovSource::Artifact(
            "/definitely/not/here.bin".into(),
        )))
        .err()
        .unwrap();
        assert_eq!(ErrorKind::UnsupportedConfiguration, err.kind());
    }

    #[test]
    fn test_live_through_engine() {
        let engine = engine();
        let hash = engine.hash_plaintext(HashFunction::Sha1, "ba");
        let options = LiveOptions::new().brute_force(
            BruteForceCtxBuilder::new()
                .charset(b"ab")
                .max_password_length(3),
        );

        let handle = engine.start_live_brute_force(&hash, None, options).unwrap();
        assert_eq!(
            LiveOutcome::Cracked {
                password: "ba".to_owned(),
                attempts: 5
            },
            handle.join()
        );
    }

    #[test]
    fn test_strength_and_identification() {
        let engine = engine();
        assert_eq!(
            HashFunction::Sha256,
            engine.identify_hash(&"f".repeat(64)).unwrap().hash_function
        );
        assert!(engine.predict_strength("123456").confidence > 0.5);
    }
}
