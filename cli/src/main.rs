mod attack;
mod guess;
mod hash;
mod identify;
mod live;
mod strength;
mod train;

use std::{fs::File, io::BufReader, path::PathBuf, time::Duration};

use anyhow::{bail, Context, Result};
use clap::{value_parser, ArgAction, Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing_subscriber::filter::LevelFilter;

use passbreak_core::{
    BruteForceCtxBuilder, CrackResult, Engine, EngineConfig, GeneratorKind, HashFunction,
    MarkovSource, Profile, DEFAULT_BATCH_SIZE, DEFAULT_BEAM_WIDTH, DEFAULT_CHANNEL_CAPACITY,
    DEFAULT_CHARSET, DEFAULT_GUESS_LIMIT, DEFAULT_HYBRID_CAP, DEFAULT_MARKOV_CAP,
    DEFAULT_MARKOV_ORDER, DEFAULT_MAX_PASSWORD_LENGTH, DEFAULT_PROGRESS_EVERY, DEFAULT_RULE_CAP,
    MAX_PASSWORD_LENGTH_ALLOWED,
};

use attack::attack;
use guess::guess;
use hash::hash;
use identify::identify;
use live::live;
use strength::strength;
use train::train_markov;

/// Multi-strategy password cracker for MD5, SHA1 and SHA256 digests.
#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
struct Cli {
    /// Log more details on stderr. Repeat for more (-v, -vv, -vvv).
    #[clap(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Print the results as JSON.
    #[clap(long, global = true)]
    json: bool,

    #[clap(flatten)]
    engine: EngineArgs,

    #[clap(subcommand)]
    commands: Commands,
}

#[derive(Subcommand)]
enum Commands {
    Identify(Identify),
    Attack(Attack),
    Live(Live),
    Guess(Guess),
    Strength(Strength),
    Hash(Hash),
    TrainMarkov(TrainMarkov),
}

/// The candidate generation strategies, in the order they run.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
enum PhaseArg {
    Dictionary,
    Rules,
    Markov,
    Profile,
    Hybrid,
    BruteForce,
}

impl From<PhaseArg> for GeneratorKind {
    fn from(arg: PhaseArg) -> Self {
        match arg {
            PhaseArg::Dictionary => GeneratorKind::Dictionary,
            PhaseArg::Rules => GeneratorKind::Rules,
            PhaseArg::Markov => GeneratorKind::Markov,
            PhaseArg::Profile => GeneratorKind::Profile,
            PhaseArg::Hybrid => GeneratorKind::Hybrid,
            PhaseArg::BruteForce => GeneratorKind::BruteForce,
        }
    }
}

/// Settings shared by every session of the engine.
#[derive(Args)]
struct EngineArgs {
    /// Load the Markov model from a file written by `train-markov`.
    #[clap(long, value_parser, global = true, conflicts_with = "markov_corpus")]
    markov_model: Option<PathBuf>,

    /// Train the Markov model on this wordlist instead of the embedded common passwords.
    #[clap(long, value_parser, global = true)]
    markov_corpus: Option<PathBuf>,

    /// Run without a Markov model.
    #[clap(long, global = true, conflicts_with_all = ["markov_model", "markov_corpus"])]
    no_markov: bool,

    /// The context length of the Markov model trained at startup.
    #[clap(long, value_parser = check_order, global = true, default_value_t = DEFAULT_MARKOV_ORDER)]
    markov_order: usize,

    /// Load the weights of the strength classifier from a file.
    #[clap(long, value_parser, global = true)]
    strength_network: Option<PathBuf>,

    /// The year used by the year-based rules. Defaults to the current year.
    #[clap(long, value_parser, global = true)]
    year: Option<i32>,
}

impl EngineArgs {
    fn build(&self) -> Result<Engine> {
        let markov = if self.no_markov {
            MarkovSource::Disabled
        } else if let Some(path) = &self.markov_model {
            MarkovSource::Artifact(path.clone())
        } else if let Some(path) = &self.markov_corpus {
            MarkovSource::Corpus(path.clone())
        } else {
            MarkovSource::Embedded
        };

        let mut config = EngineConfig::new()
            .markov(markov)
            .markov_order(self.markov_order);

        if let Some(path) = &self.strength_network {
            config = config.strength_network(path);
        }

        if let Some(year) = self.year {
            config = config.reference_year(year);
        }

        Engine::new(config).kind_context("Unable to set up the engine")
    }
}

/// Detect the algorithm of a hash from its length.
#[derive(Args)]
pub struct Identify {
    /// The hash to identify, in hexadecimal.
    #[clap(value_parser)]
    hash: String,
}

/// Find the password producing a certain hash digest, one strategy after another.
#[derive(Args)]
pub struct Attack {
    /// The digest to attack, in hexadecimal.
    #[clap(value_parser = check_hex)]
    hash: String,

    /// The hash algorithm. Detected from the length of the hash when omitted.
    #[clap(short, long, value_parser = check_algorithm)]
    algorithm: Option<HashFunction>,

    /// The phases to run, comma separated. All available phases run when omitted.
    #[clap(short, long, value_enum, value_delimiter = ',')]
    phases: Vec<PhaseArg>,

    /// A wordlist with one word per line. The embedded common passwords are used when omitted.
    #[clap(short, long, value_parser)]
    wordlist: Option<PathBuf>,

    #[clap(flatten)]
    profile: ProfileArgs,

    /// The maximum number of candidates of the rule phase.
    #[clap(long, value_parser, default_value_t = DEFAULT_RULE_CAP)]
    rule_cap: u64,

    /// The maximum number of candidates of the hybrid phase.
    #[clap(long, value_parser, default_value_t = DEFAULT_HYBRID_CAP)]
    hybrid_cap: u64,

    /// Lift the rule and hybrid caps.
    #[clap(long)]
    uncapped: bool,

    /// The number of partial strings kept at each step of the Markov beam search.
    #[clap(long, value_parser, default_value_t = DEFAULT_BEAM_WIDTH)]
    beam_width: usize,

    /// The maximum number of candidates of the Markov phase.
    #[clap(long, value_parser, default_value_t = DEFAULT_MARKOV_CAP)]
    markov_cap: usize,

    #[clap(flatten)]
    brute_force: BruteForceArgs,

    /// The maximum number of candidates of the brute force phase.
    #[clap(long, value_parser)]
    brute_force_cap: Option<u64>,

    /// The number of candidates hashed together.
    #[clap(long, value_parser, default_value_t = DEFAULT_BATCH_SIZE)]
    batch_size: usize,

    /// Stop the attack after this many seconds.
    #[clap(short, long, value_parser = check_seconds)]
    time_budget: Option<Duration>,
}

/// Brute force a hash on a background thread, streaming its progress.
#[derive(Args)]
pub struct Live {
    /// The digest to attack, in hexadecimal.
    #[clap(value_parser = check_hex)]
    hash: String,

    /// The hash algorithm. Detected from the length of the hash when omitted.
    #[clap(short, long, value_parser = check_algorithm)]
    algorithm: Option<HashFunction>,

    #[clap(flatten)]
    brute_force: BruteForceArgs,

    /// The number of candidates between two progress reports.
    #[clap(long, value_parser = value_parser!(u64).range(1..), default_value_t = DEFAULT_PROGRESS_EVERY)]
    progress_every: u64,

    /// The maximum number of milliseconds between two progress reports.
    #[clap(long, value_parser = value_parser!(u64).range(1..), default_value_t = 250)]
    progress_interval: u64,

    /// The number of events buffered when the terminal is slower than the brute force.
    #[clap(long, value_parser, default_value_t = DEFAULT_CHANNEL_CAPACITY)]
    channel_capacity: usize,

    /// Stop the brute force after this many seconds.
    #[clap(short, long, value_parser = check_seconds)]
    time_budget: Option<Duration>,
}

/// Print candidate passwords without attacking any hash.
#[derive(Args)]
pub struct Guess {
    /// Expand the words of this wordlist.
    #[clap(short, long, value_parser, group = "guess_source")]
    wordlist: Option<PathBuf>,

    /// Print the guesses of an external provider, one per line in this file.
    #[clap(short, long, value_parser, group = "guess_source")]
    external: Option<PathBuf>,

    /// The label reported for external guesses.
    #[clap(long, value_parser, default_value = "External", requires = "external")]
    label: String,

    #[clap(flatten)]
    profile: ProfileArgs,

    /// The maximum number of guesses printed.
    #[clap(short = 'n', long, value_parser, default_value_t = DEFAULT_GUESS_LIMIT)]
    limit: usize,

    /// Do not expand the words with the rule catalog.
    #[clap(long)]
    no_rules: bool,

    /// Add the most probable strings of the Markov model.
    #[clap(long)]
    markov: bool,
}

/// Rate how hard a password is to guess.
#[derive(Args)]
pub struct Strength {
    /// The password to rate.
    #[clap(value_parser)]
    password: String,

    /// Also print the features the classifier is fed with.
    #[clap(long)]
    features: bool,
}

/// Hash a plaintext.
#[derive(Args)]
pub struct Hash {
    /// The hash algorithm.
    #[clap(value_parser = check_algorithm)]
    algorithm: HashFunction,

    /// The text to hash.
    #[clap(value_parser)]
    plaintext: String,
}

/// Train a Markov model on a wordlist and store it.
#[derive(Args)]
pub struct TrainMarkov {
    /// The wordlist to learn from, one word per line.
    #[clap(value_parser)]
    corpus: PathBuf,

    /// Where the model should be stored.
    #[clap(value_parser)]
    out: PathBuf,

    /// The number of characters the next character is conditioned on.
    #[clap(short, long, value_parser = check_order, default_value_t = DEFAULT_MARKOV_ORDER)]
    order: usize,
}

/// The brute force search space.
#[derive(Args)]
pub struct BruteForceArgs {
    /// The charset to use.
    #[clap(short, long, value_parser = check_charset, default_value_t = String::from_utf8_lossy(DEFAULT_CHARSET).to_string())]
    charset: String,

    /// The minimum password length.
    #[clap(short = 'm', long, value_parser = value_parser!(u8).range(1..), default_value_t = 1)]
    min_password_length: u8,

    /// The maximum password length.
    #[clap(short = 'l', long, value_parser = value_parser!(u8).range(1..=MAX_PASSWORD_LENGTH_ALLOWED as i64), default_value_t = DEFAULT_MAX_PASSWORD_LENGTH)]
    max_password_length: u8,
}

impl BruteForceArgs {
    fn builder(&self) -> BruteForceCtxBuilder {
        BruteForceCtxBuilder::new()
            .charset(self.charset.as_bytes())
            .min_password_length(self.min_password_length)
            .max_password_length(self.max_password_length)
    }
}

/// Personal information about the owner of the password.
#[derive(Args)]
pub struct ProfileArgs {
    /// Read the profile from a JSON file.
    #[clap(long, value_parser, conflicts_with = "name")]
    profile: Option<PathBuf>,

    /// The full name of the owner.
    #[clap(long, value_parser)]
    name: Option<String>,

    /// The date of birth, as YYYY-MM-DD, DD/MM/YYYY or YYYYMMDD.
    #[clap(long, value_parser, requires = "name")]
    dob: Option<String>,

    #[clap(long, value_parser, requires = "name")]
    phone: Option<String>,

    #[clap(long, value_parser, requires = "name")]
    pet: Option<String>,

    #[clap(long, value_parser, requires = "name")]
    company: Option<String>,
}

impl ProfileArgs {
    /// Returns the profile given on the command line, if any.
    fn load(&self) -> Result<Option<Profile>> {
        if let Some(path) = &self.profile {
            let file = File::open(path).context("Unable to open the profile")?;
            let profile = serde_json::from_reader(BufReader::new(file))
                .context("The profile is not valid JSON")?;
            return Ok(Some(profile));
        }

        let Some(name) = &self.name else {
            return Ok(None);
        };

        let mut profile = Profile::new(name.as_str());
        if let Some(dob) = &self.dob {
            profile = profile.dob(dob.as_str());
        }
        if let Some(phone) = &self.phone {
            profile = profile.phone(phone.as_str());
        }
        if let Some(pet) = &self.pet {
            profile = profile.pet_name(pet.as_str());
        }
        if let Some(company) = &self.company {
            profile = profile.company(company.as_str());
        }

        Ok(Some(profile))
    }
}

/// Attaches the stable kind of an engine error to its context.
trait KindContext<T> {
    fn kind_context(self, context: &'static str) -> Result<T>;
}

impl<T> KindContext<T> for CrackResult<T> {
    fn kind_context(self, context: &'static str) -> Result<T> {
        self.map_err(|err| {
            let kind = err.kind();
            anyhow::Error::new(err).context(format!("{context} ({kind:?})"))
        })
    }
}

/// Checks if the charset is made of ASCII characters.
fn check_charset(charset: &str) -> Result<String> {
    if !charset.is_ascii() {
        bail!("The charset can only contain ASCII characters");
    }

    Ok(charset.to_owned())
}

/// Checks if the digest is valid hexadecimal.
fn check_hex(hash: &str) -> Result<String> {
    if hash.trim().chars().any(|c| !c.is_ascii_hexdigit()) {
        bail!("The digest is not valid hexadecimal");
    }

    Ok(hash.trim().to_owned())
}

/// Checks if the Markov order is at least 1.
fn check_order(order: &str) -> Result<usize> {
    let order = order
        .parse::<usize>()
        .context("The order should be a number")?;

    if order == 0 {
        bail!("The order should be at least 1");
    }

    Ok(order)
}

fn check_algorithm(algorithm: &str) -> Result<HashFunction> {
    Ok(algorithm.parse()?)
}

/// Checks if the time budget is a positive number of seconds.
fn check_seconds(seconds: &str) -> Result<Duration> {
    let seconds = seconds
        .parse::<f64>()
        .context("The time budget should be a number of seconds")?;

    if !seconds.is_finite() || seconds < 0. {
        bail!("The time budget should be a positive number of seconds");
    }

    Ok(Duration::from_secs_f64(seconds))
}

/// Prints a value as pretty JSON on stdout.
fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Unable to serialize the output")?;
    println!("{json}");
    Ok(())
}

fn install_logger(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    install_logger(cli.verbose);

    match cli.commands {
        Commands::Identify(id) => identify(id, cli.json)?,
        Commands::Hash(h) => hash(h)?,
        Commands::TrainMarkov(train) => train_markov(train, cli.json)?,
        Commands::Attack(atk) => attack(atk, &cli.engine.build()?, cli.json)?,
        Commands::Live(live_args) => live(live_args, &cli.engine.build()?, cli.json)?,
        Commands::Guess(g) => guess(g, &cli.engine.build()?, cli.json)?,
        Commands::Strength(s) => strength(s, &cli.engine.build()?, cli.json)?,
    }

    Ok(())
}
