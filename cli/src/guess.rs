use anyhow::Result;
use comfy_table::{presets::UTF8_BORDERS_ONLY, Cell, Table};

use passbreak_core::{generator::load_wordlist, Engine, GuessOptions, GuessSource, WordSource};

use crate::{print_json, Guess, KindContext};

pub fn guess(g: Guess, engine: &Engine, json: bool) -> Result<()> {
    let source = if let Some(path) = &g.external {
        let guesses = load_wordlist(path).kind_context("Unable to read the external guesses")?;
        GuessSource::External {
            label: g.label.clone(),
            guesses,
        }
    } else if let Some(path) = &g.wordlist {
        GuessSource::Wordlist(WordSource::File(path.clone()))
    } else if let Some(profile) = g.profile.load()? {
        GuessSource::Profile(profile)
    } else {
        GuessSource::Wordlist(WordSource::Memory(engine.default_wordlist().clone()))
    };

    let options = GuessOptions {
        limit: g.limit,
        rules: !g.no_rules,
        markov: g.markov,
    };

    let report = engine
        .generate_guesses(&source, &options)
        .kind_context("Unable to generate guesses")?;

    if json {
        return print_json(&report);
    }

    for guess in &report.guesses {
        println!("{}", guess.password);
    }

    // the breakdown goes to stderr so the guesses can be piped
    let mut display_table = Table::new();
    display_table.load_preset(UTF8_BORDERS_ONLY);
    display_table.set_header(vec!["Source", "Guesses", "Description"]);

    for sub_phase in &report.sub_phases {
        display_table.add_row(vec![
            Cell::new(&sub_phase.name),
            Cell::new(sub_phase.count),
            Cell::new(&sub_phase.description),
        ]);
    }

    eprintln!("{display_table}");

    Ok(())
}
