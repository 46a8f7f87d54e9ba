use anyhow::Result;
use comfy_table::{presets::UTF8_BORDERS_ONLY, Cell, Color, Table};
use human_repr::{HumanCount, HumanDuration, HumanThroughput};

use passbreak_core::{
    AttackOptions, AttackResult, Engine, GeneratorKind, MarkovConfig, WordSource,
    DEFAULT_MARKOV_MAX_LENGTH, DEFAULT_MARKOV_MIN_LENGTH,
};

use crate::{print_json, Attack, KindContext};

pub fn attack(atk: Attack, engine: &Engine, json: bool) -> Result<()> {
    let (rule_cap, hybrid_cap) = if atk.uncapped {
        (None, None)
    } else {
        (Some(atk.rule_cap), Some(atk.hybrid_cap))
    };

    let mut options = AttackOptions::new()
        .rule_cap(rule_cap)
        .hybrid_cap(hybrid_cap)
        .markov(MarkovConfig {
            beam_width: atk.beam_width,
            min_length: DEFAULT_MARKOV_MIN_LENGTH,
            max_length: DEFAULT_MARKOV_MAX_LENGTH,
            cap: atk.markov_cap,
        })
        .brute_force(atk.brute_force.builder())
        .brute_force_cap(atk.brute_force_cap)
        .batch_size(atk.batch_size)
        .time_budget(atk.time_budget);

    if !atk.phases.is_empty() {
        options = options.phases(atk.phases.iter().copied().map(GeneratorKind::from).collect());
    }

    if let Some(path) = atk.wordlist {
        options = options.wordlist(WordSource::File(path));
    }

    if let Some(profile) = atk.profile.load()? {
        options = options.profile(profile);
    }

    match engine.run_attack(&atk.hash, atk.algorithm, &options) {
        Ok(result) => display_result(&result, json),
        Err(err) => {
            if let Some(partial) = err.partial_result() {
                display_result(partial, json)?;
            }

            Err::<(), _>(err).kind_context("The attack was aborted")
        }
    }
}

fn display_result(result: &AttackResult, json: bool) -> Result<()> {
    if json {
        return print_json(result);
    }

    let mut display_table = Table::new();
    display_table.load_preset(UTF8_BORDERS_ONLY);
    display_table.set_header(vec!["#", "Phase", "Candidates", "Time", "Speed", "Result"]);

    for phase in &result.phases {
        let outcome = if phase.success {
            Cell::new("Cracked").fg(Color::Green)
        } else if phase.capped {
            Cell::new("Capped").fg(Color::Yellow)
        } else {
            Cell::new("Exhausted").fg(Color::Grey)
        };

        display_table.add_row(vec![
            Cell::new(phase.ordinal),
            Cell::new(&phase.phase),
            Cell::new(phase.attempted.human_count_bare()),
            Cell::new((phase.time_ms as f64 / 1000.).human_duration()),
            Cell::new(phase.hashes_per_second.human_throughput("H")),
            outcome,
        ]);

        for sub_phase in &phase.sub_phases {
            display_table.add_row(vec![
                Cell::new(""),
                Cell::new(format!("  {}", sub_phase.name)).fg(Color::Grey),
                Cell::new(sub_phase.count.human_count_bare()).fg(Color::Grey),
                Cell::new(""),
                Cell::new(""),
                Cell::new(&sub_phase.description).fg(Color::Grey),
            ]);
        }
    }

    println!("{display_table}");

    match &result.password {
        Some(password) => {
            println!("Password found with {}: {password}", result.method);

            let cracking_phase = result.phases.iter().find(|phase| phase.success);
            if let Some(phase) = cracking_phase {
                if let (Some(base_word), Some(rule)) = (&phase.base_word, &phase.rule) {
                    println!("Base word `{base_word}` mutated by `{rule}`");
                }
            }
        }
        None => eprintln!(
            "No password found for the given digest ({})",
            result.status
        ),
    }

    println!(
        "{} candidates in {} ({})",
        result.attempts.human_count_bare(),
        (result.time_ms as f64 / 1000.).human_duration(),
        result.hashes_per_second.human_throughput("H"),
    );

    Ok(())
}
