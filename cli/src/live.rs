use std::time::Duration;

use anyhow::Result;
use human_repr::{HumanCount, HumanDuration, HumanThroughput};
use tracing::info;

use passbreak_core::{Engine, LiveOptions, LiveOutcome, ProgressEvent, ProgressKind};

use crate::{Live, KindContext};

pub fn live(live_args: Live, engine: &Engine, json: bool) -> Result<()> {
    let options = LiveOptions::new()
        .brute_force(live_args.brute_force.builder())
        .progress_every(live_args.progress_every)
        .progress_interval(Duration::from_millis(live_args.progress_interval))
        .channel_capacity(live_args.channel_capacity)
        .time_budget(live_args.time_budget);

    let handle = engine
        .start_live_brute_force(&live_args.hash, live_args.algorithm, options)
        .kind_context("Unable to start the brute force")?;

    info!(session_id = %handle.session_id(), "live brute force started");

    while let Some(event) = handle.recv() {
        if json {
            println!("{}", serde_json::to_string(&event)?);
        } else {
            display_event(&event);
        }
    }

    match handle.join() {
        LiveOutcome::Cracked { password, attempts } => {
            if !json {
                println!("Password found after {} candidates: {password}", attempts.human_count_bare());
            }
        }
        LiveOutcome::Exhausted { reason, attempts } => eprintln!(
            "No password found for the given digest ({reason:?} after {} candidates)",
            attempts.human_count_bare()
        ),
        LiveOutcome::Cancelled { attempts } => eprintln!(
            "The brute force was cancelled after {} candidates",
            attempts.human_count_bare()
        ),
    }

    Ok(())
}

fn display_event(event: &ProgressEvent) {
    let elapsed = (event.elapsed_ms as f64 / 1000.).human_duration();

    match event.kind {
        ProgressKind::Progress => eprintln!(
            "[{elapsed}] {} candidates, {}, testing {}",
            event.attempts_so_far.human_count_bare(),
            event.hashes_per_second.human_throughput("H"),
            event.candidate.as_deref().unwrap_or_default(),
        ),
        ProgressKind::PhaseComplete => eprintln!(
            "[{elapsed}] every password of length {} tested",
            event.tier.unwrap_or_default()
        ),
        ProgressKind::Cracked | ProgressKind::Exhausted => (),
    }
}
