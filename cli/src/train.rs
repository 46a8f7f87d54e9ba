use anyhow::Result;
use tracing::info;

use passbreak_core::{generator::load_wordlist, Artifact, MarkovModel};

use crate::{print_json, KindContext, TrainMarkov};

pub fn train_markov(train: TrainMarkov, json: bool) -> Result<()> {
    let words = load_wordlist(&train.corpus).kind_context("Unable to read the corpus")?;
    let model = MarkovModel::train(words.iter().map(|word| &**word), train.order);

    model
        .store(&train.out)
        .kind_context("Unable to store the Markov model")?;

    info!(words = words.len(), order = train.order, "markov model stored");

    if json {
        return print_json(&serde_json::json!({
            "order": train.order,
            "words": words.len(),
            "out": train.out,
        }));
    }

    println!(
        "Order {} model trained on {} words, stored in {}",
        train.order,
        words.len(),
        train.out.display()
    );

    Ok(())
}
