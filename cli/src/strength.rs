use anyhow::Result;
use comfy_table::{presets::UTF8_BORDERS_ONLY, Cell, Color, Table};

use passbreak_core::{strength::FEATURE_NAMES, Engine, StrengthClass};

use crate::{print_json, Strength};

fn class_color(class: StrengthClass) -> Color {
    match class {
        StrengthClass::VeryWeak => Color::Red,
        StrengthClass::Weak => Color::DarkYellow,
        StrengthClass::Medium => Color::Yellow,
        StrengthClass::Strong => Color::Green,
    }
}

pub fn strength(s: Strength, engine: &Engine, json: bool) -> Result<()> {
    let prediction = engine.predict_strength(&s.password);

    if json {
        return print_json(&prediction);
    }

    let mut display_table = Table::new();
    display_table.load_preset(UTF8_BORDERS_ONLY);
    display_table.set_header(vec!["Class", "Probability"]);

    for (class, probability) in StrengthClass::ALL.iter().zip(prediction.class_probabilities) {
        let mut class_cell = Cell::new(class);
        if *class == prediction.predicted_class {
            class_cell = class_cell.fg(class_color(*class));
        }

        display_table.add_row(vec![class_cell, Cell::new(format!("{:.1}%", probability * 100.))]);
    }

    println!("{display_table}");
    println!(
        "{} ({:.1}% confidence)",
        prediction.predicted_class,
        prediction.confidence * 100.
    );

    if s.features {
        let mut features_table = Table::new();
        features_table.load_preset(UTF8_BORDERS_ONLY);
        features_table.set_header(vec!["Feature", "Value"]);

        for (name, value) in FEATURE_NAMES.iter().zip(prediction.features) {
            features_table.add_row(vec![Cell::new(name), Cell::new(format!("{value:.3}"))]);
        }

        println!("{features_table}");
    }

    Ok(())
}
