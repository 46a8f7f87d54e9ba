use anyhow::Result;
use comfy_table::{presets::UTF8_BORDERS_ONLY, Cell, Color, Table};

use passbreak_core::{identify_hash, HashStrength};

use crate::{print_json, Identify, KindContext};

pub fn identify(id: Identify, json: bool) -> Result<()> {
    let identification = identify_hash(&id.hash).kind_context("Unable to identify the hash")?;

    if json {
        return print_json(&identification);
    }

    let strength_color = match identification.strength {
        HashStrength::VeryWeak => Color::Red,
        HashStrength::Weak => Color::Yellow,
        HashStrength::Strong => Color::Green,
    };

    let mut display_table = Table::new();
    display_table.load_preset(UTF8_BORDERS_ONLY);
    display_table.set_header(vec!["Algorithm", "Length", "Strength"]);
    display_table.add_row(vec![
        Cell::new(identification.hash_function),
        Cell::new(identification.length),
        Cell::new(identification.strength).fg(strength_color),
    ]);

    println!("{display_table}");

    Ok(())
}
