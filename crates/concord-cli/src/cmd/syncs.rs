use anyhow::Context;
use std::path::Path;

use super::load_config;
use crate::output::{print_json, print_table};

/// Building the engine validates every rule against the registered
/// concepts, so an authoring error fails this command.
pub fn run(config_path: &Path, json: bool) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let (engine, _) =
        concord_server::build_engine(&config).context("synchronizations failed to register")?;
    let syncs = engine.describe();

    if json {
        return print_json(&syncs);
    }
    let rows = syncs
        .iter()
        .map(|s| {
            let when = s
                .when
                .iter()
                .map(|p| {
                    let marker = if p.matches_error { " (error)" } else { "" };
                    format!("{}.{}{marker}", p.concept, p.operation)
                })
                .collect::<Vec<_>>()
                .join(", ");
            vec![s.name.clone(), when, s.then.join(", ")]
        })
        .collect();
    print_table(&["NAME", "WHEN", "THEN"], rows);
    println!("\n{} synchronizations", syncs.len());
    Ok(())
}
