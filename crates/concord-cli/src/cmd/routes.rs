use concord_server::route_table::RouteTable;
use std::path::Path;

use super::load_config;
use crate::output::{print_json, print_table};

pub fn run(config_path: &Path, json: bool) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let (engine, _) = concord_server::build_engine(&config)?;
    let listing = RouteTable::from_config(&config.routes).listing(engine.registry());

    if json {
        return print_json(&listing);
    }
    let base = config.server.base_url.trim_end_matches('/');
    let rows = listing
        .iter()
        .map(|r| {
            vec![
                format!("{base}/{}", r.path),
                r.kind.to_string(),
                (if r.registered { "" } else { "syncs only" }).to_string(),
            ]
        })
        .collect();
    print_table(&["PATH", "KIND", "NOTE"], rows);
    Ok(())
}
