use anyhow::Context;
use std::path::Path;

use super::load_config;

pub fn run(config_path: &Path, port: Option<u16>, base_url: Option<String>) -> anyhow::Result<()> {
    let mut config = load_config(config_path)?;
    if let Some(port) = port {
        config.server.port = port;
    }
    if let Some(base_url) = base_url {
        config.server.base_url = base_url;
    }
    for w in config.validate() {
        tracing::warn!(level = ?w.level, "{}", w.message);
    }
    config.ensure_valid().context("refusing to start")?;

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async move {
        tokio::select! {
            res = concord_server::serve(config) => res,
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("shutting down");
                Ok(())
            }
        }
    })
}
