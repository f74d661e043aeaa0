pub mod config;
pub mod routes;
pub mod serve;
pub mod syncs;

use anyhow::Context;
use concord_core::Config;
use std::path::Path;

pub const ADMIN_ENV: &str = "TEMPLATE_ADMIN_KERBEROS";

/// Load `path` and apply environment overrides.
pub fn load_config(path: &Path) -> anyhow::Result<Config> {
    let mut config = Config::load(path)
        .with_context(|| format!("failed to load config from {}", path.display()))?;
    config.access = config
        .access
        .with_env_override(std::env::var(ADMIN_ENV).ok().as_deref());
    Ok(config)
}
