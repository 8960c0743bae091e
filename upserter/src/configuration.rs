use anyhow::Context;
use config::load_config;
use config::shared::UpserterConfig;

/// Loads and validates the upserter configuration.
pub fn load_upserter_config() -> anyhow::Result<UpserterConfig> {
    let config =
        load_config::<UpserterConfig>().context("failed to load the upserter configuration")?;
    config
        .validate()
        .context("the upserter configuration is invalid")?;

    Ok(config)
}
