//! Reward parameters loaded from an optional file plus environment overrides.
//!
//! Sources, later wins:
//! 1. built-in defaults
//! 2. the file passed with `--config` (TOML, JSON or YAML by extension)
//! 3. `ACCRUE__<SECTION>__<FIELD>` environment variables,
//!    e.g. `ACCRUE__MINING__RATE_CEILING=5`

use std::path::Path;

use accrue_core::params::RewardParams;
use anyhow::{Context, Result};
use config::{Config, Environment, File};

pub const ENV_PREFIX: &str = "ACCRUE";

pub fn load(path: Option<&Path>) -> Result<RewardParams> {
    let mut builder = Config::builder();
    if let Some(path) = path {
        builder = builder.add_source(File::from(path).required(true));
    }
    let params: RewardParams = builder
        .add_source(Environment::with_prefix(ENV_PREFIX).separator("__").try_parsing(true))
        .build()
        .context("failed to read reward parameters")?
        .try_deserialize()
        .context("failed to parse reward parameters")?;
    params.validate().context("invalid reward parameters")?;
    Ok(params)
}
