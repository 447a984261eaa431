use std::path::Path;

use anyhow::{Context, bail};
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use gmlzip_filter::RepackOptions;

/// Picked up from the working directory when `--config` is not given.
pub const CONFIG_FILE: &str = "gmlzip.toml";
pub const ENV_PREFIX: &str = "GMLZIP_";

/// Defaults, then the TOML file, then `GMLZIP_*` variables (`__` nests).
pub fn figment(explicit: Option<&Path>) -> anyhow::Result<Figment> {
    let mut figment = Figment::from(Serialized::defaults(RepackOptions::default()));

    match explicit {
        Some(path) => {
            if !path.is_file() {
                bail!("config file '{}' does not exist", path.display());
            }
            figment = figment.merge(Toml::file(path));
        }
        None if Path::new(CONFIG_FILE).is_file() => {
            figment = figment.merge(Toml::file(CONFIG_FILE));
        }
        None => {}
    }

    Ok(figment.merge(Env::prefixed(ENV_PREFIX).split("__")))
}

pub fn load(explicit: Option<&Path>) -> anyhow::Result<RepackOptions> {
    figment(explicit)?
        .extract()
        .context("invalid configuration")
}
