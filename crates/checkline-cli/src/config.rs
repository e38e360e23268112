use anyhow::{anyhow, Result};
use checkline_core::config::CoreConfig;
use checkline_core::timezone::parse_timezone;
use chrono_tz::Tz;
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::Deserialize;
use std::path::PathBuf;

use crate::timezone::{detect_system_timezone, suggest_timezone};

pub const CONFIG_FILE: &str = "checkline.toml";

#[derive(Deserialize, Debug)]
#[serde(default)]
pub struct Config {
    /// Root directory of the markdown vault
    pub vault: PathBuf,
    /// IANA timezone used for "today" and natural-language dates
    pub timezone: String,
    /// Property names and the status table
    pub core: CoreConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            vault: PathBuf::from("."),
            timezone: detect_system_timezone(),
            core: CoreConfig::default(),
        }
    }
}

impl Config {
    /// Defaults, then `checkline.toml`, then `CHECKLINE_*` variables
    /// (`CHECKLINE_CORE__DUE_KEY` reaches nested keys).
    pub fn new() -> Result<Self, figment::Error> {
        Self::figment().extract()
    }

    fn figment() -> Figment {
        Figment::new()
            .merge(Toml::file(CONFIG_FILE))
            .merge(Env::prefixed("CHECKLINE_").split("__"))
    }

    pub fn tz(&self) -> Result<Tz> {
        parse_timezone(&self.timezone).map_err(|_| {
            anyhow!(
                "Invalid timezone '{}'. Did you mean one of: {}?",
                self.timezone,
                suggest_timezone(&self.timezone).join(", ")
            )
        })
    }
}
