use std::path::{Path, PathBuf};

use eyre::OptionExt;
use figment::{
    Figment,
    providers::{Format, Toml},
};
use ntag424::MasterKey;
use ntag424::constants::{DEFAULT_BASE_URL, DEFAULT_URL_PATH};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Default)]
pub struct Config {
    /// Reader to use instead of the first one holding a card
    #[serde(default)]
    pub reader: Option<String>,
    /// Hex master key for key diversification
    #[serde(default)]
    pub master_key_hex: Option<String>,
    /// Base URL of the verification service
    #[serde(default)]
    pub base_url: Option<String>,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("reader", &self.reader)
            .field("master_key_hex", &self.master_key_hex.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl Config {
    /// Replace every field that is set in `overrides`
    pub fn with_overrides(self, overrides: Self) -> Self {
        Self {
            reader: overrides.reader.or(self.reader),
            master_key_hex: overrides.master_key_hex.or(self.master_key_hex),
            base_url: overrides.base_url.or(self.base_url),
        }
    }

    pub fn master_key_configured(&self) -> bool {
        self.master_key_hex.as_deref().is_some_and(|key| !key.trim().is_empty())
    }

    /// Configured master key; an explicit all-zero key is accepted
    pub fn master_key(&self) -> eyre::Result<MasterKey> {
        match self.master_key_hex.as_deref() {
            Some(hex) if self.master_key_configured() => Ok(MasterKey::from_hex(hex.trim())?),
            _ => eyre::bail!("Master key not configured"),
        }
    }

    /// URL template for personalization
    pub fn template(&self, url: Option<String>, base_url: Option<String>) -> String {
        url.unwrap_or_else(|| {
            let base = base_url
                .or_else(|| self.base_url.clone())
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
            format!("{}{DEFAULT_URL_PATH}", base.trim_end_matches('/'))
        })
    }
}

/// Returns the base config directory for ntag424
pub fn config_dir() -> eyre::Result<PathBuf> {
    Ok(std::env::home_dir()
        .ok_or_eyre("home directory not found")?
        .join(".ntag424"))
}

/// Load the TOML configuration; a missing file yields the defaults
pub fn load_config(path: Option<&Path>) -> eyre::Result<Config> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => config_dir()?.join("ntag424.toml"),
    };
    Ok(Figment::new().merge(Toml::file(path)).extract()?)
}
