use std::path::{Path, PathBuf};

use {secrecy::SecretString, tracing::debug};

use crate::schema::WardenConfig;

pub const CONFIG_FILE_NAME: &str = "warden.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("no configuration directory available on this platform")]
    NoConfigDir,
}

/// Directory holding `warden.toml`, e.g. `~/.config/warden` on Linux.
pub fn config_dir() -> Result<PathBuf, ConfigError> {
    directories::ProjectDirs::from("dev", "warden", "warden")
        .map(|dirs| dirs.config_dir().to_path_buf())
        .ok_or(ConfigError::NoConfigDir)
}

/// Load `warden.toml` from [`config_dir`], reading `.env` first.
pub fn load_default_config() -> Result<WardenConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_config(config_dir()?.join(CONFIG_FILE_NAME))
}

pub fn load_config(path: impl AsRef<Path>) -> Result<WardenConfig, ConfigError> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(path = %path.display(), "loaded warden config");
    load_config_from_str(&raw)
}

/// Parse configuration text and apply environment credential overrides.
pub fn load_config_from_str(raw: &str) -> Result<WardenConfig, ConfigError> {
    let mut config: WardenConfig = toml::from_str(raw)?;
    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    Ok(config)
}

fn apply_env_overrides(config: &mut WardenConfig, lookup: impl Fn(&str) -> Option<String>) {
    for (id, entry) in &mut config.providers {
        let prefix = env_prefix(id);
        if let Some(client_id) = lookup(&format!("{prefix}_CLIENT_ID")) {
            debug!(provider = %id, "client id taken from environment");
            entry.client_id = Some(client_id);
        }
        if let Some(secret) = lookup(&format!("{prefix}_CLIENT_SECRET")) {
            debug!(provider = %id, "client secret taken from environment");
            entry.client_secret = Some(SecretString::new(secret));
        }
    }
}

fn env_prefix(provider_id: &str) -> String {
    let normalized: String = provider_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect();
    format!("WARDEN_{normalized}")
}
