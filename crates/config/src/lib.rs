//! Configuration loading for warden.
//!
//! Configuration lives in `warden.toml` (project config directory or an
//! explicit path). Client credentials may be supplied or overridden through
//! `WARDEN_<PROVIDER>_CLIENT_ID` and `WARDEN_<PROVIDER>_CLIENT_SECRET`.

pub mod loader;
pub mod schema;

pub use {
    loader::{ConfigError, config_dir, load_config, load_config_from_str, load_default_config},
    schema::{CookieConfig, ProviderEntry, WardenConfig},
};
