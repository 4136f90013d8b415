//! Device configuration for Shelly integrations.
//!
//! TOML device tables, credential resolution (env + keyring + plaintext),
//! and translation to `shelly_core::DeviceConfig`. Loading is read-only;
//! the host owns the file.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use shelly_core::{CoreError, DeviceConfig, Generation};
use thiserror::Error;
use tracing::debug;

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no device '{id}' in configuration")]
    UnknownDevice { id: String },

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

impl From<ConfigError> for CoreError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::UnknownDevice { id } => CoreError::DeviceNotFound { identifier: id },
            other => CoreError::Config {
                message: other.to_string(),
            },
        }
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level configuration file.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub defaults: Defaults,

    /// Devices keyed by host-chosen id.
    #[serde(default)]
    pub devices: BTreeMap<String, DeviceEntry>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Defaults {
    /// HTTP request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub http_timeout: u64,

    /// WebSocket RPC timeout in seconds.
    #[serde(default = "default_timeout")]
    pub rpc_timeout: u64,

    /// Consult the OS keyring during password resolution.
    #[serde(default = "default_keyring")]
    pub keyring: bool,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            http_timeout: default_timeout(),
            rpc_timeout: default_timeout(),
            keyring: default_keyring(),
        }
    }
}

fn default_timeout() -> u64 {
    10
}
fn default_keyring() -> bool {
    true
}

/// One `[devices.<id>]` table.
#[derive(Debug, Deserialize, Serialize)]
pub struct DeviceEntry {
    /// Host, `host:port`, or URL.
    pub address: String,

    pub generation: Generation,

    /// Gen1 username (Gen2 always uses `admin`).
    pub username: Option<String>,

    /// Plaintext password (prefer keyring or env var).
    pub password: Option<String>,

    /// Environment variable holding the password.
    pub password_env: Option<String>,

    /// Override HTTP timeout.
    pub http_timeout: Option<u64>,

    /// Override RPC timeout.
    pub rpc_timeout: Option<u64>,
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("io", "shelly-link", "shelly-link").map_or_else(
        || PathBuf::from(".").join("shelly.toml"),
        |dirs| dirs.config_dir().join("shelly.toml"),
    )
}

// ── Config loading ──────────────────────────────────────────────────

/// Load from the default path + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from `path` + `SHELLY_` environment variables.
///
/// Nested keys use a double underscore:
/// `SHELLY_DEVICES__PLUG__ADDRESS=192.168.1.20`. A missing file is not an
/// error.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("SHELLY_").split("__"));

    let config: Config = figment.extract()?;
    debug!(path = %path.display(), devices = config.devices.len(), "configuration loaded");
    Ok(config)
}

// ── Credential resolution ───────────────────────────────────────────

/// Resolve a device password. Devices without auth have none.
///
/// Order: `password_env` variable, OS keyring (`shelly-link` /
/// `<id>/password`), then plaintext.
pub fn resolve_password(entry: &DeviceEntry, device_id: &str, use_keyring: bool) -> Option<SecretString> {
    // 1. Env var
    if let Some(ref env_name) = entry.password_env {
        if let Ok(pw) = std::env::var(env_name) {
            return Some(SecretString::from(pw));
        }
    }

    // 2. Keyring
    if use_keyring {
        if let Ok(keyring_entry) = keyring::Entry::new("shelly-link", &format!("{device_id}/password")) {
            if let Ok(pw) = keyring_entry.get_password() {
                return Some(SecretString::from(pw));
            }
        }
    }

    // 3. Plaintext in config
    entry.password.clone().map(SecretString::from)
}

// ── Translation to DeviceConfig ─────────────────────────────────────

/// Build the `DeviceConfig` for one configured device.
pub fn device_config(config: &Config, device_id: &str) -> Result<DeviceConfig, ConfigError> {
    let entry = config
        .devices
        .get(device_id)
        .ok_or_else(|| ConfigError::UnknownDevice {
            id: device_id.into(),
        })?;

    if entry.address.trim().is_empty() {
        return Err(ConfigError::Validation {
            field: format!("devices.{device_id}.address"),
            reason: "must not be empty".into(),
        });
    }

    let http_timeout = timeout(
        entry.http_timeout.unwrap_or(config.defaults.http_timeout),
        device_id,
        "http_timeout",
    )?;
    let rpc_timeout = timeout(
        entry.rpc_timeout.unwrap_or(config.defaults.rpc_timeout),
        device_id,
        "rpc_timeout",
    )?;

    let mut device = DeviceConfig::new(device_id, entry.address.trim(), entry.generation);
    device.username.clone_from(&entry.username);
    device.password = resolve_password(entry, device_id, config.defaults.keyring);
    device.http_timeout = http_timeout;
    device.rpc_timeout = rpc_timeout;
    Ok(device)
}

/// Every configured device, in id order.
pub fn device_configs(config: &Config) -> Result<Vec<DeviceConfig>, ConfigError> {
    config
        .devices
        .keys()
        .map(|id| device_config(config, id))
        .collect()
}

fn timeout(secs: u64, device_id: &str, field: &str) -> Result<Duration, ConfigError> {
    if secs == 0 {
        return Err(ConfigError::Validation {
            field: format!("devices.{device_id}.{field}"),
            reason: "must be at least one second".into(),
        });
    }
    Ok(Duration::from_secs(secs))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use figment::Jail;
    use pretty_assertions::assert_eq;
    use secrecy::ExposeSecret;

    const FILE: &str = r#"
        [defaults]
        rpc_timeout = 5
        keyring = false

        [devices.plug]
        address = "192.168.1.20"
        generation = "gen1"
        username = "admin"
        password = "plain"

        [devices.plus]
        address = "192.168.1.21"
        generation = "gen2"
        password_env = "PLUS_PASSWORD"
        http_timeout = 3
    "#;

    fn load(jail: &Jail) -> figment::error::Result<Config> {
        load_config_from(&jail.directory().join("shelly.toml")).map_err(|e| e.to_string().into())
    }

    #[test]
    fn devices_translate_with_defaults_and_overrides() {
        Jail::expect_with(|jail| {
            jail.create_file("shelly.toml", FILE)?;
            jail.set_env("PLUS_PASSWORD", "from-env");
            let config = load(jail)?;

            let plug = device_config(&config, "plug").map_err(|e| e.to_string())?;
            assert_eq!(plug.generation, Generation::Gen1);
            assert_eq!(plug.http_timeout, Duration::from_secs(10));
            assert_eq!(plug.rpc_timeout, Duration::from_secs(5));
            assert_eq!(plug.password.as_ref().map(|p| p.expose_secret().to_owned()), Some("plain".into()));

            let plus = device_config(&config, "plus").map_err(|e| e.to_string())?;
            assert_eq!(plus.http_timeout, Duration::from_secs(3));
            assert_eq!(
                plus.password.as_ref().map(|p| p.expose_secret().to_owned()),
                Some("from-env".into())
            );
            Ok(())
        });
    }

    #[test]
    fn env_overrides_file_values() {
        Jail::expect_with(|jail| {
            jail.create_file("shelly.toml", FILE)?;
            jail.set_env("SHELLY_DEVICES__PLUG__ADDRESS", "10.0.0.9");
            let config = load(jail)?;
            assert_eq!(config.devices["plug"].address, "10.0.0.9");
            Ok(())
        });
    }

    #[test]
    fn missing_password_env_falls_back_to_nothing() {
        Jail::expect_with(|jail| {
            jail.create_file("shelly.toml", FILE)?;
            let config = load(jail)?;
            let plus = device_config(&config, "plus").map_err(|e| e.to_string())?;
            assert!(plus.password.is_none());
            Ok(())
        });
    }

    #[test]
    fn unknown_device_and_bad_values() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "shelly.toml",
                r#"
                [defaults]
                keyring = false
                [devices.broken]
                address = "  "
                generation = "gen2"
                "#,
            )?;
            let config = load(jail)?;

            assert!(matches!(
                device_config(&config, "nope"),
                Err(ConfigError::UnknownDevice { .. })
            ));
            assert!(matches!(
                device_configs(&config),
                Err(ConfigError::Validation { .. })
            ));
            Ok(())
        });
    }

    #[test]
    fn unknown_generation_is_rejected() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "shelly.toml",
                "[devices.x]\naddress = \"h\"\ngeneration = \"gen9\"\n",
            )?;
            assert!(load(jail).is_err());
            Ok(())
        });
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config_from(&dir.path().join("absent.toml")).unwrap();
        assert!(config.devices.is_empty());
        assert_eq!(config.defaults.http_timeout, 10);
        assert!(config.defaults.keyring);
    }

    #[test]
    fn config_errors_fold_into_core_errors() {
        let err: CoreError = ConfigError::UnknownDevice { id: "x".into() }.into();
        assert!(matches!(err, CoreError::DeviceNotFound { .. }));
    }
}
