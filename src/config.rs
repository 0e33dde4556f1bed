//! Layered configuration and live runtime settings
//!
//! Settings are resolved once at startup, lowest to highest precedence:
//! built-in defaults, the user config file (`~/.config/apodproxy/config.json`),
//! the project config file (`Config/config.json`, or the `--config` path),
//! environment variables, then command-line flags.
//!
//! After startup the values live in a [`LiveSettings`] handle that the cache,
//! the NASA client and the operator endpoints share and read at call time.

use std::path::PathBuf;
use std::sync::Arc;

use directories::ProjectDirs;
use figment::providers::{Env, Format, Json, Serialized};
use figment::Figment;
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;

use crate::cli::Cli;
use crate::logging::{self, LogFormat};

/// Default time-to-live of a cached APOD response, one day
pub const DEFAULT_CACHE_TIMEOUT_SECS: u64 = 24 * 60 * 60;

/// Project config file read when `--config` is not given
pub const DEFAULT_CONFIG_PATH: &str = "Config/config.json";

/// Environment variables whose values are parsed, matched case-insensitively
const ENV_KEYS: [&str; 6] = [
    "cache_timeout",
    "port",
    "static_dir",
    "nasa_base_url",
    "log_level",
    "log_format",
];

/// Environment variables taken verbatim, so `007` stays `007`
const SECRET_ENV_VARS: [(&str, &str); 2] = [
    ("API_KEY", "api_key"),
    ("OPERATOR_TOKEN", "operator_token"),
];

/// Errors that can occur while resolving configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An explicitly requested config file does not exist
    #[error("Config file not found: {0}")]
    MissingFile(PathBuf),

    /// A layer could not be read or did not match the expected shape
    #[error("Invalid configuration: {0}")]
    Extract(#[from] figment::Error),

    #[error("Invalid port: 0. Must be between 1 and 65535")]
    InvalidPort,

    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("API key cannot be empty")]
    EmptyApiKey,
}

/// Every setting the proxy understands
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// NASA API key sent with every APOD request
    #[serde(deserialize_with = "string_or_number")]
    pub api_key: String,
    /// Seconds an APOD response stays cached
    pub cache_timeout: u64,
    /// Port the HTTP server binds on all interfaces
    pub port: u16,
    /// Bearer token guarding `/clear`, `/settings` and `/submit`
    ///
    /// When unset those endpoints are open to every caller, including reading
    /// and replacing the NASA API key.
    #[serde(deserialize_with = "optional_string_or_number")]
    pub operator_token: Option<String>,
    /// Directory holding `favicon.ico`
    pub static_dir: PathBuf,
    /// Base URL of the NASA API
    pub nasa_base_url: String,
    pub log_level: String,
    pub log_format: LogFormat,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_key: "DEMO_KEY".to_string(),
            cache_timeout: DEFAULT_CACHE_TIMEOUT_SECS,
            port: 5000,
            operator_token: None,
            static_dir: PathBuf::from("images"),
            nasa_base_url: "https://api.nasa.gov".to_string(),
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
        }
    }
}

impl Settings {
    /// Resolves settings from every layer, with `cli` on top
    pub fn load(cli: &Cli) -> Result<Self, ConfigError> {
        let mut figment = Figment::new().merge(Serialized::defaults(Settings::default()));

        match &cli.config {
            Some(path) => {
                if !path.exists() {
                    return Err(ConfigError::MissingFile(path.clone()));
                }
                figment = figment.merge(Json::file(path));
            }
            None => {
                if let Some(user_config) = user_config_path() {
                    figment = figment.merge(Json::file(user_config));
                }
                figment = figment.merge(Json::file(DEFAULT_CONFIG_PATH));
            }
        }

        figment = figment.merge(Env::raw().only(&ENV_KEYS));
        for (var, key) in SECRET_ENV_VARS {
            if let Ok(value) = std::env::var(var) {
                figment = figment.merge(Serialized::default(key, value));
            }
        }

        let settings: Settings = figment.merge(Serialized::defaults(cli)).extract()?;

        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::InvalidPort);
        }

        if logging::parse_level(&self.log_level).is_none() {
            return Err(ConfigError::InvalidLogLevel(self.log_level.clone()));
        }

        if self.api_key.trim().is_empty() {
            return Err(ConfigError::EmptyApiKey);
        }

        Ok(())
    }
}

/// Returns the per-user config file path (`~/.config/apodproxy/config.json` on Linux)
pub fn user_config_path() -> Option<PathBuf> {
    let project_dirs = ProjectDirs::from("", "", "apodproxy")?;
    Some(project_dirs.config_dir().join("config.json"))
}

/// A scalar that config files or forms may send either quoted or bare
#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Text(String),
    Unsigned(u64),
    Signed(i64),
}

impl Scalar {
    fn into_text(self) -> String {
        match self {
            Scalar::Text(text) => text,
            Scalar::Unsigned(n) => n.to_string(),
            Scalar::Signed(n) => n.to_string(),
        }
    }
}

/// Accepts `"abc"` or `12345` for a string setting
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Scalar::deserialize(deserializer).map(Scalar::into_text)
}

fn optional_string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Scalar>::deserialize(deserializer)?.map(Scalar::into_text))
}

/// Accepts `3600` or `"3600"`; rejects negatives, fractions and other text
fn optional_seconds<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Scalar>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Scalar::Unsigned(secs)) => Ok(Some(secs)),
        Some(Scalar::Signed(secs)) => Err(de::Error::custom(format!(
            "cache_timeout must not be negative, got {}",
            secs
        ))),
        Some(Scalar::Text(text)) => text.trim().parse::<u64>().map(Some).map_err(|_| {
            de::Error::custom(format!(
                "cache_timeout must be a whole number of seconds, got {:?}",
                text
            ))
        }),
    }
}

/// Partial update of the operator-editable settings
///
/// `cache_timeout` may arrive as a number or as a string of digits, which is
/// what HTML form fields produce.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SettingsUpdate {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default, deserialize_with = "optional_seconds")]
    pub cache_timeout: Option<u64>,
}

/// Operator-facing view of the live settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SettingsView {
    pub api_key: String,
    pub cache_timeout: u64,
    pub port: u16,
}

/// Shared, mutable runtime settings
///
/// Cloning the handle shares the same underlying values. Readers always see
/// the latest update, so a new API key or TTL takes effect on the next fetch.
#[derive(Debug, Clone)]
pub struct LiveSettings {
    inner: Arc<RwLock<Settings>>,
}

impl LiveSettings {
    pub fn new(settings: Settings) -> Self {
        Self {
            inner: Arc::new(RwLock::new(settings)),
        }
    }

    /// Current NASA API key
    pub async fn api_key(&self) -> String {
        self.inner.read().await.api_key.clone()
    }

    /// Current cache time-to-live in seconds
    pub async fn cache_timeout(&self) -> u64 {
        self.inner.read().await.cache_timeout
    }

    pub async fn view(&self) -> SettingsView {
        let settings = self.inner.read().await;
        SettingsView {
            api_key: settings.api_key.clone(),
            cache_timeout: settings.cache_timeout,
            port: settings.port,
        }
    }

    /// Applies an operator update in memory
    ///
    /// Nothing is written back to disk. An empty API key is rejected and leaves
    /// every setting untouched.
    pub async fn apply(&self, update: SettingsUpdate) -> Result<SettingsView, ConfigError> {
        if let Some(key) = &update.api_key {
            if key.trim().is_empty() {
                return Err(ConfigError::EmptyApiKey);
            }
        }

        let mut settings = self.inner.write().await;
        if let Some(key) = update.api_key {
            settings.api_key = key;
        }
        if let Some(timeout) = update.cache_timeout {
            settings.cache_timeout = timeout;
        }

        Ok(SettingsView {
            api_key: settings.api_key.clone(),
            cache_timeout: settings.cache_timeout,
            port: settings.port,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use figment::Jail;

    /// Points the per-user config lookup inside the jail so the host's files stay out
    fn isolate_user_config(jail: &mut Jail) {
        let home = jail.directory().to_path_buf();
        jail.set_env("XDG_CONFIG_HOME", home.display());
    }

    fn cli(args: &[&str]) -> Cli {
        Cli::parse_from(std::iter::once("apodproxy").chain(args.iter().copied()))
    }

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();

        assert_eq!(settings.api_key, "DEMO_KEY");
        assert_eq!(settings.cache_timeout, 86400);
        assert_eq!(settings.port, 5000);
        assert!(settings.operator_token.is_none());
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_load_without_any_layers_uses_defaults() {
        Jail::expect_with(|jail| {
            isolate_user_config(jail);

            let settings = Settings::load(&cli(&[])).expect("defaults should load");

            assert_eq!(settings, Settings::default());
            Ok(())
        });
    }

    #[test]
    fn test_load_explicit_file_overrides_defaults() {
        Jail::expect_with(|jail| {
            isolate_user_config(jail);
            jail.create_file(
                "apod.json",
                r#"{"api_key": "file-key", "cache_timeout": 600, "port": 8080, "operator_token": "tok"}"#,
            )?;

            let settings = Settings::load(&cli(&["--config", "apod.json"])).expect("file should load");

            assert_eq!(settings.api_key, "file-key");
            assert_eq!(settings.cache_timeout, 600);
            assert_eq!(settings.port, 8080);
            assert_eq!(settings.operator_token.as_deref(), Some("tok"));
            assert_eq!(settings.log_level, "info");
            Ok(())
        });
    }

    #[test]
    fn test_load_missing_explicit_file_is_an_error() {
        Jail::expect_with(|jail| {
            isolate_user_config(jail);

            let result = Settings::load(&cli(&["--config", "nope.json"]));

            assert!(matches!(result, Err(ConfigError::MissingFile(_))));
            Ok(())
        });
    }

    #[test]
    fn test_load_rejects_wrong_types() {
        Jail::expect_with(|jail| {
            isolate_user_config(jail);
            jail.create_file("apod.json", r#"{"cache_timeout": "soon"}"#)?;

            let result = Settings::load(&cli(&["--config", "apod.json"]));

            assert!(matches!(result, Err(ConfigError::Extract(_))));
            Ok(())
        });
    }

    #[test]
    fn test_load_rejects_zero_port() {
        Jail::expect_with(|jail| {
            isolate_user_config(jail);
            jail.create_file("apod.json", r#"{"port": 0}"#)?;

            let result = Settings::load(&cli(&["--config", "apod.json"]));

            assert!(matches!(result, Err(ConfigError::InvalidPort)));
            Ok(())
        });
    }

    #[test]
    fn test_load_rejects_unknown_log_level() {
        Jail::expect_with(|jail| {
            isolate_user_config(jail);
            jail.set_env("LOG_LEVEL", "chatty");

            let result = Settings::load(&cli(&[]));

            assert!(matches!(result, Err(ConfigError::InvalidLogLevel(level)) if level == "chatty"));
            Ok(())
        });
    }

    #[test]
    fn test_load_precedence_file_then_env_then_flags() {
        Jail::expect_with(|jail| {
            isolate_user_config(jail);
            jail.create_file(
                "apod.json",
                r#"{"api_key": "file-key", "cache_timeout": 120, "port": 7000}"#,
            )?;
            jail.set_env("CACHE_TIMEOUT", "300");
            jail.set_env("PORT", "7100");

            let from_env = Settings::load(&cli(&["--config", "apod.json"])).expect("env layer");
            assert_eq!(from_env.api_key, "file-key");
            assert_eq!(from_env.cache_timeout, 300);
            assert_eq!(from_env.port, 7100);

            let from_flags = Settings::load(&cli(&[
                "--config",
                "apod.json",
                "--cache-timeout",
                "60",
            ]))
            .expect("flag layer");
            assert_eq!(from_flags.cache_timeout, 60);
            assert_eq!(from_flags.port, 7100);
            Ok(())
        });
    }

    #[test]
    fn test_load_numeric_secrets_from_env_stay_verbatim() {
        Jail::expect_with(|jail| {
            isolate_user_config(jail);
            jail.set_env("API_KEY", "1234567890");
            jail.set_env("OPERATOR_TOKEN", "007");

            let settings = Settings::load(&cli(&[])).expect("numeric env values should load");

            assert_eq!(settings.api_key, "1234567890");
            assert_eq!(settings.operator_token.as_deref(), Some("007"));
            Ok(())
        });
    }

    #[test]
    fn test_load_numeric_secrets_from_file() {
        Jail::expect_with(|jail| {
            isolate_user_config(jail);
            jail.create_file("apod.json", r#"{"api_key": 12345, "operator_token": 42}"#)?;

            let settings = Settings::load(&cli(&["--config", "apod.json"])).expect("numeric keys");

            assert_eq!(settings.api_key, "12345");
            assert_eq!(settings.operator_token.as_deref(), Some("42"));
            Ok(())
        });
    }

    #[test]
    fn test_load_flag_beats_env_api_key() {
        Jail::expect_with(|jail| {
            isolate_user_config(jail);
            jail.set_env("API_KEY", "env-key");

            let settings = Settings::load(&cli(&["--api-key", "flag-key"])).expect("flags");

            assert_eq!(settings.api_key, "flag-key");
            Ok(())
        });
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_load_project_file_over_user_file() {
        Jail::expect_with(|jail| {
            isolate_user_config(jail);
            std::fs::create_dir_all(jail.directory().join("apodproxy"))
                .expect("user config dir");
            jail.create_file(
                "apodproxy/config.json",
                r#"{"api_key": "user-key", "cache_timeout": 10}"#,
            )?;
            std::fs::create_dir_all(jail.directory().join("Config")).expect("project dir");
            jail.create_file("Config/config.json", r#"{"cache_timeout": 20}"#)?;

            let settings = Settings::load(&cli(&[])).expect("both files");

            assert_eq!(settings.api_key, "user-key");
            assert_eq!(settings.cache_timeout, 20);
            Ok(())
        });
    }

    #[test]
    fn test_settings_update_accepts_number_or_digit_string() {
        let number: SettingsUpdate = serde_json::from_str(r#"{"cache_timeout": 3600}"#).unwrap();
        let text: SettingsUpdate = serde_json::from_str(r#"{"cache_timeout": " 3600 "}"#).unwrap();
        let empty: SettingsUpdate = serde_json::from_str("{}").unwrap();

        assert_eq!(number.cache_timeout, Some(3600));
        assert_eq!(text.cache_timeout, Some(3600));
        assert_eq!(empty, SettingsUpdate::default());
    }

    #[test]
    fn test_settings_update_rejects_bad_timeouts() {
        for body in [
            r#"{"cache_timeout": -5}"#,
            r#"{"cache_timeout": "-5"}"#,
            r#"{"cache_timeout": 1.5}"#,
            r#"{"cache_timeout": "soon"}"#,
        ] {
            assert!(
                serde_json::from_str::<SettingsUpdate>(body).is_err(),
                "{} should be rejected",
                body
            );
        }
    }

    #[tokio::test]
    async fn test_live_settings_apply_updates_values() {
        let live = LiveSettings::new(Settings::default());

        let view = live
            .apply(SettingsUpdate {
                api_key: Some("new-key".to_string()),
                cache_timeout: Some(60),
            })
            .await
            .unwrap();

        assert_eq!(view.api_key, "new-key");
        assert_eq!(view.cache_timeout, 60);
        assert_eq!(live.api_key().await, "new-key");
        assert_eq!(live.cache_timeout().await, 60);
    }

    #[tokio::test]
    async fn test_live_settings_rejects_blank_key() {
        let live = LiveSettings::new(Settings::default());

        let result = live
            .apply(SettingsUpdate {
                api_key: Some("   ".to_string()),
                cache_timeout: Some(60),
            })
            .await;

        assert!(matches!(result, Err(ConfigError::EmptyApiKey)));
        assert_eq!(live.api_key().await, "DEMO_KEY");
        assert_eq!(live.cache_timeout().await, DEFAULT_CACHE_TIMEOUT_SECS);
    }

    #[tokio::test]
    async fn test_live_settings_clones_share_state() {
        let live = LiveSettings::new(Settings::default());
        let other = live.clone();

        other
            .apply(SettingsUpdate {
                api_key: None,
                cache_timeout: Some(5),
            })
            .await
            .unwrap();

        let view = live.view().await;
        assert_eq!(view.cache_timeout, 5);
        assert_eq!(view.port, 5000);
    }
}
