use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

const DEFAULT_ENV_PREFIX: &str = "COACHFEED";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub web: WebConfig,
    #[serde(default)]
    pub ui: UiConfig,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub token: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            token: String::new(),
            user_agent: default_user_agent(),
            timeout: default_timeout(),
        }
    }
}

fn default_base_url() -> String {
    crate::api::DEFAULT_BASE_URL.to_string()
}

fn default_user_agent() -> String {
    format!("coachfeed/{}", crate::VERSION)
}

fn default_timeout() -> Duration {
    Duration::from_secs(20)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WebConfig {
    #[serde(default)]
    pub base_url: String,
    #[serde(default = "default_open_browser")]
    pub open_browser: bool,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            open_browser: default_open_browser(),
        }
    }
}

fn default_open_browser() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UiConfig {
    #[serde(default = "default_tick_rate", with = "humantime_serde")]
    pub tick_rate: Duration,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            tick_rate: default_tick_rate(),
        }
    }
}

fn default_tick_rate() -> Duration {
    Duration::from_millis(120)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LogConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_file")]
    pub file: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: default_log_file(),
        }
    }
}

fn default_log_level() -> String {
    "info".into()
}

fn default_log_file() -> Option<PathBuf> {
    dirs::cache_dir().map(|dir| dir.join("coachfeed").join("coachfeed.log"))
}

#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    pub config_file: Option<PathBuf>,
    pub env_prefix: Option<String>,
}

pub fn load(options: LoadOptions) -> Result<Config> {
    let mut cfg = Config::default();

    if let Some(path) = options.config_file.as_ref() {
        let from_file = read_config_file(path)?;
        cfg = merge_config(cfg, from_file);
    } else if let Some(default_path) = default_config_path() {
        if default_path.exists() {
            let from_file = read_config_file(&default_path)?;
            cfg = merge_config(cfg, from_file);
        }
    }

    let prefix = options.env_prefix.as_deref().unwrap_or(DEFAULT_ENV_PREFIX);
    apply_env(&mut cfg, prefix);

    Ok(cfg)
}

fn read_config_file(path: &Path) -> Result<Config> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file at {}", path.display()))?;
    let config: Config = serde_yaml::from_str(&data)
        .with_context(|| format!("Failed to parse config file at {}", path.display()))?;
    Ok(config)
}

fn merge_config(mut base: Config, other: Config) -> Config {
    if !other.api.base_url.is_empty() {
        base.api.base_url = other.api.base_url;
    }
    if !other.api.token.is_empty() {
        base.api.token = other.api.token;
    }
    if !other.api.user_agent.is_empty() {
        base.api.user_agent = other.api.user_agent;
    }
    if !other.api.timeout.is_zero() {
        base.api.timeout = other.api.timeout;
    }

    if !other.web.base_url.is_empty() {
        base.web.base_url = other.web.base_url;
    }
    base.web.open_browser = other.web.open_browser;

    if !other.ui.tick_rate.is_zero() {
        base.ui.tick_rate = other.ui.tick_rate;
    }

    if !other.log.level.is_empty() {
        base.log.level = other.log.level;
    }
    if other.log.file.is_some() {
        base.log.file = other.log.file;
    }

    base
}

fn apply_env(cfg: &mut Config, prefix: &str) {
    let mut map: HashMap<String, String> = HashMap::new();
    let upper_prefix = format!("{}_", prefix.to_uppercase());

    for (key, value) in env::vars() {
        if let Some(stripped) = key.strip_prefix(&upper_prefix) {
            let normalized = stripped.to_ascii_lowercase().replace("__", ".");
            map.insert(normalized, value);
        }
    }

    for (key, value) in map {
        apply_env_value(cfg, &key, value);
    }
}

fn apply_env_value(cfg: &mut Config, key: &str, value: String) {
    match key {
        "api.base_url" => cfg.api.base_url = value,
        "api.token" => cfg.api.token = value,
        "api.user_agent" => cfg.api.user_agent = value,
        "api.timeout" => {
            if let Ok(duration) = humantime::parse_duration(&value) {
                cfg.api.timeout = duration;
            }
        }
        "web.base_url" => cfg.web.base_url = value,
        "web.open_browser" => {
            if let Ok(open) = value.trim().to_ascii_lowercase().parse::<bool>() {
                cfg.web.open_browser = open;
            }
        }
        "ui.tick_rate" => {
            if let Ok(duration) = humantime::parse_duration(&value) {
                cfg.ui.tick_rate = duration;
            }
        }
        "log.level" => cfg.log.level = value,
        "log.file" => cfg.log.file = Some(PathBuf::from(value)),
        _ => {
            tracing::debug!(key, "ignoring unknown config override");
        }
    }
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("coachfeed").join("config.yaml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use tempfile::tempdir;

    #[test]
    fn defaults_without_overrides() {
        let cfg = load(LoadOptions {
            config_file: None,
            env_prefix: Some("COACHFEED_TEST_DEFAULTS".into()),
        })
        .unwrap();
        assert_eq!(cfg.api.timeout, Duration::from_secs(20));
        assert_eq!(cfg.ui.tick_rate, Duration::from_millis(120));
        assert!(cfg.api.user_agent.starts_with("coachfeed/"));
    }

    #[test]
    fn file_values_merge_over_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(
            &path,
            "api:\n  base_url: https://feed.example\n  timeout: 5s\nweb:\n  base_url: https://web.example\n  open_browser: false\n",
        )
        .unwrap();

        let cfg = load(LoadOptions {
            config_file: Some(path),
            env_prefix: Some("COACHFEED_TEST_FILE".into()),
        })
        .unwrap();
        assert_eq!(cfg.api.base_url, "https://feed.example");
        assert_eq!(cfg.api.timeout, Duration::from_secs(5));
        assert_eq!(cfg.web.base_url, "https://web.example");
        assert!(!cfg.web.open_browser);
        assert_eq!(cfg.log.level, "info");
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let dir = tempdir().unwrap();
        let result = load(LoadOptions {
            config_file: Some(dir.path().join("absent.yaml")),
            env_prefix: Some("COACHFEED_TEST_MISSING".into()),
        });
        assert!(result.is_err());
    }

    #[test]
    fn env_overrides() {
        env::set_var("COACHFEED_TEST_ENV_API__TOKEN", "abc");
        env::set_var("COACHFEED_TEST_ENV_UI__TICK_RATE", "250ms");
        let cfg = load(LoadOptions {
            config_file: None,
            env_prefix: Some("COACHFEED_TEST_ENV".into()),
        })
        .unwrap();
        assert_eq!(cfg.api.token, "abc");
        assert_eq!(cfg.ui.tick_rate, Duration::from_millis(250));
        env::remove_var("COACHFEED_TEST_ENV_API__TOKEN");
        env::remove_var("COACHFEED_TEST_ENV_UI__TICK_RATE");
    }

    #[test]
    fn open_browser_override_ignores_unparsable_values() {
        env::set_var("COACHFEED_TEST_BOOL_WEB__OPEN_BROWSER", "yes");
        let cfg = load(LoadOptions {
            config_file: None,
            env_prefix: Some("COACHFEED_TEST_BOOL".into()),
        })
        .unwrap();
        assert!(cfg.web.open_browser);

        env::set_var("COACHFEED_TEST_BOOL_WEB__OPEN_BROWSER", "False");
        let cfg = load(LoadOptions {
            config_file: None,
            env_prefix: Some("COACHFEED_TEST_BOOL".into()),
        })
        .unwrap();
        assert!(!cfg.web.open_browser);
        env::remove_var("COACHFEED_TEST_BOOL_WEB__OPEN_BROWSER");
    }
}
