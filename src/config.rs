use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::api;
use crate::media;
use crate::store;

const DEFAULT_ENV_PREFIX: &str = "POSTBOARD";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("unknown source {0:?} (expected \"board\" or \"store\")")]
    UnknownSource(String),
}

/// Which of the two demo back ends the client talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    #[default]
    Board,
    Store,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Board => "board",
            Source::Store => "store",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Source::Board => "Posts",
            Source::Store => "Products",
        }
    }

    /// The store variant is the only one that tells the user a load failed.
    pub fn failure_banner(&self) -> Option<&'static str> {
        match self {
            Source::Board => None,
            Source::Store => Some(store::FAILURE_BANNER),
        }
    }
}

impl FromStr for Source {
    type Err = ConfigError;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "board" | "posts" => Ok(Source::Board),
            "store" | "products" => Ok(Source::Store),
            other => Err(ConfigError::UnknownSource(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub ui: UIConfig,
    #[serde(default)]
    pub media: MediaConfig,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApiConfig {
    #[serde(default)]
    pub source: Source,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_store_url")]
    pub store_url: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            source: Source::default(),
            base_url: default_base_url(),
            store_url: default_store_url(),
            user_agent: default_user_agent(),
            timeout: default_timeout(),
        }
    }
}

impl ApiConfig {
    pub fn active_base_url(&self) -> &str {
        match self.source {
            Source::Board => &self.base_url,
            Source::Store => &self.store_url,
        }
    }

    pub fn set_active_base_url(&mut self, url: String) {
        match self.source {
            Source::Board => self.base_url = url,
            Source::Store => self.store_url = url,
        }
    }
}

fn default_base_url() -> String {
    api::DEFAULT_BASE_URL.to_string()
}

fn default_store_url() -> String {
    store::DEFAULT_STORE_URL.to_string()
}

fn default_user_agent() -> String {
    format!("postboard/{}", crate::VERSION)
}

fn default_timeout() -> Duration {
    Duration::from_secs(20)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UIConfig {
    #[serde(default = "default_search_debounce", with = "humantime_serde")]
    pub search_debounce: Duration,
    #[serde(default = "default_poll_interval", with = "humantime_serde")]
    pub poll_interval: Duration,
}

impl Default for UIConfig {
    fn default() -> Self {
        Self {
            search_debounce: default_search_debounce(),
            poll_interval: default_poll_interval(),
        }
    }
}

fn default_search_debounce() -> Duration {
    Duration::from_millis(300)
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(5)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MediaConfig {
    #[serde(default = "default_image_extensions")]
    pub image_extensions: Vec<String>,
    #[serde(default = "default_news_keywords")]
    pub news_keywords: Vec<String>,
    #[serde(default = "default_probe_images")]
    pub probe_images: bool,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            image_extensions: default_image_extensions(),
            news_keywords: default_news_keywords(),
            probe_images: default_probe_images(),
        }
    }
}

fn default_image_extensions() -> Vec<String> {
    media::DEFAULT_IMAGE_EXTENSIONS
        .iter()
        .map(|ext| ext.to_string())
        .collect()
}

fn default_news_keywords() -> Vec<String> {
    media::DEFAULT_NEWS_KEYWORDS
        .iter()
        .map(|keyword| keyword.to_string())
        .collect()
}

fn default_probe_images() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LogConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

fn default_log_level() -> String {
    "postboard=info".into()
}

#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    pub config_file: Option<PathBuf>,
    pub env_prefix: Option<String>,
}

pub fn load(options: LoadOptions) -> Result<Config> {
    let mut cfg = Config::default();

    if let Some(path) = options.config_file.as_ref() {
        if path.exists() {
            let from_file = read_config_file(path)?;
            cfg = merge_config(cfg, from_file);
        }
    } else if let Some(default_path) = default_config_path() {
        if default_path.exists() {
            let from_file = read_config_file(&default_path)?;
            cfg = merge_config(cfg, from_file);
        }
    }

    let prefix = options.env_prefix.as_deref().unwrap_or(DEFAULT_ENV_PREFIX);
    for (key, value) in load_env(prefix) {
        apply_env_value(&mut cfg, &key, value);
    }

    Ok(cfg)
}

fn read_config_file(path: &Path) -> Result<Config> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file at {}", path.display()))?;
    let config: Config = serde_yaml::from_str(&data)
        .with_context(|| format!("Failed to parse config file at {}", path.display()))?;
    Ok(config)
}

// Values equal to the defaults never override what an earlier layer set.
fn merge_config(mut base: Config, other: Config) -> Config {
    let defaults = Config::default();

    if other.api.source != defaults.api.source {
        base.api.source = other.api.source;
    }
    if !other.api.base_url.is_empty() && other.api.base_url != defaults.api.base_url {
        base.api.base_url = other.api.base_url;
    }
    if !other.api.store_url.is_empty() && other.api.store_url != defaults.api.store_url {
        base.api.store_url = other.api.store_url;
    }
    if !other.api.user_agent.is_empty() && other.api.user_agent != defaults.api.user_agent {
        base.api.user_agent = other.api.user_agent;
    }
    if other.api.timeout != defaults.api.timeout {
        base.api.timeout = other.api.timeout;
    }

    if other.ui.search_debounce != defaults.ui.search_debounce {
        base.ui.search_debounce = other.ui.search_debounce;
    }
    if !other.ui.poll_interval.is_zero() && other.ui.poll_interval != defaults.ui.poll_interval {
        base.ui.poll_interval = other.ui.poll_interval;
    }

    if !other.media.image_extensions.is_empty()
        && other.media.image_extensions != defaults.media.image_extensions
    {
        base.media.image_extensions = other.media.image_extensions;
    }
    if !other.media.news_keywords.is_empty()
        && other.media.news_keywords != defaults.media.news_keywords
    {
        base.media.news_keywords = other.media.news_keywords;
    }
    if other.media.probe_images != defaults.media.probe_images {
        base.media.probe_images = other.media.probe_images;
    }

    if !other.log.level.is_empty() && other.log.level != defaults.log.level {
        base.log.level = other.log.level;
    }
    if other.log.file.is_some() {
        base.log.file = other.log.file;
    }

    base
}

/// Environment overrides as `section.key` pairs. They are applied on top of
/// the merged file config, so they win even when they restore a default.
fn load_env(prefix: &str) -> Vec<(String, String)> {
    let upper_prefix = format!("{}_", prefix.to_uppercase());
    let mut pairs: Vec<(String, String)> = env::vars()
        .filter_map(|(key, value)| {
            let stripped = key.strip_prefix(&upper_prefix)?;
            Some((stripped.to_ascii_lowercase().replace("__", "."), value))
        })
        .collect();
    pairs.sort();
    pairs
}

fn apply_env_value(cfg: &mut Config, key: &str, value: String) {
    match key {
        "api.source" => {
            if let Ok(source) = value.parse::<Source>() {
                cfg.api.source = source;
            }
        }
        "api.base_url" => cfg.api.base_url = value,
        "api.store_url" => cfg.api.store_url = value,
        "api.user_agent" => cfg.api.user_agent = value,
        "api.timeout" => {
            if let Ok(duration) = humantime::parse_duration(&value) {
                cfg.api.timeout = duration;
            }
        }
        "ui.search_debounce" => {
            if let Ok(duration) = humantime::parse_duration(&value) {
                cfg.ui.search_debounce = duration;
            }
        }
        "ui.poll_interval" => {
            if let Ok(duration) = humantime::parse_duration(&value) {
                cfg.ui.poll_interval = duration;
            }
        }
        "media.image_extensions" => cfg.media.image_extensions = split_list(&value),
        "media.news_keywords" => cfg.media.news_keywords = split_list(&value),
        "media.probe_images" => {
            match value.trim().to_ascii_lowercase().as_str() {
                "1" => cfg.media.probe_images = true,
                "0" => cfg.media.probe_images = false,
                other => {
                    if let Ok(flag) = other.parse::<bool>() {
                        cfg.media.probe_images = flag;
                    }
                }
            }
        }
        "log.level" => cfg.log.level = value,
        "log.file" => cfg.log.file = Some(PathBuf::from(value)),
        _ => {}
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

pub fn default_path() -> Option<PathBuf> {
    default_config_path()
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("postboard").join("config.yaml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use tempfile::tempdir;

    #[test]
    fn defaults_match_board_profile() {
        let cfg = Config::default();
        assert_eq!(cfg.api.source, Source::Board);
        assert_eq!(cfg.ui.poll_interval, Duration::from_secs(5));
        assert_eq!(cfg.ui.search_debounce, Duration::from_millis(300));
        assert_eq!(cfg.api.active_base_url(), api::DEFAULT_BASE_URL);
    }

    #[test]
    fn file_values_override_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(
            &path,
            "api:\n  source: store\n  store_url: http://localhost:9999\nui:\n  poll_interval: 2s\nmedia:\n  news_keywords: [example-news]\n",
        )
        .unwrap();
        let cfg = load(LoadOptions {
            config_file: Some(path),
            env_prefix: Some("POSTBOARD_TEST_FILE".into()),
        })
        .unwrap();
        assert_eq!(cfg.api.source, Source::Store);
        assert_eq!(cfg.api.active_base_url(), "http://localhost:9999");
        assert_eq!(cfg.ui.poll_interval, Duration::from_secs(2));
        assert_eq!(cfg.media.news_keywords, vec!["example-news".to_string()]);
        assert_eq!(cfg.ui.search_debounce, Duration::from_millis(300));
    }

    #[test]
    fn env_overrides_do_not_reset_file_values() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, "ui:\n  poll_interval: 9s\n").unwrap();
        env::set_var("POSTBOARD_TEST_ENV_API__SOURCE", "store");
        let cfg = load(LoadOptions {
            config_file: Some(path),
            env_prefix: Some("POSTBOARD_TEST_ENV".into()),
        })
        .unwrap();
        env::remove_var("POSTBOARD_TEST_ENV_API__SOURCE");
        assert_eq!(cfg.api.source, Source::Store);
        assert_eq!(cfg.ui.poll_interval, Duration::from_secs(9));
    }

    #[test]
    fn env_can_restore_defaults_over_file_values() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, "api:\n  source: store\nmedia:\n  probe_images: false\n").unwrap();
        env::set_var("POSTBOARD_TEST_RESTORE_API__SOURCE", "board");
        env::set_var("POSTBOARD_TEST_RESTORE_MEDIA__PROBE_IMAGES", "true");
        let cfg = load(LoadOptions {
            config_file: Some(path),
            env_prefix: Some("POSTBOARD_TEST_RESTORE".into()),
        })
        .unwrap();
        env::remove_var("POSTBOARD_TEST_RESTORE_API__SOURCE");
        env::remove_var("POSTBOARD_TEST_RESTORE_MEDIA__PROBE_IMAGES");
        assert_eq!(cfg.api.source, Source::Board);
        assert!(cfg.media.probe_images);
    }

    #[test]
    fn unparsable_flags_keep_the_current_value() {
        let mut cfg = Config::default();
        apply_env_value(&mut cfg, "media.probe_images", "yes".into());
        assert!(cfg.media.probe_images);
        apply_env_value(&mut cfg, "media.probe_images", "FALSE".into());
        assert!(!cfg.media.probe_images);
        apply_env_value(&mut cfg, "media.probe_images", "maybe".into());
        assert!(!cfg.media.probe_images);
        apply_env_value(&mut cfg, "media.probe_images", "1".into());
        assert!(cfg.media.probe_images);
    }

    #[test]
    fn invalid_yaml_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, "api: [unterminated").unwrap();
        assert!(load(LoadOptions {
            config_file: Some(path),
            env_prefix: Some("POSTBOARD_TEST_BAD".into()),
        })
        .is_err());
    }

    #[test]
    fn source_parses_aliases() {
        assert_eq!("STORE".parse::<Source>(), Ok(Source::Store));
        assert_eq!("posts".parse::<Source>(), Ok(Source::Board));
        assert_eq!(
            "blog".parse::<Source>(),
            Err(ConfigError::UnknownSource("blog".into()))
        );
        assert_eq!(Source::Store.failure_banner(), Some(store::FAILURE_BANNER));
        assert_eq!(Source::Board.failure_banner(), None);
    }
}
