//! Configuration — TOML file, `.env` and environment overrides.

use std::path::{Path, PathBuf};

use chrono::NaiveTime;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::{Result, WatchError};

const MASK: &str = "••••••••";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WatchConfig {
    #[serde(default)]
    pub discord: DiscordConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub notify: NotifyConfig,
}

/// Discord bot configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscordConfig {
    #[serde(default)]
    pub bot_token: String,
    /// Channel that receives scheduled notifications.
    #[serde(default)]
    pub channel_id: String,
    #[serde(default = "default_prefix")]
    pub command_prefix: String,
    /// Users allowed to run `check_now` and `reset_db`.
    #[serde(default)]
    pub admin_user_ids: Vec<String>,
    /// Gateway intents bitmask.
    #[serde(default = "default_intents")]
    pub intents: u64,
}

fn default_prefix() -> String { "!".into() }
fn default_intents() -> u64 {
    // GUILDS | GUILD_MESSAGES | DIRECT_MESSAGES | MESSAGE_CONTENT
    (1 << 0) | (1 << 9) | (1 << 12) | (1 << 15)
}

impl Default for DiscordConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            channel_id: String::new(),
            command_prefix: default_prefix(),
            admin_user_ids: Vec::new(),
            intents: default_intents(),
        }
    }
}

/// Remote record store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_key: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 { 30 }

impl Default for StoreConfig {
    fn default() -> Self {
        Self { url: String::new(), access_key: None, timeout_secs: default_timeout_secs() }
    }
}

/// Daily check time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Local time of day, `HH:MM` or `HH:MM:SS`.
    #[serde(default = "default_time")]
    pub time: String,
    /// IANA timezone name.
    #[serde(default = "default_timezone")]
    pub timezone: String,
}

fn default_time() -> String { "10:00".into() }
fn default_timezone() -> String { "Europe/Paris".into() }

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self { time: default_time(), timezone: default_timezone() }
    }
}

impl ScheduleConfig {
    pub fn time_of_day(&self) -> Result<NaiveTime> {
        NaiveTime::parse_from_str(&self.time, "%H:%M")
            .or_else(|_| NaiveTime::parse_from_str(&self.time, "%H:%M:%S"))
            .map_err(|_| WatchError::config(format!("schedule.time '{}' is not HH:MM", self.time)))
    }

    pub fn tz(&self) -> Result<Tz> {
        self.timezone
            .parse::<Tz>()
            .map_err(|_| WatchError::config(format!("schedule.timezone '{}' is unknown", self.timezone)))
    }
}

/// Notification appearance and pacing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyConfig {
    #[serde(default = "default_title")]
    pub title: String,
    #[serde(default = "default_color")]
    pub color: u32,
    /// Maximum description length, in characters.
    #[serde(default = "default_description_limit")]
    pub description_limit: usize,
    /// Delay between two sends of the same batch.
    #[serde(default = "default_pacing_ms")]
    pub pacing_ms: u64,
}

fn default_title() -> String { "🎮 New game added!".into() }
fn default_color() -> u32 { 0x00ff00 }
fn default_description_limit() -> usize { 1000 }
fn default_pacing_ms() -> u64 { 1000 }

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            title: default_title(),
            color: default_color(),
            description_limit: default_description_limit(),
            pacing_ms: default_pacing_ms(),
        }
    }
}

impl WatchConfig {
    /// `~/.storewatch`
    pub fn home_dir() -> PathBuf {
        dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")).join(".storewatch")
    }

    pub fn default_path() -> PathBuf {
        Self::home_dir().join("config.toml")
    }

    /// Load the default config file (if any), then `.env` and the process
    /// environment on top.
    pub fn load() -> Result<Self> {
        let path = Self::default_path();
        let mut config = if path.exists() {
            Self::from_file(&path)?
        } else {
            tracing::debug!("No config file at {}, using environment only", path.display());
            Self::default()
        };
        config.apply_process_env();
        Ok(config)
    }

    /// Load an explicit config file (`~` is expanded), then the environment.
    pub fn load_from(path: &Path) -> Result<Self> {
        let expanded = shellexpand::tilde(&path.to_string_lossy()).into_owned();
        let mut config = Self::from_file(Path::new(&expanded))?;
        config.apply_process_env();
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| WatchError::config(format!("cannot read {}: {e}", path.display())))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| WatchError::config(format!("invalid TOML: {e}")))
    }

    fn apply_process_env(&mut self) {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!("Loaded environment from {}", path.display());
        }
        self.apply_env_with(|name| std::env::var(name).ok());
    }

    /// Override fields from environment variables resolved by `lookup`.
    /// Empty values are ignored.
    pub fn apply_env_with(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("DISCORD_TOKEN") { self.discord.bot_token = v; }
        if let Some(v) = get("CHANNEL_ID") { self.discord.channel_id = v; }
        if let Some(v) = get("JSONBIN_URL") { self.store.url = v; }
        if let Some(v) = get("JSONBIN_API_KEY") { self.store.access_key = Some(v); }
        if let Some(v) = get("WATCH_TIME") { self.schedule.time = v; }
        if let Some(v) = get("WATCH_TIMEZONE") { self.schedule.timezone = v; }
    }

    /// Report every missing or malformed required value at once.
    pub fn validate(&self) -> Result<()> {
        let mut problems = Vec::new();

        if self.discord.bot_token.trim().is_empty() {
            problems.push("discord.bot_token (DISCORD_TOKEN) is required".to_string());
        }
        match self.discord.channel_id.trim().parse::<u64>() {
            Ok(id) if id > 0 => {}
            _ => problems.push(format!(
                "discord.channel_id (CHANNEL_ID) must be a non-zero numeric id, got '{}'",
                self.discord.channel_id
            )),
        }
        if self.discord.command_prefix.is_empty() {
            problems.push("discord.command_prefix must not be empty".to_string());
        }
        if self.store.url.trim().is_empty() {
            problems.push("store.url (JSONBIN_URL) is required".to_string());
        } else if !self.store.url.starts_with("http://") && !self.store.url.starts_with("https://") {
            problems.push(format!("store.url '{}' must be an http(s) URL", self.store.url));
        }
        if let Err(e) = self.schedule.time_of_day() {
            problems.push(e.to_string());
        }
        if let Err(e) = self.schedule.tz() {
            problems.push(e.to_string());
        }
        if self.notify.description_limit == 0 {
            problems.push("notify.description_limit must be positive".to_string());
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(WatchError::config(problems.join("; ")))
        }
    }

    /// Copy with every secret replaced, for display.
    pub fn masked(&self) -> Self {
        let mut copy = self.clone();
        if !copy.discord.bot_token.is_empty() {
            copy.discord.bot_token = MASK.into();
        }
        if copy.store.access_key.is_some() {
            copy.store.access_key = Some(MASK.into());
        }
        copy
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| WatchError::config(format!("serialize: {e}")))
    }
}
