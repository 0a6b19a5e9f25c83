use serde::Deserialize;
use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::utils::time::CalendarZone;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Mongo,
    Memory,
}

impl FromStr for StorageBackend {
    type Err = config::ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "mongo" | "mongodb" => Ok(StorageBackend::Mongo),
            "memory" => Ok(StorageBackend::Memory),
            other => Err(config::ConfigError::Message(format!(
                "unknown storage backend: {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub temperature: f32,
    pub timeout_secs: u64,
}

impl LlmConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone)]
pub struct InterviewConfig {
    pub duration_seconds: u64,
    pub tick_interval_ms: u64,
    pub retention_seconds: u64,
}

impl InterviewConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }

    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_seconds)
    }
}

impl Default for InterviewConfig {
    fn default() -> Self {
        Self {
            duration_seconds: 1800,
            tick_interval_ms: 1000,
            retention_seconds: 600,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub storage_backend: StorageBackend,
    pub mongo_uri: String,
    pub mongo_database: String,
    pub llm: LlmConfig,
    pub interview: InterviewConfig,
    /// Offset of the calendar day from UTC; `None` means host local time.
    pub utc_offset_minutes: Option<i32>,
    pub stats_worker_interval_secs: u64,
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        // Load environment variables from root .env file (two levels up)
        // Try root .env first, then fallback to local .env
        let skip_root_env = env::var("SKIP_ROOT_ENV").is_ok();
        if skip_root_env {
            dotenvy::dotenv().ok();
        } else if dotenvy::from_path("../../.env").is_err() {
            dotenvy::dotenv().ok();
        }

        // Determine environment (defaults to dev)
        let env = env::var("APP_ENV").unwrap_or_else(|_| "dev".to_string());

        // Build configuration from config/*.toml + ENV overrides
        let settings = config::Config::builder()
            .add_source(config::File::with_name(&format!("config/{}", env)).required(false))
            .add_source(config::Environment::with_prefix("APP").separator("__"))
            .build()?;

        let string = |key: &str, var: &str, default: &str| -> String {
            settings
                .get_string(key)
                .or_else(|_| env::var(var))
                .unwrap_or_else(|_| default.to_string())
        };

        let bind_addr = string("server.bind_addr", "BIND_ADDR", "0.0.0.0:8081");
        let storage_backend = string("storage.backend", "STORAGE_BACKEND", "mongo").parse()?;
        let mongo_uri = string(
            "database.mongo_uri",
            "MONGO_URI",
            "mongodb://localhost:27017",
        );
        let mongo_database = string("database.mongo_database", "MONGO_DATABASE", "mockinterview");

        let api_key = settings
            .get_string("llm.api_key")
            .or_else(|_| env::var("LLM_API_KEY"))
            .or_else(|_| env::var("OPENAI_API_KEY"))
            .ok()
            .filter(|key| !key.trim().is_empty());
        if api_key.is_none() {
            eprintln!("WARNING: no LLM API key configured, generation calls will be rejected");
        }

        let llm = LlmConfig {
            api_url: string("llm.api_url", "LLM_API_URL", "https://api.openai.com/v1"),
            api_key,
            model: string("llm.model", "LLM_MODEL", "gpt-4o-mini"),
            temperature: settings.get_float("llm.temperature").unwrap_or(0.7) as f32,
            timeout_secs: get_u64(&settings, "llm.timeout_secs", 60),
        };

        let defaults = InterviewConfig::default();
        let interview = InterviewConfig {
            duration_seconds: get_u64(
                &settings,
                "interview.duration_seconds",
                defaults.duration_seconds,
            ),
            tick_interval_ms: get_u64(
                &settings,
                "interview.tick_interval_ms",
                defaults.tick_interval_ms,
            ),
            retention_seconds: get_u64(
                &settings,
                "interview.retention_seconds",
                defaults.retention_seconds,
            ),
        };

        let utc_offset_minutes = settings
            .get_int("calendar.utc_offset_minutes")
            .ok()
            .or_else(|| {
                env::var("CALENDAR_UTC_OFFSET_MINUTES")
                    .ok()
                    .and_then(|raw| raw.parse().ok())
            })
            .and_then(|minutes| i32::try_from(minutes).ok());

        Ok(Config {
            bind_addr,
            storage_backend,
            mongo_uri,
            mongo_database,
            llm,
            interview,
            utc_offset_minutes,
            stats_worker_interval_secs: get_u64(&settings, "stats_worker.interval_secs", 3600),
        })
    }

    /// In-memory configuration with no external services.
    pub fn for_tests() -> Self {
        Config {
            bind_addr: "127.0.0.1:0".to_string(),
            storage_backend: StorageBackend::Memory,
            mongo_uri: "mongodb://localhost:27017".to_string(),
            mongo_database: "mockinterview_test".to_string(),
            llm: LlmConfig {
                api_url: "http://127.0.0.1:9".to_string(),
                api_key: None,
                model: "test-model".to_string(),
                temperature: 0.0,
                timeout_secs: 5,
            },
            interview: InterviewConfig::default(),
            utc_offset_minutes: Some(0),
            stats_worker_interval_secs: 3600,
        }
    }

    pub fn calendar_zone(&self) -> CalendarZone {
        CalendarZone::from_offset_minutes(self.utc_offset_minutes)
    }
}

fn get_u64(settings: &config::Config, key: &str, default: u64) -> u64 {
    settings
        .get_int(key)
        .ok()
        .and_then(|value| u64::try_from(value).ok())
        .unwrap_or(default)
}
