use crate::model::{ConfigError, IndexSymbol};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{Level, debug, info, warn};

pub const DEFAULT_ATH_PATH: &str = "./data/ath_records.json";
pub const DEFAULT_DROP_INCREMENT: i64 = 5;
pub const DEFAULT_FETCH_TIMEOUT_SECONDS: u64 = 30;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileConfig {
    indices: Vec<IndexEntry>,
    storage: StorageSection,
    analysis: AnalysisSection,
    market: MarketSection,
    logging: LoggingSection,
    telegram: TelegramSection,
}

/// Either `"^GSPC"` or `{"symbol": "^GSPC"}`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum IndexEntry {
    Code(String),
    Detailed { symbol: String },
}

impl IndexEntry {
    fn code(&self) -> &str {
        match self {
            IndexEntry::Code(code) => code,
            IndexEntry::Detailed { symbol } => symbol,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct StorageSection {
    ath_path: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct AnalysisSection {
    drop_increment: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct MarketSection {
    fetch_timeout_seconds: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LoggingSection {
    level: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct TelegramSection {
    bot_token: Option<String>,
    chat_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub chat_id: i64,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub indices: Vec<IndexSymbol>,
    pub ath_storage_path: PathBuf,
    pub drop_increment: u32,
    pub fetch_timeout_seconds: u64,
    pub log_level: Level,
    pub telegram: Option<TelegramConfig>,
}

/// Loads configuration from the optional JSON file, with `DCA_*` environment
/// variables taking precedence.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    load_config_with(path, |key| std::env::var(key).ok())
}

/// Same as [`load_config`] with an explicit environment lookup.
pub fn load_config_with(
    path: Option<&Path>,
    env: impl Fn(&str) -> Option<String>,
) -> Result<AppConfig, ConfigError> {
    let file = read_file_config(path)?;
    let env = |key: &str| env(key).filter(|v| !v.trim().is_empty());

    let ath_storage_path = env("DCA_ATH_STORAGE_PATH")
        .map(PathBuf::from)
        .or(file.storage.ath_path)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_ATH_PATH));

    let drop_increment = env_number::<i64>(&env, "DCA_DROP_INCREMENT")?
        .or(file.analysis.drop_increment)
        .unwrap_or(DEFAULT_DROP_INCREMENT);
    let drop_increment = u32::try_from(drop_increment)
        .ok()
        .filter(|inc| (1..=100).contains(inc))
        .ok_or_else(|| {
            ConfigError::InvalidConfiguration(format!(
                "drop_increment must be between 1 and 100, got {}",
                drop_increment
            ))
        })?;

    let fetch_timeout_seconds = env_number::<u64>(&env, "DCA_FETCH_TIMEOUT_SECONDS")?
        .or(file.market.fetch_timeout_seconds)
        .unwrap_or(DEFAULT_FETCH_TIMEOUT_SECONDS);
    if fetch_timeout_seconds == 0 {
        return Err(ConfigError::InvalidConfiguration(
            "fetch_timeout_seconds must be greater than 0".to_string(),
        ));
    }

    let level_name = env("DCA_LOG_LEVEL")
        .or(file.logging.level)
        .unwrap_or_else(|| "INFO".to_string());
    let log_level = parse_level(&level_name)?;

    let telegram = build_telegram_config(&env, file.telegram)?;

    Ok(AppConfig {
        indices: parse_indices(&file.indices),
        ath_storage_path,
        drop_increment,
        fetch_timeout_seconds,
        log_level,
        telegram,
    })
}

fn read_file_config(path: Option<&Path>) -> Result<FileConfig, ConfigError> {
    let Some(path) = path else {
        return Ok(FileConfig::default());
    };
    if !path.exists() {
        debug!("Config file not found at {}, using defaults", path.display());
        return Ok(FileConfig::default());
    }

    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    if content.trim().is_empty() {
        return Ok(FileConfig::default());
    }

    serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn env_number<T: FromStr>(
    env: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<T>, ConfigError> {
    match env(key) {
        None => Ok(None),
        Some(raw) => raw.trim().parse::<T>().map(Some).map_err(|_| {
            ConfigError::InvalidConfiguration(format!(
                "environment variable {} must be an integer: {}",
                key, raw
            ))
        }),
    }
}

fn parse_level(name: &str) -> Result<Level, ConfigError> {
    match name.trim().to_ascii_uppercase().as_str() {
        "WARNING" => Ok(Level::WARN),
        "CRITICAL" => Ok(Level::ERROR),
        other => Level::from_str(other).map_err(|_| {
            ConfigError::InvalidConfiguration(format!("unknown log level: {}", name))
        }),
    }
}

fn parse_indices(entries: &[IndexEntry]) -> Vec<IndexSymbol> {
    let mut indices = Vec::new();
    for entry in entries {
        match IndexSymbol::from_code(entry.code()) {
            Some(symbol) if !indices.contains(&symbol) => indices.push(symbol),
            Some(_) => debug!("Duplicate index symbol {}, skipping", entry.code()),
            None => warn!("Unknown index symbol: {}, skipping", entry.code()),
        }
    }

    if indices.is_empty() {
        IndexSymbol::ALL.to_vec()
    } else {
        indices
    }
}

fn build_telegram_config(
    env: &impl Fn(&str) -> Option<String>,
    file: TelegramSection,
) -> Result<Option<TelegramConfig>, ConfigError> {
    let bot_token = env("DCA_TELEGRAM_BOT_TOKEN").or(file.bot_token);
    let chat_id = env_number::<i64>(env, "DCA_TELEGRAM_CHAT_ID")?.or(file.chat_id);

    match (bot_token, chat_id) {
        (Some(bot_token), Some(chat_id)) => Ok(Some(TelegramConfig { bot_token, chat_id })),
        _ => {
            info!("Telegram configuration incomplete, Telegram notifications disabled");
            Ok(None)
        }
    }
}
