use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result};

/// Runtime configuration loaded from environment variables.
/// Holds secrets and deployment-specific values; the keyword taxonomy and
/// per-language defaults live in the TOML keyword file.
#[derive(Debug, Clone)]
pub struct Config {
    // Source credentials
    pub g2b_api_key: Option<String>,
    pub samgov_api_key: Option<String>,

    // Storage
    pub data_dir: PathBuf,
    pub keywords_file: Option<PathBuf>,

    // Run behaviour
    pub enabled_adapters: Vec<String>,
    pub inter_adapter_delay_secs: u64,
    pub request_timeout_secs: u64,
    pub urgent_deadline_days: i64,

    // Scheduling
    pub daily_run_hours: Vec<u32>,
    pub schedule_stagger_minutes: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            g2b_api_key: None,
            samgov_api_key: None,
            data_dir: PathBuf::from("data"),
            keywords_file: None,
            enabled_adapters: Vec::new(),
            inter_adapter_delay_secs: 5,
            request_timeout_secs: 30,
            urgent_deadline_days: 3,
            daily_run_hours: vec![9, 18],
            schedule_stagger_minutes: 5,
        }
    }
}

impl Config {
    /// Load configuration from the process environment (and `.env` if present).
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable lookup.
    pub fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let daily_run_hours = match var("DAILY_RUN_HOURS") {
            Some(raw) => parse_list::<u32>("DAILY_RUN_HOURS", &raw)?,
            None => defaults.daily_run_hours,
        };
        if let Some(hour) = daily_run_hours.iter().find(|h| **h > 23) {
            anyhow::bail!("DAILY_RUN_HOURS contains invalid hour {hour}");
        }

        Ok(Self {
            g2b_api_key: var("G2B_API_KEY"),
            samgov_api_key: var("SAMGOV_API_KEY"),
            data_dir: var("DATA_DIR").map(PathBuf::from).unwrap_or(defaults.data_dir),
            keywords_file: var("KEYWORDS_FILE").map(PathBuf::from),
            enabled_adapters: var("ENABLED_ADAPTERS")
                .map(|raw| parse_list::<String>("ENABLED_ADAPTERS", &raw))
                .transpose()?
                .unwrap_or_default(),
            inter_adapter_delay_secs: parse_or(
                "INTER_ADAPTER_DELAY_SECS",
                var("INTER_ADAPTER_DELAY_SECS"),
                defaults.inter_adapter_delay_secs,
            )?,
            request_timeout_secs: parse_or(
                "REQUEST_TIMEOUT_SECS",
                var("REQUEST_TIMEOUT_SECS"),
                defaults.request_timeout_secs,
            )?,
            urgent_deadline_days: parse_or(
                "URGENT_DEADLINE_DAYS",
                var("URGENT_DEADLINE_DAYS"),
                defaults.urgent_deadline_days,
            )?,
            daily_run_hours,
            schedule_stagger_minutes: parse_or(
                "SCHEDULE_STAGGER_MINUTES",
                var("SCHEDULE_STAGGER_MINUTES"),
                defaults.schedule_stagger_minutes,
            )?,
        })
    }

    /// Whether an adapter is enabled. An empty list enables every adapter.
    pub fn adapter_enabled(&self, adapter_id: &str) -> bool {
        self.enabled_adapters.is_empty()
            || self
                .enabled_adapters
                .iter()
                .any(|a| a.eq_ignore_ascii_case(adapter_id))
    }

    /// Log config values with secrets redacted.
    pub fn log_redacted(&self) {
        fn preview(val: &Option<String>) -> String {
            match val {
                Some(v) if !v.is_empty() => {
                    let n = v.chars().take(4).map(char::len_utf8).sum::<usize>();
                    format!("{}...({} chars)", &v[..n], v.len())
                }
                _ => "<not set>".to_string(),
            }
        }

        tracing::info!("Config loaded:");
        tracing::info!("  G2B_API_KEY: {}", preview(&self.g2b_api_key));
        tracing::info!("  SAMGOV_API_KEY: {}", preview(&self.samgov_api_key));
        tracing::info!("  DATA_DIR: {}", self.data_dir.display());
        tracing::info!(
            "  KEYWORDS_FILE: {}",
            self.keywords_file
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "<built-in>".to_string())
        );
        tracing::info!("  DAILY_RUN_HOURS: {:?}", self.daily_run_hours);
    }
}

fn parse_or<T: FromStr>(key: &str, raw: Option<String>, default: T) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match raw {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{key} has invalid value: {raw}")),
        None => Ok(default),
    }
}

fn parse_list<T: FromStr>(key: &str, raw: &str) -> Result<Vec<T>>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse()
                .with_context(|| format!("{key} has invalid entry: {s}"))
        })
        .collect()
}
