//! Duel engine configuration loading: timing, limits and question source location.

use std::{env, fs, io::ErrorKind, path::PathBuf, str::FromStr, time::Duration};

use serde::Deserialize;
use serde_with::{DurationSeconds, serde_as};
use tracing::{info, warn};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/duels.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "QUIZ_DUEL_CONFIG_PATH";
const MAX_QUESTIONS_ENV: &str = "DUEL_MAX_QUESTIONS";
const QUESTION_TIMEOUT_ENV: &str = "DUEL_QUESTION_TIMEOUT";
const MAX_WAIT_TIME_ENV: &str = "DUEL_MAX_WAIT_TIME";

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the duel engine.
pub struct DuelConfig {
    /// Rounds per duel.
    pub max_questions: u32,
    /// Answer window of a round.
    pub question_timeout: Duration,
    /// How long a quick-join search keeps looking for a partner.
    pub max_wait_time: Duration,
    /// Delay between two matchmaking scans.
    pub search_poll_interval: Duration,
    /// Pause between the start notice and the first question.
    pub start_delay: Duration,
    /// Pause between a round summary and the next question.
    pub post_round_delay: Duration,
    /// Delay before retrying when the question source is empty.
    pub question_retry_delay: Duration,
    /// Retries before the duel is finished with the current scores.
    pub question_retry_limit: u32,
    /// Period of the stale duel sweep.
    pub cleanup_interval: Duration,
    /// Age after which a duel is considered abandoned.
    pub stale_duel_timeout: Duration,
    /// Lifetime of cached display names.
    pub user_cache_ttl: Duration,
    /// Category used when a duel is created without one.
    pub default_category: String,
    /// JSON file holding the question bank.
    pub questions_path: PathBuf,
}

impl Default for DuelConfig {
    fn default() -> Self {
        Self {
            max_questions: 10,
            question_timeout: Duration::from_secs(20),
            max_wait_time: Duration::from_secs(30),
            search_poll_interval: Duration::from_secs(2),
            start_delay: Duration::from_secs(3),
            post_round_delay: Duration::from_secs(3),
            question_retry_delay: Duration::from_secs(2),
            question_retry_limit: 5,
            cleanup_interval: Duration::from_secs(3600),
            stale_duel_timeout: Duration::from_secs(3600),
            user_cache_ttl: Duration::from_secs(300),
            default_category: "random".into(),
            questions_path: PathBuf::from("config/questions.json"),
        }
    }
}

impl DuelConfig {
    /// Load the configuration from disk, then apply environment overrides.
    ///
    /// Missing or malformed files fall back to the built-in defaults; the reason
    /// is logged.
    pub fn load() -> Self {
        let path = resolve_config_path();
        let mut config = match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    info!(path = %path.display(), "loaded duel config");
                    raw.into()
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        };

        config.apply_env_overrides();
        config
    }

    fn apply_env_overrides(&mut self) {
        if let Some(value) = env_value::<u32>(MAX_QUESTIONS_ENV) {
            self.max_questions = value;
        }
        if let Some(secs) = env_value::<u64>(QUESTION_TIMEOUT_ENV) {
            self.question_timeout = non_zero(
                QUESTION_TIMEOUT_ENV,
                Some(Duration::from_secs(secs)),
                self.question_timeout,
            );
        }
        if let Some(secs) = env_value::<u64>(MAX_WAIT_TIME_ENV) {
            self.max_wait_time = Duration::from_secs(secs);
        }
    }
}

#[serde_as]
#[derive(Debug, Deserialize)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
///
/// Every key is optional; absent keys keep their default.
struct RawConfig {
    max_questions: Option<u32>,
    #[serde_as(as = "Option<DurationSeconds<u64>>")]
    question_timeout: Option<Duration>,
    #[serde_as(as = "Option<DurationSeconds<u64>>")]
    max_wait_time: Option<Duration>,
    #[serde_as(as = "Option<DurationSeconds<u64>>")]
    search_poll_interval: Option<Duration>,
    #[serde_as(as = "Option<DurationSeconds<u64>>")]
    start_delay: Option<Duration>,
    #[serde_as(as = "Option<DurationSeconds<u64>>")]
    post_round_delay: Option<Duration>,
    #[serde_as(as = "Option<DurationSeconds<u64>>")]
    question_retry_delay: Option<Duration>,
    question_retry_limit: Option<u32>,
    #[serde_as(as = "Option<DurationSeconds<u64>>")]
    cleanup_interval: Option<Duration>,
    #[serde_as(as = "Option<DurationSeconds<u64>>")]
    stale_duel_timeout: Option<Duration>,
    #[serde_as(as = "Option<DurationSeconds<u64>>")]
    user_cache_ttl: Option<Duration>,
    default_category: Option<String>,
    questions_path: Option<PathBuf>,
}

impl From<RawConfig> for DuelConfig {
    fn from(raw: RawConfig) -> Self {
        let defaults = DuelConfig::default();
        Self {
            max_questions: raw.max_questions.unwrap_or(defaults.max_questions),
            question_timeout: non_zero(
                "question_timeout",
                raw.question_timeout,
                defaults.question_timeout,
            ),
            max_wait_time: raw.max_wait_time.unwrap_or(defaults.max_wait_time),
            search_poll_interval: non_zero(
                "search_poll_interval",
                raw.search_poll_interval,
                defaults.search_poll_interval,
            ),
            start_delay: raw.start_delay.unwrap_or(defaults.start_delay),
            post_round_delay: raw.post_round_delay.unwrap_or(defaults.post_round_delay),
            question_retry_delay: raw
                .question_retry_delay
                .unwrap_or(defaults.question_retry_delay),
            question_retry_limit: raw
                .question_retry_limit
                .unwrap_or(defaults.question_retry_limit),
            cleanup_interval: non_zero(
                "cleanup_interval",
                raw.cleanup_interval,
                defaults.cleanup_interval,
            ),
            stale_duel_timeout: non_zero(
                "stale_duel_timeout",
                raw.stale_duel_timeout,
                defaults.stale_duel_timeout,
            ),
            user_cache_ttl: raw.user_cache_ttl.unwrap_or(defaults.user_cache_ttl),
            default_category: raw
                .default_category
                .filter(|category| !category.trim().is_empty())
                .unwrap_or(defaults.default_category),
            questions_path: raw.questions_path.unwrap_or(defaults.questions_path),
        }
    }
}

/// Periods and timeouts must be positive; zero keeps `fallback`.
fn non_zero(key: &str, value: Option<Duration>, fallback: Duration) -> Duration {
    match value {
        Some(duration) if duration.is_zero() => {
            warn!(key, fallback_secs = fallback.as_secs(), "zero duration rejected; keeping default");
            fallback
        }
        Some(duration) => duration,
        None => fallback,
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

/// Parse an environment variable, ignoring (and logging) malformed values.
fn env_value<T: FromStr>(key: &str) -> Option<T> {
    let raw = env::var(key).ok()?;
    match raw.trim().parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(key, value = %raw, "ignoring malformed environment override");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_remaining_defaults() {
        let raw: RawConfig =
            serde_json::from_str(r#"{"max_questions": 5, "question_timeout": 12}"#).unwrap();
        let config = DuelConfig::from(raw);
        assert_eq!(config.max_questions, 5);
        assert_eq!(config.question_timeout, Duration::from_secs(12));
        assert_eq!(config.max_wait_time, Duration::from_secs(30));
        assert_eq!(config.default_category, "random");
    }

    #[test]
    fn blank_category_falls_back_to_default() {
        let raw: RawConfig = serde_json::from_str(r#"{"default_category": "  "}"#).unwrap();
        assert_eq!(DuelConfig::from(raw).default_category, "random");
    }

    #[test]
    fn zero_periods_fall_back_to_defaults() {
        let raw: RawConfig = serde_json::from_str(
            r#"{"cleanup_interval": 0, "search_poll_interval": 0, "question_timeout": 0, "stale_duel_timeout": 0, "start_delay": 0}"#,
        )
        .unwrap();
        let config = DuelConfig::from(raw);
        assert_eq!(config.cleanup_interval, Duration::from_secs(3600));
        assert_eq!(config.search_poll_interval, Duration::from_secs(2));
        assert_eq!(config.question_timeout, Duration::from_secs(20));
        assert_eq!(config.stale_duel_timeout, Duration::from_secs(3600));
        assert_eq!(config.start_delay, Duration::ZERO);
    }

    #[test]
    fn empty_file_yields_defaults() {
        let raw: RawConfig = serde_json::from_str("{}").unwrap();
        let config = DuelConfig::from(raw);
        assert_eq!(config.stale_duel_timeout, Duration::from_secs(3600));
        assert_eq!(config.question_retry_limit, 5);
    }
}
