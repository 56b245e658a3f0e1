use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use convoy_reconcile::{
    DEFAULT_CALL_TIMEOUT, DEFAULT_DESCRIBE_CONCURRENCY, DEFAULT_RECONCILE_INTERVAL, DEFAULT_STAGE_TIMEOUT,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub log_level: String,
    pub reconcile_interval: Duration,
    pub call_timeout: Duration,
    pub stage_timeout: Duration,
    pub describe_concurrency: usize,
    pub fixture_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            reconcile_interval: DEFAULT_RECONCILE_INTERVAL,
            call_timeout: DEFAULT_CALL_TIMEOUT,
            stage_timeout: DEFAULT_STAGE_TIMEOUT,
            describe_concurrency: DEFAULT_DESCRIBE_CONCURRENCY,
            fixture_path: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();

        let log_level = lookup("CONVOY_LOG_LEVEL").unwrap_or(defaults.log_level);

        let reconcile_interval = seconds(
            &lookup,
            "CONVOY_RECONCILE_INTERVAL_SECS",
            defaults.reconcile_interval,
        )?;
        let call_timeout = seconds(&lookup, "CONVOY_CALL_TIMEOUT_SECS", defaults.call_timeout)?;
        let stage_timeout = seconds(&lookup, "CONVOY_STAGE_TIMEOUT_SECS", defaults.stage_timeout)?;

        let describe_concurrency = match lookup("CONVOY_DESCRIBE_CONCURRENCY") {
            Some(v) => v
                .parse::<usize>()
                .with_context(|| format!("CONVOY_DESCRIBE_CONCURRENCY: invalid value '{v}'"))?,
            None => defaults.describe_concurrency,
        };
        if describe_concurrency == 0 {
            bail!("CONVOY_DESCRIBE_CONCURRENCY must be at least 1");
        }

        let fixture_path = lookup("CONVOY_FIXTURE_PATH").map(PathBuf::from);

        Ok(Self {
            log_level,
            reconcile_interval,
            call_timeout,
            stage_timeout,
            describe_concurrency,
            fixture_path,
        })
    }
}

fn seconds(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: Duration) -> Result<Duration> {
    let Some(value) = lookup(key) else {
        return Ok(default);
    };
    let secs: u64 = value
        .parse()
        .with_context(|| format!("{key}: invalid value '{value}'"))?;
    if secs == 0 {
        bail!("{key} must be at least 1 second");
    }
    Ok(Duration::from_secs(secs))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        assert_eq!(config(&[]).unwrap(), Config::default());
        assert_eq!(Config::default().reconcile_interval, Duration::from_secs(60));
    }

    #[test]
    fn test_overrides() {
        let config = config(&[
            ("CONVOY_LOG_LEVEL", "debug"),
            ("CONVOY_RECONCILE_INTERVAL_SECS", "5"),
            ("CONVOY_CALL_TIMEOUT_SECS", "2"),
            ("CONVOY_STAGE_TIMEOUT_SECS", "20"),
            ("CONVOY_DESCRIBE_CONCURRENCY", "3"),
            ("CONVOY_FIXTURE_PATH", "/tmp/fixture.json"),
        ])
        .unwrap();

        assert_eq!(config.log_level, "debug");
        assert_eq!(config.reconcile_interval, Duration::from_secs(5));
        assert_eq!(config.call_timeout, Duration::from_secs(2));
        assert_eq!(config.stage_timeout, Duration::from_secs(20));
        assert_eq!(config.describe_concurrency, 3);
        assert_eq!(config.fixture_path, Some(PathBuf::from("/tmp/fixture.json")));
    }

    #[test]
    fn test_invalid_numbers_are_errors() {
        let err = config(&[("CONVOY_CALL_TIMEOUT_SECS", "soon")]).unwrap_err();
        assert!(err.to_string().contains("CONVOY_CALL_TIMEOUT_SECS"));

        assert!(config(&[("CONVOY_RECONCILE_INTERVAL_SECS", "0")]).is_err());
        assert!(config(&[("CONVOY_DESCRIBE_CONCURRENCY", "0")]).is_err());
        assert!(config(&[("CONVOY_DESCRIBE_CONCURRENCY", "-1")]).is_err());
    }
}
