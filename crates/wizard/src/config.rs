use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use dcut_core::error::CoreError;

use crate::schedule::PollTiming;

/// Client configuration loaded from environment variables.
///
/// All fields have defaults matching a conversion service running locally.
/// CLI flags override individual fields after loading.
#[derive(Debug, Clone)]
pub struct WizardConfig {
    /// Base URL of the conversion service, without a trailing slash.
    pub api_url: String,
    /// Status poll timing.
    pub poll: PollTiming,
    /// Per-request HTTP timeout in seconds (default: `300`).
    pub request_timeout_secs: u64,
    /// Directory results are saved into (default: `.`).
    pub download_dir: PathBuf,
}

impl WizardConfig {
    /// Load configuration from the process environment.
    ///
    /// | Env Var                      | Default      |
    /// |------------------------------|--------------|
    /// | `DCUT_API_HOST`              | `127.0.0.1`  |
    /// | `DCUT_API_PORT`              | `6007`       |
    /// | `DCUT_API_URL`               | --           |
    /// | `DCUT_POLL_INITIAL_DELAY_MS` | `500`        |
    /// | `DCUT_POLL_INTERVAL_MS`      | `1000`       |
    /// | `DCUT_REQUEST_TIMEOUT_SECS`  | `300`        |
    /// | `DCUT_DOWNLOAD_DIR`          | `.`          |
    ///
    /// `DCUT_API_URL`, when set, takes precedence over host and port.
    pub fn from_env() -> Result<Self, CoreError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, CoreError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_url = match lookup("DCUT_API_URL").filter(|v| !v.trim().is_empty()) {
            Some(url) => url.trim().trim_end_matches('/').to_string(),
            None => {
                let host = lookup("DCUT_API_HOST").unwrap_or_else(|| "127.0.0.1".into());
                let port: u16 = parse_var(&lookup, "DCUT_API_PORT", 6007)?;
                format!("http://{host}:{port}")
            }
        };

        let initial_delay_ms: u64 = parse_var(&lookup, "DCUT_POLL_INITIAL_DELAY_MS", 500)?;
        let interval_ms: u64 = parse_var(&lookup, "DCUT_POLL_INTERVAL_MS", 1000)?;
        if interval_ms == 0 {
            return Err(CoreError::Config(
                "DCUT_POLL_INTERVAL_MS must be greater than zero".into(),
            ));
        }

        let request_timeout_secs: u64 = parse_var(&lookup, "DCUT_REQUEST_TIMEOUT_SECS", 300)?;

        let download_dir = lookup("DCUT_DOWNLOAD_DIR")
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));

        Ok(Self {
            api_url,
            poll: PollTiming {
                initial_delay: Duration::from_millis(initial_delay_ms),
                interval: Duration::from_millis(interval_ms),
            },
            request_timeout_secs,
            download_dir,
        })
    }

    /// Build the HTTP client used for every service call.
    pub fn http_client(&self) -> Result<reqwest::Client, reqwest::Error> {
        reqwest::Client::builder()
            .timeout(Duration::from_secs(self.request_timeout_secs))
            .build()
    }
}

fn parse_var<T, F>(lookup: &F, name: &str, default: T) -> Result<T, CoreError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| CoreError::Config(format!("{name} must be a valid number, got {raw:?}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<WizardConfig, CoreError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        WizardConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_point_at_local_service() {
        let config = load(&[]).unwrap();
        assert_eq!(config.api_url, "http://127.0.0.1:6007");
        assert_eq!(config.poll, PollTiming::default());
        assert_eq!(config.request_timeout_secs, 300);
        assert_eq!(config.download_dir, PathBuf::from("."));
    }

    #[test]
    fn host_and_port_build_the_url() {
        let config = load(&[("DCUT_API_HOST", "10.0.0.5"), ("DCUT_API_PORT", "8080")]).unwrap();
        assert_eq!(config.api_url, "http://10.0.0.5:8080");
    }

    #[test]
    fn explicit_url_wins() {
        let config = load(&[
            ("DCUT_API_URL", "https://convert.example.com/"),
            ("DCUT_API_PORT", "not-used"),
        ])
        .unwrap();
        assert_eq!(config.api_url, "https://convert.example.com");
    }

    #[test]
    fn poll_timing_is_configurable() {
        let config = load(&[
            ("DCUT_POLL_INITIAL_DELAY_MS", "0"),
            ("DCUT_POLL_INTERVAL_MS", "250"),
        ])
        .unwrap();
        assert_eq!(config.poll.initial_delay, Duration::ZERO);
        assert_eq!(config.poll.interval, Duration::from_millis(250));
    }

    #[test]
    fn invalid_numbers_are_config_errors() {
        let err = load(&[("DCUT_API_PORT", "70000")]).unwrap_err();
        assert_matches!(err, CoreError::Config(msg) if msg.contains("DCUT_API_PORT"));

        let err = load(&[("DCUT_REQUEST_TIMEOUT_SECS", "soon")]).unwrap_err();
        assert_matches!(err, CoreError::Config(_));
    }

    #[test]
    fn zero_interval_is_rejected() {
        let err = load(&[("DCUT_POLL_INTERVAL_MS", "0")]).unwrap_err();
        assert_matches!(err, CoreError::Config(_));
    }
}
