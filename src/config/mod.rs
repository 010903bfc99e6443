use serde::Deserialize;
use std::time::Duration;

use crate::services::retry::RetryPolicy;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("JOB_TIMEOUT_SECS ({job}) must be non-zero and below STALE_JOB_TIMEOUT_SECS ({stale})")]
    JobTimeout { job: u64, stale: u64 },
}

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    /// Server bind address (e.g., "0.0.0.0:3000"). Optional for worker processes.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// PostgreSQL connection string
    pub database_url: String,

    /// R2 bucket holding uploaded creatives
    pub r2_bucket: String,

    /// R2 endpoint URL
    pub r2_endpoint: String,

    /// R2 access key ID (S3-compatible)
    pub r2_access_key: String,

    /// R2 secret access key (S3-compatible)
    pub r2_secret_key: String,

    /// Lifetime of presigned asset URLs handed to analysis services
    #[serde(default = "default_presigned_url_ttl_secs")]
    pub presigned_url_ttl_secs: u32,

    #[serde(default = "default_vision_api_base")]
    pub vision_api_base: String,
    #[serde(default = "default_vision_model")]
    pub vision_model: String,
    pub vision_api_key: String,

    #[serde(default = "default_transcription_api_base")]
    pub transcription_api_base: String,
    pub transcription_api_key: String,

    #[serde(default = "default_vocabulary_api_base")]
    pub vocabulary_api_base: String,
    #[serde(default = "default_vocabulary_model")]
    pub vocabulary_model: String,
    pub vocabulary_api_key: String,

    #[serde(default = "default_retry_max_attempts")]
    pub retry_max_attempts: u32,
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
    #[serde(default = "default_retry_max_delay_ms")]
    pub retry_max_delay_ms: u64,

    /// Assets at or above this size are rejected by the vision adapter
    #[serde(default = "default_inline_media_limit_bytes")]
    pub inline_media_limit_bytes: u64,

    #[serde(default = "default_transcription_poll_interval_secs")]
    pub transcription_poll_interval_secs: u64,
    /// Hard ceiling on the transcription poll loop
    #[serde(default = "default_transcription_timeout_secs")]
    pub transcription_timeout_secs: u64,

    /// Processing jobs older than this are failed before the next claim
    #[serde(default = "default_stale_job_timeout_secs")]
    pub stale_job_timeout_secs: u64,

    /// Ceiling on one job's analysis; must be below the stale timeout
    #[serde(default = "default_job_timeout_secs")]
    pub job_timeout_secs: u64,

    /// Prometheus scrape listener for the worker binary
    #[serde(default = "default_worker_metrics_addr")]
    pub worker_metrics_addr: String,

    /// Worker binary idle sleep
    #[serde(default = "default_worker_poll_interval_ms")]
    pub worker_poll_interval_ms: u64,
}

fn default_bind_addr() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_presigned_url_ttl_secs() -> u32 {
    3600
}

fn default_vision_api_base() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

fn default_vision_model() -> String {
    "gemini-2.5-flash".to_string()
}

fn default_transcription_api_base() -> String {
    "https://api.assemblyai.com/v2".to_string()
}

fn default_vocabulary_api_base() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_vocabulary_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_retry_max_attempts() -> u32 {
    4
}

fn default_retry_base_delay_ms() -> u64 {
    2000
}

fn default_retry_max_delay_ms() -> u64 {
    60_000
}

fn default_inline_media_limit_bytes() -> u64 {
    20 * 1024 * 1024
}

fn default_transcription_poll_interval_secs() -> u64 {
    3
}

fn default_transcription_timeout_secs() -> u64 {
    300
}

fn default_stale_job_timeout_secs() -> u64 {
    900
}

fn default_job_timeout_secs() -> u64 {
    600
}

fn default_worker_metrics_addr() -> String {
    "0.0.0.0:9091".to_string()
}

fn default_worker_poll_interval_ms() -> u64 {
    5000
}

impl AppConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.retry_max_attempts,
            Duration::from_millis(self.retry_base_delay_ms),
            Duration::from_millis(self.retry_max_delay_ms),
        )
    }

    pub fn stale_job_timeout(&self) -> Duration {
        Duration::from_secs(self.stale_job_timeout_secs)
    }

    pub fn job_timeout(&self) -> Duration {
        Duration::from_secs(self.job_timeout_secs)
    }

    /// A running job must hit its own timeout before stale recovery can
    /// fail it underneath.
    pub fn check_timeouts(&self) -> Result<(), ConfigError> {
        if self.job_timeout_secs == 0 || self.job_timeout_secs >= self.stale_job_timeout_secs {
            return Err(ConfigError::JobTimeout {
                job: self.job_timeout_secs,
                stale: self.stale_job_timeout_secs,
            });
        }
        Ok(())
    }

    pub fn worker_poll_interval(&self) -> Duration {
        Duration::from_millis(self.worker_poll_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn required() -> Vec<(String, String)> {
        [
            ("DATABASE_URL", "postgres://localhost/compliance"),
            ("R2_BUCKET", "creatives"),
            ("R2_ENDPOINT", "https://r2.example.com"),
            ("R2_ACCESS_KEY", "ak"),
            ("R2_SECRET_KEY", "sk"),
            ("VISION_API_KEY", "v"),
            ("TRANSCRIPTION_API_KEY", "t"),
            ("VOCABULARY_API_KEY", "w"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
    }

    #[test]
    fn test_defaults_apply() {
        let config: AppConfig = envy::from_iter(required()).unwrap();
        assert_eq!(config.bind_addr, "0.0.0.0:3000");
        assert_eq!(config.retry_max_attempts, 4);
        assert_eq!(config.inline_media_limit_bytes, 20 * 1024 * 1024);
        assert_eq!(config.stale_job_timeout(), Duration::from_secs(900));
        assert_eq!(config.transcription_timeout_secs, 300);
        assert_eq!(config.job_timeout(), Duration::from_secs(600));
        assert_eq!(config.worker_metrics_addr, "0.0.0.0:9091");
        assert!(config.check_timeouts().is_ok());

        let policy = config.retry_policy();
        assert_eq!(policy, RetryPolicy::default());
    }

    #[test]
    fn test_missing_key_is_an_error() {
        let vars = required().into_iter().filter(|(k, _)| k != "VISION_API_KEY");
        assert!(envy::from_iter::<_, AppConfig>(vars).is_err());
    }

    #[test]
    fn test_overrides() {
        let mut vars = required();
        vars.push(("RETRY_MAX_ATTEMPTS".to_string(), "2".to_string()));
        vars.push(("STALE_JOB_TIMEOUT_SECS".to_string(), "60".to_string()));
        let config: AppConfig = envy::from_iter(vars).unwrap();
        assert_eq!(config.retry_policy().max_attempts, 2);
        assert_eq!(config.stale_job_timeout(), Duration::from_secs(60));
    }

    #[test]
    fn test_job_timeout_must_undercut_stale_timeout() {
        let mut vars = required();
        vars.push(("STALE_JOB_TIMEOUT_SECS".to_string(), "300".to_string()));
        let config: AppConfig = envy::from_iter(vars.clone()).unwrap();
        assert!(matches!(
            config.check_timeouts(),
            Err(ConfigError::JobTimeout { job: 600, stale: 300 })
        ));

        vars.push(("JOB_TIMEOUT_SECS".to_string(), "240".to_string()));
        let config: AppConfig = envy::from_iter(vars).unwrap();
        assert!(config.check_timeouts().is_ok());
        assert_eq!(config.job_timeout(), Duration::from_secs(240));
    }
}
