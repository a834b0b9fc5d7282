use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub dispatch: DispatchConfig,
    #[serde(default)]
    pub otel: OtelConfig,
}

/// How transport failures (no HTTP status at all) are classified
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportFailurePolicy {
    /// Connect errors and timeouts may be retried on the next save
    #[default]
    Retryable,
    /// Every transport failure is final
    Fatal,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    /// Push endpoint of the provider
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Total request timeout in seconds
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    /// TCP/TLS connect timeout in seconds
    #[serde(default = "default_connect_timeout_seconds")]
    pub connect_timeout_seconds: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default)]
    pub transport_failure: TransportFailurePolicy,
}

impl ProviderConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_seconds)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DispatchConfig {
    /// Preference prefix of this channel (e.g. "Pushbullet.CommentReply")
    #[serde(default = "default_channel")]
    pub channel: String,
    /// Permission a user needs to see the channel's preference column
    #[serde(default = "default_permission")]
    pub permission: String,
    /// Upper bound on deliveries in flight for one batch
    #[serde(default = "default_max_concurrent_deliveries")]
    pub max_concurrent_deliveries: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OtelConfig {
    #[serde(default)]
    pub enabled: bool,
    /// OTLP gRPC endpoint
    #[serde(default = "default_otel_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_service_name")]
    pub service_name: String,
    /// Trace sampling ratio (0.0-1.0)
    #[serde(default = "default_sampling_ratio")]
    pub sampling_ratio: f64,
}

fn default_endpoint() -> String {
    "https://api.pushbullet.com/v2/pushes".to_string()
}

fn default_timeout_seconds() -> u64 {
    10
}

fn default_connect_timeout_seconds() -> u64 {
    5
}

fn default_user_agent() -> String {
    format!("forum-push-notifier/{}", env!("CARGO_PKG_VERSION"))
}

fn default_channel() -> String {
    "Pushbullet".to_string()
}

fn default_permission() -> String {
    "Plugins.PushbulletNotification.Allow".to_string()
}

fn default_max_concurrent_deliveries() -> usize {
    8
}

fn default_otel_endpoint() -> String {
    "http://localhost:4317".to_string()
}

fn default_service_name() -> String {
    "forum-push-notifier".to_string()
}

fn default_sampling_ratio() -> f64 {
    1.0
}

impl Settings {
    /// Load settings from `config/default`, `config/{RUN_MODE}` and `PUSH__*` env vars.
    pub fn new() -> Result<Self, ConfigError> {
        // Load .env file if exists
        let _ = dotenvy::dotenv();

        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let builder = Config::builder()
            // Load config file if exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // PUSH__PROVIDER__TIMEOUT_SECONDS, PUSH__DISPATCH__CHANNEL, ...
            .add_source(
                Environment::with_prefix("PUSH")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            );

        Self::from_config(builder.build()?)
    }

    /// Deserialize from an already assembled configuration
    pub fn from_config(config: Config) -> Result<Self, ConfigError> {
        let mut settings: Settings = config.try_deserialize()?;
        let provider = &mut settings.provider;
        provider.timeout_seconds = provider.timeout_seconds.max(1);
        provider.connect_timeout_seconds = provider.connect_timeout_seconds.max(1);
        settings.dispatch.max_concurrent_deliveries = settings.dispatch.max_concurrent_deliveries.max(1);
        Ok(settings)
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            timeout_seconds: default_timeout_seconds(),
            connect_timeout_seconds: default_connect_timeout_seconds(),
            user_agent: default_user_agent(),
            transport_failure: TransportFailurePolicy::default(),
        }
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            channel: default_channel(),
            permission: default_permission(),
            max_concurrent_deliveries: default_max_concurrent_deliveries(),
        }
    }
}

impl Default for OtelConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: default_otel_endpoint(),
            service_name: default_service_name(),
            sampling_ratio: default_sampling_ratio(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::FileFormat;

    #[test]
    fn test_default_values() {
        let settings = Settings::default();
        assert_eq!(settings.provider.endpoint, "https://api.pushbullet.com/v2/pushes");
        assert_eq!(settings.provider.timeout(), Duration::from_secs(10));
        assert_eq!(settings.provider.transport_failure, TransportFailurePolicy::Retryable);
        assert_eq!(settings.dispatch.channel, "Pushbullet");
        assert_eq!(settings.dispatch.max_concurrent_deliveries, 8);
        assert!(!settings.otel.enabled);
    }

    #[test]
    fn test_from_toml_source() {
        let config = Config::builder()
            .add_source(File::from_str(
                r#"
                [provider]
                endpoint = "http://localhost:9000/v2/pushes"
                timeout_seconds = 3
                transport_failure = "fatal"

                [dispatch]
                channel = "Push"
                max_concurrent_deliveries = 0
                "#,
                FileFormat::Toml,
            ))
            .build()
            .unwrap();

        let settings = Settings::from_config(config).unwrap();
        assert_eq!(settings.provider.endpoint, "http://localhost:9000/v2/pushes");
        assert_eq!(settings.provider.timeout_seconds, 3);
        assert_eq!(settings.provider.connect_timeout_seconds, 5);
        assert_eq!(settings.provider.transport_failure, TransportFailurePolicy::Fatal);
        assert_eq!(settings.dispatch.channel, "Push");
        assert_eq!(settings.dispatch.permission, "Plugins.PushbulletNotification.Allow");
        assert_eq!(settings.dispatch.max_concurrent_deliveries, 1);
    }

    #[test]
    fn test_zero_timeouts_are_clamped() {
        let config = Config::builder()
            .add_source(File::from_str(
                r#"
                [provider]
                timeout_seconds = 0
                connect_timeout_seconds = 0
                "#,
                FileFormat::Toml,
            ))
            .build()
            .unwrap();

        let settings = Settings::from_config(config).unwrap();
        assert_eq!(settings.provider.timeout(), Duration::from_secs(1));
        assert_eq!(settings.provider.connect_timeout(), Duration::from_secs(1));
    }
}
