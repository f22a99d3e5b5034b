use config::{Config, ConfigError, Environment};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    #[serde(default = "default_database_max_connections")]
    pub database_max_connections: u32,
    pub jwt_secret: String,
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    #[serde(default = "default_nats_url")]
    pub nats_url: String,
    #[serde(default = "default_dispatch_batch_limit")]
    pub dispatch_batch_limit: i64,
    #[serde(default)]
    pub telemetry_enabled: bool,
    #[serde(default = "default_telemetry_service_name")]
    pub telemetry_service_name: String,
    #[serde(default = "default_telemetry_service_version")]
    pub telemetry_service_version: String,
    #[serde(default = "default_telemetry_environment")]
    pub telemetry_environment: String,
    #[serde(default = "default_telemetry_otlp_endpoint")]
    pub telemetry_otlp_endpoint: String,
}

fn default_database_max_connections() -> u32 {
    5
}

fn default_listen_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_nats_url() -> String {
    "nats://localhost:4222".to_string()
}

fn default_dispatch_batch_limit() -> i64 {
    100
}

fn default_telemetry_service_name() -> String {
    "notifications".to_string()
}

fn default_telemetry_service_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

fn default_telemetry_environment() -> String {
    "production".to_string()
}

fn default_telemetry_otlp_endpoint() -> String {
    "http://otel-collector.observability.svc.cluster.local:4317".to_string()
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(Environment::default().try_parsing(true))
            .build()?
            .try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_applied() {
        let config: AppConfig = Config::builder()
            .set_override("database_url", "postgres://localhost/notifications")
            .unwrap()
            .set_override("jwt_secret", "secret")
            .unwrap()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.database_max_connections, 5);
        assert_eq!(config.listen_addr, "0.0.0.0:8080");
        assert_eq!(config.nats_url, "nats://localhost:4222");
        assert_eq!(config.dispatch_batch_limit, 100);
        assert!(!config.telemetry_enabled);
        assert_eq!(config.telemetry_service_name, "notifications");
    }

    #[test]
    fn test_missing_required_fields() {
        let result = Config::builder()
            .set_override("jwt_secret", "secret")
            .unwrap()
            .build()
            .unwrap()
            .try_deserialize::<AppConfig>();

        assert!(result.is_err());
    }

    #[test]
    fn test_overrides() {
        let config: AppConfig = Config::builder()
            .set_override("database_url", "postgres://db/notifications")
            .unwrap()
            .set_override("jwt_secret", "secret")
            .unwrap()
            .set_override("dispatch_batch_limit", 25)
            .unwrap()
            .set_override("telemetry_enabled", true)
            .unwrap()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.dispatch_batch_limit, 25);
        assert!(config.telemetry_enabled);
    }
}
