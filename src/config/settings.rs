use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;

/// Flat environment variable names accepted alongside the `SECTION__KEY` form.
const ENV_ALIASES: &[(&str, &str)] = &[
    ("STARS_URI", "registry.uri"),
    ("STARS_API_KEY", "registry.api_key"),
    ("STARS_ORG_UNIT_ID", "registry.org_unit_id"),
    ("SENDGRID_API_KEY", "email.api_key"),
    ("SENDGRID_FROM_EMAIL", "email.from_email"),
    ("SENDGRID_FROM_NAME", "email.from_name"),
    ("EXPIRY_WARNING_DAYS", "notify.expiry_warning_days"),
    ("API_KEY_HEADER_NAME", "notify.api_key_header"),
    ("DATABASE_URL", "database.url"),
];

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerConfig,
    pub registry: RegistryConfig,
    pub email: EmailConfig,
    #[serde(default)]
    pub notify: NotifyConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub otel: OtelConfig,
    #[serde(default)]
    pub auth: AuthConfig,
}

/// API users provisioned from configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthConfig {
    /// `name:sha256hex` entries, loaded into the user store at startup.
    /// `AUTH__API_KEYS` takes a comma-separated list.
    #[serde(default)]
    pub api_keys: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

/// STARS registry connection settings.
#[derive(Debug, Clone, Deserialize)]
pub struct RegistryConfig {
    /// Base URI, e.g. `https://stars.example/api`
    pub uri: String,
    /// Value sent verbatim in the `Authorization` header
    pub api_key: String,
    /// Organisational unit used when a request does not name one
    pub org_unit_id: String,
    #[serde(default = "default_http_timeout")]
    pub timeout_seconds: u64,
}

/// Email provider (SendGrid v3) settings.
#[derive(Debug, Clone, Deserialize)]
pub struct EmailConfig {
    pub api_key: String,
    pub from_email: String,
    #[serde(default = "default_from_name")]
    pub from_name: String,
    #[serde(default = "default_email_api_url")]
    pub api_url: String,
    /// SendGrid suppression group offered on the preferences page
    #[serde(default)]
    pub unsubscribe_group_id: Option<u32>,
    #[serde(default = "default_http_timeout")]
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NotifyConfig {
    /// Days before expiry at which warnings start
    #[serde(default = "default_warning_days")]
    pub expiry_warning_days: u32,
    /// Header carrying the caller's API key
    #[serde(default = "default_api_key_header")]
    pub api_key_header: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Storage backend: "memory" or "postgres"
    #[serde(default = "default_backend")]
    pub backend: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_seconds: u32,
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_seconds: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OtelConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_otel_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_service_name")]
    pub service_name: String,
    #[serde(default = "default_sampling_ratio")]
    pub sampling_ratio: f64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_http_timeout() -> u64 {
    30
}

fn default_from_name() -> String {
    "STARS Expiry".to_string()
}

fn default_email_api_url() -> String {
    "https://api.sendgrid.com/v3/mail/send".to_string()
}

fn default_warning_days() -> u32 {
    30
}

fn default_api_key_header() -> String {
    "X-API-Key".to_string()
}

fn default_backend() -> String {
    "memory".to_string()
}

fn default_pool_size() -> u32 {
    5
}

fn default_connect_timeout() -> u32 {
    5
}

fn default_idle_timeout() -> u32 {
    300 // 5 minutes
}

fn default_otel_endpoint() -> String {
    "http://localhost:4317".to_string()
}

fn default_service_name() -> String {
    env!("CARGO_PKG_NAME").to_string()
}

fn default_sampling_ratio() -> f64 {
    1.0
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        // Load .env file if exists
        let _ = dotenvy::dotenv();

        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let mut builder = Config::builder()
            .set_default("server.host", default_host())?
            .set_default("server.port", i64::from(default_port()))?
            .set_default("notify.expiry_warning_days", i64::from(default_warning_days()))?
            .set_default("database.backend", default_backend())?
            // Load config file if exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // REGISTRY__URI, EMAIL__FROM_EMAIL, DATABASE__BACKEND, ...
            .add_source(
                Environment::default()
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("auth.api_keys"),
            );

        for (var, key) in ENV_ALIASES {
            builder = builder.set_override_option(*key, env::var(var).ok())?;
        }

        builder.build()?.try_deserialize()
    }

    /// Load only the `database` section, for tools that never touch the
    /// registry or email provider.
    pub fn database_only() -> Result<DatabaseConfig, ConfigError> {
        let _ = dotenvy::dotenv();

        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let config = Config::builder()
            .set_default("database.backend", default_backend())?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            .add_source(Environment::default().separator("__").try_parsing(true))
            .set_override_option("database.url", env::var("DATABASE_URL").ok())?
            .build()?;

        config.get("database")
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            expiry_warning_days: default_warning_days(),
            api_key_header: default_api_key_header(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            url: None,
            pool_size: default_pool_size(),
            connect_timeout_seconds: default_connect_timeout(),
            idle_timeout_seconds: default_idle_timeout(),
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

    #[test]
    fn test_default_values() {
        let server = ServerConfig::default();
        assert_eq!(server.host, "0.0.0.0");
        assert_eq!(server.port, 8080);

        let notify = NotifyConfig::default();
        assert_eq!(notify.expiry_warning_days, 30);
        assert_eq!(notify.api_key_header, "X-API-Key");

        let database = DatabaseConfig::default();
        assert_eq!(database.backend, "memory");
        assert!(database.url.is_none());
    }

    #[test]
    fn test_deserialize_minimal_settings() {
        let settings: Settings = Config::builder()
            .set_override("registry.uri", "https://stars.test/api")
            .unwrap()
            .set_override("registry.api_key", "registry-key")
            .unwrap()
            .set_override("registry.org_unit_id", "206749")
            .unwrap()
            .set_override("email.api_key", "sg-key")
            .unwrap()
            .set_override("email.from_email", "noreply@example.com")
            .unwrap()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(settings.registry.org_unit_id, "206749");
        assert_eq!(settings.registry.timeout_seconds, 30);
        assert_eq!(settings.email.from_name, "STARS Expiry");
        assert!(settings.email.unsubscribe_group_id.is_none());
        assert_eq!(settings.notify.expiry_warning_days, 30);
        assert_eq!(settings.server_addr(), "0.0.0.0:8080");
        assert!(!settings.otel.enabled);
    }

    #[test]
    fn test_auth_api_keys_list() {
        let settings: Settings = Config::builder()
            .set_override("registry.uri", "https://stars.test/api")
            .unwrap()
            .set_override("registry.api_key", "registry-key")
            .unwrap()
            .set_override("registry.org_unit_id", "206749")
            .unwrap()
            .set_override("email.api_key", "sg-key")
            .unwrap()
            .set_override("email.from_email", "noreply@example.com")
            .unwrap()
            .set_override("auth.api_keys", vec!["scheduler:abc", "ops:def"])
            .unwrap()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(settings.auth.api_keys, vec!["scheduler:abc", "ops:def"]);
    }

    #[test]
    fn test_missing_registry_section_fails() {
        let result: Result<Settings, _> = Config::builder()
            .set_override("email.api_key", "sg-key")
            .unwrap()
            .set_override("email.from_email", "noreply@example.com")
            .unwrap()
            .build()
            .unwrap()
            .try_deserialize();

        assert!(result.is_err());
    }
}
