mod settings;

pub use settings::{
    AuthConfig, DatabaseConfig, EmailConfig, NotifyConfig, OtelConfig, RegistryConfig, ServerConfig, Settings,
};
