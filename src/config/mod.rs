use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub database: DatabaseConfig,
    pub api: ApiConfig,
    pub security: SecurityConfig,
    pub notify: NotifyConfig,
    pub mail: MailConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub max_connections: u32,
    pub connection_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub default_page_limit: i64,
    pub max_page_limit: i64,
    pub max_request_size_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub jwt_secret: String,
    pub access_token_expiry_mins: i64,
    pub refresh_token_expiry_days: i64,
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyConfig {
    /// SSE keep-alive interval; must stay below intermediary idle timeouts.
    pub keepalive_secs: u64,
    pub channel_capacity: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailConfig {
    pub from_address: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub local_dir: String,
    pub public_base_url: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Environment picks the defaults, specific env vars override them
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        if let Ok(v) = env::var("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = v.parse().unwrap_or(self.database.max_connections);
        }
        if let Ok(v) = env::var("DATABASE_CONNECTION_TIMEOUT") {
            self.database.connection_timeout_secs =
                v.parse().unwrap_or(self.database.connection_timeout_secs);
        }

        if let Ok(v) = env::var("API_DEFAULT_PAGE_LIMIT") {
            self.api.default_page_limit = v.parse().unwrap_or(self.api.default_page_limit);
        }
        if let Ok(v) = env::var("API_MAX_PAGE_LIMIT") {
            self.api.max_page_limit = v.parse().unwrap_or(self.api.max_page_limit);
        }
        if let Ok(v) = env::var("API_MAX_REQUEST_SIZE_BYTES") {
            self.api.max_request_size_bytes = v.parse().unwrap_or(self.api.max_request_size_bytes);
        }

        if let Ok(v) = env::var("JWT_SECRET") {
            self.security.jwt_secret = v;
        }
        if let Ok(v) = env::var("ACCESS_TOKEN_EXPIRY_MINS") {
            self.security.access_token_expiry_mins =
                v.parse().unwrap_or(self.security.access_token_expiry_mins);
        }
        if let Ok(v) = env::var("REFRESH_TOKEN_EXPIRY_DAYS") {
            self.security.refresh_token_expiry_days =
                v.parse().unwrap_or(self.security.refresh_token_expiry_days);
        }
        if let Ok(v) = env::var("CORS_ORIGINS") {
            self.security.cors_origins = v.split(',').map(|s| s.trim().to_string()).collect();
        }

        if let Ok(v) = env::var("NOTIFY_KEEPALIVE_SECS") {
            self.notify.keepalive_secs = v.parse().unwrap_or(self.notify.keepalive_secs);
        }
        if let Ok(v) = env::var("NOTIFY_CHANNEL_CAPACITY") {
            self.notify.channel_capacity = v.parse().unwrap_or(self.notify.channel_capacity);
        }

        if let Ok(v) = env::var("MAIL_FROM_ADDRESS") {
            self.mail.from_address = v;
        }

        if let Ok(v) = env::var("STORAGE_LOCAL_DIR") {
            self.storage.local_dir = v;
        }
        if let Ok(v) = env::var("STORAGE_PUBLIC_BASE_URL") {
            self.storage.public_base_url = v;
        }

        self
    }

    fn development() -> Self {
        Self {
            environment: Environment::Development,
            database: DatabaseConfig {
                max_connections: 10,
                connection_timeout_secs: 30,
            },
            api: ApiConfig {
                default_page_limit: 20,
                max_page_limit: 100,
                max_request_size_bytes: 10 * 1024 * 1024, // 10MB
            },
            security: SecurityConfig {
                jwt_secret: "dev-only-secret".to_string(),
                access_token_expiry_mins: 60 * 24,
                refresh_token_expiry_days: 14,
                cors_origins: vec![
                    "http://localhost:3000".to_string(),
                    "http://localhost:5173".to_string(),
                ],
            },
            notify: NotifyConfig {
                keepalive_secs: 30,
                channel_capacity: 32,
            },
            mail: MailConfig {
                from_address: "noreply@snackhub.local".to_string(),
            },
            storage: StorageConfig {
                local_dir: "./uploads".to_string(),
                public_base_url: "http://localhost:3000/files".to_string(),
            },
        }
    }

    fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            database: DatabaseConfig {
                max_connections: 20,
                connection_timeout_secs: 10,
            },
            api: ApiConfig {
                default_page_limit: 20,
                max_page_limit: 100,
                max_request_size_bytes: 5 * 1024 * 1024,
            },
            security: SecurityConfig {
                jwt_secret: String::new(), // must come from JWT_SECRET
                access_token_expiry_mins: 60,
                refresh_token_expiry_days: 7,
                cors_origins: vec!["https://staging.snackhub.example.com".to_string()],
            },
            notify: NotifyConfig {
                keepalive_secs: 25,
                channel_capacity: 32,
            },
            mail: MailConfig {
                from_address: "noreply@snackhub.example.com".to_string(),
            },
            storage: StorageConfig {
                local_dir: "/var/lib/snackhub/uploads".to_string(),
                public_base_url: "https://staging.snackhub.example.com/files".to_string(),
            },
        }
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            database: DatabaseConfig {
                max_connections: 50,
                connection_timeout_secs: 5,
            },
            api: ApiConfig {
                default_page_limit: 20,
                max_page_limit: 50,
                max_request_size_bytes: 2 * 1024 * 1024,
            },
            security: SecurityConfig {
                jwt_secret: String::new(), // must come from JWT_SECRET
                access_token_expiry_mins: 30,
                refresh_token_expiry_days: 7,
                cors_origins: vec!["https://app.snackhub.example.com".to_string()],
            },
            notify: NotifyConfig {
                keepalive_secs: 25,
                channel_capacity: 64,
            },
            mail: MailConfig {
                from_address: "noreply@snackhub.example.com".to_string(),
            },
            storage: StorageConfig {
                local_dir: "/var/lib/snackhub/uploads".to_string(),
                public_base_url: "https://app.snackhub.example.com/files".to_string(),
            },
        }
    }
}

// Global singleton config - initialized once at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

// Convenience function for accessing config
pub fn config() -> &'static AppConfig {
    &CONFIG
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn development_defaults() {
        let config = AppConfig::development();
        assert_eq!(config.api.default_page_limit, 20);
        assert!(!config.security.jwt_secret.is_empty());
        assert_eq!(config.notify.keepalive_secs, 30);
    }

    #[test]
    fn production_requires_external_secret() {
        let config = AppConfig::production();
        assert!(config.security.jwt_secret.is_empty());
        assert_eq!(config.api.max_page_limit, 50);
    }
}
