//! Server configuration

use serde::Serialize;

/// Application configuration
#[derive(Debug, Clone, Serialize)]
pub struct AppConfig {
    pub bind_addr: String,
    #[serde(skip)]
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub default_user_id: String,
    pub cors_allow_any: bool,
}

impl AppConfig {
    /// Read configuration from the environment, falling back to defaults
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let non_empty = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        Self {
            bind_addr: non_empty("BIND_ADDR").unwrap_or(defaults.bind_addr),
            database_url: non_empty("DATABASE_URL"),
            database_max_connections: non_empty("DATABASE_MAX_CONNECTIONS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.database_max_connections),
            default_user_id: non_empty("DEFAULT_USER_ID").unwrap_or(defaults.default_user_id),
            cors_allow_any: non_empty("CORS_ALLOW_ANY")
                .map(|v| !matches!(v.to_ascii_lowercase().as_str(), "0" | "false" | "no" | "off"))
                .unwrap_or(defaults.cors_allow_any),
        }
    }

    pub fn uses_database(&self) -> bool {
        self.database_url.is_some()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:3000".to_string(),
            database_url: None,
            database_max_connections: 10,
            default_user_id: "demo-user".to_string(),
            cors_allow_any: true,
        }
    }
}
