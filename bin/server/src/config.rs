//! Centralized server configuration.
//!
//! Loaded via the `config` crate from environment variables, with `__`
//! separating nested sections (`AUTH__TOKEN_SECRET`, `SESSION__SECURE_COOKIES`).

use querydeck_platform_access::{AdminAllowList, OAuthProviders};
use serde::Deserialize;

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// PostgreSQL database connection URL.
    pub database_url: String,

    /// Address the HTTP listener binds to.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// Deployment environment. Controls error detail in responses.
    #[serde(default)]
    pub environment: Environment,

    pub auth: AuthConfig,

    #[serde(default)]
    pub session: SessionConfig,
}

/// Deployment environment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    #[default]
    Production,
}

impl Environment {
    /// Whether internal error messages and debug detail may reach clients.
    pub fn exposes_errors(self) -> bool {
        self == Self::Development
    }
}

/// Authentication configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Secret for API tokens presented as bearer credentials.
    pub token_secret: String,

    /// Secret for the signed `platform_session` cookie.
    pub platform_secret: String,

    /// Comma-separated admin emails.
    #[serde(default)]
    pub admin_emails: String,

    /// API token lifetime in hours.
    #[serde(default = "default_token_ttl_hours")]
    pub token_ttl_hours: i64,

    /// Comma-separated OAuth providers accepted at sign-in.
    #[serde(default = "default_oauth_providers")]
    pub oauth_providers: String,

    /// Shared key the sign-in gateway sends with OAuth callbacks.
    /// The callback route is not mounted when unset.
    #[serde(default)]
    pub gateway_key: Option<String>,
}

impl AuthConfig {
    pub fn admins(&self) -> AdminAllowList {
        AdminAllowList::parse(&self.admin_emails)
    }

    pub fn providers(&self) -> OAuthProviders {
        OAuthProviders::parse(&self.oauth_providers)
    }

    pub fn token_ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(self.token_ttl_hours)
    }
}

/// Session-related configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Session duration in minutes. Applies to both session cookies.
    #[serde(default = "default_session_duration_minutes")]
    pub duration_minutes: i64,

    /// Interval between expired-session sweeps, in seconds.
    #[serde(default = "default_cleanup_interval_seconds")]
    pub cleanup_interval_seconds: u64,

    /// Whether to set the Secure flag on cookies (requires HTTPS).
    /// Set to false for local HTTP development.
    #[serde(default = "default_secure_cookies")]
    pub secure_cookies: bool,
}

impl SessionConfig {
    pub fn duration(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.duration_minutes)
    }
}

fn default_bind_address() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_token_ttl_hours() -> i64 {
    24 * 30
}

fn default_oauth_providers() -> String {
    "google,github".to_string()
}

fn default_session_duration_minutes() -> i64 {
    60 * 24 * 7
}

fn default_cleanup_interval_seconds() -> u64 {
    300
}

fn default_secure_cookies() -> bool {
    true
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            duration_minutes: default_session_duration_minutes(),
            cleanup_interval_seconds: default_cleanup_interval_seconds(),
            secure_cookies: default_secure_cookies(),
        }
    }
}

impl ServerConfig {
    /// Loads configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if required configuration is missing or invalid.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(
                config::Environment::default()
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<ServerConfig, config::ConfigError> {
        let source = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        config::Config::builder()
            .add_source(
                config::Environment::default()
                    .separator("__")
                    .try_parsing(true)
                    .source(Some(source)),
            )
            .build()?
            .try_deserialize()
    }

    const REQUIRED: [(&str, &str); 3] = [
        ("DATABASE_URL", "postgres://localhost/querydeck"),
        ("AUTH__TOKEN_SECRET", "api-secret"),
        ("AUTH__PLATFORM_SECRET", "platform-secret"),
    ];

    #[test]
    fn session_config_has_correct_defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.duration_minutes, 10080);
        assert_eq!(config.cleanup_interval_seconds, 300);
        assert!(config.secure_cookies);
    }

    #[test]
    fn required_values_with_defaults() {
        let config = load(&REQUIRED).expect("config");

        assert_eq!(config.bind_address, "0.0.0.0:3000");
        assert_eq!(config.environment, Environment::Production);
        assert_eq!(config.auth.token_ttl_hours, 720);
        assert!(config.auth.gateway_key.is_none());
        assert!(config.auth.admins().is_empty());
        assert!(config.auth.providers().contains("google"));
        assert!(config.auth.providers().contains("github"));
    }

    #[test]
    fn nested_sections_from_separator() {
        let mut vars = REQUIRED.to_vec();
        vars.extend([
            ("ENVIRONMENT", "development"),
            ("AUTH__ADMIN_EMAILS", "root@example.com, ops@example.com"),
            ("AUTH__GATEWAY_KEY", "gw"),
            ("SESSION__SECURE_COOKIES", "false"),
            ("SESSION__DURATION_MINUTES", "15"),
        ]);

        let config = load(&vars).expect("config");

        assert!(config.environment.exposes_errors());
        assert_eq!(config.auth.admins().len(), 2);
        assert_eq!(config.auth.gateway_key.as_deref(), Some("gw"));
        assert!(!config.session.secure_cookies);
        assert_eq!(config.session.duration(), chrono::Duration::minutes(15));
    }

    #[test]
    fn missing_secret_is_an_error() {
        assert!(load(&[("DATABASE_URL", "postgres://localhost/querydeck")]).is_err());
    }
}
