use reqwest::Url;
use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

const DEFAULT_BACKEND_URL: &str = "http://127.0.0.1:5000/api/";

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the screening client.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub backend: BackendConfig,
    pub sessions: SessionConfig,
    pub telemetry: TelemetryConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let base_url = env::var("POSYANDU_API_BASE_URL")
            .unwrap_or_else(|_| DEFAULT_BACKEND_URL.to_string());
        let token = env::var("POSYANDU_API_TOKEN")
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty());

        let idle_minutes = positive_var("APP_SESSION_IDLE_MINUTES", 30)?;
        let capacity = positive_var("APP_SESSION_CAPACITY", 1_000)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            backend: BackendConfig::new(&base_url, token)?,
            sessions: SessionConfig {
                idle_timeout: Duration::from_secs(idle_minutes.saturating_mul(60)),
                capacity: usize::try_from(capacity).unwrap_or(usize::MAX),
            },
            telemetry: TelemetryConfig {
                log_level,
                ansi: environment == AppEnvironment::Development,
            },
        })
    }
}

fn positive_var(name: &'static str, default: u64) -> Result<u64, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<u64>()
            .ok()
            .filter(|value| *value > 0)
            .ok_or(ConfigError::InvalidSessionLimit { name, value: raw }),
        Err(_) => Ok(default),
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Location of the Posyandu REST backend and the credential attached to every call.
#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub base_url: Url,
    pub token: Option<String>,
}

impl BackendConfig {
    /// Parses the base URL, forcing a trailing slash so relative endpoints join under it.
    pub fn new(base_url: &str, token: Option<String>) -> Result<Self, ConfigError> {
        let trimmed = base_url.trim();
        let normalized = if trimmed.ends_with('/') {
            trimmed.to_string()
        } else {
            format!("{trimmed}/")
        };

        let base_url = Url::parse(&normalized).map_err(|err| ConfigError::InvalidBackendUrl {
            value: trimmed.to_string(),
            reason: err.to_string(),
        })?;

        Ok(Self { base_url, token })
    }
}

/// How long served wizard sessions live and how many are kept at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    pub idle_timeout: Duration,
    pub capacity: usize,
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
    pub ansi: bool,
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidBackendUrl { value: String, reason: String },
    InvalidSessionLimit { name: &'static str, value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidBackendUrl { value, reason } => {
                write!(f, "POSYANDU_API_BASE_URL '{value}' is not a valid URL ({reason})")
            }
            ConfigError::InvalidSessionLimit { name, value } => {
                write!(f, "{name} must be a positive whole number, got '{value}'")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidPort
            | ConfigError::InvalidBackendUrl { .. }
            | ConfigError::InvalidSessionLimit { .. } => None,
            ConfigError::InvalidHost { source } => Some(source),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::{Mutex, OnceLock};

    fn env_guard() -> &'static Mutex<()> {
        static GUARD: OnceLock<Mutex<()>> = OnceLock::new();
        GUARD.get_or_init(|| Mutex::new(()))
    }

    fn reset_env() {
        env::remove_var("APP_ENV");
        env::remove_var("APP_HOST");
        env::remove_var("APP_PORT");
        env::remove_var("APP_LOG_LEVEL");
        env::remove_var("POSYANDU_API_BASE_URL");
        env::remove_var("POSYANDU_API_TOKEN");
        env::remove_var("APP_SESSION_IDLE_MINUTES");
        env::remove_var("APP_SESSION_CAPACITY");
    }

    #[test]
    fn load_uses_defaults_when_env_missing() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        let config = AppConfig::load().expect("config loads with defaults");
        assert_eq!(config.environment, AppEnvironment::Development);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.telemetry.log_level, "info");
        assert_eq!(config.backend.base_url.as_str(), DEFAULT_BACKEND_URL);
        assert!(config.backend.token.is_none());
        assert_eq!(config.sessions.idle_timeout, Duration::from_secs(30 * 60));
        assert_eq!(config.sessions.capacity, 1_000);
    }

    #[test]
    fn session_limits_come_from_env() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_SESSION_IDLE_MINUTES", "5");
        env::set_var("APP_SESSION_CAPACITY", " 40 ");
        let config = AppConfig::load().expect("config loads");
        assert_eq!(config.sessions.idle_timeout, Duration::from_secs(300));
        assert_eq!(config.sessions.capacity, 40);

        env::set_var("APP_SESSION_CAPACITY", "0");
        let err = AppConfig::load().expect_err("zero capacity is rejected");
        assert!(matches!(
            err,
            ConfigError::InvalidSessionLimit { name: "APP_SESSION_CAPACITY", .. }
        ));
        reset_env();
    }

    #[test]
    fn accepts_localhost_host() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_HOST", "localhost");
        let config = AppConfig::load().expect("config loads");
        let addr = config.server.socket_addr().expect("localhost resolves");
        assert_eq!(addr, SocketAddr::new(IpAddr::from([127, 0, 0, 1]), 3000));
    }

    #[test]
    fn backend_url_gains_trailing_slash_and_blank_token_is_ignored() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("POSYANDU_API_BASE_URL", "https://posyandu.example.org/api");
        env::set_var("POSYANDU_API_TOKEN", "   ");
        let config = AppConfig::load().expect("config loads");
        assert_eq!(
            config.backend.base_url.as_str(),
            "https://posyandu.example.org/api/"
        );
        assert!(config.backend.token.is_none());
    }

    #[test]
    fn rejects_unparseable_backend_url() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("POSYANDU_API_BASE_URL", "not a url");
        let err = AppConfig::load().expect_err("invalid url is rejected");
        assert!(matches!(err, ConfigError::InvalidBackendUrl { .. }));
        reset_env();
    }
}
