//! Application configuration loaded from environment variables.

use std::str::FromStr;
use std::time::Duration;

use notify::{DispatcherConfig, SmtpConfig};
use payments::{PaystackConfig, StripeConfig};

/// Output format of the tracing subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`, `PORT`: bind address (default `0.0.0.0:3000`)
/// - `RUST_LOG`: tracing filter directive (default `info`)
/// - `LOG_FORMAT`: `json` for JSON lines, anything else for pretty output
/// - `DATABASE_URL`: PostgreSQL connection string; unset runs in memory
/// - `DATABASE_MAX_CONNECTIONS` (default 10), `LOCK_TIMEOUT_MS` (default 5000)
/// - `APP_URL`: public site URL, used for links and the Paystack callback
/// - `PAYMENT_TIMEOUT_SECS` (default 10)
/// - `PAYSTACK_SECRET_KEY`, `PAYSTACK_BASE_URL`
/// - `STRIPE_SECRET_KEY`, `STRIPE_BASE_URL`, `STRIPE_CURRENCY`
/// - `SMTP_HOST`, `SMTP_PORT`, `SMTP_SECURE`, `SMTP_USER`, `SMTP_PASS`, `SMTP_FROM`
/// - `NOTIFY_QUEUE_CAPACITY` (default 256), `NOTIFY_MAX_ATTEMPTS` (default 3)
///
/// A processor is enabled only when its secret key is set. Without
/// `SMTP_HOST`, emails are logged instead of sent.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub lock_timeout: Duration,
    pub app_url: String,
    pub paystack: Option<PaystackConfig>,
    pub stripe: Option<StripeConfig>,
    pub smtp: Option<SmtpConfig>,
    pub notify_queue_capacity: usize,
    pub notify_max_attempts: u32,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key/value source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let defaults = Self::default();
        let app_url = var("APP_URL")
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or(defaults.app_url);
        let payment_timeout = parse(var("PAYMENT_TIMEOUT_SECS"))
            .map(Duration::from_secs)
            .unwrap_or(payments::DEFAULT_TIMEOUT);

        let paystack = var("PAYSTACK_SECRET_KEY").map(|key| {
            let mut config = PaystackConfig::new(key, format!("{app_url}/checkout/verify"));
            if let Some(base_url) = var("PAYSTACK_BASE_URL") {
                config.base_url = base_url;
            }
            config.timeout = payment_timeout;
            config
        });

        let stripe = var("STRIPE_SECRET_KEY").map(|key| {
            let mut config = StripeConfig::new(key);
            if let Some(base_url) = var("STRIPE_BASE_URL") {
                config.base_url = base_url;
            }
            if let Some(currency) = var("STRIPE_CURRENCY") {
                config.currency = currency.to_lowercase();
            }
            config.timeout = payment_timeout;
            config
        });

        let smtp = var("SMTP_HOST").map(|host| {
            let mut config = SmtpConfig::new(host);
            if let Some(port) = parse(var("SMTP_PORT")) {
                config.port = port;
            }
            config.secure = var("SMTP_SECURE").is_some_and(|v| v == "true");
            config.username = var("SMTP_USER");
            config.password = var("SMTP_PASS");
            if let Some(from) = var("SMTP_FROM") {
                config.from_address = from;
            }
            config
        });

        Self {
            host: var("HOST").unwrap_or(defaults.host),
            port: parse(var("PORT")).unwrap_or(defaults.port),
            log_level: var("RUST_LOG").unwrap_or(defaults.log_level),
            log_format: match var("LOG_FORMAT").as_deref() {
                Some("json") => LogFormat::Json,
                _ => LogFormat::Pretty,
            },
            database_url: var("DATABASE_URL"),
            database_max_connections: parse(var("DATABASE_MAX_CONNECTIONS"))
                .unwrap_or(defaults.database_max_connections),
            lock_timeout: parse(var("LOCK_TIMEOUT_MS"))
                .map(Duration::from_millis)
                .unwrap_or(defaults.lock_timeout),
            app_url,
            paystack,
            stripe,
            smtp,
            notify_queue_capacity: parse(var("NOTIFY_QUEUE_CAPACITY"))
                .unwrap_or(defaults.notify_queue_capacity),
            notify_max_attempts: parse(var("NOTIFY_MAX_ATTEMPTS"))
                .unwrap_or(defaults.notify_max_attempts),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn dispatcher(&self) -> DispatcherConfig {
        let mut config = DispatcherConfig {
            queue_capacity: self.notify_queue_capacity,
            max_attempts: self.notify_max_attempts,
            ..Default::default()
        };
        config.branding.app_url = self.app_url.clone();
        config
    }
}

fn parse<T: FromStr>(value: Option<String>) -> Option<T> {
    value.and_then(|v| v.trim().parse().ok())
}

impl Default for Config {
    fn default() -> Self {
        let dispatcher = DispatcherConfig::default();
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            database_url: None,
            database_max_connections: 10,
            lock_timeout: store::DEFAULT_LOCK_TIMEOUT,
            app_url: "http://localhost:3000".to_string(),
            paystack: None,
            stripe: None,
            smtp: None,
            notify_queue_capacity: dispatcher.queue_capacity,
            notify_max_attempts: dispatcher.max_attempts,
        }
    }
}
