//! Configuration for the settle service.

use std::{fmt, net::SocketAddr, str::FromStr, time::Duration};

use anyhow::{Context, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use settle_asaas::{ClientConfig, DEFAULT_BASE_URL};
use settle_store::{FirestoreConfig, DEFAULT_COLLECTION};

use crate::server::{RouterConfig, DEFAULT_WEBHOOK_ROUTE};

const CONFIG_FILE: &str = "settle.toml";

/// Service configuration with defaults, file, and environment overrides.
///
/// Configuration is loaded in priority order:
/// 1. Environment variables (highest priority)
/// 2. Configuration file (`settle.toml`)
/// 3. Built-in defaults (lowest priority)
///
/// Secrets are not part of this struct; see [`Secrets`].
///
/// # Example
///
/// ```no_run
/// use settle_api::Config;
///
/// let config = Config::load().expect("Failed to load configuration");
///
/// println!("Server will bind to {}:{}", config.host, config.port);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // Server
    /// Server bind address.
    ///
    /// Environment variable: `HOST`
    #[serde(default = "default_host", alias = "HOST")]
    pub host: String,
    /// Server bind port.
    ///
    /// Environment variable: `PORT`
    #[serde(default = "default_port", alias = "PORT")]
    pub port: u16,
    /// HTTP request timeout in seconds.
    ///
    /// Environment variable: `REQUEST_TIMEOUT`
    #[serde(default = "default_request_timeout", alias = "REQUEST_TIMEOUT")]
    pub request_timeout: u64,
    /// Path of the webhook route.
    ///
    /// Environment variable: `WEBHOOK_ROUTE`
    #[serde(default = "default_webhook_route", alias = "WEBHOOK_ROUTE")]
    pub webhook_route: String,

    // Asaas
    /// Asaas API base URL, including the version segment.
    ///
    /// Environment variable: `ASAAS_BASE_URL`
    #[serde(default = "default_asaas_base_url", alias = "ASAAS_BASE_URL")]
    pub asaas_base_url: String,
    /// Timeout for the payment lookup in seconds; `0` disables it.
    ///
    /// Environment variable: `ASAAS_TIMEOUT_SECONDS`
    #[serde(default = "default_asaas_timeout", alias = "ASAAS_TIMEOUT_SECONDS")]
    pub asaas_timeout_seconds: u64,

    // Firestore
    /// Firestore REST base URL override.
    ///
    /// Environment variable: `FIRESTORE_BASE_URL`
    #[serde(default, alias = "FIRESTORE_BASE_URL")]
    pub firestore_base_url: Option<String>,
    /// Collection holding billing records.
    ///
    /// Environment variable: `BILLING_COLLECTION`
    #[serde(default = "default_billing_collection", alias = "BILLING_COLLECTION")]
    pub billing_collection: String,

    // Logging
    /// Log filter used when `RUST_LOG` is not set in the environment.
    ///
    /// Environment variable: `RUST_LOG`
    #[serde(default = "default_log_level", alias = "RUST_LOG")]
    pub rust_log: String,
}

impl Config {
    /// Load configuration from defaults, config file, and environment
    /// variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if a source cannot be parsed or a value fails
    /// validation.
    pub fn load() -> Result<Self> {
        Self::from_figment(Self::figment())
    }

    /// Layered configuration sources.
    pub fn figment() -> Figment {
        Figment::new()
            .merge(Serialized::defaults(Self::default()))
            .merge(Toml::file(CONFIG_FILE))
            .merge(Env::prefixed(""))
    }

    /// Extracts and validates configuration from a figment.
    ///
    /// # Errors
    ///
    /// Returns an error if extraction or validation fails.
    pub fn from_figment(figment: Figment) -> Result<Self> {
        let config: Self = figment.extract().context("Failed to load configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Parse server socket address from host and port configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if host and port do not form a socket address.
    pub fn parse_server_addr(&self) -> Result<SocketAddr> {
        let addr_str = format!("{}:{}", self.host, self.port);
        SocketAddr::from_str(&addr_str).context("Invalid server address")
    }

    /// Routing options for the HTTP server.
    pub fn to_router_config(&self) -> RouterConfig {
        RouterConfig {
            webhook_route: self.webhook_route.clone(),
            request_timeout: Duration::from_secs(self.request_timeout),
        }
    }

    /// Asaas client configuration using the given API key.
    pub fn to_client_config(&self, api_key: &str) -> ClientConfig {
        ClientConfig {
            base_url: self.asaas_base_url.clone(),
            api_key: api_key.to_string(),
            timeout: (self.asaas_timeout_seconds > 0)
                .then(|| Duration::from_secs(self.asaas_timeout_seconds)),
            ..ClientConfig::default()
        }
    }

    /// Firestore store configuration.
    pub fn to_firestore_config(&self) -> FirestoreConfig {
        FirestoreConfig {
            base_url: self.firestore_base_url.clone(),
            collection: self.billing_collection.clone(),
            ..FirestoreConfig::default()
        }
    }

    /// Validate configuration values.
    fn validate(&self) -> Result<()> {
        if self.port == 0 {
            anyhow::bail!("port must be greater than 0");
        }

        if self.request_timeout == 0 {
            anyhow::bail!("request_timeout must be greater than 0");
        }

        if !self.webhook_route.starts_with('/') {
            anyhow::bail!("webhook_route must start with '/'");
        }

        if self.billing_collection.trim().is_empty() {
            anyhow::bail!("billing_collection must not be empty");
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout: default_request_timeout(),
            webhook_route: default_webhook_route(),
            asaas_base_url: default_asaas_base_url(),
            asaas_timeout_seconds: default_asaas_timeout(),
            firestore_base_url: None,
            billing_collection: default_billing_collection(),
            rust_log: default_log_level(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_request_timeout() -> u64 {
    30
}

fn default_webhook_route() -> String {
    DEFAULT_WEBHOOK_ROUTE.to_string()
}

fn default_asaas_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_asaas_timeout() -> u64 {
    15
}

fn default_billing_collection() -> String {
    DEFAULT_COLLECTION.to_string()
}

fn default_log_level() -> String {
    "info,settle=debug,tower_http=debug".to_string()
}

/// Secrets read from the environment.
///
/// Kept out of [`Config`] so they never end up in a config file or a
/// serialized dump.
#[derive(Clone)]
pub struct Secrets {
    /// Asaas API key.
    pub asaas_api_key: String,
    /// Shared webhook token.
    pub webhook_token: String,
}

impl fmt::Debug for Secrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Secrets")
            .field("asaas_api_key", &"***")
            .field("webhook_token", &"***")
            .finish()
    }
}

impl Secrets {
    /// Reads `ASAAS_API_KEY` and `WEBHOOK_TOKEN` from the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first variable that is unset or empty.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads secrets through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first variable that is unset or empty.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &str| {
            lookup(name)
                .filter(|v| !v.is_empty())
                .with_context(|| format!("{name} must be set"))
        };

        Ok(Self { asaas_api_key: required("ASAAS_API_KEY")?, webhook_token: required("WEBHOOK_TOKEN")? })
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::HashMap, env, sync::Mutex};

    use super::*;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    struct TestEnvGuard {
        _lock: std::sync::MutexGuard<'static, ()>,
        vars: Vec<String>,
        originals: HashMap<String, Option<String>>,
    }

    impl TestEnvGuard {
        fn new() -> Self {
            let lock = ENV_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            Self { _lock: lock, vars: Vec::new(), originals: HashMap::new() }
        }

        fn set_var(&mut self, key: &str, value: &str) {
            if !self.vars.contains(&key.to_string()) {
                self.originals.insert(key.to_string(), env::var(key).ok());
                self.vars.push(key.to_string());
            }
            env::set_var(key, value);
        }
    }

    impl Drop for TestEnvGuard {
        fn drop(&mut self) {
            for var in &self.vars {
                match self.originals.get(var) {
                    Some(Some(value)) => env::set_var(var, value),
                    Some(None) => env::remove_var(var),
                    None => {},
                }
            }
        }
    }

    #[test]
    fn default_config_snapshot() {
        let config = Config::default();

        assert!(config.validate().is_ok());

        insta::assert_json_snapshot!(config, @r#"
        {
          "host": "0.0.0.0",
          "port": 8080,
          "request_timeout": 30,
          "webhook_route": "/api/asaas-webhook",
          "asaas_base_url": "https://api.asaas.com/v3",
          "asaas_timeout_seconds": 15,
          "firestore_base_url": null,
          "billing_collection": "faturamento",
          "rust_log": "info,settle=debug,tower_http=debug"
        }
        "#);
    }

    #[test]
    fn env_overrides_defaults() {
        let mut guard = TestEnvGuard::new();
        guard.set_var("HOST", "127.0.0.1");
        guard.set_var("PORT", "9090");
        guard.set_var("WEBHOOK_ROUTE", "/hooks/asaas");
        guard.set_var("ASAAS_BASE_URL", "https://sandbox.asaas.com/api/v3");
        guard.set_var("ASAAS_TIMEOUT_SECONDS", "5");
        guard.set_var("BILLING_COLLECTION", "invoices");

        let config = Config::load().expect("Config should load with env overrides");

        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 9090);
        assert_eq!(config.webhook_route, "/hooks/asaas");
        assert_eq!(config.asaas_base_url, "https://sandbox.asaas.com/api/v3");
        assert_eq!(config.asaas_timeout_seconds, 5);
        assert_eq!(config.billing_collection, "invoices");
    }

    #[test]
    fn toml_values_are_layered_under_env() {
        let mut guard = TestEnvGuard::new();
        guard.set_var("PORT", "7000");

        let figment = Config::figment().merge(Toml::string(
            r#"
            port = 6000
            billing_collection = "faturas"
            "#,
        ));
        let figment = figment.merge(Env::prefixed(""));
        let config = Config::from_figment(figment).expect("Config should load");

        assert_eq!(config.port, 7000);
        assert_eq!(config.billing_collection, "faturas");
    }

    #[test]
    fn derived_configs() {
        let mut config = Config::default();
        config.asaas_timeout_seconds = 0;
        config.firestore_base_url = Some("http://localhost:8080/v1".to_string());

        let client = config.to_client_config("key");
        assert_eq!(client.api_key, "key");
        assert_eq!(client.base_url, DEFAULT_BASE_URL);
        assert!(client.timeout.is_none());

        let firestore = config.to_firestore_config();
        assert_eq!(firestore.collection, "faturamento");
        assert_eq!(firestore.base_url.as_deref(), Some("http://localhost:8080/v1"));

        let router = config.to_router_config();
        assert_eq!(router.webhook_route, "/api/asaas-webhook");
        assert_eq!(router.request_timeout, Duration::from_secs(30));
    }

    #[test]
    fn invalid_config_validation_fails() {
        let mut config = Config::default();
        config.port = 0;
        assert!(config.validate().is_err());

        config = Config::default();
        config.request_timeout = 0;
        assert!(config.validate().is_err());

        config = Config::default();
        config.webhook_route = "api/asaas-webhook".to_string();
        assert!(config.validate().is_err());

        config = Config::default();
        config.billing_collection = " ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn socket_address_parsing() {
        let mut config = Config::default();
        config.host = "127.0.0.1".to_string();
        config.port = 9000;

        let addr = config.parse_server_addr().expect("Should parse socket address");

        assert_eq!(addr.ip().to_string(), "127.0.0.1");
        assert_eq!(addr.port(), 9000);
    }

    #[test]
    fn secrets_are_required() {
        let error = Secrets::from_lookup(|name| (name == "ASAAS_API_KEY").then(|| "k".to_string()))
            .unwrap_err();
        assert!(error.to_string().contains("WEBHOOK_TOKEN"));

        let error = Secrets::from_lookup(|_| Some(String::new())).unwrap_err();
        assert!(error.to_string().contains("ASAAS_API_KEY"));
    }

    #[test]
    fn secrets_debug_is_redacted() {
        let secrets = Secrets::from_lookup(|name| Some(format!("{name}-value"))).unwrap();

        assert_eq!(secrets.webhook_token, "WEBHOOK_TOKEN-value");
        let debug = format!("{secrets:?}");
        assert!(!debug.contains("-value"));
    }
}
