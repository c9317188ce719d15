use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use orderdesk_core::config::{AppConfig, LoadOptions};
use secrecy::ExposeSecret;
use toml::Value;

struct ConfigSources {
    file_path: Option<PathBuf>,
    file_doc: Option<Value>,
}

impl ConfigSources {
    fn detect() -> Self {
        let file_path = detect_config_path();
        let file_doc = load_config_file_doc(file_path.as_deref());
        Self { file_path, file_doc }
    }

    fn source_of(&self, key_path: &str, env_keys: &[&str]) -> String {
        if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
            return format!("env ({env_key})");
        }

        if let Some(doc) = &self.file_doc {
            if contains_path(doc, key_path) {
                let file_path = self
                    .file_path
                    .as_deref()
                    .map(|path| path.display().to_string())
                    .unwrap_or_else(|| "config file".to_string());
                return format!("file ({file_path})");
            }
        }

        "default".to_string()
    }
}

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };
    render(&config, &ConfigSources::detect())
}

fn render(config: &AppConfig, sources: &ConfigSources) -> String {
    let optional = |value: Option<String>| value.unwrap_or_else(|| "<unset>".to_string());
    let api_key = config.relay.api_key.as_ref().map(|key| redact_secret(key.expose_secret()));

    let entries: Vec<(&str, String, &[&str])> = vec![
        ("database.url", config.database.url.clone(), &["ORDERDESK_DATABASE_URL"]),
        (
            "database.max_connections",
            config.database.max_connections.to_string(),
            &["ORDERDESK_DATABASE_MAX_CONNECTIONS"],
        ),
        (
            "database.timeout_secs",
            config.database.timeout_secs.to_string(),
            &["ORDERDESK_DATABASE_TIMEOUT_SECS"],
        ),
        (
            "server.bind_address",
            config.server.bind_address.clone(),
            &["ORDERDESK_SERVER_BIND_ADDRESS"],
        ),
        ("server.port", config.server.port.to_string(), &["ORDERDESK_SERVER_PORT"]),
        (
            "server.graceful_shutdown_secs",
            config.server.graceful_shutdown_secs.to_string(),
            &["ORDERDESK_SERVER_GRACEFUL_SHUTDOWN_SECS"],
        ),
        (
            "catalog.path",
            optional(config.catalog.path.as_ref().map(|path| path.display().to_string())),
            &["ORDERDESK_CATALOG_PATH"],
        ),
        (
            "pricing.minimum_order_amount",
            config.pricing.minimum_order_amount.to_string(),
            &["ORDERDESK_PRICING_MINIMUM_ORDER_AMOUNT"],
        ),
        ("relay.enabled", config.relay.enabled.to_string(), &["ORDERDESK_RELAY_ENABLED"]),
        ("relay.endpoint", optional(config.relay.endpoint.clone()), &["ORDERDESK_RELAY_ENDPOINT"]),
        ("relay.api_key", optional(api_key), &["ORDERDESK_RELAY_API_KEY"]),
        ("relay.dealer", config.relay.dealer.clone(), &["ORDERDESK_RELAY_DEALER"]),
        (
            "relay.token_ttl_secs",
            config.relay.token_ttl_secs.to_string(),
            &["ORDERDESK_RELAY_TOKEN_TTL_SECS"],
        ),
        (
            "relay.timeout_secs",
            config.relay.timeout_secs.to_string(),
            &["ORDERDESK_RELAY_TIMEOUT_SECS"],
        ),
        (
            "logging.level",
            config.logging.level.clone(),
            &["ORDERDESK_LOGGING_LEVEL", "ORDERDESK_LOG_LEVEL"],
        ),
        (
            "logging.format",
            format!("{:?}", config.logging.format),
            &["ORDERDESK_LOGGING_FORMAT", "ORDERDESK_LOG_FORMAT"],
        ),
    ];

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    lines.extend(
        entries
            .into_iter()
            .map(|(key, value, env_keys)| render_line(key, &value, sources.source_of(key, env_keys))),
    );
    lines.join("\n")
}

fn detect_config_path() -> Option<PathBuf> {
    let root = PathBuf::from("orderdesk.toml");
    if root.exists() {
        return Some(root);
    }

    let nested = PathBuf::from("config/orderdesk.toml");
    if nested.exists() {
        return Some(nested);
    }

    None
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

/// Keeps the first four characters of long keys so operators can tell keys apart.
fn redact_secret(secret: &str) -> String {
    let trimmed = secret.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    if trimmed.chars().count() > 12 {
        let prefix: String = trimmed.chars().take(4).collect();
        return format!("{prefix}***");
    }

    "<redacted>".to_string()
}
