use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};

use orderdesk_cli::commands::price::PriceOptions;
use orderdesk_cli::commands::{config, doctor, migrate, price, seed};
use serde_json::Value;
use tempfile::TempDir;

const CATALOG: &str = r#"[
  {"code": "GEL-ALOE", "name": "Gel aloe vera 750ml", "category": "GELES 750ML",
   "box_size": 12, "list_price": "1.48"},
  {"code": "GEL-AVENA", "name": "Gel avena 750ml", "category": "GELES 750ML",
   "box_size": 12, "list_price": "1.48"},
  {"code": "CHAMPU-1", "name": "Champu familiar", "box_size": 6, "list_price": "2.10"}
]"#;

#[test]
fn migrate_returns_success_with_valid_env() {
    let workspace = Workspace::new();
    let database_url = workspace.database_url();
    with_env(&[("ORDERDESK_DATABASE_URL", database_url.as_str())], || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 0, "expected successful migrate run");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "migrate");
        assert_eq!(payload["status"], "ok");
    });
}

#[test]
fn migrate_returns_config_failure_for_non_sqlite_url() {
    with_env(&[("ORDERDESK_DATABASE_URL", "postgres://localhost/orders")], || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 2, "expected config validation failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "migrate");
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "config_validation");
    });
}

#[test]
fn seed_imports_catalog_and_is_idempotent() {
    let workspace = Workspace::new();
    let catalog = workspace.write("catalog.json", CATALOG);

    let database_url = workspace.database_url();
    with_env(&[("ORDERDESK_DATABASE_URL", database_url.as_str())], || {
        let first = seed::run(&catalog);
        assert_eq!(first.exit_code, 0, "expected first seed success: {}", first.output);
        let first_payload = parse_payload(&first.output);
        assert_eq!(first_payload["command"], "seed");
        assert_eq!(first_payload["status"], "ok");
        let message = first_payload["message"].as_str().unwrap_or_default();
        assert!(message.starts_with("imported 3 products from"));
        assert!(message.ends_with("catalog now holds 3 products"));

        let second = seed::run(&catalog);
        assert_eq!(second.exit_code, 0, "expected second seed success");
        assert_eq!(first_payload["message"], parse_payload(&second.output)["message"]);
    });
}

#[test]
fn reseed_replaces_products_missing_from_new_price_list() {
    let workspace = Workspace::new();
    let full = workspace.write("catalog.json", CATALOG);
    let trimmed = workspace.write(
        "catalog-trimmed.json",
        r#"[{"code": "GEL-ALOE", "name": "Gel aloe vera 750ml", "category": "GELES 750ML",
             "box_size": 12, "list_price": "1.39"}]"#,
    );

    let database_url = workspace.database_url();
    with_env(&[("ORDERDESK_DATABASE_URL", database_url.as_str())], || {
        assert_eq!(seed::run(&full).exit_code, 0);

        let result = seed::run(&trimmed);
        assert_eq!(result.exit_code, 0, "expected reseed success: {}", result.output);
        let payload = parse_payload(&result.output);
        let message = payload["message"].as_str().unwrap_or_default();
        assert!(message.starts_with("imported 1 products from"));
        assert!(message.ends_with("catalog now holds 1 products"), "unexpected: {message}");
    });
}

#[test]
fn seed_rejects_malformed_catalog() {
    let workspace = Workspace::new();
    let catalog = workspace.write("catalog.json", "{not json");

    let database_url = workspace.database_url();
    with_env(&[("ORDERDESK_DATABASE_URL", database_url.as_str())], || {
        let result = seed::run(&catalog);
        assert_eq!(result.exit_code, 6);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "catalog_input");
    });
}

#[test]
fn price_reports_priced_order() {
    let workspace = Workspace::new();
    let catalog = workspace.write("catalog.json", CATALOG);
    let selection = workspace
        .write("cart.json", r#"{"GEL-ALOE": {"quantity": 12}, "GEL-AVENA": {"quantity": 12}}"#);

    with_env(&[], || {
        let result = price::run(&catalog, &selection, PriceOptions::default());
        assert_eq!(result.exit_code, 0, "expected price success: {}", result.output);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "price");
        assert_eq!(payload["status"], "ok");
        assert_eq!(payload["priced"]["lines"].as_array().map(Vec::len), Some(2));
        assert_eq!(payload["violations"].as_array().map(Vec::len), Some(0));
    });
}

#[test]
fn strict_price_blocks_incomplete_boxes() {
    let workspace = Workspace::new();
    let catalog = workspace.write("catalog.json", CATALOG);
    let selection = workspace.write("cart.json", r#"{"GEL-ALOE": {"quantity": 10}}"#);

    with_env(&[], || {
        let lenient = price::run(&catalog, &selection, PriceOptions::default());
        assert_eq!(lenient.exit_code, 0);

        let strict = price::run(
            &catalog,
            &selection,
            PriceOptions { strict: true, ..PriceOptions::default() },
        );
        assert_eq!(strict.exit_code, 1);

        let payload = parse_payload(&strict.output);
        assert_eq!(payload["status"], "blocked");
        assert_eq!(payload["violations"][0]["code"], "INCOMPLETE_BOX");
    });
}

#[test]
fn price_reports_missing_selection_file() {
    let workspace = Workspace::new();
    let catalog = workspace.write("catalog.json", CATALOG);

    with_env(&[], || {
        let result =
            price::run(&catalog, &workspace.path("missing.json"), PriceOptions::default());
        assert_eq!(result.exit_code, 6);
        assert_eq!(parse_payload(&result.output)["error_class"], "selection_input");
    });
}

#[test]
fn config_output_attributes_env_and_redacts_api_key() {
    with_env(
        &[
            ("ORDERDESK_SERVER_PORT", "9090"),
            ("ORDERDESK_RELAY_API_KEY", "EBA091C2D8F9E282CCE1"),
        ],
        || {
            let output = config::run();
            assert!(output.contains("- server.port = 9090 (source: env (ORDERDESK_SERVER_PORT))"));
            assert!(output.contains("- relay.api_key = EBA0***"));
            assert!(!output.contains("EBA091C2D8F9E282CCE1"));
        },
    );
}

#[test]
fn doctor_json_reports_seeded_catalog() {
    let workspace = Workspace::new();
    let catalog = workspace.write("catalog.json", CATALOG);

    let database_url = workspace.database_url();
    with_env(&[("ORDERDESK_DATABASE_URL", database_url.as_str())], || {
        let (exit_code, _) = doctor::run(true);
        assert_eq!(exit_code, 1, "an empty product table fails the catalog check");

        assert_eq!(seed::run(&catalog).exit_code, 0);

        let (exit_code, output) = doctor::run(true);
        assert_eq!(exit_code, 0, "expected passing doctor report: {output}");
        let report = parse_payload(&output);
        assert_eq!(report["overall_status"], "pass");

        let checks = report["checks"].as_array().cloned().unwrap_or_default();
        let catalog_check = checks
            .iter()
            .find(|check| check["name"] == "catalog_source")
            .expect("catalog check present");
        assert_eq!(catalog_check["details"], "product table holds 3 products");
    });
}

struct Workspace {
    dir: TempDir,
}

impl Workspace {
    fn new() -> Self {
        Self { dir: TempDir::new().expect("temp dir") }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.path(name);
        fs::write(&path, contents).expect("write fixture");
        path
    }

    fn database_url(&self) -> String {
        sqlite_url(&self.path("orderdesk.db"))
    }
}

fn sqlite_url(path: &Path) -> String {
    format!("sqlite://{}?mode=rwc", path.display())
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "ORDERDESK_DATABASE_URL",
        "ORDERDESK_DATABASE_MAX_CONNECTIONS",
        "ORDERDESK_DATABASE_TIMEOUT_SECS",
        "ORDERDESK_SERVER_BIND_ADDRESS",
        "ORDERDESK_SERVER_PORT",
        "ORDERDESK_SERVER_GRACEFUL_SHUTDOWN_SECS",
        "ORDERDESK_CATALOG_PATH",
        "ORDERDESK_PRICING_MINIMUM_ORDER_AMOUNT",
        "ORDERDESK_RELAY_ENABLED",
        "ORDERDESK_RELAY_ENDPOINT",
        "ORDERDESK_RELAY_API_KEY",
        "ORDERDESK_RELAY_DEALER",
        "ORDERDESK_RELAY_TOKEN_TTL_SECS",
        "ORDERDESK_RELAY_TIMEOUT_SECS",
        "ORDERDESK_LOGGING_LEVEL",
        "ORDERDESK_LOGGING_FORMAT",
        "ORDERDESK_LOG_LEVEL",
        "ORDERDESK_LOG_FORMAT",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
    }
}
