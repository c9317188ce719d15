use orderdesk_core::config::{AppConfig, LoadOptions};
use orderdesk_db::{connect, migrations, ProductRepository, SqlProductRepository};
use serde::Serialize;

use crate::commands::seed::read_catalog;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

impl DoctorCheck {
    fn pass(name: &'static str, details: impl Into<String>) -> Self {
        Self { name, status: CheckStatus::Pass, details: details.into() }
    }

    fn fail(name: &'static str, details: impl Into<String>) -> Self {
        Self { name, status: CheckStatus::Fail, details: details.into() }
    }

    fn skipped(name: &'static str, details: impl Into<String>) -> Self {
        Self { name, status: CheckStatus::Skipped, details: details.into() }
    }
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

impl DoctorReport {
    fn exit_code(&self) -> u8 {
        u8::from(self.overall_status == CheckStatus::Fail)
    }
}

/// Runs readiness checks and returns the exit code alongside the rendered report.
pub fn run(json_output: bool) -> (u8, String) {
    let report = build_report(AppConfig::load(LoadOptions::default()).map_err(|e| e.to_string()));
    let exit_code = report.exit_code();

    if json_output {
        let output = serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        });
        return (exit_code, output);
    }

    (exit_code, render_human(&report))
}

fn build_report(config: Result<AppConfig, String>) -> DoctorReport {
    let mut checks = Vec::new();

    match config {
        Ok(config) => {
            checks.push(DoctorCheck::pass(
                "config_validation",
                "configuration loaded and validated",
            ));
            checks.push(check_relay_readiness(&config));
            checks.extend(check_storage(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck::fail("config_validation", error));
            for name in ["relay_readiness", "database_connectivity", "catalog_source"] {
                checks.push(DoctorCheck::skipped(
                    name,
                    "skipped because configuration did not load",
                ));
            }
        }
    }

    let any_fail = checks.iter().any(|check| check.status == CheckStatus::Fail);
    let overall_status = if any_fail { CheckStatus::Fail } else { CheckStatus::Pass };
    let summary = if any_fail {
        "doctor: one or more readiness checks failed".to_string()
    } else {
        "doctor: all readiness checks passed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

/// Validation already guarantees an endpoint and API key when the relay is on.
fn check_relay_readiness(config: &AppConfig) -> DoctorCheck {
    if !config.relay.enabled {
        return DoctorCheck::skipped("relay_readiness", "order forwarding is disabled");
    }

    let endpoint = config.relay.endpoint.as_deref().unwrap_or_default();
    DoctorCheck::pass(
        "relay_readiness",
        format!("forwarding to `{endpoint}` as dealer `{}`", config.relay.dealer),
    )
}

/// Database connectivity, then where the catalog comes from.
fn check_storage(config: &AppConfig) -> [DoctorCheck; 2] {
    if let Some(path) = &config.catalog.path {
        let catalog = match read_catalog(path) {
            Ok(catalog) => DoctorCheck::pass(
                "catalog_source",
                format!("catalog file `{}` holds {} products", path.display(), catalog.len()),
            ),
            Err(error) => DoctorCheck::fail("catalog_source", error),
        };
        return [check_database(config, false).0, catalog];
    }

    let (database, stored) = check_database(config, true);
    let catalog = match stored {
        Some(0) => DoctorCheck::fail(
            "catalog_source",
            "product table is empty; run `orderdesk seed --catalog <file>`",
        ),
        Some(count) => {
            DoctorCheck::pass("catalog_source", format!("product table holds {count} products"))
        }
        None => DoctorCheck::skipped(
            "catalog_source",
            "skipped because the database is unreachable",
        ),
    };
    [database, catalog]
}

fn check_database(config: &AppConfig, count_products: bool) -> (DoctorCheck, Option<usize>) {
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return (
                DoctorCheck::fail(
                    "database_connectivity",
                    format!("failed to initialize async runtime: {error}"),
                ),
                None,
            );
        }
    };

    let result = runtime.block_on(async {
        let pool = connect(&config.database)
            .await
            .map_err(|error| format!("failed to connect to database: {error}"))?;

        let stored = if count_products {
            migrations::run_pending(&pool)
                .await
                .map_err(|error| format!("failed to apply migrations: {error}"))?;
            let products = SqlProductRepository::new(pool.clone())
                .list_all()
                .await
                .map_err(|error| format!("failed to read products: {error}"))?;
            Some(products.len())
        } else {
            None
        };

        pool.close().await;
        Ok::<Option<usize>, String>(stored)
    });

    match result {
        Ok(stored) => (
            DoctorCheck::pass(
                "database_connectivity",
                format!("connected using `{}`", config.database.url),
            ),
            stored,
        ),
        Err(error) => (DoctorCheck::fail("database_connectivity", error), None),
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
