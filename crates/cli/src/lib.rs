pub mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

use commands::price::PriceOptions;

#[derive(Debug, Parser)]
#[command(
    name = "orderdesk",
    about = "Orderdesk operator CLI",
    long_about = "Operate Orderdesk storage, catalog imports, offline pricing, config inspection, and readiness checks.",
    after_help = "Examples:\n  orderdesk seed --catalog catalog.json\n  orderdesk price --catalog catalog.json --selection cart.json --strict\n  orderdesk doctor --json"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Replace the stored product catalog with a catalog JSON file")]
    Seed {
        #[arg(long, help = "Path to the catalog JSON file")]
        catalog: PathBuf,
    },
    #[command(about = "Price a selection offline and print the priced order as JSON")]
    Price {
        #[arg(long, help = "Path to the catalog JSON file")]
        catalog: PathBuf,
        #[arg(long, help = "Path to a selection JSON file keyed by product code")]
        selection: PathBuf,
        #[arg(long, help = "Customer code to validate as if submitting")]
        customer: Option<String>,
        #[arg(long, help = "Delivery zone to validate as if submitting")]
        zone: Option<String>,
        #[arg(long, help = "Exit non-zero when the order could not be submitted")]
        strict: bool,
    },
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, database connectivity, catalog source, and relay readiness")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Seed { catalog } => commands::seed::run(&catalog),
        Command::Price { catalog, selection, customer, zone, strict } => commands::price::run(
            &catalog,
            &selection,
            PriceOptions { customer: customer.as_deref(), zone: zone.as_deref(), strict },
        ),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => {
            let (exit_code, output) = commands::doctor::run(json);
            commands::CommandResult { exit_code, output }
        }
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::{Cli, Command};

    #[test]
    fn price_arguments_parse() {
        let cli = Cli::try_parse_from([
            "orderdesk",
            "price",
            "--catalog",
            "catalog.json",
            "--selection",
            "cart.json",
            "--zone",
            "MURCIA",
            "--strict",
        ])
        .expect("arguments should parse");

        match cli.command {
            Command::Price { catalog, customer, zone, strict, .. } => {
                assert_eq!(catalog.to_str(), Some("catalog.json"));
                assert_eq!(customer, None);
                assert_eq!(zone.as_deref(), Some("MURCIA"));
                assert!(strict);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn seed_requires_catalog() {
        assert!(Cli::try_parse_from(["orderdesk", "seed"]).is_err());
    }
}
