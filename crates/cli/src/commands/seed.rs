use std::fs;
use std::path::Path;

use orderdesk_core::Catalog;
use orderdesk_db::{connect, migrations, ProductRepository, SqlProductRepository};

use crate::commands::{build_runtime, load_config, CommandResult};

/// Replaces the product table with a catalog JSON file, keeping the file's order.
pub fn run(catalog_path: &Path) -> CommandResult {
    let catalog = match read_catalog(catalog_path) {
        Ok(catalog) => catalog,
        Err(message) => return CommandResult::failure("seed", "catalog_input", message, 6),
    };
    let config = match load_config("seed") {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let runtime = match build_runtime("seed") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    let result = runtime.block_on(async {
        let pool = connect(&config.database)
            .await
            .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;

        migrations::run_pending(&pool)
            .await
            .map_err(|error| ("migration", error.to_string(), 5u8))?;

        let products = SqlProductRepository::new(pool.clone());
        products
            .replace_all(catalog.products().to_vec())
            .await
            .map_err(|error| ("seed_execution", error.to_string(), 5u8))?;
        let stored = products
            .list_all()
            .await
            .map_err(|error| ("seed_verification", error.to_string(), 6u8))?
            .len();

        pool.close().await;
        Ok::<usize, (&'static str, String, u8)>(stored)
    });

    match result {
        Ok(stored) => CommandResult::success(
            "seed",
            seed_message(catalog.len(), stored, &catalog_path.display().to_string()),
        ),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("seed", error_class, message, exit_code)
        }
    }
}

pub(crate) fn read_catalog(path: &Path) -> Result<Catalog, String> {
    let raw = fs::read_to_string(path)
        .map_err(|error| format!("failed to read catalog `{}`: {error}", path.display()))?;
    Catalog::from_json_str(&raw)
        .map_err(|error| format!("catalog `{}` is not a valid product list: {error}", path.display()))
}

fn seed_message(imported: usize, stored: usize, source: &str) -> String {
    format!("imported {imported} products from {source}; catalog now holds {stored} products")
}

#[cfg(test)]
mod tests {
    use super::seed_message;

    #[test]
    fn seed_message_reports_import_and_total() {
        assert_eq!(
            seed_message(3, 5, "catalog.json"),
            "imported 3 products from catalog.json; catalog now holds 5 products"
        );
    }
}
