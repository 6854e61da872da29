use dotenvy::dotenv;
use receipt_ledger::{
    config::{database, settings},
    errors::Result,
};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Load .env file (as early as possible)
    dotenv().ok(); // Non-fatal, env vars can be set externally

    // 2. Load the application configuration; it carries the default log filter
    let app_config = settings::load_app_configuration()?;

    // 3. Initialize tracing, RUST_LOG wins over the configured filter
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&app_config.logging.filter)),
        )
        .init();
    match &app_config.source {
        Some(path) => info!("Configuration loaded from {}", path.display()),
        None => info!("No configuration file found, using defaults"),
    }

    // 4. Connect, create schema and seed sizings
    let db = database::init_database(&app_config.database.url)
        .await
        .inspect(|_| info!("Database initialized successfully."))
        .inspect_err(|e| error!("Failed to initialize database: {}", e))?;

    // 5. Report what is stored
    for (table, rows) in database::row_counts(&db).await? {
        info!(table, rows, "table ready");
    }

    Ok(())
}
