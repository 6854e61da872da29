/// Database connection, schema creation and reference-data seeding
pub mod database;

/// Application settings loaded from config.toml and the environment
pub mod settings;
