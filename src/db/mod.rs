//! Database module for SQLite persistence.
//!
//! SQLite is the entity store for seasons, pools, products, participants,
//! registrations, payments and health declarations.

mod repository;

pub use repository::*;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;

/// Current schema version reported in revision info.
pub const SCHEMA_VERSION: i32 = 1;

/// Initialize the database connection pool and run migrations.
pub async fn init_database(db_path: &Path) -> Result<SqlitePool, sqlx::Error> {
    // Ensure the parent directory exists
    if let Some(parent) = db_path.parent() {
        tokio::fs::create_dir_all(parent).await.ok();
    }

    let db_url = format!("sqlite:{}?mode=rwc", db_path.display());

    let options = SqliteConnectOptions::from_str(&db_url)?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
        .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
        .busy_timeout(std::time::Duration::from_secs(30));

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    run_migrations(&pool).await?;

    Ok(pool)
}

/// Run database migrations.
async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS meta (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            schema_version INTEGER NOT NULL DEFAULT 1,
            revision_id INTEGER NOT NULL DEFAULT 0,
            generated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        INSERT OR IGNORE INTO meta (id, schema_version, revision_id, generated_at)
        VALUES (1, 1, 0, datetime('now'));
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS seasons (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            start_date TEXT NOT NULL,
            end_date TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS pools (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS season_pools (
            season_id TEXT NOT NULL REFERENCES seasons(id) ON DELETE CASCADE,
            pool_id TEXT NOT NULL REFERENCES pools(id) ON DELETE CASCADE,
            PRIMARY KEY (season_id, pool_id)
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS products (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            product_type TEXT NOT NULL,
            season_id TEXT NOT NULL REFERENCES seasons(id),
            pool_id TEXT REFERENCES pools(id),
            start_date TEXT,
            end_date TEXT,
            price REAL NOT NULL DEFAULT 0,
            max_participants INTEGER NOT NULL DEFAULT 0,
            meetings_count INTEGER,
            days_of_week TEXT,
            start_time TEXT,
            notes TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS participants (
            id TEXT PRIMARY KEY,
            first_name TEXT NOT NULL,
            last_name TEXT NOT NULL,
            id_number TEXT NOT NULL DEFAULT '',
            phone TEXT NOT NULL DEFAULT '',
            health_approval INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS registrations (
            id TEXT PRIMARY KEY,
            product_id TEXT NOT NULL REFERENCES products(id),
            participant_id TEXT NOT NULL REFERENCES participants(id),
            registration_date TEXT NOT NULL,
            required_amount REAL NOT NULL DEFAULT 0,
            discount_amount REAL,
            discount_approved INTEGER NOT NULL DEFAULT 0,
            receipt_number TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS payments (
            id TEXT PRIMARY KEY,
            registration_id TEXT NOT NULL REFERENCES registrations(id),
            amount REAL NOT NULL,
            payment_date TEXT NOT NULL,
            receipt_number TEXT NOT NULL,
            created_at TEXT NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    // participant_id is not a foreign key: historical rows hold
    // registration ids there.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS health_declarations (
            id TEXT PRIMARY KEY,
            participant_id TEXT NOT NULL,
            registration_id TEXT,
            token TEXT NOT NULL UNIQUE,
            form_status TEXT NOT NULL DEFAULT 'pending',
            submission_date TEXT,
            notes TEXT,
            signature TEXT,
            parent_name TEXT,
            parent_id_number TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_products_season ON products(season_id);
        CREATE INDEX IF NOT EXISTS idx_products_pool ON products(pool_id);
        CREATE INDEX IF NOT EXISTS idx_registrations_product ON registrations(product_id);
        CREATE INDEX IF NOT EXISTS idx_registrations_participant ON registrations(participant_id);
        CREATE INDEX IF NOT EXISTS idx_payments_registration ON payments(registration_id);
        CREATE INDEX IF NOT EXISTS idx_declarations_participant ON health_declarations(participant_id);
        CREATE INDEX IF NOT EXISTS idx_declarations_registration ON health_declarations(registration_id);
        CREATE INDEX IF NOT EXISTS idx_participants_name ON participants(last_name, first_name);
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
