use anyhow::anyhow;
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Schema};
use std::env;
use std::time::Duration;
use tracing::info;

use crate::entities::{entries, entry_parameters, files, physical_files, record_fields};

pub async fn setup_database() -> anyhow::Result<DatabaseConnection> {
    let db_url = env::var("DATABASE_URL").map_err(|_| anyhow!("DATABASE_URL must be set"))?;

    info!("📂 Database: {}", db_url);

    let mut opt = ConnectOptions::new(&db_url);
    opt.max_connections(20)
        .min_connections(1)
        .connect_timeout(Duration::from_secs(30))
        .acquire_timeout(Duration::from_secs(30))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .sqlx_logging(true)
        .sqlx_logging_level(log::LevelFilter::Debug);

    let db = Database::connect(opt).await?;

    info!("✅ Database connected successfully");

    run_migrations(&db).await?;
    crate::infrastructure::seed::seed_initial_data(&db).await?;

    Ok(db)
}

/// Creates the tables from the entity definitions, parents before children.
pub async fn run_migrations(db: &DatabaseConnection) -> anyhow::Result<()> {
    info!("🔄 Running SeaORM auto-migrations...");
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);

    let stmts = vec![
        schema
            .create_table_from_entity(entries::Entity)
            .if_not_exists()
            .to_owned(),
        schema
            .create_table_from_entity(physical_files::Entity)
            .if_not_exists()
            .to_owned(),
        schema
            .create_table_from_entity(files::Entity)
            .if_not_exists()
            .to_owned(),
        schema
            .create_table_from_entity(record_fields::Entity)
            .if_not_exists()
            .to_owned(),
        schema
            .create_table_from_entity(entry_parameters::Entity)
            .if_not_exists()
            .to_owned(),
    ];

    for stmt in stmts {
        db.execute(builder.build(&stmt)).await?;
    }

    let _ = db
        .execute(sea_orm::Statement::from_string(
            builder,
            "CREATE INDEX IF NOT EXISTS idx_record_fields_record_id ON record_fields(record_id);"
                .to_string(),
        ))
        .await;

    Ok(())
}
