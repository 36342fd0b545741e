use crate::entities::{attachment_relations, file_resources, thumbnail_caches};
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Schema, Statement};
use std::time::Duration;
use tracing::info;

pub async fn setup_database(database_url: &str) -> anyhow::Result<DatabaseConnection> {
    info!("📂 Database: {}", database_url);

    if let Some(path) = sqlite_file_path(database_url) {
        if let Some(parent) = std::path::Path::new(path).parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }

    let mut opt = ConnectOptions::new(database_url);
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

    Ok(db)
}

/// Creates the content tables and their indexes if they do not exist yet.
pub async fn run_migrations(db: &DatabaseConnection) -> Result<(), sea_orm::DbErr> {
    info!("🔄 Running SeaORM auto-migrations...");
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);

    let stmts = vec![
        schema
            .create_table_from_entity(file_resources::Entity)
            .if_not_exists()
            .to_owned(),
        schema
            .create_table_from_entity(attachment_relations::Entity)
            .if_not_exists()
            .to_owned(),
        schema
            .create_table_from_entity(thumbnail_caches::Entity)
            .if_not_exists()
            .to_owned(),
    ];

    for stmt in stmts {
        db.execute(builder.build(&stmt)).await?;
    }

    let indexes = [
        "CREATE INDEX IF NOT EXISTS idx_file_resources_category ON file_resources(category)",
        "CREATE INDEX IF NOT EXISTS idx_file_resources_created_at ON file_resources(created_at)",
        "CREATE INDEX IF NOT EXISTS idx_attachment_relations_document ON attachment_relations(document_id)",
        "CREATE INDEX IF NOT EXISTS idx_attachment_relations_file ON attachment_relations(file_id)",
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_attachment_relations_pair ON attachment_relations(document_id, file_id)",
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_thumbnail_caches_key ON thumbnail_caches(source_file_id, width, height)",
        "CREATE INDEX IF NOT EXISTS idx_thumbnail_caches_last_accessed ON thumbnail_caches(last_accessed_at)",
    ];

    for sql in indexes {
        db.execute(Statement::from_string(builder, sql.to_string()))
            .await?;
    }

    Ok(())
}

fn sqlite_file_path(database_url: &str) -> Option<&str> {
    let rest = database_url
        .strip_prefix("sqlite://")
        .or_else(|| database_url.strip_prefix("sqlite:"))?;
    let path = rest.split('?').next().unwrap_or(rest);
    if path.is_empty() || path == ":memory:" {
        None
    } else {
        Some(path)
    }
}
