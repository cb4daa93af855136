use async_trait::async_trait;
use chrono::Utc;
use latch_migration::{
    AppliedMigration, Migration, MigrationError, MigrationManager, check_order, failed, pending,
};
use sqlx::{Sqlite, SqliteConnection, SqlitePool};

pub struct SqliteMigrationManager {
    pool: SqlitePool,
}

impl SqliteMigrationManager {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MigrationManager<Sqlite> for SqliteMigrationManager {
    async fn initialize(&self) -> Result<(), MigrationError> {
        let sql = format!(
            "CREATE TABLE IF NOT EXISTS {} (
                version INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                applied_at INTEGER NOT NULL
            )",
            self.table_name()
        );
        sqlx::query(&sql).execute(&self.pool).await?;
        Ok(())
    }

    async fn applied(&self) -> Result<Vec<AppliedMigration>, MigrationError> {
        let sql = format!(
            "SELECT version, name, applied_at FROM {} ORDER BY version",
            self.table_name()
        );
        let records = sqlx::query_as::<_, AppliedMigration>(&sql)
            .fetch_all(&self.pool)
            .await?;
        Ok(records)
    }

    async fn up(&self, migrations: &[Box<dyn Migration<Sqlite>>]) -> Result<Vec<i64>, MigrationError> {
        check_order(migrations)?;
        let applied = self.applied().await?;
        let record = format!(
            "INSERT INTO {} (version, name, applied_at) VALUES (?, ?, ?)",
            self.table_name()
        );

        let mut done = Vec::new();
        for migration in pending(migrations, &applied) {
            tracing::info!(
                version = migration.version(),
                name = migration.name(),
                "Applying migration"
            );

            let mut tx = self.pool.begin().await?;
            migration
                .up(&mut *tx)
                .await
                .map_err(|e| failed(migration, e))?;
            sqlx::query(&record)
                .bind(migration.version())
                .bind(migration.name())
                .bind(Utc::now().timestamp())
                .execute(&mut *tx)
                .await?;
            tx.commit().await?;

            done.push(migration.version());
        }
        Ok(done)
    }

    async fn down(&self, migrations: &[Box<dyn Migration<Sqlite>>]) -> Result<Vec<i64>, MigrationError> {
        let applied = self.applied().await?;
        let forget = format!("DELETE FROM {} WHERE version = ?", self.table_name());

        let mut done = Vec::new();
        for migration in migrations.iter().rev() {
            if !applied.iter().any(|a| a.version == migration.version()) {
                continue;
            }
            tracing::info!(
                version = migration.version(),
                name = migration.name(),
                "Rolling back migration"
            );

            let mut tx = self.pool.begin().await?;
            migration
                .down(&mut *tx)
                .await
                .map_err(|e| failed(migration.as_ref(), e))?;
            sqlx::query(&forget)
                .bind(migration.version())
                .execute(&mut *tx)
                .await?;
            tx.commit().await?;

            done.push(migration.version());
        }
        Ok(done)
    }
}

/// Every migration for this backend, in order.
pub fn all() -> Vec<Box<dyn Migration<Sqlite>>> {
    vec![Box::new(CreateKeyValueTable)]
}

/// The `kv_store` table behind [`SqliteStorage`](crate::SqliteStorage).
pub struct CreateKeyValueTable;

#[async_trait]
impl Migration<Sqlite> for CreateKeyValueTable {
    fn version(&self) -> i64 {
        1
    }

    fn name(&self) -> &str {
        "CreateKeyValueTable"
    }

    async fn up<'a>(&'a self, conn: &'a mut SqliteConnection) -> Result<(), MigrationError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS kv_store (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            )",
        )
        .execute(conn)
        .await?;
        Ok(())
    }

    async fn down<'a>(&'a self, conn: &'a mut SqliteConnection) -> Result<(), MigrationError> {
        sqlx::query("DROP TABLE IF EXISTS kv_store")
            .execute(conn)
            .await?;
        Ok(())
    }
}
