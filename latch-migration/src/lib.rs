//! Versioned schema migrations for latch's SQL backends.
//!
//! A backend lists its migrations in version order and hands them to its
//! [`MigrationManager`]. Applied versions are recorded in a bookkeeping
//! table, so running the same list again only applies what is new.
use async_trait::async_trait;
use sqlx::Database;
use thiserror::Error;

/// Bookkeeping table shared by every backend.
pub const MIGRATION_TABLE: &str = "_latch_migrations";

#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("Migration {version} ({name}) failed: {reason}")]
    Failed {
        version: i64,
        name: String,
        reason: String,
    },

    #[error("Migration versions must strictly increase: {found} follows {previous}")]
    OutOfOrder { previous: i64, found: i64 },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type Result<T> = std::result::Result<T, MigrationError>;

#[async_trait]
pub trait Migration<DB: Database>: Send + Sync {
    fn version(&self) -> i64;

    fn name(&self) -> &str;

    async fn up<'a>(&'a self, conn: &'a mut DB::Connection) -> Result<()>;

    async fn down<'a>(&'a self, conn: &'a mut DB::Connection) -> Result<()>;
}

/// A row of the bookkeeping table.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct AppliedMigration {
    pub version: i64,
    pub name: String,
    /// unix seconds
    pub applied_at: i64,
}

/// Reject lists whose versions repeat or go backwards.
pub fn check_order<DB: Database>(migrations: &[Box<dyn Migration<DB>>]) -> Result<()> {
    for pair in migrations.windows(2) {
        let (previous, found) = (pair[0].version(), pair[1].version());
        if found <= previous {
            return Err(MigrationError::OutOfOrder { previous, found });
        }
    }
    Ok(())
}

/// The migrations in `migrations` not yet recorded in `applied`, in order.
pub fn pending<'m, DB: Database>(
    migrations: &'m [Box<dyn Migration<DB>>],
    applied: &[AppliedMigration],
) -> Vec<&'m dyn Migration<DB>> {
    migrations
        .iter()
        .filter(|m| !applied.iter().any(|a| a.version == m.version()))
        .map(|m| m.as_ref())
        .collect()
}

/// Wrap a failure from a migration body with the migration's identity.
pub fn failed<DB: Database>(migration: &dyn Migration<DB>, err: MigrationError) -> MigrationError {
    MigrationError::Failed {
        version: migration.version(),
        name: migration.name().to_string(),
        reason: err.to_string(),
    }
}

#[async_trait]
pub trait MigrationManager<DB: Database>: Send + Sync {
    fn table_name(&self) -> &str {
        MIGRATION_TABLE
    }

    /// Create the bookkeeping table if it is missing.
    async fn initialize(&self) -> Result<()>;

    /// Recorded migrations, oldest first.
    async fn applied(&self) -> Result<Vec<AppliedMigration>>;

    /// Apply every pending migration, each in its own transaction.
    /// Returns the versions applied by this call.
    async fn up(&self, migrations: &[Box<dyn Migration<DB>>]) -> Result<Vec<i64>>;

    /// Roll back every applied migration in `migrations`, newest first.
    /// Returns the versions rolled back by this call.
    async fn down(&self, migrations: &[Box<dyn Migration<DB>>]) -> Result<Vec<i64>>;
}
