use std::{str::FromStr, time::Duration};

use error_stack::{Report, ResultExt};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous},
    Sqlite, SqlitePool, Transaction,
};

use crate::Error;

const SQLITE_MIGRATIONS: &[&str] = &[include_str!(
    "../migrations/20241016_identity_init_sqlite.sql"
)];

/// Open the SQLite database and bring its schema up to date.
///
/// `db` is either a file path, a `sqlite:` connection string, or `sqlite::memory:`.
/// `lock_timeout` bounds how long a write waits for another writer to finish, and has to cover
/// a whole account saga since those hold the write lock across their remote calls.
pub async fn init_database(db: &str, lock_timeout: Duration) -> Result<SqlitePool, Report<Error>> {
    let in_memory = db.contains(":memory:");

    let ops = SqliteConnectOptions::from_str(db)
        .change_context(Error::DbInit)
        .attach_printable_lazy(|| format!("Invalid database path {db}"))?
        .foreign_keys(true)
        .busy_timeout(lock_timeout)
        .create_if_missing(true);

    let pool = if in_memory {
        tracing::info!("Opening in-memory SQLite database");
        // Every connection to :memory: is a separate database, so keep exactly one alive.
        SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .acquire_timeout(lock_timeout)
            .connect_with(ops)
            .await
    } else {
        tracing::info!("Opening SQLite database at {db}");
        SqlitePoolOptions::new()
            .connect_with(
                ops.journal_mode(SqliteJournalMode::Wal)
                    .synchronous(SqliteSynchronous::Normal),
            )
            .await
    }
    .change_context(Error::DbInit)?;

    run_default_migrations(&pool)
        .await
        .change_context(Error::DbInit)?;

    Ok(pool)
}

/// Start a transaction that takes the write lock up front.
///
/// A deferred transaction that reads and then writes can't wait for the lock: SQLite fails the
/// upgrade immediately with "database is locked" when another writer is active. Taking the lock
/// at `BEGIN` lets the busy timeout queue writers instead.
pub async fn begin_write(pool: &SqlitePool) -> Result<Transaction<'static, Sqlite>, Report<Error>> {
    pool.begin_with("BEGIN IMMEDIATE")
        .await
        .change_context(Error::Db)
}

/// Apply any migrations that have not yet run against this database.
pub async fn run_default_migrations(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;
    sqlx::raw_sql(
        "CREATE TABLE IF NOT EXISTS identity_meta (
          key text PRIMARY KEY,
          value text
        );",
    )
    .execute(&mut *tx)
    .await?;

    let migration_version = sqlx::query_scalar::<_, i32>(
        "SELECT cast(value as int) FROM identity_meta WHERE key='migration_version'",
    )
    .fetch_optional(&mut *tx)
    .await?
    .unwrap_or(0) as usize;

    tracing::info!("Migration version is {}", migration_version);

    let start_migration = migration_version.min(SQLITE_MIGRATIONS.len());
    for (i, migration) in SQLITE_MIGRATIONS[start_migration..].iter().enumerate() {
        tracing::info!("Running migration {}", start_migration + i);
        sqlx::raw_sql(migration).execute(&mut *tx).await?;
    }

    let new_version = SQLITE_MIGRATIONS.len();

    sqlx::query(
        "INSERT INTO identity_meta (key, value) VALUES ('migration_version', ?)
        ON CONFLICT (key) DO UPDATE SET value=excluded.value",
    )
    .bind(new_version.to_string())
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(())
}

/// Convert a database error into a report, classifying uniqueness violations as a conflict on
/// `entity`.
pub fn classify_db_error(err: sqlx::Error, entity: &'static str) -> Report<Error> {
    let unique_violation = err
        .as_database_error()
        .map(|e| e.is_unique_violation())
        .unwrap_or(false);

    let context = if unique_violation {
        Error::Conflict(entity)
    } else {
        Error::Db
    };

    Report::new(err).change_context(context)
}
