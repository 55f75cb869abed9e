use anyhow::Context;
use diesel::connection::SimpleConnection;
use diesel::{Connection, QueryResult, SqliteConnection};
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// How long a connection waits on SQLite's write lock before giving up.
pub const BUSY_TIMEOUT_MS: u32 = 5_000;

pub fn run_migrations(conn: &mut SqliteConnection) -> Result<(), anyhow::Error> {
    let applied = conn
        .run_pending_migrations(MIGRATIONS)
        .map_err(|e| anyhow::anyhow!(e))
        .context("Failed to run database migrations.")?;
    for migration in applied {
        tracing::info!(%migration, "Applied database migration");
    }
    Ok(())
}

/// Per-connection settings. Safe to repeat on a connection that already has
/// them.
pub fn configure_connection(conn: &mut SqliteConnection) -> QueryResult<()> {
    conn.batch_execute(&format!(
        "PRAGMA busy_timeout = {}; PRAGMA foreign_keys = ON;",
        BUSY_TIMEOUT_MS
    ))
}

/// Switches the database file to write-ahead logging. The mode is stored in
/// the file, so running it once per process is enough.
pub fn enable_wal(conn: &mut SqliteConnection) -> QueryResult<()> {
    conn.batch_execute("PRAGMA journal_mode = WAL;")
}

/// Runs `f` in a `BEGIN IMMEDIATE` transaction. The write lock is taken up
/// front, so concurrent writers queue on the busy timeout instead of failing
/// when a read inside the transaction is later upgraded to a write.
///
/// Must be the outermost transaction on the connection. Helpers called from
/// `f` may still open nested transactions, which become savepoints.
pub fn write_transaction<T, E, F>(conn: &mut SqliteConnection, f: F) -> Result<T, E>
where
    F: FnOnce(&mut SqliteConnection) -> Result<T, E>,
    E: From<diesel::result::Error>,
{
    configure_connection(conn)?;
    conn.immediate_transaction(f)
}

/// Direct connection to the SQLite file, for tooling that runs outside the
/// server.
pub fn establish_connection(path: &str) -> Result<SqliteConnection, anyhow::Error> {
    let mut conn = SqliteConnection::establish(path)
        .with_context(|| format!("Failed to open the SQLite database at {}.", path))?;
    configure_connection(&mut conn).context("Failed to configure the SQLite connection.")?;
    Ok(conn)
}
