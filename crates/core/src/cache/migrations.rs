//! Schema migrations for the cache database.
//!
//! Applied versions are recorded in `_migrations`; each pending script runs
//! in its own transaction together with its bookkeeping row.

use super::Error;
use tokio_rusqlite::{Connection, params};

/// (version, name, SQL) in application order.
const MIGRATIONS: &[(i64, &str, &str)] = &[
    (1, "partitions", include_str!("../../migrations/001_partitions.sql")),
    (2, "outbox", include_str!("../../migrations/002_outbox.sql")),
];

/// Bring the schema up to the latest version.
///
/// # Errors
///
/// Returns `Error::MigrationFailed` naming the script that did not apply.
pub async fn run(conn: &Connection) -> Result<(), Error> {
    let applied = conn
        .call(|conn| -> Result<Vec<i64>, Error> {
            conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS _migrations (
                    version INTEGER PRIMARY KEY,
                    name TEXT NOT NULL,
                    applied_at TEXT NOT NULL
                )",
            )?;

            let current: i64 =
                conn.query_row("SELECT COALESCE(MAX(version), 0) FROM _migrations", [], |row| row.get(0))?;

            let mut applied = Vec::new();
            for &(version, name, sql) in MIGRATIONS.iter().filter(|(v, _, _)| *v > current) {
                let tx = conn.transaction()?;
                tx.execute_batch(sql)
                    .map_err(|e| Error::MigrationFailed(format!("{version:03}_{name}: {e}")))?;
                tx.execute(
                    "INSERT INTO _migrations (version, name, applied_at) VALUES (?1, ?2, ?3)",
                    params![version, name, chrono::Utc::now().to_rfc3339()],
                )?;
                tx.commit()?;
                applied.push(version);
            }
            Ok(applied)
        })
        .await
        .map_err(Error::from)?;

    if !applied.is_empty() {
        tracing::debug!(?applied, "applied cache schema migrations");
    }
    Ok(())
}
