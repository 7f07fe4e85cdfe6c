//! Schema bootstrap for the applications table.
//!
//! The table layout matches databases written by earlier deployments of the
//! bot, so an existing `hrbot.db` can be opened as-is.

use libsql::Connection;

use crate::error::DatabaseError;

const APPLICATIONS_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS applications (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        tg_user_id INTEGER,
        lang TEXT,
        full_name TEXT,
        phone TEXT,
        position TEXT,
        cv_file_id TEXT,
        created_at TEXT
    )
"#;

/// Create the `applications` table if it is missing. Idempotent.
pub async fn init_schema(conn: &Connection) -> Result<(), DatabaseError> {
    conn.execute(APPLICATIONS_TABLE, ())
        .await
        .map_err(|e| DatabaseError::Query(format!("Failed to create applications table: {e}")))?;
    tracing::debug!("Applications schema ready");
    Ok(())
}
