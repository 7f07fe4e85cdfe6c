//! libSQL backend — async `ApplicationStore` implementation.
//!
//! Supports local file and in-memory databases.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::{debug, info};

use crate::error::DatabaseError;
use crate::intake::model::{ApplicationRecord, Language, NewApplication};
use crate::store::schema;
use crate::store::traits::ApplicationStore;

const SELECT_COLUMNS: &str =
    "id, tg_user_id, lang, full_name, phone, position, cv_file_id, created_at";

/// libSQL database backend.
///
/// Stores a single connection that is reused for all operations.
pub struct LibSqlBackend {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlBackend {
    /// Open (or create) a local database file and ensure the schema exists.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let backend = Self::from_database(db)?;
        backend.init_schema().await?;
        info!(path = %path.display(), "Database opened");
        Ok(backend)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;

        let backend = Self::from_database(db)?;
        backend.init_schema().await?;
        Ok(backend)
    }

    fn from_database(db: LibSqlDatabase) -> Result<Self, DatabaseError> {
        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;
        Ok(Self {
            db: Arc::new(db),
            conn,
        })
    }

    fn conn(&self) -> &Connection {
        &self.conn
    }
}

// ── Helper functions ────────────────────────────────────────────────

/// Parse a stored timestamp. Accepts RFC 3339 (what we write) and the naive
/// ISO and SQLite forms older rows carry; naive values are taken as UTC.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc);
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, format) {
            return ndt.and_utc();
        }
    }
    DateTime::<Utc>::MIN_UTC
}

fn row_to_application(row: &libsql::Row) -> Result<ApplicationRecord, DatabaseError> {
    let lang: String = row.get::<String>(2).unwrap_or_default();
    let language = lang.parse::<Language>().unwrap_or_else(|_| {
        debug!(lang = %lang, "Unknown language code in stored application");
        Language::default()
    });
    let created_at: String = row.get::<String>(7).unwrap_or_default();

    Ok(ApplicationRecord {
        id: row
            .get::<i64>(0)
            .map_err(|e| DatabaseError::Serialization(format!("Bad application id: {e}")))?,
        user_id: row.get::<i64>(1).unwrap_or(0),
        language,
        full_name: row.get::<String>(3).unwrap_or_default(),
        phone: row.get::<String>(4).unwrap_or_default(),
        position: row.get::<String>(5).unwrap_or_default(),
        cv_file_id: row.get::<String>(6).unwrap_or_default(),
        created_at: parse_datetime(&created_at),
    })
}

#[async_trait]
impl ApplicationStore for LibSqlBackend {
    async fn init_schema(&self) -> Result<(), DatabaseError> {
        schema::init_schema(self.conn()).await
    }

    async fn insert_application(
        &self,
        application: &NewApplication,
        created_at: DateTime<Utc>,
    ) -> Result<ApplicationRecord, DatabaseError> {
        let tx = self
            .conn()
            .transaction()
            .await
            .map_err(|e| DatabaseError::Query(format!("insert_application begin: {e}")))?;

        tx.execute(
            "INSERT INTO applications (tg_user_id, lang, full_name, phone, position, cv_file_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                application.user_id,
                application.language.code(),
                application.full_name.as_str(),
                application.phone.as_str(),
                application.position.as_str(),
                application.document.file_id.as_str(),
                created_at.to_rfc3339(),
            ],
        )
        .await
        .map_err(|e| DatabaseError::Query(format!("insert_application: {e}")))?;

        let id = tx.last_insert_rowid();
        tx.commit()
            .await
            .map_err(|e| DatabaseError::Query(format!("insert_application commit: {e}")))?;

        debug!(id, user_id = application.user_id, "Application stored");
        Ok(ApplicationRecord {
            id,
            user_id: application.user_id,
            language: application.language,
            full_name: application.full_name.clone(),
            phone: application.phone.clone(),
            position: application.position.clone(),
            cv_file_id: application.document.file_id.clone(),
            created_at,
        })
    }

    async fn get_application(&self, id: i64) -> Result<Option<ApplicationRecord>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {SELECT_COLUMNS} FROM applications WHERE id = ?1"),
                params![id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_application: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_application(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("get_application: {e}"))),
        }
    }

    async fn list_applications(
        &self,
        limit: usize,
    ) -> Result<Vec<ApplicationRecord>, DatabaseError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {SELECT_COLUMNS} FROM applications ORDER BY id DESC LIMIT ?1"),
                params![limit],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("list_applications: {e}")))?;

        let mut applications = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("list_applications: {e}")))?
        {
            applications.push(row_to_application(&row)?);
        }
        Ok(applications)
    }

    async fn count_applications(&self) -> Result<u64, DatabaseError> {
        let mut rows = self
            .conn()
            .query("SELECT COUNT(*) FROM applications", ())
            .await
            .map_err(|e| DatabaseError::Query(format!("count_applications: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(row.get::<i64>(0).unwrap_or(0).max(0) as u64),
            Ok(None) => Ok(0),
            Err(e) => Err(DatabaseError::Query(format!("count_applications: {e}"))),
        }
    }
}
