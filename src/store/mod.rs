//! Persistence layer — SQLite-backed storage for submitted applications.

pub mod libsql_backend;
pub mod schema;
pub mod traits;

pub use libsql_backend::LibSqlBackend;
pub use traits::ApplicationStore;
