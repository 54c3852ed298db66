use super::Database;
use tempfile::NamedTempFile;

mod dedup;

/// Helper: fresh catalog backed by a temp file (kept alive with the handle)
async fn test_db() -> (Database, NamedTempFile) {
    let temp_file = NamedTempFile::new().unwrap();
    let db = Database::new(temp_file.path()).await.unwrap();
    (db, temp_file)
}
