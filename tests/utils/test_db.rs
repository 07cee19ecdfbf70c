/// Isolated test database backed by a temporary SQLite file
///
/// Each test gets its own database file inside a temp directory that is
/// removed when the `TestDb` is dropped.
use mangaq::shared::infrastructure::{Database, DbPool};
use std::sync::Arc;
use tempfile::TempDir;

pub struct TestDb {
    // Held for its Drop
    _dir: TempDir,
    database: Arc<Database>,
}

impl TestDb {
    /// Creates a migrated database in a fresh temp directory
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp dir for test database");
        let path = dir.path().join("queue.db");
        let url = path.to_str().expect("temp path is valid UTF-8").to_string();

        let database = Database::open(&url).expect("Failed to open test database");
        database
            .run_migrations()
            .expect("Unable to migrate the test database");

        Self {
            _dir: dir,
            database: Arc::new(database),
        }
    }

    pub fn database(&self) -> Arc<Database> {
        Arc::clone(&self.database)
    }

    pub fn pool(&self) -> DbPool {
        self.database.pool().clone()
    }
}
