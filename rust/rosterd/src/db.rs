use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;
use std::time::Duration;

use crate::config::{DatabaseTarget, PoolSettings};
use crate::error::{StoreError, StoreResult};

pub type DbPool = Pool<SqliteConnectionManager>;

/// Build the connection pool and make sure the schema exists.
///
/// Every pooled connection gets `PRAGMA foreign_keys = ON`, which is what makes
/// the `ON DELETE CASCADE` clauses below take effect.
pub fn open_pool(target: &DatabaseTarget, settings: &PoolSettings) -> StoreResult<DbPool> {
    let manager = match target {
        DatabaseTarget::File(path) => {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent).map_err(|source| StoreError::Io {
                        path: parent.to_path_buf(),
                        source,
                    })?;
                }
            }
            SqliteConnectionManager::file(path)
        }
        DatabaseTarget::Memory => SqliteConnectionManager::memory(),
    };
    let manager = manager.with_init(|c| {
        c.pragma_update(None, "foreign_keys", "ON")?;
        c.busy_timeout(Duration::from_secs(5))
    });

    let builder = Pool::builder()
        .connection_timeout(settings.connection_timeout)
        .test_on_check_out(settings.test_on_check_out);
    let pool = match target {
        // Each in-memory connection is its own database, so pin a single one for
        // the life of the pool.
        DatabaseTarget::Memory => builder
            .max_size(1)
            .min_idle(Some(1))
            .idle_timeout(None)
            .max_lifetime(None)
            .build(manager)?,
        DatabaseTarget::File(_) => builder
            .max_size(settings.max_size)
            .min_idle(settings.min_idle)
            .idle_timeout(settings.idle_timeout)
            .max_lifetime(settings.max_lifetime)
            .build(manager)?,
    };

    let conn = pool.get()?;
    ensure_schema(&conn)?;
    Ok(pool)
}

pub fn ensure_schema(conn: &Connection) -> StoreResult<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS courses(
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL UNIQUE
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS students(
            id INTEGER PRIMARY KEY,
            course_id INTEGER NOT NULL,
            first_name TEXT NOT NULL,
            last_name TEXT NOT NULL,
            FOREIGN KEY(course_id) REFERENCES courses(id) ON DELETE CASCADE
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_students_course_name
         ON students(course_id, last_name, first_name)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS attendances(
            id INTEGER PRIMARY KEY,
            student_id INTEGER NOT NULL,
            date TEXT NOT NULL,
            status TEXT NOT NULL,
            FOREIGN KEY(student_id) REFERENCES students(id) ON DELETE CASCADE
        )",
        [],
    )?;
    conn.execute(
        "CREATE TABLE IF NOT EXISTS behaviors(
            id INTEGER PRIMARY KEY,
            student_id INTEGER NOT NULL,
            date TEXT NOT NULL,
            score INTEGER NOT NULL,
            description TEXT,
            FOREIGN KEY(student_id) REFERENCES students(id) ON DELETE CASCADE
        )",
        [],
    )?;
    conn.execute(
        "CREATE TABLE IF NOT EXISTS assignments(
            id INTEGER PRIMARY KEY,
            student_id INTEGER NOT NULL,
            date TEXT NOT NULL,
            title TEXT NOT NULL,
            status TEXT NOT NULL,
            FOREIGN KEY(student_id) REFERENCES students(id) ON DELETE CASCADE
        )",
        [],
    )?;
    conn.execute(
        "CREATE TABLE IF NOT EXISTS notes(
            id INTEGER PRIMARY KEY,
            student_id INTEGER NOT NULL,
            date TEXT NOT NULL,
            content TEXT NOT NULL,
            FOREIGN KEY(student_id) REFERENCES students(id) ON DELETE CASCADE
        )",
        [],
    )?;

    for table in ["attendances", "behaviors", "assignments", "notes"] {
        conn.execute(
            &format!(
                "CREATE INDEX IF NOT EXISTS idx_{table}_student ON {table}(student_id)"
            ),
            [],
        )?;
    }

    Ok(())
}

/// Row count helper used by diagnostics and tests.
pub fn table_count(conn: &Connection, table: &str) -> StoreResult<i64> {
    let sql = format!("SELECT COUNT(*) FROM {}", table);
    Ok(conn.query_row(&sql, [], |r| r.get(0))?)
}
