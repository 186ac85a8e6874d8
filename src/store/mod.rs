//! SQLite-backed task and worker store.
//!
//! Provides:
//! - Schema initialization for tasks, workers, and engine metadata
//! - Point-in-time snapshots of assignable tasks and available workers
//! - Conditional (optimistic) assignment updates for the committer
//! - A persistent insert cursor for the change watcher
//!
//! The store is shared mutably with the rest of the platform (admin edits,
//! other services), so every engine write is conditional rather than assuming
//! exclusive ownership.

pub mod types;

use std::path::Path;

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use thiserror::Error;
use tokio::sync::Mutex;
use uuid::Uuid;

pub use types::{
    Department, GeoPoint, Level, LocationDetails, NewTask, NewWorker, Shift, Snapshot, Task,
    TaskStatus, Worker,
};

/// Key under which the watcher's insert cursor is persisted.
const CURSOR_KEY: &str = "task_cursor";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("corrupt stored record: {0}")]
    Corrupt(#[from] serde_json::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Store for tasks and workers, backed by a single SQLite database.
pub struct TaskStore {
    conn: Mutex<Connection>,
}

impl TaskStore {
    /// Open (or create) the store at the given path.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    /// Open an in-memory store. Used by tests.
    pub fn open_in_memory() -> StoreResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> StoreResult<Self> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS tasks (
                seq              INTEGER PRIMARY KEY AUTOINCREMENT,
                id               TEXT NOT NULL UNIQUE,
                detected_class   TEXT NOT NULL,
                department       TEXT NOT NULL,
                severity         TEXT NOT NULL,
                priority         TEXT NOT NULL,
                location         TEXT NOT NULL,
                latitude         REAL,
                longitude        REAL,
                description      TEXT NOT NULL,
                size             REAL NOT NULL,
                location_details TEXT NOT NULL,
                confidence       REAL NOT NULL,
                status           TEXT NOT NULL DEFAULT 'Incomplete',
                assigned         INTEGER NOT NULL DEFAULT 0,
                assigned_worker  TEXT,
                created_at       TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_tasks_status ON tasks(status);

            CREATE TABLE IF NOT EXISTS workers (
                id                  TEXT PRIMARY KEY,
                name                TEXT NOT NULL,
                department          TEXT NOT NULL,
                shift               TEXT NOT NULL,
                location            TEXT NOT NULL,
                latitude            REAL,
                longitude           REAL,
                available           INTEGER NOT NULL DEFAULT 1,
                emergency_responder INTEGER NOT NULL DEFAULT 0,
                created_at          TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS engine_meta (
                key   TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            "#,
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Insert a new task and return the stored record.
    pub async fn insert_task(&self, new: NewTask) -> StoreResult<Task> {
        let conn = self.conn.lock().await;
        let id = Uuid::new_v4();
        let created_at = Utc::now();
        let details = serde_json::to_string(&new.location_details)?;

        conn.execute(
            "INSERT INTO tasks (id, detected_class, department, severity, priority, location,
                                latitude, longitude, description, size, location_details,
                                confidence, status, assigned, assigned_worker, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, 'Incomplete', 0, NULL, ?13)",
            params![
                id,
                new.detected_class,
                new.department,
                new.severity,
                new.priority,
                new.location,
                new.position.map(|p| p.latitude),
                new.position.map(|p| p.longitude),
                new.description,
                new.size,
                details,
                new.confidence_score,
                created_at,
            ],
        )?;
        let seq = conn.last_insert_rowid();

        Ok(Task {
            id,
            seq,
            detected_class: new.detected_class,
            department: new.department,
            severity: new.severity,
            priority: new.priority,
            location: new.location,
            position: new.position,
            description: new.description,
            size: new.size,
            location_details: new.location_details,
            confidence_score: new.confidence_score,
            status: TaskStatus::Incomplete,
            assigned: false,
            assigned_worker: None,
            created_at,
        })
    }

    /// Read a consistent snapshot of assignable tasks and available workers.
    ///
    /// Both reads happen inside a single transaction. Workers that already
    /// hold an In Progress task are excluded so the engine never double-books
    /// a worker across runs.
    pub async fn snapshot(&self) -> StoreResult<Snapshot> {
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;

        let tasks = {
            let mut stmt = tx.prepare(
                "SELECT * FROM tasks WHERE status = 'Incomplete' ORDER BY seq",
            )?;
            let rows = stmt.query_map([], task_from_row)?;
            rows.collect::<Result<Vec<_>, _>>()?
        };

        let workers = {
            let mut stmt = tx.prepare(
                "SELECT * FROM workers w
                 WHERE w.available = 1
                   AND NOT EXISTS (
                       SELECT 1 FROM tasks t
                       WHERE t.assigned_worker = w.id AND t.status = 'In Progress'
                   )
                 ORDER BY w.created_at",
            )?;
            let rows = stmt.query_map([], worker_from_row)?;
            rows.collect::<Result<Vec<_>, _>>()?
        };

        tx.commit()?;
        Ok(Snapshot { tasks, workers })
    }

    /// Conditionally commit one assignment.
    ///
    /// The update only applies while the task is still unassigned and
    /// Incomplete; returns `false` when the task changed concurrently and the
    /// assignment was skipped.
    pub async fn commit_assignment(&self, task_id: Uuid, worker_id: Uuid) -> StoreResult<bool> {
        let conn = self.conn.lock().await;
        let changed = conn.execute(
            "UPDATE tasks
             SET assigned = 1, assigned_worker = ?1, status = 'In Progress'
             WHERE id = ?2 AND status = 'Incomplete' AND assigned = 0",
            params![worker_id, task_id],
        )?;
        Ok(changed == 1)
    }

    /// Fetch a single task by id.
    pub async fn get_task(&self, id: Uuid) -> StoreResult<Option<Task>> {
        let conn = self.conn.lock().await;
        let task = conn
            .query_row("SELECT * FROM tasks WHERE id = ?1", params![id], task_from_row)
            .optional()?;
        Ok(task)
    }

    /// List tasks, optionally filtered by status, newest first.
    pub async fn list_tasks(&self, status: Option<TaskStatus>) -> StoreResult<Vec<Task>> {
        let conn = self.conn.lock().await;
        let tasks = match status {
            Some(status) => {
                let mut stmt =
                    conn.prepare("SELECT * FROM tasks WHERE status = ?1 ORDER BY seq DESC")?;
                let rows = stmt.query_map(params![status], task_from_row)?;
                rows.collect::<Result<Vec<_>, _>>()?
            }
            None => {
                let mut stmt = conn.prepare("SELECT * FROM tasks ORDER BY seq DESC")?;
                let rows = stmt.query_map([], task_from_row)?;
                rows.collect::<Result<Vec<_>, _>>()?
            }
        };
        Ok(tasks)
    }

    /// Update a task's lifecycle status (admin surface: complete / cancel /
    /// reopen). Reopening to Incomplete clears the assignment so the task
    /// re-enters the assignable pool.
    ///
    /// Returns `false` when the task does not exist.
    pub async fn set_task_status(&self, id: Uuid, status: TaskStatus) -> StoreResult<bool> {
        let conn = self.conn.lock().await;
        let changed = if status == TaskStatus::Incomplete {
            conn.execute(
                "UPDATE tasks SET status = ?1, assigned = 0, assigned_worker = NULL WHERE id = ?2",
                params![status, id],
            )?
        } else {
            conn.execute(
                "UPDATE tasks SET status = ?1 WHERE id = ?2",
                params![status, id],
            )?
        };
        Ok(changed == 1)
    }

    /// Register a new worker.
    pub async fn insert_worker(&self, new: NewWorker) -> StoreResult<Worker> {
        let conn = self.conn.lock().await;
        let id = Uuid::new_v4();
        let created_at = Utc::now();

        conn.execute(
            "INSERT INTO workers (id, name, department, shift, location, latitude, longitude,
                                  available, emergency_responder, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                id,
                new.name,
                new.department,
                new.shift,
                new.location,
                new.position.map(|p| p.latitude),
                new.position.map(|p| p.longitude),
                new.available,
                new.emergency_responder,
                created_at,
            ],
        )?;

        Ok(Worker {
            id,
            name: new.name,
            department: new.department,
            shift: new.shift,
            location: new.location,
            position: new.position,
            available: new.available,
            emergency_responder: new.emergency_responder,
            created_at,
        })
    }

    /// List all workers.
    pub async fn list_workers(&self) -> StoreResult<Vec<Worker>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare("SELECT * FROM workers ORDER BY created_at")?;
        let rows = stmt.query_map([], worker_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Toggle a worker's availability. Returns `false` for unknown ids.
    pub async fn set_worker_availability(&self, id: Uuid, available: bool) -> StoreResult<bool> {
        let conn = self.conn.lock().await;
        let changed = conn.execute(
            "UPDATE workers SET available = ?1 WHERE id = ?2",
            params![available, id],
        )?;
        Ok(changed == 1)
    }

    /// Highest task sequence number ever inserted (0 when empty).
    pub async fn last_task_seq(&self) -> StoreResult<i64> {
        let conn = self.conn.lock().await;
        let seq = conn.query_row("SELECT COALESCE(MAX(seq), 0) FROM tasks", [], |row| {
            row.get(0)
        })?;
        Ok(seq)
    }

    /// Read the watcher's persisted insert cursor (0 when never set).
    pub async fn cursor(&self) -> StoreResult<i64> {
        let conn = self.conn.lock().await;
        let value: Option<String> = conn
            .query_row(
                "SELECT value FROM engine_meta WHERE key = ?1",
                params![CURSOR_KEY],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value.and_then(|v| v.parse().ok()).unwrap_or(0))
    }

    /// Persist the watcher's insert cursor.
    pub async fn set_cursor(&self, seq: i64) -> StoreResult<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO engine_meta (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![CURSOR_KEY, seq.to_string()],
        )?;
        Ok(())
    }
}

fn task_from_row(row: &Row<'_>) -> rusqlite::Result<Task> {
    let latitude: Option<f64> = row.get("latitude")?;
    let longitude: Option<f64> = row.get("longitude")?;
    let details: String = row.get("location_details")?;
    let location_details = serde_json::from_str(&details).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })?;

    Ok(Task {
        id: row.get("id")?,
        seq: row.get("seq")?,
        detected_class: row.get("detected_class")?,
        department: row.get("department")?,
        severity: row.get("severity")?,
        priority: row.get("priority")?,
        location: row.get("location")?,
        position: geo_point(latitude, longitude),
        description: row.get("description")?,
        size: row.get("size")?,
        location_details,
        confidence_score: row.get("confidence")?,
        status: row.get("status")?,
        assigned: row.get("assigned")?,
        assigned_worker: row.get("assigned_worker")?,
        created_at: row.get("created_at")?,
    })
}

fn worker_from_row(row: &Row<'_>) -> rusqlite::Result<Worker> {
    let latitude: Option<f64> = row.get("latitude")?;
    let longitude: Option<f64> = row.get("longitude")?;

    Ok(Worker {
        id: row.get("id")?,
        name: row.get("name")?,
        department: row.get("department")?,
        shift: row.get("shift")?,
        location: row.get("location")?,
        position: geo_point(latitude, longitude),
        available: row.get("available")?,
        emergency_responder: row.get("emergency_responder")?,
        created_at: row.get("created_at")?,
    })
}

fn geo_point(latitude: Option<f64>, longitude: Option<f64>) -> Option<GeoPoint> {
    match (latitude, longitude) {
        (Some(latitude), Some(longitude)) => Some(GeoPoint {
            latitude,
            longitude,
        }),
        _ => None,
    }
}
