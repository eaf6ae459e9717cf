//! Store: open/recover, write handle (serialized via the writer actor), read handle (a fresh
//! WAL connection per acquisition — concurrent with the writer by construction).

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use rusqlite::Connection;

use crate::error::{EngineError, Result};

use super::schema::{SCHEMA, WAL_PRAGMAS};
use super::writer::Writer;

pub struct Store {
    path: PathBuf,
    writer: Writer,
    write_lock: Mutex<()>,
}

/// Handle returned by [`Store::acquire_write_handle`]. Serializes writes across the process;
/// only one may be outstanding at a time (additional acquisitions block on the store's mutex).
pub struct WriteHandle<'a> {
    writer: &'a Writer,
    _guard: std::sync::MutexGuard<'a, ()>,
}

impl<'a> WriteHandle<'a> {
    pub fn submit<F, T>(&self, f: F) -> T
    where
        F: FnOnce(&mut Connection) -> T + Send + 'static,
        T: Send + 'static,
    {
        self.writer.submit(f)
    }
}

/// Handle returned by [`Store::acquire_read_handle`]. Wraps its own connection so reads proceed
/// concurrently with the single writer (WAL journaling permits this).
pub struct ReadHandle {
    conn: Connection,
}

impl ReadHandle {
    pub fn conn(&self) -> &Connection {
        &self.conn
    }
}

fn apply_pragmas_and_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(WAL_PRAGMAS)?;
    conn.execute_batch(SCHEMA)?;
    Ok(())
}

fn open_connection(path: &Path) -> Result<Connection> {
    Connection::open(path).map_err(|source| EngineError::StorageOpen {
        path: path.to_path_buf(),
        source,
    })
}

impl Store {
    /// Open or create the store at `path`, apply schema (idempotent), configure durability
    /// pragmas, and run crash recovery (spec §4.1).
    pub fn open(path: &Path) -> Result<Store> {
        let conn = open_connection(path)?;
        apply_pragmas_and_schema(&conn).map_err(|source| EngineError::StorageOpen {
            path: path.to_path_buf(),
            source,
        })?;
        let writer = Writer::spawn(conn);
        let store = Store {
            path: path.to_path_buf(),
            writer,
            write_lock: Mutex::new(()),
        };
        store.recover()?;
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn acquire_write_handle(&self) -> WriteHandle<'_> {
        let guard = self.write_lock.lock().expect("store write lock poisoned");
        WriteHandle {
            writer: &self.writer,
            _guard: guard,
        }
    }

    pub fn acquire_read_handle(&self) -> Result<ReadHandle> {
        let conn = open_connection(&self.path)?;
        apply_pragmas_and_schema(&conn).map_err(|source| EngineError::StorageOpen {
            path: self.path.clone(),
            source,
        })?;
        Ok(ReadHandle { conn })
    }

    /// Roll back all `InProgress` copy jobs to `Pending` (attempt count decremented, not below
    /// zero). File Instance rows with a transient error status keep their error. Called once at
    /// open on an existing store.
    fn recover(&self) -> Result<()> {
        let handle = self.acquire_write_handle();
        handle
            .submit(|conn| -> rusqlite::Result<()> {
                conn.execute(
                    "UPDATE CopyJobs SET Status = 'Pending', \
                     AttemptCount = MAX(AttemptCount - 1, 0) \
                     WHERE Status = 'InProgress'",
                    [],
                )?;
                Ok(())
            })
            .map_err(|e| EngineError::StorageIntegrity(e.to_string()))
    }
}
