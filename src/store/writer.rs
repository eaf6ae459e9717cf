//! Single writer actor: all mutating statements funnel through one dedicated thread, so the
//! store stays single-writer even though many readers (each with their own WAL connection)
//! may be querying concurrently. Mirrors the teacher's discipline of routing all mutation
//! through one connection while keeping reads unblocked, generalized here into an explicit
//! actor thread with a request/response channel per spec §4.1.

use std::thread::JoinHandle;

use crossbeam_channel::{Sender, unbounded};
use rusqlite::Connection;

type WriteJob = Box<dyn FnOnce(&mut Connection) + Send>;

pub(crate) struct Writer {
    sender: Option<Sender<WriteJob>>,
    handle: Option<JoinHandle<()>>,
}

impl Writer {
    pub(crate) fn spawn(mut conn: Connection) -> Writer {
        let (sender, receiver) = unbounded::<WriteJob>();
        let handle = std::thread::Builder::new()
            .name("mediavault-store-writer".into())
            .spawn(move || {
                while let Ok(job) = receiver.recv() {
                    job(&mut conn);
                }
            })
            .expect("spawn store writer thread");
        Writer {
            sender: Some(sender),
            handle: Some(handle),
        }
    }

    /// Run `f` on the writer thread's connection and block for the result.
    pub(crate) fn submit<F, T>(&self, f: F) -> T
    where
        F: FnOnce(&mut Connection) -> T + Send + 'static,
        T: Send + 'static,
    {
        let (result_tx, result_rx) = std::sync::mpsc::channel();
        let job: WriteJob = Box::new(move |conn| {
            let result = f(conn);
            let _ = result_tx.send(result);
        });
        self.sender
            .as_ref()
            .expect("writer not yet shut down")
            .send(job)
            .expect("store writer thread is alive");
        result_rx.recv().expect("store writer replied")
    }
}

impl Drop for Writer {
    fn drop(&mut self) {
        // Drop the sender first so the writer thread's `recv()` loop observes a closed channel
        // and exits; only then join, so we don't block forever on a thread still waiting for work.
        self.sender.take();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
