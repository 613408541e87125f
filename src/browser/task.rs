//! Background deletes
//!
//! Deleting a large prefix issues one DEL per key and can take a while. The
//! task runs it on its own thread against a shared browser, reports through
//! a channel, and can be told to stop between keys.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam::channel::{self, Receiver, TryRecvError};
use parking_lot::Mutex;

use super::{Browser, DeleteOutcome, NodeRef};
use crate::error::{KeyscopeError, Result};

/// Handle to a delete running in the background
pub struct DeleteTask {
    node: NodeRef,
    cancel: Arc<AtomicBool>,
    rx: Receiver<Result<DeleteOutcome>>,
    handle: Option<JoinHandle<()>>,
}

/// Start deleting `node` and everything beneath it on a worker thread
///
/// The browser stays locked for the duration of the delete.
pub fn spawn_delete(browser: Arc<Mutex<Browser>>, node: NodeRef) -> DeleteTask {
    let cancel = Arc::new(AtomicBool::new(false));
    let (tx, rx) = channel::bounded(1);

    let flag = Arc::clone(&cancel);
    let handle = thread::spawn(move || {
        let result = browser.lock().delete_cancellable(node, &flag);
        if let Err(e) = &result {
            tracing::warn!(db = node.db, error = %e, "background delete failed");
        }
        // Receiver may be gone if the handle was dropped
        let _ = tx.send(result);
    });

    DeleteTask {
        node,
        cancel,
        rx,
        handle: Some(handle),
    }
}

impl DeleteTask {
    pub fn node(&self) -> NodeRef {
        self.node
    }

    /// Ask the worker to stop before its next key
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }

    /// Non-blocking check for the result
    ///
    /// Returns the result once; later calls report `TaskAborted`.
    pub fn poll(&self) -> Option<Result<DeleteOutcome>> {
        match self.rx.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(KeyscopeError::TaskAborted)),
        }
    }

    /// Block until the worker finishes
    pub fn wait(mut self) -> Result<DeleteOutcome> {
        let result = self.rx.recv().unwrap_or(Err(KeyscopeError::TaskAborted));
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
        result
    }
}

impl Drop for DeleteTask {
    /// A dropped handle stops the worker at its next key
    fn drop(&mut self) {
        self.cancel();
    }
}
