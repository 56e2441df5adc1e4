//! In-memory driver for unit tests.

use crate::driver::Driver;
use crate::error::{SessionError, SessionResult};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

#[derive(Default)]
pub(crate) struct MemoryDriver {
    records: Mutex<HashMap<String, String>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    fail_gc: AtomicBool,
    gc_runs: AtomicUsize,
    closed: AtomicBool,
}

impl MemoryDriver {
    pub(crate) fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn fail_gc(&self, fail: bool) {
        self.fail_gc.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn gc_runs(&self) -> usize {
        self.gc_runs.load(Ordering::SeqCst)
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub(crate) fn len(&self) -> usize {
        self.records.lock().len()
    }
}

impl Driver for MemoryDriver {
    fn read(&self, id: &str) -> SessionResult<String> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(SessionError::Io(std::io::Error::other("read failed")));
        }
        self.records
            .lock()
            .get(id)
            .cloned()
            .ok_or_else(|| SessionError::NotFound(id.to_string()))
    }

    fn write(&self, id: &str, data: &str) -> SessionResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(SessionError::Io(std::io::Error::other("disk full")));
        }
        self.records.lock().insert(id.to_string(), data.to_string());
        Ok(())
    }

    fn destroy(&self, id: &str) -> SessionResult<()> {
        self.records.lock().remove(id);
        Ok(())
    }

    fn gc(&self, _max_lifetime_secs: u64) -> SessionResult<()> {
        self.gc_runs.fetch_add(1, Ordering::SeqCst);
        if self.fail_gc.load(Ordering::SeqCst) {
            return Err(SessionError::Io(std::io::Error::other("gc failed")));
        }
        Ok(())
    }

    fn close(&self) -> SessionResult<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}
