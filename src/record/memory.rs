//! In-memory segment sink that journals every call, for tests.

use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use super::scheduler::{SegmentOpener, UnitWriter};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Open(u32),
    Write(u32, Vec<u8>, i64),
    Finish(u32),
}

#[derive(Debug, Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<Event>>>);

impl Journal {
    fn push(&self, event: Event) {
        self.0.lock().unwrap().push(event);
    }

    pub fn events(&self) -> Vec<Event> {
        self.0.lock().unwrap().clone()
    }

    /// `(segment, unit, pts)` for every write, in order.
    pub fn writes(&self) -> Vec<(u32, Vec<u8>, i64)> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Write(index, unit, pts) => Some((index, unit, pts)),
                _ => None,
            })
            .collect()
    }
}

#[derive(Debug, Default)]
pub struct MemoryOpener {
    journal: Journal,
    fail_open_at: Option<u32>,
    fail_finish_at: Option<u32>,
    /// Writes left to fail, shared by every writer of this opener.
    failing_writes: Arc<AtomicUsize>,
}

impl MemoryOpener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_at(index: u32) -> Self {
        Self {
            fail_open_at: Some(index),
            ..Self::default()
        }
    }

    pub fn failing_writes(self) -> Self {
        self.failing_writes_times(usize::MAX)
    }

    /// Fail the next `times` writes, then succeed.
    pub fn failing_writes_times(self, times: usize) -> Self {
        self.failing_writes.store(times, Ordering::SeqCst);
        self
    }

    pub fn failing_finish_at(mut self, index: u32) -> Self {
        self.fail_finish_at = Some(index);
        self
    }

    pub fn journal(&self) -> Journal {
        self.journal.clone()
    }
}

impl SegmentOpener for MemoryOpener {
    type Writer = MemoryWriter;

    fn open(&mut self, index: u32) -> io::Result<MemoryWriter> {
        if self.fail_open_at == Some(index) {
            return Err(io::Error::new(io::ErrorKind::PermissionDenied, "read-only"));
        }
        self.journal.push(Event::Open(index));
        Ok(MemoryWriter {
            index,
            journal: self.journal.clone(),
            fail_finish: self.fail_finish_at == Some(index),
            failing_writes: Arc::clone(&self.failing_writes),
        })
    }
}

pub struct MemoryWriter {
    index: u32,
    journal: Journal,
    fail_finish: bool,
    failing_writes: Arc<AtomicUsize>,
}

impl UnitWriter for MemoryWriter {
    fn write_unit(&mut self, unit: &[u8], pts: i64) -> io::Result<()> {
        let failed = self
            .failing_writes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if failed {
            return Err(io::Error::new(io::ErrorKind::WriteZero, "disk full"));
        }
        self.journal
            .push(Event::Write(self.index, unit.to_vec(), pts));
        Ok(())
    }

    fn finish(&mut self) -> io::Result<()> {
        self.journal.push(Event::Finish(self.index));
        if self.fail_finish {
            return Err(io::Error::other("flush failed"));
        }
        Ok(())
    }
}
