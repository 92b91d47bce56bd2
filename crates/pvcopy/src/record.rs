//! Named master structures behind a reentrant lock.

use std::cell::RefCell;

use parking_lot::{ReentrantMutex, ReentrantMutexGuard};
use pvdata::PVStructure;

/// Guard returned by [`PVRecord::lock`]; `borrow()` reads the master and
/// `borrow_mut()` writes it.
pub type RecordGuard<'a> = ReentrantMutexGuard<'a, RefCell<PVStructure>>;

/// A master structure owned by a named record.
///
/// The lock is reentrant, so code already holding it may call into helpers
/// that lock again.
#[derive(Debug)]
pub struct PVRecord {
    name: String,
    structure: ReentrantMutex<RefCell<PVStructure>>,
}

impl PVRecord {
    pub fn new(name: impl Into<String>, structure: PVStructure) -> Self {
        Self {
            name: name.into(),
            structure: ReentrantMutex::new(RefCell::new(structure)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn lock(&self) -> RecordGuard<'_> {
        self.structure.lock()
    }

    /// Runs `f` on the master while holding the lock.
    pub fn with<R>(&self, f: impl FnOnce(&PVStructure) -> R) -> R {
        let guard = self.lock();
        let master = guard.borrow();
        f(&master)
    }

    /// Runs `f` on the master mutably while holding the lock.
    pub fn with_mut<R>(&self, f: impl FnOnce(&mut PVStructure) -> R) -> R {
        let guard = self.lock();
        let mut master = guard.borrow_mut();
        f(&mut master)
    }
}
