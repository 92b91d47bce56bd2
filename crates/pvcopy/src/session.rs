//! A client connection's view of one record.

use std::cell::RefCell;
use std::sync::Arc;

use parking_lot::ReentrantMutex;
use pvdata::{BitSet, PVStructure, PvDataError};

use crate::copy::PVCopy;
use crate::error::CopyError;
use crate::record::PVRecord;

#[derive(Debug)]
struct SessionState {
    structure: PVStructure,
    changed: BitSet,
    initialized: bool,
}

/// One request against one record, as a get, put or monitor handler holds
/// it.
///
/// Every call takes the session's own lock first and the record's lock
/// second, so concurrent sessions on the same record cannot deadlock and
/// each call sees a consistent master.
#[derive(Debug)]
pub struct CopySession {
    record: Arc<PVRecord>,
    copy: PVCopy,
    state: ReentrantMutex<RefCell<SessionState>>,
}

impl CopySession {
    /// Parses `request` and builds the session's copy from the record's
    /// current master.
    pub fn connect(
        record: Arc<PVRecord>,
        request: &str,
        structure_name: &str,
    ) -> Result<Self, CopyError> {
        let copy = record.with(|master| PVCopy::create_from_str(master, request, structure_name))?;
        let state = SessionState {
            structure: copy.create_instance(),
            changed: BitSet::with_capacity(copy.copy_structure().number_fields()),
            initialized: false,
        };
        Ok(Self {
            record,
            copy,
            state: ReentrantMutex::new(RefCell::new(state)),
        })
    }

    pub fn record(&self) -> &PVRecord {
        &self.record
    }

    pub fn pv_copy(&self) -> &PVCopy {
        &self.copy
    }

    /// Whether the request asked for the record to be processed on put.
    pub fn process_requested(&self) -> bool {
        self.copy
            .record_options()
            .and_then(|options| options.get("process"))
            .is_some_and(|value| value == "true")
    }

    /// Brings the session's copy up to date and returns it with the offsets
    /// that changed. The first poll returns everything, with bit 0 set.
    pub fn poll(&self) -> Result<(PVStructure, BitSet), CopyError> {
        let local = self.state.lock();
        let mut state = local.borrow_mut();
        let guard = self.record.lock();
        let master = guard.borrow();

        let SessionState {
            structure,
            changed,
            initialized,
        } = &mut *state;
        if *initialized {
            changed.clear_all();
            self.copy.update_copy_set_bitset(&master, structure, changed)?;
        } else {
            self.copy.init(&master, structure, changed)?;
            *initialized = true;
        }
        Ok((structure.clone(), changed.clone()))
    }

    /// Writes the fields of `data` marked in `changed` into the master.
    ///
    /// `data` must be an instance of the session's copy schema.
    pub fn put(&self, data: &PVStructure, changed: &BitSet) -> Result<(), CopyError> {
        if data.field() != self.copy.copy_structure().field() {
            return Err(PvDataError::ShapeMismatch {
                dst: self.record.name().to_string(),
                src: data.field().type_name(),
            }
            .into());
        }
        let _local = self.state.lock();
        let guard = self.record.lock();
        let mut master = guard.borrow_mut();
        let mut bits = changed.clone();
        self.copy.update_master(&mut master, data, &mut bits)
    }
}
