//! In-memory ledger adapter.

use std::cell::RefCell;
use std::collections::HashMap;

use accord_types::{HashId, ItemState, StateRecord};
use parking_lot::ReentrantMutex;

use crate::domain::LedgerError;
use crate::ports::Ledger;

/// `Ledger` over a process-local row map.
///
/// A reentrant mutex guards the rows so that the row operations invoked
/// from inside a `transaction` closure re-enter the same lock instead of
/// deadlocking; any other thread blocks for the whole transaction, which
/// is what makes commit and rollback atomic with respect to each other.
/// On a failed transaction the pre-transaction rows are restored.
pub struct MemoryLedger {
    rows: ReentrantMutex<RefCell<HashMap<HashId, StateRecord>>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self {
            rows: ReentrantMutex::new(RefCell::new(HashMap::new())),
        }
    }

    /// Number of live rows; test observability.
    pub fn row_count(&self) -> usize {
        self.rows.lock().borrow().len()
    }
}

impl Default for MemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl Ledger for MemoryLedger {
    fn get_record(&self, id: &HashId) -> Result<Option<StateRecord>, LedgerError> {
        let guard = self.rows.lock();
        let rows = guard.borrow();
        Ok(rows.get(id).cloned())
    }

    fn find_or_create(&self, id: &HashId) -> Result<StateRecord, LedgerError> {
        let guard = self.rows.lock();
        let mut rows = guard.borrow_mut();
        Ok(rows
            .entry(id.clone())
            .or_insert_with(|| StateRecord::new(id.clone(), ItemState::Pending))
            .clone())
    }

    fn is_approved(&self, id: &HashId) -> Result<bool, LedgerError> {
        let guard = self.rows.lock();
        let rows = guard.borrow();
        Ok(rows.get(id).is_some_and(|row| row.state == ItemState::Approved))
    }

    fn lock_to_revoke(
        &self,
        owner: &HashId,
        target: &HashId,
    ) -> Result<Option<StateRecord>, LedgerError> {
        let guard = self.rows.lock();
        let mut rows = guard.borrow_mut();
        match rows.get_mut(target) {
            Some(row) if row.state == ItemState::Approved && !row.is_locked() => {
                row.locked_by = Some(owner.clone());
                Ok(Some(row.clone()))
            }
            _ => Ok(None),
        }
    }

    fn create_output_lock(
        &self,
        owner: &HashId,
        target: &HashId,
    ) -> Result<Option<StateRecord>, LedgerError> {
        let guard = self.rows.lock();
        let mut rows = guard.borrow_mut();
        if rows.contains_key(target) {
            return Ok(None);
        }
        let mut row = StateRecord::new(target.clone(), ItemState::LockedForCreation);
        row.locked_by = Some(owner.clone());
        rows.insert(target.clone(), row.clone());
        Ok(Some(row))
    }

    fn save(&self, record: &StateRecord) -> Result<(), LedgerError> {
        let guard = self.rows.lock();
        let mut rows = guard.borrow_mut();
        if record.state == ItemState::LockedForCreation && !record.is_locked() {
            // A released output reservation leaves no trace.
            rows.remove(&record.id);
        } else {
            rows.insert(record.id.clone(), record.clone());
        }
        Ok(())
    }

    fn destroy(&self, id: &HashId) -> Result<(), LedgerError> {
        let guard = self.rows.lock();
        guard.borrow_mut().remove(id);
        Ok(())
    }

    fn transaction(
        &self,
        f: &mut dyn FnMut() -> Result<(), LedgerError>,
    ) -> Result<(), LedgerError> {
        let guard = self.rows.lock();
        let backup = guard.borrow().clone();
        match f() {
            Ok(()) => Ok(()),
            Err(e) => {
                *guard.borrow_mut() = backup;
                Err(e)
            }
        }
    }
}
