//! State-delta overlay: stages operate against an overlay that can be discarded wholesale on
//! failure, and committed atomically on success. Services get a finer-grained overlay of their
//! own so accumulation can snapshot only the service ids it actually touches.

use std::collections::BTreeMap;

use crate::state::components::JamState;
use crate::state::service::ServiceAccount;
use crate::types::ServiceId;

/// A whole-state overlay: every component is copied eagerly into `prime` when the importer
/// allocates the overlay (component maps are small enough that copy-on-write per field is not
/// worth the added complexity; the overlay still gives the required all-or-nothing
/// commit/rollback semantics).
pub struct StateOverlay<'base> {
    base: &'base JamState,
    prime: JamState,
}

impl<'base> StateOverlay<'base> {
    pub fn new(base: &'base JamState) -> Self {
        Self {
            base,
            prime: base.clone(),
        }
    }

    pub fn base(&self) -> &JamState {
        self.base
    }

    pub fn current(&self) -> &JamState {
        &self.prime
    }

    pub fn current_mut(&mut self) -> &mut JamState {
        &mut self.prime
    }

    /// Discards the overlay; the base state is left untouched (any stage failure aborts the
    /// block; no partial state is committed).
    pub fn rollback(self) {}

    /// Commits the overlay, returning the new state (on commit, the overlay replaces the base).
    pub fn commit(self) -> JamState {
        self.prime
    }
}

/// A service-delta snapshot: copies only the service ids an accumulation or on-transfer
/// invocation actually touches. Committing merges the snapshot back into `δ` in ascending
/// service id order, which is what keeps concurrent accumulation deterministic.
#[derive(Debug, Clone, Default)]
pub struct ServiceDeltaSnapshot {
    touched: BTreeMap<ServiceId, Option<ServiceAccount>>,
}

impl ServiceDeltaSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads a service, preferring the snapshot over the base table.
    pub fn get<'a>(&'a self, base: &'a super::service::ServiceTable, id: ServiceId) -> Option<&'a ServiceAccount> {
        match self.touched.get(&id) {
            Some(Some(account)) => Some(account),
            Some(None) => None,
            None => base.get(&id),
        }
    }

    /// Copy-on-write fetch: clones the base account into the snapshot the
    /// first time it is touched, then returns a mutable reference to the
    /// snapshot copy.
    pub fn get_mut<'a>(
        &'a mut self,
        base: &super::service::ServiceTable,
        id: ServiceId,
    ) -> Option<&'a mut ServiceAccount> {
        if !self.touched.contains_key(&id) {
            let cloned = base.get(&id).cloned();
            self.touched.insert(id, cloned);
        }
        self.touched.get_mut(&id).and_then(|slot| slot.as_mut())
    }

    pub fn insert(&mut self, id: ServiceId, account: ServiceAccount) {
        self.touched.insert(id, Some(account));
    }

    pub fn remove(&mut self, id: ServiceId) {
        self.touched.insert(id, None);
    }

    /// Merges this snapshot into `δ` in ascending service id order.
    pub fn merge_into(self, table: &mut super::service::ServiceTable) {
        for (id, slot) in self.touched {
            match slot {
                Some(account) => {
                    table.insert(id, account);
                }
                None => {
                    table.remove(&id);
                }
            }
        }
    }
}
