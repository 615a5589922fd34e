use std::collections::HashMap;
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Mount state of a single volume.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum MountState {
    #[default]
    Unmounted,
    /// The external mount is in place. Never holds an empty list.
    Mounted(Vec<String>),
}

/// Outcome of releasing one mount reference.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Detached {
    /// The id was not attached; nothing changed.
    NotAttached,
    /// Other ids still hold the mount.
    StillReferenced,
    /// The last reference is gone and the state is back to `Unmounted`.
    LastReference,
}

impl MountState {
    pub fn is_mounted(&self) -> bool {
        matches!(self, MountState::Mounted(_))
    }

    pub fn references(&self) -> &[String] {
        match self {
            MountState::Unmounted => &[],
            MountState::Mounted(refs) => refs,
        }
    }

    /// Records `id` as attached. Attaching an id twice keeps one entry.
    pub fn attach(&mut self, id: &str) {
        match self {
            MountState::Unmounted => *self = MountState::Mounted(vec![id.to_string()]),
            MountState::Mounted(refs) => {
                if !refs.iter().any(|existing| existing == id) {
                    refs.push(id.to_string());
                }
            }
        }
    }

    pub fn detach(&mut self, id: &str) -> Detached {
        let MountState::Mounted(refs) = self else {
            return Detached::NotAttached;
        };
        let Some(index) = refs.iter().position(|existing| existing == id) else {
            return Detached::NotAttached;
        };
        refs.remove(index);
        if refs.is_empty() {
            *self = MountState::Unmounted;
            Detached::LastReference
        } else {
            Detached::StillReferenced
        }
    }
}

/// Per-volume mount states behind per-volume locks.
///
/// The outer lock is only held long enough to find or insert a slot, so a
/// slow helper call on one volume never stalls requests for another. Readers
/// see the last committed state and never wait for a transition in progress.
#[derive(Debug, Default)]
pub struct MountTable {
    slots: Mutex<HashMap<String, Arc<Slot>>>,
}

#[derive(Debug, Default)]
struct Slot {
    /// Held for a whole transition, helper call included.
    transition: Arc<AsyncMutex<()>>,
    committed: Mutex<MountState>,
}

impl Slot {
    fn committed(&self) -> MutexGuard<'_, MountState> {
        self.committed.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl MountTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a transition of `name`, waiting for any transition already running.
    ///
    /// The returned guard derefs to a working copy of the state. The copy is
    /// committed when the guard drops.
    pub async fn lock(&self, name: &str) -> MountGuard<'_> {
        let slot = {
            let mut slots = self.slots();
            Arc::clone(slots.entry(name.to_string()).or_default())
        };
        let transition = Arc::clone(&slot.transition).lock_owned().await;
        let state = slot.committed().clone();
        MountGuard {
            table: self,
            name: name.to_string(),
            slot,
            state,
            _transition: transition,
        }
    }

    /// References of `name` as of the last finished transition.
    pub fn references(&self, name: &str) -> Vec<String> {
        match self.slot(name) {
            Some(slot) => slot.committed().references().to_vec(),
            None => Vec::new(),
        }
    }

    pub fn is_mounted(&self, name: &str) -> bool {
        self.slot(name)
            .is_some_and(|slot| slot.committed().is_mounted())
    }

    fn slot(&self, name: &str) -> Option<Arc<Slot>> {
        self.slots().get(name).cloned()
    }

    fn slots(&self) -> MutexGuard<'_, HashMap<String, Arc<Slot>>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// An in-progress transition of one volume. See [`MountTable::lock`].
#[derive(Debug)]
pub struct MountGuard<'a> {
    table: &'a MountTable,
    name: String,
    slot: Arc<Slot>,
    state: MountState,
    _transition: OwnedMutexGuard<()>,
}

impl Deref for MountGuard<'_> {
    type Target = MountState;

    fn deref(&self) -> &MountState {
        &self.state
    }
}

impl DerefMut for MountGuard<'_> {
    fn deref_mut(&mut self) -> &mut MountState {
        &mut self.state
    }
}

impl Drop for MountGuard<'_> {
    fn drop(&mut self) {
        *self.slot.committed() = self.state.clone();
        if self.state.is_mounted() {
            return;
        }
        // An unmounted slot carries nothing; keep it only while someone else
        // (a queued transition or a reader) still holds it.
        let mut slots = self.table.slots();
        let idle = Arc::strong_count(&self.slot) == 2;
        if idle
            && slots
                .get(&self.name)
                .is_some_and(|current| Arc::ptr_eq(current, &self.slot))
        {
            slots.remove(&self.name);
        }
    }
}
