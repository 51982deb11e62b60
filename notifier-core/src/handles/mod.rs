/*
    handles - Typed integer handles for values that cross the consumer boundary

    Every value handed to the consumer (notifier, snapshot, notification) is
    stored in a HandleTable and referred to by a Handle<T>: a slot index plus
    the generation the slot had when the value was inserted. Removing a value
    bumps the slot's generation, so a handle that was already destroyed, or
    one from a different table kind, is rejected instead of aliasing a newer
    value that reused the slot. A slot whose generation is exhausted is
    retired and never handed out again.

    Raw form: `(generation << 32) | index`, usable as an opaque u64 token.
*/

use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;
use tracing::warn;

/// Errors for handle lookups and destroys
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HandleError {
    /// Handle was destroyed already or never issued by this table
    #[error("Stale {kind} handle {handle:#x}")]
    Stale { kind: &'static str, handle: u64 },
}

/// Typed handle into a `HandleTable<T>`
pub struct Handle<T> {
    index: u32,
    generation: u32,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Handle<T> {
    fn new(index: u32, generation: u32) -> Self {
        Handle { index, generation, _marker: PhantomData }
    }

    /// Opaque integer form
    pub fn raw(&self) -> u64 {
        (u64::from(self.generation) << 32) | u64::from(self.index)
    }

    pub fn from_raw(raw: u64) -> Self {
        Handle::new(raw as u32, (raw >> 32) as u32)
    }
}

impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Handle<T> {}

impl<T> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index && self.generation == other.generation
    }
}

impl<T> Eq for Handle<T> {}

impl<T> Hash for Handle<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.raw().hash(state);
    }
}

impl<T> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handle({}v{})", self.index, self.generation)
    }
}

struct Slot<T> {
    generation: u32,
    value: Option<Arc<T>>,
}

impl<T> Slot<T> {
    /// Advance the generation after the value was taken.
    /// Returns false once the generation is exhausted.
    fn retire(&mut self) -> bool {
        match self.generation.checked_add(1) {
            Some(next) => {
                self.generation = next;
                true
            }
            None => false,
        }
    }
}

struct Slots<T> {
    entries: Vec<Slot<T>>,
    free: Vec<u32>,
    live: usize,
}

/// Owning table of boundary values
pub struct HandleTable<T> {
    kind: &'static str,
    slots: Mutex<Slots<T>>,
}

impl<T> HandleTable<T> {
    /// `kind` names the handle type in errors and logs
    pub fn new(kind: &'static str) -> Self {
        HandleTable { kind, slots: Mutex::new(Slots { entries: Vec::new(), free: Vec::new(), live: 0 }) }
    }

    fn lock(&self) -> MutexGuard<'_, Slots<T>> {
        self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn stale(&self, handle: Handle<T>) -> HandleError {
        HandleError::Stale { kind: self.kind, handle: handle.raw() }
    }

    pub fn insert(&self, value: T) -> Handle<T> {
        self.insert_shared(Arc::new(value))
    }

    /// Store a value that is already reference counted
    pub fn insert_shared(&self, value: Arc<T>) -> Handle<T> {
        let mut slots = self.lock();
        slots.live += 1;

        if let Some(index) = slots.free.pop() {
            let slot = &mut slots.entries[index as usize];
            slot.value = Some(value);
            return Handle::new(index, slot.generation);
        }

        let index = slots.entries.len() as u32;
        slots.entries.push(Slot { generation: 0, value: Some(value) });
        Handle::new(index, 0)
    }

    pub fn get(&self, handle: Handle<T>) -> Result<Arc<T>, HandleError> {
        let slots = self.lock();
        slots
            .entries
            .get(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.value.clone())
            .ok_or_else(|| self.stale(handle))
    }

    /// Destroy a handle and return the value it owned.
    ///
    /// Each handle can be destroyed exactly once.
    pub fn remove(&self, handle: Handle<T>) -> Result<Arc<T>, HandleError> {
        let mut slots = self.lock();

        let value = slots
            .entries
            .get_mut(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| {
                let value = slot.value.take()?;
                let reusable = slot.retire();
                Some((value, reusable))
            });

        match value {
            Some((value, reusable)) => {
                if reusable {
                    slots.free.push(handle.index);
                }
                slots.live -= 1;
                Ok(value)
            }
            None => {
                warn!(kind = self.kind, handle = ?handle, "destroy of stale handle");
                Err(self.stale(handle))
            }
        }
    }

    /// Destroy every live handle and return the values they owned
    pub fn drain(&self) -> Vec<Arc<T>> {
        let mut guard = self.lock();
        let slots = &mut *guard;

        let mut drained = Vec::with_capacity(slots.live);
        for (index, slot) in slots.entries.iter_mut().enumerate() {
            if let Some(value) = slot.value.take() {
                if slot.retire() {
                    slots.free.push(index as u32);
                }
                drained.push(value);
            }
        }
        slots.live = 0;
        drained
    }

    /// Number of live handles
    pub fn len(&self) -> usize {
        self.lock().live
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
