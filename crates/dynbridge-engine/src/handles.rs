//! Thread-safe handle table for objects referenced from native code
//!
//! Maps opaque [`BackingHandle`]s to managed objects and keeps each object
//! alive while its handle has outstanding references. Views and the FFI use
//! the process-wide table returned by [`global`].

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use dynbridge_sdk::{BackingHandle, BridgeError, BridgeResult};
use once_cell::sync::Lazy;
use std::any::Any;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Object stored behind a handle
pub type HandleObject = Arc<dyn Any + Send + Sync>;

struct Slot {
    object: HandleObject,
    refs: usize,
}

/// Reference-counted registry mapping handles to managed objects.
///
/// Handles are auto-incrementing u64 IDs starting at 1 and are never reused.
/// Registering the same object twice yields two independent handles.
pub struct HandleTable {
    map: DashMap<u64, Slot>,
    next_id: AtomicU64,
}

impl HandleTable {
    /// Create a new empty table.
    pub fn new() -> Self {
        Self {
            map: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    fn next_handle(&self) -> BackingHandle {
        BackingHandle::from_raw(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Keep `object` alive under a new handle with one reference.
    pub fn register<T: Any + Send + Sync>(&self, object: Arc<T>) -> BackingHandle {
        let handle = self.next_handle();
        self.map.insert(
            handle.as_raw(),
            Slot {
                object,
                refs: 1,
            },
        );
        tracing::trace!(handle = handle.as_raw(), "registered handle");
        handle
    }

    /// Register an object that needs to know its own handle.
    pub fn register_with<T, F>(&self, build: F) -> (BackingHandle, Arc<T>)
    where
        T: Any + Send + Sync,
        F: FnOnce(BackingHandle) -> T,
    {
        let handle = self.next_handle();
        let object = Arc::new(build(handle));
        self.map.insert(
            handle.as_raw(),
            Slot {
                object: object.clone(),
                refs: 1,
            },
        );
        tracing::trace!(handle = handle.as_raw(), "registered handle");
        (handle, object)
    }

    /// Look up the object behind a live handle.
    pub fn resolve(&self, handle: BackingHandle) -> BridgeResult<HandleObject> {
        self.map
            .get(&handle.as_raw())
            .map(|slot| slot.object.clone())
            .ok_or(BridgeError::InvalidHandle(handle.as_raw()))
    }

    /// Look up a live handle and downcast its object.
    ///
    /// A handle to an object of another type is reported as invalid.
    pub fn resolve_as<T: Any + Send + Sync>(
        &self,
        handle: BackingHandle,
    ) -> BridgeResult<Arc<T>> {
        self.resolve(handle)?
            .downcast::<T>()
            .map_err(|_| BridgeError::InvalidHandle(handle.as_raw()))
    }

    /// Add a reference to a live handle.
    pub fn retain(&self, handle: BackingHandle) -> BridgeResult<()> {
        match self.map.get_mut(&handle.as_raw()) {
            Some(mut slot) if slot.refs > 0 => {
                slot.refs += 1;
                Ok(())
            }
            _ => Err(BridgeError::InvalidHandle(handle.as_raw())),
        }
    }

    /// Drop one reference; the object is let go with the last one.
    ///
    /// Releasing a handle that is not live is an error, never a no-op.
    pub fn release(&self, handle: BackingHandle) -> BridgeResult<()> {
        let id = handle.as_raw();
        // Decrement and removal happen under one shard lock, so a handle is
        // never visible with zero references.
        let released = match self.map.entry(id) {
            Entry::Occupied(mut slot) if slot.get().refs > 1 => {
                slot.get_mut().refs -= 1;
                return Ok(());
            }
            Entry::Occupied(slot) => slot.remove(),
            Entry::Vacant(_) => return Err(BridgeError::InvalidHandle(id)),
        };

        // The object is dropped outside the shard lock
        drop(released);
        tracing::trace!(handle = id, "released handle");
        Ok(())
    }

    /// Outstanding references on a handle (0 when not live)
    pub fn ref_count(&self, handle: BackingHandle) -> usize {
        self.map
            .get(&handle.as_raw())
            .map(|slot| slot.refs)
            .unwrap_or(0)
    }

    /// Check if a handle is live
    pub fn is_live(&self, handle: BackingHandle) -> bool {
        self.map.contains_key(&handle.as_raw())
    }

    /// Number of live handles
    pub fn live_count(&self) -> usize {
        self.map.len()
    }
}

impl Default for HandleTable {
    fn default() -> Self {
        Self::new()
    }
}

static GLOBAL: Lazy<HandleTable> = Lazy::new(HandleTable::new);

/// Process-wide handle table
pub fn global() -> &'static HandleTable {
    &GLOBAL
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Barrier;
    use std::thread;

    #[test]
    fn test_register_resolve_release() {
        let table = HandleTable::new();
        let handle = table.register(Arc::new(String::from("payload")));
        assert!(!handle.is_null());

        let object = table.resolve_as::<String>(handle).unwrap();
        assert_eq!(object.as_str(), "payload");

        table.release(handle).unwrap();
        assert_eq!(
            table.resolve(handle).unwrap_err(),
            BridgeError::InvalidHandle(handle.as_raw())
        );
    }

    #[test]
    fn test_never_issued() {
        let table = HandleTable::new();
        assert!(matches!(
            table.resolve(BackingHandle::from_raw(99)),
            Err(BridgeError::InvalidHandle(99))
        ));
        assert!(table.resolve(BackingHandle::NULL).is_err());
        assert!(table.release(BackingHandle::from_raw(99)).is_err());
        assert!(table.retain(BackingHandle::from_raw(99)).is_err());
    }

    #[test]
    fn test_double_release_fails() {
        let table = HandleTable::new();
        let handle = table.register(Arc::new(1u32));
        table.release(handle).unwrap();
        assert!(table.release(handle).is_err());
    }

    #[test]
    fn test_no_deduplication() {
        let table = HandleTable::new();
        let object = Arc::new(7u64);
        let a = table.register(object.clone());
        let b = table.register(object.clone());
        assert_ne!(a, b);

        table.release(a).unwrap();
        assert_eq!(*table.resolve_as::<u64>(b).unwrap(), 7);
    }

    #[test]
    fn test_retain_keeps_alive() {
        let table = HandleTable::new();
        let handle = table.register(Arc::new(5i32));
        table.retain(handle).unwrap();
        assert_eq!(table.ref_count(handle), 2);

        table.release(handle).unwrap();
        assert!(table.is_live(handle));
        table.release(handle).unwrap();
        assert!(!table.is_live(handle));
        assert_eq!(table.ref_count(handle), 0);
    }

    #[test]
    fn test_keep_alive_drops_with_last_release() {
        let table = HandleTable::new();
        let object = Arc::new(vec![1u8, 2, 3]);
        let weak = Arc::downgrade(&object);
        let handle = table.register(object);

        assert!(weak.upgrade().is_some());
        table.release(handle).unwrap();
        assert!(weak.upgrade().is_none());
    }

    #[test]
    fn test_wrong_type_is_invalid() {
        let table = HandleTable::new();
        let handle = table.register(Arc::new(1u8));
        assert!(matches!(
            table.resolve_as::<String>(handle),
            Err(BridgeError::InvalidHandle(_))
        ));
    }

    #[test]
    fn test_register_with_sees_own_handle() {
        let table = HandleTable::new();
        let (handle, object) = table.register_with(|h| h.as_raw());
        assert_eq!(*object, handle.as_raw());
        assert_eq!(table.live_count(), 1);
    }

    #[test]
    fn test_concurrent_churn_no_cross_talk() {
        let table = Arc::new(HandleTable::new());
        let pinned: Vec<_> = (0..16u64)
            .map(|i| (i, table.register(Arc::new(i))))
            .collect();

        let workers: Vec<_> = (0..8u64)
            .map(|t| {
                let table = table.clone();
                thread::spawn(move || {
                    for i in 0..1_000u64 {
                        let value = t * 1_000_000 + i;
                        let handle = table.register(Arc::new(value));
                        assert_eq!(*table.resolve_as::<u64>(handle).unwrap(), value);
                        table.release(handle).unwrap();
                    }
                })
            })
            .collect();

        for worker in workers {
            worker.join().unwrap();
        }

        for (value, handle) in pinned {
            assert_eq!(*table.resolve_as::<u64>(handle).unwrap(), value);
        }
        assert_eq!(table.live_count(), 16);
    }

    #[test]
    fn test_retain_racing_last_release() {
        for _ in 0..500 {
            let table = Arc::new(HandleTable::new());
            let object = Arc::new(42u32);
            let weak = Arc::downgrade(&object);
            let handle = table.register(object);
            let barrier = Arc::new(Barrier::new(2));

            let retainer = {
                let table = table.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    for _ in 0..16 {
                        if table.retain(handle).is_err() {
                            // Dead handles stay dead
                            assert!(table.resolve(handle).is_err());
                            return;
                        }
                        table.release(handle).unwrap();
                    }
                })
            };

            barrier.wait();
            table.release(handle).unwrap();
            retainer.join().unwrap();

            assert!(!table.is_live(handle));
            assert_eq!(table.ref_count(handle), 0);
            assert!(table.retain(handle).is_err());
            assert!(weak.upgrade().is_none());
        }
    }

    #[test]
    fn test_concurrent_releases_never_underflow() {
        for _ in 0..500 {
            let table = Arc::new(HandleTable::new());
            let handle = table.register(Arc::new(7u8));
            table.retain(handle).unwrap();
            let barrier = Arc::new(Barrier::new(3));

            let releasers: Vec<_> = (0..3)
                .map(|_| {
                    let table = table.clone();
                    let barrier = barrier.clone();
                    thread::spawn(move || {
                        barrier.wait();
                        table.release(handle).is_ok()
                    })
                })
                .collect();

            let succeeded = releasers
                .into_iter()
                .map(|releaser| releaser.join().unwrap())
                .filter(|ok| *ok)
                .count();
            assert_eq!(succeeded, 2);
            assert!(!table.is_live(handle));
            assert_eq!(table.live_count(), 0);
        }
    }
}
