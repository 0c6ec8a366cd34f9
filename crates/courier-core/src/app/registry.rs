//! CycleRegistry - instance ごとの history sync worker のキャンセルハンドル
//!
//! 生の map は外に出さず、`acquire` / `replace` / `release`（と cycle 指定の `release_cycle`）だけを公開します。
//! ロックはどの操作でも map へのアクセスの間だけ保持し、await を跨ぎません。

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio_util::sync::CancellationToken;

use crate::domain::{CycleId, InstanceId};

/// Cancellation handle of one running cycle worker.
#[derive(Debug, Clone)]
pub struct CycleHandle {
    cycle_id: CycleId,
    token: CancellationToken,
}

impl CycleHandle {
    pub fn new(cycle_id: CycleId) -> Self {
        Self {
            cycle_id,
            token: CancellationToken::new(),
        }
    }

    pub fn cycle_id(&self) -> CycleId {
        self.cycle_id
    }

    /// Token the worker waits on.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

#[derive(Debug, Default)]
pub struct CycleRegistry {
    handles: Mutex<HashMap<InstanceId, CycleHandle>>,
}

impl CycleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    // map の更新は単一操作なので、poison されても中身は一貫している
    fn lock(&self) -> MutexGuard<'_, HashMap<InstanceId, CycleHandle>> {
        self.handles.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current handle for the instance, if a worker is live.
    pub fn acquire(&self, instance_id: &InstanceId) -> Option<CycleHandle> {
        self.lock().get(instance_id).cloned()
    }

    /// Install `handle`, cancelling and returning the one it displaces.
    /// At most one live worker per instance.
    pub fn replace(&self, instance_id: InstanceId, handle: CycleHandle) -> Option<CycleHandle> {
        let previous = self.lock().insert(instance_id, handle);
        if let Some(prev) = &previous {
            prev.cancel();
        }
        previous
    }

    /// Remove and cancel the instance's handle. `None` when nothing was live,
    /// which makes repeated releases no-ops.
    pub fn release(&self, instance_id: &InstanceId) -> Option<CycleHandle> {
        let removed = self.lock().remove(instance_id);
        if let Some(handle) = &removed {
            handle.cancel();
        }
        removed
    }

    /// Like `release`, but only when the live handle belongs to `cycle_id`.
    /// A newer cycle's handle is left alone.
    pub fn release_cycle(&self, instance_id: &InstanceId, cycle_id: CycleId) -> Option<CycleHandle> {
        let mut handles = self.lock();
        if handles.get(instance_id).map(CycleHandle::cycle_id) != Some(cycle_id) {
            return None;
        }
        let removed = handles.remove(instance_id);
        drop(handles);
        if let Some(handle) = &removed {
            handle.cancel();
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ulid::Ulid;

    fn cycle() -> CycleId {
        CycleId::from_ulid(Ulid::new())
    }

    #[test]
    fn replace_cancels_previous_handle() {
        let registry = CycleRegistry::new();
        let id = InstanceId::new("A");
        let first = CycleHandle::new(cycle());
        let second = CycleHandle::new(cycle());

        assert!(registry.replace(id.clone(), first.clone()).is_none());
        let displaced = registry.replace(id.clone(), second.clone()).unwrap();

        assert_eq!(displaced.cycle_id(), first.cycle_id());
        assert!(first.is_cancelled());
        assert!(!second.is_cancelled());
        assert_eq!(
            registry.acquire(&id).map(|h| h.cycle_id()),
            Some(second.cycle_id())
        );
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn release_is_idempotent() {
        let registry = CycleRegistry::new();
        let id = InstanceId::new("A");
        let handle = CycleHandle::new(cycle());
        registry.replace(id.clone(), handle.clone());

        assert!(registry.release(&id).is_some());
        assert!(handle.is_cancelled());
        assert!(registry.release(&id).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn release_cycle_spares_a_newer_handle() {
        let registry = CycleRegistry::new();
        let id = InstanceId::new("A");
        let old = cycle();
        let newer = CycleHandle::new(cycle());
        registry.replace(id.clone(), newer.clone());

        assert!(registry.release_cycle(&id, old).is_none());
        assert!(!newer.is_cancelled());

        assert!(registry.release_cycle(&id, newer.cycle_id()).is_some());
        assert!(newer.is_cancelled());
        assert!(registry.is_empty());
    }

    #[test]
    fn instances_are_independent() {
        let registry = CycleRegistry::new();
        let a = CycleHandle::new(cycle());
        let b = CycleHandle::new(cycle());
        registry.replace(InstanceId::new("A"), a.clone());
        registry.replace(InstanceId::new("B"), b.clone());

        registry.release(&InstanceId::new("A"));
        assert!(a.is_cancelled());
        assert!(!b.is_cancelled());
        assert!(registry.acquire(&InstanceId::new("B")).is_some());
    }
}
