use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// A key's mutex and the number of holders plus waiters using it.
#[derive(Default)]
struct Slot {
    mutex: Arc<AsyncMutex<()>>,
    users: usize,
}

type LockMap = Arc<Mutex<HashMap<String, Slot>>>;

/// One async mutex per key, created on demand and dropped with its last
/// user. Serializes work on the same transaction without blocking others.
#[derive(Clone, Default)]
pub struct KeyedLock {
    locks: LockMap,
}

/// Held while the key is locked.
pub struct KeyedGuard {
    // Field order matters: the mutex is released before the slot can go.
    _guard: OwnedMutexGuard<()>,
    _user: SlotUser,
}

/// Counts one holder or waiter. Dropping it, including when a waiting
/// `lock()` future is cancelled, releases the slot once nobody uses it.
struct SlotUser {
    key: String,
    locks: LockMap,
}

impl KeyedLock {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, key: &str) -> KeyedGuard {
        let (mutex, user) = {
            let mut locks = self.locks.lock().expect("keyed lock map lock poisoned");
            let slot = locks.entry(key.to_string()).or_default();
            slot.users += 1;
            let user = SlotUser {
                key: key.to_string(),
                locks: Arc::clone(&self.locks),
            };
            (Arc::clone(&slot.mutex), user)
        };
        let guard = mutex.lock_owned().await;
        KeyedGuard {
            _guard: guard,
            _user: user,
        }
    }

    /// Number of keys currently locked or awaited.
    pub fn len(&self) -> usize {
        self.locks.lock().expect("keyed lock map lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Drop for SlotUser {
    fn drop(&mut self) {
        let mut locks = self.locks.lock().expect("keyed lock map lock poisoned");
        if let Some(slot) = locks.get_mut(&self.key) {
            slot.users -= 1;
            if slot.users == 0 {
                locks.remove(&self.key);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn same_key_is_serialized() {
        let lock = KeyedLock::new();
        let guard = lock.lock("tx").await;

        let waiter = {
            let lock = lock.clone();
            tokio::spawn(async move {
                let _g = lock.lock("tx").await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(guard);
        waiter.await.unwrap();
        assert!(lock.is_empty());
    }

    #[tokio::test]
    async fn different_keys_do_not_block() {
        let lock = KeyedLock::new();
        let _a = lock.lock("a").await;
        let _b = tokio::time::timeout(Duration::from_millis(100), lock.lock("b"))
            .await
            .expect("second key should lock immediately");
        assert_eq!(lock.len(), 2);
    }

    #[tokio::test]
    async fn abandoned_waiter_does_not_leak_its_key() {
        let lock = KeyedLock::new();
        let guard = lock.lock("tx").await;
        let gave_up = tokio::time::timeout(Duration::from_millis(20), lock.lock("tx")).await;
        assert!(gave_up.is_err());
        assert_eq!(lock.len(), 1);

        drop(guard);
        assert!(lock.is_empty());

        // The key is usable again afterwards.
        let _again = lock.lock("tx").await;
        assert_eq!(lock.len(), 1);
    }
}
