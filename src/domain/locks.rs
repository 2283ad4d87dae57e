//! Per-kid serialization of balance-mutating operations.
//!
//! Toggle, penalty, adjustment and redemption all read then rewrite a kid's
//! point counters; two of them racing on the same kid would lose an update.
//! Every such operation takes that kid's lock for the duration of its
//! read-modify-write.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

#[derive(Clone, Default)]
pub struct KidLocks {
    inner: Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>,
}

impl KidLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the lock for a kid, creating it on first use. The returned `Arc`
    /// must be held in a local so the guard can borrow from it.
    pub fn lock_for(&self, kid_id: &str) -> Arc<Mutex<()>> {
        let mut map = self.inner.lock().unwrap();
        map.entry(kid_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}
