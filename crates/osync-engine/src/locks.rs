//! Per-order single-writer guard.
//!
//! A claim on a source order id is held for as long as the returned guard
//! lives. A second claim on the same id fails instead of waiting.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Clone, Default)]
pub struct InFlight {
    ids: Arc<Mutex<HashSet<String>>>,
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `ms1_order_id`, or `None` if another task holds it.
    pub fn try_claim(&self, ms1_order_id: &str) -> Option<InFlightGuard> {
        let mut ids = lock(&self.ids);
        if !ids.insert(ms1_order_id.to_string()) {
            return None;
        }
        Some(InFlightGuard {
            ids: Arc::clone(&self.ids),
            ms1_order_id: ms1_order_id.to_string(),
        })
    }

    pub fn is_claimed(&self, ms1_order_id: &str) -> bool {
        lock(&self.ids).contains(ms1_order_id)
    }

    pub fn len(&self) -> usize {
        lock(&self.ids).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The set holds plain ids; a panic elsewhere cannot leave it inconsistent.
fn lock(ids: &Mutex<HashSet<String>>) -> MutexGuard<'_, HashSet<String>> {
    ids.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Debug)]
pub struct InFlightGuard {
    ids: Arc<Mutex<HashSet<String>>>,
    ms1_order_id: String,
}

impl InFlightGuard {
    pub fn ms1_order_id(&self) -> &str {
        &self.ms1_order_id
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        lock(&self.ids).remove(&self.ms1_order_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_claim_fails_until_guard_dropped() {
        let inflight = InFlight::new();
        let g = inflight.try_claim("o-1").expect("first claim");
        assert!(inflight.try_claim("o-1").is_none());
        assert!(inflight.try_claim("o-2").is_some());
        assert!(inflight.is_claimed("o-1"));
        drop(g);
        assert!(!inflight.is_claimed("o-1"));
        assert!(inflight.try_claim("o-1").is_some());
    }
}
