//! Cooperative cancellation (spec §5 "Cancellation and timeouts").
//!
//! A [`CancelToken`] is checked between iterations and around each tool
//! dispatch; it is never used to forcibly abort an in-flight future. A
//! [`CancelMap`] lets a caller (e.g. a CLI "cancel this turn" command) reach
//! a token by `task_id` without holding onto the loop runner itself.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

#[derive(Clone)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        CancelToken { flag: Arc::new(AtomicBool::new(false)) }
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Default)]
pub struct CancelMap {
    inner: Mutex<HashMap<String, CancelToken>>,
}

impl CancelMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a fresh token for `task_id`, replacing any prior one.
    pub fn register(&self, task_id: impl Into<String>) -> CancelToken {
        let token = CancelToken::new();
        self.inner.lock().insert(task_id.into(), token.clone());
        token
    }

    pub fn cancel(&self, task_id: &str) -> bool {
        match self.inner.lock().get(task_id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn remove(&self, task_id: &str) {
        self.inner.lock().remove(task_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_flips_the_flag() {
        let token = CancelToken::new();
        assert!(!token.is_cancelled());
        token.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn map_cancel_reaches_the_registered_token() {
        let map = CancelMap::new();
        let token = map.register("t1");
        assert!(map.cancel("t1"));
        assert!(token.is_cancelled());
    }

    #[test]
    fn cancel_of_unknown_task_is_a_noop_false() {
        let map = CancelMap::new();
        assert!(!map.cancel("missing"));
    }
}
