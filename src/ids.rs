use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use chrono::Utc;

/// Millisecond-timestamp ids that never repeat within a process.
///
/// Two calls in the same millisecond get consecutive values instead of the
/// same timestamp.
#[derive(Clone, Debug, Default)]
pub struct IdGenerator {
    last: Arc<AtomicI64>,
}

impl IdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&self) -> i64 {
        let now = Utc::now().timestamp_millis();
        let mut current = self.last.load(Ordering::Relaxed);
        loop {
            let candidate = now.max(current + 1);
            match self.last.compare_exchange_weak(
                current,
                candidate,
                Ordering::SeqCst,
                Ordering::Relaxed,
            ) {
                Ok(_) => return candidate,
                Err(actual) => current = actual,
            }
        }
    }

    pub fn next_string(&self) -> String {
        self.next().to_string()
    }

    /// Raises the floor so ids loaded from storage are never handed out again.
    pub fn observe(&self, id: i64) {
        self.last.fetch_max(id, Ordering::SeqCst);
    }

    pub fn observe_str(&self, id: &str) {
        if let Ok(value) = id.parse::<i64>() {
            self.observe(value);
        }
    }
}
