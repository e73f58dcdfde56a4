//! Process-wide request counters and the `.stats` JSON payload.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

#[derive(Default)]
pub struct Counters {
    requests: AtomicU64,
    granted: AtomicU64,
    rejected: AtomicU64,
}

impl Counters {
    pub fn new() -> Counters {
        Counters::default()
    }

    pub fn record_request(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_granted(&self) {
        self.granted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn requests(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }

    pub fn granted(&self) -> u64 {
        self.granted.load(Ordering::Relaxed)
    }

    pub fn rejected(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }
}

/// The `.stats` response body, encoded as JSON and sent as
/// `stats-coming,<json>`.
///
/// `maxrss` is an integer on platforms where `getrusage` is available and
/// the string `"n/a"` everywhere else, so it is a loosely typed
/// `serde_json::Value` rather than a fixed Rust type — the wire contract is
/// the union, not a Rust enum the client would need to know about.
#[derive(Serialize)]
pub struct Stats {
    pub lock_count: usize,
    pub maxrss: serde_json::Value,
    pub requests_count: u64,
    pub lock_acquired_count: u64,
    pub lock_not_acquired_count: u64,
}

impl Stats {
    pub fn collect(lock_count: usize, counters: &Counters) -> Stats {
        Stats {
            lock_count,
            maxrss: maxrss_value(),
            requests_count: counters.requests(),
            lock_acquired_count: counters.granted(),
            lock_not_acquired_count: counters.rejected(),
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).expect("Stats always serializes")
    }
}

#[cfg(unix)]
fn maxrss_value() -> serde_json::Value {
    // SAFETY: `usage` is zero-initialized and fully populated by
    // `getrusage` before being read; `who` is a valid, well-known constant.
    let usage = unsafe {
        let mut usage: libc::rusage = std::mem::zeroed();
        if libc::getrusage(libc::RUSAGE_SELF, &mut usage) != 0 {
            return serde_json::Value::String("n/a".to_string());
        }
        usage
    };
    serde_json::Value::from(usage.ru_maxrss as i64)
}

#[cfg(not(unix))]
fn maxrss_value() -> serde_json::Value {
    serde_json::Value::String("n/a".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_start_at_zero() {
        let counters = Counters::new();
        assert_eq!(counters.requests(), 0);
        assert_eq!(counters.granted(), 0);
        assert_eq!(counters.rejected(), 0);
    }

    #[test]
    fn counters_increment_independently() {
        let counters = Counters::new();
        counters.record_request();
        counters.record_request();
        counters.record_granted();
        counters.record_rejected();
        assert_eq!(counters.requests(), 2);
        assert_eq!(counters.granted(), 1);
        assert_eq!(counters.rejected(), 1);
    }

    #[test]
    fn stats_json_has_expected_keys() {
        let counters = Counters::new();
        counters.record_request();
        counters.record_granted();
        let stats = Stats::collect(3, &counters);
        let json = stats.to_json();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["lock_count"], 3);
        assert_eq!(value["requests_count"], 1);
        assert_eq!(value["lock_acquired_count"], 1);
        assert_eq!(value["lock_not_acquired_count"], 0);
        assert!(value.get("maxrss").is_some());
    }
}
