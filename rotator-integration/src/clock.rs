use chrono::Utc;
use std::sync::{
    Arc,
    atomic::{AtomicI64, Ordering},
};

/// Signed millisecond offset applied to local time before request signing.
///
/// Starts at zero and is re-aligned whenever the venue rejects a request for
/// carrying a timestamp outside its receive window. Cheap to clone; all clones
/// share the same offset.
#[derive(Debug, Clone, Default)]
pub struct Clock {
    offset_ms: Arc<AtomicI64>,
}

impl Clock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current venue-aligned time in milliseconds since the Unix epoch.
    pub fn now_ms(&self) -> i64 {
        Utc::now().timestamp_millis() + self.offset_ms.load(Ordering::Relaxed)
    }

    /// Current offset in milliseconds.
    pub fn offset_ms(&self) -> i64 {
        self.offset_ms.load(Ordering::Relaxed)
    }

    /// Re-align against an observed venue server time, returning the new
    /// offset (`server - local`).
    pub fn align(&self, server_time_ms: i64) -> i64 {
        let offset = server_time_ms - Utc::now().timestamp_millis();
        self.offset_ms.store(offset, Ordering::Relaxed);
        offset
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_align_sets_server_minus_local() {
        let clock = Clock::new();
        assert_eq!(clock.offset_ms(), 0);

        let server = Utc::now().timestamp_millis() + 2_500;
        let offset = clock.align(server);

        // tolerate scheduling slop either side
        assert!((2_400..=2_600).contains(&offset));
        assert!(clock.now_ms() >= server - 100);
    }

    #[test]
    fn test_clones_share_offset() {
        let clock = Clock::new();
        let other = clock.clone();
        clock.align(Utc::now().timestamp_millis() + 10_000);
        assert!(other.offset_ms() > 9_000);
    }
}
