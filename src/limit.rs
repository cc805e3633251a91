use std::time::{Duration, Instant};

/// Wall-clock budget started at construction. A zero budget is expired immediately.
#[derive(Debug, Clone, Copy)]
pub struct TimeLimit {
    start: Instant,
    limit: Duration,
}

impl TimeLimit {
    pub fn start(limit: Duration) -> TimeLimit {
        TimeLimit { start: Instant::now(), limit }
    }

    #[inline]
    pub fn expired(&self) -> bool {
        self.start.elapsed() >= self.limit
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    pub fn limit(&self) -> Duration {
        self.limit
    }
}
