//! Monotonic clock provided by the board support package.

/// Monotonic time source with one-second resolution.
pub trait Clock {
    /// Seconds since an arbitrary, fixed origin. Never decreases.
    fn now(&self) -> u64;

    /// Seconds since the Unix epoch, used for credential timestamps.
    ///
    /// Defaults to [`now`](Self::now) for platforms whose monotonic clock is wall time.
    fn unix_time(&self) -> u64 {
        self.now()
    }
}
