//! Random number source provided by the board support package.

/// Source of 32-bit random values.
///
/// Backoff jitter draws from it so that a fleet of devices does not reconnect in
/// lockstep. Implementations must not share a constant seed across devices.
pub trait Rng {
    /// Next random value.
    fn random(&mut self) -> u32;
}
