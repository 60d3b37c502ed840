//! Everything the board support package provides, bundled into one bound.

use crate::crypto::Crypto;
use crate::network::Network;
use crate::rng::Rng;
use crate::storage::ResourceStore;
use crate::time::Clock;
use crate::tls::TlsProvider;

/// A complete board support package: sockets with readiness polling, a TLS
/// engine, hashing and signing, a resource store, a clock and a random source.
///
/// Implemented automatically for any type providing all of them.
pub trait Platform: Network + TlsProvider + Crypto + ResourceStore + Clock + Rng {}

impl<T: Network + TlsProvider + Crypto + ResourceStore + Clock + Rng> Platform for T {}
