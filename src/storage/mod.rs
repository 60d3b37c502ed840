//! # Resource storage for credentials and certificates
//!
//! The connection stack reads its CA bundle, and embedders may read credentials or
//! configuration, from a resource store supplied by the board support package. A
//! store can be a real filesystem, a flash partition or a table compiled into the
//! firmware.
//!
//! # Architecture Overview
//!
//! ```text
//! ┌─────────────────┐        ┌──────────────────────┐
//! │    TLS layer    │ step() │   ResourceManager    │  stat → open → read… → close
//! │ (loading CA)    │───────▶│  one call per step   │
//! └─────────────────┘        └──────────┬───────────┘
//!                                       │ ResourceStore
//!                  ┌────────────────────┼────────────────────┐
//!                  ▼                    ▼                    ▼
//!          ┌──────────────┐     ┌──────────────┐     ┌──────────────┐
//!          │ MemoryStore  │     │  Filesystem  │     │    Flash     │
//!          └──────────────┘     └──────────────┘     └──────────────┘
//! ```
//!
//! [`ResourceStore::read`] hands out chunks that may point straight into
//! compiled-in memory. They are borrowed from the store, so the
//! [`ResourceManager`] copies them into a buffer it owns before the next call.
//!
//! # Usage Examples
//!
//! ```rust
//! use libiotc::layer::Step;
//! use libiotc::storage::{MemoryStore, ResourceKind, ResourceManager};
//!
//! static ROOTS: &[u8] = b"-----BEGIN CERTIFICATE-----";
//!
//! let mut store = MemoryStore::new(8);
//! store.insert_static(ResourceKind::Certificate, "roots.pem", ROOTS).unwrap();
//!
//! let mut loader = ResourceManager::new(ResourceKind::Certificate, "roots.pem").unwrap();
//! let bundle = loop {
//!     match loader.step(&mut store).unwrap() {
//!         Step::Done(buffer) => break buffer,
//!         Step::Suspended(_) => continue,
//!     }
//! };
//! assert_eq!(bundle.as_slice(), ROOTS);
//! ```

#![allow(missing_docs)]
#![deny(unsafe_code)]

/// Common error types for storage operations
pub mod error;

/// Step-wise resource loader
pub mod manager;

/// In-memory resource store
pub mod memory;

pub use error::Error;
pub use manager::{LoadStage, ResourceManager};
pub use memory::MemoryStore;

/// Re-exports of common traits for convenient importing
pub mod prelude {
    pub use super::{ResourceKind, ResourceStore};
}

/// Namespaces of the resource store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    /// Root CA bundles.
    Certificate,
    /// Device keys and other secrets.
    Credentials,
    /// Configuration documents.
    ConfigData,
}

#[cfg(feature = "defmt")]
impl defmt::Format for ResourceKind {
    fn format(&self, f: defmt::Formatter) {
        match self {
            ResourceKind::Certificate => defmt::write!(f, "Certificate"),
            ResourceKind::Credentials => defmt::write!(f, "Credentials"),
            ResourceKind::ConfigData => defmt::write!(f, "ConfigData"),
        }
    }
}

/// How a resource is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    Read,
    Write,
}

/// Metadata returned by [`ResourceStore::stat`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceStat {
    /// Size in bytes.
    pub size: usize,
}

/// An open resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResourceHandle(pub u32);

/// Resource store provided by the board support package.
///
/// # Examples
///
/// ```rust
/// use libiotc::storage::{ResourceKind, ResourceStore};
///
/// fn certificate_size<S: ResourceStore>(store: &mut S) -> Option<usize> {
///     store
///         .stat(ResourceKind::Certificate, "roots.pem")
///         .ok()
///         .map(|stat| stat.size)
/// }
/// ```
pub trait ResourceStore {
    /// Size of a resource.
    fn stat(&mut self, kind: ResourceKind, name: &str) -> Result<ResourceStat, Error>;

    /// Opens a resource.
    fn open(&mut self, kind: ResourceKind, name: &str, mode: OpenMode) -> Result<ResourceHandle, Error>;

    /// Next chunk starting at `offset`. An empty chunk marks the end.
    ///
    /// The chunk is borrowed from the store and stays valid until the next call.
    fn read(&mut self, handle: ResourceHandle, offset: usize) -> Result<&[u8], Error>;

    /// Writes `data` at `offset`, returning the number of bytes written.
    fn write(&mut self, handle: ResourceHandle, offset: usize, data: &[u8]) -> Result<usize, Error>;

    /// Closes a handle.
    fn close(&mut self, handle: ResourceHandle) -> Result<(), Error>;

    /// Deletes a resource.
    fn remove(&mut self, kind: ResourceKind, name: &str) -> Result<(), Error>;
}
