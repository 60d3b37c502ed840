//! # Memory substrate
//!
//! Every variable-length field that crosses a layer boundary (topic names, payloads,
//! client ids, encrypted records, certificate bundles) travels in a [`ByteBuffer`].
//! A buffer either owns its storage or borrows it from the caller:
//!
//! ```text
//!   ByteBuffer::copy_from(&bytes)     ByteBuffer::share(&bytes)
//!   ┌──────────────────────┐         ┌──────────────────────┐
//!   │ Owned(Vec<u8>)       │         │ Borrowed(&'a [u8])   │
//!   │ grows on demand      │         │ read-only view       │
//!   │ freed on drop        │         │ never freed          │
//!   └──────────────────────┘         └──────────────────────┘
//! ```
//!
//! Borrowed buffers are tied to the lifetime of the bytes they view, so a shared
//! buffer can never outlive its source. Appending to a borrowed buffer with resize
//! copies it into owned storage first.
//!
//! ```rust
//! use libiotc::memory::{ByteBuffer, Ownership};
//!
//! let topic = "devices/dev-1/events";
//! let view = ByteBuffer::share_str(topic);
//! assert_eq!(view.ownership(), Ownership::Borrowed);
//!
//! let mut owned = ByteBuffer::with_capacity(4).unwrap();
//! owned.append_with_resize(b"hello").unwrap();
//! assert_eq!(owned.capacity(), 8);
//! assert_eq!(owned.as_slice(), b"hello");
//! ```

#![allow(missing_docs)]
#![deny(unsafe_code)]

/// Growable and shareable byte container.
pub mod buffer;

/// Generation-checked slot table for registries.
pub mod arena;

pub use arena::{Arena, ArenaKey};
pub use buffer::{ByteBuffer, Ownership};
