//! Raw socket abstraction for the connection stack
//!
//! The board support package provides non-blocking TCP sockets through the traits in
//! this module. Nothing here blocks: reads and writes that cannot make progress return
//! [`Error::WouldBlock`](error::Error::WouldBlock), and the event dispatcher waits for
//! readiness through [`Poll`] before the owning layer tries again.
//!
//! ```text
//!    TLS layer ──read/write──▶ Socket ◀──connect── Connect
//!        ▲                                            │
//!        │ readiness                                  │
//!    Dispatcher ◀──────────── Poll ◀──────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use libiotc::network::{Close, Read, Socket, SocketId, Write};
//! use libiotc::network::error::Error;
//!
//! struct Loopback { id: u32, pending: Vec<u8> }
//!
//! impl Read for Loopback {
//!     type Error = Error;
//!     fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
//!         if self.pending.is_empty() {
//!             return Err(Error::WouldBlock);
//!         }
//!         let len = buf.len().min(self.pending.len());
//!         buf[..len].copy_from_slice(&self.pending[..len]);
//!         self.pending.drain(..len);
//!         Ok(len)
//!     }
//! }
//! # impl Write for Loopback {
//! #     type Error = Error;
//! #     fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> { Ok(buf.len()) }
//! # }
//! # impl Close for Loopback {
//! #     type Error = Error;
//! #     fn close(self) -> Result<(), Self::Error> { Ok(()) }
//! # }
//! # impl Socket for Loopback {
//! #     fn id(&self) -> SocketId { SocketId(self.id) }
//! #     fn finish_connect(&mut self) -> Result<(), Error> { Ok(()) }
//! # }
//! ```

#![allow(missing_docs)]
#![deny(unsafe_code)]

/// Common error types for socket operations
pub mod error;

/// Raw socket layer at the bottom of the connection stack
pub mod io;

use error::Error;

/// Re-exports of common traits
pub mod prelude {
    pub use super::{Close, Connect, Network, Poll, Read, Socket, Write};
}

// Core synchronous traits
pub trait Read {
    /// Associated error type
    type Error: core::fmt::Debug;
    /// Read data from the connection
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error>;
}

pub trait Write {
    /// Associated error type
    type Error: core::fmt::Debug;
    /// Write data to the connection
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error>;
}

pub trait Close {
    /// Associated error type
    type Error: core::fmt::Debug;
    /// Close the connection
    fn close(self) -> Result<(), Self::Error>;
}

/// Identifies a socket towards the readiness poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SocketId(pub u32);

/// A non-blocking TCP socket.
///
/// `read` and `write` return [`Error::WouldBlock`] when they cannot make progress and
/// `Ok(0)` from `read` means the peer closed the stream.
pub trait Socket: Read<Error = Error> + Write<Error = Error> + Close<Error = Error> {
    /// Identifier used in [`PollEntry`].
    fn id(&self) -> SocketId;
    /// Completes a connect once the poll reports `connect_finished`.
    fn finish_connect(&mut self) -> Result<(), Error>;
}

/// Opens sockets.
pub trait Connect {
    /// Associated socket type
    type Socket: Socket;
    /// Starts a non-blocking connect to `host:port`.
    ///
    /// The returned socket may still be connecting; the caller waits for
    /// `connect_finished` before using it.
    fn connect(&mut self, host: &str, port: u16) -> Result<Self::Socket, Error>;
}

/// Socket events a layer waits for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Interest {
    pub read: bool,
    pub write: bool,
    pub connect: bool,
    pub error: bool,
}

impl Interest {
    pub const READ: Interest = Interest { read: true, write: false, connect: false, error: true };
    pub const WRITE: Interest = Interest { read: false, write: true, connect: false, error: true };
    pub const CONNECT: Interest = Interest { read: false, write: false, connect: true, error: true };
    pub const NONE: Interest = Interest { read: false, write: false, connect: false, error: false };

    pub fn is_empty(&self) -> bool {
        !(self.read || self.write || self.connect || self.error)
    }
}

/// What the poll observed on a socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Readiness {
    pub can_read: bool,
    pub can_write: bool,
    pub connect_finished: bool,
    pub error: bool,
}

impl Readiness {
    pub fn any(&self) -> bool {
        self.can_read || self.can_write || self.connect_finished || self.error
    }
}

/// One socket in a readiness poll. The poll fills in `readiness`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollEntry {
    pub socket: SocketId,
    pub interest: Interest,
    pub readiness: Readiness,
}

impl PollEntry {
    pub fn new(socket: SocketId, interest: Interest) -> Self {
        Self { socket, interest, readiness: Readiness::default() }
    }
}

/// Overall outcome of a readiness poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    /// At least one entry is ready.
    Ok,
    /// The timeout elapsed with nothing ready.
    Timeout,
    /// The poll itself failed.
    Error,
}

/// Waits for socket readiness.
pub trait Poll {
    /// Fills in `readiness` for every entry, waiting at most `timeout` seconds.
    ///
    /// `None` waits until something is ready. An empty `entries` slice makes this a
    /// plain sleep.
    fn poll(&mut self, entries: &mut [PollEntry], timeout: Option<u64>) -> PollState;
}

/// Everything the connection stack needs from the network stack.
pub trait Network: Connect + Poll {}

impl<T: Connect + Poll> Network for T {}
