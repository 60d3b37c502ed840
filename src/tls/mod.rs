//! # TLS for the connection stack
//!
//! The board support package supplies the TLS engine through [`TlsProvider`] and
//! [`TlsSession`]; the crate never implements cryptography itself. [`TlsLayer`]
//! drives an engine step by step on top of a raw socket:
//!
//! ```text
//!  Init ──▶ LoadingCert ──▶ Connecting ──▶ Handshaking ──▶ Connected
//!             (stat/open/     (socket         (want read /      (encrypted
//!              read/close)     connect)        want write)       read/write)
//!                  │               │               │                 │
//!                  └───────────────┴───────┬───────┴─────────────────┘
//!                                          ▼
//!                                  Closing ──▶ Closed
//! ```
//!
//! Every arrow is taken inside one call; when a step cannot finish the layer
//! returns [`Step::Suspended`](crate::layer::Step::Suspended) naming the socket
//! readiness it waits for, and the connection calls it again once the event loop
//! observed that readiness.
//!
//! ## Implementing a TLS engine
//!
//! ```rust
//! use libiotc::network::{Socket, error::Error};
//! use libiotc::tls::{TlsConfig, TlsError, TlsProvider, TlsSession};
//!
//! /// Forwards bytes unchanged, for bring-up against a plain TCP broker.
//! struct Plain;
//!
//! impl TlsSession for Plain {
//!     fn connect<S: Socket>(&mut self, _socket: &mut S) -> Result<(), TlsError> {
//!         Ok(())
//!     }
//!     fn read<S: Socket>(&mut self, socket: &mut S, buf: &mut [u8]) -> Result<usize, TlsError> {
//!         socket.read(buf).map_err(TlsError::reading)
//!     }
//!     fn write<S: Socket>(&mut self, socket: &mut S, buf: &[u8]) -> Result<usize, TlsError> {
//!         socket.write(buf).map_err(TlsError::writing)
//!     }
//!     fn pending(&self) -> usize {
//!         0
//!     }
//! }
//!
//! struct PlainProvider;
//!
//! impl TlsProvider for PlainProvider {
//!     type Session = Plain;
//!     fn init(&mut self, _config: &TlsConfig<'_>) -> Result<Plain, TlsError> {
//!         Ok(Plain)
//!     }
//! }
//! ```

#![allow(missing_docs)]
#![deny(unsafe_code)]

/// TLS state machine on top of the raw socket
pub mod layer;

pub use layer::{TlsLayer, TlsState};

use crate::error::State;
use crate::network::Socket;
use crate::network::error::Error as SocketError;

/// Outcome of a TLS engine call that did not succeed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlsError {
    /// The engine needs the socket to become readable.
    WantRead,
    /// The engine needs the socket to become writable.
    WantWrite,
    /// The peer certificate did not verify.
    CertError,
    /// The handshake failed for another reason.
    ConnectError,
    ReadError,
    WriteError,
    /// The engine could not be set up, for example from a malformed CA bundle.
    InitError,
    /// The peer closed the connection.
    ConnectionReset,
}

impl TlsError {
    /// Maps a failed socket read. A blocked read waits for readability.
    pub fn reading(error: SocketError) -> Self {
        match error {
            SocketError::WouldBlock => TlsError::WantRead,
            other => TlsError::from_socket(other),
        }
    }

    /// Maps a failed socket write. A blocked write waits for writability.
    pub fn writing(error: SocketError) -> Self {
        match error {
            SocketError::WouldBlock => TlsError::WantWrite,
            other => TlsError::from_socket(other),
        }
    }

    fn from_socket(error: SocketError) -> Self {
        match error {
            SocketError::ConnectionReset | SocketError::NotOpen => TlsError::ConnectionReset,
            SocketError::WriteError => TlsError::WriteError,
            _ => TlsError::ReadError,
        }
    }
}

impl From<TlsError> for State {
    fn from(error: TlsError) -> Self {
        match error {
            TlsError::WantRead => State::WantRead,
            TlsError::WantWrite => State::WantWrite,
            TlsError::CertError => State::TlsFailedCertError,
            TlsError::ConnectError => State::TlsConnect,
            TlsError::ReadError => State::TlsRead,
            TlsError::WriteError => State::TlsWrite,
            TlsError::InitError => State::TlsInitialization,
            TlsError::ConnectionReset => State::ConnectionResetByPeer,
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for TlsError {
    fn format(&self, f: defmt::Formatter) {
        match self {
            TlsError::WantRead => defmt::write!(f, "WantRead"),
            TlsError::WantWrite => defmt::write!(f, "WantWrite"),
            TlsError::CertError => defmt::write!(f, "CertError"),
            TlsError::ConnectError => defmt::write!(f, "ConnectError"),
            TlsError::ReadError => defmt::write!(f, "ReadError"),
            TlsError::WriteError => defmt::write!(f, "WriteError"),
            TlsError::InitError => defmt::write!(f, "InitError"),
            TlsError::ConnectionReset => defmt::write!(f, "ConnectionReset"),
        }
    }
}

/// Parameters for a new TLS session.
#[derive(Debug, Clone, Copy)]
pub struct TlsConfig<'a> {
    /// Server name, used for SNI and certificate verification.
    pub domain: &'a str,
    /// Trusted root certificates as loaded from the resource store.
    pub ca_certificates: &'a [u8],
}

/// Creates TLS sessions.
pub trait TlsProvider {
    /// Session type
    type Session: TlsSession;
    /// Sets up a session. The engine copies whatever it keeps from `config`.
    fn init(&mut self, config: &TlsConfig<'_>) -> Result<Self::Session, TlsError>;
}

/// One TLS session. Every call is non-blocking and may ask to be repeated once
/// the socket is readable or writable.
pub trait TlsSession {
    /// Runs the handshake as far as the socket allows.
    fn connect<S: Socket>(&mut self, socket: &mut S) -> Result<(), TlsError>;
    /// Decrypts application data into `buf`. `Ok(0)` means the peer closed.
    fn read<S: Socket>(&mut self, socket: &mut S, buf: &mut [u8]) -> Result<usize, TlsError>;
    /// Encrypts and sends a prefix of `buf`, returning its length.
    fn write<S: Socket>(&mut self, socket: &mut S, buf: &[u8]) -> Result<usize, TlsError>;
    /// Decrypted bytes buffered inside the engine.
    fn pending(&self) -> usize;
    /// Releases engine resources. Called once when the layer closes.
    fn cleanup(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blocked_socket_maps_by_direction() {
        assert_eq!(TlsError::reading(SocketError::WouldBlock), TlsError::WantRead);
        assert_eq!(TlsError::writing(SocketError::WouldBlock), TlsError::WantWrite);
    }

    #[test]
    fn test_socket_failures_map_alike_in_both_directions() {
        for map in [TlsError::reading, TlsError::writing] {
            assert_eq!(map(SocketError::ConnectionReset), TlsError::ConnectionReset);
            assert_eq!(map(SocketError::NotOpen), TlsError::ConnectionReset);
            assert_eq!(map(SocketError::WriteError), TlsError::WriteError);
            assert_eq!(map(SocketError::ReadError), TlsError::ReadError);
        }
    }
}
