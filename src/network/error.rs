//! Common error types for socket operations

use crate::error::State;

/// Errors reported by the socket traits.
///
/// This enum is kept small and `Copy` so board support packages can return it
/// without allocation in `no_std` environments.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Error {
    /// The operation would block; wait for readiness and retry.
    WouldBlock,
    /// An operation was attempted on a connection that is not open.
    NotOpen,
    /// The host name could not be resolved.
    HostNotFound,
    /// A connection attempt was refused or failed.
    ConnectionRefused,
    /// The peer reset the connection.
    ConnectionReset,
    /// An error occurred during a read operation.
    ReadError,
    /// An error occurred during a write operation.
    WriteError,
    /// The socket could not be shut down cleanly.
    ShutdownError,
}

impl From<Error> for State {
    fn from(error: Error) -> Self {
        match error {
            Error::WouldBlock => State::WantRead,
            Error::NotOpen => State::SocketNoActiveConnection,
            Error::HostNotFound => State::SocketGetHostByName,
            Error::ConnectionRefused => State::SocketConnection,
            Error::ConnectionReset => State::ConnectionResetByPeer,
            Error::ReadError => State::SocketRead,
            Error::WriteError => State::SocketWrite,
            Error::ShutdownError => State::SocketShutdown,
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Error {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Error::WouldBlock => defmt::write!(f, "WouldBlock"),
            Error::NotOpen => defmt::write!(f, "NotOpen"),
            Error::HostNotFound => defmt::write!(f, "HostNotFound"),
            Error::ConnectionRefused => defmt::write!(f, "ConnectionRefused"),
            Error::ConnectionReset => defmt::write!(f, "ConnectionReset"),
            Error::ReadError => defmt::write!(f, "ReadError"),
            Error::WriteError => defmt::write!(f, "WriteError"),
            Error::ShutdownError => defmt::write!(f, "ShutdownError"),
        }
    }
}
