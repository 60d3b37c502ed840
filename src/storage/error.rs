//! Common error types for resource storage

use crate::error::State;

/// A common error type for resource store operations.
///
/// This enum defines the failures a board support package reports from its
/// filesystem or resource table. It is designed to be simple and portable for
/// `no_std` environments.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Error {
    /// No resource with that name and kind exists.
    NotFound,
    /// The resource exists but could not be opened.
    OpenError,
    /// The resource cannot be opened for writing.
    ReadOnly,
    /// An error occurred during a read operation.
    ReadError,
    /// An error occurred during a write operation.
    WriteError,
    /// The handle could not be closed, or was not open.
    CloseError,
    /// The resource could not be removed.
    RemoveError,
    /// The store ran out of handles or space.
    NoMoreResources,
}

impl From<Error> for State {
    fn from(error: Error) -> Self {
        match error {
            Error::NotFound => State::FsResourceNotAvailable,
            Error::OpenError => State::FsOpen,
            Error::ReadOnly => State::FsOpenReadOnly,
            Error::ReadError => State::FsRead,
            Error::WriteError => State::FsWrite,
            Error::CloseError => State::FsClose,
            Error::RemoveError => State::FsRemove,
            Error::NoMoreResources => State::NoMoreResourceAvailable,
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Error {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Error::NotFound => defmt::write!(f, "NotFound"),
            Error::OpenError => defmt::write!(f, "OpenError"),
            Error::ReadOnly => defmt::write!(f, "ReadOnly"),
            Error::ReadError => defmt::write!(f, "ReadError"),
            Error::WriteError => defmt::write!(f, "WriteError"),
            Error::CloseError => defmt::write!(f, "CloseError"),
            Error::RemoveError => defmt::write!(f, "RemoveError"),
            Error::NoMoreResources => defmt::write!(f, "NoMoreResources"),
        }
    }
}
