//! Outcome of one step of a layer state machine.
//!
//! Layers never block. Each entry point runs until it either finishes or needs the
//! socket to become ready, and reports which through [`Step`]. The connection re-enters
//! the layer from the event loop once the awaited readiness is observed; the layer's
//! own state enum records where to pick up.

use crate::network::Interest;

/// Why a layer stopped before finishing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Suspend {
    /// Resume once the socket is readable.
    WantRead,
    /// Resume once the socket is writable.
    WantWrite,
    /// Resume once the socket finished connecting.
    WantConnect,
    /// Resume on the next loop iteration.
    Yield,
}

impl Suspend {
    /// Socket interest to register while suspended.
    pub fn interest(self) -> Interest {
        match self {
            Suspend::WantRead => Interest::READ,
            Suspend::WantWrite => Interest::WRITE,
            Suspend::WantConnect => Interest::CONNECT,
            Suspend::Yield => Interest::NONE,
        }
    }
}

/// Result of driving a layer one step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step<T> {
    /// The layer is waiting; call it again after the given condition.
    Suspended(Suspend),
    /// The operation finished.
    Done(T),
}

impl<T> Step<T> {
    /// `true` when the operation finished.
    pub fn is_done(&self) -> bool {
        matches!(self, Step::Done(_))
    }

    /// Maps the finished value, keeping a suspension as is.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Step<U> {
        match self {
            Step::Suspended(reason) => Step::Suspended(reason),
            Step::Done(value) => Step::Done(f(value)),
        }
    }
}
