//! # Event engine
//!
//! Everything the client does runs on one thread of control, driven from
//! [`Client::events_process_blocking`](crate::client::Client::events_process_blocking)
//! or [`Client::events_process_tick`](crate::client::Client::events_process_tick).
//! Each loop iteration does the same four things:
//!
//! ```text
//!  ┌──────────────┐   ┌─────────────────┐   ┌──────────────┐   ┌──────────────┐
//!  │ step(now):   │──▶│ drain ready     │──▶│ poll sockets │──▶│ drain ready  │
//!  │ due timers   │   │ queue (events   │   │ (timeout =   │   │ queue again  │
//!  │ → ready      │   │ may queue more) │   │ next timer)  │   │              │
//!  └──────────────┘   └─────────────────┘   └──────────────┘   └──────────────┘
//! ```
//!
//! Time events live in a [`TimeEventHeap`]; the [`Dispatcher`] owns the heap, the
//! ready queue and the socket registrations. The dispatcher is generic over its
//! event type; the client instantiates it with [`Event`].
//!
//! ```rust
//! use libiotc::event::Dispatcher;
//!
//! let mut dispatcher = Dispatcher::new();
//! let mut reminder = dispatcher.execute_in(30, "reminder").unwrap();
//! dispatcher.execute_in(10, "ping").unwrap();
//!
//! dispatcher.step(10).unwrap();
//! assert_eq!(dispatcher.next_ready(), Some("ping"));
//!
//! dispatcher.cancel(&mut reminder).unwrap();
//! assert!(reminder.is_null());
//! assert_eq!(dispatcher.timeout(), None);
//! ```

#![allow(missing_docs)]
#![deny(unsafe_code)]

/// Min-heap of scheduled events
pub mod time_event;

/// Scheduler owning the heap, the ready queue and socket registrations
pub mod dispatcher;

pub use dispatcher::Dispatcher;
pub use time_event::{TimeEventHandle, TimeEventHeap};

use crate::client::{ContextHandle, TimedTaskHandle};
use crate::mqtt::logic::TaskId;

/// Work items the client schedules on its dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// Start connecting a context once its backoff penalty elapsed.
    Connect(ContextHandle),
    /// Drive a context's layer chain one more step.
    Resume(ContextHandle),
    /// A logic task waited too long for its response.
    TaskTimeout(ContextHandle, TaskId),
    /// Time to send a keepalive ping.
    Keepalive(ContextHandle),
    /// Lower the backoff penalty by one step.
    BackoffDecay,
    /// Run a user timed task.
    TimedTask(TimedTaskHandle),
}
