//! # Reconnect backoff
//!
//! Every connection outcome feeds [`Backoff::update`]. Failures raise a penalty
//! index into the backoff table; each raise (re)schedules a decay event that lowers
//! the index again one step at a time, so a device that stays healthy slowly earns
//! back short reconnect delays while a flapping one keeps waiting longer.
//!
//! ```text
//!   index    0    1    2    3    4 ...
//!   backoff  0s   2s   4s   8s  16s ...      delay before the next connect
//!   decay    4s   4s   8s  16s  30s ...      time until the index drops by one
//! ```
//!
//! Errors are partitioned by [`classify`]: rejections that cannot succeed on retry
//! (bad credentials, wrong protocol version, a reset connection) are
//! [`BackoffClass::Terminal`] and stop automatic reconnects.

use heapless::Vec;
use log::debug;

use crate::error::State;
use crate::event::{Dispatcher, Event, TimeEventHandle};
use crate::rng::Rng;

/// Longest supported backoff table.
pub const MAX_BACKOFF_STEPS: usize = 16;

/// Default delays before a reconnect attempt, in seconds.
pub const DEFAULT_BACKOFF_TABLE: [u32; 10] = [0, 2, 4, 8, 16, 32, 64, 128, 256, 512];

/// Default time spent at each index before decaying, in seconds.
pub const DEFAULT_DECAY_TABLE: [u32; 10] = [4, 4, 8, 16, 30, 30, 30, 30, 30, 30];

/// How the last outcome affects reconnecting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackoffClass {
    /// The last outcome was a success.
    None,
    /// A retry after the penalty may succeed.
    Recoverable,
    /// Retrying cannot help.
    Terminal,
}

#[cfg(feature = "defmt")]
impl defmt::Format for BackoffClass {
    fn format(&self, f: defmt::Formatter) {
        match self {
            BackoffClass::None => defmt::write!(f, "None"),
            BackoffClass::Recoverable => defmt::write!(f, "Recoverable"),
            BackoffClass::Terminal => defmt::write!(f, "Terminal"),
        }
    }
}

/// Partitions states into backoff classes. Anything not listed is recoverable.
pub fn classify(state: State) -> BackoffClass {
    match state {
        State::Ok | State::Written => BackoffClass::None,
        State::ConnectionResetByPeer
        | State::MqttUnacceptableProtocolVersion
        | State::MqttIdentifierRejected
        | State::MqttBadUsernameOrPassword
        | State::MqttNotAuthorized => BackoffClass::Terminal,
        _ => BackoffClass::Recoverable,
    }
}

/// Penalty state shared by every context of a client.
#[derive(Debug)]
pub struct Backoff {
    backoff: Vec<u32, MAX_BACKOFF_STEPS>,
    decay: Vec<u32, MAX_BACKOFF_STEPS>,
    index: usize,
    class: BackoffClass,
    decay_event: TimeEventHandle,
}

impl Backoff {
    /// Builds the policy from parallel tables.
    ///
    /// The tables must be non-empty, of equal length and at most
    /// [`MAX_BACKOFF_STEPS`] long; anything else is [`State::InvalidParameter`].
    pub fn new(backoff: &[u32], decay: &[u32]) -> Result<Self, State> {
        if backoff.is_empty() || backoff.len() != decay.len() {
            return Err(State::InvalidParameter);
        }
        Ok(Self {
            backoff: Vec::from_slice(backoff).map_err(|_| State::InvalidParameter)?,
            decay: Vec::from_slice(decay).map_err(|_| State::InvalidParameter)?,
            index: 0,
            class: BackoffClass::None,
            decay_event: TimeEventHandle::null(),
        })
    }

    /// Current position in the backoff table.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Class of the last recorded outcome.
    pub fn class(&self) -> BackoffClass {
        self.class
    }

    /// Handle of the pending decay event, null when none was ever scheduled.
    pub fn decay_event(&self) -> &TimeEventHandle {
        &self.decay_event
    }

    /// Records an outcome.
    ///
    /// Failures raise the index, bounded by the table length, and push the decay
    /// event out to the decay time of the new index. A success leaves both the
    /// index and any pending decay event alone.
    pub fn update(&mut self, state: State, dispatcher: &mut Dispatcher<Event>) -> Result<BackoffClass, State> {
        self.class = classify(state);
        if self.class == BackoffClass::None {
            return Ok(self.class);
        }
        self.index = (self.index + 1).min(self.backoff.len() - 1);
        let delay = u64::from(self.decay[self.index]);
        if dispatcher.is_scheduled(&self.decay_event) {
            dispatcher.restart(&self.decay_event, delay)?;
        } else {
            self.decay_event = dispatcher.execute_in(delay, Event::BackoffDecay)?;
        }
        debug!("backoff {:?} after {:?}, index {}", self.class, state, self.index);
        Ok(self.class)
    }

    /// Handles a fired decay event: one step down, and another decay event while
    /// the index is above zero.
    pub fn decay(&mut self, dispatcher: &mut Dispatcher<Event>) -> Result<(), State> {
        self.index = self.index.saturating_sub(1);
        if self.index > 0 {
            let delay = u64::from(self.decay[self.index]);
            self.decay_event = dispatcher.execute_in(delay, Event::BackoffDecay)?;
        } else {
            self.decay_event = TimeEventHandle::null();
        }
        debug!("backoff decayed to index {}", self.index);
        Ok(())
    }

    /// Delay before the next connect attempt, in seconds, with jitter.
    ///
    /// The value is `table[index]` moved by a random amount of at most half the
    /// previous table entry (at least one second) in either direction, never
    /// below zero.
    pub fn penalty<R: Rng + ?Sized>(&self, rng: &mut R) -> u64 {
        let base = i64::from(self.backoff[self.index]);
        let half_range = (i64::from(self.backoff[self.index.saturating_sub(1)]) / 2).max(1);
        let span = (2 * half_range + 1) as u64;
        let offset = (u64::from(rng.random()) % span) as i64 - half_range;
        (base + offset).max(0) as u64
    }

    /// Resets the policy: cancels the decay event and returns to index zero.
    pub fn cancel(&mut self, dispatcher: &mut Dispatcher<Event>) -> Result<(), State> {
        dispatcher.cancel(&mut self.decay_event)?;
        self.index = 0;
        self.class = BackoffClass::None;
        Ok(())
    }
}
