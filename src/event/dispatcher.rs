use alloc::collections::VecDeque;
use alloc::vec::Vec;

use log::trace;

use super::time_event::{TimeEventHandle, TimeEventHeap};
use crate::error::State;
use crate::network::{Interest, PollEntry, SocketId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Registration {
    socket: SocketId,
    interest: Interest,
}

/// Single-threaded cooperative scheduler.
///
/// Work reaches the dispatcher from three sources: immediate calls queued with
/// [`execute`](Self::execute), time events that come due when [`step`](Self::step)
/// advances the clock, and socket readiness observed by the embedder's poll. Due
/// events land in one FIFO ready queue which the owner drains with
/// [`next_ready`](Self::next_ready); handling an event may schedule more work, which
/// is picked up in the same drain.
#[derive(Debug)]
pub struct Dispatcher<E> {
    heap: TimeEventHeap<E>,
    ready: VecDeque<E>,
    sockets: Vec<Registration>,
    current_step: u64,
    running: bool,
}

impl<E> Default for Dispatcher<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> Dispatcher<E> {
    pub const fn new() -> Self {
        Self {
            heap: TimeEventHeap::new(),
            ready: VecDeque::new(),
            sockets: Vec::new(),
            current_step: 0,
            running: true,
        }
    }

    /// Clock value of the last [`step`](Self::step), in seconds.
    pub fn current_step(&self) -> u64 {
        self.current_step
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Makes the blocking loop return on its next iteration.
    pub fn stop(&mut self) {
        self.running = false;
    }

    /// Queues `event` to run on the current iteration.
    pub fn execute(&mut self, event: E) -> Result<(), State> {
        self.ready.try_reserve(1).map_err(|_| State::OutOfMemory)?;
        self.ready.push_back(event);
        Ok(())
    }

    /// Schedules `event` to run `delay` seconds after the current step.
    pub fn execute_in(&mut self, delay: u64, event: E) -> Result<TimeEventHandle, State> {
        self.heap.add(self.current_step.saturating_add(delay), event)
    }

    /// Schedules `event` every `interval` seconds, first after `interval`.
    pub fn execute_every(&mut self, interval: u64, event: E) -> Result<TimeEventHandle, State> {
        self.heap
            .add_repeating(self.current_step.saturating_add(interval), interval, event)
    }

    /// Pushes an already scheduled event to `delay` seconds after the current step.
    pub fn restart(&mut self, handle: &TimeEventHandle, delay: u64) -> Result<(), State> {
        self.heap.restart(handle, self.current_step.saturating_add(delay))
    }

    /// Cancels a scheduled event and nulls the handle.
    pub fn cancel(&mut self, handle: &mut TimeEventHandle) -> Result<(), State> {
        self.heap.cancel(handle)
    }

    pub fn is_scheduled(&self, handle: &TimeEventHandle) -> bool {
        self.heap.contains(handle)
    }

    /// Seconds until the event behind `handle` fires.
    pub fn remaining(&self, handle: &TimeEventHandle) -> Option<u64> {
        self.heap
            .time_of(handle)
            .map(|time| time.saturating_sub(self.current_step))
    }

    /// Number of scheduled time events.
    pub fn scheduled(&self) -> usize {
        self.heap.len()
    }

    /// Advances the clock to `now` and moves every due time event, earliest first,
    /// into the ready queue. The clock never runs backwards.
    pub fn step(&mut self, now: u64) -> Result<(), State>
    where
        E: Clone,
    {
        self.current_step = self.current_step.max(now);
        while let Some(event) = self.heap.pop_due(self.current_step) {
            trace!("time event due at step {}", self.current_step);
            self.ready.try_reserve(1).map_err(|_| State::OutOfMemory)?;
            self.ready.push_back(event);
        }
        Ok(())
    }

    /// Takes the next ready event.
    pub fn next_ready(&mut self) -> Option<E> {
        self.ready.pop_front()
    }

    pub fn has_ready(&self) -> bool {
        !self.ready.is_empty()
    }

    /// How long a blocking poll may wait: zero with work ready, the time to the
    /// earliest event otherwise, `None` when nothing is scheduled.
    pub fn timeout(&self) -> Option<u64> {
        if !self.ready.is_empty() {
            return Some(0);
        }
        self.heap
            .peek_time()
            .map(|time| time.saturating_sub(self.current_step))
    }

    /// `true` when no time event, ready event or socket registration remains.
    pub fn is_idle(&self) -> bool {
        self.heap.is_empty() && self.ready.is_empty() && self.sockets.is_empty()
    }

    /// Sets the readiness `socket` is waited for, replacing an earlier registration.
    /// An empty interest removes the registration.
    pub fn register(&mut self, socket: SocketId, interest: Interest) -> Result<(), State> {
        if interest.is_empty() {
            self.unregister(socket);
            return Ok(());
        }
        match self.sockets.iter_mut().find(|entry| entry.socket == socket) {
            Some(entry) => entry.interest = interest,
            None => {
                self.sockets.try_reserve(1).map_err(|_| State::OutOfMemory)?;
                self.sockets.push(Registration { socket, interest });
            }
        }
        Ok(())
    }

    pub fn unregister(&mut self, socket: SocketId) {
        self.sockets.retain(|entry| entry.socket != socket);
    }

    pub fn interest(&self, socket: SocketId) -> Option<Interest> {
        self.sockets
            .iter()
            .find(|entry| entry.socket == socket)
            .map(|entry| entry.interest)
    }

    /// Poll entries for every registered socket.
    pub fn poll_entries(&self) -> Result<Vec<PollEntry>, State> {
        let mut entries = Vec::new();
        entries
            .try_reserve_exact(self.sockets.len())
            .map_err(|_| State::OutOfMemory)?;
        entries.extend(
            self.sockets
                .iter()
                .map(|entry| PollEntry::new(entry.socket, entry.interest)),
        );
        Ok(entries)
    }

    /// Drops every pending event and registration.
    pub fn clear(&mut self) {
        self.heap.clear();
        self.ready.clear();
        self.sockets.clear();
    }
}
