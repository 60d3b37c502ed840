use alloc::vec::Vec;

use crate::error::State;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct Key {
    slot: u32,
    generation: u32,
}

/// Refers to an event scheduled in a [`TimeEventHeap`].
///
/// A handle is null once its owner cancelled it. A handle whose event already fired
/// stays non-null but no longer resolves: every slot carries a generation counter
/// that changes when the event leaves the heap, so a stale handle is always detected.
#[derive(Debug, PartialEq, Eq, Default)]
pub struct TimeEventHandle {
    key: Option<Key>,
}

impl TimeEventHandle {
    /// A handle that refers to nothing.
    pub const fn null() -> Self {
        Self { key: None }
    }

    pub fn is_null(&self) -> bool {
        self.key.is_none()
    }
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    position: Option<usize>,
}

#[derive(Debug)]
struct Entry<E> {
    time: u64,
    sequence: u64,
    repeat: Option<u64>,
    slot: u32,
    event: E,
}

impl<E> Entry<E> {
    fn order(&self) -> (u64, u64) {
        (self.time, self.sequence)
    }
}

/// Binary min-heap of events keyed by execution time in seconds.
///
/// Events with the same execution time leave the heap in insertion order. Positions
/// are tracked per slot so cancel and restart work on any element in O(log n).
#[derive(Debug)]
pub struct TimeEventHeap<E> {
    entries: Vec<Entry<E>>,
    slots: Vec<Slot>,
    free: Vec<u32>,
    sequence: u64,
}

impl<E> Default for TimeEventHeap<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> TimeEventHeap<E> {
    pub const fn new() -> Self {
        Self { entries: Vec::new(), slots: Vec::new(), free: Vec::new(), sequence: 0 }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Schedules `event` at `time`.
    pub fn add(&mut self, time: u64, event: E) -> Result<TimeEventHandle, State> {
        self.insert(time, None, event)
    }

    /// Schedules `event` at `time`, re-arming it every `interval` seconds after it
    /// fires. An interval of zero is treated as one second.
    pub fn add_repeating(&mut self, time: u64, interval: u64, event: E) -> Result<TimeEventHandle, State> {
        self.insert(time, Some(interval.max(1)), event)
    }

    /// Earliest event without removing it.
    pub fn peek(&self) -> Option<(u64, &E)> {
        self.entries.first().map(|entry| (entry.time, &entry.event))
    }

    pub fn peek_time(&self) -> Option<u64> {
        self.entries.first().map(|entry| entry.time)
    }

    /// Heap position of the event behind `handle`, if it is still scheduled.
    pub fn position(&self, handle: &TimeEventHandle) -> Option<usize> {
        let key = handle.key?;
        let slot = self.slots.get(key.slot as usize)?;
        if slot.generation != key.generation {
            return None;
        }
        slot.position
    }

    pub fn contains(&self, handle: &TimeEventHandle) -> bool {
        self.position(handle).is_some()
    }

    /// Execution time of the event behind `handle`.
    pub fn time_of(&self, handle: &TimeEventHandle) -> Option<u64> {
        self.position(handle).map(|position| self.entries[position].time)
    }

    /// Removes the event behind `handle` and nulls the handle.
    ///
    /// Cancelling a null handle, or one whose event already fired, only nulls it.
    pub fn cancel(&mut self, handle: &mut TimeEventHandle) -> Result<(), State> {
        if let Some(position) = self.position(handle) {
            self.remove_at(position);
        }
        handle.key = None;
        Ok(())
    }

    /// Moves the event behind `handle` to `time`.
    ///
    /// A null or stale handle is reported as [`State::ElementNotFound`].
    pub fn restart(&mut self, handle: &TimeEventHandle, time: u64) -> Result<(), State> {
        let position = self.position(handle).ok_or(State::ElementNotFound)?;
        let earlier = time < self.entries[position].time;
        let sequence = self.next_sequence();
        let entry = &mut self.entries[position];
        entry.time = time;
        entry.sequence = sequence;
        if earlier {
            self.sift_up(position);
        } else {
            self.sift_down(position);
        }
        Ok(())
    }

    /// Removes and returns the earliest event, whatever its time.
    pub fn pop(&mut self) -> Option<(u64, E)> {
        if self.entries.is_empty() {
            return None;
        }
        self.remove_at(0)
    }

    /// Takes the earliest event if it is due at `now`.
    ///
    /// A repeating event stays in the heap, re-armed at `now + interval`, and a copy
    /// is returned.
    pub fn pop_due(&mut self, now: u64) -> Option<E>
    where
        E: Clone,
    {
        let top = self.entries.first()?;
        if top.time > now {
            return None;
        }
        match top.repeat {
            Some(interval) => {
                let event = top.event.clone();
                let sequence = self.next_sequence();
                let top = &mut self.entries[0];
                top.time = now.saturating_add(interval);
                top.sequence = sequence;
                self.sift_down(0);
                Some(event)
            }
            None => self.remove_at(0).map(|(_, event)| event),
        }
    }

    /// Drops every scheduled event. Outstanding handles become stale.
    pub fn clear(&mut self) {
        while let Some(entry) = self.entries.pop() {
            self.release(entry.slot);
        }
    }

    fn insert(&mut self, time: u64, repeat: Option<u64>, event: E) -> Result<TimeEventHandle, State> {
        self.entries.try_reserve(1).map_err(|_| State::OutOfMemory)?;
        let slot = match self.free.pop() {
            Some(slot) => slot,
            None => {
                self.slots.try_reserve(1).map_err(|_| State::OutOfMemory)?;
                self.slots.push(Slot { generation: 0, position: None });
                // release() must never allocate
                self.free
                    .try_reserve(self.slots.len() - self.free.len())
                    .map_err(|_| State::OutOfMemory)?;
                (self.slots.len() - 1) as u32
            }
        };
        let sequence = self.next_sequence();
        let position = self.entries.len();
        self.entries.push(Entry { time, sequence, repeat, slot, event });
        self.slots[slot as usize].position = Some(position);
        self.sift_up(position);
        Ok(TimeEventHandle {
            key: Some(Key { slot, generation: self.slots[slot as usize].generation }),
        })
    }

    fn next_sequence(&mut self) -> u64 {
        self.sequence = self.sequence.wrapping_add(1);
        self.sequence
    }

    fn remove_at(&mut self, position: usize) -> Option<(u64, E)> {
        let last = self.entries.len().checked_sub(1)?;
        self.swap(position, last);
        let entry = self.entries.pop()?;
        self.release(entry.slot);
        if position < self.entries.len() {
            let position = self.sift_up(position);
            self.sift_down(position);
        }
        Some((entry.time, entry.event))
    }

    fn release(&mut self, slot: u32) {
        let entry = &mut self.slots[slot as usize];
        entry.position = None;
        entry.generation = entry.generation.wrapping_add(1);
        self.free.push(slot);
    }

    fn swap(&mut self, a: usize, b: usize) {
        if a == b {
            return;
        }
        self.entries.swap(a, b);
        self.slots[self.entries[a].slot as usize].position = Some(a);
        self.slots[self.entries[b].slot as usize].position = Some(b);
    }

    fn sift_up(&mut self, mut position: usize) -> usize {
        while position > 0 {
            let parent = (position - 1) / 2;
            if self.entries[position].order() >= self.entries[parent].order() {
                break;
            }
            self.swap(position, parent);
            position = parent;
        }
        position
    }

    fn sift_down(&mut self, mut position: usize) -> usize {
        let len = self.entries.len();
        loop {
            let left = 2 * position + 1;
            let right = left + 1;
            let mut smallest = position;
            if left < len && self.entries[left].order() < self.entries[smallest].order() {
                smallest = left;
            }
            if right < len && self.entries[right].order() < self.entries[smallest].order() {
                smallest = right;
            }
            if smallest == position {
                return position;
            }
            self.swap(position, smallest);
            position = smallest;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(heap: &mut TimeEventHeap<u32>) -> Vec<(u64, u32)> {
        let mut out = Vec::new();
        while let Some(item) = heap.pop() {
            out.push(item);
        }
        out
    }

    #[test]
    fn equal_times_leave_in_insertion_order() {
        let mut heap = TimeEventHeap::new();
        for id in 0..8 {
            heap.add(5, id).unwrap();
        }
        let ids: Vec<u32> = drain(&mut heap).into_iter().map(|(_, id)| id).collect();
        assert_eq!(ids, [0, 1, 2, 3, 4, 5, 6, 7]);
    }

    #[test]
    fn restart_moves_both_directions() {
        let mut heap = TimeEventHeap::new();
        let a = heap.add(10, 1).unwrap();
        heap.add(20, 2).unwrap();
        let c = heap.add(30, 3).unwrap();

        heap.restart(&c, 5).unwrap();
        assert_eq!(heap.peek(), Some((5, &3)));
        heap.restart(&c, 40).unwrap();
        heap.restart(&a, 25).unwrap();
        assert_eq!(drain(&mut heap), [(20, 2), (25, 1), (40, 3)]);
    }

    #[test]
    fn fired_handle_is_stale() {
        let mut heap = TimeEventHeap::new();
        let handle = heap.add(1, 7).unwrap();
        assert_eq!(heap.pop_due(1), Some(7));
        assert!(!handle.is_null());
        assert!(!heap.contains(&handle));
        assert_eq!(heap.restart(&handle, 3), Err(State::ElementNotFound));

        // the freed slot is reused without reviving the old handle
        let fresh = heap.add(2, 8).unwrap();
        assert!(heap.contains(&fresh));
        assert!(!heap.contains(&handle));
    }

    #[test]
    fn repeating_event_rearms_from_fire_time() {
        let mut heap = TimeEventHeap::new();
        let handle = heap.add_repeating(3, 4, 9).unwrap();
        assert_eq!(heap.pop_due(2), None);
        assert_eq!(heap.pop_due(5), Some(9));
        assert_eq!(heap.time_of(&handle), Some(9));
        assert_eq!(heap.len(), 1);
    }
}
