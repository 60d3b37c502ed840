use alloc::vec::Vec;

use crate::error::State;

/// Index into an [`Arena`], valid until the entry it names is removed.
///
/// The generation makes a key to a removed entry fail every lookup even after
/// its slot was reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ArenaKey {
    index: u32,
    generation: u32,
}

impl ArenaKey {
    /// Slot number, stable for the lifetime of the entry.
    pub fn index(&self) -> u32 {
        self.index
    }
}

#[derive(Debug)]
struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

/// A bounded table of values addressed by generation-checked keys.
///
/// Registries of tasks, callbacks and timed tasks live in arenas instead of linked
/// lists: insertion reuses the lowest free slot and removal is O(1).
#[derive(Debug)]
pub struct Arena<T> {
    slots: Vec<Slot<T>>,
    limit: usize,
    len: usize,
}

impl<T> Arena<T> {
    /// Creates an arena holding at most `limit` live entries.
    pub const fn new(limit: usize) -> Self {
        Self { slots: Vec::new(), limit, len: 0 }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Stores `value`, failing with `NoMoreResourceAvailable` once `limit` entries
    /// are live.
    pub fn insert(&mut self, value: T) -> Result<ArenaKey, State> {
        if self.len >= self.limit {
            return Err(State::NoMoreResourceAvailable);
        }
        let index = match self.slots.iter().position(|slot| slot.value.is_none()) {
            Some(index) => index,
            None => {
                self.slots.try_reserve(1).map_err(|_| State::OutOfMemory)?;
                self.slots.push(Slot { generation: 0, value: None });
                self.slots.len() - 1
            }
        };
        let slot = &mut self.slots[index];
        slot.value = Some(value);
        self.len += 1;
        Ok(ArenaKey { index: index as u32, generation: slot.generation })
    }

    pub fn get(&self, key: ArenaKey) -> Option<&T> {
        self.slots
            .get(key.index as usize)
            .filter(|slot| slot.generation == key.generation)
            .and_then(|slot| slot.value.as_ref())
    }

    pub fn get_mut(&mut self, key: ArenaKey) -> Option<&mut T> {
        self.slots
            .get_mut(key.index as usize)
            .filter(|slot| slot.generation == key.generation)
            .and_then(|slot| slot.value.as_mut())
    }

    pub fn contains(&self, key: ArenaKey) -> bool {
        self.get(key).is_some()
    }

    /// Takes the entry out. The key and every copy of it stop resolving.
    pub fn remove(&mut self, key: ArenaKey) -> Option<T> {
        let slot = self.slots.get_mut(key.index as usize)?;
        if slot.generation != key.generation {
            return None;
        }
        let value = slot.value.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.len -= 1;
        Some(value)
    }

    /// Live entries in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (ArenaKey, &T)> {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.value.as_ref().map(|value| {
                (ArenaKey { index: index as u32, generation: slot.generation }, value)
            })
        })
    }

    /// Keys of all live entries.
    pub fn keys(&self) -> Vec<ArenaKey> {
        self.iter().map(|(key, _)| key).collect()
    }

    /// Removes every entry, invalidating all keys.
    pub fn clear(&mut self) {
        for slot in self.slots.iter_mut() {
            if slot.value.take().is_some() {
                slot.generation = slot.generation.wrapping_add(1);
            }
        }
        self.len = 0;
    }
}
