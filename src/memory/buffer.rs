use alloc::vec::Vec;

use crate::error::State;

/// Who releases a buffer's storage.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Ownership {
    /// The buffer owns its storage and frees it on drop.
    Owned,
    /// The buffer views bytes owned elsewhere.
    Borrowed,
}

#[cfg(feature = "defmt")]
impl defmt::Format for Ownership {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Ownership::Owned => defmt::write!(f, "Owned"),
            Ownership::Borrowed => defmt::write!(f, "Borrowed"),
        }
    }
}

#[derive(Debug, Clone)]
enum Storage<'a> {
    Owned(Vec<u8>),
    Borrowed(&'a [u8]),
}

/// A byte container with an explicit capacity, a length and a read cursor.
///
/// `len() <= capacity()` holds at all times. The read cursor (`position`) tracks how
/// much of the content a consumer such as the MQTT parser has already taken.
#[derive(Debug, Clone)]
pub struct ByteBuffer<'a> {
    storage: Storage<'a>,
    capacity: usize,
    position: usize,
}

fn allocate(capacity: usize) -> Result<Vec<u8>, State> {
    let mut data = Vec::new();
    data.try_reserve_exact(capacity)
        .map_err(|_| State::OutOfMemory)?;
    Ok(data)
}

impl ByteBuffer<'static> {
    /// Creates an empty owned buffer able to hold `capacity` bytes without growing.
    pub fn with_capacity(capacity: usize) -> Result<Self, State> {
        Ok(Self {
            storage: Storage::Owned(allocate(capacity)?),
            capacity,
            position: 0,
        })
    }

    /// Creates an owned buffer holding a copy of `bytes`.
    pub fn copy_from(bytes: &[u8]) -> Result<Self, State> {
        let mut data = allocate(bytes.len())?;
        data.extend_from_slice(bytes);
        Ok(Self {
            storage: Storage::Owned(data),
            capacity: bytes.len(),
            position: 0,
        })
    }

    /// Takes ownership of `data` as the buffer's content, at its current length.
    pub fn from_vec(data: Vec<u8>) -> Self {
        let capacity = data.len();
        Self { storage: Storage::Owned(data), capacity, position: 0 }
    }

    /// Creates an owned buffer holding a copy of `text`.
    ///
    /// One extra byte of capacity is reserved, matching a terminated string.
    pub fn copy_from_str(text: &str) -> Result<Self, State> {
        let mut data = allocate(text.len() + 1)?;
        data.extend_from_slice(text.as_bytes());
        Ok(Self {
            storage: Storage::Owned(data),
            capacity: text.len() + 1,
            position: 0,
        })
    }
}

impl<'a> ByteBuffer<'a> {
    /// Creates a borrowed view over `bytes`. The caller keeps ownership.
    pub fn share(bytes: &'a [u8]) -> Self {
        Self {
            storage: Storage::Borrowed(bytes),
            capacity: bytes.len(),
            position: 0,
        }
    }

    /// Creates a borrowed view over `text`.
    pub fn share_str(text: &'a str) -> Self {
        Self::share(text.as_bytes())
    }

    pub fn ownership(&self) -> Ownership {
        match self.storage {
            Storage::Owned(_) => Ownership::Owned,
            Storage::Borrowed(_) => Ownership::Borrowed,
        }
    }

    pub fn len(&self) -> usize {
        self.as_slice().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// All bytes held, regardless of the read cursor.
    pub fn as_slice(&self) -> &[u8] {
        match &self.storage {
            Storage::Owned(data) => data.as_slice(),
            Storage::Borrowed(data) => *data,
        }
    }

    /// Content as UTF-8, if it is valid.
    pub fn as_str(&self) -> Option<&str> {
        core::str::from_utf8(self.as_slice()).ok()
    }

    /// Appends `bytes` without growing.
    ///
    /// Fails with [`State::BufferOverflow`] and leaves the buffer untouched when the
    /// remaining capacity is too small. Borrowed buffers are always full.
    pub fn append(&mut self, bytes: &[u8]) -> Result<(), State> {
        if self.len() + bytes.len() > self.capacity {
            return Err(State::BufferOverflow);
        }
        match &mut self.storage {
            Storage::Owned(data) => {
                data.extend_from_slice(bytes);
                Ok(())
            }
            Storage::Borrowed(_) if bytes.is_empty() => Ok(()),
            Storage::Borrowed(_) => Err(State::BufferOverflow),
        }
    }

    /// Appends `bytes`, growing the storage when needed.
    ///
    /// A grown buffer's capacity becomes the smallest power of two that fits the new
    /// length. A borrowed buffer is first copied into owned storage.
    pub fn append_with_resize(&mut self, bytes: &[u8]) -> Result<(), State> {
        let needed = self.len() + bytes.len();
        if needed > self.capacity || self.ownership() == Ownership::Borrowed {
            let new_capacity = if needed > self.capacity {
                needed
                    .checked_next_power_of_two()
                    .ok_or(State::OutOfMemory)?
            } else {
                self.capacity
            };
            self.grow(new_capacity)?;
        }
        self.append(bytes)
    }

    fn grow(&mut self, new_capacity: usize) -> Result<(), State> {
        let copied = match &mut self.storage {
            Storage::Owned(data) => {
                data.try_reserve_exact(new_capacity - data.len())
                    .map_err(|_| State::OutOfMemory)?;
                None
            }
            Storage::Borrowed(view) => {
                let mut data = allocate(new_capacity)?;
                data.extend_from_slice(view);
                Some(data)
            }
        };
        if let Some(data) = copied {
            self.storage = Storage::Owned(data);
        }
        self.capacity = new_capacity;
        Ok(())
    }

    /// Read cursor, in bytes from the start.
    pub fn position(&self) -> usize {
        self.position
    }

    /// Bytes between the read cursor and the end of the content.
    pub fn remaining(&self) -> &[u8] {
        &self.as_slice()[self.position..]
    }

    /// Moves the read cursor forward, stopping at the end of the content.
    pub fn advance(&mut self, count: usize) {
        self.position = (self.position + count).min(self.len());
    }

    /// Resets the read cursor to the start.
    pub fn rewind(&mut self) {
        self.position = 0;
    }

    /// Drops the content, keeping owned storage for reuse.
    pub fn clear(&mut self) {
        match &mut self.storage {
            Storage::Owned(data) => data.clear(),
            Storage::Borrowed(view) => {
                *view = &[];
                self.capacity = 0;
            }
        }
        self.position = 0;
    }

    /// Converts into a buffer that owns its bytes, copying a borrowed view.
    pub fn into_owned(self) -> Result<ByteBuffer<'static>, State> {
        match self.storage {
            Storage::Owned(data) => Ok(ByteBuffer {
                storage: Storage::Owned(data),
                capacity: self.capacity,
                position: self.position,
            }),
            Storage::Borrowed(view) => {
                let mut owned = ByteBuffer::copy_from(view)?;
                owned.position = self.position;
                Ok(owned)
            }
        }
    }
}

impl PartialEq for ByteBuffer<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.as_slice() == other.as_slice()
    }
}

impl Eq for ByteBuffer<'_> {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn copy_from_str_reserves_terminator() {
        let buffer = ByteBuffer::copy_from_str("abc").unwrap();
        assert_eq!(buffer.len(), 3);
        assert_eq!(buffer.capacity(), 4);
        assert_eq!(buffer.ownership(), Ownership::Owned);
    }

    #[test]
    fn append_without_resize_is_all_or_nothing() {
        let mut buffer = ByteBuffer::with_capacity(4).unwrap();
        buffer.append(b"ab").unwrap();
        assert_eq!(buffer.append(b"cde"), Err(State::BufferOverflow));
        assert_eq!(buffer.as_slice(), b"ab");
        assert_eq!(buffer.capacity(), 4);
    }

    #[test]
    fn resize_keeps_capacity_when_content_fits() {
        let mut buffer = ByteBuffer::with_capacity(100).unwrap();
        buffer.append_with_resize(b"abc").unwrap();
        assert_eq!(buffer.capacity(), 100);
    }

    #[test]
    fn appending_to_shared_copies_on_resize() {
        let source = [1u8, 2, 3];
        let mut buffer = ByteBuffer::share(&source);
        assert_eq!(buffer.append(&[4]), Err(State::BufferOverflow));
        buffer.append_with_resize(&[4]).unwrap();
        assert_eq!(buffer.ownership(), Ownership::Owned);
        assert_eq!(buffer.as_slice(), &[1, 2, 3, 4]);
        assert_eq!(buffer.capacity(), 4);
        assert_eq!(source, [1, 2, 3]);
    }

    #[test]
    fn cursor_stops_at_end() {
        let mut buffer = ByteBuffer::share(b"abcdef");
        buffer.advance(4);
        assert_eq!(buffer.remaining(), b"ef");
        buffer.advance(10);
        assert_eq!(buffer.position(), 6);
        assert!(buffer.remaining().is_empty());
    }
}
