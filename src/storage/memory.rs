use alloc::borrow::Cow;
use alloc::string::String;
use alloc::vec::Vec;

use super::{Error, OpenMode, ResourceHandle, ResourceKind, ResourceStat, ResourceStore};

#[derive(Debug)]
struct Resource<'a> {
    kind: ResourceKind,
    name: String,
    data: Cow<'a, [u8]>,
}

#[derive(Debug, Clone, Copy)]
struct OpenResource {
    index: usize,
    mode: OpenMode,
}

/// Resource store kept in RAM, with optional compiled-in entries.
///
/// Static entries are served straight from their slices; [`read`](ResourceStore::read)
/// hands out at most `chunk_size` bytes per call. Writing to a static entry copies
/// it first.
#[derive(Debug)]
pub struct MemoryStore<'a> {
    resources: Vec<Resource<'a>>,
    handles: Vec<Option<OpenResource>>,
    chunk_size: usize,
}

impl<'a> MemoryStore<'a> {
    pub fn new(chunk_size: usize) -> Self {
        Self { resources: Vec::new(), handles: Vec::new(), chunk_size: chunk_size.max(1) }
    }

    /// Adds or replaces a resource served from `data` without copying.
    pub fn insert_static(&mut self, kind: ResourceKind, name: &str, data: &'a [u8]) -> Result<(), Error> {
        self.insert(kind, name, Cow::Borrowed(data))
    }

    /// Adds or replaces a resource holding a copy of `data`.
    pub fn insert_owned(&mut self, kind: ResourceKind, name: &str, data: &[u8]) -> Result<(), Error> {
        self.insert(kind, name, Cow::Owned(data.to_vec()))
    }

    fn insert(&mut self, kind: ResourceKind, name: &str, data: Cow<'a, [u8]>) -> Result<(), Error> {
        match self.find(kind, name) {
            Some(index) => self.resources[index].data = data,
            None => {
                self.resources
                    .try_reserve(1)
                    .map_err(|_| Error::NoMoreResources)?;
                self.resources.push(Resource { kind, name: String::from(name), data });
            }
        }
        Ok(())
    }

    fn find(&self, kind: ResourceKind, name: &str) -> Option<usize> {
        self.resources
            .iter()
            .position(|resource| resource.kind == kind && resource.name == name)
    }

    fn opened(&self, handle: ResourceHandle) -> Result<OpenResource, Error> {
        self.handles
            .get(handle.0 as usize)
            .copied()
            .flatten()
            .ok_or(Error::CloseError)
    }
}

impl ResourceStore for MemoryStore<'_> {
    fn stat(&mut self, kind: ResourceKind, name: &str) -> Result<ResourceStat, Error> {
        let index = self.find(kind, name).ok_or(Error::NotFound)?;
        Ok(ResourceStat { size: self.resources[index].data.len() })
    }

    fn open(&mut self, kind: ResourceKind, name: &str, mode: OpenMode) -> Result<ResourceHandle, Error> {
        let index = match (self.find(kind, name), mode) {
            (Some(index), _) => index,
            (None, OpenMode::Write) => {
                self.insert(kind, name, Cow::Owned(Vec::new()))?;
                self.resources.len() - 1
            }
            (None, OpenMode::Read) => return Err(Error::NotFound),
        };
        let open = Some(OpenResource { index, mode });
        let slot = match self.handles.iter().position(Option::is_none) {
            Some(slot) => {
                self.handles[slot] = open;
                slot
            }
            None => {
                self.handles.push(open);
                self.handles.len() - 1
            }
        };
        Ok(ResourceHandle(slot as u32))
    }

    fn read(&mut self, handle: ResourceHandle, offset: usize) -> Result<&[u8], Error> {
        let open = self.opened(handle).map_err(|_| Error::ReadError)?;
        let data = &self.resources[open.index].data;
        if offset >= data.len() {
            return Ok(&[]);
        }
        let end = (offset + self.chunk_size).min(data.len());
        Ok(&data[offset..end])
    }

    fn write(&mut self, handle: ResourceHandle, offset: usize, data: &[u8]) -> Result<usize, Error> {
        let open = self.opened(handle).map_err(|_| Error::WriteError)?;
        if open.mode != OpenMode::Write {
            return Err(Error::ReadOnly);
        }
        let stored = self.resources[open.index].data.to_mut();
        if offset > stored.len() {
            return Err(Error::WriteError);
        }
        stored.truncate(offset);
        stored.extend_from_slice(data);
        Ok(data.len())
    }

    fn close(&mut self, handle: ResourceHandle) -> Result<(), Error> {
        self.opened(handle)?;
        self.handles[handle.0 as usize] = None;
        Ok(())
    }

    fn remove(&mut self, kind: ResourceKind, name: &str) -> Result<(), Error> {
        let index = self.find(kind, name).ok_or(Error::RemoveError)?;
        if self.handles.iter().flatten().any(|open| open.index == index) {
            return Err(Error::RemoveError);
        }
        self.resources.remove(index);
        Ok(())
    }
}
