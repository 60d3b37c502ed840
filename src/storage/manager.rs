use alloc::string::String;

use log::{debug, error};

use super::{OpenMode, ResourceHandle, ResourceKind, ResourceStore};
use crate::error::State;
use crate::layer::{Step, Suspend};
use crate::memory::ByteBuffer;

/// Where a [`ResourceManager`] resumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStage {
    Stat,
    Open,
    Read,
    Close,
    Done,
}

/// Loads one resource into an owned buffer, one store call per step.
///
/// Between steps the manager yields so the event loop can run other work; the
/// store is never called twice in one step.
#[derive(Debug)]
pub struct ResourceManager {
    kind: ResourceKind,
    name: String,
    stage: LoadStage,
    handle: Option<ResourceHandle>,
    buffer: Option<ByteBuffer<'static>>,
}

impl ResourceManager {
    pub fn new(kind: ResourceKind, name: &str) -> Result<Self, State> {
        let mut owned = String::new();
        owned.try_reserve_exact(name.len()).map_err(|_| State::OutOfMemory)?;
        owned.push_str(name);
        Ok(Self { kind, name: owned, stage: LoadStage::Stat, handle: None, buffer: None })
    }

    pub fn stage(&self) -> LoadStage {
        self.stage
    }

    /// Performs the next store call.
    ///
    /// On failure the handle, if open, is closed before the error is returned and
    /// the manager is finished.
    pub fn step<S: ResourceStore + ?Sized>(&mut self, store: &mut S) -> Result<Step<ByteBuffer<'static>>, State> {
        match self.advance(store) {
            Ok(step) => Ok(step),
            Err(state) => {
                error!("loading resource {} failed: {:?}", self.name, state);
                self.abort(store);
                Err(state)
            }
        }
    }

    /// Closes the open handle, if any, and drops what was read so far.
    pub fn abort<S: ResourceStore + ?Sized>(&mut self, store: &mut S) {
        if let Some(handle) = self.handle.take() {
            let _ = store.close(handle);
        }
        self.buffer = None;
        self.stage = LoadStage::Done;
    }

    fn advance<S: ResourceStore + ?Sized>(&mut self, store: &mut S) -> Result<Step<ByteBuffer<'static>>, State> {
        match self.stage {
            LoadStage::Stat => {
                let stat = store.stat(self.kind, &self.name)?;
                self.buffer = Some(ByteBuffer::with_capacity(stat.size)?);
                self.stage = LoadStage::Open;
            }
            LoadStage::Open => {
                self.handle = Some(store.open(self.kind, &self.name, OpenMode::Read)?);
                self.stage = LoadStage::Read;
            }
            LoadStage::Read => {
                let handle = self.handle.ok_or(State::InternalError)?;
                let buffer = self.buffer.as_mut().ok_or(State::InternalError)?;
                let chunk = store.read(handle, buffer.len())?;
                if chunk.is_empty() {
                    self.stage = LoadStage::Close;
                } else {
                    buffer.append_with_resize(chunk)?;
                }
            }
            LoadStage::Close => {
                let handle = self.handle.take().ok_or(State::InternalError)?;
                store.close(handle)?;
                self.stage = LoadStage::Done;
                let buffer = self.buffer.take().ok_or(State::InternalError)?;
                debug!("loaded resource {} ({} bytes)", self.name, buffer.len());
                return Ok(Step::Done(buffer));
            }
            LoadStage::Done => return Err(State::InternalError),
        }
        Ok(Step::Suspended(Suspend::Yield))
    }
}
