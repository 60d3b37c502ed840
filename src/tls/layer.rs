use alloc::string::String;
use alloc::vec::Vec;

use log::{debug, error, info, trace, warn};

use super::{TlsConfig, TlsError, TlsProvider, TlsSession};
use crate::error::State;
use crate::layer::{Step, Suspend};
use crate::memory::ByteBuffer;
use crate::network::io::IoLayer;
use crate::network::{Connect, Socket, SocketId};
use crate::storage::{LoadStage, ResourceKind, ResourceManager, ResourceStore};

/// Where a [`TlsLayer`] resumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlsState {
    Init,
    /// Reading the CA bundle; the stage is the next resource store call.
    LoadingCert(LoadStage),
    /// Waiting for the socket connect to finish.
    Connecting,
    Handshaking,
    Connected,
    Closing,
    Closed,
}

/// TLS on top of the raw socket layer.
///
/// Owns the socket, the engine session, the frame being written and a fixed-size
/// decode buffer. Closing frees all of them exactly once, whatever state the layer
/// was in.
#[derive(Debug)]
pub struct TlsLayer<S, T> {
    io: IoLayer<S>,
    session: Option<T>,
    loader: Option<ResourceManager>,
    state: TlsState,
    outbound: Option<ByteBuffer<'static>>,
    decode: Vec<u8>,
    host: String,
    port: u16,
}

fn copy_str(text: &str) -> Result<String, State> {
    let mut owned = String::new();
    owned.try_reserve_exact(text.len()).map_err(|_| State::OutOfMemory)?;
    owned.push_str(text);
    Ok(owned)
}

impl<S: Socket, T: TlsSession> TlsLayer<S, T> {
    /// Creates a layer that will load `ca_resource` and connect to `host:port`.
    ///
    /// Inbound data is decoded `io_buffer_size` bytes at a time.
    pub fn new(host: &str, port: u16, ca_resource: &str, io_buffer_size: usize) -> Result<Self, State> {
        if host.is_empty() {
            return Err(State::NullHost);
        }
        if io_buffer_size == 0 {
            return Err(State::InvalidParameter);
        }
        let mut decode = Vec::new();
        decode
            .try_reserve_exact(io_buffer_size)
            .map_err(|_| State::OutOfMemory)?;
        decode.resize(io_buffer_size, 0);
        Ok(Self {
            io: IoLayer::new(),
            session: None,
            loader: Some(ResourceManager::new(ResourceKind::Certificate, ca_resource)?),
            state: TlsState::Init,
            outbound: None,
            decode,
            host: copy_str(host)?,
            port,
        })
    }

    pub fn state(&self) -> TlsState {
        self.state
    }

    pub fn socket_id(&self) -> Option<SocketId> {
        self.io.socket_id()
    }

    /// `true` while a frame is being written.
    pub fn has_outbound(&self) -> bool {
        self.outbound.is_some()
    }

    /// Decrypted bytes waiting inside the engine.
    pub fn pending(&self) -> usize {
        self.session.as_ref().map_or(0, TlsSession::pending)
    }

    /// Advances certificate loading, session setup and the socket connect.
    ///
    /// Suspends with `Yield` between resource store calls and with `WantConnect`
    /// once the socket connect is underway. A handshake that is waiting for the
    /// socket is retried. Returns `Done` once connected.
    pub fn resume<P>(&mut self, platform: &mut P) -> Result<Step<()>, State>
    where
        P: ResourceStore + TlsProvider<Session = T> + Connect<Socket = S>,
    {
        match self.state {
            TlsState::Init => {
                debug!("loading CA bundle");
                self.state = TlsState::LoadingCert(LoadStage::Stat);
                Ok(Step::Suspended(Suspend::Yield))
            }
            TlsState::LoadingCert(_) => self.load_certificate(platform),
            TlsState::Connecting => Ok(Step::Suspended(Suspend::WantConnect)),
            TlsState::Handshaking => self.handshake(),
            TlsState::Connected => Ok(Step::Done(())),
            TlsState::Closing | TlsState::Closed => Err(State::SocketNoActiveConnection),
        }
    }

    fn load_certificate<P>(&mut self, platform: &mut P) -> Result<Step<()>, State>
    where
        P: ResourceStore + TlsProvider<Session = T> + Connect<Socket = S>,
    {
        let loader = self.loader.as_mut().ok_or(State::InternalError)?;
        let ca = match loader.step(platform) {
            Ok(Step::Suspended(reason)) => {
                self.state = TlsState::LoadingCert(loader.stage());
                return Ok(Step::Suspended(reason));
            }
            Ok(Step::Done(ca)) => ca,
            Err(State::OutOfMemory) => return Err(State::OutOfMemory),
            Err(state) => {
                error!("CA bundle unavailable: {:?}", state);
                return Err(State::TlsFailedLoadingCertificate);
            }
        };
        self.loader = None;

        let config = TlsConfig { domain: &self.host, ca_certificates: ca.as_slice() };
        let session = platform.init(&config).map_err(|error| {
            error!("TLS init failed: {:?}", error);
            match error {
                TlsError::CertError => State::TlsFailedLoadingCertificate,
                _ => State::TlsInitialization,
            }
        })?;
        self.session = Some(session);
        drop(ca);

        let step = self.io.connect(platform, &self.host, self.port)?;
        self.state = TlsState::Connecting;
        Ok(step)
    }

    /// Continues after the poll reported the socket connect finished.
    pub fn on_connected(&mut self) -> Result<Step<()>, State> {
        if self.state != TlsState::Connecting {
            return Err(State::InternalError);
        }
        self.io.finish_connect()?;
        self.state = TlsState::Handshaking;
        self.handshake()
    }

    fn handshake(&mut self) -> Result<Step<()>, State> {
        let socket = self.io.socket_mut().ok_or(State::SocketNoActiveConnection)?;
        let session = self.session.as_mut().ok_or(State::InternalError)?;
        match session.connect(socket) {
            Ok(()) => {
                info!("TLS session established with {}", self.host);
                self.state = TlsState::Connected;
                Ok(Step::Done(()))
            }
            Err(TlsError::WantRead) => Ok(Step::Suspended(Suspend::WantRead)),
            Err(TlsError::WantWrite) => Ok(Step::Suspended(Suspend::WantWrite)),
            Err(TlsError::CertError) => {
                error!("server certificate rejected");
                Err(State::TlsFailedCertError)
            }
            Err(TlsError::ConnectionReset) => Err(State::ConnectionResetByPeer),
            Err(other) => {
                error!("TLS handshake failed: {:?}", other);
                Err(State::TlsConnect)
            }
        }
    }

    /// Takes a frame to write. Only one frame is written at a time.
    pub fn push(&mut self, frame: ByteBuffer<'static>) -> Result<(), State> {
        if self.state != TlsState::Connected {
            return Err(State::SocketNoActiveConnection);
        }
        if self.outbound.is_some() {
            return Err(State::InternalError);
        }
        self.outbound = Some(frame);
        Ok(())
    }

    /// Writes as much of the current frame as the socket takes.
    ///
    /// `Done` means the whole frame was flushed and the layer is free for the next
    /// one; a partial write suspends with `WantWrite` and resumes where it stopped.
    pub fn send(&mut self) -> Result<Step<()>, State> {
        let frame = self.outbound.as_mut().ok_or(State::InternalError)?;
        let socket = self.io.socket_mut().ok_or(State::SocketNoActiveConnection)?;
        let session = self.session.as_mut().ok_or(State::InternalError)?;
        while !frame.remaining().is_empty() {
            match session.write(socket, frame.remaining()) {
                Ok(0) | Err(TlsError::WantWrite) | Err(TlsError::WantRead) => {
                    trace!("TLS write suspended, {} bytes left", frame.remaining().len());
                    return Ok(Step::Suspended(Suspend::WantWrite));
                }
                Ok(written) => frame.advance(written),
                Err(TlsError::ConnectionReset) => return Err(State::ConnectionResetByPeer),
                Err(other) => {
                    error!("TLS write failed: {:?}", other);
                    return Err(State::TlsWrite);
                }
            }
        }
        self.outbound = None;
        Ok(Step::Done(()))
    }

    /// Decrypts inbound data into the decode buffer.
    ///
    /// Reads until the buffer is full or the engine has nothing more, and returns
    /// the decoded bytes, or `None` when nothing was available.
    pub fn receive(&mut self) -> Result<Option<&[u8]>, State> {
        let socket = self.io.socket_mut().ok_or(State::SocketNoActiveConnection)?;
        let session = self.session.as_mut().ok_or(State::InternalError)?;
        let mut filled = 0;
        while filled < self.decode.len() {
            match session.read(socket, &mut self.decode[filled..]) {
                Ok(0) => {
                    warn!("peer closed the TLS stream");
                    return Err(State::ConnectionResetByPeer);
                }
                Ok(read) => filled += read,
                Err(TlsError::WantRead) | Err(TlsError::WantWrite) => break,
                Err(TlsError::ConnectionReset) => return Err(State::ConnectionResetByPeer),
                Err(other) => {
                    error!("TLS read failed: {:?}", other);
                    return Err(State::TlsRead);
                }
            }
        }
        if filled == 0 {
            return Ok(None);
        }
        trace!("TLS decoded {} bytes", filled);
        Ok(Some(&self.decode[..filled]))
    }

    /// Capacity of the decode buffer.
    pub fn decode_capacity(&self) -> usize {
        self.decode.len()
    }

    /// Tears the layer down from any state: stops certificate loading, releases the
    /// engine session, drops the pending frame and closes the socket.
    pub fn close<R: ResourceStore + ?Sized>(&mut self, store: &mut R) -> Result<(), State> {
        if self.state == TlsState::Closed {
            return Ok(());
        }
        self.state = TlsState::Closing;
        if let Some(mut loader) = self.loader.take() {
            loader.abort(store);
        }
        if let Some(mut session) = self.session.take() {
            session.cleanup();
        }
        self.outbound = None;
        self.decode.fill(0);
        let result = self.io.close();
        self.state = TlsState::Closed;
        debug!("TLS layer closed");
        result
    }
}
