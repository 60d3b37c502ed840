use log::{debug, warn};

use super::error::Error;
use super::{Connect, Socket, SocketId};
use crate::error::State;
use crate::layer::{Step, Suspend};

/// Where the raw socket is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoState {
    Idle,
    Connecting,
    Connected,
    Closed,
}

/// Owns the raw socket underneath the TLS layer.
#[derive(Debug)]
pub struct IoLayer<S> {
    socket: Option<S>,
    state: IoState,
}

impl<S: Socket> Default for IoLayer<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Socket> IoLayer<S> {
    pub fn new() -> Self {
        Self { socket: None, state: IoState::Idle }
    }

    pub fn state(&self) -> IoState {
        self.state
    }

    pub fn socket_id(&self) -> Option<SocketId> {
        self.socket.as_ref().map(Socket::id)
    }

    pub fn socket_mut(&mut self) -> Option<&mut S> {
        self.socket.as_mut()
    }

    /// Starts a non-blocking connect. Always suspends until the poll reports the
    /// connect finished.
    pub fn connect<C>(&mut self, network: &mut C, host: &str, port: u16) -> Result<Step<()>, State>
    where
        C: Connect<Socket = S>,
    {
        if host.is_empty() {
            return Err(State::NullHost);
        }
        debug!("connecting socket to {}:{}", host, port);
        let socket = network.connect(host, port).map_err(|error| match error {
            Error::WouldBlock | Error::ConnectionRefused => State::SocketConnection,
            other => State::from(other),
        })?;
        self.socket = Some(socket);
        self.state = IoState::Connecting;
        Ok(Step::Suspended(Suspend::WantConnect))
    }

    /// Completes the connect once the socket reported `connect_finished`.
    pub fn finish_connect(&mut self) -> Result<(), State> {
        let socket = self.socket.as_mut().ok_or(State::SocketNoActiveConnection)?;
        socket.finish_connect().map_err(|error| match error {
            Error::ConnectionReset => State::ConnectionResetByPeer,
            _ => State::SocketConnection,
        })?;
        self.state = IoState::Connected;
        Ok(())
    }

    /// Closes and drops the socket. Closing an already closed layer is a no-op.
    pub fn close(&mut self) -> Result<(), State> {
        self.state = IoState::Closed;
        match self.socket.take() {
            Some(socket) => socket.close().map_err(|error| {
                warn!("socket close failed: {:?}", error);
                State::SocketShutdown
            }),
            None => Ok(()),
        }
    }
}
