//! Status codes shared by every layer and the public API.
//!
//! Each [`State`] carries a stable integer code so embedders can log or transmit it
//! compactly, and a human-readable description from a table keyed by that code.
//! Progress values such as [`State::WantRead`] or [`State::Written`] travel between
//! layers and into callbacks; API calls only ever return the error members inside
//! `Err`.

/// Status and error codes.
///
/// The numeric discriminants are part of the public contract and never change.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
#[repr(i32)]
pub enum State {
    /// Operation succeeded. Code 0.
    Ok = 0,
    /// Operation timed out. Code 1.
    Timeout = 1,
    /// Layer is waiting for the socket to become readable. Code 2.
    WantRead = 2,
    /// Layer is waiting for the socket to become writable. Code 3.
    WantWrite = 3,
    /// Buffer fully written. Code 4.
    Written = 4,
    /// Buffer could not be written. Code 5.
    FailedWriting = 5,
    /// Backoff is in a non-recoverable state. Code 6.
    BackoffTerminal = 6,
    /// Out of memory. Code 7.
    OutOfMemory = 7,
    /// Socket initialization failed. Code 8.
    SocketInitialization = 8,
    /// Host name resolution failed. Code 9.
    SocketGetHostByName = 9,
    /// Socket option query failed. Code 10.
    SocketGetSockOpt = 10,
    /// Socket error. Code 11.
    Socket = 11,
    /// Socket connection failed. Code 12.
    SocketConnection = 12,
    /// Socket shutdown failed. Code 13.
    SocketShutdown = 13,
    /// Socket write failed. Code 14.
    SocketWrite = 14,
    /// Socket read failed. Code 15.
    SocketRead = 15,
    /// No active connection. Code 16.
    SocketNoActiveConnection = 16,
    /// Connection reset by peer. Code 17.
    ConnectionResetByPeer = 17,
    /// No handler registered for socket. Code 18.
    FdHandlerNotFound = 18,
    /// TLS initialization failed. Code 19.
    TlsInitialization = 19,
    /// Failed loading the CA certificate. Code 20.
    TlsFailedLoadingCertificate = 20,
    /// TLS handshake failed. Code 21.
    TlsConnect = 21,
    /// TLS write failed. Code 22.
    TlsWrite = 22,
    /// TLS read failed. Code 23.
    TlsRead = 23,
    /// MQTT serializer error. Code 24.
    MqttSerializer = 24,
    /// MQTT parser error. Code 25.
    MqttParser = 25,
    /// MQTT message id does not match any task. Code 26.
    MqttUnknownMessageId = 26,
    /// Unknown MQTT logic task. Code 27.
    MqttLogicUnknownTaskId = 27,
    /// Wrong MQTT logic scenario. Code 28.
    MqttLogicWrongScenarioType = 28,
    /// Unexpected MQTT message received. Code 29.
    MqttLogicWrongMessageReceived = 29,
    /// Broker rejected the protocol version. Code 30.
    MqttUnacceptableProtocolVersion = 30,
    /// Broker rejected the client identifier. Code 31.
    MqttIdentifierRejected = 31,
    /// Broker unavailable. Code 32.
    MqttServerUnavailable = 32,
    /// Bad user name or password. Code 33.
    MqttBadUsernameOrPassword = 33,
    /// Client not authorized. Code 34.
    MqttNotAuthorized = 34,
    /// Unknown CONNACK return code. Code 35.
    MqttConnectUnknownReturnCode = 35,
    /// Unknown MQTT message class. Code 36.
    MqttMessageClassUnknown = 36,
    /// MQTT payload too large. Code 37.
    MqttPayloadSizeTooLarge = 37,
    /// Subscription rejected by broker. Code 38.
    MqttSubscriptionFailed = 38,
    /// Subscription granted by broker. Code 39.
    MqttSubscriptionSuccessful = 39,
    /// Internal error. Code 40.
    InternalError = 40,
    /// Not initialized. Code 41.
    NotInitialized = 41,
    /// Initialization failed. Code 42.
    FailedInitialization = 42,
    /// Already initialized. Code 43.
    AlreadyInitialized = 43,
    /// Invalid parameter. Code 44.
    InvalidParameter = 44,
    /// Handler not set. Code 45.
    UnsetHandler = 45,
    /// Not implemented. Code 46.
    NotImplemented = 46,
    /// Element not found. Code 47.
    ElementNotFound = 47,
    /// Serialization failed. Code 48.
    Serialization = 48,
    /// Output truncated. Code 49.
    TruncationWarning = 49,
    /// Buffer overflow. Code 50.
    BufferOverflow = 50,
    /// Thread error. Code 51.
    ThreadError = 51,
    /// The passed or default context is null. Code 52.
    NullContext = 52,
    /// The last will topic cannot be null. Code 53.
    NullWillTopic = 53,
    /// The last will message cannot be null. Code 54.
    NullWillMessage = 54,
    /// No more resources available. Code 55.
    NoMoreResourceAvailable = 55,
    /// Resource not available. Code 56.
    FsResourceNotAvailable = 56,
    /// Filesystem error. Code 57.
    FsError = 57,
    /// Not supported. Code 58.
    NotSupported = 58,
    /// Event processing stopped. Code 59.
    EventProcessStopped = 59,
    /// Message must be resent. Code 60.
    StateResend = 60,
    /// Host cannot be null. Code 61.
    NullHost = 61,
    /// Server certificate verification failed. Code 62.
    TlsFailedCertError = 62,
    /// Failed opening resource. Code 63.
    FsOpen = 63,
    /// Resource is read only. Code 64.
    FsOpenReadOnly = 64,
    /// Failed reading resource. Code 65.
    FsRead = 65,
    /// Failed writing resource. Code 66.
    FsWrite = 66,
    /// Failed closing resource. Code 67.
    FsClose = 67,
    /// Failed removing resource. Code 68.
    FsRemove = 68,
    /// Project id cannot be null. Code 69.
    NullProjectId = 69,
    /// Signing algorithm not supported. Code 70.
    AlgNotSupported = 70,
    /// Failed forming the JWT. Code 71.
    JwtFormation = 71,
    /// Project id too long for the JWT. Code 72.
    JwtProjectIdTooLong = 72,
    /// Device path cannot be null. Code 73.
    NullDevicePath = 73,
    /// Buffer too small. Code 74.
    BufferTooSmall = 74,
    /// Private key data cannot be null. Code 75.
    NullKeyData = 75,
    /// Client id cannot be null. Code 76.
    NullClientId = 76,
}

/// Number of status codes.
pub const STATE_COUNT: usize = 77;

const DESCRIPTIONS: [&str; STATE_COUNT] = [
    "operation succeeded",
    "operation timed out",
    "layer is waiting for the socket to become readable",
    "layer is waiting for the socket to become writable",
    "buffer fully written",
    "buffer could not be written",
    "backoff is in a non-recoverable state",
    "out of memory",
    "socket initialization failed",
    "host name resolution failed",
    "socket option query failed",
    "socket error",
    "socket connection failed",
    "socket shutdown failed",
    "socket write failed",
    "socket read failed",
    "no active connection",
    "connection reset by peer",
    "no handler registered for socket",
    "TLS initialization failed",
    "failed loading the CA certificate",
    "TLS handshake failed",
    "TLS write failed",
    "TLS read failed",
    "MQTT serializer error",
    "MQTT parser error",
    "MQTT message id does not match any task",
    "unknown MQTT logic task",
    "wrong MQTT logic scenario",
    "unexpected MQTT message received",
    "broker rejected the protocol version",
    "broker rejected the client identifier",
    "broker unavailable",
    "bad user name or password",
    "client not authorized",
    "unknown CONNACK return code",
    "unknown MQTT message class",
    "MQTT payload too large",
    "subscription rejected by broker",
    "subscription granted by broker",
    "internal error",
    "not initialized",
    "initialization failed",
    "already initialized",
    "invalid parameter",
    "handler not set",
    "not implemented",
    "element not found",
    "serialization failed",
    "output truncated",
    "buffer overflow",
    "thread error",
    "the passed or default context is null",
    "the last will topic cannot be null",
    "the last will message cannot be null",
    "no more resources available",
    "resource not available",
    "filesystem error",
    "not supported",
    "event processing stopped",
    "message must be resent",
    "host cannot be null",
    "server certificate verification failed",
    "failed opening resource",
    "resource is read only",
    "failed reading resource",
    "failed writing resource",
    "failed closing resource",
    "failed removing resource",
    "project id cannot be null",
    "signing algorithm not supported",
    "failed forming the JWT",
    "project id too long for the JWT",
    "device path cannot be null",
    "buffer too small",
    "private key data cannot be null",
    "client id cannot be null",
];

const ALL: [State; STATE_COUNT] = [
    State::Ok,
    State::Timeout,
    State::WantRead,
    State::WantWrite,
    State::Written,
    State::FailedWriting,
    State::BackoffTerminal,
    State::OutOfMemory,
    State::SocketInitialization,
    State::SocketGetHostByName,
    State::SocketGetSockOpt,
    State::Socket,
    State::SocketConnection,
    State::SocketShutdown,
    State::SocketWrite,
    State::SocketRead,
    State::SocketNoActiveConnection,
    State::ConnectionResetByPeer,
    State::FdHandlerNotFound,
    State::TlsInitialization,
    State::TlsFailedLoadingCertificate,
    State::TlsConnect,
    State::TlsWrite,
    State::TlsRead,
    State::MqttSerializer,
    State::MqttParser,
    State::MqttUnknownMessageId,
    State::MqttLogicUnknownTaskId,
    State::MqttLogicWrongScenarioType,
    State::MqttLogicWrongMessageReceived,
    State::MqttUnacceptableProtocolVersion,
    State::MqttIdentifierRejected,
    State::MqttServerUnavailable,
    State::MqttBadUsernameOrPassword,
    State::MqttNotAuthorized,
    State::MqttConnectUnknownReturnCode,
    State::MqttMessageClassUnknown,
    State::MqttPayloadSizeTooLarge,
    State::MqttSubscriptionFailed,
    State::MqttSubscriptionSuccessful,
    State::InternalError,
    State::NotInitialized,
    State::FailedInitialization,
    State::AlreadyInitialized,
    State::InvalidParameter,
    State::UnsetHandler,
    State::NotImplemented,
    State::ElementNotFound,
    State::Serialization,
    State::TruncationWarning,
    State::BufferOverflow,
    State::ThreadError,
    State::NullContext,
    State::NullWillTopic,
    State::NullWillMessage,
    State::NoMoreResourceAvailable,
    State::FsResourceNotAvailable,
    State::FsError,
    State::NotSupported,
    State::EventProcessStopped,
    State::StateResend,
    State::NullHost,
    State::TlsFailedCertError,
    State::FsOpen,
    State::FsOpenReadOnly,
    State::FsRead,
    State::FsWrite,
    State::FsClose,
    State::FsRemove,
    State::NullProjectId,
    State::AlgNotSupported,
    State::JwtFormation,
    State::JwtProjectIdTooLong,
    State::NullDevicePath,
    State::BufferTooSmall,
    State::NullKeyData,
    State::NullClientId,
];

impl State {
    /// Integer code of this state.
    pub const fn code(self) -> i32 {
        self as i32
    }

    /// Looks a state up by its integer code.
    pub fn from_code(code: i32) -> Option<State> {
        usize::try_from(code).ok().and_then(|i| ALL.get(i).copied())
    }

    /// Human-readable description, looked up by code.
    pub fn as_str(self) -> &'static str {
        DESCRIPTIONS[self as usize]
    }

    /// `true` for [`State::Ok`].
    pub const fn is_ok(self) -> bool {
        matches!(self, State::Ok)
    }
}

impl core::fmt::Display for State {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for State {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "{}({})", self.as_str(), self.code())
    }
}
