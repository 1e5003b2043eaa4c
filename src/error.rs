use std::fmt::{self, Display};
use std::io;

use tokio::sync::mpsc;

use crate::commands::{BrokerToSessionCmd, SessionToBrokerCmd};

/// Coarse classification of a failure, matching the outcomes a session or
/// the scheduler needs to branch on: is the connection dead, was the
/// packet just malformed, did a probe fail, or is this unrecoverable.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// The fixed header or packet body could not be parsed at all.
    MalformedPacket,

    /// The packet parsed but violates an MQTT rule (bad flag nibble,
    /// non-terminal `#`, QoS byte out of range, and so on).
    ProtocolViolation,

    /// CONNECT was rejected for a reason the client can fix (duplicate
    /// client id policy, empty id with `clean_session=0`).
    IdentifierRejected,

    /// A configured probe (system or user-defined) failed to collect.
    /// Never fatal: the scheduler logs it and publishes the rest of the
    /// tick's document.
    ProbeFailure,

    /// A PUBLISH could not be delivered or forwarded.
    PublishFailure,

    /// Startup or I/O failure severe enough that the process should exit.
    Fatal,
}

#[derive(Clone, Debug)]
pub struct Error {
    kind: ErrorKind,
    message: String,
}

impl Error {
    #[must_use]
    pub fn new(kind: ErrorKind, message: &str) -> Self {
        Error {
            kind,
            message: message.to_owned(),
        }
    }

    pub fn from_string(kind: ErrorKind, message: String) -> Self {
        Error { kind, message }
    }

    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

impl std::error::Error for Error {}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::from_string(ErrorKind::Fatal, format!("I/O error: {err}"))
    }
}

impl From<nas_panel_codec::DecodeError> for Error {
    fn from(err: nas_panel_codec::DecodeError) -> Self {
        Error::from_string(ErrorKind::MalformedPacket, format!("{err:?}"))
    }
}

impl From<nas_panel_codec::EncodeError> for Error {
    fn from(err: nas_panel_codec::EncodeError) -> Self {
        Error::from_string(ErrorKind::Fatal, format!("encode error: {err:?}"))
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Error::from_string(ErrorKind::Fatal, format!("config error: {err}"))
    }
}

impl From<rumqttc::ClientError> for Error {
    fn from(err: rumqttc::ClientError) -> Self {
        Error::from_string(ErrorKind::PublishFailure, format!("{err}"))
    }
}

macro_rules! convert_send_error {
    ($cmd_type: ident) => {
        impl From<mpsc::error::SendError<$cmd_type>> for Error {
            fn from(err: mpsc::error::SendError<$cmd_type>) -> Self {
                Error::from_string(
                    ErrorKind::Fatal,
                    format!("{} channel closed: {}", stringify!($cmd_type), err),
                )
            }
        }
    };
}

convert_send_error!(SessionToBrokerCmd);
convert_send_error!(BrokerToSessionCmd);
