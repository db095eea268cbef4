use std::io;
use std::time::Duration;

use thiserror::Error;

use crate::types::Reply;

/// Errors produced by an FTP session
#[derive(Debug, Error)]
pub enum FtpError {
    /// The TCP connection to the server could not be established
    #[error("failed to connect to {addr}")]
    Connect {
        addr: String,
        #[source]
        source: io::Error,
    },

    /// A network wait exceeded the session timeout
    #[error("timed out after {0:?} while {1}")]
    Timeout(Duration, &'static str),

    /// The server closed the control connection
    #[error("control connection closed by server")]
    Disconnected,

    #[error("i/o error on control connection: {0}")]
    Io(#[from] io::Error),

    /// The server sent something that is not an FTP reply
    #[error("malformed reply: {0:?}")]
    MalformedReply(String),

    /// The server answered with a code the operation does not accept
    #[error("unexpected reply to {command}: {reply}")]
    UnexpectedReply { command: String, reply: Reply },

    #[error("cannot parse passive address from {0:?}")]
    PassiveAddress(String),

    #[error("invalid session option: {0}")]
    InvalidOption(String),

    /// The data connection could not be opened or read
    #[error("data connection failed")]
    DataChannel(#[source] io::Error),

    #[error("operation cancelled")]
    Cancelled,
}

impl FtpError {
    /// Reply code carried by the error, if the server sent one
    pub fn reply_code(&self) -> Option<u16> {
        match self {
            FtpError::UnexpectedReply { reply, .. } => Some(reply.code),
            _ => None,
        }
    }
}

pub type FtpResult<T> = Result<T, FtpError>;
