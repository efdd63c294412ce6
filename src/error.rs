use crate::detectors::ParsedMessage;
use std::fmt;
use std::io;
use std::net::AddrParseError;
use std::time::Duration;

pub type Result<T> = std::result::Result<T, SessionError>;

#[derive(thiserror::Error, Debug)]
pub enum CodecError {
    #[error("payload of {len} bytes exceeds the maximum of {max}")]
    PayloadTooLarge { len: usize, max: usize },
    #[error("frame too short, got {got}, want {want}")]
    Truncated { got: usize, want: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeErrorKind {
    Encode,
    Send,
    Receive,
    DeadlineExceeded,
    TypeMismatch,
}

impl fmt::Display for ProbeErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProbeErrorKind::Encode => "encode-error",
            ProbeErrorKind::Send => "send-error",
            ProbeErrorKind::Receive => "receive-error",
            ProbeErrorKind::DeadlineExceeded => "deadline-exceeded",
            ProbeErrorKind::TypeMismatch => "type-mismatch",
        };
        f.write_str(s)
    }
}

/// Failure of a single probe attempt. Never fatal to a session.
#[derive(thiserror::Error, Debug)]
pub enum ProbeError {
    #[error("encode request: {0}")]
    Encode(#[source] CodecError),
    #[error("send request: {0}")]
    Send(#[source] io::Error),
    #[error("receive reply: {0}")]
    Receive(#[source] io::Error),
    #[error("decode reply: {0}")]
    Decode(#[source] CodecError),
    #[error("no reply within {0:?}")]
    DeadlineExceeded(Duration),
    #[error("received unexpected response type: {0}")]
    TypeMismatch(ParsedMessage),
}

impl ProbeError {
    pub fn kind(&self) -> ProbeErrorKind {
        match self {
            ProbeError::Encode(_) => ProbeErrorKind::Encode,
            ProbeError::Send(_) => ProbeErrorKind::Send,
            ProbeError::Receive(_) | ProbeError::Decode(_) => ProbeErrorKind::Receive,
            ProbeError::DeadlineExceeded(_) => ProbeErrorKind::DeadlineExceeded,
            ProbeError::TypeMismatch(_) => ProbeErrorKind::TypeMismatch,
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ConfError {
    #[error("invalid target address {addr:?}: {source}")]
    InvalidAddress {
        addr: String,
        #[source]
        source: AddrParseError,
    },
    #[error("target {0} is IPv6, only IPv4 is supported")]
    Ipv6Unsupported(String),
    #[error("interval must be positive")]
    NonPositiveInterval,
}

#[derive(thiserror::Error, Debug)]
pub enum SessionError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfError),
    #[error("open icmp socket: {0}")]
    Open(#[source] io::Error),
    #[error("probe failed: {0}")]
    Probe(#[from] ProbeError),
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum SummaryError {
    #[error("no successful probes to summarize")]
    Empty,
}
