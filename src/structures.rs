use crate::error::{ConfError, ProbeError};
use crate::summary::Summary;
use bytes::Bytes;
use socket2::SockAddr;
use std::net::{IpAddr, Ipv4Addr, SocketAddrV4};
use std::process;
use std::time::Duration;

pub const DEFAULT_PAYLOAD: &str = "pingo!";
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SocketFlavor {
    /// Unprivileged ICMP datagram socket.
    #[default]
    Dgram,
    Raw,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub ip: Ipv4Addr,
    pub flavor: SocketFlavor,
}

impl Target {
    pub fn parse(addr: &str, flavor: SocketFlavor) -> Result<Self, ConfError> {
        let ip = addr
            .trim()
            .parse::<IpAddr>()
            .map_err(|source| ConfError::InvalidAddress {
                addr: addr.to_string(),
                source,
            })?;
        match ip {
            IpAddr::V4(ip) => Ok(Self { ip, flavor }),
            IpAddr::V6(_) => Err(ConfError::Ipv6Unsupported(addr.to_string())),
        }
    }

    pub(crate) fn sock_addr(&self) -> SockAddr {
        SockAddr::from(SocketAddrV4::new(self.ip, 0))
    }
}

/// Echo identifier derived from the process id, as ping(8) does.
pub fn process_identifier() -> u16 {
    (process::id() & 0xffff) as u16
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeRequest {
    identifier: u16,
    sequence: u16,
    payload: Bytes,
}

impl ProbeRequest {
    pub fn new(identifier: u16, sequence: u16, payload: Bytes) -> Self {
        Self {
            identifier,
            sequence,
            payload,
        }
    }

    pub fn identifier(&self) -> u16 {
        self.identifier
    }

    pub fn sequence(&self) -> u16 {
        self.sequence
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }
}

pub type ProbeOutcome = Result<Duration, ProbeError>;

/// Validated, immutable parameters of one run.
#[derive(Debug, Clone)]
pub struct SessionConf {
    pub target: Target,
    pub payload: Bytes,
    pub interval: Duration,
    /// `None` blocks until a reply or a socket error.
    pub timeout: Option<Duration>,
}

impl SessionConf {
    pub fn new(
        addr: &str,
        flavor: SocketFlavor,
        payload: impl Into<Bytes>,
        interval: Duration,
        timeout: Duration,
        single: bool,
    ) -> Result<Self, ConfError> {
        let target = Target::parse(addr, flavor)?;
        if !single && interval.is_zero() {
            return Err(ConfError::NonPositiveInterval);
        }
        let timeout = if timeout.is_zero() { None } else { Some(timeout) };
        Ok(Self {
            target,
            payload: payload.into(),
            interval,
            timeout,
        })
    }
}

#[derive(Debug)]
pub enum ProbeEvent {
    Started {
        target: Ipv4Addr,
        interval: Duration,
    },
    Succeeded {
        seq: u16,
        rtt: Duration,
    },
    Failed {
        seq: u16,
        error: ProbeError,
    },
    Ended {
        summary: Option<Summary>,
    },
}
