use super::codec::{self, MessageType};
use super::ping_socket::{EchoSocket, PingSocket};
use crate::error::ProbeError;
use crate::structures::{ProbeOutcome, ProbeRequest, Target};
use socket2::SockAddr;
use std::io;
use std::net::Ipv4Addr;
use tokio::time::{self, Duration, Instant};
use tracing::{debug, trace, warn};

const MIN_RECV_BUF_LEN: usize = 1500;
// room for an ipv4 header with options in front of the reply
const MAX_IPV4_HEADER_LEN: usize = 60;

/// The echo transport: one endpoint aimed at one target for a whole session.
pub struct Pinger<S = PingSocket> {
    sock: Option<S>,
    dst: SockAddr,
    target: Ipv4Addr,
}

impl Pinger<PingSocket> {
    pub fn open(target: &Target) -> io::Result<Self> {
        let sock = PingSocket::new(target.flavor)?;
        Ok(Self::with_socket(sock, target))
    }
}

impl<S: EchoSocket> Pinger<S> {
    pub fn with_socket(sock: S, target: &Target) -> Self {
        Self {
            sock: Some(sock),
            dst: target.sock_addr(),
            target: target.ip,
        }
    }

    pub fn target(&self) -> Ipv4Addr {
        self.target
    }

    pub fn is_closed(&self) -> bool {
        self.sock.is_none()
    }

    /// Sends one Echo Request and waits for the next reply.
    ///
    /// The round trip is timed from the moment the send completes until the
    /// reply has been read. With a `timeout` the whole exchange is bounded by
    /// it and yields `DeadlineExceeded` once it passes.
    ///
    /// Replies are not correlated with the request: with a single probe in
    /// flight the next Echo Reply read is taken to be ours, whatever its
    /// identifier and sequence.
    pub async fn probe(&self, request: &ProbeRequest, timeout: Option<Duration>) -> ProbeOutcome {
        let started = Instant::now();
        let frame = codec::encode(request.identifier(), request.sequence(), request.payload())
            .map_err(ProbeError::Encode)?;

        match timeout {
            Some(timeout) => time::timeout_at(started + timeout, self.exchange(&frame))
                .await
                .unwrap_or(Err(ProbeError::DeadlineExceeded(timeout))),
            None => self.exchange(&frame).await,
        }
    }

    async fn exchange(&self, frame: &[u8]) -> ProbeOutcome {
        let sock = self.sock.as_ref().ok_or_else(|| {
            ProbeError::Send(io::Error::new(
                io::ErrorKind::NotConnected,
                "icmp socket already closed",
            ))
        })?;

        let sent = sock
            .send_to(frame, &self.dst)
            .await
            .map_err(ProbeError::Send)?;
        let sent_at = Instant::now();
        if sent != frame.len() {
            warn!("Send packet len:{} less than buf len:{}", sent, frame.len());
        }

        let len = MIN_RECV_BUF_LEN.max(frame.len() + MAX_IPV4_HEADER_LEN);
        let mut buf = vec![0; len];
        loop {
            let n = sock.recv(&mut buf).await.map_err(ProbeError::Receive)?;
            let rtt = sent_at.elapsed();
            let reply = codec::strip_ipv4_header(&buf[..n]);
            let msg = codec::decode(reply).map_err(ProbeError::Decode)?;
            match msg.kind {
                MessageType::EchoReply => return Ok(rtt),
                // raw sockets see our own request when pinging a local address
                MessageType::EchoRequest => {
                    trace!("Skip echo request {}", msg);
                    continue;
                }
                _ => return Err(ProbeError::TypeMismatch(msg)),
            }
        }
    }

    /// Releases the endpoint. Later calls do nothing.
    pub fn close(&mut self) {
        if self.sock.take().is_some() {
            debug!("Close icmp socket to {}", self.target);
        }
    }
}
