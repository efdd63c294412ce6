use crate::structures::SocketFlavor;
use async_trait::async_trait;
use socket2::{Domain, Protocol, SockAddr, Socket, Type};
use std::io::{Read, Result};
use std::net::{Ipv4Addr, SocketAddrV4};
use tokio::io::unix::AsyncFd;
use tracing::debug;

/// The endpoint a `Pinger` exchanges frames over.
#[async_trait]
pub trait EchoSocket: Send + Sync {
    async fn send_to(&self, buf: &[u8], addr: &SockAddr) -> Result<usize>;

    /// Reads one whole datagram into `buf`.
    async fn recv(&self, buf: &mut [u8]) -> Result<usize>;
}

pub struct PingSocket {
    inner: AsyncFd<Socket>,
}

impl PingSocket {
    pub fn new(flavor: SocketFlavor) -> Result<Self> {
        let ty = match flavor {
            SocketFlavor::Dgram => Type::DGRAM,
            SocketFlavor::Raw => Type::RAW,
        };
        let inner = Socket::new(Domain::IPV4, ty, Some(Protocol::ICMPV4))?;
        let local = SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0);
        inner.bind(&SockAddr::from(local))?;
        inner.set_nonblocking(true)?;
        debug!("Open {:?} icmp socket", flavor);
        let inner = AsyncFd::new(inner)?;
        Ok(Self { inner })
    }
}

#[async_trait]
impl EchoSocket for PingSocket {
    async fn send_to(&self, buf: &[u8], addr: &SockAddr) -> Result<usize> {
        loop {
            let mut guard = self.inner.writable().await?;

            match guard.try_io(|inner| inner.get_ref().send_to(buf, addr)) {
                Ok(s) => return s,
                Err(_would_block) => continue,
            }
        }
    }

    async fn recv(&self, buf: &mut [u8]) -> Result<usize> {
        loop {
            let mut guard = self.inner.readable().await?;
            match guard.try_io(|inner| inner.get_ref().read(buf)) {
                Ok(s) => return s,
                Err(_would_block) => continue,
            }
        }
    }
}
