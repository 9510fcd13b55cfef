use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::time::{Duration, Instant};

use log::{info, warn};
use socket2::{SockRef, TcpKeepalive};

use omni_cipher::ControllerKey;
use omni_core::OmniError;
use omni_hal::{ByteStream, PlatformClock};
use omni_link::{LinkConfig, Session};

pub const DEFAULT_PORT: u16 = 4369;

#[derive(Debug, Clone, Copy)]
pub struct TcpConfig {
    pub connect_timeout: Duration,
    /// Socket read/write timeout. Expiry surfaces as `WouldBlock` so the
    /// session's own deadline decides when to give up.
    pub poll_interval: Duration,
    pub keepalive: Duration,
}

impl Default for TcpConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            poll_interval: Duration::from_millis(50),
            keepalive: Duration::from_secs(30),
        }
    }
}

pub struct TcpLink {
    stream: TcpStream,
    peer: SocketAddr,
    closed: bool,
}

impl TcpLink {
    pub fn connect(addr: SocketAddr, config: &TcpConfig) -> anyhow::Result<Self> {
        let stream = TcpStream::connect_timeout(&addr, config.connect_timeout)?;
        stream.set_nodelay(true)?;
        stream.set_read_timeout(Some(config.poll_interval))?;
        stream.set_write_timeout(Some(config.poll_interval))?;

        let keepalive = TcpKeepalive::new().with_time(config.keepalive);
        SockRef::from(&stream).set_tcp_keepalive(&keepalive)?;

        info!("TCP link up to {}", addr);
        Ok(Self { stream, peer: addr, closed: false })
    }

    pub fn peer(&self) -> SocketAddr { self.peer }
}

fn map_io(e: io::Error, op: &str) -> nb::Error<OmniError> {
    match e.kind() {
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut | io::ErrorKind::Interrupted => nb::Error::WouldBlock,
        _ => {
            warn!("TCP {} failed: {}", op, e);
            nb::Error::Other(OmniError::Transport)
        }
    }
}

impl ByteStream for TcpLink {
    fn write(&mut self, bytes: &[u8]) -> nb::Result<usize, OmniError> {
        if self.closed { return Err(nb::Error::Other(OmniError::Transport)); }
        self.stream.write(bytes).map_err(|e| map_io(e, "write"))
    }

    fn read(&mut self, buffer: &mut [u8]) -> nb::Result<usize, OmniError> {
        if self.closed { return Err(nb::Error::Other(OmniError::Transport)); }
        self.stream.read(buffer).map_err(|e| map_io(e, "read"))
    }

    fn close(&mut self) {
        if self.closed { return; }
        let _ = self.stream.shutdown(Shutdown::Both);
        self.closed = true;
        info!("TCP link to {} closed", self.peer);
    }

    fn is_closed(&self) -> bool { self.closed }
}

pub struct LinuxClock(Instant);
impl LinuxClock { pub fn new() -> Self { Self(Instant::now()) } }
impl Default for LinuxClock { fn default() -> Self { Self::new() } }
impl PlatformClock for LinuxClock {
    fn now_us(&self) -> u64 { self.0.elapsed().as_micros() as u64 }
}

/// Resolve, dial and negotiate. Returns an `Established` session.
pub fn connect(
    host: &str,
    port: u16,
    key: ControllerKey,
    link_config: LinkConfig,
    tcp_config: &TcpConfig,
) -> anyhow::Result<Session> {
    let addr = (host, port)
        .to_socket_addrs()?
        .next()
        .ok_or_else(|| anyhow::anyhow!("{}:{} did not resolve", host, port))?;

    let link = TcpLink::connect(addr, tcp_config)?;
    let mut session = Session::new(Box::new(link), Box::new(LinuxClock::new()), key, link_config);
    session.negotiate()?;
    Ok(session)
}
