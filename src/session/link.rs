//! Socket links: how a session reaches `ConnectionState::Open`
//!
//! The two session roles differ only here:
//!
//! | Link | Role | Establish |
//! |------|------|-----------|
//! | [`Dialer`] | outbound | `connect` to host:port with a timeout |
//! | [`Acceptor`] | inbound | `accept` one peer, bounded by a timeout |
//!
//! Everything else (ticking, idle handling, framing) lives in
//! [`Session`](super::Session) and is shared.

use crate::error::{Error, Result};
use std::io::{ErrorKind, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::time::{Duration, Instant};

/// Poll interval while waiting for an inbound peer
const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Outcome of one establish attempt that did not fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attempt {
    /// Socket is open and writable
    Open,
    /// Still waiting (inbound: listening, no peer within the timeout)
    Pending,
}

/// Transport used by a session
///
/// Implementations own at most one peer socket at a time.
pub trait Link: Send {
    /// Try to open the peer socket; must return within a bounded time
    fn establish(&mut self) -> Result<Attempt>;

    /// Write one already-encoded message; on error the socket is released
    fn send(&mut self, message: &[u8]) -> Result<()>;

    /// Release the peer socket (idempotent)
    fn close(&mut self);

    /// Release everything, including listeners
    fn shutdown(&mut self) {
        self.close();
    }

    fn is_open(&self) -> bool;

    /// Housekeeping while open; returns the number of extra peers turned away
    fn maintain(&mut self) -> u64 {
        0
    }

    /// Human-readable endpoint for logs
    fn endpoint(&self) -> &str;

    /// Locally bound address, if any
    fn local_addr(&self) -> Option<SocketAddr> {
        None
    }
}

/// Socket options applied to every peer stream
#[derive(Debug, Clone, Copy)]
pub struct StreamOptions {
    /// Bound on a single blocking write
    pub write_timeout: Duration,
}

impl StreamOptions {
    fn apply(&self, stream: &TcpStream) {
        // Disable Nagle's algorithm; frames are written whole
        if let Err(e) = stream.set_nodelay(true) {
            log::debug!("Failed to set TCP_NODELAY: {}", e);
        }
        if let Err(e) = stream.set_write_timeout(Some(self.write_timeout)) {
            log::warn!("Failed to set write timeout: {}", e);
        }
    }
}

fn write_message(stream: &mut TcpStream, message: &[u8]) -> std::io::Result<()> {
    stream.write_all(message)?;
    stream.flush()
}

fn release(stream: Option<TcpStream>) {
    if let Some(stream) = stream {
        let _ = stream.shutdown(Shutdown::Both);
    }
}

/// Outbound link: dials a fixed `host:port`
///
/// The host name is resolved once, on construction, so an attempt is
/// bounded by `connect_timeout` per resolved address.
pub struct Dialer {
    endpoint: String,
    addrs: Vec<SocketAddr>,
    connect_timeout: Duration,
    options: StreamOptions,
    stream: Option<TcpStream>,
}

impl Dialer {
    pub fn new(
        host: &str,
        port: u16,
        connect_timeout: Duration,
        options: StreamOptions,
    ) -> Result<Self> {
        let endpoint = format!("{}:{}", host, port);
        let addrs: Vec<SocketAddr> = match (host, port).to_socket_addrs() {
            Ok(addrs) => addrs.collect(),
            Err(source) => return Err(Error::ConnectFailure { endpoint, source }),
        };
        if addrs.is_empty() {
            return Err(Error::ConnectFailure {
                endpoint,
                source: std::io::Error::new(
                    ErrorKind::AddrNotAvailable,
                    "host resolved to no addresses",
                ),
            });
        }
        log::debug!("{} resolved to {:?}", endpoint, addrs);

        Ok(Self {
            endpoint,
            addrs,
            connect_timeout,
            options,
            stream: None,
        })
    }

    fn connect_any(&self) -> std::io::Result<TcpStream> {
        let mut last_error = None;
        for addr in &self.addrs {
            match TcpStream::connect_timeout(addr, self.connect_timeout) {
                Ok(stream) => return Ok(stream),
                Err(e) => last_error = Some(e),
            }
        }
        Err(last_error.unwrap_or_else(|| ErrorKind::AddrNotAvailable.into()))
    }
}

impl Link for Dialer {
    fn establish(&mut self) -> Result<Attempt> {
        if self.stream.is_some() {
            return Ok(Attempt::Open);
        }

        let stream = self.connect_any().map_err(|source| Error::ConnectFailure {
            endpoint: self.endpoint.clone(),
            source,
        })?;
        self.options.apply(&stream);
        log::info!("Connected to {}", self.endpoint);
        self.stream = Some(stream);
        Ok(Attempt::Open)
    }

    fn send(&mut self, message: &[u8]) -> Result<()> {
        let Some(stream) = self.stream.as_mut() else {
            return Err(Error::WriteFailure(ErrorKind::NotConnected.into()));
        };
        if let Err(e) = write_message(stream, message) {
            self.close();
            return Err(Error::WriteFailure(e));
        }
        Ok(())
    }

    fn close(&mut self) {
        release(self.stream.take());
    }

    fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn local_addr(&self) -> Option<SocketAddr> {
        self.stream.as_ref().and_then(|s| s.local_addr().ok())
    }
}

/// Inbound link: listens on a port and serves one peer at a time
///
/// The listener is bound lazily on the first attempt and kept across peer
/// disconnects. Accepting is polled in non-blocking mode so an attempt
/// never outlives `accept_timeout`.
pub struct Acceptor {
    endpoint: String,
    accept_timeout: Duration,
    options: StreamOptions,
    listener: Option<TcpListener>,
    stream: Option<TcpStream>,
}

impl Acceptor {
    pub fn new(
        bind_host: &str,
        port: u16,
        accept_timeout: Duration,
        options: StreamOptions,
    ) -> Self {
        Self {
            endpoint: format!("{}:{}", bind_host, port),
            accept_timeout,
            options,
            listener: None,
            stream: None,
        }
    }

    fn bind(&mut self) -> Result<&TcpListener> {
        if self.listener.is_none() {
            let bind = || -> std::io::Result<TcpListener> {
                let listener = TcpListener::bind(&self.endpoint)?;
                listener.set_nonblocking(true)?;
                Ok(listener)
            };
            let listener = bind().map_err(|source| Error::ConnectFailure {
                endpoint: self.endpoint.clone(),
                source,
            })?;
            if let Ok(addr) = listener.local_addr() {
                log::info!("Listening for peer on {}", addr);
            }
            self.listener = Some(listener);
        }
        self.listener
            .as_ref()
            .ok_or_else(|| Error::Other("listener unavailable".into()))
    }

    fn accept_within(&mut self) -> Result<Option<(TcpStream, SocketAddr)>> {
        let endpoint = self.endpoint.clone();
        let timeout = self.accept_timeout;
        let listener = self.bind()?;
        let deadline = Instant::now() + timeout;

        loop {
            match listener.accept() {
                Ok(pair) => return Ok(Some(pair)),
                Err(ref e) if e.kind() == ErrorKind::WouldBlock => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Ok(None);
                    }
                    std::thread::sleep(ACCEPT_POLL_INTERVAL.min(deadline - now));
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(source) => return Err(Error::ConnectFailure { endpoint, source }),
            }
        }
    }
}

impl Link for Acceptor {
    fn establish(&mut self) -> Result<Attempt> {
        if self.stream.is_some() {
            return Ok(Attempt::Open);
        }

        let Some((stream, addr)) = self.accept_within()? else {
            return Ok(Attempt::Pending);
        };

        // Accepted sockets may inherit non-blocking mode from the listener
        stream.set_nonblocking(false).map_err(|source| Error::ConnectFailure {
            endpoint: addr.to_string(),
            source,
        })?;
        self.options.apply(&stream);
        log::info!("Peer connected: {}", addr);
        self.stream = Some(stream);
        Ok(Attempt::Open)
    }

    fn send(&mut self, message: &[u8]) -> Result<()> {
        let Some(stream) = self.stream.as_mut() else {
            return Err(Error::WriteFailure(ErrorKind::NotConnected.into()));
        };
        if let Err(e) = write_message(stream, message) {
            self.close();
            return Err(Error::WriteFailure(e));
        }
        Ok(())
    }

    fn close(&mut self) {
        release(self.stream.take());
    }

    fn shutdown(&mut self) {
        self.close();
        self.listener = None;
    }

    fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    /// Turn away peers that connect while one is already being served
    fn maintain(&mut self) -> u64 {
        if self.stream.is_none() {
            return 0;
        }
        let Some(listener) = self.listener.as_ref() else {
            return 0;
        };

        let mut rejected = 0;
        loop {
            match listener.accept() {
                Ok((extra, addr)) => {
                    log::warn!(
                        "Rejecting connection from {}: already serving a peer",
                        addr
                    );
                    let _ = extra.shutdown(Shutdown::Both);
                    rejected += 1;
                }
                Err(ref e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(e) => {
                    log::debug!("Accept error while serving peer: {}", e);
                    break;
                }
            }
        }
        rejected
    }

    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn local_addr(&self) -> Option<SocketAddr> {
        self.listener.as_ref().and_then(|l| l.local_addr().ok())
    }
}
