//! Tokio driver for the connection engine.
//!
//! [`Driver`] owns a [`Client`] wired to tokio-backed collaborators and runs
//! the event loop: it performs the socket, lookup and timer work the engine
//! asks for and feeds the outcomes back as [`Event`]s. Commands from other
//! tasks arrive through a [`DriverHandle`].
//!
//! Socket reads are buffered until they hold a complete handshake head or
//! whole frames, which are then handed to the engine as one `Received`
//! event. The read buffer is sized by [`Config::read_capacity`] so the head
//! and one maximum-size frame always fit. Every lookup, connect and write is
//! bounded by the pending inactivity deadline.

use std::collections::VecDeque;
use std::future::Future;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use bytes::Bytes;
use log::{debug, trace, warn};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::config::Config;
use crate::connection::{Client, Command, ConnectionState, Event};
use crate::error::{Error, Result};
use crate::handler::Handler;
use crate::platform::{Resolution, Resolver, Timer, Transport};
use crate::protocol::{Frame, OpCode};

const COMMAND_QUEUE: usize = 32;
const UNKNOWN_ERROR: i32 = -1;
const HEAD_END: &[u8] = b"\r\n\r\n";
const CLOSE_WRITE_GRACE: Duration = Duration::from_secs(1);

#[derive(Debug)]
enum TransportOp {
    Connect(SocketAddr),
    Send(Bytes),
    Disconnect,
}

/// Transport that records requests for the driver to carry out.
#[derive(Debug, Default)]
pub struct TokioTransport {
    ops: VecDeque<TransportOp>,
}

impl Transport for TokioTransport {
    fn connect(&mut self, remote: SocketAddr) -> Result<()> {
        self.ops.push_back(TransportOp::Connect(remote));
        Ok(())
    }

    fn send(&mut self, data: Bytes) -> Result<()> {
        self.ops.push_back(TransportOp::Send(data));
        Ok(())
    }

    fn disconnect(&mut self) {
        self.ops.push_back(TransportOp::Disconnect);
    }
}

/// Resolver backed by [`tokio::net::lookup_host`].
#[derive(Debug, Default)]
pub struct TokioResolver {
    pending: Option<String>,
}

impl Resolver for TokioResolver {
    fn resolve(&mut self, host: &str) -> Result<Resolution> {
        self.pending = Some(host.to_owned());
        Ok(Resolution::Pending)
    }
}

/// Timer holding a single deadline on the tokio clock.
#[derive(Debug, Default)]
pub struct TokioTimer {
    deadline: Option<Instant>,
    generation: u64,
}

impl TokioTimer {
    /// Pending deadline, if armed.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Generation of the latest arming.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

impl Timer for TokioTimer {
    fn arm(&mut self, after: Duration, generation: u64) {
        self.deadline = Some(Instant::now() + after);
        self.generation = generation;
    }

    fn cancel(&mut self) {
        self.deadline = None;
    }
}

/// Cloneable handle for sending commands to a running [`Driver`].
#[derive(Debug, Clone)]
pub struct DriverHandle {
    commands: mpsc::Sender<Command>,
}

impl DriverHandle {
    /// Queue a command for the driver.
    ///
    /// # Errors
    ///
    /// Returns `Error::Transport` if the driver has been dropped.
    pub async fn execute(&self, command: Command) -> Result<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| Error::Transport("driver stopped".into()))
    }

    /// Queue a Text frame.
    pub async fn send_text(&self, text: impl Into<String>) -> Result<()> {
        self.execute(Command::text(text)).await
    }

    /// Queue a Binary frame.
    pub async fn send_binary(&self, data: impl Into<Vec<u8>>) -> Result<()> {
        self.execute(Command::binary(data)).await
    }

    /// Queue a frame with any opcode.
    pub async fn send(&self, opcode: OpCode, payload: impl Into<Vec<u8>>) -> Result<()> {
        self.execute(Command::Send {
            opcode,
            payload: payload.into(),
        })
        .await
    }

    /// Queue a client-initiated close.
    pub async fn disconnect(&self) -> Result<()> {
        self.execute(Command::Disconnect).await
    }
}

/// Engine type driven by [`Driver`].
pub type TokioClient<H> = Client<TokioTransport, TokioResolver, TokioTimer, H>;

/// Runs a [`Client`] on tokio.
///
/// ## Example
///
/// ```rust,ignore
/// let (mut driver, handle) = Driver::new(handler, Config::new());
/// driver.connect("127.0.0.1", 8080, "/")?;
/// tokio::spawn(async move { handle.send_text("hi").await });
/// driver.run().await;
/// ```
pub struct Driver<H> {
    client: TokioClient<H>,
    stream: Option<TcpStream>,
    commands: mpsc::Receiver<Command>,
    read_buf: Vec<u8>,
    filled: usize,
}

impl<H: Handler> Driver<H> {
    /// Create an idle driver and the handle that feeds it.
    pub fn new(handler: H, config: Config) -> (Self, DriverHandle) {
        let (tx, rx) = mpsc::channel(COMMAND_QUEUE);
        let read_buf = vec![0u8; config.read_capacity()];
        let client = Client::new(
            TokioTransport::default(),
            TokioResolver::default(),
            TokioTimer::default(),
            handler,
            config,
        );

        let driver = Self {
            client,
            stream: None,
            commands: rx,
            read_buf,
            filled: 0,
        };
        (driver, DriverHandle { commands: tx })
    }

    /// Start a connection attempt. Progress happens in [`run`](Self::run).
    ///
    /// # Errors
    ///
    /// See [`Client::connect`].
    pub fn connect(&mut self, host: &str, port: u16, path: &str) -> Result<()> {
        self.client.connect(host, port, path)
    }

    /// Borrow the engine.
    pub fn client(&self) -> &TokioClient<H> {
        &self.client
    }

    /// Mutably borrow the engine.
    pub fn client_mut(&mut self) -> &mut TokioClient<H> {
        &mut self.client
    }

    /// Consume the driver, returning the handler.
    pub fn into_handler(self) -> H {
        self.client.into_handler()
    }

    /// Drive the current attempt until the connection is closed.
    ///
    /// Returns immediately if no attempt is in progress.
    pub async fn run(&mut self) {
        loop {
            self.flush().await;

            if !self.client.state().is_active() {
                debug!("driver stopping, state {}", self.client.state());
                return;
            }

            let deadline = self.client.timer().deadline();

            tokio::select! {
                read = read_some(&mut self.stream, &mut self.read_buf[self.filled..]) => match read {
                    Ok(0) => {
                        self.drop_stream();
                        self.client.handle(Event::Disconnected);
                    }
                    Ok(n) => {
                        trace!("read {} bytes", n);
                        self.filled += n;
                        self.deliver();
                    }
                    Err(err) => {
                        warn!("read failed: {}", err);
                        self.drop_stream();
                        self.client.handle(Event::Error(error_code(&err)));
                    }
                },
                () = expiry(deadline) => self.expire(),
                Some(command) = self.commands.recv() => {
                    if let Err(err) = self.client.execute(command) {
                        warn!("command rejected: {}", err);
                    }
                }
            }
        }
    }

    async fn flush(&mut self) {
        loop {
            if let Some(host) = self.client.resolver_mut().pending.take() {
                self.lookup(&host).await;
                continue;
            }

            let Some(op) = self.client.transport_mut().ops.pop_front() else {
                return;
            };

            match op {
                TransportOp::Connect(remote) => self.open(remote).await,
                TransportOp::Send(data) => self.write(&data).await,
                TransportOp::Disconnect => {
                    self.filled = 0;
                    if let Some(mut stream) = self.stream.take() {
                        let _ = stream.shutdown().await;
                    }
                }
            }
        }
    }

    async fn lookup(&mut self, host: &str) {
        let deadline = self.client.timer().deadline();
        match within(deadline, tokio::net::lookup_host((host, 0))).await {
            Some(result) => {
                let ip: Option<IpAddr> = result
                    .ok()
                    .and_then(|mut addrs| addrs.next())
                    .map(|addr| addr.ip());
                self.client.handle(Event::Resolved(ip));
            }
            None => self.expire(),
        }
    }

    async fn open(&mut self, remote: SocketAddr) {
        let deadline = self.client.timer().deadline();
        match within(deadline, TcpStream::connect(remote)).await {
            Some(Ok(stream)) => {
                let _ = stream.set_nodelay(true);
                self.stream = Some(stream);
                self.filled = 0;
                self.client.handle(Event::Connected);
            }
            Some(Err(err)) => {
                warn!("connect to {} failed: {}", remote, err);
                self.client.handle(Event::Error(error_code(&err)));
            }
            None => self.expire(),
        }
    }

    async fn write(&mut self, data: &[u8]) {
        let active = self.client.state().is_active();
        let Some(stream) = self.stream.as_mut() else {
            if active {
                self.client.handle(Event::Error(UNKNOWN_ERROR));
            } else {
                trace!("dropping {} queued bytes, socket closed", data.len());
            }
            return;
        };

        // Closing frames are written after the timer stops.
        let deadline = self
            .client
            .timer()
            .deadline()
            .or_else(|| (!active).then(|| Instant::now() + CLOSE_WRITE_GRACE));

        match within(deadline, stream.write_all(data)).await {
            Some(Ok(())) => self.client.handle(Event::Sent),
            Some(Err(err)) => {
                warn!("write failed: {}", err);
                self.drop_stream();
                self.client.handle(Event::Error(error_code(&err)));
            }
            None => {
                warn!("write of {} bytes stalled past the deadline", data.len());
                self.drop_stream();
                self.expire();
            }
        }
    }

    /// Hand the engine every complete unit in the read buffer, keeping any
    /// trailing partial frame for the next read.
    fn deliver(&mut self) {
        let buffered = &self.read_buf[..self.filled];
        let mut ready = match self.client.state() {
            ConnectionState::AwaitingHandshake => match find(buffered, HEAD_END) {
                Some(pos) => {
                    let head = pos + HEAD_END.len();
                    head + complete_frames(&buffered[head..])
                }
                None => 0,
            },
            ConnectionState::Open => complete_frames(buffered),
            _ => self.filled,
        };

        // A unit that cannot fit is passed through so the engine reports it.
        if ready == 0 && self.filled == self.read_buf.len() {
            ready = self.filled;
        }
        if ready == 0 {
            trace!("{} bytes buffered, waiting for more", self.filled);
            return;
        }

        self.client.handle(Event::Received(&mut self.read_buf[..ready]));
        self.read_buf.copy_within(ready..self.filled, 0);
        self.filled -= ready;
    }

    fn drop_stream(&mut self) {
        self.stream = None;
        self.filled = 0;
    }

    fn expire(&mut self) {
        let generation = self.client.timer().generation();
        self.client.timer_mut().cancel();
        if self.client.state() != ConnectionState::Closed {
            self.client.handle(Event::TimerFired(generation));
        }
    }
}

/// Length of the whole frames at the front of `buf`. A malformed header
/// counts the rest of the buffer so the engine sees it.
fn complete_frames(buf: &[u8]) -> usize {
    let mut used = 0;
    while used < buf.len() {
        match Frame::wire_len(&buf[used..]) {
            Ok(Some(len)) if len <= buf.len() - used => used += len,
            Ok(_) => break,
            Err(_) => return buf.len(),
        }
    }
    used
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

fn error_code(err: &std::io::Error) -> i32 {
    err.raw_os_error().unwrap_or(UNKNOWN_ERROR)
}

async fn read_some(stream: &mut Option<TcpStream>, buf: &mut [u8]) -> std::io::Result<usize> {
    match stream {
        Some(stream) => stream.read(buf).await,
        None => std::future::pending().await,
    }
}

async fn expiry(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

async fn within<F: Future>(deadline: Option<Instant>, fut: F) -> Option<F::Output> {
    match deadline {
        Some(deadline) => tokio::time::timeout_at(deadline, fut).await.ok(),
        None => Some(fut.await),
    }
}
