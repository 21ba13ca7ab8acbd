use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use bytes::BytesMut;
use log::{debug, trace, warn};

use crate::config::Config;
use crate::connection::supervisor::TimeoutSupervisor;
use crate::connection::{Command, ConnectionState, Event, Status};
use crate::error::{Error, Result};
use crate::handler::{Control, Handler};
use crate::platform::{OsRandom, RandomSource, Resolution, Resolver, Timer, Transport};
use crate::protocol::{Frame, HandshakeKey, HandshakeRequest, OpCode, validate_response};

/// Where a connection attempt is going.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    /// Host name or IP literal.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Request path, starting with `/`.
    pub path: String,
}

impl Target {
    /// Validate and build a target.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidTarget` for an empty host, port 0, a path not
    /// starting with `/`, or whitespace or control characters in host or path.
    pub fn new(host: &str, port: u16, path: &str) -> Result<Self> {
        fn unsafe_char(c: char) -> bool {
            c.is_ascii_whitespace() || c.is_ascii_control()
        }

        if host.is_empty() {
            return Err(Error::InvalidTarget("empty host".into()));
        }
        if host.chars().any(|c| unsafe_char(c) || c == '/') {
            return Err(Error::InvalidTarget(format!("invalid host {:?}", host)));
        }
        if port == 0 {
            return Err(Error::InvalidTarget("port 0".into()));
        }
        if !path.starts_with('/') || path.chars().any(unsafe_char) {
            return Err(Error::InvalidTarget(format!("invalid path {:?}", path)));
        }

        Ok(Self {
            host: host.to_owned(),
            port,
            path: path.to_owned(),
        })
    }

    /// The host as an IP address, if it is a literal (`[...]` for IPv6).
    #[must_use]
    pub fn ip_literal(&self) -> Option<IpAddr> {
        let host = self
            .host
            .strip_prefix('[')
            .and_then(|h| h.strip_suffix(']'))
            .unwrap_or(&self.host);
        host.parse().ok()
    }
}

/// An event-driven WebSocket client for a single connection.
///
/// `Client` owns its collaborators and all connection state. It never
/// blocks: operations are started on the [`Transport`], [`Resolver`] and
/// [`Timer`], and their outcomes come back through [`handle`](Self::handle).
/// Status changes and incoming data are delivered to the [`Handler`].
///
/// ## Type Parameters
///
/// - `T`: byte-stream transport
/// - `R`: host name resolver
/// - `K`: timer backing the inactivity timeout
/// - `H`: application callbacks
/// - `G`: randomness for handshake keys and masks
///
/// ## Example
///
/// ```rust,ignore
/// use wslink::{Client, Config, Event};
///
/// let mut client = Client::new(transport, resolver, timer, handler, Config::new());
/// client.connect("example.com", 80, "/chat")?;
///
/// // later, from the host's event loop:
/// client.handle(Event::Connected);
/// client.handle(Event::Received(&mut buf[..n]));
/// client.send_text("hello")?;
/// ```
pub struct Client<T, R, K, H, G = OsRandom> {
    transport: T,
    resolver: R,
    supervisor: TimeoutSupervisor<K>,
    handler: H,
    random: G,
    config: Config,
    state: ConnectionState,
    target: Option<Target>,
    key: Option<HandshakeKey>,
    control: Control,
    write_buf: BytesMut,
}

impl<T, R, K, H> Client<T, R, K, H, OsRandom>
where
    T: Transport,
    R: Resolver,
    K: Timer,
    H: Handler,
{
    /// Create an idle client using operating system randomness.
    pub fn new(transport: T, resolver: R, timer: K, handler: H, config: Config) -> Self {
        Self::with_random(transport, resolver, timer, handler, OsRandom, config)
    }
}

impl<T, R, K, H, G> Client<T, R, K, H, G>
where
    T: Transport,
    R: Resolver,
    K: Timer,
    H: Handler,
    G: RandomSource,
{
    /// Create an idle client with a specific random source.
    pub fn with_random(
        transport: T,
        resolver: R,
        timer: K,
        handler: H,
        random: G,
        config: Config,
    ) -> Self {
        Self {
            transport,
            resolver,
            supervisor: TimeoutSupervisor::new(timer, config.timeout),
            handler,
            random,
            write_buf: BytesMut::with_capacity(config.limits.max_payload_size.min(1024)),
            config,
            state: ConnectionState::Idle,
            target: None,
            key: None,
            control: Control::new(),
        }
    }

    /// Get the current connection state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Check if the connection is open.
    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Open
    }

    /// Get the configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Target of the current or most recent attempt.
    pub fn target(&self) -> Option<&Target> {
        self.target.as_ref()
    }

    /// Change the inactivity window for the next connection attempt.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidState` while an attempt is in progress.
    pub fn set_timeout(&mut self, timeout: Duration) -> Result<()> {
        if self.state.is_active() {
            return Err(Error::InvalidState(self.state));
        }
        self.config.timeout = timeout;
        self.supervisor.set_window(timeout);
        Ok(())
    }

    /// Borrow the handler.
    pub fn handler(&self) -> &H {
        &self.handler
    }

    /// Mutably borrow the handler.
    pub fn handler_mut(&mut self) -> &mut H {
        &mut self.handler
    }

    /// Consume the client, returning the handler.
    pub fn into_handler(self) -> H {
        self.handler
    }

    /// Borrow the transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Mutably borrow the transport.
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Borrow the resolver.
    pub fn resolver(&self) -> &R {
        &self.resolver
    }

    /// Mutably borrow the resolver.
    pub fn resolver_mut(&mut self) -> &mut R {
        &mut self.resolver
    }

    /// Borrow the random source.
    pub fn random(&self) -> &G {
        &self.random
    }

    /// Mutably borrow the random source.
    pub fn random_mut(&mut self) -> &mut G {
        &mut self.random
    }

    /// Borrow the timer.
    pub fn timer(&self) -> &K {
        self.supervisor.timer()
    }

    /// Mutably borrow the timer.
    pub fn timer_mut(&mut self) -> &mut K {
        self.supervisor.timer_mut()
    }

    /// Start connecting to `ws://host:port/path`.
    ///
    /// Returns once the attempt has been started; the outcome is reported
    /// through [`Handler::on_status`]. IP literals skip name resolution.
    ///
    /// # Errors
    ///
    /// - `Error::InvalidState` if an attempt is already in progress
    /// - `Error::InvalidTarget` if host, port or path are unusable
    /// - errors from [`Resolver::resolve`] for names it rejects
    pub fn connect(&mut self, host: &str, port: u16, path: &str) -> Result<()> {
        if !self.state.can_connect() {
            warn!("connect rejected while {}", self.state);
            return Err(Error::InvalidState(self.state));
        }

        let target = Target::new(host, port, path)?;
        let resolution = match target.ip_literal() {
            Some(ip) => Resolution::Ready(ip),
            None => self.resolver.resolve(&target.host)?,
        };

        debug!("connecting to {}:{}{}", target.host, target.port, target.path);
        self.target = Some(target);
        self.key = None;

        match resolution {
            Resolution::Ready(ip) => self.connect_transport(ip),
            Resolution::Pending => self.enter(ConnectionState::ResolvingHost),
        }

        self.run_deferred();
        Ok(())
    }

    /// Send one frame.
    ///
    /// Sending a `Close` frame closes the connection as
    /// [`disconnect`](Self::disconnect) does, with `payload` as the close body.
    ///
    /// # Errors
    ///
    /// - `Error::InvalidState` unless the connection is open
    /// - `Error::FrameTooLarge` / `Error::ControlFrameTooLarge` for oversized payloads
    /// - transport errors; the connection is then closed and
    ///   [`Status::Disconnected`] reported
    pub fn send(&mut self, opcode: OpCode, payload: &[u8]) -> Result<()> {
        let result = self.send_checked(opcode, payload);
        self.run_deferred();
        result
    }

    /// Send a Text frame.
    pub fn send_text(&mut self, text: &str) -> Result<()> {
        self.send(OpCode::Text, text.as_bytes())
    }

    /// Send a Binary frame.
    pub fn send_binary(&mut self, data: &[u8]) -> Result<()> {
        self.send(OpCode::Binary, data)
    }

    /// Close the connection from this side.
    ///
    /// Sends an empty Close frame and tears the transport down. The state is
    /// `Closed` when this returns; no status is reported.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidState` unless the connection is open.
    pub fn disconnect(&mut self) -> Result<()> {
        let result = self.disconnect_checked();
        self.run_deferred();
        result
    }

    /// Run a [`Command`] as if it had been queued by a handler.
    pub fn execute(&mut self, command: Command) -> Result<()> {
        let result = self.apply(command);
        self.run_deferred();
        result
    }

    /// Feed one external event into the state machine.
    ///
    /// This is the only way transport, resolver and timer outcomes reach
    /// the client. Events that make no sense in the current state are ignored.
    pub fn handle(&mut self, event: Event<'_>) {
        trace!("{} event while {}", event.name(), self.state);

        match (self.state, event) {
            (ConnectionState::ResolvingHost, Event::Resolved(Some(ip))) => {
                self.connect_transport(ip);
            }
            (ConnectionState::ResolvingHost, Event::Resolved(None)) => {
                warn!("name resolution failed");
                self.close(Some(Status::DnsError));
            }
            (ConnectionState::Connecting, Event::Connected) => self.start_handshake(),
            (ConnectionState::AwaitingHandshake, Event::Received(data)) => {
                self.finish_handshake(data);
            }
            (ConnectionState::Open, Event::Received(data)) => {
                self.supervisor.rearm();
                self.receive_frames(data);
            }
            (state, Event::Error(code)) if state.is_active() => {
                warn!("transport error {} while {}", code, state);
                self.close(Some(Status::Disconnected));
            }
            (state, Event::Disconnected) if state.is_active() => {
                debug!("transport closed by peer while {}", state);
                self.close(Some(Status::Disconnected));
            }
            (state, Event::Sent) if state.is_active() => {
                self.supervisor.rearm();
            }
            (_, Event::TimerFired(generation)) => self.on_timeout(generation),
            (state, event) => trace!("ignoring {} while {}", event.name(), state),
        }

        self.run_deferred();
    }

    fn enter(&mut self, next: ConnectionState) {
        let prev = std::mem::replace(&mut self.state, next);
        debug!("state {} -> {}", prev, next);

        if !next.is_active() {
            self.supervisor.stop();
            self.key = None;
        } else if !prev.is_active() {
            self.supervisor.rearm();
        }
    }

    fn close(&mut self, status: Option<Status>) {
        self.enter(ConnectionState::Closed);
        if let Some(status) = status {
            self.notify(status);
        }
    }

    fn fail(&mut self, status: Status) {
        self.transport.disconnect();
        self.close(Some(status));
    }

    fn notify(&mut self, status: Status) {
        debug!("status: {}", status);
        self.handler.on_status(status, &mut self.control);
    }

    fn connect_transport(&mut self, ip: IpAddr) {
        let Some(port) = self.target.as_ref().map(|target| target.port) else {
            self.close(Some(Status::Disconnected));
            return;
        };

        let remote = SocketAddr::new(ip, port);
        self.enter(ConnectionState::Connecting);
        debug!("opening transport to {}", remote);

        if let Err(err) = self.transport.connect(remote) {
            warn!("transport refused connect to {}: {}", remote, err);
            self.close(Some(Status::Disconnected));
        }
    }

    fn start_handshake(&mut self) {
        self.enter(ConnectionState::AwaitingHandshake);
        self.supervisor.rearm();

        let request = match self.build_request() {
            Ok(request) => request,
            Err(err) => {
                warn!("cannot build handshake request: {}", err);
                self.fail(Status::HandshakeError);
                return;
            }
        };

        trace!("sending handshake request, {} bytes", request.len());
        if let Err(err) = self.transport.send(request.freeze()) {
            warn!("handshake send failed: {}", err);
            self.fail(Status::Disconnected);
        }
    }

    fn build_request(&mut self) -> Result<BytesMut> {
        let target = self
            .target
            .as_ref()
            .ok_or(Error::InvalidState(self.state))?;
        let key = HandshakeKey::generate(&mut self.random)?;
        let request = HandshakeRequest {
            host: &target.host,
            port: target.port,
            path: &target.path,
            key: &key,
        }
        .write(self.config.limits.max_request_size)?;

        self.key = Some(key);
        Ok(request)
    }

    fn finish_handshake(&mut self, data: &mut [u8]) {
        let verdict = match self.key.take() {
            Some(key) => validate_response(&key, data).and_then(|head_len| {
                self.config.limits.check_response_size(head_len)?;
                Ok(head_len)
            }),
            None => Err(Error::InvalidHandshake("no key for this attempt".into())),
        };

        let head_len = match verdict {
            Ok(head_len) => head_len,
            Err(err) => {
                warn!("handshake rejected: {}", err);
                self.fail(Status::HandshakeError);
                return;
            }
        };

        self.enter(ConnectionState::Open);
        self.supervisor.rearm();
        self.notify(Status::Connected);

        if head_len < data.len() {
            self.receive_frames(&mut data[head_len..]);
        }
    }

    fn receive_frames(&mut self, data: &mut [u8]) {
        let mut offset = 0;

        while offset < data.len() && self.state == ConnectionState::Open {
            let decoded = Frame::decode(&mut data[offset..]).and_then(|(frame, used)| {
                self.config
                    .limits
                    .check_payload_size(frame.payload().len())?;
                Ok((frame, used))
            });

            match decoded {
                Ok((frame, used)) => {
                    offset += used;
                    self.dispatch(frame);
                }
                Err(err) => {
                    warn!("dropping connection on bad frame: {}", err);
                    self.fail(Status::FrameParseError);
                    return;
                }
            }
        }
    }

    fn dispatch(&mut self, frame: Frame<'_>) {
        trace!("{} frame, {} bytes", frame.opcode, frame.payload().len());

        match frame.opcode {
            OpCode::Text | OpCode::Binary => {
                self.handler
                    .on_data(frame.opcode, frame.payload(), &mut self.control);
            }
            OpCode::Ping => {
                if let Err(err) = self.send_frame(OpCode::Pong, frame.payload()) {
                    warn!("pong not sent: {}", err);
                }
            }
            OpCode::Pong => {}
            OpCode::Close => {
                debug!("close frame received");
                let payload = frame.payload();
                let code: &[u8] = if payload.len() >= 2 { &payload[..2] } else { &[] };
                if let Err(err) = self.send_frame(OpCode::Close, code) {
                    warn!("close acknowledgement not sent: {}", err);
                }
                if self.state.is_active() {
                    self.fail(Status::Disconnected);
                }
            }
        }
    }

    fn on_timeout(&mut self, generation: u64) {
        if !self.supervisor.expire(generation) || !self.state.is_active() {
            trace!("stale timer expiry {} ignored", generation);
            return;
        }

        warn!(
            "no traffic for {:?} while {}, closing",
            self.supervisor.window(),
            self.state
        );
        self.fail(Status::ConnectionTimeout);
    }

    fn send_frame(&mut self, opcode: OpCode, payload: &[u8]) -> Result<()> {
        self.config.limits.check_payload_size(payload.len())?;

        let mut mask = [0u8; 4];
        self.random.fill(&mut mask)?;

        self.write_buf.clear();
        Frame::new(opcode, payload).encode(mask, &mut self.write_buf)?;
        let bytes = self.write_buf.split().freeze();

        trace!("sending {} frame, {} bytes on the wire", opcode, bytes.len());
        match self.transport.send(bytes) {
            Ok(()) => {
                self.supervisor.rearm();
                Ok(())
            }
            Err(err) => {
                warn!("send failed: {}", err);
                self.fail(Status::Disconnected);
                Err(err)
            }
        }
    }

    fn send_checked(&mut self, opcode: OpCode, payload: &[u8]) -> Result<()> {
        if !self.state.can_send() {
            return Err(Error::InvalidState(self.state));
        }
        if opcode == OpCode::Close {
            self.close_by_client(payload);
            return Ok(());
        }
        self.send_frame(opcode, payload)
    }

    fn disconnect_checked(&mut self) -> Result<()> {
        if !self.state.can_send() {
            return Err(Error::InvalidState(self.state));
        }
        self.close_by_client(&[]);
        Ok(())
    }

    fn close_by_client(&mut self, payload: &[u8]) {
        debug!("closing connection");
        if let Err(err) = self.send_frame(OpCode::Close, payload) {
            warn!("close frame not sent: {}", err);
        }
        if self.state.is_active() {
            self.transport.disconnect();
            self.close(None);
        }
    }

    fn apply(&mut self, command: Command) -> Result<()> {
        match command {
            Command::Send { opcode, payload } => self.send_checked(opcode, &payload),
            Command::Disconnect => self.disconnect_checked(),
        }
    }

    fn run_deferred(&mut self) {
        while let Some(command) = self.control.pop() {
            if let Err(err) = self.apply(command) {
                warn!("queued command dropped: {}", err);
            }
        }
    }
}
