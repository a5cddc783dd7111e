//! Async IRC client.
//!
//! Each connection runs one reader task:
//!
//! ```text
//!   TcpStream ──split──▶ FramedRead<LineCodec> ──▶ reader task
//!                                                   │
//!                    tokio::select! { line | keepalive tick | deadline | cancel }
//!                                                   │
//!          internal handlers (PING, 001, 433, tracker)  ──▶  subscribers
//!
//!   send_raw ──▶ writer lock ──▶ history check ──▶ FramedWrite<LineCodec>
//! ```
//!
//! Internal bookkeeping for a line always completes before that line is
//! published to subscribers, so observers see channel state that already
//! reflects the line. Reconnecting is the caller's job: the client only
//! reports [`ClientEvent::Timeout`] and [`ClientEvent::Disconnected`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use futures_util::{SinkExt, StreamExt};
use parking_lot::{Mutex, RwLock};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::codec::{FramedRead, FramedWrite};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, trace, warn, Instrument};

use crate::error::{IrcError, Result};
use crate::history::{OutgoingHistory, DEFAULT_HISTORY_SIZE};
use crate::line::LineCodec;
use crate::message::Event;
use crate::tracker::{ChannelTracker, RPL_WELCOME};

/// `ERR_NICKNAMEINUSE`
const ERR_NICKNAMEINUSE: u16 = 433;
/// Shortest keepalive period; tokio intervals reject zero.
const MIN_KEEPALIVE: Duration = Duration::from_millis(100);

/// Lifecycle of the client.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ConnectionState {
    /// No transport.
    #[default]
    Disconnected,
    /// TCP connect in progress.
    Connecting,
    /// Transport open, registration sent, 001 not yet seen.
    Connected,
    /// 001 received.
    Registered,
}

/// Identity and server to register with.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Registration {
    /// Desired nickname.
    pub nick: String,
    /// Username (ident).
    pub user: String,
    /// Real name / GECOS.
    pub realname: String,
    /// Server host name.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Optional server password, sent as PASS.
    pub password: Option<String>,
}

/// Client-wide behaviour, fixed for the client's lifetime.
#[derive(Clone, Debug)]
pub struct ClientOptions {
    /// Silence after which the connection is dropped. Keepalive PINGs go
    /// out every half of this.
    pub timeout: Duration,
    /// Number of outgoing lines remembered.
    pub history_size: usize,
    /// Drop a line identical to the previous non-keepalive line.
    pub no_duplicates: bool,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(300),
            history_size: DEFAULT_HISTORY_SIZE,
            no_duplicates: true,
        }
    }
}

/// Notifications published to subscribers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ClientEvent {
    /// Every line received, after internal handling.
    Raw(String),
    /// A modeled event, published right after its raw line.
    Message(Event),
    /// Registration completed (001). Carries the nick the server assigned.
    Registered {
        /// Nick from the welcome numeric.
        nick: String,
    },
    /// The server sent `ERROR`.
    ServerError(String),
    /// A stream-level failure; a disconnect follows.
    Exception(String),
    /// No traffic within the timeout window.
    Timeout,
    /// The transport was closed, for any reason.
    Disconnected,
}

struct ConnectionHandle {
    generation: u64,
    cancel: CancellationToken,
}

struct Inner {
    options: ClientOptions,
    connect_lock: tokio::sync::Mutex<()>,
    state: RwLock<ConnectionState>,
    tracker: RwLock<ChannelTracker>,
    history: Mutex<OutgoingHistory>,
    writer: tokio::sync::Mutex<Option<FramedWrite<OwnedWriteHalf, LineCodec>>>,
    connection: Mutex<Option<ConnectionHandle>>,
    generation: AtomicU64,
    last_message: Mutex<Instant>,
    subscribers: Mutex<Vec<mpsc::UnboundedSender<ClientEvent>>>,
}

/// Handle to an IRC connection. Cheap to clone.
#[derive(Clone)]
pub struct IrcClient {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for IrcClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IrcClient")
            .field("state", &self.state())
            .field("nick", &self.nick())
            .finish()
    }
}

impl IrcClient {
    /// Create a disconnected client.
    pub fn new(options: ClientOptions) -> Self {
        let history = OutgoingHistory::new(options.history_size, options.no_duplicates);
        Self {
            inner: Arc::new(Inner {
                options,
                connect_lock: tokio::sync::Mutex::new(()),
                state: RwLock::new(ConnectionState::Disconnected),
                tracker: RwLock::new(ChannelTracker::default()),
                history: Mutex::new(history),
                writer: tokio::sync::Mutex::new(None),
                connection: Mutex::new(None),
                generation: AtomicU64::new(0),
                last_message: Mutex::new(Instant::now()),
                subscribers: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Register an observer. Events are delivered in publish order per
    /// subscriber; a dropped receiver is pruned on the next publish.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<ClientEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner.subscribers.lock().push(tx);
        rx
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        *self.inner.state.read()
    }

    /// The nick the bot is currently known by.
    pub fn nick(&self) -> String {
        self.inner.tracker.read().nick().to_string()
    }

    /// Whether `nick` is in `channel`, per tracked state.
    pub fn is_member(&self, channel: &str, nick: &str) -> bool {
        self.inner.tracker.read().is_member(channel, nick)
    }

    /// Run `f` against the channel tracker under its read lock.
    pub fn with_tracker<R>(&self, f: impl FnOnce(&ChannelTracker) -> R) -> R {
        f(&self.inner.tracker.read())
    }

    /// Snapshot of the outgoing history, oldest first.
    pub fn outgoing_history(&self) -> Vec<String> {
        self.inner
            .history
            .lock()
            .lines()
            .map(str::to_string)
            .collect()
    }

    /// When the last line was received.
    pub fn last_message(&self) -> Instant {
        *self.inner.last_message.lock()
    }

    fn publish(&self, event: ClientEvent) {
        self.inner
            .subscribers
            .lock()
            .retain(|tx| tx.send(event.clone()).is_ok());
    }

    fn set_state(&self, state: ConnectionState) {
        *self.inner.state.write() = state;
    }

    /// Tear down any existing connection, connect, start the reader and
    /// send PASS/NICK/USER.
    ///
    /// Concurrent calls are serialized; a second caller waits for the first
    /// attempt to finish.
    pub async fn connect(&self, registration: &Registration) -> Result<()> {
        let _guard = self.inner.connect_lock.lock().await;

        self.close(None).await;
        self.set_state(ConnectionState::Connecting);

        let addr = format!("{}:{}", registration.host, registration.port);
        info!(addr = %addr, nick = %registration.nick, "Connecting");

        let stream = match tokio::time::timeout(
            self.inner.options.timeout,
            TcpStream::connect(&addr),
        )
        .await
        {
            Ok(Ok(stream)) => stream,
            Ok(Err(source)) => return Err(self.connect_failed(addr, source)),
            Err(_) => {
                let source = std::io::Error::new(std::io::ErrorKind::TimedOut, "connect timed out");
                return Err(self.connect_failed(addr, source));
            }
        };

        let (read_half, write_half) = stream.into_split();
        *self.inner.writer.lock().await = Some(FramedWrite::new(write_half, LineCodec::new()));
        *self.inner.tracker.write() = ChannelTracker::new(registration.nick.clone());
        *self.inner.last_message.lock() = Instant::now();

        let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let cancel = CancellationToken::new();
        *self.inner.connection.lock() = Some(ConnectionHandle {
            generation,
            cancel: cancel.clone(),
        });
        self.set_state(ConnectionState::Connected);

        let reader = FramedRead::new(read_half, LineCodec::new());
        let client = self.clone();
        tokio::spawn(
            async move { client.read_loop(reader, generation, cancel).await }
                .instrument(info_span!("irc", addr = %addr, generation)),
        );

        if let Some(password) = &registration.password {
            self.send_raw(format!("PASS {password}")).await?;
        }
        self.send_raw(format!("NICK {}", registration.nick)).await?;
        self.send_raw(format!(
            "USER {} 0 * :{}",
            registration.user, registration.realname
        ))
        .await?;
        Ok(())
    }

    fn connect_failed(&self, addr: String, source: std::io::Error) -> IrcError {
        warn!(addr = %addr, error = %source, "Connect failed");
        self.set_state(ConnectionState::Disconnected);
        self.publish(ClientEvent::Exception(source.to_string()));
        IrcError::Connect { addr, source }
    }

    /// Close the current connection, if any. Publishes `Disconnected`.
    pub async fn disconnect(&self) {
        self.close(None).await;
    }

    /// Send QUIT and close the connection.
    pub async fn quit(&self, message: &str) -> Result<()> {
        let sent = self.send_raw(format!("QUIT :{message}")).await;
        self.close(None).await;
        sent.map(|_| ())
    }

    /// Closes the connection identified by `generation`, or whatever is
    /// open when `None`. Returns false if a stale generation was given or
    /// nothing was open.
    async fn close(&self, generation: Option<u64>) -> bool {
        let handle = {
            let mut connection = self.inner.connection.lock();
            let stale = matches!(
                (connection.as_ref(), generation),
                (Some(current), Some(g)) if current.generation != g
            );
            if stale || (generation.is_some() && connection.is_none()) {
                return false;
            }
            connection.take()
        };

        let was_open = handle.is_some();
        if let Some(handle) = handle {
            handle.cancel.cancel();
        }
        if let Some(mut writer) = self.inner.writer.lock().await.take() {
            // Best effort: the socket may already be gone.
            let _ = writer.close().await;
        }
        self.set_state(ConnectionState::Disconnected);

        if was_open {
            info!("Disconnected");
            self.publish(ClientEvent::Disconnected);
        }
        was_open
    }

    /// Write one line to the server.
    ///
    /// Writes are serialized so lines never interleave. Returns `Ok(false)`
    /// when the line was suppressed as a consecutive duplicate. A write
    /// failure publishes `Exception` and closes the connection.
    pub async fn send_raw(&self, line: impl Into<String>) -> Result<bool> {
        let line = line.into();
        let mut writer = self.inner.writer.lock().await;
        let Some(sink) = writer.as_mut() else {
            return Err(IrcError::NotConnected);
        };

        if !self.inner.history.lock().record(&line) {
            debug!(line = %line, "Suppressed duplicate outgoing line");
            return Ok(false);
        }

        trace!(line = %line, ">>");
        if let Err(e) = sink.send(line).await {
            drop(writer);
            warn!(error = %e, "Write failed");
            self.publish(ClientEvent::Exception(e.to_string()));
            self.close(None).await;
            return Err(e);
        }
        Ok(true)
    }

    /// `PRIVMSG target :text`
    pub async fn privmsg(&self, target: &str, text: &str) -> Result<bool> {
        self.send_raw(format!("PRIVMSG {target} :{text}")).await
    }

    /// `NOTICE target :text`
    pub async fn notice(&self, target: &str, text: &str) -> Result<bool> {
        self.send_raw(format!("NOTICE {target} :{text}")).await
    }

    /// `JOIN channel`
    pub async fn join(&self, channel: &str) -> Result<bool> {
        self.send_raw(format!("JOIN {channel}")).await
    }

    async fn read_loop(
        self,
        mut reader: FramedRead<OwnedReadHalf, LineCodec>,
        generation: u64,
        cancel: CancellationToken,
    ) {
        let timeout = self.inner.options.timeout;
        let half = (timeout / 2).max(MIN_KEEPALIVE);
        let mut keepalive = tokio::time::interval_at(Instant::now() + half, half);
        let mut deadline = Instant::now() + timeout;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => return,
                frame = reader.next() => match frame {
                    Some(Ok(line)) => {
                        deadline = Instant::now() + timeout;
                        self.handle_line(line).await;
                    }
                    Some(Err(e)) => {
                        warn!(error = %e, "Read failed");
                        self.publish(ClientEvent::Exception(e.to_string()));
                        self.close(Some(generation)).await;
                        return;
                    }
                    None => {
                        self.publish(ClientEvent::Exception(IrcError::Closed.to_string()));
                        self.close(Some(generation)).await;
                        return;
                    }
                },
                _ = keepalive.tick() => {
                    let stamp = SystemTime::now()
                        .duration_since(UNIX_EPOCH)
                        .map(|d| d.as_secs())
                        .unwrap_or_default();
                    if self.send_raw(format!("PING :keepalive-{stamp}")).await.is_err() {
                        return;
                    }
                }
                _ = tokio::time::sleep_until(deadline) => {
                    warn!(timeout_secs = timeout.as_secs(), "Connection timed out");
                    if self.close(Some(generation)).await {
                        self.publish(ClientEvent::Timeout);
                    }
                    return;
                }
            }
        }
    }

    /// Internal handlers for one line, in fixed order, then publication.
    async fn handle_line(&self, line: String) {
        *self.inner.last_message.lock() = Instant::now();
        trace!(line = %line, "<<");

        let event = Event::parse(&line);
        let mut registered = None;

        match &event {
            Some(Event::Error(reason)) => {
                warn!(reason = %reason, "Server sent ERROR");
                self.publish(ClientEvent::ServerError(reason.clone()));
            }
            Some(Event::Ping(token)) => {
                if let Err(e) = self.send_raw(format!("PONG :{token}")).await {
                    debug!(error = %e, "Failed to answer PING");
                }
            }
            Some(Event::Numeric {
                code: RPL_WELCOME,
                target,
                ..
            }) => {
                self.set_state(ConnectionState::Registered);
                registered = Some(target.clone());
            }
            Some(Event::Numeric {
                code: ERR_NICKNAMEINUSE,
                params,
                ..
            }) if self.state() == ConnectionState::Connected => {
                if let Some(taken) = params.first() {
                    let _ = self.send_raw(format!("NICK {taken}_")).await;
                }
            }
            _ => {}
        }

        if let Some(event) = &event {
            self.inner.tracker.write().apply(event);
        }

        self.publish(ClientEvent::Raw(line));
        if let Some(nick) = registered {
            info!(nick = %nick, "Registered");
            self.publish(ClientEvent::Registered { nick });
        }
        if let Some(event) = event {
            self.publish(ClientEvent::Message(event));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_client_is_disconnected() {
        let client = IrcClient::new(ClientOptions::default());
        assert_eq!(client.state(), ConnectionState::Disconnected);
        assert!(client.outgoing_history().is_empty());
    }

    #[tokio::test]
    async fn send_without_connection_fails() {
        let client = IrcClient::new(ClientOptions::default());
        assert!(matches!(
            client.send_raw("PRIVMSG #hs :hi").await,
            Err(IrcError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn connect_refused_reports_error() {
        // Bind and drop to get a port nobody listens on.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let client = IrcClient::new(ClientOptions::default());
        let mut events = client.subscribe();
        let reg = Registration {
            nick: "bot".into(),
            user: "bot".into(),
            realname: "Bot".into(),
            host: "127.0.0.1".into(),
            port,
            password: None,
        };
        assert!(matches!(
            client.connect(&reg).await,
            Err(IrcError::Connect { .. })
        ));
        assert_eq!(client.state(), ConnectionState::Disconnected);
        assert!(matches!(events.recv().await, Some(ClientEvent::Exception(_))));
    }
}
