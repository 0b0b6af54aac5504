//! Source session
//!
//! A session is everything tied to the currently connected source: its
//! socket, the destination connection(s) opened on its behalf, the sequence
//! counter and the reply signal shared with the retry scheduler.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use bytes::Bytes;
use log::{debug, error, info, trace, warn};
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch, Mutex as AsyncMutex};
use tokio::time::timeout;

use crate::common::{connect_with_timeout, HexDump, ProxyError, Result};
use crate::config::ProxyConfig;
use crate::crypto::RsaDecryptor;
use crate::protocol::{encode, EMPTY_FRAME};
use crate::retry::{RetryOutcome, RetryScheduler, SequenceCounter};
use super::forwarder::{spawn_reader, ReaderHandle, Side};

/// Earlier destination connections kept open for late replies
///
/// Beyond this the oldest retired connection is closed on the next connect.
pub const MAX_RETIRED_LINKS: usize = 4;

/// Components shared by every session
#[derive(Debug)]
pub struct RelayContext {
    /// Relay configuration
    pub config: Arc<ProxyConfig>,
    /// Reply decryptor, present only when a key is loaded
    pub decryptor: Option<Arc<RsaDecryptor>>,
    /// Serial forwarding queue
    pub scheduler: RetryScheduler,
}

/// One connection to the destination
#[derive(Debug)]
struct DestinationLink {
    writer: OwnedWriteHalf,
    reader: ReaderHandle,
}

impl DestinationLink {
    /// Shut the socket down, then wait for the reader to exit
    async fn close(mut self) {
        let _ = self.writer.shutdown().await;
        self.reader.stop().await;
    }
}

#[derive(Debug, Default)]
struct DestinationSlot {
    /// Connection new requests are written to
    current: Option<DestinationLink>,
    /// Earlier connections, kept reading so late replies still reach the source
    retired: Vec<DestinationLink>,
}

/// State of the connected source
#[derive(Debug)]
pub struct Session {
    id: u64,
    peer: SocketAddr,
    context: Arc<RelayContext>,
    closed: watch::Sender<bool>,
    sequence: Mutex<SequenceCounter>,
    outcome_tx: mpsc::UnboundedSender<RetryOutcome>,
    outcome_rx: AsyncMutex<mpsc::UnboundedReceiver<RetryOutcome>>,
    source_writer: AsyncMutex<Option<OwnedWriteHalf>>,
    source_reader: Mutex<Option<ReaderHandle>>,
    destination: AsyncMutex<DestinationSlot>,
}

impl Session {
    /// Build a session for a freshly accepted source connection
    ///
    /// Tries to reach the destination right away; if that fails the
    /// connection is retried when the first request is forwarded.
    pub async fn start(
        id: u64,
        stream: TcpStream,
        peer: SocketAddr,
        context: Arc<RelayContext>,
    ) -> Arc<Self> {
        let (read_half, write_half) = stream.into_split();
        let (outcome_tx, outcome_rx) = mpsc::unbounded_channel();
        let (closed, _) = watch::channel(false);

        let session = Arc::new(Self {
            id,
            peer,
            context,
            closed,
            sequence: Mutex::new(SequenceCounter::new()),
            outcome_tx,
            outcome_rx: AsyncMutex::new(outcome_rx),
            source_writer: AsyncMutex::new(Some(write_half)),
            source_reader: Mutex::new(None),
            destination: AsyncMutex::new(DestinationSlot::default()),
        });

        if session.config().use_retry {
            session.lock_sequence().initialize();
        }

        if let Err(e) = session.connect_to_destination().await {
            warn!("Session #{}: {} (will retry on first request)", id, e);
        }

        let reader = spawn_reader(
            Side::Source,
            read_half,
            Arc::clone(&session),
            session.config().buffer_size,
        );
        *lock(&session.source_reader) = Some(reader);

        session
    }

    /// Session number, increasing per accepted connection
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Source address
    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Relay configuration
    pub fn config(&self) -> &ProxyConfig {
        &self.context.config
    }

    /// Whether the source is gone or the session was superseded
    pub fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }

    fn mark_closed(&self) {
        self.closed.send_replace(true);
    }

    /// Resolves once the session is closed
    ///
    /// Pending writes race against this so a peer that stopped reading
    /// cannot hold up teardown.
    pub async fn closed(&self) {
        let mut closed = self.closed.subscribe();
        // The sender lives as long as the session
        let _ = closed.wait_for(|closed| *closed).await;
    }

    /// Tear the session down: close every socket, then join every reader
    pub async fn close(&self) {
        info!("Session #{}: disconnecting {}", self.id, self.peer);
        self.mark_closed();

        if let Some(mut writer) = self.source_writer.lock().await.take() {
            if let Err(e) = writer.shutdown().await {
                debug!("Session #{}: source socket already closed: {}", self.id, e);
            }
        }

        let slot = std::mem::take(&mut *self.destination.lock().await);
        for link in slot.current.into_iter().chain(slot.retired) {
            link.close().await;
        }

        let source_reader = lock(&self.source_reader).take();
        if let Some(reader) = source_reader {
            reader.stop().await;
        }
    }

    /// Called by a reader whose socket hit EOF or an error
    ///
    /// Losing the source closes the session; the server then tears it down.
    pub(crate) fn reader_closed(&self, side: Side) {
        if side == Side::Source {
            info!("Session #{}: source disconnected, pending requests will be dropped", self.id);
            self.mark_closed();
        }
    }

    /// Route a complete frame read from `side`
    pub(crate) async fn handle_frame(self: &Arc<Self>, side: Side, frame: Bytes) {
        match side {
            Side::Source => {
                debug!("Session #{}: request of {} bytes from source", self.id, frame.len());
                self.context.scheduler.schedule(Arc::clone(self), frame);
            }
            Side::Destination => self.deliver_to_source(frame).await,
        }
    }

    // --- Destination side ---

    /// Open a new destination connection and start its reader
    ///
    /// The previous connection, if any, is retired rather than closed so a
    /// reply already on its way is still delivered. Retired connections that
    /// have ended, and the oldest ones past [`MAX_RETIRED_LINKS`], are closed.
    pub async fn connect_to_destination(self: &Arc<Self>) -> Result<()> {
        let config = self.config();
        let stream = connect_with_timeout(
            &config.destination_host,
            config.destination_port,
            config.connect_timeout_duration(),
        )
        .await?;

        info!("Session #{}: connected to {}", self.id, config.destination_addr());

        let (read_half, writer) = stream.into_split();
        let reader = spawn_reader(Side::Destination, read_half, Arc::clone(self), config.buffer_size);

        let finished = {
            let mut slot = self.destination.lock().await;
            if self.is_closed() {
                drop(slot);
                DestinationLink { writer, reader }.close().await;
                return Err(ProxyError::SessionClosed);
            }
            if let Some(previous) = slot.current.replace(DestinationLink { writer, reader }) {
                slot.retired.push(previous);
            }

            let (mut running, mut finished): (Vec<_>, Vec<_>) =
                slot.retired.drain(..).partition(|link| link.reader.is_running());
            if running.len() > MAX_RETIRED_LINKS {
                let excess = running.len() - MAX_RETIRED_LINKS;
                finished.extend(running.drain(..excess));
            }
            slot.retired = running;
            finished
        };

        if !finished.is_empty() {
            debug!("Session #{}: closing {} retired destination connection(s)", self.id, finished.len());
        }

        for link in finished {
            link.close().await;
        }

        Ok(())
    }

    async fn destination_ready(&self) -> bool {
        let slot = self.destination.lock().await;
        slot.current.as_ref().is_some_and(|link| link.reader.is_running())
    }

    /// Write an encoded frame to the destination, connecting first
    ///
    /// Every call opens a fresh connection unless `reuse_destination` is set
    /// and the current one is still up.
    pub async fn send_to_destination(self: &Arc<Self>, frame: &[u8]) -> Result<()> {
        if !self.config().reuse_destination || !self.destination_ready().await {
            self.connect_to_destination().await?;
        }

        tokio::select! {
            sent = self.write_to_destination(frame) => sent,
            _ = self.closed() => Err(ProxyError::SessionClosed),
        }
    }

    async fn write_to_destination(&self, frame: &[u8]) -> Result<()> {
        let mut slot = self.destination.lock().await;
        let Some(link) = slot.current.as_mut() else {
            return Err(ProxyError::Transport("Destination socket disconnected".to_string()));
        };

        match link.writer.write_all(frame).await {
            Ok(()) => {
                trace!("[Proxy -> Dst] {}", HexDump::from(frame));
                Ok(())
            }
            Err(e) => {
                // The connection is unusable; retire it so the next attempt reconnects
                if let Some(dead) = slot.current.take() {
                    slot.retired.push(dead);
                }
                Err(ProxyError::Transport(format!("Failed to write to destination: {}", e)))
            }
        }
    }

    // --- Sequencing ---

    fn lock_sequence(&self) -> MutexGuard<'_, SequenceCounter> {
        lock(&self.sequence)
    }

    /// Advance the sequence counter for a new request
    pub fn next_sequence(&self) -> u8 {
        self.lock_sequence().advance()
    }

    /// Reset the sequence counter to the null sequence number
    pub fn reset_sequence(&self) {
        self.lock_sequence().reset();
    }

    /// Discard queued reply outcomes, returning the most recent one
    pub async fn drain_outcomes(&self) -> Option<RetryOutcome> {
        let mut receiver = self.outcome_rx.lock().await;
        let mut last = None;
        while let Ok(outcome) = receiver.try_recv() {
            last = Some(outcome);
        }
        last
    }

    /// Wait up to `wait` for the next classified reply
    ///
    /// Returns `None` on timeout or when the session closes meanwhile.
    pub async fn await_reply(&self, wait: Duration) -> Option<RetryOutcome> {
        let mut receiver = self.outcome_rx.lock().await;

        tokio::select! {
            outcome = timeout(wait, receiver.recv()) => outcome.ok().flatten(),
            _ = self.closed() => None,
        }
    }

    // --- Source side ---

    /// Validate, decrypt and forward one destination reply to the source
    pub async fn deliver_to_source(&self, payload: Bytes) {
        let body = if self.config().use_retry {
            let Some(&returned) = payload.first() else {
                warn!("Session #{}: reply without a sequence number, dropping", self.id);
                return;
            };

            let outcome = {
                let sequence = self.lock_sequence();
                let outcome = sequence.classify(returned);
                // Wake the scheduler even if this reply is rejected
                let _ = self.outcome_tx.send(outcome);

                if outcome == RetryOutcome::WrongSequenceNumber {
                    info!(
                        "Session #{}: the sequence number of the response ({}) does not match the one used in the request ({})",
                        self.id,
                        returned,
                        sequence.value()
                    );
                }
                outcome
            };

            if outcome != RetryOutcome::NoError {
                return;
            }
            payload.slice(1..)
        } else {
            payload
        };

        let body = match &self.context.decryptor {
            Some(decryptor) => Bytes::from(decryptor.decrypt(&body)),
            None => body,
        };

        let frame = if body.is_empty() {
            debug!("Session #{}: empty reply, sending the empty frame", self.id);
            Bytes::from_static(&EMPTY_FRAME)
        } else {
            match encode(&body) {
                Ok(frame) => frame,
                Err(e) => {
                    error!("Session #{}: cannot forward reply: {}", self.id, e);
                    return;
                }
            }
        };

        self.write_to_source(&frame).await;
    }

    async fn write_to_source(&self, frame: &[u8]) {
        if self.is_closed() {
            info!("Session #{}: failed to write reply - source disconnected", self.id);
            return;
        }

        let mut writer = self.source_writer.lock().await;
        let Some(socket) = writer.as_mut() else {
            info!("Session #{}: failed to write reply - source disconnected", self.id);
            return;
        };

        match socket.write_all(frame).await {
            Ok(()) => trace!("[Proxy -> Src] {}", HexDump::from(frame)),
            Err(e) => {
                warn!("Session #{}: failed to write reply to source: {}", self.id, e);
                self.mark_closed();
            }
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
