//! Stream readers
//!
//! One reader task per socket. It reads whatever bytes are available, extracts
//! every complete frame, and hands each one to its session in arrival order.

use std::fmt;
use std::sync::Arc;

use bytes::BytesMut;
use log::{debug, error, info, trace, warn};
use tokio::io::AsyncReadExt;
use tokio::net::tcp::OwnedReadHalf;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::common::HexDump;
use crate::protocol::decode;
use super::session::Session;

/// Which link a reader serves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    /// Source to proxy
    Source,
    /// Destination to proxy
    Destination,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Source => write!(f, "Src"),
            Self::Destination => write!(f, "Dst"),
        }
    }
}

/// Running reader task
#[derive(Debug)]
pub struct ReaderHandle {
    side: Side,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl ReaderHandle {
    /// Whether the reader is still reading
    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Signal the reader to stop and wait for it to exit
    pub async fn stop(mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            // The reader may already have exited on its own
            let _ = shutdown.send(());
        }

        if let Err(e) = (&mut self.task).await {
            error!("{} reader task failed: {}", self.side, e);
        }
        debug!("{} reader stopped", self.side);
    }
}

/// Start a reader for `reader` that feeds complete frames to `session`
///
/// Handing a frame over is abandoned as soon as the session closes, so a
/// stalled write toward the source never keeps the reader alive.
pub fn spawn_reader(
    side: Side,
    reader: OwnedReadHalf,
    session: Arc<Session>,
    buffer_size: usize,
) -> ReaderHandle {
    let (shutdown, shutdown_rx) = oneshot::channel();
    let task = tokio::spawn(read_loop(side, reader, session, buffer_size, shutdown_rx));

    ReaderHandle {
        side,
        shutdown: Some(shutdown),
        task,
    }
}

async fn read_loop(
    side: Side,
    mut reader: OwnedReadHalf,
    session: Arc<Session>,
    buffer_size: usize,
    mut shutdown: oneshot::Receiver<()>,
) {
    let mut buffer = BytesMut::with_capacity(buffer_size);
    let mut total_bytes = 0usize;

    'read: loop {
        buffer.reserve(buffer_size);

        let read = tokio::select! {
            biased;
            _ = &mut shutdown => {
                debug!("Session #{}: {} reader asked to stop", session.id(), side);
                break;
            }
            read = reader.read_buf(&mut buffer) => read,
        };

        match read {
            Ok(0) => {
                info!("Session #{}: {} socket closed", session.id(), side);
                session.reader_closed(side);
                break;
            }
            Ok(n) => {
                total_bytes += n;
                trace!("[{} -> Proxy] {}", side, HexDump::from(&buffer[buffer.len() - n..]));

                for frame in decode(&mut buffer) {
                    tokio::select! {
                        biased;
                        _ = session.closed() => {
                            debug!("Session #{}: {} reader dropping frames, session closed", session.id(), side);
                            break 'read;
                        }
                        _ = session.handle_frame(side, frame) => {}
                    }
                }
            }
            Err(e) => {
                warn!("Session #{}: error reading from {}: {}", session.id(), side, e);
                session.reader_closed(side);
                break;
            }
        }
    }

    debug!("Session #{}: {} reader ended after {} bytes", session.id(), side, total_bytes);
}
