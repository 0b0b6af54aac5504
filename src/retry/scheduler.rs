//! Serial retry scheduler
//!
//! Every frame read from the source becomes one [`RetryJob`]. A single worker
//! task runs jobs strictly in submission order, so at most one request is in
//! flight toward the destination and the session's sequence counter is only
//! ever advanced by one job at a time.

use std::sync::Arc;

use bytes::Bytes;
use log::{debug, error, info, warn};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::sequence::RetryOutcome;
use crate::common::{ProxyError, Result};
use crate::protocol::{encode, encode_sequenced};
use crate::proxy::Session;

/// How a job ended, when it did not give up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    /// Retry mode: a reply with the right sequence number arrived
    Acknowledged {
        /// Send attempts used, including the first
        attempts: u32,
    },
    /// Retry mode off: the frame was written, no reply is awaited
    Sent,
    /// The owning session was replaced or disconnected
    Aborted,
}

/// One forward-and-await cycle for a single source message
pub struct RetryJob {
    session: Arc<Session>,
    payload: Bytes,
}

impl RetryJob {
    /// Create a job forwarding `payload` on behalf of `session`
    pub fn new(session: Arc<Session>, payload: Bytes) -> Self {
        Self { session, payload }
    }

    /// Build the outgoing frame, send it, and resend until a valid reply
    /// arrives or the attempt budget is spent
    pub async fn run(self) -> Result<JobOutcome> {
        let session = &self.session;
        let config = session.config();
        let use_retry = config.use_retry;
        let max_attempts = config.max_attempts();

        let mut frame = if use_retry {
            let sequence = session.next_sequence();
            debug!("Session #{}: request sequence number {}", session.id(), sequence);
            encode_sequenced(sequence, &self.payload)?
        } else {
            encode(&self.payload)?
        };

        let mut attempts = 0;
        while attempts < max_attempts {
            if session.is_closed() {
                info!("Session #{}: source disconnected, dropping request", session.id());
                return Ok(JobOutcome::Aborted);
            }

            // Outcomes queued before this write belong to an earlier request,
            // or to an attempt of this one whose wait already timed out
            let late = session.drain_outcomes().await;
            if attempts > 0 {
                if let Some(outcome) = late {
                    if self.apply(outcome, &mut frame)? {
                        return Ok(JobOutcome::Acknowledged { attempts });
                    }
                }
                info!("Session #{}: retry #{}", session.id(), attempts);
            }

            attempts += 1;
            let sent = session.send_to_destination(&frame).await;

            match sent {
                Err(ProxyError::SessionClosed) => return Ok(JobOutcome::Aborted),
                sent if !use_retry => return sent.map(|_| JobOutcome::Sent),
                Err(e) => warn!("Session #{}: failed to write request: {}", session.id(), e),
                Ok(()) => {}
            }

            match session.await_reply(config.reply_timeout_duration()).await {
                Some(outcome) => {
                    if self.apply(outcome, &mut frame)? {
                        debug!("Session #{}: received valid response", session.id());
                        return Ok(JobOutcome::Acknowledged { attempts });
                    }
                }
                None => debug!(
                    "Session #{}: no reply within {} seconds",
                    session.id(),
                    config.reply_timeout
                ),
            }
        }

        Err(ProxyError::RetryExhausted { attempts })
    }

    /// React to a classified reply; `true` when the request is answered
    fn apply(&self, outcome: RetryOutcome, frame: &mut Bytes) -> Result<bool> {
        match outcome {
            RetryOutcome::NoError => Ok(true),
            RetryOutcome::NullSequenceNumber => {
                info!(
                    "Session #{}: received a null sequence number, resending with sequence 0",
                    self.session.id()
                );
                self.session.reset_sequence();
                *frame = encode_sequenced(0, &self.payload)?;
                Ok(false)
            }
            RetryOutcome::WrongSequenceNumber => {
                info!("Session #{}: received a wrong sequence number, resending", self.session.id());
                Ok(false)
            }
        }
    }
}

/// Handle for submitting jobs to the scheduler worker
#[derive(Debug, Clone)]
pub struct RetryScheduler {
    sender: mpsc::UnboundedSender<RetryJob>,
}

impl std::fmt::Debug for RetryJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryJob")
            .field("session", &self.session.id())
            .field("payload_len", &self.payload.len())
            .finish()
    }
}

impl RetryScheduler {
    /// Start the worker task
    ///
    /// The worker runs until every `RetryScheduler` handle is dropped.
    pub fn spawn() -> (Self, JoinHandle<()>) {
        let (sender, mut receiver) = mpsc::unbounded_channel::<RetryJob>();

        let worker = tokio::spawn(async move {
            while let Some(job) = receiver.recv().await {
                let session_id = job.session.id();

                match job.run().await {
                    Ok(outcome) => debug!("Session #{}: task ended ({:?})", session_id, outcome),
                    Err(e @ ProxyError::FrameTooLarge(_)) => {
                        error!("Session #{}: cannot forward request: {}", session_id, e)
                    }
                    Err(e @ ProxyError::RetryExhausted { .. }) => {
                        warn!("Session #{}: giving up on request: {}", session_id, e)
                    }
                    Err(e) => warn!("Session #{}: request failed: {}", session_id, e),
                }
            }
            debug!("Retry scheduler stopped");
        });

        (Self { sender }, worker)
    }

    /// Queue `payload` for forwarding; returns immediately
    pub fn schedule(&self, session: Arc<Session>, payload: Bytes) {
        if self.sender.send(RetryJob::new(session, payload)).is_err() {
            error!("Retry scheduler is not running, dropping request");
        }
    }
}
