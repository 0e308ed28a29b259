//! Scripted connector and link for deterministic tests without a backend.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use attune_core::errors::TransportError;
use attune_core::events::WireFrame;

use crate::connector::{Connector, Link};

/// Pre-programmed outcome for one `connect()` call.
pub enum MockOutcome {
    /// Fail with a transient connect error.
    Fail,
    /// Hand out this link.
    Accept(MockLink),
}

/// Connector that replays outcomes in order. Once the script is
/// exhausted, further connects fail.
pub struct MockConnector {
    outcomes: Mutex<VecDeque<MockOutcome>>,
    connects: AtomicUsize,
}

impl MockConnector {
    pub fn new(outcomes: Vec<MockOutcome>) -> Self {
        Self {
            outcomes: Mutex::new(outcomes.into()),
            connects: AtomicUsize::new(0),
        }
    }

    pub fn connect_calls(&self) -> usize {
        self.connects.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self) -> Result<Box<dyn Link>, TransportError> {
        self.connects.fetch_add(1, Ordering::Relaxed);
        match self.outcomes.lock().pop_front() {
            Some(MockOutcome::Accept(link)) => Ok(Box::new(link)),
            Some(MockOutcome::Fail) => {
                Err(TransportError::ConnectFailed("scripted failure".into()))
            }
            None => Err(TransportError::ConnectFailed("script exhausted".into())),
        }
    }
}

/// Test-side handle: inject inbound frames, observe outbound ones, close
/// the link to simulate the peer dropping the connection.
pub struct MockLinkHandle {
    inbound_tx: Option<mpsc::UnboundedSender<Result<WireFrame, TransportError>>>,
    sent: Arc<Mutex<Vec<WireFrame>>>,
    closed: Arc<AtomicBool>,
}

impl MockLinkHandle {
    pub fn push_inbound(&self, frame: WireFrame) {
        if let Some(tx) = &self.inbound_tx {
            let _ = tx.send(Ok(frame));
        }
    }

    pub fn push_error(&self, error: TransportError) {
        if let Some(tx) = &self.inbound_tx {
            let _ = tx.send(Err(error));
        }
    }

    /// Frames the channel has pushed through this link so far.
    pub fn sent(&self) -> Vec<WireFrame> {
        self.sent.lock().clone()
    }

    /// Simulate the peer closing the connection.
    pub fn close(&mut self) {
        self.inbound_tx = None;
        self.closed.store(true, Ordering::Relaxed);
    }
}

pub struct MockLink {
    inbound_rx: mpsc::UnboundedReceiver<Result<WireFrame, TransportError>>,
    sent: Arc<Mutex<Vec<WireFrame>>>,
    closed: Arc<AtomicBool>,
}

impl MockLink {
    pub fn pair() -> (Self, MockLinkHandle) {
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let sent = Arc::new(Mutex::new(Vec::new()));
        let closed = Arc::new(AtomicBool::new(false));
        (
            Self {
                inbound_rx,
                sent: Arc::clone(&sent),
                closed: Arc::clone(&closed),
            },
            MockLinkHandle {
                inbound_tx: Some(inbound_tx),
                sent,
                closed,
            },
        )
    }
}

#[async_trait]
impl Link for MockLink {
    async fn send(&mut self, frame: WireFrame) -> Result<(), TransportError> {
        if self.closed.load(Ordering::Relaxed) {
            return Err(TransportError::ChannelClosed("mock link closed".into()));
        }
        self.sent.lock().push(frame);
        Ok(())
    }

    async fn recv(&mut self) -> Option<Result<WireFrame, TransportError>> {
        self.inbound_rx.recv().await
    }

    async fn close(&mut self) {
        self.closed.store(true, Ordering::Relaxed);
    }
}
