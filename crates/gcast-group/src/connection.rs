/// Transport seam: one live client connection.
///
/// In production: implemented by the websocket writer handle.
/// In tests and the stress harness: [`ChannelConnection`].
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::error::GroupError;
use crate::types::{ConnectionId, Frame};

/// A send-only handle to one client connection.
///
/// `send` is called while the owning user's connection set is read-locked,
/// so it must not block.
pub trait Connection: Send + Sync {
    fn id(&self) -> &ConnectionId;

    fn send(&self, frame: &Frame) -> Result<(), GroupError>;
}

/// Shared connection handle.
pub type ConnectionHandle = Arc<dyn Connection>;

/// Connection backed by a bounded channel drained by a writer task.
pub struct ChannelConnection {
    id: ConnectionId,
    tx: mpsc::Sender<Frame>,
    dropped: AtomicU64,
}

impl ChannelConnection {
    pub fn new(id: ConnectionId, tx: mpsc::Sender<Frame>) -> Self {
        Self {
            id,
            tx,
            dropped: AtomicU64::new(0),
        }
    }

    /// Create a connection with a random id and its receiving end.
    pub fn pair(capacity: usize) -> (Arc<Self>, mpsc::Receiver<Frame>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Arc::new(Self::new(ConnectionId::generate(), tx)), rx)
    }

    /// Frames rejected because the channel was full or closed.
    pub fn drop_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl Connection for ChannelConnection {
    fn id(&self) -> &ConnectionId {
        &self.id
    }

    fn send(&self, frame: &Frame) -> Result<(), GroupError> {
        match self.tx.try_send(frame.clone()) {
            Ok(()) => Ok(()),
            Err(e) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                let connection_id = self.id.clone();
                Err(match e {
                    mpsc::error::TrySendError::Full(_) => GroupError::Backpressure { connection_id },
                    mpsc::error::TrySendError::Closed(_) => {
                        GroupError::ConnectionClosed { connection_id }
                    }
                })
            }
        }
    }
}
