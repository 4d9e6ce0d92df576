use crate::error::{ClimateError, Result};
use crate::types::RoomId;
use tokio::sync::broadcast;

/// Change notification from the room store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreEvent {
    /// A room's fields changed
    RoomUpdated(RoomId),

    /// A room was selected or the selection was cleared
    ActiveChanged(Option<RoomId>),
}

/// Receiver for store changes
pub struct StoreReceiver {
    rx: broadcast::Receiver<StoreEvent>,
}

impl StoreReceiver {
    pub(crate) fn new(rx: broadcast::Receiver<StoreEvent>) -> Self {
        Self { rx }
    }

    /// Receive the next change
    ///
    /// Fails with `ConnectionClosed` once the store is gone.
    pub async fn recv(&mut self) -> Result<StoreEvent> {
        self.rx.recv().await.map_err(|e| match e {
            broadcast::error::RecvError::Closed => ClimateError::ConnectionClosed,
            broadcast::error::RecvError::Lagged(n) => {
                ClimateError::ChannelError(format!("Lagged by {} messages", n))
            }
        })
    }

    /// Try to receive a change without waiting
    ///
    /// Returns `None` if nothing changed.
    pub fn try_recv(&mut self) -> Result<Option<StoreEvent>> {
        match self.rx.try_recv() {
            Ok(event) => Ok(Some(event)),
            Err(broadcast::error::TryRecvError::Empty) => Ok(None),
            Err(broadcast::error::TryRecvError::Closed) => Err(ClimateError::ConnectionClosed),
            Err(broadcast::error::TryRecvError::Lagged(n)) => {
                Err(ClimateError::ChannelError(format!("Lagged by {} messages", n)))
            }
        }
    }

    /// Drain everything pending, e.g. once per rendered frame
    pub fn drain(&mut self) -> Vec<StoreEvent> {
        let mut events = Vec::new();
        loop {
            match self.try_recv() {
                Ok(Some(event)) => events.push(event),
                Ok(None) => break,
                Err(ClimateError::ChannelError(e)) => {
                    tracing::warn!("Store receiver {}", e);
                }
                Err(_) => break,
            }
        }
        events
    }
}
