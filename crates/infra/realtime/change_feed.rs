use tokio::sync::broadcast;
use tracing::debug;

use crate::domain::value_objects::change_feed::TableChange;

const DEFAULT_CAPACITY: usize = 64;

/// In-process fan-out of table change notifications.
///
/// Writers publish after a successful write; readers re-derive whatever depends on the
/// table. Subscribers that fall behind see `RecvError::Lagged` and should just recompute.
#[derive(Clone)]
pub struct ChangeFeed {
    sender: broadcast::Sender<TableChange>,
}

impl ChangeFeed {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Returns how many subscribers received the change. Zero subscribers is not an error.
    pub fn publish(&self, change: TableChange) -> usize {
        match self.sender.send(change) {
            Ok(receivers) => {
                debug!(table = change.table_name(), receivers, "realtime: change published");
                receivers
            }
            Err(_) => 0,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TableChange> {
        self.sender.subscribe()
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new()
    }
}
