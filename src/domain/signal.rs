//! Refresh signal shared between capture and sync.
//!
//! Carries no payload: a new value only means "processing happened, reload".

use tokio::sync::watch;

/// Sending half, owned by the capture coordinator
#[derive(Debug, Clone)]
pub struct RefreshSignal {
    sender: watch::Sender<u64>,
}

impl Default for RefreshSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl RefreshSignal {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(0);
        Self { sender }
    }

    /// Increment the counter and wake every subscriber. Returns the new value.
    pub fn bump(&self) -> u64 {
        self.sender.send_modify(|value| *value += 1);
        *self.sender.borrow()
    }

    /// Current counter value
    pub fn current(&self) -> u64 {
        *self.sender.borrow()
    }

    /// A receiver that observes future bumps
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.sender.subscribe()
    }
}
