//! Change notification for the composed read model.

use std::sync::Arc;
use tokio::sync::watch;

/// Bumps a revision counter whenever derived session state changes.
///
/// Components hold a clone and call [`notify`](Self::notify) after mutating;
/// the view layer holds a [`watch::Receiver`] and re-reads the snapshot when
/// the revision moves.
#[derive(Debug, Clone)]
pub struct ChangeNotifier {
    tx: Arc<watch::Sender<u64>>,
}

impl ChangeNotifier {
    /// Create a notifier starting at revision 0.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(0);
        Self { tx: Arc::new(tx) }
    }

    /// Signal that something observable changed.
    pub fn notify(&self) {
        self.tx.send_modify(|revision| *revision = revision.wrapping_add(1));
    }

    /// Current revision.
    pub fn revision(&self) -> u64 {
        *self.tx.borrow()
    }

    /// Subscribe to revision changes.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.tx.subscribe()
    }
}

impl Default for ChangeNotifier {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn notify_wakes_subscribers() {
        let notifier = ChangeNotifier::new();
        let mut rx = notifier.subscribe();
        assert_eq!(notifier.revision(), 0);

        notifier.clone().notify();
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), 1);
    }

    #[test]
    fn notify_without_subscribers_still_counts() {
        let notifier = ChangeNotifier::default();
        notifier.notify();
        notifier.notify();
        assert_eq!(notifier.revision(), 2);
    }
}
