//! Cooperative cancellation for long experiments
//!
//! The orchestrator and index builder check a [`CancelSignal`] before every
//! combination and every row. A [`CancelHandle`] held by the caller flips it.

use crate::{Error, Result};
use tokio::sync::watch;

/// Caller-side handle that requests cancellation.
#[derive(Debug)]
pub struct CancelHandle {
    sender: watch::Sender<bool>,
}

/// Engine-side signal, cheap to clone.
#[derive(Debug, Clone)]
pub struct CancelSignal {
    receiver: watch::Receiver<bool>,
}

/// Create a connected handle/signal pair.
#[must_use]
pub fn cancel_pair() -> (CancelHandle, CancelSignal) {
    let (sender, receiver) = watch::channel(false);
    (CancelHandle { sender }, CancelSignal { receiver })
}

impl CancelHandle {
    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.sender.send_replace(true);
    }

    /// A new signal observing this handle.
    #[must_use]
    pub fn signal(&self) -> CancelSignal {
        CancelSignal {
            receiver: self.sender.subscribe(),
        }
    }
}

impl CancelSignal {
    /// A signal that is never cancelled.
    #[must_use]
    pub fn never() -> Self {
        let (sender, receiver) = watch::channel(false);
        // receivers keep the last value after the sender drops
        drop(sender);
        Self { receiver }
    }

    /// Whether cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        *self.receiver.borrow()
    }

    /// Return `Error::Cancelled` once cancellation has been requested.
    ///
    /// # Errors
    ///
    /// Returns `Error::Cancelled` if the handle was cancelled.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }
}

impl Default for CancelSignal {
    fn default() -> Self {
        Self::never()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_flips_signal() {
        let (handle, signal) = cancel_pair();
        let other = handle.signal();
        assert!(!signal.is_cancelled());
        assert!(signal.check().is_ok());

        handle.cancel();
        assert!(signal.is_cancelled());
        assert!(other.is_cancelled());
        assert!(matches!(signal.check(), Err(Error::Cancelled)));
    }

    #[test]
    fn test_never_signal() {
        let signal = CancelSignal::never();
        assert!(!signal.is_cancelled());
        assert!(!signal.clone().is_cancelled());
    }
}
