//! Single-use rendezvous between a connection task and a worker.
//!
//! [`rendezvous`] returns two halves. The worker owns [`Deposit`] and can
//! complete it exactly once (`deposit` consumes it); the connection owns
//! [`Rendezvous`] and can wait exactly once. If the deposit half is dropped
//! unused, the waiter wakes with [`SlotError::Abandoned`] instead of hanging.

use std::time::Duration;

use thiserror::Error;
use tokio::sync::oneshot;

/// Why a wait ended without a value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SlotError {
    #[error("worker finished without depositing an outcome")]
    Abandoned,

    #[error("no outcome deposited within {0:?}")]
    TimedOut(Duration),
}

/// Create a connected deposit/wait pair.
pub fn rendezvous<T>() -> (Deposit<T>, Rendezvous<T>) {
    let (tx, rx) = oneshot::channel();
    (Deposit { tx }, Rendezvous { rx })
}

/// Worker half.
#[derive(Debug)]
pub struct Deposit<T> {
    tx: oneshot::Sender<T>,
}

impl<T> Deposit<T> {
    /// Hand over the value. Gives it back if the waiter is gone.
    pub fn deposit(self, value: T) -> Result<(), T> {
        self.tx.send(value)
    }

    /// True once the waiting side has given up.
    pub fn is_abandoned(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Connection half.
#[derive(Debug)]
pub struct Rendezvous<T> {
    rx: oneshot::Receiver<T>,
}

impl<T> Rendezvous<T> {
    /// Wait for the deposit, optionally bounded.
    pub async fn wait(self, bound: Option<Duration>) -> Result<T, SlotError> {
        match bound {
            None => self.rx.await.map_err(|_| SlotError::Abandoned),
            Some(limit) => match tokio::time::timeout(limit, self.rx).await {
                Ok(received) => received.map_err(|_| SlotError::Abandoned),
                Err(_) => Err(SlotError::TimedOut(limit)),
            },
        }
    }
}
