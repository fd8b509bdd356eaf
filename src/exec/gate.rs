// src/exec/gate.rs

//! Concurrency gate bounding how many processes run at once.
//!
//! Backed by a Tokio semaphore. A [`GatePermit`] holds one slot and gives it
//! back when dropped, so the slot is returned on every exit path of the
//! guarded work.

use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::errors::{GateError, ProcgateError, Result};

/// One reserved gate slot.
#[derive(Debug)]
pub struct GatePermit {
    _permit: OwnedSemaphorePermit,
}

impl GatePermit {
    /// Give the slot back now instead of at end of scope.
    pub fn release(self) {
        drop(self);
    }
}

#[derive(Debug, Clone)]
pub struct ConcurrencyGate {
    semaphore: Arc<Semaphore>,
    capacity: usize,
}

impl ConcurrencyGate {
    /// Create a gate with `capacity` slots.
    ///
    /// A capacity of zero would make every `acquire` wait forever, so it is
    /// rejected up front.
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(ProcgateError::ConfigError(
                "parallelism must be >= 1 (got 0)".to_string(),
            ));
        }
        if capacity > Semaphore::MAX_PERMITS {
            return Err(ProcgateError::ConfigError(format!(
                "parallelism must be <= {} (got {capacity})",
                Semaphore::MAX_PERMITS
            )));
        }

        info!(capacity, "concurrency gate created");

        Ok(Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
        })
    }

    /// Wait for a free slot and reserve it.
    ///
    /// Fails with [`GateError::Cancelled`] if `cancel` fires first (a token
    /// that is already cancelled wins over a free slot), and with
    /// [`GateError::Closed`] once the gate has been closed.
    pub async fn acquire(
        &self,
        cancel: &CancellationToken,
    ) -> std::result::Result<GatePermit, GateError> {
        let semaphore = Arc::clone(&self.semaphore);

        let permit = tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                debug!("gate acquire cancelled");
                return Err(GateError::Cancelled);
            }
            permit = semaphore.acquire_owned() => permit.map_err(|_| GateError::Closed)?,
        };

        debug!(available = self.available(), "gate slot acquired");
        Ok(GatePermit { _permit: permit })
    }

    /// Stop admitting work. Waiting and future acquires fail with
    /// [`GateError::Closed`]; permits already handed out stay valid.
    pub fn close(&self) {
        if !self.semaphore.is_closed() {
            info!(held = self.held(), "concurrency gate closed");
            self.semaphore.close();
        }
    }

    pub fn is_closed(&self) -> bool {
        self.semaphore.is_closed()
    }

    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Slots currently reserved.
    pub fn held(&self) -> usize {
        self.capacity - self.available()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn zero_capacity_is_a_config_error() {
        match ConcurrencyGate::new(0) {
            Err(ProcgateError::ConfigError(msg)) => assert!(msg.contains("parallelism")),
            other => panic!("expected ConfigError, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn permits_are_counted_and_returned_on_drop() {
        let gate = ConcurrencyGate::new(2).unwrap();
        let cancel = CancellationToken::new();

        let first = gate.acquire(&cancel).await.unwrap();
        let second = gate.acquire(&cancel).await.unwrap();
        assert_eq!(gate.held(), 2);
        assert_eq!(gate.available(), 0);

        first.release();
        assert_eq!(gate.held(), 1);

        drop(second);
        assert_eq!(gate.available(), 2);
    }

    #[tokio::test]
    async fn acquire_waits_until_a_slot_is_released() {
        let gate = ConcurrencyGate::new(1).unwrap();
        let cancel = CancellationToken::new();
        let held = gate.acquire(&cancel).await.unwrap();

        let waiter = {
            let gate = gate.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { gate.acquire(&cancel).await.map(|_| ()) })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(held);

        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("acquire should complete after the slot is released")
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn cancellation_wakes_a_waiting_acquire() {
        let gate = ConcurrencyGate::new(1).unwrap();
        let cancel = CancellationToken::new();
        let _held = gate.acquire(&cancel).await.unwrap();

        let waiter = {
            let gate = gate.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { gate.acquire(&cancel).await.map(|_| ()) })
        };

        cancel.cancel();

        let res = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(res, Err(GateError::Cancelled));
    }

    #[tokio::test]
    async fn closing_wakes_waiters_and_keeps_held_permits() {
        let gate = ConcurrencyGate::new(1).unwrap();
        let cancel = CancellationToken::new();
        let held = gate.acquire(&cancel).await.unwrap();

        let waiter = {
            let gate = gate.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { gate.acquire(&cancel).await.map(|_| ()) })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        gate.close();
        assert!(gate.is_closed());

        let res = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(res, Err(GateError::Closed));
        assert_eq!(gate.held(), 1);

        drop(held);
        assert_eq!(gate.acquire(&cancel).await.unwrap_err(), GateError::Closed);
    }

    #[tokio::test]
    async fn cancelled_token_refuses_even_a_free_slot() {
        let gate = ConcurrencyGate::new(3).unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        assert_eq!(gate.acquire(&cancel).await.unwrap_err(), GateError::Cancelled);
        assert_eq!(gate.available(), 3);
    }
}
