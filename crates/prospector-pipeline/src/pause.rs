//! Process-wide suspend/resume signal.
//!
//! Backed by a [`tokio::sync::watch`] channel so the controller awaits a
//! state change instead of sleep-polling. Pausing only gates transitions
//! between pipeline steps; it never interrupts an in-flight blocking call.

use std::sync::Arc;

use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    Running,
    Paused,
}

/// Cloneable handle to the shared gate. All clones observe the same state;
/// only the control listener is expected to flip it.
#[derive(Clone)]
pub struct PauseGate {
    tx: Arc<watch::Sender<GateState>>,
}

impl PauseGate {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(GateState::Running);
        Self { tx: Arc::new(tx) }
    }

    pub fn state(&self) -> GateState {
        *self.tx.borrow()
    }

    pub fn is_paused(&self) -> bool {
        self.state() == GateState::Paused
    }

    pub fn pause(&self) {
        self.tx.send_replace(GateState::Paused);
    }

    pub fn resume(&self) {
        self.tx.send_replace(GateState::Running);
    }

    /// Flip the state and return the new value.
    pub fn toggle(&self) -> GateState {
        let next = match self.state() {
            GateState::Running => GateState::Paused,
            GateState::Paused => GateState::Running,
        };
        self.tx.send_replace(next);
        next
    }

    /// Suspension point: returns immediately while running, otherwise blocks
    /// until the gate is resumed.
    pub async fn wait_until_running(&self) {
        let mut rx = self.tx.subscribe();
        while *rx.borrow_and_update() == GateState::Paused {
            if rx.changed().await.is_err() {
                return;
            }
        }
    }
}

impl Default for PauseGate {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn starts_running_and_wait_is_immediate() {
        let gate = PauseGate::new();
        assert_eq!(gate.state(), GateState::Running);
        // Must not block.
        tokio::time::timeout(Duration::from_millis(50), gate.wait_until_running())
            .await
            .expect("wait_until_running should be immediate while running");
    }

    #[tokio::test]
    async fn wait_blocks_while_paused_and_releases_on_resume() {
        let gate = PauseGate::new();
        gate.pause();

        let waiter = {
            let gate = gate.clone();
            tokio::spawn(async move { gate.wait_until_running().await })
        };

        // Still pending while paused.
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        gate.resume();
        tokio::time::timeout(Duration::from_millis(200), waiter)
            .await
            .expect("waiter should release after resume")
            .unwrap();
    }

    #[tokio::test]
    async fn toggle_flips_both_ways() {
        let gate = PauseGate::new();
        assert_eq!(gate.toggle(), GateState::Paused);
        assert!(gate.is_paused());
        assert_eq!(gate.toggle(), GateState::Running);
        assert!(!gate.is_paused());
    }

    #[tokio::test]
    async fn clones_share_state() {
        let gate = PauseGate::new();
        let other = gate.clone();
        gate.pause();
        assert!(other.is_paused());
        other.resume();
        assert!(!gate.is_paused());
    }
}
