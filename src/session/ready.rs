//! One-shot readiness gate for the streaming session.

use std::sync::{Condvar, Mutex};
use std::time::Duration;

/// Gate that holds audio transmission until the service signals it is
/// listening. Condvar-based so waiters block instead of spinning.
#[derive(Debug, Default)]
pub struct ReadyGate {
    state: Mutex<bool>,
    cond: Condvar,
}

impl ReadyGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens the gate and wakes every waiter. Signaling twice is harmless.
    pub fn signal(&self) {
        let mut ready = self.state.lock().unwrap_or_else(|e| e.into_inner());
        *ready = true;
        self.cond.notify_all();
    }

    /// Closes the gate again, for reuse across sessions.
    pub fn reset(&self) {
        let mut ready = self.state.lock().unwrap_or_else(|e| e.into_inner());
        *ready = false;
    }

    pub fn is_ready(&self) -> bool {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Blocks until the gate opens or `timeout` elapses. Returns whether the
    /// gate is open.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let ready = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let (ready, _) = self
            .cond
            .wait_timeout_while(ready, timeout, |ready| !*ready)
            .unwrap_or_else(|e| e.into_inner());
        *ready
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_starts_closed() {
        let gate = ReadyGate::new();
        assert!(!gate.is_ready());
        assert!(!gate.wait_timeout(Duration::from_millis(10)));
    }

    #[test]
    fn test_signal_opens_gate() {
        let gate = ReadyGate::new();
        gate.signal();
        assert!(gate.is_ready());
        assert!(gate.wait_timeout(Duration::from_millis(1)));
    }

    #[test]
    fn test_waiter_wakes_on_signal() {
        let gate = Arc::new(ReadyGate::new());
        let waiter = {
            let gate = gate.clone();
            thread::spawn(move || gate.wait_timeout(Duration::from_secs(5)))
        };

        thread::sleep(Duration::from_millis(20));
        gate.signal();
        assert!(waiter.join().unwrap());
    }

    #[test]
    fn test_reset_closes_gate() {
        let gate = ReadyGate::new();
        gate.signal();
        gate.reset();
        assert!(!gate.is_ready());
    }
}
