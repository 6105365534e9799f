//! One-shot readiness latch.

use std::sync::Arc;

use tokio::sync::watch;

/// A latch that starts closed and opens exactly once.
///
/// The dispatcher opens it on the first info call from the panel; the
/// runtime waits on it before running the post-startup callback. Clones
/// share the same latch.
#[derive(Debug, Clone)]
pub struct ReadinessGate {
    state: Arc<watch::Sender<bool>>,
}

impl Default for ReadinessGate {
    fn default() -> Self {
        Self::new()
    }
}

impl ReadinessGate {
    pub fn new() -> Self {
        let (state, _) = watch::channel(false);
        Self {
            state: Arc::new(state),
        }
    }

    /// Opens the gate. Returns true only for the call that opened it.
    pub fn open(&self) -> bool {
        self.state.send_if_modified(|open| {
            if *open {
                false
            } else {
                *open = true;
                true
            }
        })
    }

    pub fn is_open(&self) -> bool {
        *self.state.borrow()
    }

    /// Resolves once the gate is open; immediately if it already is.
    pub async fn wait(&self) {
        let mut rx = self.state.subscribe();
        // The sender lives as long as `self`, so this cannot fail.
        let _ = rx.wait_for(|open| *open).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_opens_once_under_contention() {
        let gate = ReadinessGate::new();
        let opened = Arc::new(AtomicUsize::new(0));

        let tasks: Vec<_> = (0..32)
            .map(|_| {
                let gate = gate.clone();
                let opened = Arc::clone(&opened);
                tokio::spawn(async move {
                    if gate.open() {
                        opened.fetch_add(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }

        assert!(gate.is_open());
        assert_eq!(opened.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_wait_releases_after_open() {
        let gate = ReadinessGate::new();
        let waiter = {
            let gate = gate.clone();
            tokio::spawn(async move { gate.wait().await })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!waiter.is_finished());

        gate.open();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should be released")
            .unwrap();
    }

    #[test]
    fn test_wait_on_open_gate_is_immediate() {
        let gate = ReadinessGate::new();
        gate.open();
        tokio_test::block_on(gate.wait());
    }
}
