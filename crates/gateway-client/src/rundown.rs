//! Rundown protection: a counting gate for coordinated shutdown.
//!
//! Every externally callable operation takes a [`RundownGuard`] for its
//! duration. Once [`Rundown::begin_close`] runs, new acquisitions fail and
//! [`Rundown::wait`] resolves when the last guard is dropped.

use parking_lot::Mutex;
use tokio::sync::Notify;

#[derive(Debug, Default)]
struct State {
    active: usize,
    closing: bool,
}

#[derive(Debug, Default)]
pub(crate) struct Rundown {
    state: Mutex<State>,
    drained: Notify,
}

impl Rundown {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Enter the gate; `None` once shutdown has begun.
    pub(crate) fn acquire(&self) -> Option<RundownGuard<'_>> {
        let mut state = self.state.lock();
        if state.closing {
            return None;
        }
        state.active += 1;
        Some(RundownGuard { rundown: self })
    }

    /// Close the gate. Returns `true` for the first caller only.
    pub(crate) fn begin_close(&self) -> bool {
        let mut state = self.state.lock();
        let first = !state.closing;
        state.closing = true;
        first
    }

    #[cfg(test)]
    pub(crate) fn is_closing(&self) -> bool {
        self.state.lock().closing
    }

    /// Wait until no guard is outstanding.
    pub(crate) async fn wait(&self) {
        loop {
            let notified = self.drained.notified();
            tokio::pin!(notified);
            // Register before checking so a release in between is not lost.
            notified.as_mut().enable();

            if self.state.lock().active == 0 {
                return;
            }
            notified.await;
        }
    }

    fn release(&self) {
        let mut state = self.state.lock();
        state.active -= 1;
        let drained = state.closing && state.active == 0;
        drop(state);

        if drained {
            self.drained.notify_waiters();
        }
    }
}

/// Proof of an in-flight operation; releases on drop.
#[derive(Debug)]
pub(crate) struct RundownGuard<'a> {
    rundown: &'a Rundown,
}

impl Drop for RundownGuard<'_> {
    fn drop(&mut self) {
        self.rundown.release();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;

    #[test]
    fn acquire_fails_after_close() {
        let rundown = Rundown::new();
        assert!(rundown.acquire().is_some());
        assert!(rundown.begin_close());
        assert!(!rundown.begin_close());
        assert!(rundown.is_closing());
        assert!(rundown.acquire().is_none());
    }

    #[tokio::test]
    async fn wait_returns_immediately_when_idle() {
        let rundown = Rundown::new();
        rundown.begin_close();
        tokio::time::timeout(Duration::from_secs(1), rundown.wait())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn wait_blocks_until_last_guard_drops() {
        let rundown = Arc::new(Rundown::new());
        let (held_tx, held_rx) = tokio::sync::oneshot::channel();
        let (release_tx, release_rx) = tokio::sync::oneshot::channel::<()>();

        let holder = {
            let rundown = rundown.clone();
            tokio::spawn(async move {
                let _guard = rundown.acquire().unwrap();
                held_tx.send(()).unwrap();
                release_rx.await.unwrap();
            })
        };
        held_rx.await.unwrap();

        rundown.begin_close();
        let waiter = {
            let rundown = rundown.clone();
            tokio::spawn(async move { rundown.wait().await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        release_tx.send(()).unwrap();
        holder.await.unwrap();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
    }
}
