//! Lifecycle state machine.

use std::fmt;

use tokio::sync::watch;

/// The single authoritative enumeration tracking whether the server is
/// starting, serving, closing or closed.
///
/// Transitions are strictly forward; no state is ever revisited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LifecycleState {
    /// Built and validated, not yet serving.
    Created,
    /// Accept loops are running.
    Listening,
    /// Teardown is in progress.
    Closing,
    /// Teardown finished; all listeners are released.
    Closed,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecycleState::Created => "created",
            LifecycleState::Listening => "listening",
            LifecycleState::Closing => "closing",
            LifecycleState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Shared state cell built on a watch channel: writers advance the state
/// with compare-and-swap semantics, readers observe or await transitions.
///
/// `watch::Sender::send_if_modified` runs its closure under the channel
/// lock, which is what makes [`StateCell::advance`] a true single-winner
/// operation under concurrent callers.
#[derive(Debug)]
pub(crate) struct StateCell {
    tx: watch::Sender<LifecycleState>,
}

impl StateCell {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(LifecycleState::Created);
        Self { tx }
    }

    pub fn current(&self) -> LifecycleState {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<LifecycleState> {
        self.tx.subscribe()
    }

    /// Advance `from` → `to`. Returns true for the single caller that
    /// performed the transition, false for everyone else.
    pub fn advance(&self, from: LifecycleState, to: LifecycleState) -> bool {
        debug_assert!(from < to, "lifecycle transitions are strictly forward");
        let mut won = false;
        self.tx.send_if_modified(|state| {
            if *state == from {
                *state = to;
                won = true;
                true
            } else {
                false
            }
        });
        won
    }

    /// Wait until the state has reached `target` (or passed it).
    pub async fn reached(&self, target: LifecycleState) {
        let mut rx = self.subscribe();
        // The sender lives as long as the server; a closed channel here
        // means the server was dropped mid-wait, in which case the final
        // observed state is the best answer available.
        let _ = rx.wait_for(|state| *state >= target).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advance_requires_expected_state() {
        let cell = StateCell::new();
        assert!(!cell.advance(LifecycleState::Listening, LifecycleState::Closing));
        assert!(cell.advance(LifecycleState::Created, LifecycleState::Listening));
        assert_eq!(cell.current(), LifecycleState::Listening);
    }

    #[tokio::test]
    async fn concurrent_advance_has_single_winner() {
        let cell = std::sync::Arc::new(StateCell::new());
        cell.advance(LifecycleState::Created, LifecycleState::Listening);

        let mut tasks = Vec::new();
        for _ in 0..32 {
            let cell = cell.clone();
            tasks.push(tokio::spawn(async move {
                cell.advance(LifecycleState::Listening, LifecycleState::Closing)
            }));
        }

        let mut winners = 0;
        for task in tasks {
            if task.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
        assert_eq!(cell.current(), LifecycleState::Closing);
    }

    #[tokio::test]
    async fn reached_observes_later_transition() {
        let cell = std::sync::Arc::new(StateCell::new());
        let waiter = {
            let cell = cell.clone();
            tokio::spawn(async move { cell.reached(LifecycleState::Closed).await })
        };

        cell.advance(LifecycleState::Created, LifecycleState::Listening);
        cell.advance(LifecycleState::Listening, LifecycleState::Closing);
        cell.advance(LifecycleState::Closing, LifecycleState::Closed);

        waiter.await.unwrap();
        assert_eq!(cell.current(), LifecycleState::Closed);
    }
}
