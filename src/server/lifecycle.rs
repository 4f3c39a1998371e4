//! Monotonic lifecycle state shared by a server and its handle.

use tokio::sync::watch;

/// Lifecycle of a runner listener.
///
/// States only move forward: `Created → Listening → Draining → Closed`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LifecycleState {
    /// Configured but not yet bound.
    Created,
    /// Bound and accepting connections.
    Listening,
    /// No longer accepting; open connections are finishing.
    Draining,
    /// Fully torn down. Terminal.
    Closed,
}

/// Owner of the lifecycle state.
///
/// Transitions go through [`watch::Sender::send_if_modified`], so a
/// compare-and-set is atomic with respect to concurrent callers and every
/// subscriber observes each published state.
#[derive(Debug)]
pub(crate) struct Lifecycle {
    tx: watch::Sender<LifecycleState>,
}

impl Lifecycle {
    pub(crate) fn new() -> Self {
        let (tx, _rx) = watch::channel(LifecycleState::Created);
        Self { tx }
    }

    pub(crate) fn current(&self) -> LifecycleState { *self.tx.borrow() }

    /// Move from `from` to `to`; returns `false` if the state was not `from`.
    pub(crate) fn advance(&self, from: LifecycleState, to: LifecycleState) -> bool {
        debug_assert!(from < to, "lifecycle must move forward: {from:?} -> {to:?}");
        self.tx.send_if_modified(|state| {
            if *state == from {
                *state = to;
                true
            } else {
                false
            }
        })
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<LifecycleState> { self.tx.subscribe() }
}
