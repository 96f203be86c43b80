//! ResultFuture - single-assignment completion handle for async requests.
//!
//! State moves PENDING → COMPLETED or PENDING → FAILED exactly once. Any later
//! `completed` / `failed` call returns `false` and changes nothing, so racing
//! transport callbacks can never deliver twice.

use std::fmt;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::watch;

use crate::domain::EngineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FutureState {
    Pending,
    Completed,
    Failed,
}

impl FutureState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, FutureState::Pending)
    }
}

enum Slot<T> {
    Pending,
    Completed(Option<T>),
    Failed(Option<EngineError>),
}

struct Inner<T> {
    slot: Mutex<Slot<T>>,
    condvar: Condvar,
    state_tx: watch::Sender<FutureState>,
}

/// Cloneable handle; every clone observes the same single outcome, which only
/// one of them can take.
pub struct ResultFuture<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for ResultFuture<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> Default for ResultFuture<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ResultFuture<T> {
    pub fn new() -> Self {
        let (state_tx, _) = watch::channel(FutureState::Pending);
        Self {
            inner: Arc::new(Inner {
                slot: Mutex::new(Slot::Pending),
                condvar: Condvar::new(),
                state_tx,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Slot<T>> {
        self.inner
            .slot
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn state(&self) -> FutureState {
        match &*self.lock() {
            Slot::Pending => FutureState::Pending,
            Slot::Completed(_) => FutureState::Completed,
            Slot::Failed(_) => FutureState::Failed,
        }
    }

    pub fn is_done(&self) -> bool {
        self.state().is_terminal()
    }

    /// Complete with a value. Returns `false` if an outcome was already set.
    pub fn completed(&self, value: T) -> bool {
        self.transition(Slot::Completed(Some(value)), FutureState::Completed)
    }

    /// Fail with a cause. Returns `false` if an outcome was already set.
    pub fn failed(&self, cause: EngineError) -> bool {
        self.transition(Slot::Failed(Some(cause)), FutureState::Failed)
    }

    fn transition(&self, next: Slot<T>, state: FutureState) -> bool {
        {
            let mut slot = self.lock();
            if !matches!(*slot, Slot::Pending) {
                return false;
            }
            *slot = next;
        }
        self.inner.condvar.notify_all();
        self.inner.state_tx.send_replace(state);
        true
    }

    fn take(slot: &mut Slot<T>) -> Option<Result<T, EngineError>> {
        match slot {
            Slot::Pending => None,
            Slot::Completed(value) => Some(value.take().ok_or(EngineError::ResultTaken)),
            Slot::Failed(cause) => Some(Err(cause.clone().unwrap_or(EngineError::ResultTaken))),
        }
    }

    /// Wait for the outcome without blocking the executor.
    ///
    /// The value can be taken once; a failure can be observed by every clone.
    pub async fn join(self) -> Result<T, EngineError> {
        let mut rx = self.inner.state_tx.subscribe();
        // the sender lives in `inner`, so the channel cannot close while we wait
        let _ = rx.wait_for(FutureState::is_terminal).await;
        let mut slot = self.lock();
        // terminal once `wait_for` returns; a pending slot here means nothing is left to take
        Self::take(&mut slot).unwrap_or(Err(EngineError::ResultTaken))
    }

    /// Block the current thread until the outcome is set.
    ///
    /// Must not be called from inside an async task whose progress is needed to
    /// complete this future.
    pub fn wait(self) -> Result<T, EngineError> {
        let mut slot = self.lock();
        loop {
            if let Some(outcome) = Self::take(&mut slot) {
                return outcome;
            }
            slot = self
                .inner
                .condvar
                .wait(slot)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
        }
    }

    /// Like [`wait`](Self::wait) with a deadline; `None` when it passes first.
    pub fn wait_timeout(self, timeout: Duration) -> Option<Result<T, EngineError>> {
        let slot = self.lock();
        let (mut slot, _) = self
            .inner
            .condvar
            .wait_timeout_while(slot, timeout, |s| matches!(s, Slot::Pending))
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Self::take(&mut slot)
    }
}

impl<T> fmt::Debug for ResultFuture<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultFuture")
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TransportError;

    #[test]
    fn transitions_exactly_once() {
        let f = ResultFuture::<u32>::new();
        assert_eq!(f.state(), FutureState::Pending);

        assert!(f.completed(1));
        assert!(!f.completed(2));
        assert!(!f.failed(EngineError::NoRuntime));
        assert_eq!(f.state(), FutureState::Completed);
        assert_eq!(f.wait().unwrap(), 1);
    }

    #[test]
    fn failure_is_visible_to_every_clone() {
        let f = ResultFuture::<u32>::new();
        let g = f.clone();
        let cause = EngineError::Transport(TransportError::timeout("read"));
        assert!(f.failed(cause.clone()));

        assert_eq!(f.wait().unwrap_err(), cause);
        assert_eq!(g.wait().unwrap_err(), cause);
    }

    #[test]
    fn concurrent_completions_deliver_once() {
        let f = ResultFuture::<usize>::new();
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let f = f.clone();
                std::thread::spawn(move || f.completed(i))
            })
            .collect();
        let wins = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(wins, 1);
        assert!(f.wait().is_ok());
    }

    #[test]
    fn second_taker_gets_result_taken() {
        let f = ResultFuture::<u32>::new();
        let g = f.clone();
        assert!(f.completed(7));

        assert_eq!(f.wait().unwrap(), 7);
        assert_eq!(g.wait().unwrap_err(), EngineError::ResultTaken);
    }

    #[test]
    fn wait_timeout_returns_none_while_pending() {
        let f = ResultFuture::<u32>::new();
        assert!(f.wait_timeout(Duration::from_millis(20)).is_none());
    }

    #[tokio::test]
    async fn join_wakes_on_completion_from_another_thread() {
        let f = ResultFuture::<&'static str>::new();
        let g = f.clone();
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            g.completed("done");
        });
        assert_eq!(f.join().await.unwrap(), "done");
    }
}
