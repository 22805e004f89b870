use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

/// How often a blocked caller looks at the token while work runs elsewhere.
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// A cancellation signal shared between the caller and a running loop.
///
/// Clones observe the same [`CancellationToken`]. A token may also carry a deadline,
/// after which it reports itself cancelled without anyone calling [`CancelToken::cancel`].
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            token: CancellationToken::new(),
            deadline: Instant::now().checked_add(timeout),
        }
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
            || self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
    }

    /// Time left before the deadline, `None` when the token has no deadline.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    /// The underlying token, for callers that want to await cancellation.
    pub fn inner(&self) -> &CancellationToken {
        &self.token
    }

    /// Run `job` on a worker thread and wait for it unless the token fires first.
    ///
    /// Returns `None` when cancelled. The worker is detached at that point and its
    /// result is dropped whenever it finishes.
    pub fn run_until_cancelled<T, F>(&self, job: F) -> Option<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        if self.is_cancelled() {
            return None;
        }

        let (tx, rx) = mpsc::channel();
        let worker = thread::spawn(move || {
            // the receiver is gone if the caller was cancelled
            let _ = tx.send(job());
        });

        loop {
            match rx.recv_timeout(POLL_INTERVAL) {
                Ok(value) => return Some(value),
                Err(RecvTimeoutError::Timeout) if self.is_cancelled() => return None,
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => {
                    if let Err(panic) = worker.join() {
                        std::panic::resume_unwind(panic);
                    }
                    return None;
                }
            }
        }
    }
}
