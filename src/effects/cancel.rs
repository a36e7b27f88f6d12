//! One-shot cancellation tokens for effect executions.

use futures::channel::oneshot;
use futures::future::{FutureExt, Shared};
use parking_lot::Mutex;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

type Hook = Box<dyn FnOnce() + Send>;

struct Flag {
    cancelled: bool,
    hooks: Vec<Hook>,
    trigger: Option<oneshot::Sender<()>>,
}

struct TokenInner {
    flag: Mutex<Flag>,
    signal: Shared<oneshot::Receiver<()>>,
}

/// Cancellation token owned by exactly one effect execution.
///
/// Moves from live to cancelled once and never back. Clones share the same
/// state.
#[derive(Clone)]
pub struct CancellationToken {
    inner: Arc<TokenInner>,
}

impl CancellationToken {
    pub fn new() -> Self {
        let (trigger, signal) = oneshot::channel();
        Self {
            inner: Arc::new(TokenInner {
                flag: Mutex::new(Flag {
                    cancelled: false,
                    hooks: Vec::new(),
                    trigger: Some(trigger),
                }),
                signal: signal.shared(),
            }),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.flag.lock().cancelled
    }

    /// Cancel the token and run its hooks.
    ///
    /// Returns `true` only for the call that performed the transition.
    pub fn cancel(&self) -> bool {
        let (hooks, trigger) = {
            let mut flag = self.inner.flag.lock();
            if flag.cancelled {
                return false;
            }
            flag.cancelled = true;
            (std::mem::take(&mut flag.hooks), flag.trigger.take())
        };
        for hook in hooks {
            hook();
        }
        if let Some(trigger) = trigger {
            let _ = trigger.send(());
        }
        true
    }

    /// Run `hook` when the token is cancelled, or right away if it already is.
    pub fn on_cancel<F>(&self, hook: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let mut flag = self.inner.flag.lock();
        if flag.cancelled {
            drop(flag);
            hook();
        } else {
            flag.hooks.push(Box::new(hook));
        }
    }

    /// Future that completes once the token is cancelled.
    pub fn cancelled(&self) -> impl Future<Output = ()> + Send + 'static {
        self.inner.signal.clone().map(|_| ())
    }

    /// Guard that cancels the token when dropped, including during unwinding.
    pub fn drop_guard(&self) -> CancelOnDrop {
        CancelOnDrop {
            token: self.clone(),
        }
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancellationToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// Cancels its token on drop.
#[must_use = "the token is cancelled as soon as the guard is dropped"]
pub struct CancelOnDrop {
    token: CancellationToken,
}

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn cancels_exactly_once() {
        let token = CancellationToken::new();

        assert!(!token.is_cancelled());
        assert!(token.cancel());
        assert!(!token.cancel());
        assert!(token.clone().is_cancelled());
    }

    #[test]
    fn hooks_run_once_on_cancel() {
        let token = CancellationToken::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counted = Arc::clone(&calls);
        token.on_cancel(move || {
            counted.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        token.cancel();
        token.cancel();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn late_hook_runs_immediately() {
        let token = CancellationToken::new();
        token.cancel();

        let calls = Arc::new(AtomicUsize::new(0));
        let counted = Arc::clone(&calls);
        token.on_cancel(move || {
            counted.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn cancelled_future_resolves_after_cancel() {
        let token = CancellationToken::new();
        let waiting = token.cancelled();

        assert!(token.cancelled().now_or_never().is_none());
        token.cancel();
        assert!(waiting.now_or_never().is_some());
    }

    #[test]
    fn drop_guard_cancels() {
        let token = CancellationToken::new();
        {
            let _guard = token.drop_guard();
            assert!(!token.is_cancelled());
        }
        assert!(token.is_cancelled());
    }
}
