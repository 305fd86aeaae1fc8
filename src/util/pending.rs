use std::fmt::Debug;
use std::mem;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tokio::sync::Notify;
use tracing::warn;

use crate::{Error, Result};

/// Single-slot rendezvous between a caller waiting for an adapter operation
/// and the adapter event that completes it. `K` identifies the operation, `C`
/// is the context needed to complete it, and `R` is the outcome.
///
/// The waiter may block on a condition variable or await a notification, so
/// the same slot serves the blocking and async APIs.
#[derive(Debug)]
pub(crate) struct Pending<K, C, R> {
    kind: &'static str,
    state: Mutex<State<K, C, R>>,
    cv: Condvar,
    notify: Notify,
}

#[derive(Debug)]
enum State<K, C, R> {
    Idle,
    Waiting(K, C),
    Done(R),
    /// Waiter timed out while the operation was outstanding at the adapter.
    Abandoned(K, C),
}

impl<K, C, R> State<K, C, R> {
    /// Takes the outcome, resetting the slot.
    fn take(&mut self, kind: &str) -> Option<R> {
        match self {
            Self::Waiting(..) => None,
            Self::Done(_) => match mem::replace(self, Self::Idle) {
                Self::Done(r) => Some(r),
                _ => unreachable!(),
            },
            Self::Idle | Self::Abandoned(..) => panic!("no {kind} in progress"),
        }
    }

    /// Marks an outstanding operation as abandoned by its waiter.
    fn abandon(&mut self) {
        if let Self::Waiting(..) = self {
            if let Self::Waiting(k, c) = mem::replace(self, Self::Idle) {
                *self = Self::Abandoned(k, c);
            }
        }
    }
}

impl<K: Debug + PartialEq, C, R> Pending<K, C, R> {
    /// Creates an idle slot for operations of the specified kind.
    #[inline]
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            state: Mutex::new(State::Idle),
            cv: Condvar::new(),
            notify: Notify::new(),
        }
    }

    /// Begins a new operation. Returns [`Error::Busy`] if the previous
    /// operation was abandoned and has not completed yet.
    ///
    /// # Panics
    ///
    /// Panics if another operation of the same kind is in progress.
    pub fn begin(&self, key: K, ctx: C) -> Result<()> {
        let mut s = self.state.lock();
        match *s {
            State::Idle => {
                *s = State::Waiting(key, ctx);
                Ok(())
            }
            State::Abandoned(ref k, _) => {
                warn!("{} {k:?} is still outstanding", self.kind);
                Err(Error::Busy(self.kind))
            }
            State::Waiting(..) | State::Done(_) => panic!("{} already in progress", self.kind),
        }
    }

    /// Blocks until the current operation completes or the timeout expires.
    pub fn wait(&self, timeout: Option<Duration>) -> Result<R> {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut s = self.state.lock();
        loop {
            if let Some(r) = s.take(self.kind) {
                return Ok(r);
            }
            match deadline {
                None => self.cv.wait(&mut s),
                Some(d) => {
                    if self.cv.wait_until(&mut s, d).timed_out() {
                        return s.take(self.kind).ok_or_else(|| {
                            s.abandon();
                            Error::Timeout(self.kind)
                        });
                    }
                }
            }
        }
    }

    /// Awaits completion of the current operation or timeout expiration. If
    /// the future is dropped before completion, the operation is abandoned.
    /// If it is dropped after completion but before the outcome is taken, the
    /// outcome is passed to `discard`.
    pub async fn wait_async(
        &self,
        timeout: Option<Duration>,
        discard: impl FnOnce(R),
    ) -> Result<R> {
        let mut guard = AbandonOnDrop(Some((self, discard)));
        let done = async {
            loop {
                let n = self.notify.notified();
                tokio::pin!(n);
                n.as_mut().enable();
                let r = self.state.lock().take(self.kind);
                if let Some(r) = r {
                    return r;
                }
                n.await;
            }
        };
        let r = match timeout {
            None => Ok(done.await),
            Some(t) => match tokio::time::timeout(t, done).await {
                Ok(r) => Ok(r),
                Err(_) => {
                    let mut s = self.state.lock();
                    s.take(self.kind).ok_or_else(|| {
                        s.abandon();
                        Error::Timeout(self.kind)
                    })
                }
            },
        };
        guard.0 = None;
        r
    }

    /// Completes the operation identified by `key`, calling `f` to produce its
    /// outcome and releasing the waiter. If the waiter already gave up, the
    /// slot is reset and the operation context is returned instead.
    ///
    /// # Panics
    ///
    /// Panics if no operation is in progress or `key` does not match it.
    pub fn complete(&self, key: &K, f: impl FnOnce(C) -> R) -> Option<C> {
        let mut s = self.state.lock();
        match *s {
            State::Waiting(ref k, _) | State::Abandoned(ref k, _) => {
                assert_eq!(k, key, "unexpected {} completion", self.kind);
            }
            State::Idle | State::Done(_) => {
                panic!("{} {key:?} completed with no operation in progress", self.kind)
            }
        }
        match mem::replace(&mut *s, State::Idle) {
            State::Waiting(_, c) => *s = State::Done(f(c)),
            State::Abandoned(_, c) => return Some(c),
            State::Idle | State::Done(_) => unreachable!(),
        }
        drop(s);
        self.cv.notify_all();
        self.notify.notify_waiters();
        None
    }
}

/// Abandons an operation or discards its outcome when an async waiter is
/// dropped before taking it.
struct AbandonOnDrop<'a, K, C, R, F: FnOnce(R)>(Option<(&'a Pending<K, C, R>, F)>);

impl<K, C, R, F: FnOnce(R)> Drop for AbandonOnDrop<'_, K, C, R, F> {
    fn drop(&mut self) {
        let Some((p, discard)) = self.0.take() else { return };
        let mut s = p.state.lock();
        if let State::Done(_) = *s {
            let Some(r) = s.take(p.kind) else { return };
            drop(s);
            warn!("{} outcome discarded", p.kind);
            discard(r);
        } else {
            s.abandon();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;

    type Slot = Pending<u32, &'static str, String>;

    #[test]
    fn complete_before_wait() {
        let p = Slot::new("op");
        p.begin(1, "ctx").unwrap();
        assert!(p.complete(&1, |c| format!("{c} done")).is_none());
        assert_eq!(p.wait(None).unwrap(), "ctx done");
        p.begin(2, "next").unwrap();
    }

    #[test]
    fn complete_from_thread() {
        let p = Arc::new(Slot::new("op"));
        p.begin(1, "ctx").unwrap();
        let q = Arc::clone(&p);
        let t = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            q.complete(&1, str::to_owned)
        });
        assert_eq!(p.wait(Some(Duration::from_secs(5))).unwrap(), "ctx");
        assert!(t.join().unwrap().is_none());
    }

    #[test]
    fn timeout_busy_late() {
        let p = Slot::new("op");
        p.begin(1, "ctx").unwrap();
        assert!(matches!(
            p.wait(Some(Duration::from_millis(10))),
            Err(Error::Timeout("op"))
        ));
        assert!(matches!(p.begin(2, "other"), Err(Error::Busy("op"))));
        assert_eq!(p.complete(&1, |_| unreachable!()), Some("ctx"));
        p.begin(2, "other").unwrap();
    }

    #[test]
    #[should_panic(expected = "op already in progress")]
    fn double_begin() {
        let p = Slot::new("op");
        p.begin(1, "a").unwrap();
        let _ = p.begin(2, "b");
    }

    #[test]
    #[should_panic(expected = "no operation in progress")]
    fn unexpected_complete() {
        let p = Slot::new("op");
        p.complete(&1, str::to_owned);
    }

    #[test]
    #[should_panic(expected = "unexpected op completion")]
    fn key_mismatch() {
        let p = Slot::new("op");
        p.begin(1, "a").unwrap();
        p.complete(&2, str::to_owned);
    }

    #[tokio::test]
    async fn wait_async() {
        let p = Arc::new(Slot::new("op"));
        p.begin(1, "ctx").unwrap();
        let q = Arc::clone(&p);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            q.complete(&1, str::to_owned);
        });
        assert_eq!(p.wait_async(None, drop).await.unwrap(), "ctx");

        p.begin(2, "ctx").unwrap();
        assert!(matches!(
            p.wait_async(Some(Duration::from_millis(10)), drop).await,
            Err(Error::Timeout("op"))
        ));
        assert!(matches!(p.begin(3, "x"), Err(Error::Busy("op"))));
        assert_eq!(p.complete(&2, str::to_owned), Some("ctx"));
    }

    #[tokio::test]
    async fn drop_waiter() {
        let p = Slot::new("op");
        p.begin(1, "ctx").unwrap();
        {
            let w = p.wait_async(None, |_| unreachable!());
            tokio::pin!(w);
            assert!(futures_poll_once(w.as_mut()).await.is_none());
        }
        assert!(matches!(p.begin(2, "x"), Err(Error::Busy("op"))));
        assert_eq!(p.complete(&1, str::to_owned), Some("ctx"));
    }

    #[tokio::test]
    async fn drop_completed_waiter() {
        let p = Slot::new("op");
        let discarded = Mutex::new(None);
        p.begin(1, "ctx").unwrap();
        {
            let w = p.wait_async(None, |r| *discarded.lock() = Some(r));
            tokio::pin!(w);
            assert!(futures_poll_once(w.as_mut()).await.is_none());
            assert!(p.complete(&1, str::to_owned).is_none());
        }
        assert_eq!(discarded.lock().as_deref(), Some("ctx"));
        p.begin(2, "next").unwrap();
    }

    /// Polls a future once.
    async fn futures_poll_once<F: std::future::Future + Unpin>(f: F) -> Option<F::Output> {
        tokio::select! {
            biased;
            r = f => Some(r),
            () = std::future::ready(()) => None,
        }
    }
}
