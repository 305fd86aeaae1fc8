use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{ready, Context, Poll};

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::{Adapter, EventReceiver, Server};

/// Future that delivers adapter events from a channel to a server.
#[derive(Debug)]
pub struct EventLoop {
    h: tokio::task::JoinHandle<()>,
    c: CancellationToken,
    _g: tokio_util::sync::DropGuard,
}

impl EventLoop {
    /// Spawns a task that calls [`Server::handle_event`] for each received
    /// event, in order, until the channel is closed or the loop is stopped.
    #[must_use]
    pub fn spawn<A: Adapter>(srv: Arc<Server<A>>, rx: EventReceiver) -> Self {
        let c = CancellationToken::new();
        Self {
            h: tokio::spawn(Self::run(srv, rx, c.clone())),
            c: c.clone(),
            _g: c.drop_guard(),
        }
    }

    /// Stops event processing. Events remaining in the channel are not
    /// delivered.
    #[inline]
    pub async fn stop(self) {
        self.c.cancel();
        join(self.h.await);
    }

    /// Receives events until cancellation.
    async fn run<A: Adapter>(srv: Arc<Server<A>>, mut rx: EventReceiver, c: CancellationToken) {
        debug!("Event loop started");
        loop {
            let e = tokio::select! {
                biased;
                _ = c.cancelled() => {
                    debug!("Event loop terminating");
                    return;
                }
                e = rx.recv() => e,
            };
            let Some(e) = e else {
                debug!("Event channel closed");
                return;
            };
            srv.handle_event(e);
        }
    }
}

impl Future for EventLoop {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        join(ready!(Pin::new(&mut self.h).poll(cx)));
        Poll::Ready(())
    }
}

/// Propagates an event loop panic.
#[inline]
fn join(r: Result<(), tokio::task::JoinError>) {
    if let Err(e) = r {
        if e.is_panic() {
            std::panic::resume_unwind(e.into_panic());
        }
    }
}

impl<A: Adapter> Server<A> {
    /// Spawns an [`EventLoop`] that delivers events from `rx` to the server.
    #[inline]
    #[must_use]
    pub fn event_loop(self: &Arc<Self>, rx: EventReceiver) -> EventLoop {
        EventLoop::spawn(Arc::clone(self), rx)
    }
}
