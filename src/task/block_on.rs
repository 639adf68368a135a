//! Drive a single future to completion on the calling thread.

use std::future::Future;
use std::pin::pin;
use std::sync::Arc;
use std::task::{Context, Poll, Wake, Waker};
use std::thread::{self, Thread};

struct ThreadWaker {
    thread: Thread,
}

impl Wake for ThreadWaker {
    fn wake(self: Arc<Self>) {
        self.thread.unpark();
    }

    fn wake_by_ref(self: &Arc<Self>) {
        self.thread.unpark();
    }
}

/// Blocks the calling thread until the future completes.
///
/// The thread parks between polls and is unparked by the future's waker, so
/// completions arriving from the event loop or a service worker resume the
/// wait promptly. Spurious unparks only cause an extra poll.
///
/// This is a driver for code *outside* the event loop (typically `main` or
/// tests). Do not call it from a job running on the loop thread: the loop
/// would be blocked and could never deliver the completion being waited on.
pub fn block_on<F: Future>(future: F) -> F::Output {
    let waker = Waker::from(Arc::new(ThreadWaker {
        thread: thread::current(),
    }));
    let mut cx = Context::from_waker(&waker);
    let mut future = pin!(future);

    loop {
        match future.as_mut().poll(&mut cx) {
            Poll::Ready(output) => return output,
            Poll::Pending => thread::park(),
        }
    }
}
