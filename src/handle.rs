//! The capture handle shared between the read loop and whoever may close it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::Notify;
use tracing::{debug, info};

use crate::config::DEFAULT_POLL_INTERVAL_MS;
use crate::engine::{CaptureBackend, FrameRead};
use crate::error::CaptureError;
use crate::link::LinkType;
use crate::packet::RawFrame;
use crate::session::SessionState;


struct Inner<B> {
    backend: Mutex<Option<B>>,
    closed: AtomicBool,
    close_notify: Notify,
    state: Mutex<SessionState>,
    link_type: LinkType,
    poll_interval: Duration,
}


/// Cloneable handle to one open capture.
///
/// Reads and closes may happen from different threads. `close` is a one-shot:
/// the first call releases the backend, every other call is a no-op. A close
/// never waits on a read that is still inside the engine; whichever of the two
/// finishes last drops the backend.
pub struct CaptureHandle<B> {
    inner: Arc<Inner<B>>,
}
impl<B> Clone for CaptureHandle<B> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}
impl<B: CaptureBackend> CaptureHandle<B> {
    pub fn new(backend: B) -> Self {
        Self::with_poll_interval(backend, Duration::from_millis(DEFAULT_POLL_INTERVAL_MS as u64))
    }

    /// `poll_interval` is the pause after an `Idle` read, and the longest a
    /// close waits for an in-flight read before leaving the release to it.
    pub fn with_poll_interval(backend: B, poll_interval: Duration) -> Self {
        let link_type = backend.link_type();
        Self {
            inner: Arc::new(Inner {
                backend: Mutex::new(Some(backend)),
                closed: AtomicBool::new(false),
                close_notify: Notify::new(),
                state: Mutex::new(SessionState::Created),
                link_type,
                poll_interval,
            }),
        }
    }

    /// Link-layer type reported by the engine when the handle was opened.
    pub fn link_type(&self) -> LinkType {
        self.inner.link_type
    }

    pub fn state(&self) -> SessionState {
        *self.inner.state.lock()
    }

    pub(crate) fn advance(&self, next: SessionState) {
        let mut state = self.inner.state.lock();
        debug!("session state {:?} -> {:?}", *state, next);
        *state = next;
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    pub fn poll_interval(&self) -> Duration {
        self.inner.poll_interval
    }

    /// Completes once `close` has been called, whether or not the backend is released yet.
    pub async fn closed(&self) {
        let notified = self.inner.close_notify.notified();
        if self.is_closed() {
            return;
        }
        notified.await;
    }

    pub fn set_filter(&self, expression: &str) -> Result<(), CaptureError> {
        let mut guard = self.inner.backend.lock();
        match guard.as_mut() {
            Some(backend) => backend.set_filter(expression),
            None => Err(CaptureError::Closed),
        }
    }

    /// One read from the engine. Once the handle is closed this always returns `Exhausted`.
    pub fn read_frame(&self) -> FrameRead {
        if self.is_closed() {
            return FrameRead::Exhausted;
        }
        let mut guard = self.inner.backend.lock();
        let read = match guard.as_mut() {
            Some(backend) => backend.read_frame(),
            None => FrameRead::Exhausted,
        };
        if !self.is_closed() {
            return read;
        }

        // a close that raced with this read wins; it may have left the release to us
        let backend = guard.take();
        drop(guard);
        self.release(backend);
        FrameRead::Exhausted
    }

    /// The raw frames of this capture, ending when the handle is closed or the engine runs dry.
    pub fn listen(&self) -> Frames<B> {
        Frames { handle: self.clone() }
    }

    /// Closes the capture. Returns `true` for the call that actually closed it.
    pub fn close(&self) -> bool {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.advance(SessionState::Closing);
        self.inner.close_notify.notify_waiters();

        match self.inner.backend.try_lock_for(self.inner.poll_interval) {
            Some(mut guard) => {
                let backend = guard.take();
                drop(guard);
                self.release(backend);
            },
            None => debug!("read in flight, engine released when it returns"),
        }
        true
    }

    fn release(&self, backend: Option<B>) {
        let mut backend = match backend {
            Some(b) => b,
            None => return,
        };
        if let Some(stats) = backend.stats() {
            info!(
                received = stats.received,
                dropped = stats.dropped,
                if_dropped = stats.if_dropped,
                "capture statistics"
            );
        }
        drop(backend);
        self.advance(SessionState::Closed);
    }
}


pub struct Frames<B> {
    handle: CaptureHandle<B>,
}
impl<B: CaptureBackend> Iterator for Frames<B> {
    type Item = RawFrame;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.handle.read_frame() {
                FrameRead::Frame(frame) => return Some(frame),
                FrameRead::Idle => thread::sleep(self.handle.poll_interval()),
                FrameRead::Exhausted => return None,
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::sync::Barrier;
    use std::thread;
    use std::time::{Duration, Instant};

    use super::*;
    use crate::testing::ScriptedBackend;

    #[test]
    fn second_close_is_a_no_op() {
        let backend = ScriptedBackend::new(vec![vec![1, 2, 3]]);
        let drops = backend.drop_counter();
        let handle = CaptureHandle::new(backend);

        assert!(handle.close());
        assert!(!handle.close());
        assert_eq!(drops.load(Ordering::SeqCst), 1);
        assert_eq!(handle.state(), SessionState::Closed);
        assert!(matches!(handle.read_frame(), FrameRead::Exhausted));
        assert_eq!(handle.listen().count(), 0);
        assert!(matches!(handle.set_filter("tcp"), Err(CaptureError::Closed)));
    }

    #[test]
    fn concurrent_closes_release_backend_once() {
        for _ in 0..50 {
            let backend = ScriptedBackend::endless(vec![0u8; 60]);
            let drops = backend.drop_counter();
            let handle = CaptureHandle::new(backend);

            let threads = 8;
            let barrier = Arc::new(Barrier::new(threads));
            let winners = Arc::new(AtomicUsize::new(0));
            let closers: Vec<_> = (0..threads)
                .map(|_| {
                    let handle = handle.clone();
                    let barrier = Arc::clone(&barrier);
                    let winners = Arc::clone(&winners);
                    thread::spawn(move || {
                        barrier.wait();
                        if handle.close() {
                            winners.fetch_add(1, Ordering::SeqCst);
                        }
                    })
                })
                .collect();
            for closer in closers {
                closer.join().unwrap();
            }

            assert_eq!(winners.load(Ordering::SeqCst), 1);
            assert_eq!(drops.load(Ordering::SeqCst), 1);
            assert_eq!(handle.state(), SessionState::Closed);
        }
    }

    #[test]
    fn close_ends_an_in_flight_listen() {
        let backend = ScriptedBackend::endless(vec![0u8; 60])
            .with_read_delay(Duration::from_millis(5));
        let handle = CaptureHandle::new(backend);

        let reader = {
            let handle = handle.clone();
            thread::spawn(move || handle.listen().count())
        };
        thread::sleep(Duration::from_millis(50));

        let closed_at = Instant::now();
        assert!(handle.close());
        let seen = reader.join().unwrap();
        assert!(seen > 0);
        assert!(closed_at.elapsed() < Duration::from_millis(500));
    }

    #[test]
    fn close_does_not_wait_for_a_stalled_read() {
        let (backend, release) = ScriptedBackend::stalled(vec![0u8; 60]);
        let drops = backend.drop_counter();
        let handle = CaptureHandle::with_poll_interval(backend, Duration::from_millis(20));

        let reader = {
            let handle = handle.clone();
            thread::spawn(move || handle.listen().count())
        };
        thread::sleep(Duration::from_millis(50));

        let closed_at = Instant::now();
        assert!(handle.close());
        assert!(closed_at.elapsed() < Duration::from_millis(250));
        assert_eq!(handle.state(), SessionState::Closing);
        assert_eq!(drops.load(Ordering::SeqCst), 0);

        // the reader releases the engine once its read returns, and delivers nothing
        release.send(()).unwrap();
        assert_eq!(reader.join().unwrap(), 0);
        assert_eq!(drops.load(Ordering::SeqCst), 1);
        assert_eq!(handle.state(), SessionState::Closed);
        assert!(!handle.close());
    }

    #[test]
    fn idle_polling_notices_close() {
        let handle = CaptureHandle::with_poll_interval(ScriptedBackend::silent(), Duration::from_millis(10));
        let reader = {
            let handle = handle.clone();
            thread::spawn(move || handle.listen().count())
        };
        thread::sleep(Duration::from_millis(50));

        let closed_at = Instant::now();
        assert!(handle.close());
        assert_eq!(reader.join().unwrap(), 0);
        assert!(closed_at.elapsed() < Duration::from_millis(250));
        assert_eq!(handle.state(), SessionState::Closed);
    }

    #[tokio::test]
    async fn closed_completes_after_close() {
        let handle = CaptureHandle::new(ScriptedBackend::new(vec![]));
        let waiter = {
            let handle = handle.clone();
            tokio::spawn(async move { handle.closed().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        assert!(handle.close());
        tokio::time::timeout(Duration::from_secs(1), waiter).await.unwrap().unwrap();
        // already closed: returns at once
        tokio::time::timeout(Duration::from_millis(100), handle.closed()).await.unwrap();
    }

    #[test]
    fn idle_reads_are_skipped() {
        let backend = ScriptedBackend::new(vec![vec![1], vec![2]]).with_idle_reads(3);
        let handle = CaptureHandle::with_poll_interval(backend, Duration::from_millis(1));
        let frames: Vec<_> = handle.listen().map(|f| f.data).collect();
        assert_eq!(frames, vec![vec![1], vec![2]]);
        assert!(!handle.is_closed());
    }
}
