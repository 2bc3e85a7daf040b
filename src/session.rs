//! Capture session lifecycle: open, attach the filter, capture until closed.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::acquisition::{acquire, AcquisitionMode};
use crate::config::CaptureConfig;
use crate::engine::{CaptureBackend, PcapBackend};
use crate::error::CaptureError;
use crate::handle::CaptureHandle;
use crate::summary::PacketSummary;


// how long a closed session waits for the read loop to wind down
const READER_GRACE: Duration = Duration::from_millis(200);


#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum SessionState {
    Created,
    Filtering,
    Capturing,
    Closing,
    Closed,
}


/// An open capture whose filter has not been attached yet.
pub struct PendingSession<B> {
    handle: CaptureHandle<B>,
    mode: AcquisitionMode,
    timeout: Option<Duration>,
}
impl PendingSession<PcapBackend> {
    pub fn open(config: &CaptureConfig) -> Result<Self, CaptureError> {
        let backend = PcapBackend::open_live(config)?;
        Ok(Self::with_backend(backend, config))
    }
}
impl<B: CaptureBackend> PendingSession<B> {
    pub fn with_backend(backend: B, config: &CaptureConfig) -> Self {
        let poll_interval = Duration::from_millis(config.poll_interval_ms.max(1) as u64);
        let handle = CaptureHandle::with_poll_interval(backend, poll_interval);
        handle.advance(SessionState::Filtering);
        Self {
            handle,
            mode: config.mode,
            timeout: config.timeout,
        }
    }

    pub fn state(&self) -> SessionState {
        self.handle.state()
    }

    /// Attaches the filter; on failure the handle is closed before the error is returned.
    pub fn attach_filter(self, expression: &str) -> Result<CaptureSession<B>, CaptureError> {
        if let Err(e) = self.handle.set_filter(expression) {
            self.handle.close();
            return Err(e);
        }
        debug!("filter attached: {:?}", expression);
        self.handle.advance(SessionState::Capturing);
        Ok(CaptureSession {
            handle: self.handle,
            mode: self.mode,
            timeout: self.timeout,
        })
    }
}


/// A filtered capture, ready to run.
pub struct CaptureSession<B> {
    handle: CaptureHandle<B>,
    mode: AcquisitionMode,
    timeout: Option<Duration>,
}
impl<B: CaptureBackend + 'static> CaptureSession<B> {
    /// A handle whose `close` ends the session, e.g. on an interrupt.
    pub fn handle(&self) -> CaptureHandle<B> {
        self.handle.clone()
    }

    pub fn state(&self) -> SessionState {
        self.handle.state()
    }

    /// Reads, decodes and summarizes packets until the handle is closed, by the
    /// timeout, by another holder of the handle, or because the engine ran dry.
    ///
    /// Summaries are passed to `emit` in capture order, numbered from 0.
    /// Returns the number of packets seen. Once the handle is closed this
    /// returns within a short grace period even if a read is stuck in the engine.
    pub async fn run<F>(self, mut emit: F) -> Result<u64, CaptureError>
    where
        F: FnMut(PacketSummary) + Send + 'static,
    {
        let watcher = self.timeout
            .map(|timeout| arm_timeout(self.handle.clone(), timeout));

        let handle = self.handle.clone();
        let mode = self.mode;
        let link_type = handle.link_type();
        if mode.misreads(link_type) {
            warn!(%link_type, "raw acquisition decodes every frame as Ethernet; use the decoding source for this link type");
        }
        info!(?mode, "capture started");

        let seen = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&seen);
        let mut reader = tokio::task::spawn_blocking(move || {
            for packet in acquire(&handle, mode) {
                let sequence = counter.load(Ordering::Acquire);
                let frame = packet.frame();
                debug!(
                    sequence,
                    timestamp = %frame.timestamp,
                    capture_length = frame.capture_length,
                    wire_length = frame.wire_length,
                    "frame received"
                );
                emit(PacketSummary::new(sequence, &packet));
                counter.store(sequence + 1, Ordering::Release);
            }
            handle.close();
        });

        let joined = tokio::select! {
            joined = &mut reader => Some(joined),
            _ = self.handle.closed() => tokio::time::timeout(READER_GRACE, &mut reader).await.ok(),
        };
        if let Some(watcher) = watcher {
            watcher.abort();
        }

        match joined {
            Some(joined) => {
                // release the engine even if the read loop died; the loop is done, so this never waits
                self.handle.close();
                joined?;
            },
            None => warn!(grace = ?READER_GRACE, "engine read still in flight, engine released once it returns"),
        }

        let count = seen.load(Ordering::Acquire);
        info!(packets = count, "capture finished");
        Ok(count)
    }
}


/// Closes `handle` once `timeout` has elapsed. The close runs on the blocking pool.
fn arm_timeout<B: CaptureBackend + 'static>(handle: CaptureHandle<B>, timeout: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::time::sleep(timeout).await;
        match tokio::task::spawn_blocking(move || handle.close()).await {
            Ok(true) => info!(?timeout, "timeout expired, capture closed"),
            Ok(false) => {},
            Err(e) => warn!("closing after timeout failed: {}", e),
        }
    })
}
