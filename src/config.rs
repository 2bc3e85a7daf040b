use std::time::Duration;

use crate::acquisition::AcquisitionMode;


/// Bytes kept per frame.
pub const DEFAULT_SNAPLEN: i32 = 1600;

/// Engine buffer timeout and pause after an empty read; bounds how long a close takes to be noticed.
pub const DEFAULT_POLL_INTERVAL_MS: i32 = 100;

/// libpcap pseudo-device capturing on every interface at once.
pub const ALL_INTERFACES_DEVICE: &str = "any";


#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CaptureConfig {
    /// empty means all interfaces
    pub interface: String,
    pub snaplen: i32,
    pub promiscuous: bool,
    pub mode: AcquisitionMode,
    /// deliver each frame as soon as it arrives instead of batching through the ring buffer
    pub use_syscalls: bool,
    pub poll_interval_ms: i32,
    pub timeout: Option<Duration>,
    pub filter: String,
}
impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            interface: String::new(),
            snaplen: DEFAULT_SNAPLEN,
            promiscuous: true,
            mode: AcquisitionMode::default(),
            use_syscalls: false,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            timeout: None,
            filter: String::new(),
        }
    }
}
impl CaptureConfig {
    /// The device name handed to libpcap.
    pub fn device_name(&self) -> &str {
        if self.interface.is_empty() {
            ALL_INTERFACES_DEVICE
        } else {
            &self.interface
        }
    }

    /// Zero seconds disables the timeout.
    pub fn with_timeout_secs(mut self, seconds: u64) -> Self {
        self.timeout = if seconds > 0 {
            Some(Duration::from_secs(seconds))
        } else {
            None
        };
        self
    }

    pub fn with_filter_words<S: AsRef<str>>(mut self, words: &[S]) -> Self {
        self.filter = words.iter()
            .map(|w| w.as_ref())
            .collect::<Vec<_>>()
            .join(" ");
        self
    }
}
