//! Live packet capture: open an interface, attach a filter, decode and
//! summarize every frame until the capture is closed.

pub mod acquisition;
pub mod bytes;
pub mod config;
pub mod decode;
pub mod engine;
pub mod error;
pub mod ethernet;
pub mod handle;
pub mod ip;
pub mod link;
pub mod packet;
pub mod session;
pub mod summary;
pub mod tcp_udp;

#[cfg(test)]
mod testing;


pub use crate::acquisition::AcquisitionMode;
pub use crate::config::CaptureConfig;
pub use crate::decode::{DecodedPacket, Layer, LayerType};
pub use crate::engine::{CaptureBackend, FrameRead, PcapBackend};
pub use crate::error::CaptureError;
pub use crate::handle::CaptureHandle;
pub use crate::session::{CaptureSession, PendingSession, SessionState};
pub use crate::summary::PacketSummary;
