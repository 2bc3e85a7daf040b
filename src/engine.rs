//! Binding to the capture engine (libpcap through the `pcap` crate).

use pcap::{Active, Capture, Error as PcapError};
use tracing::{debug, info, warn};

use crate::config::CaptureConfig;
use crate::error::CaptureError;
use crate::link::LinkType;
use crate::packet::RawFrame;


/// Outcome of a single read from a capture engine.
#[derive(Debug)]
pub enum FrameRead {
    Frame(RawFrame),
    /// nothing is waiting to be read right now
    Idle,
    /// no frame will ever arrive again
    Exhausted,
}


#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct CaptureStats {
    pub received: u32,
    pub dropped: u32,
    pub if_dropped: u32,
}


/// What a session needs from a capture engine.
///
/// `read_frame` should not block: with nothing to read it returns `Idle` and
/// the caller backs off. A read that does block holds the engine until it
/// returns, but never holds up a close.
pub trait CaptureBackend: Send {
    fn set_filter(&mut self, expression: &str) -> Result<(), CaptureError>;
    fn link_type(&self) -> LinkType;
    fn read_frame(&mut self) -> FrameRead;

    fn stats(&mut self) -> Option<CaptureStats> {
        None
    }
}


pub struct PcapBackend {
    capture: Capture<Active>,
    link_type: LinkType,
}
impl PcapBackend {
    pub fn open_live(config: &CaptureConfig) -> Result<Self, CaptureError> {
        let device = config.device_name();
        debug!(
            device,
            snaplen = config.snaplen,
            promiscuous = config.promiscuous,
            immediate = config.use_syscalls,
            "opening capture"
        );

        let capture = Capture::from_device(device)
            .and_then(|inactive| {
                inactive
                    .promisc(config.promiscuous)
                    .snaplen(config.snaplen)
                    .timeout(config.poll_interval_ms.max(1))
                    .immediate_mode(config.use_syscalls)
                    .open()
            })
            // an empty ring never wakes a blocking read, so poll instead
            .and_then(|active| active.setnonblock())
            .map_err(|source| CaptureError::Open {
                interface: device.to_owned(),
                source,
            })?;

        let link_type = LinkType::from(capture.get_datalink());
        info!(device, %link_type, dlt = link_type.dlt(), "capture opened");
        Ok(Self { capture, link_type })
    }
}
impl CaptureBackend for PcapBackend {
    fn set_filter(&mut self, expression: &str) -> Result<(), CaptureError> {
        self.capture
            .filter(expression, true)
            .map_err(|e| CaptureError::Filter {
                expression: expression.to_owned(),
                reason: e.to_string(),
            })
    }

    fn link_type(&self) -> LinkType {
        self.link_type
    }

    fn read_frame(&mut self) -> FrameRead {
        match self.capture.next_packet() {
            Ok(packet) => FrameRead::Frame(RawFrame::from_packet(packet, self.link_type)),
            Err(PcapError::TimeoutExpired) => FrameRead::Idle,
            Err(PcapError::NoMorePackets) => FrameRead::Exhausted,
            Err(e) => {
                warn!("capture read failed, ending capture: {}", e);
                FrameRead::Exhausted
            },
        }
    }

    fn stats(&mut self) -> Option<CaptureStats> {
        match self.capture.stats() {
            Ok(stats) => Some(CaptureStats {
                received: stats.received,
                dropped: stats.dropped,
                if_dropped: stats.if_dropped,
            }),
            Err(e) => {
                debug!("capture statistics unavailable: {}", e);
                None
            },
        }
    }
}
