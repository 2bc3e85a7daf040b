use chrono::{DateTime, Utc};
use pcap::Packet;

use crate::link::LinkType;


/// A frame as delivered by the capture engine, copied out of its buffer.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RawFrame {
    pub timestamp: DateTime<Utc>,
    /// number of bytes the engine actually captured (at most the snapshot length)
    pub capture_length: u32,
    /// length of the frame on the wire
    pub wire_length: u32,
    pub link_type: LinkType,
    pub data: Vec<u8>,
}
impl RawFrame {
    /// Wraps bytes that did not come from a capture handle; lengths are taken from the data.
    pub fn new(data: Vec<u8>, link_type: LinkType) -> Self {
        let length = u32::try_from(data.len()).unwrap_or(u32::MAX);
        Self {
            timestamp: Utc::now(),
            capture_length: length,
            wire_length: length,
            link_type,
            data,
        }
    }

    pub fn from_packet(p: Packet<'_>, link_type: LinkType) -> Self {
        let seconds = p.header.ts.tv_sec as i64;
        let nanoseconds = (p.header.ts.tv_usec as u32).saturating_mul(1000);
        let timestamp = DateTime::from_timestamp(seconds, nanoseconds)
            .unwrap_or_else(Utc::now);
        Self {
            timestamp,
            capture_length: p.header.caplen,
            wire_length: p.header.len,
            link_type,
            data: p.data.into(),
        }
    }
}


#[derive(Debug)]
pub enum PacketDissection<'a, H> {
    Success { header: H, rest: &'a [u8] },
    TooShort,
    WrongType,
}
