//! The two ways a session pulls decoded packets out of a capture handle.

use crate::decode::DecodedPacket;
use crate::engine::CaptureBackend;
use crate::handle::{CaptureHandle, Frames};
use crate::link::LinkType;


#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum AcquisitionMode {
    /// frames go through a `PacketSource`, decoded under the handle's link type
    Mediated,
    /// frames are read directly and always decoded as Ethernet
    Raw,
}
impl Default for AcquisitionMode {
    fn default() -> Self { Self::Raw }
}
impl AcquisitionMode {
    /// Whether frames of a capture with this link type come out of this mode undecodable.
    pub fn misreads(self, link_type: LinkType) -> bool {
        self == Self::Raw && link_type != LinkType::Ethernet
    }
}


/// Decoding packet source: pulls frames from the handle and decodes each under
/// the link-layer type it was built with.
pub struct PacketSource<B> {
    frames: Frames<B>,
    link_type: LinkType,
}
impl<B: CaptureBackend> PacketSource<B> {
    pub fn new(handle: &CaptureHandle<B>, link_type: LinkType) -> Self {
        Self {
            frames: handle.listen(),
            link_type,
        }
    }
}
impl<B: CaptureBackend> Iterator for PacketSource<B> {
    type Item = DecodedPacket;

    fn next(&mut self) -> Option<Self::Item> {
        let frame = self.frames.next()?;
        Some(DecodedPacket::decode_as(frame, self.link_type))
    }
}


/// Raw frames wrapped as Ethernet.
///
/// The real link-layer type of the handle is not consulted; on anything but an
/// Ethernet capture (e.g. the "any" device, which yields Linux cooked frames)
/// the decoded layers are meaningless.
pub struct RawPackets<B> {
    frames: Frames<B>,
}
impl<B: CaptureBackend> RawPackets<B> {
    pub fn new(handle: &CaptureHandle<B>) -> Self {
        Self { frames: handle.listen() }
    }
}
impl<B: CaptureBackend> Iterator for RawPackets<B> {
    type Item = DecodedPacket;

    fn next(&mut self) -> Option<Self::Item> {
        let frame = self.frames.next()?;
        Some(DecodedPacket::decode_as(frame, LinkType::Ethernet))
    }
}


/// Decoded packets from `handle`, using the strategy picked for the session.
pub fn acquire<B>(handle: &CaptureHandle<B>, mode: AcquisitionMode) -> Box<dyn Iterator<Item = DecodedPacket> + Send>
where
    B: CaptureBackend + 'static,
{
    match mode {
        AcquisitionMode::Mediated => Box::new(PacketSource::new(handle, handle.link_type())),
        AcquisitionMode::Raw => Box::new(RawPackets::new(handle)),
    }
}
