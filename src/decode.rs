//! Layer-by-layer decoding of captured frames.
//!
//! Decoding never fails as a whole: when a header is missing, truncated or of an
//! unsupported kind, decoding stops and the packet simply carries fewer layers.

use std::fmt;

use tracing::debug;

use crate::ethernet::{EthernetHeader, VlanTagHeader, ETHERTYPE_IPV4, ETHERTYPE_IPV6, ETHERTYPE_VLAN_TAG};
use crate::ip::{IpProtocol, Ipv4Header, Ipv6Header};
use crate::link::{LinkType, LinuxSllHeader, LoopbackHeader, LOOPBACK_FAMILY_INET, LOOPBACK_FAMILY_INET6};
use crate::packet::{PacketDissection, RawFrame};
use crate::tcp_udp::{TcpHeader, UdpHeader};


// stacked VLAN tags beyond this are left undecoded
const MAX_VLAN_TAGS: usize = 4;


#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum LayerType {
    Ethernet,
    Dot1Q,
    LinuxSll,
    Loopback,
    Ipv4,
    Ipv6,
    Tcp,
    Udp,
    Payload,
}
impl fmt::Display for LayerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Ethernet => "Ethernet",
            Self::Dot1Q => "Dot1Q",
            Self::LinuxSll => "Linux SLL",
            Self::Loopback => "Loopback",
            Self::Ipv4 => "IPv4",
            Self::Ipv6 => "IPv6",
            Self::Tcp => "TCP",
            Self::Udp => "UDP",
            Self::Payload => "Payload",
        };
        f.write_str(name)
    }
}


#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Layer {
    Ethernet(EthernetHeader),
    Dot1Q(VlanTagHeader),
    LinuxSll(LinuxSllHeader),
    Loopback(LoopbackHeader),
    Ipv4(Ipv4Header),
    Ipv6(Ipv6Header),
    Tcp(TcpHeader),
    Udp(UdpHeader),
    /// application data left over after the last decoded header, by length
    Payload(usize),
}
impl Layer {
    pub fn layer_type(&self) -> LayerType {
        match self {
            Self::Ethernet(_) => LayerType::Ethernet,
            Self::Dot1Q(_) => LayerType::Dot1Q,
            Self::LinuxSll(_) => LayerType::LinuxSll,
            Self::Loopback(_) => LayerType::Loopback,
            Self::Ipv4(_) => LayerType::Ipv4,
            Self::Ipv6(_) => LayerType::Ipv6,
            Self::Tcp(_) => LayerType::Tcp,
            Self::Udp(_) => LayerType::Udp,
            Self::Payload(_) => LayerType::Payload,
        }
    }
}


/// A captured frame together with the layers found in it, bottom-up.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DecodedPacket {
    frame: RawFrame,
    layers: Vec<Layer>,
}
impl DecodedPacket {
    /// Decodes `frame` under the given link-layer type, ignoring the type the frame declares.
    pub fn decode_as(frame: RawFrame, link_type: LinkType) -> Self {
        let layers = decode(&frame.data, link_type);
        Self { frame, layers }
    }

    /// Decodes `frame` under the link-layer type it was captured with.
    pub fn decode(frame: RawFrame) -> Self {
        let link_type = frame.link_type;
        Self::decode_as(frame, link_type)
    }

    pub fn frame(&self) -> &RawFrame { &self.frame }
    pub fn data(&self) -> &[u8] { &self.frame.data }
    pub fn layers(&self) -> &[Layer] { &self.layers }

    pub fn layer(&self, layer_type: LayerType) -> Option<&Layer> {
        self.layers.iter().find(|l| l.layer_type() == layer_type)
    }

    pub fn ipv4(&self) -> Option<&Ipv4Header> {
        self.layers.iter().find_map(|l| match l {
            Layer::Ipv4(h) => Some(h),
            _ => None,
        })
    }

    pub fn tcp(&self) -> Option<&TcpHeader> {
        self.layers.iter().find_map(|l| match l {
            Layer::Tcp(h) => Some(h),
            _ => None,
        })
    }

    pub fn udp(&self) -> Option<&UdpHeader> {
        self.layers.iter().find_map(|l| match l {
            Layer::Udp(h) => Some(h),
            _ => None,
        })
    }
}


/// Decodes the layers of `bytes`, starting with the framing given by `link_type`.
pub fn decode(bytes: &[u8], link_type: LinkType) -> Vec<Layer> {
    let mut layers = Vec::with_capacity(4);
    let rest = match link_type {
        LinkType::Ethernet => decode_ethernet(bytes, &mut layers),
        LinkType::LinuxSll => match LinuxSllHeader::try_take(bytes) {
            Some((header, rest)) => {
                layers.push(Layer::LinuxSll(header));
                decode_ethertype(header.protocol, rest, &mut layers)
            },
            None => bytes,
        },
        LinkType::Null => match LoopbackHeader::try_take(bytes) {
            Some((header, rest)) => {
                layers.push(Layer::Loopback(header));
                if header.family == LOOPBACK_FAMILY_INET {
                    decode_ipv4(rest, &mut layers)
                } else if LOOPBACK_FAMILY_INET6.contains(&header.family) {
                    decode_ipv6(rest, &mut layers)
                } else {
                    rest
                }
            },
            None => bytes,
        },
        LinkType::Raw => match bytes.first().map(|b| b >> 4) {
            Some(4) => decode_ipv4(bytes, &mut layers),
            Some(6) => decode_ipv6(bytes, &mut layers),
            _ => bytes,
        },
        LinkType::Other(dlt) => {
            debug!("no decoder for link type {}", dlt);
            return layers;
        },
    };

    if layers.is_empty() {
        debug!("frame of {} bytes did not decode as {}", bytes.len(), link_type);
    } else if !rest.is_empty() {
        layers.push(Layer::Payload(rest.len()));
    }
    layers
}

fn decode_ethernet<'a>(bytes: &'a [u8], layers: &mut Vec<Layer>) -> &'a [u8] {
    let (header, mut rest) = match EthernetHeader::try_take(bytes) {
        Some(hr) => hr,
        None => return bytes,
    };
    layers.push(Layer::Ethernet(header));
    if header.is_length_field() {
        return rest;
    }

    let mut ethertype = header.ethertype;
    let mut tags = 0;
    while ethertype == ETHERTYPE_VLAN_TAG && tags < MAX_VLAN_TAGS {
        let (tag, after) = match VlanTagHeader::try_take(rest) {
            Some(tr) => tr,
            None => return rest,
        };
        layers.push(Layer::Dot1Q(tag));
        ethertype = tag.ethertype;
        rest = after;
        tags += 1;
    }
    decode_ethertype(ethertype, rest, layers)
}

fn decode_ethertype<'a>(ethertype: u16, bytes: &'a [u8], layers: &mut Vec<Layer>) -> &'a [u8] {
    match ethertype {
        ETHERTYPE_IPV4 => decode_ipv4(bytes, layers),
        ETHERTYPE_IPV6 => decode_ipv6(bytes, layers),
        _ => bytes,
    }
}

fn decode_ipv4<'a>(bytes: &'a [u8], layers: &mut Vec<Layer>) -> &'a [u8] {
    let (header, rest) = match Ipv4Header::try_take(bytes) {
        PacketDissection::Success { header, rest } => (header, rest),
        other => {
            debug!("IPv4 header not decoded: {:?}", other);
            return bytes;
        },
    };
    layers.push(Layer::Ipv4(header));
    if header.more_fragments() || header.fragment_offset() != 0 {
        debug!(
            identification = header.identification,
            offset = header.fragment_offset() * 8,
            more = header.more_fragments(),
            "IPv4 fragment"
        );
    }
    if header.fragment_offset() != 0 {
        // only the first fragment carries the transport header
        return rest;
    }
    let pseudo_header = header.pseudo_header(rest.len());
    decode_transport(header.transport_protocol(), &pseudo_header, rest, layers)
}

fn decode_ipv6<'a>(bytes: &'a [u8], layers: &mut Vec<Layer>) -> &'a [u8] {
    let (header, rest) = match Ipv6Header::try_take(bytes) {
        PacketDissection::Success { header, rest } => (header, rest),
        other => {
            debug!("IPv6 header not decoded: {:?}", other);
            return bytes;
        },
    };
    layers.push(Layer::Ipv6(header));
    let pseudo_header = header.pseudo_header(rest.len());
    decode_transport(header.transport_protocol(), &pseudo_header, rest, layers)
}

fn decode_transport<'a>(
    protocol: Option<IpProtocol>,
    pseudo_header: &[u8],
    bytes: &'a [u8],
    layers: &mut Vec<Layer>,
) -> &'a [u8] {
    match protocol {
        Some(IpProtocol::Tcp) => match TcpHeader::try_take(bytes, pseudo_header) {
            PacketDissection::Success { header, rest } => {
                layers.push(Layer::Tcp(header));
                rest
            },
            other => {
                debug!("TCP header not decoded: {:?}", other);
                bytes
            },
        },
        Some(IpProtocol::Udp) => match UdpHeader::try_take(bytes, pseudo_header) {
            PacketDissection::Success { header, rest } => {
                layers.push(Layer::Udp(header));
                rest
            },
            other => {
                debug!("UDP header not decoded: {:?}", other);
                bytes
            },
        },
        _ => bytes,
    }
}
