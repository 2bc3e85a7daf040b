use std::net::{Ipv4Addr, Ipv6Addr};

use from_to_repr::FromToRepr;

use crate::bytes::TryFromBytes;
use crate::packet::PacketDissection;


/// One's-complement sum of a byte stream taken as big-endian 16-bit words (RFC1071).
///
/// The result is not inverted: a region that includes a correct checksum sums to 0xFFFF.
pub fn internet_checksum<I: IntoIterator<Item = u8>>(bytes: I) -> u16 {
    let mut sum: u32 = 0;
    let mut iter = bytes.into_iter();
    while let Some(high) = iter.next() {
        let low = iter.next().unwrap_or(0);
        sum += u32::from(u16::from_be_bytes([high, low]));
    }
    while sum > 0xFFFF {
        sum = (sum & 0xFFFF) + (sum >> 16);
    }
    sum as u16
}


// managed by IANA: https://www.iana.org/assignments/protocol-numbers/protocol-numbers.xhtml
#[derive(Clone, Copy, Debug, Eq, FromToRepr, Hash, Ord, PartialEq, PartialOrd)]
#[repr(u8)]
pub enum IpProtocol {
    Icmp = 1,
    Tcp = 6,
    Udp = 17,
    Icmpv6 = 58,
}


#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
// as defined in RFC791 section 3.1
pub struct Ipv4Header {
    pub version: u8,
    // header length is implicit (how many elements of at the beginning of self.options are Some(_)?)
    // length is stored as the number of 32-bit words!
    pub type_of_service: u8,
    pub total_length: u16,
    pub identification: u16,
    pub flags_and_fragment_offset: u16,
    pub time_to_live: u8,
    pub protocol: u8,
    pub header_checksum: u16,
    pub header_checksum_valid: bool,
    pub source_address: Ipv4Addr,
    pub destination_address: Ipv4Addr,
    pub options: [Option<[u8; 4]>; 10], // up to 10 words of 32 bits each
}
impl Default for Ipv4Header {
    fn default() -> Self {
        Self {
            version: Default::default(),
            type_of_service: Default::default(),
            total_length: Default::default(),
            identification: Default::default(),
            flags_and_fragment_offset: Default::default(),
            time_to_live: Default::default(),
            protocol: Default::default(),
            header_checksum: Default::default(),
            header_checksum_valid: Default::default(),
            source_address: Ipv4Addr::UNSPECIFIED,
            destination_address: Ipv4Addr::UNSPECIFIED,
            options: Default::default(),
        }
    }
}
impl Ipv4Header {
    pub fn try_take(bytes: &[u8]) -> PacketDissection<'_, Self> {
        if bytes.len() < 20 {
            return PacketDissection::TooShort;
        }

        let version = bytes[0] >> 4;
        if version != 4 {
            return PacketDissection::WrongType;
        }
        let header_length = usize::from(bytes[0] & 0b0000_1111) * 4;
        if header_length < 20 || bytes.len() < header_length {
            return PacketDissection::TooShort;
        }

        let total_length = match u16::try_from_bytes_at(bytes, 2) {
            Some(tl) => tl,
            None => return PacketDissection::TooShort,
        };
        // a zero total length shows up on segmentation-offloaded outbound packets
        let end = if total_length == 0 {
            bytes.len()
        } else if usize::from(total_length) < header_length {
            return PacketDissection::TooShort;
        } else {
            usize::from(total_length).min(bytes.len())
        };

        let identification = u16::try_from_bytes_at(bytes, 4).unwrap_or_default();
        let flags_and_fragment_offset = u16::try_from_bytes_at(bytes, 6).unwrap_or_default();
        let header_checksum = u16::try_from_bytes_at(bytes, 10).unwrap_or_default();
        let source_address = Ipv4Addr::try_from_bytes_at(bytes, 12).unwrap_or(Ipv4Addr::UNSPECIFIED);
        let destination_address = Ipv4Addr::try_from_bytes_at(bytes, 16).unwrap_or(Ipv4Addr::UNSPECIFIED);
        let header_checksum_valid = internet_checksum(bytes[..header_length].iter().copied()) == 0xFFFF;

        let mut options = [None; 10];
        for (i, word) in bytes[20..header_length].chunks_exact(4).enumerate() {
            options[i] = word.try_into().ok();
        }

        let header = Self {
            version,
            type_of_service: bytes[1],
            total_length,
            identification,
            flags_and_fragment_offset,
            time_to_live: bytes[8],
            protocol: bytes[9],
            header_checksum,
            header_checksum_valid,
            source_address,
            destination_address,
            options,
        };
        PacketDissection::Success { header, rest: &bytes[header_length..end] }
    }

    pub fn fragment_offset(&self) -> u16 {
        self.flags_and_fragment_offset & 0b0001_1111_1111_1111
    }

    pub fn more_fragments(&self) -> bool {
        (self.flags_and_fragment_offset & 0b0010_0000_0000_0000) != 0
    }

    pub fn transport_protocol(&self) -> Option<IpProtocol> {
        IpProtocol::try_from(self.protocol).ok()
    }

    /// Pseudo-header prepended to TCP/UDP data for checksumming (RFC9293 section 3.1).
    pub fn pseudo_header(&self, upper_layer_length: usize) -> Vec<u8> {
        let mut ph = Vec::with_capacity(12);
        ph.extend_from_slice(&self.source_address.octets());
        ph.extend_from_slice(&self.destination_address.octets());
        ph.push(0);
        ph.push(self.protocol);
        ph.extend_from_slice(&(upper_layer_length as u16).to_be_bytes());
        ph
    }
}


#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
// as defined in RFC8200 section 3
pub struct Ipv6Header {
    pub version: u8,
    pub traffic_class: u8,
    pub flow_label: u32,
    pub payload_length: u16, // in bytes
    pub next_header: u8, // comparable with protocol
    pub hop_limit: u8, // comparable with time_to_live
    pub source_address: Ipv6Addr,
    pub destination_address: Ipv6Addr,
}
impl Default for Ipv6Header {
    fn default() -> Self {
        Self {
            version: Default::default(),
            traffic_class: Default::default(),
            flow_label: Default::default(),
            payload_length: Default::default(),
            next_header: Default::default(),
            hop_limit: Default::default(),
            source_address: Ipv6Addr::UNSPECIFIED,
            destination_address: Ipv6Addr::UNSPECIFIED,
        }
    }
}
impl Ipv6Header {
    pub fn try_take(bytes: &[u8]) -> PacketDissection<'_, Self> {
        if bytes.len() < 40 {
            return PacketDissection::TooShort;
        }

        let first_word = match u32::try_from_bytes(bytes) {
            Some(w) => w,
            None => return PacketDissection::TooShort,
        };
        let version = (first_word >> 28) as u8;
        if version != 6 {
            return PacketDissection::WrongType;
        }
        let traffic_class = ((first_word >> 20) & 0xFF) as u8;
        let flow_label = first_word & 0x000F_FFFF;

        let payload_length = u16::try_from_bytes_at(bytes, 4).unwrap_or_default();
        let source_address = Ipv6Addr::try_from_bytes_at(bytes, 8).unwrap_or(Ipv6Addr::UNSPECIFIED);
        let destination_address = Ipv6Addr::try_from_bytes_at(bytes, 24).unwrap_or(Ipv6Addr::UNSPECIFIED);

        // zero payload length means a jumbogram (or offload); take what was captured
        let end = if payload_length == 0 {
            bytes.len()
        } else {
            (40 + usize::from(payload_length)).min(bytes.len())
        };

        let header = Self {
            version,
            traffic_class,
            flow_label,
            payload_length,
            next_header: bytes[6],
            hop_limit: bytes[7],
            source_address,
            destination_address,
        };
        PacketDissection::Success { header, rest: &bytes[40..end] }
    }

    pub fn transport_protocol(&self) -> Option<IpProtocol> {
        IpProtocol::try_from(self.next_header).ok()
    }

    /// Pseudo-header prepended to TCP/UDP data for checksumming (RFC8200 section 8.1).
    pub fn pseudo_header(&self, upper_layer_length: usize) -> Vec<u8> {
        let mut ph = Vec::with_capacity(40);
        ph.extend_from_slice(&self.source_address.octets());
        ph.extend_from_slice(&self.destination_address.octets());
        ph.extend_from_slice(&(upper_layer_length as u32).to_be_bytes());
        ph.extend_from_slice(&[0, 0, 0, self.next_header]);
        ph
    }
}
