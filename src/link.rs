use std::fmt;

use crate::bytes::TryFromBytes;


/// Link-layer framing of a capture handle, as reported by libpcap (`DLT_*` values).
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum LinkType {
    /// BSD loopback encapsulation (DLT_NULL)
    Null,
    Ethernet,
    /// bare IPv4/IPv6 without link header (DLT_RAW)
    Raw,
    /// Linux cooked capture, produced by the "any" pseudo-device (DLT_LINUX_SLL)
    LinuxSll,
    Other(i32),
}
impl LinkType {
    pub fn dlt(&self) -> i32 {
        match self {
            Self::Null => 0,
            Self::Ethernet => 1,
            Self::Raw => 101,
            Self::LinuxSll => 113,
            Self::Other(dlt) => *dlt,
        }
    }
}
impl From<i32> for LinkType {
    fn from(dlt: i32) -> Self {
        match dlt {
            0 => Self::Null,
            1 => Self::Ethernet,
            // OpenBSD uses 14 for DLT_RAW
            12 | 14 | 101 => Self::Raw,
            113 => Self::LinuxSll,
            other => Self::Other(other),
        }
    }
}
impl From<pcap::Linktype> for LinkType {
    fn from(linktype: pcap::Linktype) -> Self {
        Self::from(linktype.0)
    }
}
impl fmt::Display for LinkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "NULL"),
            Self::Ethernet => write!(f, "EN10MB"),
            Self::Raw => write!(f, "RAW"),
            Self::LinuxSll => write!(f, "LINUX_SLL"),
            Self::Other(dlt) => write!(f, "DLT {}", dlt),
        }
    }
}


#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
// see https://www.tcpdump.org/linktypes/LINKTYPE_LINUX_SLL.html
pub struct LinuxSllHeader {
    pub packet_type: u16,
    pub arphrd_type: u16,
    pub address_length: u16,
    pub address: [u8; 8],
    pub protocol: u16,
}
impl LinuxSllHeader {
    pub fn try_take(bytes: &[u8]) -> Option<(Self, &[u8])> {
        if bytes.len() < 16 {
            return None;
        }
        let packet_type = u16::try_from_bytes_at(bytes, 0)?;
        let arphrd_type = u16::try_from_bytes_at(bytes, 2)?;
        let address_length = u16::try_from_bytes_at(bytes, 4)?;
        let address: [u8; 8] = bytes[6..14].try_into().ok()?;
        let protocol = u16::try_from_bytes_at(bytes, 14)?;
        let header = Self {
            packet_type,
            arphrd_type,
            address_length,
            address,
            protocol,
        };
        Some((header, &bytes[16..]))
    }
}


// address family values as they appear in DLT_NULL headers across platforms
pub const LOOPBACK_FAMILY_INET: u32 = 2;
pub const LOOPBACK_FAMILY_INET6: [u32; 4] = [10, 24, 28, 30];


#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct LoopbackHeader {
    pub family: u32,
}
impl LoopbackHeader {
    pub fn try_take(bytes: &[u8]) -> Option<(Self, &[u8])> {
        let bs: [u8; 4] = bytes.get(0..4)?.try_into().ok()?;
        // the family is written in the byte order of the capturing host
        let family = if bs[0] == 0 && bs[1] == 0 {
            u32::from_be_bytes(bs)
        } else {
            u32::from_le_bytes(bs)
        };
        Some((Self { family }, &bytes[4..]))
    }
}
