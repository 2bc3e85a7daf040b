use std::net::{Ipv4Addr, Ipv6Addr};

use macaddr::MacAddr6;


/// Decodes a value from the start of a byte slice (network byte order).
///
/// Returns `None` if the slice is too short; trailing bytes are ignored.
pub trait TryFromBytes : Sized {
    fn try_from_bytes(bytes: &[u8]) -> Option<Self>;

    fn try_from_bytes_at(bytes: &[u8], offset: usize) -> Option<Self> {
        Self::try_from_bytes(bytes.get(offset..)?)
    }
}

impl TryFromBytes for u16 {
    fn try_from_bytes(bytes: &[u8]) -> Option<Self> {
        let bs: [u8; 2] = bytes.get(0..2)?.try_into().ok()?;
        Some(Self::from_be_bytes(bs))
    }
}

impl TryFromBytes for u32 {
    fn try_from_bytes(bytes: &[u8]) -> Option<Self> {
        let bs: [u8; 4] = bytes.get(0..4)?.try_into().ok()?;
        Some(Self::from_be_bytes(bs))
    }
}

impl TryFromBytes for Ipv4Addr {
    fn try_from_bytes(bytes: &[u8]) -> Option<Self> {
        let bs: [u8; 4] = bytes.get(0..4)?.try_into().ok()?;
        Some(Self::from(bs))
    }
}

impl TryFromBytes for Ipv6Addr {
    fn try_from_bytes(bytes: &[u8]) -> Option<Self> {
        let bs: [u8; 16] = bytes.get(0..16)?.try_into().ok()?;
        Some(Self::from(bs))
    }
}

impl TryFromBytes for MacAddr6 {
    fn try_from_bytes(bytes: &[u8]) -> Option<Self> {
        let bs: [u8; 6] = bytes.get(0..6)?.try_into().ok()?;
        Some(Self::from(bs))
    }
}
