use from_to_repr::FromToRepr;
use macaddr::MacAddr6;

use crate::bytes::TryFromBytes;


#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
// Ethernet II framing; the FCS is not part of captured frames
pub struct EthernetHeader {
    pub destination: MacAddr6,
    pub source: MacAddr6,
    pub ethertype: u16,
}
impl EthernetHeader {
    pub fn try_take(bytes: &[u8]) -> Option<(Self, &[u8])> {
        if bytes.len() < 14 {
            return None;
        }
        let destination = MacAddr6::try_from_bytes_at(bytes, 0)?;
        let source = MacAddr6::try_from_bytes_at(bytes, 6)?;
        let ethertype = u16::try_from_bytes_at(bytes, 12)?;
        let header = Self {
            destination,
            source,
            ethertype,
        };
        Some((header, &bytes[14..]))
    }

    /// Values below 0x0600 are an 802.3 length field, not an EtherType.
    pub fn is_length_field(&self) -> bool {
        self.ethertype < ETHERTYPE_MIN
    }
}

// managed by IEEE: https://regauth.standards.ieee.org/standards-ra-web/pub/view.html ("Ethertype")
pub const ETHERTYPE_MIN: u16 = 0x0600;
pub const ETHERTYPE_IPV4: u16 = 0x0800;
pub const ETHERTYPE_VLAN_TAG: u16 = 0x8100;
pub const ETHERTYPE_IPV6: u16 = 0x86DD;


#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct VlanTagHeader {
    pub priority_code_point: PriorityCodePoint,
    pub drop_eligible_indicator: bool,
    pub vlan_id: u16,
    pub ethertype: u16,
}
impl VlanTagHeader {
    pub fn try_take(bytes: &[u8]) -> Option<(Self, &[u8])> {
        let tci = u16::try_from_bytes_at(bytes, 0)?;
        let ethertype = u16::try_from_bytes_at(bytes, 2)?;

        let priority_code_point = ((tci & 0b1110_0000_0000_0000) >> 13)
            .try_into()
            .unwrap_or_default();
        let drop_eligible_indicator = (tci & 0b0001_0000_0000_0000) != 0;
        let vlan_id = tci & 0b0000_1111_1111_1111;

        let header = Self {
            priority_code_point,
            drop_eligible_indicator,
            vlan_id,
            ethertype,
        };
        Some((header, &bytes[4..]))
    }
}


#[derive(Clone, Copy, Debug, Eq, FromToRepr, Hash, Ord, PartialEq, PartialOrd)]
#[repr(u16)]
pub enum PriorityCodePoint {
    BestEffort = 0b000,
    Background = 0b001,
    ExcellentEffort = 0b010,
    CriticalApplication = 0b011,
    Video = 0b100,
    Voice = 0b101,
    InternetworkControl = 0b110,
    NetworkControl = 0b111,
}
impl Default for PriorityCodePoint {
    fn default() -> Self { Self::BestEffort }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vlan_tag_consumes_four_bytes() {
        // PCP 5, DEI set, VLAN 42, inner IPv4
        let bytes = [0b1011_0000, 42, 0x08, 0x00, 0x45, 0x00];
        let (tag, rest) = VlanTagHeader::try_take(&bytes).unwrap();
        assert_eq!(tag.priority_code_point, PriorityCodePoint::Voice);
        assert!(tag.drop_eligible_indicator);
        assert_eq!(tag.vlan_id, 42);
        assert_eq!(tag.ethertype, ETHERTYPE_IPV4);
        assert_eq!(rest, &[0x45, 0x00]);
    }

    #[test]
    fn short_ethernet_header() {
        assert!(EthernetHeader::try_take(&[0u8; 13]).is_none());
        let mut bytes = [0u8; 14];
        bytes[12] = 0x00;
        bytes[13] = 0x2E;
        let (header, rest) = EthernetHeader::try_take(&bytes).unwrap();
        assert!(header.is_length_field());
        assert!(rest.is_empty());
    }
}
