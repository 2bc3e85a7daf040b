use bitflags::bitflags;

use crate::bytes::TryFromBytes;
use crate::ip::internet_checksum;
use crate::packet::PacketDissection;


fn checksum_verifies(pseudo_header: &[u8], segment: &[u8]) -> bool {
    let full_checksum = internet_checksum(
        pseudo_header.iter().copied()
            .chain(segment.iter().copied())
    );
    full_checksum == 0xFFFF
}


#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
// as defined in RFC9293 section 3.1
pub struct TcpHeader {
    pub source_port: u16,
    pub destination_port: u16,
    pub sequence_number: u32,
    pub acknowledgement_number: u32,
    // data offset is implicit (how many elements of at the beginning of self.options are Some(_)?)
    // offset is stored as the number of 32-bit words!
    pub flags: TcpFlags,
    pub window: u16,
    pub checksum: u16,
    /// false when the checksum does not verify; offloading NICs leave outbound checksums unset
    pub checksum_valid: bool,
    pub urgent_pointer: u16,
    pub options: [Option<[u8; 4]>; 10], // up to 10 words of 32 bits each
}
impl TcpHeader {
    /// `pseudo_header` comes from the enclosing IP layer and is only used to verify the checksum.
    pub fn try_take<'b, 'h>(bytes: &'b [u8], pseudo_header: &'h [u8]) -> PacketDissection<'b, Self> {
        if bytes.len() < 20 {
            return PacketDissection::TooShort;
        }

        let data_offset_w32 = (bytes[12] & 0b1111_0000) >> 4;
        let data_offset_bytes = usize::from(data_offset_w32) * 4;
        if data_offset_bytes < 20 {
            return PacketDissection::TooShort;
        }
        if bytes.len() < data_offset_bytes {
            return PacketDissection::TooShort;
        }

        let source_port = u16::try_from_bytes_at(bytes, 0).unwrap_or_default();
        let destination_port = u16::try_from_bytes_at(bytes, 2).unwrap_or_default();
        let sequence_number = u32::try_from_bytes_at(bytes, 4).unwrap_or_default();
        let acknowledgement_number = u32::try_from_bytes_at(bytes, 8).unwrap_or_default();
        let flags = TcpFlags::from_bits_truncate(bytes[13]);
        let window = u16::try_from_bytes_at(bytes, 14).unwrap_or_default();
        let checksum = u16::try_from_bytes_at(bytes, 16).unwrap_or_default();
        let urgent_pointer = u16::try_from_bytes_at(bytes, 18).unwrap_or_default();

        let mut options = [None; 10];
        for (i, word) in bytes[20..data_offset_bytes].chunks_exact(4).enumerate() {
            options[i] = word.try_into().ok();
        }

        let header = Self {
            source_port,
            destination_port,
            sequence_number,
            acknowledgement_number,
            flags,
            window,
            checksum,
            checksum_valid: checksum_verifies(pseudo_header, bytes),
            urgent_pointer,
            options,
        };
        PacketDissection::Success { header, rest: &bytes[data_offset_bytes..] }
    }
}


bitflags! {
    #[derive(Default)]
    // managed by IANA: https://www.iana.org/assignments/tcp-parameters/tcp-parameters.xhtml (section "TCP Header Flags")
    pub struct TcpFlags: u8 {
        const FIN = 0b0000_0001;
        const SYN = 0b0000_0010;
        const RST = 0b0000_0100;
        const PSH = 0b0000_1000;
        const ACK = 0b0001_0000;
        const URG = 0b0010_0000;
        const ECE = 0b0100_0000;
        const CWR = 0b1000_0000;
    }
}


#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
// as defined in RFC768, "Format" section
pub struct UdpHeader {
    pub source_port: u16,
    pub destination_port: u16,
    pub length: u16,
    pub checksum: u16,
    /// a zero checksum (not computed by the sender) counts as valid
    pub checksum_valid: bool,
}
impl UdpHeader {
    pub fn try_take<'b, 'h>(bytes: &'b [u8], pseudo_header: &'h [u8]) -> PacketDissection<'b, Self> {
        if bytes.len() < 8 {
            return PacketDissection::TooShort;
        }

        let source_port = u16::try_from_bytes_at(bytes, 0).unwrap_or_default();
        let destination_port = u16::try_from_bytes_at(bytes, 2).unwrap_or_default();
        let length = u16::try_from_bytes_at(bytes, 4).unwrap_or_default();
        let checksum = u16::try_from_bytes_at(bytes, 6).unwrap_or_default();

        // the length field covers header and data; anything past it is padding
        let end = if usize::from(length) >= 8 {
            usize::from(length).min(bytes.len())
        } else {
            bytes.len()
        };
        let checksum_valid = checksum == 0 || checksum_verifies(pseudo_header, &bytes[..end]);

        let header = Self {
            source_port,
            destination_port,
            length,
            checksum,
            checksum_valid,
        };
        PacketDissection::Success { header, rest: &bytes[8..end] }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tcp_syn_with_options() {
        let mut bytes = vec![
            0x01, 0xBB, 0xC0, 0x01, // ports 443 -> 49153
            0, 0, 0, 1, 0, 0, 0, 0,
            0x60, 0x02, 0xFF, 0xFF, // offset 6 words, SYN
            0, 0, 0, 0,
        ];
        bytes.extend_from_slice(&[0x02, 0x04, 0x05, 0xB4]); // MSS option
        bytes.extend_from_slice(b"data");
        let (header, rest) = match TcpHeader::try_take(&bytes, &[]) {
            PacketDissection::Success { header, rest } => (header, rest),
            other => panic!("unexpected dissection {:?}", other),
        };
        assert_eq!(header.source_port, 443);
        assert_eq!(header.destination_port, 49153);
        assert_eq!(header.flags, TcpFlags::SYN);
        assert_eq!(header.options[0], Some([0x02, 0x04, 0x05, 0xB4]));
        assert_eq!(header.options[1], None);
        assert!(!header.checksum_valid);
        assert_eq!(rest, b"data");
    }

    #[test]
    fn tcp_offset_beyond_data() {
        let mut bytes = [0u8; 20];
        bytes[12] = 0xF0;
        assert!(matches!(TcpHeader::try_take(&bytes, &[]), PacketDissection::TooShort));
        bytes[12] = 0x40;
        assert!(matches!(TcpHeader::try_take(&bytes, &[]), PacketDissection::TooShort));
    }

    #[test]
    fn udp_trims_to_length_field() {
        let bytes = [0x14, 0xE9, 0x14, 0xE9, 0x00, 0x0A, 0x00, 0x00, 0xAB, 0xCD, 0x00, 0x00];
        let (header, rest) = match UdpHeader::try_take(&bytes, &[]) {
            PacketDissection::Success { header, rest } => (header, rest),
            other => panic!("unexpected dissection {:?}", other),
        };
        assert_eq!(header.source_port, 5353);
        assert_eq!(header.destination_port, 5353);
        assert!(header.checksum_valid);
        assert_eq!(rest, &[0xAB, 0xCD]);
        assert!(matches!(UdpHeader::try_take(&bytes[..7], &[]), PacketDissection::TooShort));
    }
}
