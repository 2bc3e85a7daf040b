use std::fmt;
use std::net::Ipv4Addr;

use crate::decode::{DecodedPacket, Layer, LayerType};


/// Number of leading frame bytes shown in a summary.
pub const PREVIEW_LEN: usize = 50;


#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TransportSummary {
    Tcp { source_port: u16, destination_port: u16 },
    Udp { source_port: u16, destination_port: u16 },
}


/// What gets reported about one captured packet.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PacketSummary {
    pub sequence: u64,
    /// (source, destination)
    pub ipv4: Option<(Ipv4Addr, Ipv4Addr)>,
    pub transport: Option<TransportSummary>,
    /// every decoded layer with its position, bottom-up
    pub layers: Vec<(usize, LayerType)>,
    /// bytes recorded by the engine, independent of the preview
    pub capture_length: u32,
    pub preview: Vec<u8>,
}
impl PacketSummary {
    pub fn new(sequence: u64, packet: &DecodedPacket) -> Self {
        let ipv4 = packet.ipv4()
            .map(|ip| (ip.source_address, ip.destination_address));

        // at most one transport layer is reported: the first one decoded
        let transport = packet.layers().iter().find_map(|layer| match layer {
            Layer::Tcp(tcp) => Some(TransportSummary::Tcp {
                source_port: tcp.source_port,
                destination_port: tcp.destination_port,
            }),
            Layer::Udp(udp) => Some(TransportSummary::Udp {
                source_port: udp.source_port,
                destination_port: udp.destination_port,
            }),
            _ => None,
        });

        let layers = packet.layers().iter()
            .map(|l| l.layer_type())
            .enumerate()
            .collect();

        let data = packet.data();
        let preview = data[..data.len().min(PREVIEW_LEN)].to_vec();

        Self {
            sequence,
            ipv4,
            transport,
            layers,
            capture_length: packet.frame().capture_length,
            preview,
        }
    }
}
impl fmt::Display for PacketSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let n = self.sequence;
        if let Some((source, destination)) = self.ipv4 {
            writeln!(f, "{}: IP packet from src {} to dst {}", n, source, destination)?;
        }
        match self.transport {
            Some(TransportSummary::Udp { source_port, destination_port }) => {
                writeln!(f, "{}: UDP packet from src port {} to dst port {}", n, source_port, destination_port)?;
            },
            Some(TransportSummary::Tcp { source_port, destination_port }) => {
                writeln!(f, "{}: TCP packet from src port {} to dst port {}", n, source_port, destination_port)?;
            },
            None => {},
        }
        for (index, layer_type) in &self.layers {
            writeln!(f, "{}: PACKET LAYER {}: {}", n, index, layer_type)?;
        }

        write!(f, "{}: packet size {}, first bytes [", n, self.capture_length)?;
        for (i, b) in self.preview.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{}", b)?;
        }
        writeln!(f, "]")
    }
}
