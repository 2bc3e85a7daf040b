//! In-memory capture engine and frame builders for tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;

use crate::engine::{CaptureBackend, FrameRead};
use crate::error::CaptureError;
use crate::ip::internet_checksum;
use crate::link::LinkType;
use crate::packet::RawFrame;


pub struct ScriptedBackend {
    frames: VecDeque<Vec<u8>>,
    repeat: Option<Vec<u8>>,
    link_type: LinkType,
    idle_reads: usize,
    read_delay: Duration,
    stall: Option<Receiver<()>>,
    rejected: Option<String>,
    filters: Arc<Mutex<Vec<String>>>,
    reads: Arc<AtomicUsize>,
    drops: Arc<AtomicUsize>,
}
impl ScriptedBackend {
    /// Delivers `frames` in order, then reports exhaustion.
    pub fn new(frames: Vec<Vec<u8>>) -> Self {
        Self {
            frames: frames.into(),
            repeat: None,
            link_type: LinkType::Ethernet,
            idle_reads: 0,
            read_delay: Duration::ZERO,
            stall: None,
            rejected: None,
            filters: Arc::new(Mutex::new(Vec::new())),
            reads: Arc::new(AtomicUsize::new(0)),
            drops: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Delivers `frame` forever.
    pub fn endless(frame: Vec<u8>) -> Self {
        let mut backend = Self::new(Vec::new());
        backend.repeat = Some(frame);
        backend
    }

    /// A quiet interface under a non-blocking engine: every read comes back `Idle` at once.
    pub fn silent() -> Self {
        Self::new(Vec::new()).with_idle_reads(usize::MAX)
    }

    /// Delivers `frame` forever, but every read blocks inside the engine until
    /// the returned sender signals or is dropped.
    pub fn stalled(frame: Vec<u8>) -> (Self, Sender<()>) {
        let (release, gate) = mpsc::channel();
        let mut backend = Self::endless(frame);
        backend.stall = Some(gate);
        (backend, release)
    }

    pub fn with_link_type(mut self, link_type: LinkType) -> Self {
        self.link_type = link_type;
        self
    }

    /// Reports `Idle` this many times before the first frame.
    pub fn with_idle_reads(mut self, count: usize) -> Self {
        self.idle_reads = count;
        self
    }

    pub fn with_read_delay(mut self, delay: Duration) -> Self {
        self.read_delay = delay;
        self
    }

    /// Filter expressions containing `word` fail to compile.
    pub fn rejecting(mut self, word: &str) -> Self {
        self.rejected = Some(word.to_owned());
        self
    }

    pub fn filters(&self) -> Arc<Mutex<Vec<String>>> { Arc::clone(&self.filters) }
    pub fn read_counter(&self) -> Arc<AtomicUsize> { Arc::clone(&self.reads) }
    pub fn drop_counter(&self) -> Arc<AtomicUsize> { Arc::clone(&self.drops) }
}
impl CaptureBackend for ScriptedBackend {
    fn set_filter(&mut self, expression: &str) -> Result<(), CaptureError> {
        if let Some(word) = &self.rejected {
            if expression.contains(word.as_str()) {
                return Err(CaptureError::Filter {
                    expression: expression.to_owned(),
                    reason: format!("syntax error near {:?}", word),
                });
            }
        }
        self.filters.lock().push(expression.to_owned());
        Ok(())
    }

    fn link_type(&self) -> LinkType {
        self.link_type
    }

    fn read_frame(&mut self) -> FrameRead {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if !self.read_delay.is_zero() {
            thread::sleep(self.read_delay);
        }
        if let Some(gate) = &self.stall {
            let _ = gate.recv();
        }
        if self.idle_reads > 0 {
            self.idle_reads -= 1;
            return FrameRead::Idle;
        }
        match self.frames.pop_front().or_else(|| self.repeat.clone()) {
            Some(data) => FrameRead::Frame(RawFrame::new(data, self.link_type)),
            None => FrameRead::Exhausted,
        }
    }
}
impl Drop for ScriptedBackend {
    fn drop(&mut self) {
        self.drops.fetch_add(1, Ordering::SeqCst);
    }
}


pub fn ethernet_frame(ethertype: u16, payload: &[u8]) -> Vec<u8> {
    let mut frame = vec![
        0x02, 0x00, 0x00, 0x00, 0x00, 0x02,
        0x02, 0x00, 0x00, 0x00, 0x00, 0x01,
    ];
    frame.extend_from_slice(&ethertype.to_be_bytes());
    frame.extend_from_slice(payload);
    frame
}

fn ipv4_packet(source: [u8; 4], destination: [u8; 4], protocol: u8, transport: &[u8]) -> Vec<u8> {
    let total_length = (20 + transport.len()) as u16;
    let mut ip = vec![0x45, 0x00];
    ip.extend_from_slice(&total_length.to_be_bytes());
    ip.extend_from_slice(&[0x00, 0x01, 0x40, 0x00, 64, protocol, 0x00, 0x00]);
    ip.extend_from_slice(&source);
    ip.extend_from_slice(&destination);
    let checksum = !internet_checksum(ip.iter().copied());
    ip[10..12].copy_from_slice(&checksum.to_be_bytes());
    ip.extend_from_slice(transport);
    ip
}

fn transport_checksum(source: [u8; 4], destination: [u8; 4], protocol: u8, segment: &[u8]) -> u16 {
    let mut pseudo_header = Vec::with_capacity(12);
    pseudo_header.extend_from_slice(&source);
    pseudo_header.extend_from_slice(&destination);
    pseudo_header.extend_from_slice(&[0, protocol]);
    pseudo_header.extend_from_slice(&(segment.len() as u16).to_be_bytes());
    !internet_checksum(pseudo_header.into_iter().chain(segment.iter().copied()))
}

pub fn ipv4_udp(source: [u8; 4], destination: [u8; 4], source_port: u16, destination_port: u16, data: &[u8]) -> Vec<u8> {
    let mut udp = Vec::with_capacity(8 + data.len());
    udp.extend_from_slice(&source_port.to_be_bytes());
    udp.extend_from_slice(&destination_port.to_be_bytes());
    udp.extend_from_slice(&((8 + data.len()) as u16).to_be_bytes());
    udp.extend_from_slice(&[0, 0]);
    udp.extend_from_slice(data);
    let checksum = match transport_checksum(source, destination, 17, &udp) {
        0 => 0xFFFF,
        c => c,
    };
    udp[6..8].copy_from_slice(&checksum.to_be_bytes());
    ipv4_packet(source, destination, 17, &udp)
}

pub fn ipv4_tcp(source: [u8; 4], destination: [u8; 4], source_port: u16, destination_port: u16, data: &[u8]) -> Vec<u8> {
    let mut tcp = Vec::with_capacity(20 + data.len());
    tcp.extend_from_slice(&source_port.to_be_bytes());
    tcp.extend_from_slice(&destination_port.to_be_bytes());
    tcp.extend_from_slice(&[0, 0, 0x10, 0x00, 0, 0, 0, 0]);
    tcp.extend_from_slice(&[0x50, 0x18, 0xFF, 0xFF, 0, 0, 0, 0]);
    tcp.extend_from_slice(data);
    let checksum = transport_checksum(source, destination, 6, &tcp);
    tcp[16..18].copy_from_slice(&checksum.to_be_bytes());
    ipv4_packet(source, destination, 6, &tcp)
}
