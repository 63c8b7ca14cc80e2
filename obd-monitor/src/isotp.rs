//! ISO-TP (ISO 15765-2) multi-frame reassembly
//!
//! Reconstructs multi-frame responses (e.g. the VIN) from individual frames.
//! One in-progress message is tracked per responder address. A first frame
//! asks the caller to send a flow-control frame; consecutive frames must
//! arrive in sequence or the assembly is abandoned.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::codec::ids;
use crate::types::RawFrame;

/// Protocol control information frame types (high nibble of byte 0)
const PCI_SINGLE_FRAME: u8 = 0x0;
const PCI_FIRST_FRAME: u8 = 0x1;
const PCI_CONSECUTIVE_FRAME: u8 = 0x2;

/// Flow control: continue to send, no block size limit, no separation time
pub const FLOW_CONTROL_CONTINUE: [u8; 8] = [0x30, 0, 0, 0, 0, 0, 0, 0];

/// What the caller should do after feeding a frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IsoTpEvent {
    /// Nothing to do (single frame, unrelated frame, or assembly in progress)
    Pending,
    /// A first frame arrived; send [`FLOW_CONTROL_CONTINUE`] to `target`
    FlowControl { target: u32 },
    /// A complete payload was reassembled
    Complete { source: u32, payload: Vec<u8> },
}

struct Assembly {
    expected_len: usize,
    payload: Vec<u8>,
    next_sequence: u8,
    started: Instant,
}

/// Multi-frame reassembler for OBD-II responder addresses
pub struct IsoTpAssembler {
    timeout: Duration,
    assemblies: HashMap<u32, Assembly>,
}

impl IsoTpAssembler {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            assemblies: HashMap::new(),
        }
    }

    /// Number of messages currently being reassembled
    pub fn in_progress(&self) -> usize {
        self.assemblies.len()
    }

    /// Feed one frame
    pub fn push(&mut self, frame: &RawFrame) -> IsoTpEvent {
        self.push_at(frame, Instant::now())
    }

    fn push_at(&mut self, frame: &RawFrame, now: Instant) -> IsoTpEvent {
        self.expire(now);

        if !ids::is_obd_response_id(frame.id) || frame.is_rtr {
            return IsoTpEvent::Pending;
        }

        let data = frame.payload();
        let Some(&pci) = data.first() else {
            return IsoTpEvent::Pending;
        };

        match pci >> 4 {
            PCI_FIRST_FRAME if data.len() >= 2 => {
                let expected_len = (((pci & 0x0F) as usize) << 8) | data[1] as usize;
                let mut payload = Vec::with_capacity(expected_len);
                payload.extend_from_slice(&data[2..data.len().min(2 + expected_len)]);

                log::debug!(
                    "ISO-TP first frame from 0x{:X}: {} bytes expected",
                    frame.id,
                    expected_len
                );
                self.assemblies.insert(
                    frame.id,
                    Assembly {
                        expected_len,
                        payload,
                        next_sequence: 1,
                        started: now,
                    },
                );
                IsoTpEvent::FlowControl {
                    target: ids::flow_control_id(frame.id),
                }
            }
            PCI_CONSECUTIVE_FRAME => self.consecutive(frame.id, pci & 0x0F, &data[1..]),
            PCI_SINGLE_FRAME => IsoTpEvent::Pending,
            _ => IsoTpEvent::Pending,
        }
    }

    fn consecutive(&mut self, source: u32, sequence: u8, data: &[u8]) -> IsoTpEvent {
        let Some(assembly) = self.assemblies.get_mut(&source) else {
            return IsoTpEvent::Pending;
        };

        if sequence != assembly.next_sequence {
            log::debug!(
                "ISO-TP sequence error from 0x{:X}: expected {}, got {}",
                source,
                assembly.next_sequence,
                sequence
            );
            self.assemblies.remove(&source);
            return IsoTpEvent::Pending;
        }

        let remaining = assembly.expected_len - assembly.payload.len();
        assembly.payload.extend_from_slice(&data[..data.len().min(remaining)]);
        assembly.next_sequence = (assembly.next_sequence + 1) & 0x0F;

        if assembly.payload.len() < assembly.expected_len {
            return IsoTpEvent::Pending;
        }

        match self.assemblies.remove(&source) {
            Some(done) => IsoTpEvent::Complete {
                source,
                payload: done.payload,
            },
            None => IsoTpEvent::Pending,
        }
    }

    fn expire(&mut self, now: Instant) {
        let timeout = self.timeout;
        self.assemblies.retain(|source, assembly| {
            let alive = now.duration_since(assembly.started) < timeout;
            if !alive {
                log::debug!("ISO-TP assembly from 0x{:X} timed out", source);
            }
            alive
        });
    }
}
