//! Generic CAN types and traits

pub mod bitfield;

use std::collections::VecDeque;
use std::fmt;

use tracing::warn;

/// Maximum payload of a classic CAN frame
pub const MAX_DATA_LENGTH: usize = 8;

/// Identifier for a CAN frame
#[derive(Copy, Clone, PartialOrd, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Identifier {
    Standard(u32),
    Extended(u32),
}

impl Identifier {
    pub fn is_standard(&self) -> bool {
        match self {
            Identifier::Standard(_) => true,
            Identifier::Extended(_) => false,
        }
    }
    pub fn is_extended(&self) -> bool {
        !self.is_standard()
    }
}

impl fmt::Debug for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identifier::Extended(id) => write!(f, "0x{:08x}", id),
            Identifier::Standard(id) => write!(f, "0x{:03x}", id),
        }
    }
}

impl From<u32> for Identifier {
    fn from(id: u32) -> Identifier {
        if id <= 0x7ff {
            Identifier::Standard(id)
        } else {
            Identifier::Extended(id)
        }
    }
}

impl From<Identifier> for u32 {
    fn from(val: Identifier) -> u32 {
        match val {
            Identifier::Standard(id) => id,
            Identifier::Extended(id) => id,
        }
    }
}

/// A classic CAN frame
#[derive(Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Frame {
    /// The bus index for adapters supporting multiple CAN busses
    pub bus: u8,
    /// Arbitration ID
    pub id: Identifier,
    /// Frame Data, 0 to 8 bytes. The length is the frame length on the wire.
    pub data: Vec<u8>,
    /// Wheter the frame was sent out by the adapter
    pub loopback: bool,
}
impl Unpin for Frame {}

impl Frame {
    pub fn new(bus: u8, id: Identifier, data: &[u8]) -> Result<Frame, crate::error::Error> {
        if data.len() > MAX_DATA_LENGTH {
            return Err(crate::error::Error::MalformedFrame);
        }

        // Check if the ID makes sense
        match id {
            Identifier::Standard(id) if id > 0x7ff => return Err(crate::error::Error::MalformedFrame),
            Identifier::Extended(id) if id > 0x1fffffff => return Err(crate::error::Error::MalformedFrame),
            _ => {}
        };

        Ok(Frame {
            bus,
            id,
            data: data.to_vec(),
            loopback: false,
        })
    }

    /// Payload copied into a zero filled 8 byte buffer, as used by the bit field codec.
    pub fn payload(&self) -> [u8; 8] {
        let mut buf = [0u8; MAX_DATA_LENGTH];
        let len = self.data.len().min(MAX_DATA_LENGTH);
        buf[..len].copy_from_slice(&self.data[..len]);
        buf
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("bus", &self.bus)
            .field("id", &self.id)
            .field("data", &hex::encode(&self.data))
            .field("loopback", &self.loopback)
            .finish()
    }
}

/// Trait for a Blocking CAN Adapter
pub trait CanAdapter {
    /// Send frames from the front of the queue. Frames that could not be sent stay in the queue for the next call.
    fn send(&mut self, frames: &mut VecDeque<Frame>) -> Result<(), crate::error::Error>;
    fn recv(&mut self) -> Result<Vec<Frame>, crate::error::Error>;
}

/// A CAN bus as seen by the translator: its index on the adapter, the address reported in output messages, and the bounded queue of frames waiting to be sent.
#[derive(Debug, Clone)]
pub struct CanBus {
    /// Bus index, matches [`Frame::bus`]
    pub index: u8,
    /// Address reported in output messages (1-based)
    pub address: u8,
    send_queue: VecDeque<Frame>,
    capacity: usize,
}

impl CanBus {
    pub fn new(index: u8, capacity: usize) -> Self {
        Self {
            index,
            address: index.saturating_add(1),
            send_queue: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Push a frame on the send queue. Returns false and drops the frame when the queue is full.
    pub fn enqueue(&mut self, frame: Frame) -> bool {
        if self.send_queue.len() >= self.capacity {
            warn!("Send queue for bus {} full, dropping {:?}", self.address, frame);
            return false;
        }
        self.send_queue.push_back(frame);
        true
    }

    pub fn send_queue(&self) -> &VecDeque<Frame> {
        &self.send_queue
    }

    pub fn pop(&mut self) -> Option<Frame> {
        self.send_queue.pop_front()
    }

    pub fn is_queue_empty(&self) -> bool {
        self.send_queue.is_empty()
    }

    /// Drop all pending frames
    pub fn clear(&mut self) {
        self.send_queue.clear();
    }

    /// Hand the pending frames to an adapter. Frames the adapter could not take stay queued.
    pub fn flush<T: CanAdapter + ?Sized>(&mut self, adapter: &mut T) -> Result<(), crate::error::Error> {
        if self.send_queue.is_empty() {
            return Ok(());
        }
        adapter.send(&mut self.send_queue)
    }
}
