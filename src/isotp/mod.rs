//! ISO Transport Protocol (ISO-TP) helpers, implements the parts of ISO 15765-2 needed for diagnostic requests.
//!
//! Requests always fit in a single frame. Responses can span multiple frames, in which case the [`IsoTPReceiver`] reassembles them and asks the caller to send a flow control frame after the first frame.
//! ## Example:
//! ```rust
//! use cantranslator::isotp::{encode_single_frame, IsoTPReceiver, RxStatus};
//!
//! let request = encode_single_frame(&[0x01, 0x0d], Some(0x00)).unwrap();
//! assert_eq!(request, vec![0x02, 0x01, 0x0d, 0, 0, 0, 0, 0]);
//!
//! let mut receiver = IsoTPReceiver::new();
//! let status = receiver.receive(&[0x03, 0x41, 0x0d, 0x32, 0, 0, 0, 0]).unwrap();
//! assert_eq!(status, RxStatus::Complete(vec![0x41, 0x0d, 0x32]));
//! ```

mod constants;
pub mod error;

pub use constants::{FrameType, FLOW_CONTROL_CONTINUE, FRAME_TYPE_MASK, MAX_PAYLOAD_LENGTH};
pub use error::Error;

use crate::can::MAX_DATA_LENGTH;

use tracing::debug;

fn pad(data: &mut Vec<u8>, padding: Option<u8>) {
    if let Some(padding) = padding {
        let len = MAX_DATA_LENGTH - data.len();
        data.extend(std::iter::repeat(padding).take(len));
    }
}

/// Build a single frame carrying `data`. The frame is padded to 8 bytes when `padding` is set, otherwise it is as short as possible.
pub fn encode_single_frame(data: &[u8], padding: Option<u8>) -> Result<Vec<u8>, Error> {
    if data.is_empty() {
        return Err(Error::MalformedFrame);
    }
    if data.len() > MAX_DATA_LENGTH - 1 {
        return Err(Error::DataTooLarge);
    }

    let mut buf = vec![FrameType::Single as u8 | data.len() as u8];
    buf.extend(data);
    pad(&mut buf, padding);

    debug!("TX SF, length: {} data {}", data.len(), hex::encode(&buf));
    Ok(buf)
}

/// Flow control frame allowing the sender to transmit all remaining consecutive frames.
pub fn flow_control_frame(padding: Option<u8>) -> Vec<u8> {
    let mut buf = FLOW_CONTROL_CONTINUE.to_vec();
    pad(&mut buf, padding);
    buf
}

/// Outcome of feeding one frame to an [`IsoTPReceiver`].
#[derive(Debug, Clone, PartialEq)]
pub enum RxStatus {
    /// A full packet was received
    Complete(Vec<u8>),
    /// A first frame was received, the sender waits for flow control
    SendFlowControl,
    /// More consecutive frames are expected
    InProgress,
}

/// Reassembles one ISO-TP packet at a time from the data of consecutive CAN frames.
#[derive(Debug, Clone, Default)]
pub struct IsoTPReceiver {
    buf: Vec<u8>,
    len: usize,
    idx: u8,
    in_progress: bool,
}

impl IsoTPReceiver {
    pub fn new() -> Self {
        Self::default()
    }

    /// True while a multi frame packet is being reassembled
    pub fn is_in_progress(&self) -> bool {
        self.in_progress
    }

    fn reset(&mut self) {
        self.buf.clear();
        self.len = 0;
        self.idx = 0;
        self.in_progress = false;
    }

    fn recv_single_frame(&mut self, data: &[u8]) -> Result<RxStatus, Error> {
        let len = (data[0] & 0xF) as usize;
        if len == 0 || len + 1 > data.len() {
            return Err(Error::MalformedFrame);
        }

        debug!("RX SF, length: {} data {}", len, hex::encode(data));

        self.reset();
        Ok(RxStatus::Complete(data[1..len + 1].to_vec()))
    }

    fn recv_first_frame(&mut self, data: &[u8]) -> Result<RxStatus, Error> {
        if data.len() < MAX_DATA_LENGTH {
            return Err(Error::MalformedFrame);
        }

        let b0 = data[0] as usize;
        let b1 = data[1] as usize;
        let len = (b0 << 8 | b1) & MAX_PAYLOAD_LENGTH;

        // Anything that fits a single frame must not be sent as a first frame
        if len < MAX_DATA_LENGTH {
            return Err(Error::MalformedFrame);
        }

        debug!("RX FF, length: {}, data {}", len, hex::encode(data));

        self.reset();
        self.buf.extend(&data[2..]);
        self.len = len;
        self.idx = 1;
        self.in_progress = true;

        Ok(RxStatus::SendFlowControl)
    }

    fn recv_consecutive_frame(&mut self, data: &[u8]) -> Result<RxStatus, Error> {
        if !self.in_progress {
            return Err(Error::OutOfOrder);
        }

        let msg_idx = data[0] & 0xF;
        if msg_idx != self.idx {
            return Err(Error::OutOfOrder);
        }

        let remaining_len = self.len - self.buf.len();
        let end_idx = std::cmp::min(remaining_len + 1, data.len());
        self.buf.extend(&data[1..end_idx]);

        debug!("RX CF, idx: {}, data {}", msg_idx, hex::encode(data));

        self.idx = if self.idx == 0xF { 0 } else { self.idx + 1 };

        if self.buf.len() >= self.len {
            let packet = std::mem::take(&mut self.buf);
            self.reset();
            Ok(RxStatus::Complete(packet))
        } else {
            Ok(RxStatus::InProgress)
        }
    }

    /// Feed the data of one received frame. A malformed or out of order frame aborts the packet in progress.
    pub fn receive(&mut self, data: &[u8]) -> Result<RxStatus, Error> {
        if data.is_empty() {
            return Err(Error::MalformedFrame);
        }

        let result = match (data[0] & FRAME_TYPE_MASK).into() {
            FrameType::Single => self.recv_single_frame(data),
            FrameType::First => self.recv_first_frame(data),
            FrameType::Consecutive => self.recv_consecutive_frame(data),
            _ => Err(Error::UnknownFrameType),
        };

        if result.is_err() {
            self.reset();
        }
        result
    }
}
