// src/transport/codec.rs
//! Collector frame codec
//!
//! Frame layout:
//! - 1 byte: kind (1 = text, 2 = binary, 3 = ack)
//! - 4 bytes: masking key (big-endian, 0 = unmasked)
//! - 4 bytes: payload length (big-endian)
//! - N bytes: payload XOR-ed with the key bytes, cycling

use crate::utils::errors::TraceError;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

/// Kind, key and length
pub const FRAME_HEADER_SIZE: usize = 9;

/// Largest payload accepted in either direction (16 MB)
pub const DEFAULT_MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// Frame kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FrameKind {
    Text = 1,
    Binary = 2,
    Ack = 3,
}

impl FrameKind {
    fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            1 => Some(FrameKind::Text),
            2 => Some(FrameKind::Binary),
            3 => Some(FrameKind::Ack),
            _ => None,
        }
    }
}

/// A decoded (unmasked) frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub kind: FrameKind,
    pub mask: u32,
    pub payload: Bytes,
}

impl Frame {
    /// Frame whose payload will be masked with `mask` on the wire
    pub fn masked(kind: FrameKind, payload: Bytes, mask: u32) -> Self {
        Self {
            kind,
            mask,
            payload,
        }
    }

    /// Unmasked acknowledgment, as sent by the collector
    pub fn ack() -> Self {
        Self {
            kind: FrameKind::Ack,
            mask: 0,
            payload: Bytes::new(),
        }
    }
}

fn apply_mask(mask: u32, data: &mut [u8]) {
    if mask == 0 {
        return;
    }
    let key = mask.to_be_bytes();
    for (i, byte) in data.iter_mut().enumerate() {
        *byte ^= key[i % 4];
    }
}

/// Encoder and decoder for collector frames
#[derive(Debug)]
pub struct CollectorCodec {
    max_frame_size: usize,
}

impl CollectorCodec {
    pub fn new() -> Self {
        Self {
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }

    pub fn with_max_size(max_frame_size: usize) -> Self {
        Self { max_frame_size }
    }
}

impl Default for CollectorCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for CollectorCodec {
    type Item = Frame;
    type Error = TraceError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < FRAME_HEADER_SIZE {
            return Ok(None);
        }

        let kind = FrameKind::from_byte(src[0]).ok_or_else(|| {
            TraceError::ProtocolViolation(format!("Unknown frame kind {}", src[0]))
        })?;
        let mask = u32::from_be_bytes([src[1], src[2], src[3], src[4]]);
        let length = u32::from_be_bytes([src[5], src[6], src[7], src[8]]) as usize;

        if length > self.max_frame_size {
            return Err(TraceError::ProtocolViolation(format!(
                "Frame of {} bytes exceeds limit of {}",
                length, self.max_frame_size
            )));
        }

        if src.len() < FRAME_HEADER_SIZE + length {
            src.reserve(FRAME_HEADER_SIZE + length - src.len());
            return Ok(None);
        }

        src.advance(FRAME_HEADER_SIZE);
        let mut payload = src.split_to(length);
        apply_mask(mask, &mut payload);

        Ok(Some(Frame {
            kind,
            mask,
            payload: payload.freeze(),
        }))
    }
}

impl Encoder<Frame> for CollectorCodec {
    type Error = TraceError;

    fn encode(&mut self, item: Frame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        if item.payload.len() > self.max_frame_size {
            return Err(TraceError::ProtocolViolation(format!(
                "Frame of {} bytes exceeds limit of {}",
                item.payload.len(),
                self.max_frame_size
            )));
        }

        dst.reserve(FRAME_HEADER_SIZE + item.payload.len());
        dst.put_u8(item.kind as u8);
        dst.put_u32(item.mask);
        dst.put_u32(item.payload.len() as u32);

        let start = dst.len();
        dst.extend_from_slice(&item.payload);
        apply_mask(item.mask, &mut dst[start..]);

        Ok(())
    }
}
