//! Frame encoding and decoding for the NXT byte stream.
//!
//! Frame format:
//! - LENGTH (2 bytes): payload length, little-endian (0-64)
//! - PAYLOAD (0-64 bytes): type byte, command code, telegram
//!
//! There is no start byte and no checksum; the transport is trusted to
//! deliver bytes in order.

use brickline_hal::{StreamError, StreamRx, StreamTx};
use heapless::Vec;

/// Maximum payload size in bytes (the brick's receive buffer)
pub const MAX_PAYLOAD_SIZE: usize = 64;

/// Size of the length prefix
pub const LENGTH_PREFIX_SIZE: usize = 2;

/// Maximum complete frame size (LENGTH + MAX_PAYLOAD)
pub const MAX_FRAME_SIZE: usize = LENGTH_PREFIX_SIZE + MAX_PAYLOAD_SIZE;

/// Errors that can occur during frame encoding or decoding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FrameError {
    /// Payload (or a declared length) exceeds the 64-byte limit
    FrameTooLarge,
    /// The stream ended before the header or payload was complete
    ShortRead,
    /// Transport failure
    Stream(StreamError),
}

impl From<StreamError> for FrameError {
    fn from(e: StreamError) -> Self {
        match e {
            StreamError::ShortRead => FrameError::ShortRead,
            other => FrameError::Stream(other),
        }
    }
}

impl core::fmt::Display for FrameError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            FrameError::FrameTooLarge => f.write_str("frame exceeds 64-byte payload limit"),
            FrameError::ShortRead => f.write_str("stream ended mid-frame"),
            FrameError::Stream(e) => write!(f, "{}", e),
        }
    }
}

/// An encoded frame ready for the wire
pub type Frame = Vec<u8, MAX_FRAME_SIZE>;

/// Prefix `payload` with its little-endian length
pub fn encode(payload: &[u8]) -> Result<Frame, FrameError> {
    if payload.len() > MAX_PAYLOAD_SIZE {
        return Err(FrameError::FrameTooLarge);
    }

    let mut frame = Vec::new();
    frame
        .extend_from_slice(&(payload.len() as u16).to_le_bytes())
        .map_err(|_| FrameError::FrameTooLarge)?;
    frame
        .extend_from_slice(payload)
        .map_err(|_| FrameError::FrameTooLarge)?;
    Ok(frame)
}

/// Read the 2-byte length prefix
pub fn decode_header<R: StreamRx + ?Sized>(stream: &mut R) -> Result<u16, FrameError> {
    let mut prefix = [0u8; LENGTH_PREFIX_SIZE];
    stream.read_exact(&mut prefix)?;
    Ok(u16::from_le_bytes(prefix))
}

/// Read one whole frame and return its payload
///
/// A declared length above [`MAX_PAYLOAD_SIZE`] is rejected before any
/// payload byte is read.
pub fn read_payload<R: StreamRx + ?Sized>(
    stream: &mut R,
) -> Result<Vec<u8, MAX_PAYLOAD_SIZE>, FrameError> {
    let len = decode_header(stream)? as usize;
    if len > MAX_PAYLOAD_SIZE {
        return Err(FrameError::FrameTooLarge);
    }

    let mut buf = [0u8; MAX_PAYLOAD_SIZE];
    stream.read_exact(&mut buf[..len])?;
    trace!("RX frame: {} bytes", len);

    let mut payload = Vec::new();
    payload
        .extend_from_slice(&buf[..len])
        .map_err(|_| FrameError::FrameTooLarge)?;
    Ok(payload)
}

/// Frame `payload` and write it out
pub fn write_payload<W: StreamTx + ?Sized>(stream: &mut W, payload: &[u8]) -> Result<(), FrameError> {
    let frame = encode(payload)?;
    stream.write_all(&frame)?;
    stream.flush()?;
    trace!("TX frame: {} bytes", payload.len());
    Ok(())
}

/// Incremental parser for frames arriving in arbitrary chunks
#[derive(Debug, Clone)]
pub struct FrameParser {
    state: ParseState,
    buffer: Vec<u8, MAX_PAYLOAD_SIZE>,
    expected_length: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParseState {
    /// Waiting for the low length byte
    WaitingForLengthLow,
    /// Got the low byte, waiting for the high byte
    WaitingForLengthHigh,
    /// Reading payload bytes
    ReadingPayload,
}

impl Default for FrameParser {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameParser {
    /// Create a new frame parser
    pub fn new() -> Self {
        Self {
            state: ParseState::WaitingForLengthLow,
            buffer: Vec::new(),
            expected_length: 0,
        }
    }

    /// Reset the parser state
    pub fn reset(&mut self) {
        self.state = ParseState::WaitingForLengthLow;
        self.buffer.clear();
        self.expected_length = 0;
    }

    /// Whether the parser sits between frames
    pub fn is_idle(&self) -> bool {
        self.state == ParseState::WaitingForLengthLow
    }

    /// Feed a single byte to the parser
    ///
    /// Returns `Ok(Some(payload))` when a complete frame is parsed,
    /// `Ok(None)` when more bytes are needed, or `Err` on an oversized
    /// length (the parser resets itself).
    pub fn feed(&mut self, byte: u8) -> Result<Option<Vec<u8, MAX_PAYLOAD_SIZE>>, FrameError> {
        match self.state {
            ParseState::WaitingForLengthLow => {
                self.expected_length = byte as u16;
                self.state = ParseState::WaitingForLengthHigh;
                Ok(None)
            }
            ParseState::WaitingForLengthHigh => {
                self.expected_length |= (byte as u16) << 8;
                if self.expected_length as usize > MAX_PAYLOAD_SIZE {
                    self.reset();
                    return Err(FrameError::FrameTooLarge);
                }
                self.buffer.clear();
                if self.expected_length == 0 {
                    self.reset();
                    return Ok(Some(Vec::new()));
                }
                self.state = ParseState::ReadingPayload;
                Ok(None)
            }
            ParseState::ReadingPayload => {
                // Cannot overflow: expected_length was bounded above
                let _ = self.buffer.push(byte);
                if self.buffer.len() == self.expected_length as usize {
                    let payload = self.buffer.clone();
                    self.reset();
                    return Ok(Some(payload));
                }
                Ok(None)
            }
        }
    }

    /// Feed multiple bytes to the parser
    ///
    /// Returns the first complete payload together with the number of bytes
    /// consumed. Bytes after a complete frame are not consumed.
    pub fn feed_bytes(
        &mut self,
        bytes: &[u8],
    ) -> Result<(Option<Vec<u8, MAX_PAYLOAD_SIZE>>, usize), FrameError> {
        for (i, &byte) in bytes.iter().enumerate() {
            if let Some(payload) = self.feed(byte)? {
                return Ok((Some(payload), i + 1));
            }
        }
        Ok((None, bytes.len()))
    }
}
