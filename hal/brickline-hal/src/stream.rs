//! Blocking byte-stream abstractions
//!
//! The brick protocol is strictly request/reply, so the transport only needs
//! to move whole buffers in each direction and block until it is done.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

pub use embedded_io::ErrorKind;

/// Transport-level failures
///
/// These are never recovered by the codec; they propagate to the caller
/// unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StreamError {
    /// The stream ended before the requested number of bytes arrived
    ShortRead,
    /// The stream has been closed
    Closed,
    /// Underlying I/O failure
    Io(ErrorKind),
}

impl core::fmt::Display for StreamError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            StreamError::ShortRead => f.write_str("stream ended mid-frame"),
            StreamError::Closed => f.write_str("stream closed"),
            StreamError::Io(kind) => write!(f, "I/O error: {:?}", kind),
        }
    }
}

/// Stream transmitter
pub trait StreamTx {
    /// Write all of `data` to the stream
    ///
    /// Blocks until every byte has been written or an error occurs.
    fn write_all(&mut self, data: &[u8]) -> Result<(), StreamError>;

    /// Flush any buffered data
    fn flush(&mut self) -> Result<(), StreamError>;
}

/// Stream receiver
pub trait StreamRx {
    /// Fill `buf` completely from the stream
    ///
    /// Blocks until the buffer is filled. Returns [`StreamError::ShortRead`]
    /// if the stream reaches end-of-file first.
    fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), StreamError>;

    /// Read a single byte from the stream
    fn read_byte(&mut self) -> Result<u8, StreamError> {
        let mut buf = [0u8; 1];
        self.read_exact(&mut buf)?;
        Ok(buf[0])
    }
}

/// Combined stream interface
///
/// For transports that provide both directions on a single handle (a tty,
/// an RFCOMM socket).
pub trait Stream: StreamTx + StreamRx {
    /// Close the stream
    ///
    /// Any read blocked on another handle to the same device is released by
    /// the operating system; the protocol layer has no cancellation of its own.
    fn close(mut self) -> Result<(), StreamError>
    where
        Self: Sized,
    {
        self.flush()
    }
}

/// Serial line configuration
///
/// Only meaningful for real serial ports; RFCOMM device nodes ignore it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct StreamConfig {
    /// Baud rate in bits per second
    pub baudrate: u32,
    /// Number of data bits (typically 8)
    pub data_bits: DataBits,
    /// Parity mode
    pub parity: Parity,
    /// Number of stop bits
    pub stop_bits: StopBits,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            baudrate: 115200,
            data_bits: DataBits::Eight,
            parity: Parity::None,
            stop_bits: StopBits::One,
        }
    }
}

/// Number of data bits per frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum DataBits {
    Seven,
    Eight,
}

/// Parity mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Parity {
    None,
    Even,
    Odd,
}

/// Number of stop bits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum StopBits {
    One,
    Two,
}
