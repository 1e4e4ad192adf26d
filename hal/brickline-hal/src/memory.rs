//! In-memory loopback stream
//!
//! Holds a queue of bytes to hand out on reads and records everything
//! written. Used to replay captured device traffic and in tests.

use heapless::Vec;

use crate::stream::{Stream, StreamError, StreamRx, StreamTx};

/// Fixed-capacity in-memory stream
///
/// `N` bounds both the receive queue and the transmit log.
#[derive(Debug, Clone, Default)]
pub struct MemoryStream<const N: usize> {
    rx: Vec<u8, N>,
    rx_pos: usize,
    tx: Vec<u8, N>,
    closed: bool,
}

impl<const N: usize> MemoryStream<N> {
    /// Create an empty stream
    pub fn new() -> Self {
        Self {
            rx: Vec::new(),
            rx_pos: 0,
            tx: Vec::new(),
            closed: false,
        }
    }

    /// Create a stream that will yield `bytes` on read
    pub fn with_rx(bytes: &[u8]) -> Result<Self, StreamError> {
        let mut stream = Self::new();
        stream.push_rx(bytes)?;
        Ok(stream)
    }

    /// Queue more bytes for reading
    pub fn push_rx(&mut self, bytes: &[u8]) -> Result<(), StreamError> {
        // Compact consumed bytes first so long replays don't run out of room
        if self.rx_pos > 0 {
            let remaining = self.rx.len() - self.rx_pos;
            self.rx.copy_within(self.rx_pos.., 0);
            self.rx.truncate(remaining);
            self.rx_pos = 0;
        }
        self.rx
            .extend_from_slice(bytes)
            .map_err(|_| StreamError::Io(crate::stream::ErrorKind::OutOfMemory))
    }

    /// Bytes still waiting to be read
    pub fn pending_rx(&self) -> &[u8] {
        &self.rx[self.rx_pos..]
    }

    /// Everything written so far
    pub fn written(&self) -> &[u8] {
        &self.tx
    }

    /// Clear the transmit log
    pub fn clear_written(&mut self) {
        self.tx.clear();
    }

    /// Whether the stream has been shut down
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Mark the stream closed; further I/O fails with [`StreamError::Closed`]
    pub fn shutdown(&mut self) {
        self.closed = true;
    }
}

impl<const N: usize> StreamTx for MemoryStream<N> {
    fn write_all(&mut self, data: &[u8]) -> Result<(), StreamError> {
        if self.closed {
            return Err(StreamError::Closed);
        }
        self.tx
            .extend_from_slice(data)
            .map_err(|_| StreamError::Io(crate::stream::ErrorKind::OutOfMemory))
    }

    fn flush(&mut self) -> Result<(), StreamError> {
        if self.closed {
            return Err(StreamError::Closed);
        }
        Ok(())
    }
}

impl<const N: usize> StreamRx for MemoryStream<N> {
    fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), StreamError> {
        if self.closed {
            return Err(StreamError::Closed);
        }
        let available = self.rx.len() - self.rx_pos;
        if available < buf.len() {
            // Mirror a real stream hitting EOF: the partial bytes are consumed
            self.rx_pos = self.rx.len();
            return Err(StreamError::ShortRead);
        }
        buf.copy_from_slice(&self.rx[self.rx_pos..self.rx_pos + buf.len()]);
        self.rx_pos += buf.len();
        Ok(())
    }
}

impl<const N: usize> Stream for MemoryStream<N> {
    fn close(mut self) -> Result<(), StreamError> {
        self.shutdown();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_in_order() {
        let mut stream = MemoryStream::<8>::with_rx(&[1, 2, 3, 4]).unwrap();
        let mut buf = [0u8; 3];
        stream.read_exact(&mut buf).unwrap();
        assert_eq!(buf, [1, 2, 3]);
        assert_eq!(stream.pending_rx(), &[4]);
    }

    #[test]
    fn test_short_read() {
        let mut stream = MemoryStream::<8>::with_rx(&[1]).unwrap();
        let mut buf = [0u8; 2];
        assert_eq!(stream.read_exact(&mut buf), Err(StreamError::ShortRead));
        assert!(stream.pending_rx().is_empty());
    }

    #[test]
    fn test_push_rx_compacts() {
        let mut stream = MemoryStream::<4>::with_rx(&[1, 2, 3, 4]).unwrap();
        let mut buf = [0u8; 3];
        stream.read_exact(&mut buf).unwrap();
        stream.push_rx(&[5, 6, 7]).unwrap();
        assert_eq!(stream.pending_rx(), &[4, 5, 6, 7]);
    }

    #[test]
    fn test_write_log() {
        let mut stream = MemoryStream::<8>::new();
        stream.write_all(&[0xAA, 0xBB]).unwrap();
        stream.write_all(&[0xCC]).unwrap();
        assert_eq!(stream.written(), &[0xAA, 0xBB, 0xCC]);
        stream.clear_written();
        assert!(stream.written().is_empty());
    }

    #[test]
    fn test_closed_stream_rejects_io() {
        let mut stream = MemoryStream::<8>::with_rx(&[1]).unwrap();
        stream.shutdown();
        assert!(stream.is_closed());
        assert_eq!(stream.read_byte(), Err(StreamError::Closed));
        assert_eq!(stream.write_all(&[1]), Err(StreamError::Closed));
    }
}
