//! Adapters from common I/O traits to the stream traits
//!
//! - [`EmbeddedStream`] wraps anything implementing `embedded_io::Read + Write`
//!   (UART peripherals, USB-serial bridges on a microcontroller).
//! - [`IoStream`] wraps anything implementing `std::io::Read + Write` (an
//!   opened `/dev/ttyUSB0` or `/dev/rfcomm0`), behind the `std` feature.

use embedded_io::{Error as _, ReadExactError};

#[cfg(feature = "std")]
use crate::stream::ErrorKind;
use crate::stream::{Stream, StreamError, StreamRx, StreamTx};

/// Stream over an `embedded-io` peripheral
#[derive(Debug)]
pub struct EmbeddedStream<T> {
    inner: T,
}

impl<T> EmbeddedStream<T> {
    /// Wrap an `embedded-io` reader/writer
    pub fn new(inner: T) -> Self {
        Self { inner }
    }

    /// Consume the adapter and return the wrapped peripheral
    pub fn into_inner(self) -> T {
        self.inner
    }
}

impl<T: embedded_io::Write> StreamTx for EmbeddedStream<T> {
    fn write_all(&mut self, data: &[u8]) -> Result<(), StreamError> {
        self.inner
            .write_all(data)
            .map_err(|e| StreamError::Io(e.kind()))
    }

    fn flush(&mut self) -> Result<(), StreamError> {
        self.inner.flush().map_err(|e| StreamError::Io(e.kind()))
    }
}

impl<T: embedded_io::Read> StreamRx for EmbeddedStream<T> {
    fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), StreamError> {
        self.inner.read_exact(buf).map_err(|e| match e {
            ReadExactError::UnexpectedEof => StreamError::ShortRead,
            ReadExactError::Other(e) => StreamError::Io(e.kind()),
        })
    }
}

impl<T: embedded_io::Read + embedded_io::Write> Stream for EmbeddedStream<T> {}

/// Stream over a `std::io` handle
#[cfg(feature = "std")]
#[derive(Debug)]
pub struct IoStream<T> {
    inner: T,
}

#[cfg(feature = "std")]
impl<T> IoStream<T> {
    /// Wrap a `std::io` reader/writer
    pub fn new(inner: T) -> Self {
        Self { inner }
    }

    /// Borrow the wrapped handle
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Consume the adapter and return the wrapped handle
    pub fn into_inner(self) -> T {
        self.inner
    }
}

#[cfg(feature = "std")]
impl IoStream<std::fs::File> {
    /// Open a device node for reading and writing
    ///
    /// Serial ports and bound RFCOMM channels both show up as character
    /// devices, so a plain file handle is enough.
    pub fn open<P: AsRef<std::path::Path>>(path: P) -> Result<Self, StreamError> {
        std::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map(Self::new)
            .map_err(|e| StreamError::Io(io_kind(e.kind())))
    }
}

#[cfg(feature = "std")]
impl<T: std::io::Write> StreamTx for IoStream<T> {
    fn write_all(&mut self, data: &[u8]) -> Result<(), StreamError> {
        self.inner
            .write_all(data)
            .map_err(|e| StreamError::Io(io_kind(e.kind())))
    }

    fn flush(&mut self) -> Result<(), StreamError> {
        self.inner
            .flush()
            .map_err(|e| StreamError::Io(io_kind(e.kind())))
    }
}

#[cfg(feature = "std")]
impl<T: std::io::Read> StreamRx for IoStream<T> {
    fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), StreamError> {
        self.inner.read_exact(buf).map_err(|e| match e.kind() {
            std::io::ErrorKind::UnexpectedEof => StreamError::ShortRead,
            kind => StreamError::Io(io_kind(kind)),
        })
    }
}

#[cfg(feature = "std")]
impl<T: std::io::Read + std::io::Write> Stream for IoStream<T> {}

/// Map a `std::io` error kind onto the portable `embedded-io` kind
#[cfg(feature = "std")]
fn io_kind(kind: std::io::ErrorKind) -> ErrorKind {
    use std::io::ErrorKind as Std;

    match kind {
        Std::NotFound => ErrorKind::NotFound,
        Std::PermissionDenied => ErrorKind::PermissionDenied,
        Std::ConnectionRefused => ErrorKind::ConnectionRefused,
        Std::ConnectionReset => ErrorKind::ConnectionReset,
        Std::ConnectionAborted => ErrorKind::ConnectionAborted,
        Std::NotConnected => ErrorKind::NotConnected,
        Std::BrokenPipe => ErrorKind::BrokenPipe,
        Std::AlreadyExists => ErrorKind::AlreadyExists,
        Std::InvalidInput => ErrorKind::InvalidInput,
        Std::InvalidData => ErrorKind::InvalidData,
        Std::TimedOut => ErrorKind::TimedOut,
        Std::Interrupted => ErrorKind::Interrupted,
        Std::Unsupported => ErrorKind::Unsupported,
        Std::OutOfMemory => ErrorKind::OutOfMemory,
        _ => ErrorKind::Other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::ErrorKind;

    /// Minimal embedded-io peripheral backed by a byte slice
    struct SliceUart<'a> {
        rx: &'a [u8],
        tx: heapless::Vec<u8, 16>,
    }

    impl embedded_io::ErrorType for SliceUart<'_> {
        type Error = ErrorKind;
    }

    impl embedded_io::Read for SliceUart<'_> {
        fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
            let n = buf.len().min(self.rx.len());
            buf[..n].copy_from_slice(&self.rx[..n]);
            self.rx = &self.rx[n..];
            Ok(n)
        }
    }

    impl embedded_io::Write for SliceUart<'_> {
        fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
            let n = buf.len().min(self.tx.capacity() - self.tx.len());
            if n == 0 {
                return Err(ErrorKind::OutOfMemory);
            }
            let _ = self.tx.extend_from_slice(&buf[..n]);
            Ok(n)
        }

        fn flush(&mut self) -> Result<(), Self::Error> {
            Ok(())
        }
    }

    #[test]
    fn test_embedded_read_exact() {
        let mut stream = EmbeddedStream::new(SliceUart {
            rx: &[1, 2, 3],
            tx: heapless::Vec::new(),
        });
        let mut buf = [0u8; 2];
        stream.read_exact(&mut buf).unwrap();
        assert_eq!(buf, [1, 2]);
    }

    #[test]
    fn test_embedded_eof_is_short_read() {
        let mut stream = EmbeddedStream::new(SliceUart {
            rx: &[1],
            tx: heapless::Vec::new(),
        });
        let mut buf = [0u8; 2];
        assert_eq!(stream.read_exact(&mut buf), Err(StreamError::ShortRead));
    }

    #[test]
    fn test_embedded_write_all() {
        let mut stream = EmbeddedStream::new(SliceUart {
            rx: &[],
            tx: heapless::Vec::new(),
        });
        stream.write_all(&[0x02, 0x00, 0x80, 0x0B]).unwrap();
        assert_eq!(&stream.into_inner().tx[..], &[0x02, 0x00, 0x80, 0x0B]);
    }

    #[cfg(feature = "std")]
    #[test]
    fn test_io_stream_short_read() {
        let mut stream = IoStream::new(std::io::Cursor::new(std::vec![0x05u8]));
        let mut buf = [0u8; 2];
        assert_eq!(stream.read_exact(&mut buf), Err(StreamError::ShortRead));
    }
}
