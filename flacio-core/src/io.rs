//! The byte-stream contract and the engine-facing adapter.
//!
//! [`ByteStream`] is what a caller supplies: positioned byte I/O plus
//! capability queries. [`StreamAdapter`] binds one stream for one codec
//! engine instance, translating it into the fixed primitive set the engine
//! consumes (read, write, seek, tell, length, eof). The adapter never
//! buffers; every call is forwarded immediately so the stream's own
//! buffering and flushing semantics are preserved while the engine
//! interleaves metadata seeks with sequential writes.

use crate::error::{Error, Result};
use std::fs::File;
use std::io::{self, Cursor, Read, Seek, SeekFrom, Write};

/// A caller-supplied byte stream.
///
/// Capabilities are queried once, when the stream is bound to a session;
/// a stream reporting a capability it cannot honor will surface ordinary
/// I/O errors from the corresponding operation instead.
pub trait ByteStream {
    /// Read into `buf`, returning the number of bytes read (0 at end of
    /// stream).
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let _ = buf;
        Err(unsupported("stream is not readable"))
    }

    /// Write from `buf`, returning the number of bytes written.
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let _ = buf;
        Err(unsupported("stream is not writable"))
    }

    /// Reposition the stream, returning the new absolute offset.
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let _ = pos;
        Err(unsupported("stream is not seekable"))
    }

    /// Current absolute offset.
    fn tell(&mut self) -> io::Result<u64> {
        Err(unsupported("stream is not seekable"))
    }

    /// Whether [`ByteStream::read`] is supported.
    fn readable(&self) -> bool;

    /// Whether [`ByteStream::write`] is supported.
    fn writable(&self) -> bool;

    /// Whether [`ByteStream::seek`] and [`ByteStream::tell`] are supported.
    fn seekable(&self) -> bool;
}

fn unsupported(msg: &'static str) -> io::Error {
    io::Error::new(io::ErrorKind::Unsupported, msg)
}

impl<S: ByteStream + ?Sized> ByteStream for &mut S {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        (**self).read(buf)
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        (**self).write(buf)
    }

    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        (**self).seek(pos)
    }

    fn tell(&mut self) -> io::Result<u64> {
        (**self).tell()
    }

    fn readable(&self) -> bool {
        (**self).readable()
    }

    fn writable(&self) -> bool {
        (**self).writable()
    }

    fn seekable(&self) -> bool {
        (**self).seekable()
    }
}

impl ByteStream for File {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Read::read(self, buf)
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Write::write(self, buf)
    }

    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        Seek::seek(self, pos)
    }

    fn tell(&mut self) -> io::Result<u64> {
        Seek::stream_position(self)
    }

    // The open mode is not observable through std; a file opened the wrong
    // way reports its failure from the operation itself.
    fn readable(&self) -> bool {
        true
    }

    fn writable(&self) -> bool {
        true
    }

    fn seekable(&self) -> bool {
        true
    }
}

impl ByteStream for Cursor<Vec<u8>> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Read::read(self, buf)
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Write::write(self, buf)
    }

    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        Seek::seek(self, pos)
    }

    fn tell(&mut self) -> io::Result<u64> {
        Seek::stream_position(self)
    }

    fn readable(&self) -> bool {
        true
    }

    fn writable(&self) -> bool {
        true
    }

    fn seekable(&self) -> bool {
        true
    }
}

impl<'a> ByteStream for Cursor<&'a [u8]> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Read::read(self, buf)
    }

    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        Seek::seek(self, pos)
    }

    fn tell(&mut self) -> io::Result<u64> {
        Seek::stream_position(self)
    }

    fn readable(&self) -> bool {
        true
    }

    fn writable(&self) -> bool {
        false
    }

    fn seekable(&self) -> bool {
        true
    }
}

/// A non-seekable, read-only view over any [`Read`] source.
///
/// Models pipe-like inputs: the decoder works, but length queries and
/// metadata seeks are unavailable.
#[derive(Debug)]
pub struct ReadOnly<R>(R);

impl<R: Read> ReadOnly<R> {
    /// Wrap a reader.
    pub fn new(inner: R) -> Self {
        Self(inner)
    }

    /// Consume the wrapper and return the reader.
    pub fn into_inner(self) -> R {
        self.0
    }
}

impl<R: Read> ByteStream for ReadOnly<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.0.read(buf)
    }

    fn readable(&self) -> bool {
        true
    }

    fn writable(&self) -> bool {
        false
    }

    fn seekable(&self) -> bool {
        false
    }
}

/// A non-seekable, write-only view over any [`Write`] sink.
///
/// An encoder bound to one completes normally but skips the
/// total-sample-count metadata patch at close.
#[derive(Debug)]
pub struct WriteOnly<W>(W);

impl<W: Write> WriteOnly<W> {
    /// Wrap a writer.
    pub fn new(inner: W) -> Self {
        Self(inner)
    }

    /// Consume the wrapper and return the writer.
    pub fn into_inner(self) -> W {
        self.0
    }

    /// Access the wrapped writer.
    pub fn get_ref(&self) -> &W {
        &self.0
    }
}

impl<W: Write> ByteStream for WriteOnly<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.write(buf)
    }

    fn readable(&self) -> bool {
        false
    }

    fn writable(&self) -> bool {
        true
    }

    fn seekable(&self) -> bool {
        false
    }
}

/// Binds one [`ByteStream`] to one codec engine instance.
///
/// Seekability is sampled once at bind time; the eof flag latches when a
/// read returns no data and clears on seek, matching the engine's
/// expectation that eof reflects the last read attempt rather than the
/// stream position.
#[derive(Debug)]
pub struct StreamAdapter<S> {
    stream: S,
    seekable: bool,
    eof: bool,
}

impl<S: ByteStream> StreamAdapter<S> {
    /// Bind a stream for decoding. The stream must be readable.
    pub fn for_reading(stream: S) -> Result<Self> {
        if !stream.readable() {
            return Err(Error::MissingCapability {
                capability: "reading",
            });
        }
        Ok(Self::bind(stream))
    }

    /// Bind a stream for encoding. The stream must be writable.
    pub fn for_writing(stream: S) -> Result<Self> {
        if !stream.writable() {
            return Err(Error::MissingCapability {
                capability: "writing",
            });
        }
        Ok(Self::bind(stream))
    }

    fn bind(stream: S) -> Self {
        let seekable = stream.seekable();
        Self {
            stream,
            seekable,
            eof: false,
        }
    }

    /// Whether the stream was seekable at bind time.
    pub fn seekable(&self) -> bool {
        self.seekable
    }

    /// Whether the last read attempt hit end of stream.
    pub fn at_eof(&self) -> bool {
        self.eof
    }

    /// Read into `buf`. Returns 0 at end of stream and latches the eof
    /// flag.
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let n = self
            .stream
            .read(buf)
            .map_err(|e| Error::io("read", e))?;
        if n == 0 && !buf.is_empty() {
            self.eof = true;
        }
        Ok(n)
    }

    /// Write the whole buffer, retrying short writes.
    ///
    /// A write that makes no progress is surfaced as an error so the
    /// engine aborts instead of silently truncating the stream.
    pub fn write_all(&mut self, mut buf: &[u8]) -> Result<()> {
        while !buf.is_empty() {
            let n = self
                .stream
                .write(buf)
                .map_err(|e| Error::io("write", e))?;
            if n == 0 {
                return Err(Error::io(
                    "write",
                    io::Error::new(io::ErrorKind::WriteZero, "stream accepted no bytes"),
                ));
            }
            if n > buf.len() {
                return Err(Error::io(
                    "write",
                    io::Error::new(io::ErrorKind::InvalidData, "invalid result from write"),
                ));
            }
            buf = &buf[n..];
        }
        Ok(())
    }

    /// Seek to an absolute byte offset. Clears the eof flag.
    pub fn seek(&mut self, offset: u64) -> Result<()> {
        if !self.seekable {
            return Err(Error::NotSeekable);
        }
        self.eof = false;
        self.stream
            .seek(SeekFrom::Start(offset))
            .map_err(|e| Error::io("seek", e))?;
        Ok(())
    }

    /// Current absolute byte offset.
    pub fn tell(&mut self) -> Result<u64> {
        if !self.seekable {
            return Err(Error::NotSeekable);
        }
        self.stream.tell().map_err(|e| Error::io("tell", e))
    }

    /// Total stream length, derived from seek/tell so it is consistent
    /// with them by construction. Only meaningful on seekable streams.
    pub fn length(&mut self) -> Result<u64> {
        if !self.seekable {
            return Err(Error::NotSeekable);
        }
        let old = self.stream.tell().map_err(|e| Error::io("tell", e))?;
        let end = self
            .stream
            .seek(SeekFrom::End(0))
            .map_err(|e| Error::io("seek", e))?;
        self.stream
            .seek(SeekFrom::Start(old))
            .map_err(|e| Error::io("seek", e))?;
        Ok(end)
    }

    /// Release the bound stream.
    pub fn into_inner(self) -> S {
        self.stream
    }

    /// Access the bound stream.
    pub fn get_ref(&self) -> &S {
        &self.stream
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_for_reading_rejects_write_only() {
        let sink = WriteOnly::new(Vec::new());
        let err = StreamAdapter::for_reading(sink).unwrap_err();
        assert!(matches!(
            err,
            Error::MissingCapability {
                capability: "reading"
            }
        ));
    }

    #[test]
    fn test_for_writing_rejects_read_only() {
        let src = ReadOnly::new(io::empty());
        let err = StreamAdapter::for_writing(src).unwrap_err();
        assert!(matches!(
            err,
            Error::MissingCapability {
                capability: "writing"
            }
        ));
    }

    #[test]
    fn test_eof_latch_and_clear() {
        let mut adapter = StreamAdapter::for_reading(Cursor::new(vec![1u8, 2])).unwrap();
        let mut buf = [0u8; 8];
        assert_eq!(adapter.read(&mut buf).unwrap(), 2);
        assert!(!adapter.at_eof());
        assert_eq!(adapter.read(&mut buf).unwrap(), 0);
        assert!(adapter.at_eof());
        adapter.seek(0).unwrap();
        assert!(!adapter.at_eof());
    }

    #[test]
    fn test_length_preserves_position() {
        let mut adapter =
            StreamAdapter::for_reading(Cursor::new(vec![0u8; 100])).unwrap();
        adapter.seek(40).unwrap();
        assert_eq!(adapter.length().unwrap(), 100);
        assert_eq!(adapter.tell().unwrap(), 40);
    }

    #[test]
    fn test_non_seekable_adapter() {
        let mut adapter =
            StreamAdapter::for_reading(ReadOnly::new(Cursor::new(vec![0u8; 4]))).unwrap();
        assert!(!adapter.seekable());
        assert!(matches!(adapter.seek(0), Err(Error::NotSeekable)));
        assert!(matches!(adapter.length(), Err(Error::NotSeekable)));
    }

    #[test]
    fn test_write_all_through_cursor() {
        let mut adapter =
            StreamAdapter::for_writing(Cursor::new(Vec::new())).unwrap();
        adapter.write_all(b"hello").unwrap();
        adapter.write_all(b" world").unwrap();
        assert_eq!(adapter.into_inner().into_inner(), b"hello world");
    }

    struct TrickleSink(Vec<u8>);

    impl ByteStream for TrickleSink {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            // Accepts at most two bytes per call.
            let n = buf.len().min(2);
            self.0.extend_from_slice(&buf[..n]);
            Ok(n)
        }

        fn readable(&self) -> bool {
            false
        }

        fn writable(&self) -> bool {
            true
        }

        fn seekable(&self) -> bool {
            false
        }
    }

    #[test]
    fn test_write_all_retries_short_writes() {
        let mut adapter = StreamAdapter::for_writing(TrickleSink(Vec::new())).unwrap();
        adapter.write_all(b"abcdefg").unwrap();
        assert_eq!(adapter.into_inner().0, b"abcdefg");
    }

    #[test]
    fn test_borrowed_stream() {
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut adapter = StreamAdapter::for_writing(&mut cursor).unwrap();
            adapter.write_all(b"data").unwrap();
        }
        assert_eq!(cursor.into_inner(), b"data");
    }
}
