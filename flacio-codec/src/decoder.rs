//! Block-based stream decoder.

use crate::frame;
use crate::metadata::{self, StreamInfo};
use flacio_core::error::Result;
use flacio_core::io::{ByteStream, StreamAdapter};
use flacio_core::sample::SampleBlock;

/// The block-based stream decoder.
///
/// Metadata is read once, on the first call to [`read_metadata`] or
/// implicitly by [`next_block`]; after that each call to `next_block`
/// yields one decoded frame until the stream is exhausted.
///
/// [`read_metadata`]: StreamDecoder::read_metadata
/// [`next_block`]: StreamDecoder::next_block
pub struct StreamDecoder<S> {
    io: StreamAdapter<S>,
    info: Option<StreamInfo>,
    metadata_done: bool,
    end_of_stream: bool,
}

impl<S: ByteStream> StreamDecoder<S> {
    /// Bind the decoder to an adapter. No bytes are consumed yet.
    pub fn new(io: StreamAdapter<S>) -> Self {
        Self {
            io,
            info: None,
            metadata_done: false,
            end_of_stream: false,
        }
    }

    /// Advance to the end of the metadata section.
    ///
    /// Idempotent after the first successful call. An input that ends
    /// before the first marker byte is treated as an empty stream, not an
    /// error: the metadata stays unknown and [`next_block`] reports end of
    /// stream.
    ///
    /// [`next_block`]: StreamDecoder::next_block
    pub fn read_metadata(&mut self) -> Result<()> {
        if self.metadata_done {
            return Ok(());
        }

        match metadata::read_stream_header(&mut self.io)? {
            Some(info) => {
                self.info = Some(info);
            }
            None => {
                self.end_of_stream = true;
            }
        }
        self.metadata_done = true;
        Ok(())
    }

    /// The STREAMINFO block, once metadata has been read.
    pub fn stream_info(&self) -> Option<&StreamInfo> {
        self.info.as_ref()
    }

    /// Decode the next block, or `None` at end of stream.
    pub fn next_block(&mut self) -> Result<Option<SampleBlock>> {
        if !self.metadata_done {
            self.read_metadata()?;
        }
        if self.end_of_stream {
            return Ok(None);
        }

        let info = self.info.as_ref().expect("metadata read before frames");
        match frame::read_frame(&mut self.io, info)? {
            Some(block) => Ok(Some(block)),
            None => {
                self.end_of_stream = true;
                Ok(None)
            }
        }
    }

    /// Release the adapter.
    pub fn into_inner(self) -> StreamAdapter<S> {
        self.io
    }
}
