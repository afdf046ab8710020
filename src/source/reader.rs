use super::framer::Framer;
use super::prefetch::Prefetch;
use super::Source;
use crate::config;
use crate::error::Result;
use crate::format::ts::TsPacket;
use async_trait::async_trait;
use std::io::Read;

/// Framed packets from a sequential byte source that cannot seek.
pub struct ReaderSource<R: Read + Send + 'static> {
    prefetch: Prefetch<Framer<R>>,
}

impl<R: Read + Send + 'static> ReaderSource<R> {
    /// Source using the configured buffer size.
    pub fn new(reader: R) -> Self {
        Self::with_buffer_packets(reader, config::get_buffer_packets())
    }

    /// Source reading `buffer_packets` packets per refill.
    pub fn with_buffer_packets(reader: R, buffer_packets: usize) -> Self {
        Self {
            prefetch: Prefetch::new(Framer::new(reader, buffer_packets)),
        }
    }
}

#[async_trait]
impl<R: Read + Send + 'static> Source for ReaderSource<R> {
    async fn next_packet(&mut self) -> Result<Option<TsPacket>> {
        self.prefetch.next().await
    }

    async fn close(&mut self) -> Result<()> {
        self.prefetch.close().await
    }
}
