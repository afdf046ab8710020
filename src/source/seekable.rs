use super::framer::Framer;
use super::prefetch::Prefetch;
use super::{Resettable, Seekable, Source};
use crate::config;
use crate::error::{Result, TsError};
use crate::format::ts::{format_pcr, TsPacket};
use async_trait::async_trait;
use log::{debug, info};
use std::io::{Read, Seek};

/// Framed source over a random-access byte store, able to seek by PCR and to
/// mark/rewind random access points.
pub struct SeekableSource<R: Read + Seek + Send + 'static> {
    prefetch: Prefetch<Framer<R>>,
    last_random_position: Option<u64>,
    mark: Option<u64>,
}

impl<R: Read + Seek + Send + 'static> SeekableSource<R> {
    /// Starts a builder without a store.
    pub fn builder() -> SeekableSourceBuilder<R> {
        SeekableSourceBuilder::new()
    }

    /// Source using the configured buffer size.
    pub fn new(store: R) -> Self {
        Self::with_buffer_packets(store, config::get_buffer_packets())
    }

    /// Source reading `buffer_packets` packets per refill.
    pub fn with_buffer_packets(store: R, buffer_packets: usize) -> Self {
        Self {
            prefetch: Prefetch::new(Framer::new(store, buffer_packets)),
            last_random_position: None,
            mark: None,
        }
    }

    /// Offset of the last random access packet handed out.
    pub fn last_random_position(&self) -> Option<u64> {
        self.last_random_position
    }

    async fn reposition(&mut self, offset: u64) -> Result<()> {
        self.prefetch
            .with_producer(move |framer| framer.reposition(offset))
            .await
    }
}

#[async_trait]
impl<R: Read + Seek + Send + 'static> Source for SeekableSource<R> {
    async fn next_packet(&mut self) -> Result<Option<TsPacket>> {
        let packet = self.prefetch.next().await?;
        if let Some(packet) = &packet {
            if packet.is_random_access() {
                self.last_random_position = packet.byte_offset();
            }
        }
        Ok(packet)
    }

    async fn close(&mut self) -> Result<()> {
        self.prefetch.close().await
    }

    fn as_resettable(&mut self) -> Option<&mut dyn Resettable> {
        Some(self)
    }

    fn as_seekable(&mut self) -> Option<&mut dyn Seekable> {
        Some(self)
    }
}

#[async_trait]
impl<R: Read + Seek + Send + 'static> Resettable for SeekableSource<R> {
    async fn reset(&mut self) -> Result<()> {
        self.last_random_position = None;
        self.reposition(0).await
    }
}

#[async_trait]
impl<R: Read + Seek + Send + 'static> Seekable for SeekableSource<R> {
    async fn seek(&mut self, pcr: u64) -> Result<()> {
        info!("Seeking to PCR {} ({})", pcr, format_pcr(pcr));
        let result = self
            .prefetch
            .with_producer(move |framer| framer.seek_pcr(pcr))
            .await;
        self.last_random_position = None;
        result
    }

    fn mark(&mut self) {
        debug!("Mark set at {:?}", self.last_random_position);
        self.mark = self.last_random_position;
    }

    async fn rewind(&mut self) -> Result<()> {
        let mark = self.mark.ok_or(TsError::NoMark)?;
        self.reposition(mark).await
    }
}

/// Builder for [`SeekableSource`].
pub struct SeekableSourceBuilder<R> {
    store: Option<R>,
    buffer_packets: Option<usize>,
}

impl<R: Read + Seek + Send + 'static> SeekableSourceBuilder<R> {
    fn new() -> Self {
        Self {
            store: None,
            buffer_packets: None,
        }
    }

    /// Byte store to read from. Required.
    pub fn store(mut self, store: R) -> Self {
        self.store = Some(store);
        self
    }

    /// Packets read per refill. Defaults to the configured value.
    pub fn buffer_packets(mut self, buffer_packets: usize) -> Self {
        self.buffer_packets = Some(buffer_packets);
        self
    }

    /// Fails with a configuration error when no store was given.
    pub fn build(self) -> Result<SeekableSource<R>> {
        let store = self
            .store
            .ok_or_else(|| TsError::Config("byte store cannot be empty".into()))?;
        let buffer_packets = self
            .buffer_packets
            .unwrap_or_else(config::get_buffer_packets);
        Ok(SeekableSource::with_buffer_packets(store, buffer_packets))
    }
}
