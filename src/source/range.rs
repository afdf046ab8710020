use super::{Resettable, Seekable, Source};
use crate::error::Result;
use crate::format::ts::{format_pcr, TsPacket};
use async_trait::async_trait;
use log::debug;

/// Clips a seekable source to the PCR window `[start, end)`.
///
/// Playback starts at the random access packet found by seeking to `start`
/// and stops before the first random access PCR packet at or past `end`.
/// The first pull seeks on its own when `reset` was never called.
pub struct RangeSource<S: Seekable> {
    source: S,
    start_pcr: u64,
    end_pcr: u64,
    positioned: bool,
    end: bool,
}

impl<S: Seekable> RangeSource<S> {
    /// Window `[start_pcr, end_pcr)` over `source`, in 27 MHz ticks.
    pub fn new(source: S, start_pcr: u64, end_pcr: u64) -> Self {
        Self {
            source,
            start_pcr,
            end_pcr,
            positioned: false,
            end: false,
        }
    }

    /// Inclusive start of the window.
    pub fn start_pcr(&self) -> u64 {
        self.start_pcr
    }

    /// Exclusive end of the window.
    pub fn end_pcr(&self) -> u64 {
        self.end_pcr
    }

    /// Returns the wrapped source.
    pub fn into_inner(self) -> S {
        self.source
    }
}

#[async_trait]
impl<S: Seekable> Source for RangeSource<S> {
    async fn next_packet(&mut self) -> Result<Option<TsPacket>> {
        if !self.positioned {
            self.reset().await?;
        }
        if self.end {
            return Ok(None);
        }

        let Some(packet) = self.source.next_packet().await? else {
            self.end = true;
            return Ok(None);
        };
        if packet.is_random_access() {
            if let Some(pcr) = packet.pcr() {
                if pcr >= self.end_pcr {
                    debug!("Range end reached at PCR {}", format_pcr(pcr));
                    self.end = true;
                    return Ok(None);
                }
            }
        }
        Ok(Some(packet))
    }

    async fn close(&mut self) -> Result<()> {
        self.end = true;
        self.positioned = true;
        self.source.close().await
    }

    fn as_resettable(&mut self) -> Option<&mut dyn Resettable> {
        Some(self)
    }
}

#[async_trait]
impl<S: Seekable> Resettable for RangeSource<S> {
    async fn reset(&mut self) -> Result<()> {
        self.positioned = false;
        self.source.reset().await?;
        self.source.seek(self.start_pcr).await?;
        self.positioned = true;
        self.end = false;
        Ok(())
    }
}
