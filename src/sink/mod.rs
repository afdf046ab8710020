//! Packet sinks at the transport boundary.
//!
//! A sink accepts packets in delivery order. Calls may block on I/O and are
//! never made concurrently, which `&mut self` enforces.

use crate::error::{Result, TsError};
use crate::format::ts::{format_pcr, TsPacket};
use crate::source::Source;
use async_trait::async_trait;
use log::{debug, info};
use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter};

/// Consumer of delivered packets.
#[async_trait]
pub trait Sink: Send {
    /// Hands over the next packet in delivery order.
    async fn send(&mut self, packet: &TsPacket) -> Result<()>;
    /// Flushes and releases the sink. Closing twice is a no-op.
    async fn close(&mut self) -> Result<()>;
}

/// Drains `source` into `sink` until end of stream, then closes both.
/// Returns the number of packets sent.
pub async fn pump<S: Source + ?Sized, K: Sink + ?Sized>(source: &mut S, sink: &mut K) -> Result<u64> {
    let mut count = 0u64;
    let result = async {
        while let Some(packet) = source.next_packet().await? {
            sink.send(&packet).await?;
            count += 1;
        }
        Ok::<_, TsError>(())
    }
    .await;

    let closed_source = source.close().await;
    let closed_sink = sink.close().await;
    result?;
    closed_source?;
    closed_sink?;
    debug!("Pumped {} packets", count);
    Ok(count)
}

/// Writes raw 188-byte packets to any tokio writer: a file, a socket, stdout.
pub struct WriterSink<W: AsyncWrite + Unpin + Send> {
    writer: BufWriter<W>,
    closed: bool,
}

impl<W: AsyncWrite + Unpin + Send> WriterSink<W> {
    /// Wraps `writer` in a buffered writer.
    pub fn new(writer: W) -> Self {
        Self {
            writer: BufWriter::new(writer),
            closed: false,
        }
    }

    /// Returns the writer. Buffered bytes not yet flushed are lost.
    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

#[async_trait]
impl<W: AsyncWrite + Unpin + Send> Sink for WriterSink<W> {
    async fn send(&mut self, packet: &TsPacket) -> Result<()> {
        if self.closed {
            return Err(TsError::Closed);
        }
        self.writer.write_all(packet.as_bytes()).await?;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.writer.flush().await?;
        self.writer.shutdown().await?;
        Ok(())
    }
}

/// Collects packets in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    packets: Vec<TsPacket>,
    closed: bool,
}

impl MemorySink {
    /// Empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Packets received so far.
    pub fn packets(&self) -> &[TsPacket] {
        &self.packets
    }

    /// Consumes the sink into the received packets.
    pub fn into_packets(self) -> Vec<TsPacket> {
        self.packets
    }

    /// True once `close` was called.
    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

#[async_trait]
impl Sink for MemorySink {
    async fn send(&mut self, packet: &TsPacket) -> Result<()> {
        if self.closed {
            return Err(TsError::Closed);
        }
        self.packets.push(packet.clone());
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.closed = true;
        Ok(())
    }
}

/// Logs every PCR passing through, then forwards to the inner sink.
pub struct PcrDebugSink<S: Sink> {
    inner: S,
}

impl<S: Sink> PcrDebugSink<S> {
    /// Logs PCRs in front of `inner`.
    pub fn new(inner: S) -> Self {
        Self { inner }
    }

    /// Returns the wrapped sink.
    pub fn into_inner(self) -> S {
        self.inner
    }
}

#[async_trait]
impl<S: Sink> Sink for PcrDebugSink<S> {
    async fn send(&mut self, packet: &TsPacket) -> Result<()> {
        if let Some(pcr) = packet.pcr() {
            info!(
                "PID {:#06x} PCR {}{}",
                packet.pid(),
                format_pcr(pcr),
                if packet.is_random_access() { " (RAP)" } else { "" }
            );
        }
        self.inner.send(packet).await
    }

    async fn close(&mut self) -> Result<()> {
        self.inner.close().await
    }
}
