use super::{Resettable, Source};
use crate::error::Result;
use crate::format::ts::TsPacket;
use async_trait::async_trait;

/// Replays a fixed list of packets, e.g. a pre-built slate.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    packets: Vec<TsPacket>,
    position: usize,
    closed: bool,
}

impl MemorySource {
    /// Source replaying `packets` in order.
    pub fn new(packets: Vec<TsPacket>) -> Self {
        Self {
            packets,
            position: 0,
            closed: false,
        }
    }

    /// True once `close` was called.
    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

#[async_trait]
impl Source for MemorySource {
    async fn next_packet(&mut self) -> Result<Option<TsPacket>> {
        if self.closed {
            return Ok(None);
        }
        let packet = self.packets.get(self.position).cloned();
        if packet.is_some() {
            self.position += 1;
        }
        Ok(packet)
    }

    async fn close(&mut self) -> Result<()> {
        self.closed = true;
        Ok(())
    }

    fn as_resettable(&mut self) -> Option<&mut dyn Resettable> {
        Some(self)
    }
}

#[async_trait]
impl Resettable for MemorySource {
    async fn reset(&mut self) -> Result<()> {
        self.position = 0;
        Ok(())
    }
}
