use super::Source;
use crate::error::Result;
use crate::format::ts::{format_pcr, TsPacket};
use async_trait::async_trait;
use log::{info, warn};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// Cloneable handle for queueing interrupts and requesting cancellation from
/// other tasks. Only the owning [`InterruptibleSource`] consumes the queue.
#[derive(Clone)]
pub struct InterruptHandle {
    sender: UnboundedSender<Box<dyn Source>>,
    cancel: Arc<AtomicBool>,
}

impl InterruptHandle {
    /// Queues `source` to be spliced in at the next random access point.
    /// The source is closed right away if the interruptible source is gone.
    pub async fn enqueue<S: Source + 'static>(&self, source: S) {
        if let Err(mpsc::error::SendError(mut source)) = self.sender.send(Box::new(source)) {
            warn!("Interruptible source dropped, closing interrupt");
            if let Err(e) = source.close().await {
                warn!("Error closing interrupt: {}", e);
            }
        }
    }

    /// Asks the source to end at the next random access point.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }
}

/// Wraps a primary source and splices queued interrupt sources into it, only
/// ever right before a random access packet carrying a PCR.
///
/// The primary is read one packet ahead so the splice decision can look at
/// the packet that would come next. Once an interrupt is exhausted it is
/// closed and the primary resumes with that buffered packet.
pub struct InterruptibleSource<S: Source> {
    source: S,
    lookahead: Option<TsPacket>,
    intermission: Option<Box<dyn Source>>,
    queue: VecDeque<Box<dyn Source>>,
    receiver: UnboundedReceiver<Box<dyn Source>>,
    handle: InterruptHandle,
    cancelled: bool,
}

impl<S: Source> InterruptibleSource<S> {
    /// Wraps `source` with an empty interrupt queue.
    pub fn new(source: S) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            source,
            lookahead: None,
            intermission: None,
            queue: VecDeque::new(),
            receiver,
            handle: InterruptHandle {
                sender,
                cancel: Arc::new(AtomicBool::new(false)),
            },
            cancelled: false,
        }
    }

    /// Handle for queueing interrupts and cancelling from other tasks.
    pub fn handle(&self) -> InterruptHandle {
        self.handle.clone()
    }

    /// Queues `source` to be spliced in at the next random access PCR packet.
    pub fn enqueue_interrupt<I: Source + 'static>(&mut self, source: I) {
        self.queue.push_back(Box::new(source));
    }

    /// True while an interrupt is playing or waiting for its splice point.
    pub fn is_interrupted(&mut self) -> bool {
        self.drain_channel();
        self.intermission.is_some() || !self.queue.is_empty()
    }

    /// Ends the stream at the next random access packet.
    pub fn cancel(&self) {
        self.handle.cancel();
    }

    /// True once a cancel request took effect.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    fn drain_channel(&mut self) {
        while let Ok(source) = self.receiver.try_recv() {
            self.queue.push_back(source);
        }
    }

    async fn close_quietly(mut source: Box<dyn Source>, what: &str) {
        if let Err(e) = source.close().await {
            warn!("Error closing {}: {}", what, e);
        }
    }

    async fn next_source_packet(&mut self) -> Result<Option<TsPacket>> {
        if let Some(intermission) = self.intermission.as_mut() {
            if let Some(packet) = intermission.next_packet().await? {
                return Ok(Some(packet));
            }
            if let Some(done) = self.intermission.take() {
                Self::close_quietly(done, "intermission").await;
            }
            info!("Intermission finished, resuming primary source");
        }

        if self.lookahead.is_none() {
            self.lookahead = self.source.next_packet().await?;
        }

        self.drain_channel();
        let splice_point = self
            .lookahead
            .as_ref()
            .is_some_and(|p| p.is_random_access_pcr());
        if splice_point {
            while let Some(mut next) = self.queue.pop_front() {
                match next.next_packet().await {
                    Ok(Some(packet)) => {
                        if let Some(pcr) = self.lookahead.as_ref().and_then(|p| p.pcr()) {
                            info!("Splicing interrupt at PCR {} ({})", pcr, format_pcr(pcr));
                        }
                        self.intermission = Some(next);
                        return Ok(Some(packet));
                    }
                    Ok(None) => Self::close_quietly(next, "empty interrupt").await,
                    Err(e) => {
                        Self::close_quietly(next, "failed interrupt").await;
                        return Err(e);
                    }
                }
            }
        }

        Ok(self.lookahead.take())
    }
}

#[async_trait]
impl<S: Source> Source for InterruptibleSource<S> {
    async fn next_packet(&mut self) -> Result<Option<TsPacket>> {
        if self.cancelled {
            return Ok(None);
        }
        let packet = self.next_source_packet().await?;
        if self.handle.cancel.load(Ordering::SeqCst) {
            if let Some(packet) = &packet {
                if packet.is_random_access() {
                    info!("Cancelled at random access point");
                    self.cancelled = true;
                    return Ok(None);
                }
            }
        }
        Ok(packet)
    }

    async fn close(&mut self) -> Result<()> {
        self.cancelled = true;
        self.lookahead = None;
        if let Err(e) = self.source.close().await {
            warn!("Error closing primary source: {}", e);
        }
        if let Some(intermission) = self.intermission.take() {
            Self::close_quietly(intermission, "intermission").await;
        }
        self.receiver.close();
        self.drain_channel();
        while let Some(source) = self.queue.pop_front() {
            Self::close_quietly(source, "queued interrupt").await;
        }
        Ok(())
    }
}
