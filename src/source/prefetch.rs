use super::framer::Framer;
use crate::error::{Result, TsError};
use crate::format::ts::TsPacket;
use log::warn;
use std::io::Read;
use tokio::task::{self, JoinHandle};

/// A blocking packet producer, driven from a blocking worker thread.
pub trait PacketProducer: Send + 'static {
    /// Produces the next packet, `None` at end of stream.
    fn produce(&mut self) -> Result<Option<TsPacket>>;

    /// Releases whatever the producer reads from.
    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

impl<R: Read + Send + 'static> PacketProducer for Framer<R> {
    fn produce(&mut self) -> Result<Option<TsPacket>> {
        self.next_packet()
    }

    fn close(&mut self) -> Result<()> {
        Framer::close(self);
        Ok(())
    }
}

type Produced<P> = (P, Result<Option<TsPacket>>);

enum Slot<P> {
    Idle(P),
    Pending(JoinHandle<Produced<P>>),
}

/// One-packet-ahead readahead over a [`PacketProducer`].
///
/// After every packet handed out, production of the following one starts on
/// the blocking pool; the next pull joins that job. The producer itself moves
/// into the job and comes back with its result, so there is never more than
/// one job in flight and the producer is never touched concurrently. Errors
/// raised by the job surface on the pull that joins it.
pub struct Prefetch<P: PacketProducer> {
    slot: Option<Slot<P>>,
}

impl<P: PacketProducer> Prefetch<P> {
    /// Wraps `producer`. Nothing is produced until the first pull.
    pub fn new(producer: P) -> Self {
        Self {
            slot: Some(Slot::Idle(producer)),
        }
    }

    /// Returns the next packet and starts producing the one after it.
    pub async fn next(&mut self) -> Result<Option<TsPacket>> {
        let (producer, result) = match self.slot.take() {
            Some(Slot::Idle(producer)) => Self::produce(producer).await?,
            Some(Slot::Pending(handle)) => handle.await?,
            None => return Err(TsError::Closed),
        };

        match result {
            Ok(Some(packet)) => {
                self.slot = Some(Slot::Pending(Self::spawn(producer)));
                Ok(Some(packet))
            }
            other => {
                self.slot = Some(Slot::Idle(producer));
                other
            }
        }
    }

    /// Runs `f` against the producer on the blocking pool, discarding any
    /// packet produced ahead.
    pub async fn with_producer<F, T>(&mut self, f: F) -> Result<T>
    where
        F: FnOnce(&mut P) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let mut producer = self.take_producer().await?;
        let (producer, out) = task::spawn_blocking(move || {
            let out = f(&mut producer);
            (producer, out)
        })
        .await?;
        self.slot = Some(Slot::Idle(producer));
        out
    }

    /// Cancels or joins the in-flight job and closes the producer.
    /// Closing twice is a no-op.
    pub async fn close(&mut self) -> Result<()> {
        let mut producer = match self.slot.take() {
            Some(Slot::Idle(producer)) => producer,
            Some(Slot::Pending(handle)) => {
                handle.abort();
                match handle.await {
                    Ok((producer, _)) => producer,
                    // Aborted before it ran: the producer was dropped with the task
                    Err(e) if e.is_cancelled() => return Ok(()),
                    Err(e) => return Err(e.into()),
                }
            }
            None => return Ok(()),
        };
        task::spawn_blocking(move || producer.close()).await?
    }

    /// True once `close` was called.
    pub fn is_closed(&self) -> bool {
        self.slot.is_none()
    }

    async fn take_producer(&mut self) -> Result<P> {
        match self.slot.take() {
            Some(Slot::Idle(producer)) => Ok(producer),
            Some(Slot::Pending(handle)) => {
                let (producer, discarded) = handle.await?;
                if let Err(e) = discarded {
                    warn!("Discarding prefetch error: {}", e);
                }
                Ok(producer)
            }
            None => Err(TsError::Closed),
        }
    }

    async fn produce(producer: P) -> Result<Produced<P>> {
        Ok(Self::spawn(producer).await?)
    }

    fn spawn(mut producer: P) -> JoinHandle<Produced<P>> {
        task::spawn_blocking(move || {
            let result = producer.produce();
            (producer, result)
        })
    }
}
