//! # Packet sources and their composition
//!
//! Everything here is pull based: a [`Source`] hands out the next transport
//! packet or `None` at end of stream. Capabilities beyond that are separate
//! traits ([`Resettable`], [`Seekable`]) which callers probe for explicitly
//! through [`Source::as_resettable`] / [`Source::as_seekable`].
//!
//! Compositions nest from the outside in:
//!
//! - [`InterruptibleSource`]: splices queued interrupts at random access points
//! - [`ProgramSource`]: plays entries end to end with optional loops, fixing continuity
//! - [`RandomSource`] / [`RangeSource`]: pick one of several sources, clip to a PCR window
//! - [`SeekableSource`] / [`ReaderSource`]: frame raw bytes into packets
//!
//! ## Example
//!
//! ```rust,no_run
//! use tsplice::source::{self, ProgramSource, Source};
//!
//! # async fn run() -> tsplice::Result<()> {
//! let mut program = ProgramSource::builder()
//!     .add_source(source::from_file("intro.ts")?)
//!     .mark("main")
//!     .add_source(source::from_file("feature.ts")?)
//!     .loops(2)
//!     .fix_continuity(true)
//!     .build()?;
//!
//! while let Some(packet) = program.next_packet().await? {
//!     println!("pid {} cc {}", packet.pid(), packet.continuity_counter());
//! }
//! program.close().await?;
//! # Ok(())
//! # }
//! ```

use crate::error::Result;
use crate::format::ts::TsPacket;
use async_trait::async_trait;
use futures::stream::{self, Stream};
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Continuity counter rewriting across source boundaries
pub mod continuity;

/// Byte stream framing onto the 188-byte packet grid
pub mod framer;

/// Splice insertion at random access points
pub mod interrupt;

/// In-memory packet source
pub mod memory;

/// One-ahead background packet production
pub mod prefetch;

/// Sequential multiplexing with loops
pub mod program;

/// Random selection between sources
pub mod random;

/// PCR window clipping
pub mod range;

/// Framed source over non-seekable readers
pub mod reader;

/// Framed source with PCR seeking
pub mod seekable;

pub use continuity::ContinuityFixer;
pub use framer::Framer;
pub use interrupt::{InterruptHandle, InterruptibleSource};
pub use memory::MemorySource;
pub use prefetch::{PacketProducer, Prefetch};
pub use program::{LoopPredicate, ProgramBuilder, ProgramSource};
pub use random::RandomSource;
pub use range::RangeSource;
pub use reader::ReaderSource;
pub use seekable::{SeekableSource, SeekableSourceBuilder};

/// A sequential producer of transport packets.
#[async_trait]
pub trait Source: Send {
    /// Returns the next packet, or `None` once the source is exhausted.
    async fn next_packet(&mut self) -> Result<Option<TsPacket>>;

    /// Releases the source. Failures of nested sources are logged, not returned.
    async fn close(&mut self) -> Result<()>;

    /// The resettable view of this source, if it can restart.
    fn as_resettable(&mut self) -> Option<&mut dyn Resettable> {
        None
    }

    /// The seekable view of this source, if it can seek by PCR.
    fn as_seekable(&mut self) -> Option<&mut dyn Seekable> {
        None
    }
}

/// A source that can restart from its beginning.
#[async_trait]
pub trait Resettable: Source {
    /// Restarts from the first packet.
    async fn reset(&mut self) -> Result<()>;
}

/// A resettable source that can position itself by PCR.
#[async_trait]
pub trait Seekable: Resettable {
    /// Positions on the random access packet whose PCR is closest to `pcr`
    /// without exceeding it.
    async fn seek(&mut self, pcr: u64) -> Result<()>;

    /// Remembers the most recently delivered random access packet.
    fn mark(&mut self);

    /// Returns to the marked random access packet.
    async fn rewind(&mut self) -> Result<()>;
}

#[async_trait]
impl<S: Source + ?Sized> Source for Box<S> {
    async fn next_packet(&mut self) -> Result<Option<TsPacket>> {
        (**self).next_packet().await
    }

    async fn close(&mut self) -> Result<()> {
        (**self).close().await
    }

    fn as_resettable(&mut self) -> Option<&mut dyn Resettable> {
        (**self).as_resettable()
    }

    fn as_seekable(&mut self) -> Option<&mut dyn Seekable> {
        (**self).as_seekable()
    }
}

/// Opens a file as a seekable source.
pub fn from_file<P: AsRef<Path>>(path: P) -> Result<SeekableSource<File>> {
    let file = File::open(path)?;
    SeekableSource::builder().store(file).build()
}

/// Frames packets from any blocking reader: pipes, sockets, stdin.
pub fn from_reader<R: Read + Send + 'static>(reader: R) -> ReaderSource<R> {
    ReaderSource::new(reader)
}

/// Adapts a source into a stream of packets ending at end of stream or at
/// the first error.
pub fn into_stream<S: Source + 'static>(source: S) -> impl Stream<Item = Result<TsPacket>> {
    stream::unfold(Some(source), |state| async move {
        let mut source = state?;
        match source.next_packet().await {
            Ok(Some(packet)) => Some((Ok(packet), Some(source))),
            Ok(None) => None,
            Err(e) => Some((Err(e), None)),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::ts::tests::packet;
    use futures::StreamExt;

    #[tokio::test]
    async fn test_into_stream() {
        let source = MemorySource::new((0..4).map(|i| packet(0x40, i)).collect());
        let counters: Vec<u8> = into_stream(source)
            .map(|p| p.unwrap().continuity_counter())
            .collect()
            .await;
        assert_eq!(counters, vec![0, 1, 2, 3]);
    }

    #[tokio::test]
    async fn test_boxed_source_keeps_capabilities() {
        let mut boxed: Box<dyn Source> = Box::new(MemorySource::new(vec![packet(0x40, 0)]));
        assert!(boxed.next_packet().await.unwrap().is_some());
        assert!(boxed.next_packet().await.unwrap().is_none());
        boxed.as_resettable().unwrap().reset().await.unwrap();
        assert!(boxed.next_packet().await.unwrap().is_some());
        assert!(boxed.as_seekable().is_none());
    }
}
