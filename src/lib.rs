#![doc(html_root_url = "https://docs.rs/tsplice/0.1.0")]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(missing_docs)]
#![deny(rustdoc::missing_crate_level_docs)]

//! # tsplice - MPEG-TS source composition
//!
//! `tsplice` assembles continuous MPEG transport streams out of recorded
//! pieces. Sources are pulled packet by packet and composed into programs
//! that play entries back to back, loop sections, pick between alternatives
//! at random and splice interrupts in at random access points, while keeping
//! continuity counters contiguous for downstream decoders.
//!
//! ## Features
//!
//! ### Packet model
//! - 188-byte transport packet parsing and composition
//! - Adaptation field, PCR and random access indicator access
//! - In-place continuity counter rewriting
//!
//! ### Sources
//! - Framing of arbitrary byte streams with resynchronisation on garbage
//! - Background prefetch of the next packet on a blocking task
//! - Binary search seeking by PCR over seekable stores
//! - Mark and rewind to random access points
//!
//! ### Composition
//! - Sequential programs with marks, counted and conditional loops
//! - Random selection between alternatives
//! - PCR windows over seekable sources
//! - Interrupt splicing and deferred cancellation at random access points
//!
//! ## Quick Start
//!
//! Add this to your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! tsplice = "0.1.0"
//! ```
//!
//! ### Looping a program with a spliced slate
//!
//! ```rust,no_run
//! use tsplice::sink::{self, WriterSink};
//! use tsplice::source::{self, InterruptibleSource, ProgramSource, RangeSource};
//! use tsplice::format::ts::PCR_HZ;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let program = ProgramSource::builder()
//!         .add_source(RangeSource::new(source::from_file("show.ts")?, 0, 30 * PCR_HZ))
//!         .loops(3)
//!         .fix_continuity(true)
//!         .build()?;
//!
//!     let mut stream = InterruptibleSource::new(program);
//!     stream.handle().enqueue(source::from_file("slate.ts")?).await;
//!
//!     let out = tokio::fs::File::create("out.ts").await?;
//!     let sent = sink::pump(&mut stream, &mut WriterSink::new(out)).await?;
//!     println!("wrote {} packets", sent);
//!     Ok(())
//! }
//! ```
//!
//! ## Module Overview
//!
//! - `format`: transport packet model
//!   - Header and adaptation field parsing
//!   - PCR helpers
//!
//! - `source`: pull-based sources and their compositions
//!   - Framing, prefetch and seeking
//!   - Program, random, range and interruptible sources
//!   - Continuity fixing
//!
//! - `sink`: packet consumers at the transport boundary
//!
//! - `error`: Error handling types and utilities
//!   - Custom error types for different failure scenarios
//!   - Result type alias for convenience
//!
//! - `config`: process-wide defaults read from `config.toml` and the environment
//!

/// Configuration module
pub mod config;

/// Error types and utilities
pub mod error;

/// Transport stream packet model
pub mod format;

/// Packet consumers
pub mod sink;

/// Packet sources and composition
pub mod source;

pub use error::{Result, TsError};
