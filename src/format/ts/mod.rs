//! # MPEG Transport Stream (TS) packet model
//!
//! Fixed 188-byte transport packets: header decoding, adaptation field and
//! PCR extraction, and the continuity counter rewrite used when splicing.
//!
//! ## Example Usage
//!
//! ```rust
//! use tsplice::format::ts::{AdaptationField, TSHeader, TsPacket, TS_PACKET_SIZE};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let header = TSHeader { pid: 256, ..Default::default() };
//! let mut packet = TsPacket::compose(&header, Some(&AdaptationField::with_pcr(27_000_000, true)), &[0u8; 10])?;
//! assert_eq!(packet.as_bytes().len(), TS_PACKET_SIZE);
//! assert!(packet.is_random_access_pcr());
//!
//! packet.set_continuity_counter(5);
//! assert_eq!(packet.continuity_counter(), 5);
//! # Ok(())
//! # }
//! ```

/// Parsed transport packet
pub mod packet;

/// Low-level TS packet parsing utilities
pub mod parser;

/// Core TS types and constants
pub mod types;

#[cfg(test)]
pub(crate) mod tests;

pub use packet::TsPacket;
pub use parser::TSPacketParser;
pub use types::{
    duration_to_pcr,
    format_pcr,
    pcr_to_duration,
    AdaptationField,
    TSHeader,
    PCR_HZ,
    PID_NULL,
    TS_PACKET_SIZE,
    TS_SYNC_BYTE,
};
