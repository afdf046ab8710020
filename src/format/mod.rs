/// MPEG transport stream packets
pub mod ts;

pub use self::ts::{TSPacketParser, TsPacket};
