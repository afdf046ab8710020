use crate::error::{Result, TsError};
use bytes::{BufMut, BytesMut};
use std::time::Duration;

// Reserved PIDs
/// Null packets used for stuffing
pub const PID_NULL: u16 = 0x1fff;

// Constants
/// First byte of every transport packet
pub const TS_SYNC_BYTE: u8 = 0x47;
/// Size of a transport packet in bytes
pub const TS_PACKET_SIZE: usize = 188;
/// Size of the fixed packet header
pub const TS_HEADER_SIZE: usize = 4;
/// PCR ticks per second
pub const PCR_HZ: u64 = 27_000_000;

/// Largest value the 42-bit PCR (33-bit base * 300 + 9-bit extension) can carry.
pub const PCR_MAX: u64 = ((1u64 << 33) - 1) * 300 + 299;

/// Adaptation field of a transport packet.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AdaptationField {
    /// Length byte as read, 0 when composed
    pub length: usize,
    /// Discontinuity indicator
    pub discontinuity: bool,
    /// Random access indicator
    pub random_access: bool,
    /// Elementary stream priority indicator
    pub es_priority: bool,
    /// PCR present
    pub pcr_flag: bool,
    /// OPCR present
    pub opcr_flag: bool,
    /// Splice countdown present
    pub splicing_point_flag: bool,
    /// Transport private data present
    pub private_data_flag: bool,
    /// Adaptation field extension present (not decoded)
    pub extension_flag: bool,
    /// PCR in 27 MHz ticks
    pub pcr: Option<u64>,
    /// Original PCR in 27 MHz ticks
    pub opcr: Option<u64>,
    /// Packets left until the splicing point
    pub splice_countdown: Option<i8>,
    /// Transport private data bytes
    pub private_data: Option<Vec<u8>>,
}

impl AdaptationField {
    /// Adaptation field carrying a PCR, optionally flagged as a random access point.
    pub fn with_pcr(pcr: u64, random_access: bool) -> Self {
        Self {
            random_access,
            pcr_flag: true,
            pcr: Some(pcr),
            ..Default::default()
        }
    }

    /// Adaptation field with only the flags byte.
    pub fn with_flags(random_access: bool) -> Self {
        Self {
            random_access,
            ..Default::default()
        }
    }

    /// Bytes following the length byte, without stuffing.
    pub fn encoded_len(&self) -> usize {
        let mut n = 1;
        if self.pcr_flag {
            n += 6;
        }
        if self.opcr_flag {
            n += 6;
        }
        if self.splicing_point_flag {
            n += 1;
        }
        if self.private_data_flag {
            n += 1 + self.private_data.as_ref().map_or(0, |d| d.len());
        }
        n
    }

    /// Writes length byte, flags and optional fields, padding with `stuffing_bytes` of 0xFF.
    pub fn write_to(&self, buf: &mut BytesMut, stuffing_bytes: usize) -> Result<()> {
        let length = self.encoded_len() + stuffing_bytes;
        if length > TS_PACKET_SIZE - TS_HEADER_SIZE - 1 {
            return Err(TsError::InvalidData("Adaptation field too long".into()));
        }
        buf.put_u8(length as u8);

        let mut flags = 0u8;
        if self.discontinuity {
            flags |= 0x80;
        }
        if self.random_access {
            flags |= 0x40;
        }
        if self.es_priority {
            flags |= 0x20;
        }
        if self.pcr_flag {
            flags |= 0x10;
        }
        if self.opcr_flag {
            flags |= 0x08;
        }
        if self.splicing_point_flag {
            flags |= 0x04;
        }
        if self.private_data_flag {
            flags |= 0x02;
        }
        buf.put_u8(flags);

        if self.pcr_flag {
            write_clock(buf, self.pcr.unwrap_or(0))?;
        }
        if self.opcr_flag {
            write_clock(buf, self.opcr.unwrap_or(0))?;
        }
        if self.splicing_point_flag {
            buf.put_i8(self.splice_countdown.unwrap_or(0));
        }
        if self.private_data_flag {
            let data = self.private_data.as_deref().unwrap_or(&[]);
            buf.put_u8(data.len() as u8);
            buf.put_slice(data);
        }

        for _ in 0..stuffing_bytes {
            buf.put_u8(0xFF);
        }
        Ok(())
    }
}

fn write_clock(buf: &mut BytesMut, pcr: u64) -> Result<()> {
    if pcr > PCR_MAX {
        return Err(TsError::InvalidData(format!("PCR {} out of range", pcr)));
    }
    let base = pcr / 300;
    let ext = pcr % 300;
    let value = base << 15 | 0x3f << 9 | ext;
    buf.put_u16((value >> 32) as u16);
    buf.put_u32(value as u32);
    Ok(())
}

/// Decodes a 6-byte PCR/OPCR field into 27 MHz ticks.
pub fn read_clock(data: &[u8]) -> u64 {
    let base = ((data[0] as u64) << 25)
        | ((data[1] as u64) << 17)
        | ((data[2] as u64) << 9)
        | ((data[3] as u64) << 1)
        | ((data[4] & 0x80) as u64 >> 7);
    let ext = (((data[4] & 0x01) as u64) << 8) | (data[5] as u64);
    base * 300 + ext
}

/// Fixed 4-byte transport packet header.
#[derive(Debug, Clone, PartialEq)]
pub struct TSHeader {
    /// Always 0x47
    pub sync_byte: u8,
    /// Transport error indicator
    pub transport_error: bool,
    /// Set on the packet starting a PES packet or section
    pub payload_unit_start: bool,
    /// Transport priority
    pub transport_priority: bool,
    /// 13-bit packet identifier
    pub pid: u16,
    /// 2-bit scrambling control
    pub scrambling_control: u8,
    /// Adaptation field present
    pub adaptation_field_exists: bool,
    /// Payload present
    pub contains_payload: bool,
    /// 4-bit counter, incremented per payload-bearing packet of a PID
    pub continuity_counter: u8,
}

impl Default for TSHeader {
    fn default() -> Self {
        Self {
            sync_byte: TS_SYNC_BYTE,
            transport_error: false,
            payload_unit_start: false,
            transport_priority: false,
            pid: 0,
            scrambling_control: 0,
            adaptation_field_exists: false,
            contains_payload: true,
            continuity_counter: 0,
        }
    }
}

impl TSHeader {
    /// Appends the encoded header to `buf`.
    pub fn write_to(&self, buf: &mut BytesMut) -> Result<()> {
        buf.put_u8(self.sync_byte);

        let mut b1 = 0u8;
        if self.transport_error {
            b1 |= 0x80;
        }
        if self.payload_unit_start {
            b1 |= 0x40;
        }
        if self.transport_priority {
            b1 |= 0x20;
        }
        b1 |= ((self.pid >> 8) & 0x1f) as u8;
        buf.put_u8(b1);

        buf.put_u8((self.pid & 0xff) as u8);

        let mut b3 = self.scrambling_control << 6;
        if self.adaptation_field_exists {
            b3 |= 0x20;
        }
        if self.contains_payload {
            b3 |= 0x10;
        }
        b3 |= self.continuity_counter & 0x0f;
        buf.put_u8(b3);

        Ok(())
    }
}

// Time conversion utilities
/// Converts 27 MHz ticks to a duration.
pub fn pcr_to_duration(pcr: u64) -> Duration {
    Duration::from_nanos(((pcr as u128 * 1_000_000_000) / PCR_HZ as u128) as u64)
}

/// Converts a duration to 27 MHz ticks.
pub fn duration_to_pcr(time: Duration) -> u64 {
    (time.as_nanos() * PCR_HZ as u128 / 1_000_000_000) as u64
}

/// Formats a PCR as `H:MM:SS.mmm`.
pub fn format_pcr(pcr: u64) -> String {
    let millis = pcr_to_duration(pcr).as_millis() as u64;
    format!(
        "{}:{:02}:{:02}.{:03}",
        millis / 3_600_000,
        (millis / 60_000) % 60,
        (millis / 1000) % 60,
        millis % 1000
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_encoding() {
        for pcr in [0, 299, 300, 27_000_000, 202_500_000, PCR_MAX] {
            let mut buf = BytesMut::new();
            write_clock(&mut buf, pcr).unwrap();
            assert_eq!(buf.len(), 6);
            assert_eq!(read_clock(&buf), pcr);
        }
        let mut buf = BytesMut::new();
        assert!(write_clock(&mut buf, PCR_MAX + 1).is_err());
    }

    #[test]
    fn test_pcr_time_conversion() {
        assert_eq!(pcr_to_duration(PCR_HZ), Duration::from_secs(1));
        assert_eq!(duration_to_pcr(Duration::from_millis(1500)), 40_500_000);
        assert_eq!(format_pcr(PCR_HZ * 3723 + PCR_HZ / 2), "1:02:03.500");
    }
}
