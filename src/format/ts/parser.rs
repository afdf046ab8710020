use super::types::*;
use crate::error::{Result, TsError};

/// Stateless codec for single 188-byte transport packets.
#[derive(Debug, Default, Clone, Copy)]
pub struct TSPacketParser;

impl TSPacketParser {
    /// Creates a parser.
    pub fn new() -> Self {
        Self
    }

    /// Decodes the 4-byte header, checking the sync byte.
    pub fn parse_header(&self, data: &[u8]) -> Result<TSHeader> {
        if data.len() < TS_HEADER_SIZE {
            return Err(TsError::InvalidData("TS packet too short".into()));
        }

        if data[0] != TS_SYNC_BYTE {
            return Err(TsError::InvalidData("Invalid sync byte".into()));
        }

        Ok(TSHeader {
            sync_byte: data[0],
            transport_error: (data[1] & 0x80) != 0,
            payload_unit_start: (data[1] & 0x40) != 0,
            transport_priority: (data[1] & 0x20) != 0,
            pid: (((data[1] & 0x1F) as u16) << 8) | data[2] as u16,
            scrambling_control: (data[3] >> 6) & 0x03,
            adaptation_field_exists: (data[3] & 0x20) != 0,
            contains_payload: (data[3] & 0x10) != 0,
            continuity_counter: data[3] & 0x0F,
        })
    }

    /// Decodes the adaptation field starting at `offset`. A zero length field yields `None`.
    pub fn parse_adaptation_field(
        &self,
        data: &[u8],
        offset: usize,
    ) -> Result<Option<AdaptationField>> {
        if data.len() <= offset {
            return Err(TsError::InvalidData("Adaptation field missing".into()));
        }

        let adaptation_field_length = data[offset] as usize;
        if adaptation_field_length == 0 {
            return Ok(None);
        }

        let end = offset + 1 + adaptation_field_length;
        if data.len() < end {
            return Err(TsError::InvalidData("Adaptation field too short".into()));
        }

        let flags = data[offset + 1];
        let mut field = AdaptationField {
            length: adaptation_field_length,
            discontinuity: (flags & 0x80) != 0,
            random_access: (flags & 0x40) != 0,
            es_priority: (flags & 0x20) != 0,
            pcr_flag: (flags & 0x10) != 0,
            opcr_flag: (flags & 0x08) != 0,
            splicing_point_flag: (flags & 0x04) != 0,
            private_data_flag: (flags & 0x02) != 0,
            extension_flag: (flags & 0x01) != 0,
            pcr: None,
            opcr: None,
            splice_countdown: None,
            private_data: None,
        };

        let mut pos = offset + 2;

        if field.pcr_flag {
            if end < pos + 6 {
                return Err(TsError::InvalidData("PCR data too short".into()));
            }
            field.pcr = Some(read_clock(&data[pos..pos + 6]));
            pos += 6;
        }

        if field.opcr_flag {
            if end < pos + 6 {
                return Err(TsError::InvalidData("OPCR data too short".into()));
            }
            field.opcr = Some(read_clock(&data[pos..pos + 6]));
            pos += 6;
        }

        if field.splicing_point_flag {
            if end < pos + 1 {
                return Err(TsError::InvalidData("Splice countdown too short".into()));
            }
            field.splice_countdown = Some(data[pos] as i8);
            pos += 1;
        }

        if field.private_data_flag {
            if end < pos + 1 {
                return Err(TsError::InvalidData(
                    "Private data length byte missing".into(),
                ));
            }
            let private_data_length = data[pos] as usize;
            pos += 1;
            if end < pos + private_data_length {
                return Err(TsError::InvalidData("Private data too short".into()));
            }
            field.private_data = Some(data[pos..pos + private_data_length].to_vec());
        }
        Ok(Some(field))
    }

    /// Parses header and adaptation field of a full packet, returning them with the payload offset.
    pub fn parse(&self, data: &[u8]) -> Result<(TSHeader, Option<AdaptationField>, usize)> {
        if data.len() != TS_PACKET_SIZE {
            return Err(TsError::Parser(format!(
                "expected {} bytes, got {}",
                TS_PACKET_SIZE,
                data.len()
            )));
        }

        let header = self.parse_header(data)?;
        if !header.adaptation_field_exists && !header.contains_payload {
            return Err(TsError::Parser(format!(
                "packet on PID {} has neither adaptation field nor payload",
                header.pid
            )));
        }

        let mut payload_offset = TS_HEADER_SIZE;
        let mut adaptation = None;
        if header.adaptation_field_exists {
            let length = data[TS_HEADER_SIZE] as usize;
            // 183 is the most the field can take; a payload needs at least one byte after it
            let limit = if header.contains_payload { 182 } else { 183 };
            if length > limit {
                return Err(TsError::Parser(format!(
                    "adaptation field length {} exceeds {}",
                    length, limit
                )));
            }
            adaptation = self.parse_adaptation_field(data, TS_HEADER_SIZE)?;
            payload_offset += length + 1;
        }

        Ok((header, adaptation, payload_offset))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;

    #[test]
    fn test_parse_ts_header() {
        let parser = TSPacketParser::new();
        let data = [
            0x47, // Sync byte
            0x40, // Payload unit start indicator set
            0x00, // PID (high bits)
            0x10, // Continuity counter
        ];

        let header = parser.parse_header(&data).unwrap();
        assert_eq!(header.sync_byte, 0x47);
        assert!(header.payload_unit_start);
        assert_eq!(header.pid, 0);
        assert_eq!(header.continuity_counter, 0x10 & 0x0F);
    }

    #[test]
    fn test_parse_rejects_bad_sync() {
        let parser = TSPacketParser::new();
        let mut data = vec![0xFFu8; TS_PACKET_SIZE];
        data[0] = 0x48;
        assert!(parser.parse(&data).is_err());
        assert!(parser.parse(&data[..100]).is_err());
    }

    #[test]
    fn test_parse_adaptation_with_pcr() {
        let parser = TSPacketParser::new();
        let mut buf = BytesMut::new();
        TSHeader {
            pid: 0x100,
            adaptation_field_exists: true,
            continuity_counter: 7,
            ..Default::default()
        }
        .write_to(&mut buf)
        .unwrap();
        AdaptationField::with_pcr(1_234_567, true)
            .write_to(&mut buf, 0)
            .unwrap();
        buf.resize(TS_PACKET_SIZE, 0xFF);

        let (header, adaptation, payload_offset) = parser.parse(&buf).unwrap();
        assert_eq!(header.pid, 0x100);
        assert_eq!(header.continuity_counter, 7);
        let adaptation = adaptation.unwrap();
        assert!(adaptation.random_access);
        assert!(adaptation.pcr_flag);
        assert_eq!(adaptation.pcr, Some(1_234_567));
        assert_eq!(payload_offset, TS_HEADER_SIZE + 8);
    }

    #[test]
    fn test_parse_rejects_oversized_adaptation() {
        let parser = TSPacketParser::new();
        let mut data = vec![0xFFu8; TS_PACKET_SIZE];
        data[0] = TS_SYNC_BYTE;
        data[1] = 0x01;
        data[2] = 0x00;
        data[3] = 0x30; // adaptation + payload
        data[4] = 183;
        assert!(parser.parse(&data).is_err());
    }
}
