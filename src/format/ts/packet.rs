use super::parser::TSPacketParser;
use super::types::*;
use crate::error::{Result, TsError};
use bytes::{BufMut, Bytes, BytesMut};

/// One 188-byte transport packet together with its decoded header fields.
///
/// The raw bytes are kept alongside the decoded view; the only mutation
/// allowed is rewriting the continuity counter, which updates both.
#[derive(Debug, Clone)]
pub struct TsPacket {
    data: BytesMut,
    header: TSHeader,
    adaptation: Option<AdaptationField>,
    payload_offset: usize,
    offset: Option<u64>,
}

impl TsPacket {
    /// Parses a 188-byte slice. The first byte must be the sync byte.
    pub fn parse(data: BytesMut) -> Result<Self> {
        let (header, adaptation, payload_offset) = TSPacketParser::new().parse(&data)?;
        Ok(Self::from_parts(data, header, adaptation, payload_offset))
    }

    /// Assembles a packet from bytes already decoded by [`TSPacketParser::parse`].
    pub(crate) fn from_parts(
        data: BytesMut,
        header: TSHeader,
        adaptation: Option<AdaptationField>,
        payload_offset: usize,
    ) -> Self {
        Self {
            data,
            header,
            adaptation,
            payload_offset,
            offset: None,
        }
    }

    /// Builds a packet from its parts, stuffing the adaptation field (or
    /// padding the payload with 0xFF when there is none) up to 188 bytes.
    pub fn compose(
        header: &TSHeader,
        adaptation: Option<&AdaptationField>,
        payload: &[u8],
    ) -> Result<Self> {
        let mut header = header.clone();
        header.contains_payload = !payload.is_empty();
        header.adaptation_field_exists = adaptation.is_some();
        if !header.contains_payload && adaptation.is_none() {
            return Err(TsError::InvalidData(
                "Packet needs a payload or an adaptation field".into(),
            ));
        }

        let mut buf = BytesMut::with_capacity(TS_PACKET_SIZE);
        header.write_to(&mut buf)?;
        if let Some(adaptation) = adaptation {
            let used = TS_HEADER_SIZE + 1 + adaptation.encoded_len() + payload.len();
            if used > TS_PACKET_SIZE {
                return Err(TsError::InvalidData("Payload too large".into()));
            }
            adaptation.write_to(&mut buf, TS_PACKET_SIZE - used)?;
        } else if TS_HEADER_SIZE + payload.len() > TS_PACKET_SIZE {
            return Err(TsError::InvalidData("Payload too large".into()));
        }
        buf.put_slice(payload);
        buf.resize(TS_PACKET_SIZE, 0xFF);

        Self::parse(buf)
    }

    /// Decoded 4-byte header.
    pub fn header(&self) -> &TSHeader {
        &self.header
    }

    /// Packet identifier.
    pub fn pid(&self) -> u16 {
        self.header.pid
    }

    /// 4-bit continuity counter.
    pub fn continuity_counter(&self) -> u8 {
        self.header.continuity_counter
    }

    /// Rewrites the 4-bit continuity counter in place.
    pub fn set_continuity_counter(&mut self, counter: u8) {
        let counter = counter & 0x0f;
        self.header.continuity_counter = counter;
        self.data[3] = (self.data[3] & 0xf0) | counter;
    }

    /// Whether the header announces a payload.
    pub fn has_payload(&self) -> bool {
        self.header.contains_payload
    }

    /// Payload bytes after header and adaptation field, empty when absent.
    pub fn payload(&self) -> &[u8] {
        if self.header.contains_payload {
            &self.data[self.payload_offset..]
        } else {
            &[]
        }
    }

    /// Decoded adaptation field, if any.
    pub fn adaptation_field(&self) -> Option<&AdaptationField> {
        self.adaptation.as_ref()
    }

    /// PCR in 27 MHz ticks, when the adaptation field carries one.
    pub fn pcr(&self) -> Option<u64> {
        self.adaptation
            .as_ref()
            .filter(|a| a.pcr_flag)
            .and_then(|a| a.pcr)
    }

    /// Whether the random access indicator is set.
    pub fn is_random_access(&self) -> bool {
        self.adaptation.as_ref().is_some_and(|a| a.random_access)
    }

    /// Random access point that also carries a PCR: the only packets usable
    /// as splice and seek points.
    pub fn is_random_access_pcr(&self) -> bool {
        self.is_random_access() && self.pcr().is_some()
    }

    /// Byte offset of this packet in the stream it was framed from.
    pub fn byte_offset(&self) -> Option<u64> {
        self.offset
    }

    pub(crate) fn set_byte_offset(&mut self, offset: u64) {
        self.offset = Some(offset);
    }

    /// The raw 188 bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Consumes the packet into its raw bytes.
    pub fn into_bytes(self) -> Bytes {
        self.data.freeze()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compose_and_rewrite_counter() {
        let header = TSHeader {
            pid: 0x101,
            continuity_counter: 3,
            ..Default::default()
        };
        let mut packet = TsPacket::compose(
            &header,
            Some(&AdaptationField::with_pcr(900_000, true)),
            &[1, 2, 3],
        )
        .unwrap();

        assert_eq!(packet.as_bytes().len(), TS_PACKET_SIZE);
        assert_eq!(packet.pid(), 0x101);
        assert_eq!(packet.pcr(), Some(900_000));
        assert!(packet.is_random_access_pcr());
        assert_eq!(packet.payload(), &[1, 2, 3]);

        packet.set_continuity_counter(0x1e);
        assert_eq!(packet.continuity_counter(), 0x0e);
        let reparsed = TsPacket::parse(BytesMut::from(packet.as_bytes())).unwrap();
        assert_eq!(reparsed.continuity_counter(), 0x0e);
        assert_eq!(reparsed.pcr(), Some(900_000));
    }

    #[test]
    fn test_compose_without_payload() {
        let packet = TsPacket::compose(
            &TSHeader::default(),
            Some(&AdaptationField::with_flags(true)),
            &[],
        )
        .unwrap();
        assert!(!packet.has_payload());
        assert!(packet.is_random_access());
        assert!(!packet.is_random_access_pcr());
        assert!(packet.payload().is_empty());

        assert!(TsPacket::compose(&TSHeader::default(), None, &[]).is_err());
    }
}
