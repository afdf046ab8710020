use crate::error::{Result, TsError};
use crate::format::ts::{TSPacketParser, TsPacket, TS_PACKET_SIZE, TS_SYNC_BYTE};
use bytes::{Buf, BytesMut};
use log::{debug, info, warn};
use std::io::{ErrorKind, Read, Seek, SeekFrom};

/// Resynchronises a byte stream onto the 188-byte packet grid.
///
/// A sync byte is only accepted when another one follows exactly one packet
/// later (or the stream ends right there), which rejects 0x47 values found
/// inside payloads. Bytes skipped while hunting for the grid are counted and
/// logged, never treated as fatal. A slice the codec rejects costs one byte
/// and the scan goes on from there.
pub struct Framer<R> {
    reader: Option<R>,
    buffer: BytesMut,
    capacity: usize,
    /// Stream offset of `buffer[0]`
    offset: u64,
    eof: bool,
    skipped_total: u64,
    parser: TSPacketParser,
}

impl<R: Read> Framer<R> {
    /// Creates a framer reading `buffer_packets` packets per refill.
    pub fn new(reader: R, buffer_packets: usize) -> Self {
        let capacity = buffer_packets.max(2) * TS_PACKET_SIZE;
        Self {
            reader: Some(reader),
            buffer: BytesMut::with_capacity(capacity),
            capacity,
            offset: 0,
            eof: false,
            skipped_total: 0,
            parser: TSPacketParser::new(),
        }
    }

    /// Total bytes discarded while resynchronising.
    pub fn skipped_bytes(&self) -> u64 {
        self.skipped_total
    }

    /// Stream offset of the next unread byte.
    pub fn position(&self) -> u64 {
        self.offset
    }

    /// Returns the next packet, or `None` at end of stream.
    pub fn next_packet(&mut self) -> Result<Option<TsPacket>> {
        let mut skipped = 0u64;
        let packet = loop {
            if self.buffer.is_empty() && !self.refill()? {
                break None;
            }

            if self.buffer[0] != TS_SYNC_BYTE {
                self.skip(1);
                skipped += 1;
                continue;
            }

            // Confirming the marker needs one byte past the packet unless the stream ends
            if self.buffer.len() <= TS_PACKET_SIZE && !self.eof {
                self.refill()?;
                continue;
            }

            if self.buffer.len() < TS_PACKET_SIZE {
                debug!(
                    "Dropping {} trailing bytes at end of stream",
                    self.buffer.len()
                );
                let tail = self.buffer.len();
                self.skip(tail);
                break None;
            }

            if self.buffer.len() > TS_PACKET_SIZE && self.buffer[TS_PACKET_SIZE] != TS_SYNC_BYTE {
                debug!("No second marker found at offset {}", self.offset);
                self.skip(1);
                skipped += 1;
                continue;
            }

            let offset = self.offset;
            match self.parser.parse(&self.buffer[..TS_PACKET_SIZE]) {
                Ok((header, adaptation, payload_offset)) => {
                    let data = self.buffer.split_to(TS_PACKET_SIZE);
                    self.offset += TS_PACKET_SIZE as u64;
                    let mut packet = TsPacket::from_parts(data, header, adaptation, payload_offset);
                    packet.set_byte_offset(offset);
                    break Some(packet);
                }
                Err(e) => {
                    warn!("Error parsing packet at offset {}: {}", offset, e);
                    self.skip(1);
                    skipped += 1;
                }
            }
        };

        if skipped > 0 {
            info!("Skipped {} bytes looking for TS marker", skipped);
            self.skipped_total += skipped;
        }
        Ok(packet)
    }

    fn skip(&mut self, n: usize) {
        self.buffer.advance(n);
        self.offset += n as u64;
    }

    /// Compacts the buffer and reads more data behind the retained tail.
    /// Returns false once the reader is exhausted.
    fn refill(&mut self) -> Result<bool> {
        if self.eof {
            return Ok(false);
        }
        let reader = self.reader.as_mut().ok_or(TsError::Closed)?;

        let start = self.buffer.len();
        let target = self.capacity.max(start + TS_PACKET_SIZE + 1);
        // reserve() reclaims consumed space in place when the allocation is unshared
        self.buffer.reserve(target - start);
        self.buffer.resize(target, 0);

        let read = loop {
            match reader.read(&mut self.buffer[start..]) {
                Ok(n) => break n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    self.buffer.truncate(start);
                    return Err(e.into());
                }
            }
        };
        self.buffer.truncate(start + read);

        if read == 0 {
            self.eof = true;
            return Ok(false);
        }
        Ok(true)
    }

    /// Releases the underlying reader. Later calls are no-ops.
    pub fn close(&mut self) {
        if self.reader.take().is_some() {
            debug!("Closed byte source at offset {}", self.offset);
        }
        self.buffer.clear();
        self.eof = true;
    }
}

impl<R: Read + Seek> Framer<R> {
    /// Drops buffered data and continues framing from `offset`.
    pub fn reposition(&mut self, offset: u64) -> Result<()> {
        let reader = self.reader.as_mut().ok_or(TsError::Closed)?;
        reader.seek(SeekFrom::Start(offset))?;
        self.buffer.clear();
        self.offset = offset;
        self.eof = false;
        Ok(())
    }

    /// Total size of the underlying store in bytes.
    pub fn store_size(&mut self) -> Result<u64> {
        let reader = self.reader.as_mut().ok_or(TsError::Closed)?;
        let current = reader.stream_position()?;
        let size = reader.seek(SeekFrom::End(0))?;
        reader.seek(SeekFrom::Start(current))?;
        Ok(size)
    }

    /// Frames forward from `offset` to the first random access packet
    /// carrying a PCR, returning its offset and PCR.
    fn scan_random_access(&mut self, offset: u64) -> Result<Option<(u64, u64)>> {
        self.reposition(offset)?;
        while let Some(packet) = self.next_packet()? {
            if !packet.is_random_access() {
                continue;
            }
            if let Some(pcr) = packet.pcr() {
                return Ok(Some((packet.byte_offset().unwrap_or(offset), pcr)));
            }
        }
        Ok(None)
    }

    /// Binary search over byte offsets for the random access packet whose PCR
    /// is the largest value not exceeding `target`, leaving the framer
    /// positioned on it.
    ///
    /// A target before the first random access packet positions at the start
    /// of the store. A store without any random access PCR packet is rewound
    /// to the start and reported as [`TsError::SeekNotFound`].
    pub fn seek_pcr(&mut self, target: u64) -> Result<()> {
        let stride = TS_PACKET_SIZE as u64;
        let size = self.store_size()?;

        let mut min_pos = 0u64;
        let mut max_pos = size - size % stride;
        let mut best: Option<u64> = None;
        let mut found_any = false;
        let mut last_probe: Option<u64> = None;

        loop {
            // Packets may sit off the stride grid, so the window starts at
            // the grid line at or below `min_pos`
            let low = min_pos - min_pos % stride;
            if low >= max_pos {
                break;
            }
            let mid = low + (max_pos - low) / 2;
            let probe = (mid - mid % stride).max(low);
            if last_probe == Some(probe) {
                debug!("Seek probe repeated at offset {}, stopping", probe);
                break;
            }
            last_probe = Some(probe);

            match self.scan_random_access(probe)? {
                Some((offset, pcr)) => {
                    found_any = true;
                    if pcr == target {
                        debug!("Found exact PCR {} at offset {}", pcr, offset);
                        return self.reposition(offset);
                    }
                    if pcr < target && offset < max_pos {
                        best = Some(offset);
                        min_pos = offset + stride;
                    } else {
                        // No usable random access point in [probe, max_pos)
                        max_pos = probe;
                    }
                }
                None => max_pos = probe,
            }
        }

        match best {
            Some(offset) => {
                debug!("Seek for PCR {} settled at offset {}", target, offset);
                self.reposition(offset)
            }
            None => {
                self.reposition(0)?;
                if found_any {
                    Ok(())
                } else {
                    Err(TsError::SeekNotFound(target))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::ts::tests::{packet, rap_packet, recording, to_bytes};
    use pretty_assertions::assert_eq;
    use quickcheck_macros::quickcheck;
    use std::io::Cursor;

    fn drain<R: Read>(framer: &mut Framer<R>) -> Vec<TsPacket> {
        let mut out = Vec::new();
        while let Some(p) = framer.next_packet().unwrap() {
            out.push(p);
        }
        out
    }

    #[test]
    fn test_frames_aligned_stream() {
        let packets = recording(25, 5, 1000);
        let mut framer = Framer::new(Cursor::new(to_bytes(&packets)), 4);
        let framed = drain(&mut framer);
        assert_eq!(framed.len(), 25);
        assert_eq!(framer.skipped_bytes(), 0);
        for (i, p) in framed.iter().enumerate() {
            assert_eq!(p.as_bytes(), packets[i].as_bytes());
            assert_eq!(p.byte_offset(), Some((i * TS_PACKET_SIZE) as u64));
        }
        assert!(framer.next_packet().unwrap().is_none());
    }

    #[test]
    fn test_rejects_false_marker_in_garbage() {
        let mut data = vec![0x00, 0x47, 0x12, 0x47, 0x99];
        data.extend(to_bytes(&[packet(0x20, 0), packet(0x20, 1)]));
        let mut framer = Framer::new(Cursor::new(data), 2);
        let framed = drain(&mut framer);
        assert_eq!(framed.len(), 2);
        assert_eq!(framer.skipped_bytes(), 5);
        assert_eq!(framed[0].byte_offset(), Some(5));
    }

    #[test]
    fn test_drops_partial_tail() {
        let mut data = to_bytes(&[packet(0x20, 0), packet(0x20, 1)]);
        data.extend_from_slice(&to_bytes(&[packet(0x20, 2)])[..100]);
        let mut framer = Framer::new(Cursor::new(data), 1000);
        assert_eq!(drain(&mut framer).len(), 2);
    }

    #[test]
    fn test_skips_unparseable_slice() {
        let mut bad = to_bytes(&[packet(0x20, 0)]);
        bad[3] = 0x00; // neither payload nor adaptation field
        let mut data = bad;
        data.extend(to_bytes(&[packet(0x20, 1)]));
        let mut framer = Framer::new(Cursor::new(data), 3);
        let framed = drain(&mut framer);
        assert_eq!(framed.len(), 1);
        assert_eq!(framed[0].continuity_counter(), 1);
        assert_eq!(framed[0].byte_offset(), Some(TS_PACKET_SIZE as u64));
        assert_eq!(framer.skipped_bytes(), TS_PACKET_SIZE as u64);
    }

    #[test]
    fn test_close_releases_reader() {
        let mut framer = Framer::new(Cursor::new(to_bytes(&recording(3, 1, 10))), 1);
        framer.close();
        framer.close();
        assert!(framer.next_packet().unwrap().is_none());
        assert!(matches!(framer.reposition(0), Err(TsError::Closed)));
    }

    #[test]
    fn test_seek_exact_and_between() {
        // RAP every 5 packets, PCR 0, 1000, 2000, ...
        let packets = recording(200, 5, 1000);
        let mut framer = Framer::new(Cursor::new(to_bytes(&packets)), 8);

        framer.seek_pcr(17_000).unwrap();
        let p = framer.next_packet().unwrap().unwrap();
        assert_eq!(p.pcr(), Some(17_000));
        assert_eq!(p.byte_offset(), Some(85 * TS_PACKET_SIZE as u64));

        framer.seek_pcr(17_500).unwrap();
        assert_eq!(framer.next_packet().unwrap().unwrap().pcr(), Some(17_000));

        framer.seek_pcr(1_000_000).unwrap();
        assert_eq!(framer.next_packet().unwrap().unwrap().pcr(), Some(39_000));
    }

    #[test]
    fn test_seek_before_first_random_access() {
        let mut packets = vec![packet(0x100, 0), packet(0x100, 1)];
        packets.push(rap_packet(0x100, 2, 5000));
        packets.push(packet(0x100, 3));
        let mut framer = Framer::new(Cursor::new(to_bytes(&packets)), 8);
        framer.seek_pcr(10).unwrap();
        assert_eq!(framer.position(), 0);
    }

    #[test]
    fn test_seek_without_random_access_fails() {
        let packets: Vec<_> = (0..20).map(|i| packet(0x100, i % 16)).collect();
        let mut framer = Framer::new(Cursor::new(to_bytes(&packets)), 8);
        assert!(matches!(
            framer.seek_pcr(1000),
            Err(TsError::SeekNotFound(1000))
        ));
        assert_eq!(framer.position(), 0);
        assert_eq!(drain(&mut framer).len(), 20);
    }

    #[quickcheck]
    fn prop_resyncs_after_garbage(garbage: Vec<u8>, count: u8) -> bool {
        let garbage: Vec<u8> = garbage
            .into_iter()
            .take(TS_PACKET_SIZE - 1)
            .map(|b| if b == TS_SYNC_BYTE { 0 } else { b })
            .collect();
        let count = (count % 20) as usize + 1;
        let packets = recording(count, 4, 90);

        let mut data = garbage.clone();
        data.extend(to_bytes(&packets));
        let mut framer = Framer::new(Cursor::new(data), 3);
        let framed = drain(&mut framer);

        framer.skipped_bytes() == garbage.len() as u64
            && framed.len() == packets.len()
            && framed
                .iter()
                .zip(&packets)
                .all(|(a, b)| a.as_bytes() == b.as_bytes())
    }

    #[test]
    fn test_seek_off_grid_recording() {
        // Leading bytes push every packet off the 188-byte grid
        for prefix in [1usize, 5, 50, 100, 187] {
            let mut data = vec![0u8; prefix];
            data.extend(to_bytes(&recording(30, 1, 1000)));
            let mut framer = Framer::new(Cursor::new(data), 4);
            for k in 0..30u64 {
                framer.seek_pcr(k * 1000 + 500).unwrap();
                let p = framer.next_packet().unwrap().unwrap();
                assert_eq!(p.pcr(), Some(k * 1000), "prefix {} target {}", prefix, k);
                assert_eq!(p.byte_offset(), Some(prefix as u64 + k * TS_PACKET_SIZE as u64));
            }
        }
    }

    #[quickcheck]
    fn prop_seek_lands_on_closest_preceding_pcr(gops: u8, target: u32, prefix: u8) -> bool {
        let gops = (gops % 40) as usize + 1;
        let gop = 3;
        let step = 1000u64;
        let packets = recording(gops * gop, gop, step);
        let last_pcr = (gops as u64 - 1) * step;
        let target = target as u64 % (last_pcr + step);

        let mut data = vec![0u8; prefix as usize % TS_PACKET_SIZE];
        data.extend(to_bytes(&packets));
        let mut framer = Framer::new(Cursor::new(data), 5);
        if framer.seek_pcr(target).is_err() {
            return false;
        }
        match framer.next_packet() {
            Ok(Some(p)) => p.pcr() == Some(target / step * step),
            _ => false,
        }
    }
}
