//! Packet fixtures shared by the unit tests.

use super::*;

/// Payload-bearing packet without adaptation field.
pub(crate) fn packet(pid: u16, counter: u8) -> TsPacket {
    let header = TSHeader {
        pid,
        continuity_counter: counter,
        ..Default::default()
    };
    TsPacket::compose(&header, None, &[pid as u8; 16]).unwrap()
}

/// Random access point carrying a PCR.
pub(crate) fn rap_packet(pid: u16, counter: u8, pcr: u64) -> TsPacket {
    let header = TSHeader {
        pid,
        continuity_counter: counter,
        payload_unit_start: true,
        ..Default::default()
    };
    TsPacket::compose(
        &header,
        Some(&AdaptationField::with_pcr(pcr, true)),
        &[0xAB; 8],
    )
    .unwrap()
}

/// Packet carrying a PCR without the random access flag.
pub(crate) fn pcr_packet(pid: u16, counter: u8, pcr: u64) -> TsPacket {
    let header = TSHeader {
        pid,
        continuity_counter: counter,
        ..Default::default()
    };
    TsPacket::compose(
        &header,
        Some(&AdaptationField::with_pcr(pcr, false)),
        &[0xCD; 8],
    )
    .unwrap()
}

/// A recording of `count` packets on PID 0x100 with a random access PCR
/// packet every `gop` packets; PCR advances by `step` per GOP.
pub(crate) fn recording(count: usize, gop: usize, step: u64) -> Vec<TsPacket> {
    (0..count)
        .map(|i| {
            let counter = (i % 16) as u8;
            if i % gop == 0 {
                rap_packet(0x100, counter, (i / gop) as u64 * step)
            } else {
                packet(0x100, counter)
            }
        })
        .collect()
}

pub(crate) fn to_bytes(packets: &[TsPacket]) -> Vec<u8> {
    packets.iter().flat_map(|p| p.as_bytes().to_vec()).collect()
}

#[test]
fn test_recording_fixture() {
    let packets = recording(10, 5, 1000);
    assert_eq!(to_bytes(&packets).len(), 10 * TS_PACKET_SIZE);
    assert_eq!(packets[5].pcr(), Some(1000));
    assert!(packets[5].is_random_access_pcr());
    assert!(!packets[6].is_random_access());
}
