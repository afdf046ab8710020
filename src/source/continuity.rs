use crate::format::ts::{TsPacket, PID_NULL};
use log::debug;
use std::collections::hash_map::Entry;
use std::collections::HashMap;

/// Rewrites continuity counters so every PID counts contiguously, even when
/// packets of that PID come from several independently recorded sources.
///
/// The first packet seen on a PID seeds its counter unchanged. Every later
/// payload-bearing packet gets `last + 1 (mod 16)`; adaptation-only packets
/// repeat `last`, as the counter only advances with payload.
#[derive(Debug, Default)]
pub struct ContinuityFixer {
    last: HashMap<u16, u8>,
    splices: usize,
}

impl ContinuityFixer {
    /// Fixer with no PID seen yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rewrites the packet's counter to continue its PID's sequence.
    pub fn fix_continuity(&mut self, packet: &mut TsPacket) {
        let pid = packet.pid();
        if pid == PID_NULL {
            return;
        }

        match self.last.entry(pid) {
            Entry::Vacant(entry) => {
                entry.insert(packet.continuity_counter());
            }
            Entry::Occupied(mut entry) => {
                let last = *entry.get();
                let expected = if packet.has_payload() {
                    (last + 1) & 0x0f
                } else {
                    last
                };
                if packet.continuity_counter() != expected {
                    packet.set_continuity_counter(expected);
                }
                entry.insert(expected);
            }
        }
    }

    /// Source boundary. PID state is kept so counters run on across the cut.
    pub fn next_source(&mut self) {
        self.splices += 1;
        debug!(
            "Continuity carried over {} PIDs at splice #{}",
            self.last.len(),
            self.splices
        );
    }

    /// Number of source boundaries seen.
    pub fn splices(&self) -> usize {
        self.splices
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::ts::tests::packet;
    use crate::format::ts::{AdaptationField, TSHeader};

    fn fix_all(fixer: &mut ContinuityFixer, packets: Vec<TsPacket>) -> Vec<u8> {
        packets
            .into_iter()
            .map(|mut p| {
                fixer.fix_continuity(&mut p);
                p.continuity_counter()
            })
            .collect()
    }

    #[test]
    fn test_contiguous_across_splice() {
        let mut fixer = ContinuityFixer::new();
        let first: Vec<_> = (10..16).map(|cc| packet(0x100, cc)).collect();
        assert_eq!(fix_all(&mut fixer, first), vec![10, 11, 12, 13, 14, 15]);

        fixer.next_source();
        let second: Vec<_> = (4..8).map(|cc| packet(0x100, cc)).collect();
        assert_eq!(fix_all(&mut fixer, second), vec![0, 1, 2, 3]);
        assert_eq!(fixer.splices(), 1);
    }

    #[test]
    fn test_new_pid_seeds_independently() {
        let mut fixer = ContinuityFixer::new();
        fix_all(&mut fixer, vec![packet(0x100, 3)]);
        fixer.next_source();
        assert_eq!(
            fix_all(&mut fixer, vec![packet(0x200, 9), packet(0x100, 0), packet(0x200, 2)]),
            vec![9, 4, 10]
        );
    }

    #[test]
    fn test_adaptation_only_repeats_counter() {
        let mut fixer = ContinuityFixer::new();
        let no_payload = TsPacket::compose(
            &TSHeader {
                pid: 0x100,
                ..Default::default()
            },
            Some(&AdaptationField::with_pcr(0, false)),
            &[],
        )
        .unwrap();
        assert_eq!(
            fix_all(&mut fixer, vec![packet(0x100, 7), no_payload, packet(0x100, 1)]),
            vec![7, 7, 8]
        );
    }

    #[test]
    fn test_null_packets_untouched() {
        let mut fixer = ContinuityFixer::new();
        assert_eq!(
            fix_all(&mut fixer, vec![packet(PID_NULL, 5), packet(PID_NULL, 5)]),
            vec![5, 5]
        );
    }
}
