use super::{Resettable, Source};
use crate::error::Result;
use crate::format::ts::TsPacket;
use async_trait::async_trait;
use log::{info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Plays one source picked at random from a pool of candidates.
///
/// The pick happens on the first pull and holds until [`Resettable::reset`]
/// puts the selection back into the pool.
pub struct RandomSource {
    candidates: Vec<Box<dyn Source>>,
    current: Option<Box<dyn Source>>,
    rng: StdRng,
}

impl RandomSource {
    /// Selector seeded from system entropy.
    pub fn new(candidates: Vec<Box<dyn Source>>) -> Self {
        Self::with_rng(candidates, StdRng::from_entropy())
    }

    /// Deterministic selection order for a given seed.
    pub fn with_seed(candidates: Vec<Box<dyn Source>>, seed: u64) -> Self {
        Self::with_rng(candidates, StdRng::seed_from_u64(seed))
    }

    /// Selector drawing from `rng`.
    pub fn with_rng(candidates: Vec<Box<dyn Source>>, rng: StdRng) -> Self {
        Self {
            candidates,
            current: None,
            rng,
        }
    }

    /// Candidates still waiting in the pool.
    pub fn remaining(&self) -> usize {
        self.candidates.len()
    }
}

#[async_trait]
impl Source for RandomSource {
    async fn next_packet(&mut self) -> Result<Option<TsPacket>> {
        if self.current.is_none() {
            if self.candidates.is_empty() {
                return Ok(None);
            }
            let index = self.rng.gen_range(0..self.candidates.len());
            info!("Selected candidate #{} of {}", index, self.candidates.len());
            self.current = Some(self.candidates.remove(index));
        }

        match self.current.as_mut() {
            Some(current) => current.next_packet().await,
            None => Ok(None),
        }
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(mut current) = self.current.take() {
            if let Err(e) = current.close().await {
                warn!("Error closing selected source: {}", e);
            }
        }
        for mut candidate in self.candidates.drain(..) {
            if let Err(e) = candidate.close().await {
                warn!("Error closing candidate source: {}", e);
            }
        }
        Ok(())
    }

    fn as_resettable(&mut self) -> Option<&mut dyn Resettable> {
        Some(self)
    }
}

#[async_trait]
impl Resettable for RandomSource {
    async fn reset(&mut self) -> Result<()> {
        let Some(mut current) = self.current.take() else {
            return Ok(());
        };
        let rewound = match current.as_resettable() {
            Some(resettable) => match resettable.reset().await {
                Ok(()) => true,
                Err(e) => {
                    warn!("Error resetting source: {}", e);
                    false
                }
            },
            None => false,
        };

        if rewound {
            self.candidates.push(current);
        } else {
            warn!("Dropping selected source that cannot be rewound");
            if let Err(e) = current.close().await {
                warn!("Error closing selected source: {}", e);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::ts::tests::packet;
    use crate::source::{MemorySource, ReaderSource};
    use std::collections::HashSet;
    use std::io::Cursor;

    fn candidates(n: u16) -> Vec<Box<dyn Source>> {
        (0..n)
            .map(|pid| {
                Box::new(MemorySource::new(vec![packet(pid, 0), packet(pid, 1)])) as Box<dyn Source>
            })
            .collect()
    }

    async fn play(source: &mut RandomSource) -> Vec<u16> {
        let mut out = Vec::new();
        while let Some(p) = source.next_packet().await.unwrap() {
            out.push(p.pid());
        }
        out
    }

    #[tokio::test]
    async fn test_picks_exactly_once() {
        let mut source = RandomSource::with_seed(candidates(4), 7);
        let played = play(&mut source).await;
        assert_eq!(played.len(), 2);
        assert_eq!(played[0], played[1]);
        assert_eq!(source.remaining(), 3);
        // Exhausted selection stays selected
        assert!(source.next_packet().await.unwrap().is_none());
        assert_eq!(source.remaining(), 3);
    }

    #[tokio::test]
    async fn test_same_seed_same_choice() {
        let mut a = RandomSource::with_seed(candidates(5), 42);
        let mut b = RandomSource::with_seed(candidates(5), 42);
        assert_eq!(play(&mut a).await, play(&mut b).await);
    }

    #[tokio::test]
    async fn test_reset_returns_selection_to_pool() {
        let mut source = RandomSource::with_seed(candidates(3), 1);
        let mut seen = HashSet::new();
        for _ in 0..20 {
            let played = play(&mut source).await;
            assert_eq!(played.len(), 2);
            seen.insert(played[0]);
            source.reset().await.unwrap();
            assert_eq!(source.remaining(), 3);
        }
        assert!(seen.len() > 1);
    }

    #[tokio::test]
    async fn test_reset_drops_non_resettable_selection() {
        let pipe: Box<dyn Source> = Box::new(ReaderSource::new(Cursor::new(Vec::new())));
        let mut source = RandomSource::with_seed(vec![pipe], 3);
        assert!(source.next_packet().await.unwrap().is_none());
        source.reset().await.unwrap();
        assert_eq!(source.remaining(), 0);
        assert!(source.next_packet().await.unwrap().is_none());
        source.close().await.unwrap();
    }
}
