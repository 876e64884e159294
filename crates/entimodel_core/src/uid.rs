//! Uid candidate source.

use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};

/// Seeded pseudo-random source of Uid candidates.
///
/// Candidates are 63-bit so they survive a round trip through signed 64-bit
/// integers in other runtimes. Collision checks against the model are done by
/// the caller; see [`Model::generate_uid`](crate::Model::generate_uid).
#[derive(Debug, Clone)]
pub struct UidGenerator {
    source: Source,
}

#[derive(Debug, Clone)]
enum Source {
    Rng(StdRng),
    /// Replays a fixed list of candidates, wrapping around at the end.
    #[cfg(test)]
    Fixed { candidates: Vec<u64>, next: usize },
}

impl UidGenerator {
    /// Creates a reproducible generator.
    #[must_use]
    pub fn from_seed(seed: u64) -> Self {
        Self {
            source: Source::Rng(StdRng::seed_from_u64(seed)),
        }
    }

    /// Creates a generator seeded from the operating system.
    #[must_use]
    pub fn from_entropy() -> Self {
        Self {
            source: Source::Rng(StdRng::from_entropy()),
        }
    }

    /// Creates a generator from an optional seed.
    #[must_use]
    pub fn from_optional_seed(seed: Option<u64>) -> Self {
        seed.map_or_else(Self::from_entropy, Self::from_seed)
    }

    /// Creates a generator that yields `candidates` in a loop.
    #[cfg(test)]
    pub(crate) fn from_candidates(candidates: Vec<u64>) -> Self {
        assert!(!candidates.is_empty());
        Self {
            source: Source::Fixed { candidates, next: 0 },
        }
    }

    /// Returns the next candidate, possibly zero.
    pub fn next_candidate(&mut self) -> u64 {
        match &mut self.source {
            Source::Rng(rng) => rng.next_u64() >> 1,
            #[cfg(test)]
            Source::Fixed { candidates, next } => {
                let candidate = candidates[*next % candidates.len()];
                *next += 1;
                candidate
            }
        }
    }
}

impl Default for UidGenerator {
    fn default() -> Self {
        Self::from_entropy()
    }
}
