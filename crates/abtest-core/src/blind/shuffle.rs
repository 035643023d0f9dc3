//! Random ordering of the channels taking part in a blind test

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::packed::{self, SLOT_COUNT};
use crate::error::{TesterError, TesterResult};

/// Minimum number of channels for a meaningful blind test
pub const MIN_BLIND_CHANNELS: usize = 2;

/// One candidate during a shuffle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PermutationEntry {
    /// 0-based channel (group) index
    pub channel: usize,
    pub enabled: bool,
    /// Sort key, only meaningful for the shuffle that drew it
    pub key: u32,
}

/// An ordered subset of channels and its packed form
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ShuffleState {
    order: Vec<usize>,
    packed: u32,
}

impl ShuffleState {
    /// Build from an explicit order (at most [`SLOT_COUNT`] entries are kept)
    pub fn from_order(mut order: Vec<usize>) -> Self {
        order.truncate(SLOT_COUNT);
        let packed = packed::encode(&order);
        Self { order, packed }
    }

    /// Decode a packed word for a tester with `channel_count` channels
    pub fn from_packed(word: u32, channel_count: usize) -> Self {
        Self {
            order: packed::decode(word, channel_count),
            packed: word,
        }
    }

    /// Channel indices in grid order
    pub fn order(&self) -> &[usize] {
        &self.order
    }

    /// Packed word as stored under `/shuffle_indices`
    pub fn packed(&self) -> u32 {
        self.packed
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Channel shown at a grid position
    pub fn channel_at(&self, position: usize) -> Option<usize> {
        self.order.get(position).copied()
    }

    /// Grid position of a channel
    pub fn position_of(&self, channel: usize) -> Option<usize> {
        self.order.iter().position(|&c| c == channel)
    }
}

/// Draws blind-test permutations
pub struct BlindShuffler {
    rng: StdRng,
}

impl BlindShuffler {
    /// Shuffler seeded from OS entropy
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_os_rng(),
        }
    }

    /// Reproducible shuffler
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Seeded if a seed is given, entropy otherwise
    pub fn from_seed(seed: Option<u64>) -> Self {
        match seed {
            Some(seed) => Self::with_seed(seed),
            None => Self::new(),
        }
    }

    /// Shuffle the enabled channels.
    ///
    /// `enabled[i]` tells whether channel `i` takes part. Each enabled
    /// channel gets a fresh random key and the list is stably sorted by it.
    /// Fewer than two enabled channels is an error and draws nothing.
    pub fn shuffle(&mut self, enabled: &[bool]) -> TesterResult<ShuffleState> {
        let eligible = enabled.iter().filter(|&&e| e).count();
        if eligible < MIN_BLIND_CHANNELS {
            return Err(TesterError::InsufficientChannels { eligible });
        }

        let mut entries: Vec<PermutationEntry> = enabled
            .iter()
            .enumerate()
            .map(|(channel, &enabled)| PermutationEntry {
                channel,
                enabled,
                key: 0,
            })
            .filter(|e| e.enabled)
            .collect();

        for entry in &mut entries {
            entry.key = self.rng.random();
        }
        entries.sort_by_key(|e| e.key);

        let order = entries.iter().map(|e| e.channel).collect();
        Ok(ShuffleState::from_order(order))
    }
}

impl Default for BlindShuffler {
    fn default() -> Self {
        Self::new()
    }
}
