//! Synthetic record feeds
//!
//! Index sequences for the arrival orders a history buffer has to absorb.
//! Shared by the replay binary, the benches and the tests.

use crate::core::record::compose_index;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::fmt;

/// Arrival order of a synthetic feed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessPattern {
    /// Oldest first, the live feed case
    Ascending,
    /// Newest first, history replayed backwards
    Descending,
    /// Alternating from both ends toward the middle
    DualEnded,
    /// Both ends present first, then the gap filled in order
    MiddleGapFill,
    /// Uniform random permutation
    Random,
}

impl AccessPattern {
    pub const ALL: [AccessPattern; 5] = [
        AccessPattern::Ascending,
        AccessPattern::Descending,
        AccessPattern::DualEnded,
        AccessPattern::MiddleGapFill,
        AccessPattern::Random,
    ];

    pub fn name(self) -> &'static str {
        match self {
            AccessPattern::Ascending => "ascending",
            AccessPattern::Descending => "descending",
            AccessPattern::DualEnded => "dual_ended",
            AccessPattern::MiddleGapFill => "middle_gap_fill",
            AccessPattern::Random => "random",
        }
    }

    /// `count` distinct indices in this arrival order
    ///
    /// Indices span consecutive seconds with 1000 sequences each, so both
    /// halves of the index vary.
    pub fn indices(self, count: usize, seed: u64) -> Vec<i64> {
        let ascending: Vec<i64> = (0..count).map(position_index).collect();
        match self {
            AccessPattern::Ascending => ascending,
            AccessPattern::Descending => ascending.into_iter().rev().collect(),
            AccessPattern::DualEnded => {
                let mut order = Vec::with_capacity(count);
                let (mut lo, mut hi) = (0usize, count);
                while lo < hi {
                    order.push(ascending[lo]);
                    lo += 1;
                    if lo < hi {
                        hi -= 1;
                        order.push(ascending[hi]);
                    }
                }
                order
            }
            AccessPattern::MiddleGapFill => {
                let edge = count / 10;
                let mut order = Vec::with_capacity(count);
                order.extend_from_slice(&ascending[..edge]);
                order.extend_from_slice(&ascending[count - edge..]);
                order.extend_from_slice(&ascending[edge..count - edge]);
                order
            }
            AccessPattern::Random => {
                let mut order = ascending;
                order.shuffle(&mut StdRng::seed_from_u64(seed));
                order
            }
        }
    }
}

impl fmt::Display for AccessPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Index of the record at ascending position `i` (1000 records per second)
#[inline]
fn position_index(i: usize) -> i64 {
    compose_index(1_600_000_000 + (i / 1000) as i32, (i % 1000) as u32)
}
