//! Hash chains and their reduction.
//!
//! Aggregation chains and calendar chains share one link model and one
//! reduction routine; [`ChainKind`] selects the per-step hash algorithm and
//! level byte.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::hash::{DataHash, DataHasher, HashAlgorithm};
use crate::metadata::IdentityMetadata;
use crate::publication::PublicationData;

/// Level byte used by every calendar chain step.
pub const CALENDAR_LEVEL: u8 = 0xFF;

/// Longest chain whose shape still fits a `u64` chain index.
pub const MAX_SHAPE_LINKS: usize = 63;

/// Which side of a step the running hash sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// Running hash is the left operand; the sibling is on the right.
    Left,
    /// Running hash is the right operand; the sibling is on the left.
    Right,
}

/// The non-running operand of a chain step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LinkSibling {
    /// Root hash of a sibling subtree.
    Hash(DataHash),
    /// Identity record of a client or aggregator.
    Metadata(IdentityMetadata),
}

/// One step of a hash chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainLink {
    pub direction: Direction,
    /// Extra levels skipped by this step on top of the implicit +1.
    pub level_correction: u8,
    pub sibling: LinkSibling,
}

impl ChainLink {
    /// A step with the running hash on the left of `sibling`.
    pub fn left(sibling: DataHash) -> Self {
        Self {
            direction: Direction::Left,
            level_correction: 0,
            sibling: LinkSibling::Hash(sibling),
        }
    }

    /// A step with the running hash on the right of `sibling`.
    pub fn right(sibling: DataHash) -> Self {
        Self {
            direction: Direction::Right,
            level_correction: 0,
            sibling: LinkSibling::Hash(sibling),
        }
    }

    /// A step that mixes in an identity record.
    pub fn metadata(direction: Direction, metadata: IdentityMetadata) -> Self {
        Self {
            direction,
            level_correction: 0,
            sibling: LinkSibling::Metadata(metadata),
        }
    }

    pub fn with_level_correction(mut self, level_correction: u8) -> Self {
        self.level_correction = level_correction;
        self
    }

    /// The sibling hash, if this is not a metadata link.
    pub fn sibling_hash(&self) -> Option<&DataHash> {
        match &self.sibling {
            LinkSibling::Hash(h) => Some(h),
            LinkSibling::Metadata(_) => None,
        }
    }

    /// The identity record, if this is a metadata link.
    pub fn identity(&self) -> Option<&IdentityMetadata> {
        match &self.sibling {
            LinkSibling::Metadata(m) => Some(m),
            LinkSibling::Hash(_) => None,
        }
    }

    /// Bytes of the sibling operand as they enter the step hash.
    fn operand_bytes(&self) -> Result<Vec<u8>> {
        match &self.sibling {
            LinkSibling::Hash(h) => Ok(h.imprint()),
            LinkSibling::Metadata(m) => m.to_bytes(),
        }
    }
}

/// Chain flavor, selecting how each step is hashed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainKind {
    /// Every step uses the chain's declared algorithm and the running level.
    Aggregation(HashAlgorithm),
    /// Every step uses the right operand's algorithm and [`CALENDAR_LEVEL`].
    Calendar,
}

/// Output of a chain reduction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainResult {
    pub hash: DataHash,
    /// Running level after the last step.
    pub level: u8,
}

/// Hash `current` together with a sibling operand.
///
/// Computes `H(left || right || level)` where the operands are ordered by
/// `direction` and the running hash enters as its imprint.
pub fn combine(
    algorithm: HashAlgorithm,
    current: &DataHash,
    sibling: &[u8],
    direction: Direction,
    level: u8,
) -> Result<DataHash> {
    let mut hasher = DataHasher::new(algorithm)?;
    let current = current.imprint();
    match direction {
        Direction::Left => hasher.add_data(&current).add_data(sibling),
        Direction::Right => hasher.add_data(sibling).add_data(&current),
    };
    hasher.add_data(&[level]);
    Ok(hasher.hash())
}

/// Reduce `input` through `links` in order.
///
/// For aggregation chains the running level starts at `start_level` and grows
/// by `level_correction + 1` per step; a level past 255 is reported as
/// [`CoreError::ChainInconsistent`]. Calendar chains reject metadata links and
/// level corrections.
pub fn reduce(
    kind: ChainKind,
    input: &DataHash,
    start_level: u8,
    links: &[ChainLink],
) -> Result<ChainResult> {
    let mut current = input.clone();
    let mut level = start_level;

    for (i, link) in links.iter().enumerate() {
        let (algorithm, level_byte) = match kind {
            ChainKind::Aggregation(algorithm) => {
                level = level
                    .checked_add(link.level_correction)
                    .and_then(|l| l.checked_add(1))
                    .ok_or_else(|| {
                        CoreError::ChainInconsistent(format!(
                            "link {i} needs a level above 255 (running level {level}, correction {})",
                            link.level_correction
                        ))
                    })?;
                (algorithm, level)
            }
            ChainKind::Calendar => {
                if link.level_correction != 0 {
                    return Err(CoreError::ChainInconsistent(format!(
                        "calendar link {i} has a level correction"
                    )));
                }
                let sibling = link.sibling_hash().ok_or_else(|| {
                    CoreError::ChainInconsistent(format!("calendar link {i} carries metadata"))
                })?;
                let algorithm = match link.direction {
                    Direction::Left => sibling.algorithm(),
                    Direction::Right => current.algorithm(),
                };
                (algorithm, CALENDAR_LEVEL)
            }
        };

        let operand = link.operand_bytes()?;
        current = combine(algorithm, &current, &operand, link.direction, level_byte)?;
    }

    Ok(ChainResult {
        hash: current,
        level,
    })
}

/// A chain from an input hash up through one aggregation layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregationHashChain {
    /// Aggregation round time in Unix seconds.
    pub aggregation_time: u64,
    /// Position of this chain in the global aggregation tree, outermost first.
    pub chain_index: Vec<u64>,
    pub input_hash: DataHash,
    /// Algorithm of every step, independent of the input hash's algorithm.
    pub aggregation_algorithm: HashAlgorithm,
    pub links: Vec<ChainLink>,
}

impl AggregationHashChain {
    /// Reduce the input hash, starting from `start_level`.
    pub fn output(&self, start_level: u8) -> Result<ChainResult> {
        reduce(
            ChainKind::Aggregation(self.aggregation_algorithm),
            &self.input_hash,
            start_level,
            &self.links,
        )
    }

    /// The chain-index value encoded by the link directions.
    ///
    /// Starts from 1 and shifts in one bit per link, top link first, 1 for a
    /// left link. `None` when the chain is too long to encode.
    pub fn shape(&self) -> Option<u64> {
        shape_of(&self.links)
    }

    /// Identity records on this chain, topmost first.
    pub fn identity(&self) -> Vec<IdentityMetadata> {
        self.links
            .iter()
            .rev()
            .filter_map(|link| link.identity().cloned())
            .collect()
    }
}

/// Chain-index value for a sequence of links.
pub fn shape_of(links: &[ChainLink]) -> Option<u64> {
    if links.len() > MAX_SHAPE_LINKS {
        return None;
    }
    let mut index = 1u64;
    for link in links.iter().rev() {
        index = (index << 1) | u64::from(link.direction == Direction::Left);
    }
    Some(index)
}

/// A chain from one calendar leaf (an aggregation round) to a calendar root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarHashChain {
    /// Time of the calendar root this chain reaches.
    pub publication_time: u64,
    /// Time of the calendar leaf this chain starts from.
    pub aggregation_time: u64,
    pub input_hash: DataHash,
    pub links: Vec<ChainLink>,
}

impl CalendarHashChain {
    /// The calendar root hash.
    pub fn output_hash(&self) -> Result<DataHash> {
        Ok(reduce(ChainKind::Calendar, &self.input_hash, 0, &self.links)?.hash)
    }

    /// The publication this chain commits to.
    pub fn publication_data(&self) -> Result<PublicationData> {
        Ok(PublicationData::new(
            self.publication_time,
            self.output_hash()?,
        ))
    }

    /// Recompute the leaf time from the chain shape.
    ///
    /// The calendar at time `P` is a tree over leaves `0..=P` whose left
    /// subtrees are perfect. Walking from the root, a left step keeps the
    /// left perfect subtree and a right step skips it.
    pub fn registration_time(&self) -> Result<u64> {
        let mut remaining = self.publication_time;
        let mut time = 0u64;

        for link in self.links.iter().rev() {
            if remaining == 0 {
                return Err(CoreError::ChainInconsistent(
                    "calendar chain is longer than its publication time allows".into(),
                ));
            }
            let high = high_bit(remaining);
            match link.direction {
                Direction::Left => remaining = high - 1,
                Direction::Right => {
                    time += high;
                    remaining -= high;
                }
            }
        }

        if remaining != 0 {
            return Err(CoreError::ChainInconsistent(
                "calendar chain is shorter than its publication time requires".into(),
            ));
        }
        Ok(time)
    }
}

/// Largest power of two not above `n`. `n` must be non-zero.
pub(crate) fn high_bit(n: u64) -> u64 {
    1u64 << (63 - n.leading_zeros())
}
