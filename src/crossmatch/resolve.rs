//! Nearest-pick resolution of match candidates.
//!
//! A key (reference or input index) can have several candidate pairs in a
//! [`MatchTable`]. Resolution keeps the candidate with the strictly smallest
//! separation; on an exact tie the earliest pair in table order wins.
//!
//! Every resolution has the same shape: one `Option<MatchPair>` per requested
//! key plus a count of keys that had to be collapsed. When that count is
//! non-zero an [`AmbiguousMatchNotice`] is available and a warning is logged;
//! neither changes the result.

use std::fmt;

use tracing::warn;

use super::table::{MatchPair, MatchTable};

/// Which index is the lookup key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Key is a reference index; the answer is an input index.
    ReferenceToInput,
    /// Key is an input index; the answer is a reference index.
    InputToReference,
}

/// Non-fatal diagnostic: some requested keys had several candidates and the
/// nearest one was used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AmbiguousMatchNotice {
    /// Number of requested keys with more than one candidate.
    pub collapsed: usize,
    /// Number of keys in the request.
    pub requested: usize,
}

impl fmt::Display for AmbiguousMatchNotice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} of {} requested catalog entries matched several entries; nearest used",
            self.collapsed, self.requested
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    direction: Direction,
    nearest: Vec<Option<MatchPair>>,
    collapsed: usize,
}

impl Resolution {
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Number of requested keys.
    pub fn len(&self) -> usize {
        self.nearest.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nearest.is_empty()
    }

    /// The chosen pair for each requested key, `None` for "no match".
    pub fn nearest(&self) -> &[Option<MatchPair>] {
        &self.nearest
    }

    /// Counterpart index of the `i`-th requested key.
    pub fn counterpart(&self, i: usize) -> Option<usize> {
        self.nearest
            .get(i)
            .copied()
            .flatten()
            .map(|pair| self.counterpart_of(&pair))
    }

    /// Counterpart index for every requested key, in request order.
    pub fn counterparts(&self) -> Vec<Option<usize>> {
        self.nearest
            .iter()
            .map(|pair| pair.as_ref().map(|p| self.counterpart_of(p)))
            .collect()
    }

    /// Number of requested keys that resolved to a counterpart.
    pub fn num_matched(&self) -> usize {
        self.nearest.iter().flatten().count()
    }

    /// Number of requested keys that had more than one candidate.
    pub fn collapsed(&self) -> usize {
        self.collapsed
    }

    pub fn notice(&self) -> Option<AmbiguousMatchNotice> {
        (self.collapsed > 0).then_some(AmbiguousMatchNotice {
            collapsed: self.collapsed,
            requested: self.nearest.len(),
        })
    }

    fn counterpart_of(&self, pair: &MatchPair) -> usize {
        match self.direction {
            Direction::ReferenceToInput => pair.input_index,
            Direction::InputToReference => pair.reference_index,
        }
    }
}

impl MatchTable {
    /// Nearest input entry for each reference index.
    pub fn resolve_input_for(&self, reference_indices: &[usize]) -> Resolution {
        self.resolve(Direction::ReferenceToInput, reference_indices)
    }

    /// Nearest reference entry for each input index.
    pub fn resolve_reference_for(&self, input_indices: &[usize]) -> Resolution {
        self.resolve(Direction::InputToReference, input_indices)
    }

    pub fn resolve(&self, direction: Direction, keys: &[usize]) -> Resolution {
        let mut collapsed = 0;
        let nearest = keys
            .iter()
            .map(|&key| {
                let members = match direction {
                    Direction::ReferenceToInput => self.reference_members(key),
                    Direction::InputToReference => self.input_members(key),
                };
                if members.len() > 1 {
                    collapsed += 1;
                }
                members
                    .iter()
                    .map(|&pair_idx| self.pair(pair_idx))
                    .fold(None, |best: Option<&MatchPair>, candidate| match best {
                        Some(b) if b.separation_rad <= candidate.separation_rad => Some(b),
                        _ => Some(candidate),
                    })
                    .copied()
            })
            .collect();

        let resolution = Resolution {
            direction,
            nearest,
            collapsed,
        };
        if let Some(notice) = resolution.notice() {
            warn!("{}", notice);
        }
        resolution
    }
}
