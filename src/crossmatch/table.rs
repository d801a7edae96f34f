//! Immutable result of one matcher run.
//!
//! Pairs are kept in matcher order (ascending reference index, then input
//! index). Two CSR-style lookups, one keyed by reference index and one by
//! input index, are built once in linear time with a counting pass. Within a
//! key, pairs keep table order, which makes nearest-pick tie-breaking stable.

use rkyv::{Archive, Deserialize, Serialize};

use crate::error::{MatchError, MatchResult};
use crate::position::rad_to_arcsec;

/// One candidate correspondence within the separation limit.
#[derive(Debug, Clone, Copy, PartialEq, Archive, Serialize, Deserialize)]
pub struct MatchPair {
    pub reference_index: usize,
    pub input_index: usize,
    /// Great-circle separation in radians.
    pub separation_rad: f64,
}

impl MatchPair {
    pub fn separation_arcsec(&self) -> f64 {
        rad_to_arcsec(self.separation_rad)
    }
}

#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
pub struct MatchTable {
    limit_rad: f64,
    num_reference: usize,
    num_input: usize,
    pairs: Vec<MatchPair>,
    reference_offsets: Vec<u32>,
    by_reference: Vec<u32>,
    input_offsets: Vec<u32>,
    by_input: Vec<u32>,
}

impl MatchTable {
    /// Wrap matcher output. Every pair index must be below the matching
    /// catalog length, and no `(reference, input)` pair may repeat.
    pub(crate) fn new(
        pairs: Vec<MatchPair>,
        num_reference: usize,
        num_input: usize,
        limit_rad: f64,
    ) -> Self {
        let (reference_offsets, by_reference) =
            group_pairs(&pairs, num_reference, |p| p.reference_index);
        let (input_offsets, by_input) = group_pairs(&pairs, num_input, |p| p.input_index);

        Self {
            limit_rad,
            num_reference,
            num_input,
            pairs,
            reference_offsets,
            by_reference,
            input_offsets,
            by_input,
        }
    }

    /// All pairs, in matcher order.
    pub fn pairs(&self) -> &[MatchPair] {
        &self.pairs
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Separation limit the table was produced with, in radians.
    pub fn limit_rad(&self) -> f64 {
        self.limit_rad
    }

    /// Length of the reference catalog that was matched.
    pub fn num_reference(&self) -> usize {
        self.num_reference
    }

    /// Length of the input catalog that was matched.
    pub fn num_input(&self) -> usize {
        self.num_input
    }

    /// Pairs whose reference index is `reference_index` (empty if none or out of range).
    pub fn pairs_for_reference(
        &self,
        reference_index: usize,
    ) -> impl Iterator<Item = &MatchPair> + '_ {
        self.reference_members(reference_index)
            .iter()
            .map(|&p| &self.pairs[p as usize])
    }

    /// Pairs whose input index is `input_index` (empty if none or out of range).
    pub fn pairs_for_input(&self, input_index: usize) -> impl Iterator<Item = &MatchPair> + '_ {
        self.input_members(input_index)
            .iter()
            .map(|&p| &self.pairs[p as usize])
    }

    pub(crate) fn reference_members(&self, reference_index: usize) -> &[u32] {
        members(&self.reference_offsets, &self.by_reference, reference_index)
    }

    pub(crate) fn input_members(&self, input_index: usize) -> &[u32] {
        members(&self.input_offsets, &self.by_input, input_index)
    }

    pub(crate) fn pair(&self, pair_idx: u32) -> &MatchPair {
        &self.pairs[pair_idx as usize]
    }

    /// Serialize the table to bytes using rkyv.
    pub fn to_rkyv_bytes(&self) -> MatchResult<Vec<u8>> {
        rkyv::to_bytes::<rkyv::rancor::Error>(self)
            .map(|bytes| bytes.to_vec())
            .map_err(|e| MatchError::Serialization(e.to_string()))
    }

    /// Restore a table written by [`MatchTable::to_rkyv_bytes`].
    pub fn from_rkyv_bytes(bytes: &[u8]) -> MatchResult<Self> {
        let mut aligned = rkyv::util::AlignedVec::<16>::new();
        aligned.extend_from_slice(bytes);
        let table = rkyv::from_bytes::<Self, rkyv::rancor::Error>(&aligned)
            .map_err(|e| MatchError::Serialization(e.to_string()))?;
        table.check_layout()?;
        Ok(table)
    }

    /// The lookups must be exactly what [`MatchTable::new`] derives from the
    /// pairs, so restored tables never index out of bounds.
    fn check_layout(&self) -> MatchResult<()> {
        let layout_error =
            || MatchError::Serialization("inconsistent match table layout".to_string());

        // Offset lengths are backed by archived data, which bounds the key counts.
        let sized = self.num_reference.checked_add(1) == Some(self.reference_offsets.len())
            && self.num_input.checked_add(1) == Some(self.input_offsets.len())
            && u32::try_from(self.pairs.len()).is_ok();
        let in_range = self
            .pairs
            .iter()
            .all(|p| p.reference_index < self.num_reference && p.input_index < self.num_input);
        if !(sized && in_range) {
            return Err(layout_error());
        }

        let (reference_offsets, by_reference) =
            group_pairs(&self.pairs, self.num_reference, |p| p.reference_index);
        let (input_offsets, by_input) = group_pairs(&self.pairs, self.num_input, |p| p.input_index);
        if reference_offsets == self.reference_offsets
            && by_reference == self.by_reference
            && input_offsets == self.input_offsets
            && by_input == self.by_input
        {
            Ok(())
        } else {
            Err(layout_error())
        }
    }
}

fn members<'a>(offsets: &[u32], flat: &'a [u32], key: usize) -> &'a [u32] {
    let end = key.checked_add(1).and_then(|k| offsets.get(k));
    match (offsets.get(key), end) {
        (Some(&start), Some(&end)) => &flat[start as usize..end as usize],
        _ => &[],
    }
}

/// Counting sort of pair indices by key; stable within a key.
fn group_pairs<F>(pairs: &[MatchPair], n_keys: usize, key: F) -> (Vec<u32>, Vec<u32>)
where
    F: Fn(&MatchPair) -> usize,
{
    let mut offsets = vec![0u32; n_keys + 1];
    for pair in pairs {
        offsets[key(pair) + 1] += 1;
    }
    for k in 0..n_keys {
        offsets[k + 1] += offsets[k];
    }

    let mut cursor = offsets[..n_keys].to_vec();
    let mut flat = vec![0u32; pairs.len()];
    for (pair_idx, pair) in pairs.iter().enumerate() {
        let k = key(pair);
        flat[cursor[k] as usize] = pair_idx as u32;
        cursor[k] += 1;
    }
    (offsets, flat)
}
