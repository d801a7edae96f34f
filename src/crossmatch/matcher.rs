//! Symmetric radius join between two position sets.
//!
//! Every reference point is used as a cone center against a
//! [`SeparationIndex`] over the input set, and every hit becomes a
//! [`MatchPair`]. This is all-pairs-within-radius: a reference point with
//! three input points inside the limit yields three pairs.
//!
//! Separations are computed from the stored unit vectors on both sides, so
//! swapping the roles of the two sets yields the same pairs with bit-identical
//! separations.

use std::sync::Arc;

use tracing::debug;

use crate::position::PositionSet;
use crate::separation_index::SeparationIndex;
use crate::Vector3;

use super::table::{MatchPair, MatchTable};

/// Match `reference` against `input`, building an index over `input` sized
/// for `limit_rad`.
///
/// A negative or NaN limit matches nothing.
pub fn run(reference: &PositionSet, input: Arc<PositionSet>, limit_rad: f64) -> MatchTable {
    let index = SeparationIndex::for_radius(input, limit_rad);
    run_with_index(reference, &index, limit_rad)
}

/// Match `reference` against a prebuilt index over the input set.
pub fn run_with_index(
    reference: &PositionSet,
    index: &SeparationIndex,
    limit_rad: f64,
) -> MatchTable {
    let pairs = collect_pairs(reference.uvecs(), index, limit_rad);

    debug!(
        "Matched {} reference against {} input points: {} pairs within {:.3e} rad",
        reference.len(),
        index.len(),
        pairs.len(),
        limit_rad
    );

    MatchTable::new(pairs, reference.len(), index.len(), limit_rad)
}

fn pairs_for_point(
    reference_index: usize,
    uvec: &Vector3,
    index: &SeparationIndex,
    limit_rad: f64,
) -> impl Iterator<Item = MatchPair> {
    index
        .query_unit(uvec, limit_rad)
        .into_iter()
        .map(move |(input_index, separation_rad)| MatchPair {
            reference_index,
            input_index,
            separation_rad,
        })
}

#[cfg(not(feature = "rayon"))]
fn collect_pairs(uvecs: &[Vector3], index: &SeparationIndex, limit_rad: f64) -> Vec<MatchPair> {
    uvecs
        .iter()
        .enumerate()
        .flat_map(|(reference_index, uvec)| {
            pairs_for_point(reference_index, uvec, index, limit_rad)
        })
        .collect()
}

#[cfg(feature = "rayon")]
fn collect_pairs(uvecs: &[Vector3], index: &SeparationIndex, limit_rad: f64) -> Vec<MatchPair> {
    use rayon::prelude::*;

    uvecs
        .par_iter()
        .enumerate()
        .flat_map_iter(|(reference_index, uvec)| {
            pairs_for_point(reference_index, uvec, index, limit_rad)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::position::arcsec_to_rad;

    fn positions(radec_deg: &[(f64, f64)]) -> PositionSet {
        let (ra, dec): (Vec<f64>, Vec<f64>) = radec_deg.iter().copied().unzip();
        PositionSet::from_degrees(&ra, &dec).unwrap()
    }

    #[test]
    fn emits_every_candidate_within_limit() {
        let reference = positions(&[(50.0, 10.0), (200.0, -30.0)]);
        let input = Arc::new(positions(&[
            (50.0, 10.0),
            (50.0, 10.0 + 1.0 / 3600.0),
            (50.0, 10.0 - 2.5 / 3600.0),
            (200.0, -30.0 + 10.0 / 3600.0),
        ]));

        let table = run(&reference, input, arcsec_to_rad(3.0));
        let index_pairs: Vec<(usize, usize)> = table
            .pairs()
            .iter()
            .map(|p| (p.reference_index, p.input_index))
            .collect();
        assert_eq!(index_pairs, vec![(0, 0), (0, 1), (0, 2)]);
        assert!(table.pairs().iter().all(|p| p.separation_rad <= table.limit_rad()));
        assert_eq!(table.num_reference(), 2);
        assert_eq!(table.num_input(), 4);
    }

    #[test]
    fn swapping_roles_mirrors_pairs() {
        let a = positions(&[(10.0, 0.0), (10.0005, 0.0), (300.0, 45.0)]);
        let b = positions(&[(10.0002, 0.0), (300.0, 45.0003), (0.0, 0.0)]);
        let limit = arcsec_to_rad(2.0);

        let ab = run(&a, Arc::new(b.clone()), limit);
        let ba = run(&b, Arc::new(a.clone()), limit);

        let mut forward: Vec<(usize, usize, f64)> = ab
            .pairs()
            .iter()
            .map(|p| (p.reference_index, p.input_index, p.separation_rad))
            .collect();
        let mut backward: Vec<(usize, usize, f64)> = ba
            .pairs()
            .iter()
            .map(|p| (p.input_index, p.reference_index, p.separation_rad))
            .collect();
        forward.sort_by(|x, y| (x.0, x.1).cmp(&(y.0, y.1)));
        backward.sort_by(|x, y| (x.0, x.1).cmp(&(y.0, y.1)));

        assert!(!forward.is_empty());
        assert_eq!(forward, backward);
    }

    #[test]
    fn empty_sets_produce_empty_tables() {
        let empty = positions(&[]);
        let some = positions(&[(1.0, 1.0)]);

        assert!(run(&empty, Arc::new(some.clone()), 1.0).is_empty());
        assert!(run(&some, Arc::new(empty), 1.0).is_empty());
    }

    #[test]
    fn negative_limit_matches_nothing() {
        let a = positions(&[(1.0, 1.0)]);
        assert!(run(&a, Arc::new(a.clone()), -1.0).is_empty());
    }
}
