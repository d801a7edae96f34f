//! Spatial index over a [`PositionSet`] for fast cone (angular-radius) searches.
//!
//! `SeparationIndex` bins points in a HEALPix-style equal-area grid:
//! latitude is partitioned into `3 * nside` bands in `z = sin(dec)`, and
//! longitude into `4 * nside` slices in right ascension, for a total of
//! `12 * nside^2` cells. Each cell maps to a compact slice of point indices.
//!
//! Query flow:
//! 1. Bound the declination range of the cone and, unless the cone touches a
//!    pole, its right-ascension half width `asin(sin r / cos dec0)`.
//! 2. Scan only points in cells inside those bounds.
//! 3. Compute the exact separation of each candidate and keep those within
//!    the radius.
//!
//! Cell selection is conservative, so a query returns exactly the points a
//! brute-force scan would.

use std::f64::consts::{FRAC_PI_2, PI, TAU};
use std::sync::Arc;

use tracing::debug;

use crate::position::{angular_separation, radec_to_uvec, PositionSet};
use crate::Vector3;

/// Upper bound on `nside`, automatic or explicit (~12.6 million cells).
pub const MAX_NSIDE: u32 = 1024;

/// Average occupancy targeted when sizing the grid from catalog density.
const TARGET_POINTS_PER_CELL: f64 = 4.0;

/// Padding on `z` bounds to absorb rounding in `sin`.
const Z_PAD: f64 = 1e-12;

#[derive(Debug, Clone)]
pub struct SeparationIndex {
    nside: u32,
    n_lat: u32,
    n_lon: u32,
    positions: Arc<PositionSet>,
    cell_offsets: Vec<u32>,
    point_indices: Vec<u32>,
}

impl SeparationIndex {
    /// Build an index with an explicit resolution.
    ///
    /// `nside` is clamped to `1..=MAX_NSIDE`; the number of cells is
    /// `12 * nside^2`. [`nside`](Self::nside) reports the value used.
    pub fn new(nside: u32, positions: Arc<PositionSet>) -> Self {
        let nside = clamp_nside(nside);
        let n_lat = 3 * nside;
        let n_lon = 4 * nside;
        let n_cells = n_lat as usize * n_lon as usize;

        // Counting sort into CSR; points keep index order within a cell.
        let cells: Vec<usize> = positions
            .uvecs()
            .iter()
            .map(|uvec| Self::cell_for_uvec(n_lat, n_lon, uvec))
            .collect();
        let mut cell_offsets = vec![0u32; n_cells + 1];
        for &cell in &cells {
            cell_offsets[cell + 1] += 1;
        }
        for cell in 0..n_cells {
            cell_offsets[cell + 1] += cell_offsets[cell];
        }
        let mut cursor = cell_offsets[..n_cells].to_vec();
        let mut point_indices = vec![0u32; cells.len()];
        for (point_idx, &cell) in cells.iter().enumerate() {
            point_indices[cursor[cell] as usize] = point_idx as u32;
            cursor[cell] += 1;
        }

        debug!(
            "Built separation index: nside={}, {} cells, {} points",
            nside,
            n_cells,
            positions.len()
        );

        Self {
            nside,
            n_lat,
            n_lon,
            positions,
            cell_offsets,
            point_indices,
        }
    }

    /// Build an index sized from the number of points alone.
    pub fn build(positions: Arc<PositionSet>) -> Self {
        let nside = nside_for(positions.len(), None);
        Self::new(nside, positions)
    }

    /// Build an index sized for queries of roughly `radius_rad`.
    pub fn for_radius(positions: Arc<PositionSet>, radius_rad: f64) -> Self {
        let nside = nside_for(positions.len(), Some(radius_rad));
        Self::new(nside, positions)
    }

    pub fn nside(&self) -> u32 {
        self.nside
    }

    pub fn num_cells(&self) -> usize {
        self.n_lat as usize * self.n_lon as usize
    }

    /// Number of indexed points.
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// The position set this index was built over.
    pub fn positions(&self) -> &Arc<PositionSet> {
        &self.positions
    }

    /// All points within `radius_rad` of `point`, as `(index, separation_rad)`.
    ///
    /// `point` is normalized internally; the radius is clamped to `[0, π]`.
    /// A negative or NaN radius matches nothing. Results are sorted by index.
    pub fn query(&self, point: &Vector3, radius_rad: f64) -> Vec<(usize, f64)> {
        self.query_unit(&normalize_or_fallback(*point), radius_rad)
    }

    /// Cone query around a vector already known to be unit length.
    ///
    /// The vector is used verbatim, so separations between two indexed sets
    /// are bit-identical whichever side is queried.
    pub(crate) fn query_unit(&self, dir: &Vector3, radius_rad: f64) -> Vec<(usize, f64)> {
        if self.is_empty() || radius_rad.is_nan() || radius_rad < 0.0 {
            return Vec::new();
        }
        let radius = radius_rad.min(PI);
        let lon_step = TAU / self.n_lon as f64;

        let dec_center = dir.z.clamp(-1.0, 1.0).asin();
        let (z_min, z_max) = if radius >= FRAC_PI_2 {
            (-1.0, 1.0)
        } else {
            (
                ((dec_center - radius).max(-FRAC_PI_2).sin() - Z_PAD).max(-1.0),
                ((dec_center + radius).min(FRAC_PI_2).sin() + Z_PAD).min(1.0),
            )
        };

        // Cones reaching a pole span every longitude.
        let lon_half_span = if dec_center.abs() + radius >= FRAC_PI_2 {
            None
        } else {
            let ratio = (radius.sin() / dec_center.cos()).min(1.0);
            Some(ratio.asin() + lon_step)
        };

        let phi = wrap_angle(dir.y.atan2(dir.x));

        let mut out = Vec::new();
        for lat_bin in Self::z_bin_range(self.n_lat, z_min, z_max) {
            match lon_half_span {
                Some(half) if 2.0 * half + lon_step < TAU => {
                    self.for_each_wrapped_lon_bin(phi - half, phi + half, |lon_bin| {
                        self.collect_cell_matches(lat_bin, lon_bin, dir, radius, &mut out);
                    });
                }
                _ => {
                    for lon_bin in 0..self.n_lon {
                        self.collect_cell_matches(lat_bin, lon_bin, dir, radius, &mut out);
                    }
                }
            }
        }

        // Each cell is visited once, so indices are already unique.
        out.sort_unstable_by_key(|&(idx, _)| idx);
        out
    }

    /// Cone query around a position given in degrees.
    pub fn query_radec_deg(&self, ra_deg: f64, dec_deg: f64, radius_rad: f64) -> Vec<(usize, f64)> {
        let dir = radec_to_uvec(ra_deg.to_radians(), dec_deg.to_radians());
        self.query(&dir, radius_rad)
    }

    fn collect_cell_matches(
        &self,
        lat_bin: u32,
        lon_bin: u32,
        dir: &Vector3,
        radius: f64,
        out: &mut Vec<(usize, f64)>,
    ) {
        let cell = lat_bin as usize * self.n_lon as usize + lon_bin as usize;
        let start = self.cell_offsets[cell] as usize;
        let end = self.cell_offsets[cell + 1] as usize;

        let uvecs = self.positions.uvecs();
        for &point_idx in &self.point_indices[start..end] {
            let point_idx = point_idx as usize;
            let separation = angular_separation(dir, &uvecs[point_idx]);
            if separation <= radius {
                out.push((point_idx, separation));
            }
        }
    }

    fn for_each_wrapped_lon_bin<F>(&self, lon_min: f64, lon_max: f64, mut f: F)
    where
        F: FnMut(u32),
    {
        let start_bin = Self::phi_to_lon_bin(self.n_lon, wrap_angle(lon_min));
        let end_bin = Self::phi_to_lon_bin(self.n_lon, wrap_angle(lon_max));

        if start_bin <= end_bin {
            for lon_bin in start_bin..=end_bin {
                f(lon_bin);
            }
            return;
        }

        for lon_bin in start_bin..self.n_lon {
            f(lon_bin);
        }
        for lon_bin in 0..=end_bin {
            f(lon_bin);
        }
    }

    fn z_bin_range(n_lat: u32, z_min: f64, z_max: f64) -> std::ops::RangeInclusive<u32> {
        Self::z_to_lat_bin(n_lat, z_min)..=Self::z_to_lat_bin(n_lat, z_max)
    }

    fn cell_for_uvec(n_lat: u32, n_lon: u32, uvec: &Vector3) -> usize {
        let phi = wrap_angle(uvec.y.atan2(uvec.x));
        let lat_bin = Self::z_to_lat_bin(n_lat, uvec.z);
        let lon_bin = Self::phi_to_lon_bin(n_lon, phi);
        lat_bin as usize * n_lon as usize + lon_bin as usize
    }

    fn z_to_lat_bin(n_lat: u32, z: f64) -> u32 {
        let u = ((z.clamp(-1.0, 1.0) + 1.0) * 0.5).clamp(0.0, 1.0);
        ((u * n_lat as f64).floor() as u32).min(n_lat - 1)
    }

    fn phi_to_lon_bin(n_lon: u32, phi: f64) -> u32 {
        let u = (phi / TAU).clamp(0.0, 1.0);
        ((u * n_lon as f64).floor() as u32).min(n_lon - 1)
    }
}

/// Grid resolution for `len` points, optionally bounded by a query radius.
///
/// Density alone targets a few points per cell. A positive radius caps the
/// resolution so a cell is never narrower than the radius. The result is in
/// `1..=MAX_NSIDE`.
pub fn nside_for(len: usize, radius_rad: Option<f64>) -> u32 {
    let by_density = (len as f64 / (12.0 * TARGET_POINTS_PER_CELL)).sqrt();
    let by_radius = match radius_rad {
        Some(r) if r > 0.0 => FRAC_PI_2 / r,
        _ => f64::INFINITY,
    };
    by_density
        .min(by_radius)
        .floor()
        .clamp(1.0, MAX_NSIDE as f64) as u32
}

/// Resolution actually used for a requested `nside`.
pub fn clamp_nside(nside: u32) -> u32 {
    nside.clamp(1, MAX_NSIDE)
}

fn wrap_angle(theta_rad: f64) -> f64 {
    let wrapped = theta_rad.rem_euclid(TAU);
    if wrapped >= TAU {
        0.0
    } else {
        wrapped
    }
}

/// Unit vectors pass through untouched so zero-radius queries stay exact.
fn normalize_or_fallback(v: Vector3) -> Vector3 {
    let n = v.norm();
    if (n - 1.0).abs() <= 4.0 * f64::EPSILON {
        v
    } else if n > 0.0 {
        v / n
    } else {
        Vector3::new(1.0, 0.0, 0.0)
    }
}
