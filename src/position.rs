//! Catalog positions as unit vectors on the celestial sphere.
//!
//! Working with Cartesian unit vectors instead of (RA, Dec) pairs removes the
//! 0/360° wrap and the coordinate singularity at the poles: the angular
//! separation of two points is a function of their dot and cross products.

use crate::catalog::{Catalog, DEC_COLUMN, RA_COLUMN};
use crate::error::{MatchError, MatchResult};
use crate::Vector3;

/// Read-only unit vectors for every record of one catalog, in catalog order.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionSet {
    uvecs: Vec<Vector3>,
}

impl PositionSet {
    /// Convert the `ra` / `dec` columns (degrees) of a catalog.
    ///
    /// # Errors
    /// [`MatchError::InvalidCatalog`] if either column is absent, or any value
    /// is non-finite, or a declination lies outside [-90°, 90°].
    pub fn build(catalog: &Catalog) -> MatchResult<Self> {
        let ra = catalog.column(RA_COLUMN).ok_or_else(|| {
            MatchError::invalid_catalog(format!("missing `{RA_COLUMN}` column"))
        })?;
        let dec = catalog.column(DEC_COLUMN).ok_or_else(|| {
            MatchError::invalid_catalog(format!("missing `{DEC_COLUMN}` column"))
        })?;
        Self::from_degrees(ra, dec)
    }

    /// Convert raw RA / Dec arrays in degrees.
    pub fn from_degrees(ra_deg: &[f64], dec_deg: &[f64]) -> MatchResult<Self> {
        if ra_deg.len() != dec_deg.len() {
            return Err(MatchError::invalid_catalog(format!(
                "{} right ascensions but {} declinations",
                ra_deg.len(),
                dec_deg.len()
            )));
        }

        let uvecs = ra_deg
            .iter()
            .zip(dec_deg)
            .enumerate()
            .map(|(row, (&ra, &dec))| {
                if !ra.is_finite() || !dec.is_finite() {
                    return Err(MatchError::invalid_catalog(format!(
                        "non-finite position at row {row} (ra={ra}, dec={dec})"
                    )));
                }
                if dec.abs() > 90.0 {
                    return Err(MatchError::invalid_catalog(format!(
                        "declination {dec} at row {row} is outside [-90, 90]"
                    )));
                }
                Ok(radec_to_uvec(ra.to_radians(), dec.to_radians()))
            })
            .collect::<MatchResult<Vec<_>>>()?;

        Ok(Self { uvecs })
    }

    pub fn len(&self) -> usize {
        self.uvecs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.uvecs.is_empty()
    }

    /// Unit vector of record `idx`.
    pub fn get(&self, idx: usize) -> Option<&Vector3> {
        self.uvecs.get(idx)
    }

    pub fn uvecs(&self) -> &[Vector3] {
        &self.uvecs
    }
}

/// Unit vector for a position given in radians.
pub fn radec_to_uvec(ra_rad: f64, dec_rad: f64) -> Vector3 {
    let (sin_ra, cos_ra) = ra_rad.sin_cos();
    let (sin_dec, cos_dec) = dec_rad.sin_cos();
    Vector3::new(cos_dec * cos_ra, cos_dec * sin_ra, sin_dec)
}

/// Great-circle angle between two unit vectors, in radians.
///
/// Uses `atan2(|a × b|, a · b)`, which equals `acos(clamp(a · b, -1, 1))`
/// but keeps full precision for sub-arcsecond separations and returns exactly
/// zero for identical vectors. The result is symmetric in its arguments.
pub fn angular_separation(a: &Vector3, b: &Vector3) -> f64 {
    a.cross(b).norm().atan2(a.dot(b))
}

/// Radians per arcsecond.
pub const ARCSEC_TO_RAD: f64 = std::f64::consts::PI / (180.0 * 3600.0);

pub fn arcsec_to_rad(arcsec: f64) -> f64 {
    arcsec * ARCSEC_TO_RAD
}

pub fn rad_to_arcsec(rad: f64) -> f64 {
    rad / ARCSEC_TO_RAD
}
