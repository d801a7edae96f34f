//! # catmatch
//!
//! Positional **cross-matching of astronomical catalogs** on the celestial sphere.
//!
//! Given a *reference* catalog and an *input* catalog of point sources with
//! right ascension and declination, `catmatch` finds every pair of entries
//! closer than a separation limit, then answers "what matched entry X"
//! queries and joins matched rows, collapsing multiple candidates to the
//! nearest one.
//!
//! ## Features
//!
//! - **All pairs within radius**: the match table keeps every candidate;
//!   nearest-pick collapsing only happens at query time
//! - **Fast**: HEALPix-style equal-area binning keeps cone searches local, so
//!   catalogs of tens of thousands of entries never fall back to O(n·m)
//! - **Symmetric**: swapping reference and input yields the same pairs with
//!   bit-identical separations
//! - **Diagnosable**: collapsing several candidates is reported as an
//!   [`AmbiguousMatchNotice`] alongside an unchanged result
//!
//! ## Example
//!
//! ```
//! use catmatch::{Catalog, CrossMatch, MatchConfig};
//!
//! let reference = Catalog::from_columns([
//!     ("ra", vec![10.0, 100.0]),
//!     ("dec", vec![20.0, -50.0]),
//!     ("mag", vec![14.2, 17.9]),
//! ])?;
//! let input = Catalog::from_columns([
//!     ("ra", vec![10.0001]),
//!     ("dec", vec![20.0]),
//!     ("mag", vec![14.3]),
//! ])?;
//!
//! let mut session = CrossMatch::from_catalogs(reference, input, MatchConfig::new(1.0));
//! let table = session.run_match()?;
//! assert_eq!(table.len(), 1);
//!
//! let joined = session.matched_entries(&["mag"])?;
//! assert_eq!(joined.reference_index(), &[0]);
//! assert_eq!(joined.column("catin_mag"), Some(&[14.3][..]));
//! # Ok::<(), catmatch::MatchError>(())
//! ```
//!
//! ## Algorithm overview
//!
//! 1. **Positions**: `ra` / `dec` (degrees) become unit vectors, so
//!    separations avoid the RA wrap and the poles
//! 2. **Index**: input points are binned into `12 * nside²` cells sized for
//!    the separation limit
//! 3. **Match**: each reference point queries only the cells its cone can
//!    reach, and exact separations filter the candidates
//! 4. **Resolve**: per-key candidate lists are collapsed to the nearest on demand

mod catalog;
pub mod crossmatch;
pub mod error;
pub mod position;
pub mod separation_index;

pub use catalog::*;
pub use crossmatch::{
    AmbiguousMatchNotice, CrossMatch, Direction, JoinLabels, MatchConfig, MatchPair, MatchTable,
    ProjectedTable, Resolution,
};
pub use error::{CatalogSide, MatchError, MatchResult};
pub use position::{angular_separation, arcsec_to_rad, rad_to_arcsec, PositionSet};
pub use separation_index::SeparationIndex;

// Separations down to milli-arcseconds need 64-bit floats throughout.
pub type Vector3 = nalgebra::Vector3<f64>;
