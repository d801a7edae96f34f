//! Cross-matching of a reference catalog against an input catalog.
//!
//! The pipeline is:
//!
//! 1. **Positions**: each catalog's `ra` / `dec` columns become a
//!    [`PositionSet`] of unit vectors.
//! 2. **Index**: a [`SeparationIndex`] is built over the input positions,
//!    sized for the separation limit.
//! 3. **Match**: [`matcher::run_with_index`] cone-queries the index around
//!    every reference point and records every pair within the limit in a
//!    [`MatchTable`].
//! 4. **Resolve / join**: on demand, [`MatchTable::resolve_input_for`],
//!    [`MatchTable::resolve_reference_for`] and [`MatchTable::project`] collapse
//!    candidates to the nearest one.
//!
//! [`CrossMatch`] ties the steps together for one pair of catalogs and keeps
//! the intermediate products in explicit cache fields. Replacing a catalog
//! drops everything derived from it.

pub mod join;
pub mod matcher;
pub mod resolve;
pub mod table;

use std::sync::Arc;

use tracing::{debug, info};

use crate::catalog::Catalog;
use crate::error::{CatalogSide, MatchError, MatchResult};
use crate::position::{arcsec_to_rad, PositionSet};
use crate::separation_index::{clamp_nside, nside_for, SeparationIndex};

pub use join::{JoinLabels, ProjectedTable, SEPARATION_COLUMN};
pub use resolve::{AmbiguousMatchNotice, Direction, Resolution};
pub use table::{MatchPair, MatchTable};

/// Default separation limit, in arcseconds.
pub const DEFAULT_SEPARATION_LIMIT_ARCSEC: f64 = 1.0;

// ── Configuration ───────────────────────────────────────────────────────────

/// Parameters controlling a cross-match session.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchConfig {
    /// Maximum separation for two entries to be candidates. Default 1″.
    pub separation_limit_arcsec: f64,
    /// Resolution of the input index, clamped to `1..=MAX_NSIDE`. None = size
    /// from catalog density and the separation limit.
    pub index_nside: Option<u32>,
    /// Column prefixes used by [`CrossMatch::matched_entries`].
    pub labels: JoinLabels,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            separation_limit_arcsec: DEFAULT_SEPARATION_LIMIT_ARCSEC,
            index_nside: None,
            labels: JoinLabels::default(),
        }
    }
}

impl MatchConfig {
    /// Create a configuration with the given separation limit in arcseconds.
    pub fn new(separation_limit_arcsec: f64) -> Self {
        Self {
            separation_limit_arcsec,
            ..Default::default()
        }
    }
}

// ── Session ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct CatalogSlot {
    catalog: Catalog,
    positions: Option<Arc<PositionSet>>,
}

impl CatalogSlot {
    fn new(catalog: Catalog) -> Self {
        Self {
            catalog,
            positions: None,
        }
    }
}

/// A reference / input catalog pair with cached match products.
///
/// Cache rules:
/// - Position sets are computed by [`run_match`](Self::run_match) and reused
///   until their catalog is replaced.
/// - The input index is reused while its catalog and `nside` are unchanged.
/// - Each `run_match` replaces the match table; replacing either catalog
///   drops it.
///
/// Accessors never compute anything.
#[derive(Debug, Clone, Default)]
pub struct CrossMatch {
    config: MatchConfig,
    reference: Option<CatalogSlot>,
    input: Option<CatalogSlot>,
    input_index: Option<SeparationIndex>,
    table: Option<MatchTable>,
}

impl CrossMatch {
    pub fn new(config: MatchConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    pub fn from_catalogs(reference: Catalog, input: Catalog, config: MatchConfig) -> Self {
        let mut session = Self::new(config);
        session.set_reference(reference);
        session.set_input(input);
        session
    }

    pub fn config(&self) -> &MatchConfig {
        &self.config
    }

    /// Replace the reference catalog, dropping its positions and the match table.
    pub fn set_reference(&mut self, catalog: Catalog) {
        info!("Set reference catalog with {} entries", catalog.len());
        self.reference = Some(CatalogSlot::new(catalog));
        self.table = None;
    }

    /// Replace the input catalog, dropping its positions, its index and the
    /// match table.
    pub fn set_input(&mut self, catalog: Catalog) {
        info!("Set input catalog with {} entries", catalog.len());
        self.input = Some(CatalogSlot::new(catalog));
        self.input_index = None;
        self.table = None;
    }

    pub fn catalog(&self, side: CatalogSide) -> Option<&Catalog> {
        self.slot(side).map(|slot| &slot.catalog)
    }

    pub fn reference(&self) -> Option<&Catalog> {
        self.catalog(CatalogSide::Reference)
    }

    pub fn input(&self) -> Option<&Catalog> {
        self.catalog(CatalogSide::Input)
    }

    /// Number of reference entries, if a reference catalog is set.
    pub fn num_reference(&self) -> Option<usize> {
        self.reference().map(Catalog::len)
    }

    /// Number of input entries, if an input catalog is set.
    pub fn num_input(&self) -> Option<usize> {
        self.input().map(Catalog::len)
    }

    /// Cached positions for one side, if they have been computed.
    pub fn positions(&self, side: CatalogSide) -> Option<&Arc<PositionSet>> {
        self.slot(side).and_then(|slot| slot.positions.as_ref())
    }

    /// Cached index over the input positions, if it has been built.
    pub fn input_index(&self) -> Option<&SeparationIndex> {
        self.input_index.as_ref()
    }

    pub fn match_table(&self) -> Option<&MatchTable> {
        self.table.as_ref()
    }

    pub fn is_matched(&self) -> bool {
        self.table.is_some()
    }

    /// Match with the configured separation limit.
    pub fn run_match(&mut self) -> MatchResult<&MatchTable> {
        self.run_match_with_limit(self.config.separation_limit_arcsec)
    }

    /// Match with an explicit separation limit in arcseconds, replacing any
    /// previous match table.
    ///
    /// # Errors
    /// [`MatchError::InvalidLimit`] for a negative or non-finite limit,
    /// [`MatchError::MissingCatalog`] if a catalog was never set, and
    /// [`MatchError::InvalidCatalog`] if a catalog's positions are unusable.
    pub fn run_match_with_limit(&mut self, limit_arcsec: f64) -> MatchResult<&MatchTable> {
        if !limit_arcsec.is_finite() || limit_arcsec < 0.0 {
            return Err(MatchError::InvalidLimit(limit_arcsec));
        }
        let limit_rad = arcsec_to_rad(limit_arcsec);

        let reference = Self::ensure_positions(self.reference.as_mut(), CatalogSide::Reference)?;
        let input = Self::ensure_positions(self.input.as_mut(), CatalogSide::Input)?;

        let nside = self
            .config
            .index_nside
            .map(clamp_nside)
            .unwrap_or_else(|| nside_for(input.len(), Some(limit_rad)));
        let index = match self.input_index.take() {
            Some(index) if index.nside() == nside => {
                debug!("Reusing input index (nside={})", nside);
                index
            }
            _ => SeparationIndex::new(nside, input),
        };

        let table = matcher::run_with_index(&reference, &index, limit_rad);
        self.input_index = Some(index);

        info!(
            "Cross-matched {} reference and {} input entries within {}\": {} pairs",
            table.num_reference(),
            table.num_input(),
            limit_arcsec,
            table.len()
        );
        Ok(&*self.table.insert(table))
    }

    /// Nearest input entry for each reference index.
    pub fn matched_input_for(&self, reference_indices: &[usize]) -> MatchResult<Resolution> {
        Ok(self.table()?.resolve_input_for(reference_indices))
    }

    /// Nearest reference entry for each input index.
    pub fn matched_reference_for(&self, input_indices: &[usize]) -> MatchResult<Resolution> {
        Ok(self.table()?.resolve_reference_for(input_indices))
    }

    /// Joined table of nearest matches with the requested columns from both
    /// catalogs, prefixed with the configured labels.
    pub fn matched_entries<S: AsRef<str>>(&self, columns: &[S]) -> MatchResult<ProjectedTable> {
        let table = self.table()?;
        let reference = self
            .reference()
            .ok_or(MatchError::MissingCatalog(CatalogSide::Reference))?;
        let input = self
            .input()
            .ok_or(MatchError::MissingCatalog(CatalogSide::Input))?;
        table.project(reference, input, columns, &self.config.labels)
    }

    fn table(&self) -> MatchResult<&MatchTable> {
        self.table.as_ref().ok_or(MatchError::NotMatched)
    }

    fn slot(&self, side: CatalogSide) -> Option<&CatalogSlot> {
        match side {
            CatalogSide::Reference => self.reference.as_ref(),
            CatalogSide::Input => self.input.as_ref(),
        }
    }

    fn ensure_positions(
        slot: Option<&mut CatalogSlot>,
        side: CatalogSide,
    ) -> MatchResult<Arc<PositionSet>> {
        let slot = slot.ok_or(MatchError::MissingCatalog(side))?;
        if let Some(positions) = &slot.positions {
            debug!("Reusing {} positions", side);
            return Ok(positions.clone());
        }
        let positions = Arc::new(PositionSet::build(&slot.catalog)?);
        slot.positions = Some(positions.clone());
        Ok(positions)
    }
}
