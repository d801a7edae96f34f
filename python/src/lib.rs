//! Python bindings for catmatch via PyO3.
//!
//! Exposes the catalog cross-matcher to Python as the `catmatch` module.

mod helpers;

use pyo3::prelude::*;
use pyo3::types::PyDict;

use catmatch_rs::crossmatch::DEFAULT_SEPARATION_LIMIT_ARCSEC;
use catmatch_rs::{CatalogSide, CrossMatch, JoinLabels, MatchConfig, MatchError};

use helpers::{catalog_from_dict, projected_to_dict, resolution_to_dict, to_py_err, warn_collapsed};

// ═══════════════════════════════════════════════════════════════════════════
// PyCatMatch: wraps CrossMatch
// ═══════════════════════════════════════════════════════════════════════════

/// Cross-match a reference catalog against an input catalog.
///
/// Catalogs are dicts mapping column names to 1-D float arrays; both need
/// 'ra' and 'dec' columns in degrees.
///
/// Example:
///     cm = catmatch.CatMatch(catref={"ra": ra1, "dec": dec1},
///                            catin={"ra": ra2, "dec": dec2, "mag": mag2})
///     cm.match(seplimit_arcsec=1.0)
///     cm.get_matched_catinindex([0, 1])
#[pyclass(name = "CatMatch")]
struct PyCatMatch {
    inner: CrossMatch,
}

#[pymethods]
impl PyCatMatch {
    /// Args:
    ///     catref: Reference catalog dict. Can be set later with set_catref.
    ///     catin: Input catalog dict. Can be set later with set_catin.
    ///     seplimit_arcsec: Default separation limit. Default 1.
    ///     index_nside: Input index resolution, clamped to 1..1024. None = automatic.
    #[new]
    #[pyo3(signature = (
        catref = None,
        catin = None,
        seplimit_arcsec = DEFAULT_SEPARATION_LIMIT_ARCSEC,
        index_nside = None,
    ))]
    fn new(
        catref: Option<&Bound<'_, PyDict>>,
        catin: Option<&Bound<'_, PyDict>>,
        seplimit_arcsec: f64,
        index_nside: Option<u32>,
    ) -> PyResult<Self> {
        let config = MatchConfig {
            separation_limit_arcsec: seplimit_arcsec,
            index_nside,
            labels: JoinLabels::default(),
        };
        let mut inner = CrossMatch::new(config);
        if let Some(catalog) = catref {
            inner.set_reference(catalog_from_dict(catalog)?);
        }
        if let Some(catalog) = catin {
            inner.set_input(catalog_from_dict(catalog)?);
        }
        Ok(PyCatMatch { inner })
    }

    /// Replace the reference catalog. Drops any previous match.
    fn set_catref(&mut self, catalog: &Bound<'_, PyDict>) -> PyResult<()> {
        self.inner.set_reference(catalog_from_dict(catalog)?);
        Ok(())
    }

    /// Replace the input catalog. Drops any previous match and index.
    fn set_catin(&mut self, catalog: &Bound<'_, PyDict>) -> PyResult<()> {
        self.inner.set_input(catalog_from_dict(catalog)?);
        Ok(())
    }

    /// Find every reference/input pair within the separation limit.
    ///
    /// Args:
    ///     seplimit_arcsec: Separation limit. None = the constructor value.
    ///
    /// Returns:
    ///     Number of candidate pairs found.
    #[pyo3(name = "match", signature = (seplimit_arcsec = None))]
    fn run_match(&mut self, py: Python<'_>, seplimit_arcsec: Option<f64>) -> PyResult<usize> {
        let limit =
            seplimit_arcsec.unwrap_or(self.inner.config().separation_limit_arcsec);
        let inner = &mut self.inner;
        py.detach(|| inner.run_match_with_limit(limit).map(|table| table.len()))
            .map_err(to_py_err)
    }

    /// Nearest input entry for each reference index.
    ///
    /// Returns:
    ///     dict with keys 'index' (-1 = no match), 'angsep_arcsec' and
    ///     'n_collapsed'. A UserWarning is issued when n_collapsed > 0.
    fn get_matched_catinindex<'py>(
        &self,
        py: Python<'py>,
        catref_index: Vec<usize>,
    ) -> PyResult<Bound<'py, PyDict>> {
        let resolution = self
            .inner
            .matched_input_for(&catref_index)
            .map_err(to_py_err)?;
        warn_collapsed(py, resolution.collapsed(), resolution.len())?;
        resolution_to_dict(py, &resolution)
    }

    /// Nearest reference entry for each input index.
    ///
    /// Same return shape as get_matched_catinindex.
    fn get_matched_catrefindex<'py>(
        &self,
        py: Python<'py>,
        catin_index: Vec<usize>,
    ) -> PyResult<Bound<'py, PyDict>> {
        let resolution = self
            .inner
            .matched_reference_for(&catin_index)
            .map_err(to_py_err)?;
        warn_collapsed(py, resolution.collapsed(), resolution.len())?;
        resolution_to_dict(py, &resolution)
    }

    /// Joined table of matched rows, one per matched reference entry.
    ///
    /// Args:
    ///     columns: Column names to project from both catalogs.
    ///     catin_label: Prefix for input columns. Default 'catin'.
    ///     catref_label: Prefix for reference columns. Default 'catref'.
    ///
    /// Returns:
    ///     dict of numpy arrays: '{catref_label}_index', '{catin_label}_index',
    ///     'angsep_arcsec', then '{label}_{column}' for each side.
    #[pyo3(signature = (columns, catin_label = "catin", catref_label = "catref"))]
    fn get_matched_entries<'py>(
        &self,
        py: Python<'py>,
        columns: Vec<String>,
        catin_label: &str,
        catref_label: &str,
    ) -> PyResult<Bound<'py, PyDict>> {
        let table = self.inner.match_table().ok_or_else(|| to_py_err(MatchError::NotMatched))?;
        let reference = self
            .inner
            .reference()
            .ok_or_else(|| to_py_err(MatchError::MissingCatalog(CatalogSide::Reference)))?;
        let input = self
            .inner
            .input()
            .ok_or_else(|| to_py_err(MatchError::MissingCatalog(CatalogSide::Input)))?;
        let labels = JoinLabels {
            reference: catref_label.to_string(),
            input: catin_label.to_string(),
        };
        let joined = table
            .project(reference, input, &columns, &labels)
            .map_err(to_py_err)?;
        warn_collapsed(py, joined.collapsed(), table.num_reference())?;
        projected_to_dict(py, &joined)
    }

    /// Number of entries in the reference catalog (0 if unset).
    #[getter]
    fn ncatref_entries(&self) -> usize {
        self.inner.num_reference().unwrap_or(0)
    }

    /// Number of entries in the input catalog (0 if unset).
    #[getter]
    fn ncatin_entries(&self) -> usize {
        self.inner.num_input().unwrap_or(0)
    }

    /// Whether a match table is available.
    #[getter]
    fn is_matched(&self) -> bool {
        self.inner.is_matched()
    }

    fn __repr__(&self) -> String {
        format!(
            "CatMatch(ncatref={}, ncatin={}, seplimit={}\", matched={})",
            self.ncatref_entries(),
            self.ncatin_entries(),
            self.inner.config().separation_limit_arcsec,
            self.inner.is_matched(),
        )
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Module definition
// ═══════════════════════════════════════════════════════════════════════════

/// catmatch: Fast angular cross-matching of point-source catalogs
///
/// Exposed to Python via PyO3.
#[pymodule]
fn catmatch(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PyCatMatch>()?;
    m.add("DEFAULT_SEPLIMIT_ARCSEC", DEFAULT_SEPARATION_LIMIT_ARCSEC)?;
    Ok(())
}
