use std::ffi::CString;

use numpy::{PyArray1, PyReadonlyArray1};
use pyo3::exceptions::{PyKeyError, PyRuntimeError, PyUserWarning, PyValueError};
use pyo3::prelude::*;
use pyo3::types::PyDict;

use catmatch_rs::{Catalog, MatchError, ProjectedTable, Resolution};

/// Map a crate error onto the closest Python exception type.
pub(crate) fn to_py_err(err: MatchError) -> PyErr {
    match err {
        MatchError::UnknownColumn { .. } => PyKeyError::new_err(err.to_string()),
        MatchError::InvalidCatalog { .. } | MatchError::InvalidLimit(_) => {
            PyValueError::new_err(err.to_string())
        }
        MatchError::MissingCatalog(_)
        | MatchError::NotMatched
        | MatchError::Serialization(_) => PyRuntimeError::new_err(err.to_string()),
    }
}

/// Build a catalog from a `{name: array}` mapping.
///
/// Values may be 1-D float64 numpy arrays or any sequence of floats.
/// Columns keep the dict's iteration order.
pub(crate) fn catalog_from_dict(columns: &Bound<'_, PyDict>) -> PyResult<Catalog> {
    let mut catalog = Catalog::new();
    for (key, value) in columns.iter() {
        let name: String = key.extract().map_err(|_| {
            pyo3::exceptions::PyTypeError::new_err("catalog column names must be strings")
        })?;
        let values: Vec<f64> = if let Ok(arr) = value.extract::<PyReadonlyArray1<f64>>() {
            arr.as_array().to_vec()
        } else {
            value.extract::<Vec<f64>>()?
        };
        catalog = catalog.with_column(name, values).map_err(to_py_err)?;
    }
    Ok(catalog)
}

/// Surface the collapsed-candidate count as a Python `UserWarning`.
pub(crate) fn warn_collapsed(py: Python<'_>, collapsed: usize, requested: usize) -> PyResult<()> {
    if collapsed == 0 {
        return Ok(());
    }
    let message = CString::new(format!(
        "{collapsed} of {requested} requested entries matched several entries; nearest used"
    ))?;
    PyErr::warn(py, &py.get_type::<PyUserWarning>(), &message, 1)
}

/// Convert a resolution into a dict of numpy arrays.
///
/// Keys: 'index' (int64, -1 where unmatched), 'angsep_arcsec' (float64,
/// NaN where unmatched) and 'n_collapsed' (int).
pub(crate) fn resolution_to_dict<'py>(
    py: Python<'py>,
    resolution: &Resolution,
) -> PyResult<Bound<'py, PyDict>> {
    let index: Vec<i64> = resolution
        .counterparts()
        .into_iter()
        .map(|c| c.map_or(-1, |i| i as i64))
        .collect();
    let separation: Vec<f64> = resolution
        .nearest()
        .iter()
        .map(|p| p.map_or(f64::NAN, |p| p.separation_arcsec()))
        .collect();

    let dict = PyDict::new(py);
    dict.set_item("index", PyArray1::from_vec(py, index))?;
    dict.set_item("angsep_arcsec", PyArray1::from_vec(py, separation))?;
    dict.set_item("n_collapsed", resolution.collapsed())?;
    Ok(dict)
}

/// Convert a joined table into an ordered dict of numpy arrays.
pub(crate) fn projected_to_dict<'py>(
    py: Python<'py>,
    joined: &ProjectedTable,
) -> PyResult<Bound<'py, PyDict>> {
    let as_i64 = |v: &[usize]| v.iter().map(|&i| i as i64).collect::<Vec<i64>>();
    let labels = joined.labels();

    let dict = PyDict::new(py);
    dict.set_item(
        format!("{}_index", labels.reference),
        PyArray1::from_vec(py, as_i64(joined.reference_index())),
    )?;
    dict.set_item(
        format!("{}_index", labels.input),
        PyArray1::from_vec(py, as_i64(joined.input_index())),
    )?;
    dict.set_item(
        catmatch_rs::crossmatch::join::SEPARATION_COLUMN,
        PyArray1::from_slice(py, joined.separation_arcsec()),
    )?;
    for (name, values) in joined.fields() {
        dict.set_item(name, PyArray1::from_slice(py, values))?;
    }
    Ok(dict)
}
