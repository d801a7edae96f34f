//! Column-oriented catalog of point sources.
//!
//! A `Catalog` is an ordered set of records stored as named `f64` columns of
//! equal length. A record's identity is its 0-based row index, which is the
//! key used everywhere else in the crate. Matching requires the `ra` and
//! `dec` columns (degrees); any other numeric columns ride along and can be
//! projected into the joined output.

use crate::error::{MatchError, MatchResult};

/// Column holding right ascension in degrees.
pub const RA_COLUMN: &str = "ra";
/// Column holding declination in degrees.
pub const DEC_COLUMN: &str = "dec";

#[derive(Debug, Clone, PartialEq)]
struct Column {
    name: String,
    values: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Catalog {
    columns: Vec<Column>,
    len: usize,
}

impl Catalog {
    /// An empty catalog with no columns and no rows.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a catalog holding only position columns.
    pub fn from_positions(ra_deg: Vec<f64>, dec_deg: Vec<f64>) -> MatchResult<Self> {
        Self::new()
            .with_column(RA_COLUMN, ra_deg)?
            .with_column(DEC_COLUMN, dec_deg)
    }

    /// Build a catalog from `(name, values)` pairs, in order.
    pub fn from_columns<I, S>(columns: I) -> MatchResult<Self>
    where
        I: IntoIterator<Item = (S, Vec<f64>)>,
        S: Into<String>,
    {
        columns
            .into_iter()
            .try_fold(Self::new(), |catalog, (name, values)| {
                catalog.with_column(name, values)
            })
    }

    /// Append a column.
    ///
    /// The first column fixes the catalog length; every later column must
    /// match it. Column names must be unique.
    pub fn with_column(mut self, name: impl Into<String>, values: Vec<f64>) -> MatchResult<Self> {
        let name = name.into();
        if self.has_column(&name) {
            return Err(MatchError::invalid_catalog(format!(
                "duplicate column `{name}`"
            )));
        }
        if !self.columns.is_empty() && values.len() != self.len {
            return Err(MatchError::invalid_catalog(format!(
                "column `{}` has {} rows but the catalog has {}",
                name,
                values.len(),
                self.len
            )));
        }
        self.len = values.len();
        self.columns.push(Column { name, values });
        Ok(self)
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }

    /// Values of a column, or `None` if the catalog has no such column.
    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.values.as_slice())
    }

    /// Column names in insertion order.
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn columns_are_looked_up_by_name() {
        let catalog = Catalog::from_columns([
            ("ra", vec![10.0, 20.0]),
            ("dec", vec![-5.0, 5.0]),
            ("mag", vec![12.5, 13.1]),
        ])
        .unwrap();

        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.column("mag"), Some(&[12.5, 13.1][..]));
        assert!(catalog.column("flux").is_none());
        assert_eq!(
            catalog.column_names().collect::<Vec<_>>(),
            vec!["ra", "dec", "mag"]
        );
    }

    #[test]
    fn rejects_ragged_columns() {
        let err = Catalog::from_positions(vec![1.0, 2.0], vec![3.0]).unwrap_err();
        assert!(matches!(err, MatchError::InvalidCatalog { .. }));
    }

    #[test]
    fn rejects_duplicate_names() {
        let err = Catalog::new()
            .with_column("ra", vec![1.0])
            .and_then(|c| c.with_column("ra", vec![2.0]))
            .unwrap_err();
        assert!(matches!(err, MatchError::InvalidCatalog { .. }));
    }

    #[test]
    fn empty_catalog_has_no_rows() {
        let catalog = Catalog::new();
        assert!(catalog.is_empty());
        assert_eq!(catalog.column_names().count(), 0);
    }
}
