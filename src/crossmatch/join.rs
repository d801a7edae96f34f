//! Projection of matched catalog rows into a single joined table.
//!
//! Each reference row is resolved to its nearest input row; reference rows
//! with no candidate produce no output. Requested columns are validated
//! against both catalogs before any row is built.

use crate::catalog::Catalog;
use crate::error::{CatalogSide, MatchError, MatchResult};

use super::resolve::AmbiguousMatchNotice;
use super::table::MatchTable;

/// Name of the separation column in a [`ProjectedTable`].
pub const SEPARATION_COLUMN: &str = "angsep_arcsec";

/// Prefixes for the two sides of a joined table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinLabels {
    pub reference: String,
    pub input: String,
}

impl Default for JoinLabels {
    fn default() -> Self {
        Self {
            reference: "catref".to_string(),
            input: "catin".to_string(),
        }
    }
}

/// One row per resolved reference entry.
///
/// Columns, in order: `{reference}_index`, `{input}_index`,
/// `angsep_arcsec`, then `{reference}_{col}` and `{input}_{col}` for each
/// requested column.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectedTable {
    labels: JoinLabels,
    reference_index: Vec<usize>,
    input_index: Vec<usize>,
    separation_arcsec: Vec<f64>,
    fields: Vec<(String, Vec<f64>)>,
    collapsed: usize,
}

impl ProjectedTable {
    pub fn num_rows(&self) -> usize {
        self.reference_index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reference_index.is_empty()
    }

    pub fn labels(&self) -> &JoinLabels {
        &self.labels
    }

    pub fn reference_index(&self) -> &[usize] {
        &self.reference_index
    }

    pub fn input_index(&self) -> &[usize] {
        &self.input_index
    }

    pub fn separation_arcsec(&self) -> &[f64] {
        &self.separation_arcsec
    }

    /// A floating-point column by output name (the separation or a projected field).
    pub fn column(&self, name: &str) -> Option<&[f64]> {
        if name == SEPARATION_COLUMN {
            return Some(&self.separation_arcsec);
        }
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, values)| values.as_slice())
    }

    /// Projected field columns, in output order.
    pub fn fields(&self) -> &[(String, Vec<f64>)] {
        &self.fields
    }

    /// All output column names, in order.
    pub fn column_names(&self) -> Vec<String> {
        let mut names = vec![
            format!("{}_index", self.labels.reference),
            format!("{}_index", self.labels.input),
            SEPARATION_COLUMN.to_string(),
        ];
        names.extend(self.fields.iter().map(|(name, _)| name.clone()));
        names
    }

    /// Reference rows that had several candidates before projection.
    pub fn collapsed(&self) -> usize {
        self.collapsed
    }

    pub fn notice(&self) -> Option<AmbiguousMatchNotice> {
        (self.collapsed > 0).then_some(AmbiguousMatchNotice {
            collapsed: self.collapsed,
            requested: self.reference_index.len(),
        })
    }
}

impl MatchTable {
    /// Join the two catalogs along nearest-resolved pairs.
    ///
    /// # Errors
    /// [`MatchError::UnknownColumn`] if a requested column is missing from
    /// either catalog, and [`MatchError::InvalidCatalog`] if a catalog's
    /// length differs from the one this table was built from.
    pub fn project<S: AsRef<str>>(
        &self,
        reference: &Catalog,
        input: &Catalog,
        columns: &[S],
        labels: &JoinLabels,
    ) -> MatchResult<ProjectedTable> {
        check_len(reference, self.num_reference(), CatalogSide::Reference)?;
        check_len(input, self.num_input(), CatalogSide::Input)?;

        let mut requested: Vec<&str> = Vec::with_capacity(columns.len());
        for column in columns.iter().map(|c| c.as_ref()) {
            if !requested.contains(&column) {
                requested.push(column);
            }
        }
        let sources = requested
            .iter()
            .map(|&column| {
                let reference_values = reference
                    .column(column)
                    .ok_or_else(|| MatchError::unknown_column(column, CatalogSide::Reference))?;
                let input_values = input
                    .column(column)
                    .ok_or_else(|| MatchError::unknown_column(column, CatalogSide::Input))?;
                Ok((column, reference_values, input_values))
            })
            .collect::<MatchResult<Vec<_>>>()?;

        let all_reference: Vec<usize> = (0..self.num_reference()).collect();
        let resolution = self.resolve_input_for(&all_reference);
        let pairs: Vec<_> = resolution.nearest().iter().flatten().collect();

        let mut fields = Vec::with_capacity(2 * sources.len());
        for (column, reference_values, input_values) in sources {
            fields.push((
                format!("{}_{}", labels.reference, column),
                pairs.iter().map(|p| reference_values[p.reference_index]).collect(),
            ));
            fields.push((
                format!("{}_{}", labels.input, column),
                pairs.iter().map(|p| input_values[p.input_index]).collect(),
            ));
        }

        Ok(ProjectedTable {
            labels: labels.clone(),
            reference_index: pairs.iter().map(|p| p.reference_index).collect(),
            input_index: pairs.iter().map(|p| p.input_index).collect(),
            separation_arcsec: pairs.iter().map(|p| p.separation_arcsec()).collect(),
            fields,
            collapsed: resolution.collapsed(),
        })
    }
}

fn check_len(catalog: &Catalog, expected: usize, side: CatalogSide) -> MatchResult<()> {
    if catalog.len() == expected {
        Ok(())
    } else {
        Err(MatchError::invalid_catalog(format!(
            "{} catalog has {} rows but the match table was built for {}",
            side,
            catalog.len(),
            expected
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crossmatch::table::MatchPair;

    fn catalogs() -> (Catalog, Catalog) {
        let reference = Catalog::from_columns([
            ("ra", vec![10.0, 20.0, 30.0]),
            ("dec", vec![0.0, 0.0, 0.0]),
            ("mag", vec![15.0, 16.0, 17.0]),
        ])
        .unwrap();
        let input = Catalog::from_columns([
            ("ra", vec![30.0, 10.0, 10.0]),
            ("dec", vec![0.0, 0.0, 0.0]),
            ("mag", vec![17.2, 15.1, 15.3]),
            ("snr", vec![5.0, 50.0, 40.0]),
        ])
        .unwrap();
        (reference, input)
    }

    fn table() -> MatchTable {
        let pair = |reference_index, input_index, separation_rad| MatchPair {
            reference_index,
            input_index,
            separation_rad,
        };
        MatchTable::new(
            vec![pair(0, 1, 2e-6), pair(0, 2, 1e-6), pair(2, 0, 3e-6)],
            3,
            3,
            5e-6,
        )
    }

    #[test]
    fn projects_nearest_pairs_with_prefixed_columns() {
        let (reference, input) = catalogs();
        let joined = table()
            .project(&reference, &input, &["mag"], &JoinLabels::default())
            .unwrap();

        assert_eq!(
            joined.column_names(),
            vec!["catref_index", "catin_index", "angsep_arcsec", "catref_mag", "catin_mag"]
        );
        assert_eq!(joined.num_rows(), 2);
        assert_eq!(joined.reference_index(), &[0, 2]);
        assert_eq!(joined.input_index(), &[2, 0]);
        assert_eq!(joined.column("catref_mag"), Some(&[15.0, 17.0][..]));
        assert_eq!(joined.column("catin_mag"), Some(&[15.3, 17.2][..]));
        assert_eq!(joined.collapsed(), 1);

        let sep = joined.column(SEPARATION_COLUMN).unwrap();
        assert!((sep[0] - crate::position::rad_to_arcsec(1e-6)).abs() < 1e-9);
    }

    #[test]
    fn custom_labels_prefix_columns() {
        let (reference, input) = catalogs();
        let labels = JoinLabels {
            reference: "ref".to_string(),
            input: "sci".to_string(),
        };
        let joined = table().project(&reference, &input, &["ra"], &labels).unwrap();
        assert_eq!(joined.column_names()[0], "ref_index");
        assert!(joined.column("sci_ra").is_some());
    }

    #[test]
    fn unknown_column_fails_without_output() {
        let (reference, input) = catalogs();
        let err = table()
            .project(&reference, &input, &["mag", "snr"], &JoinLabels::default())
            .unwrap_err();
        assert_eq!(err, MatchError::unknown_column("snr", CatalogSide::Reference));

        let err = table()
            .project(&input, &reference, &["snr"], &JoinLabels::default())
            .unwrap_err();
        assert_eq!(err, MatchError::unknown_column("snr", CatalogSide::Input));
    }

    #[test]
    fn catalog_length_must_match_table() {
        let (reference, _) = catalogs();
        let short = Catalog::from_positions(vec![1.0], vec![1.0]).unwrap();
        let err = table()
            .project(&reference, &short, &["ra"], &JoinLabels::default())
            .unwrap_err();
        assert!(matches!(err, MatchError::InvalidCatalog { .. }));
    }

    #[test]
    fn duplicate_requested_columns_are_projected_once() {
        let (reference, input) = catalogs();
        let joined = table()
            .project(&reference, &input, &["mag", "mag"], &JoinLabels::default())
            .unwrap();
        assert_eq!(joined.fields().len(), 2);
    }
}
