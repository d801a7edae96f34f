//! Error type for catalog cross-matching.
//!
//! | Variant | Raised by | Recoverable? |
//! |---------|-----------|--------------|
//! | [`InvalidCatalog`](MatchError::InvalidCatalog) | catalog / position set construction | No, fix the input |
//! | [`UnknownColumn`](MatchError::UnknownColumn) | [`MatchTable::project`](crate::MatchTable::project) | No, fix the column list |
//! | [`MissingCatalog`](MatchError::MissingCatalog) | [`CrossMatch`](crate::CrossMatch) before a catalog was set | Yes |
//! | [`NotMatched`](MatchError::NotMatched) | [`CrossMatch`](crate::CrossMatch) queries before `run_match` | Yes |
//! | [`InvalidLimit`](MatchError::InvalidLimit) | negative or non-finite separation limit | No |
//! | [`Serialization`](MatchError::Serialization) | [`MatchTable::from_rkyv_bytes`](crate::MatchTable::from_rkyv_bytes) | No |
//!
//! Ambiguous matches are *not* errors; see
//! [`AmbiguousMatchNotice`](crate::AmbiguousMatchNotice).

use std::fmt;

use thiserror::Error;

/// Which side of a cross-match a catalog plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CatalogSide {
    Reference,
    Input,
}

impl fmt::Display for CatalogSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CatalogSide::Reference => write!(f, "reference"),
            CatalogSide::Input => write!(f, "input"),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MatchError {
    /// Position columns are missing, non-finite or out of range, or the
    /// catalog columns are inconsistent.
    #[error("Invalid catalog: {reason}")]
    InvalidCatalog { reason: String },

    /// A projection column is absent from one of the catalogs.
    #[error("Unknown column `{column}` in {side} catalog")]
    UnknownColumn { column: String, side: CatalogSide },

    #[error("No {0} catalog has been set")]
    MissingCatalog(CatalogSide),

    #[error("Catalogs have not been matched yet; call run_match first")]
    NotMatched,

    #[error("Invalid separation limit: {0} (must be finite and >= 0)")]
    InvalidLimit(f64),

    #[error("Match table deserialization failed: {0}")]
    Serialization(String),
}

impl MatchError {
    pub fn invalid_catalog(reason: impl Into<String>) -> Self {
        MatchError::InvalidCatalog {
            reason: reason.into(),
        }
    }

    pub fn unknown_column(column: impl Into<String>, side: CatalogSide) -> Self {
        MatchError::UnknownColumn {
            column: column.into(),
            side,
        }
    }
}

pub type MatchResult<T> = Result<T, MatchError>;
