//! Error taxonomy shared by every tree operation.

use thiserror::Error;

use crate::fieldpath::Path;
use crate::interpolation::InterpolationError;
use crate::schema::SchemaError;
use crate::typed::ValidationError;

/// Error is returned by every validating, merging, resolving or projecting
/// operation. A failed operation never leaves a partially modified tree.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum Error {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("{path}: missing mandatory value")]
    MissingMandatoryValue { path: String },

    #[error("{path}: cannot modify read-only config")]
    Readonly { path: String },

    #[error(transparent)]
    Interpolation(#[from] InterpolationError),

    #[error(transparent)]
    Schema(#[from] SchemaError),
}

impl Error {
    pub fn missing(path: &Path) -> Self {
        Error::MissingMandatoryValue {
            path: path.to_string(),
        }
    }

    pub fn readonly(path: &Path) -> Self {
        Error::Readonly {
            path: path.to_string(),
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Error::Validation(_))
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Error::MissingMandatoryValue { .. })
    }

    pub fn is_readonly(&self) -> bool {
        matches!(self, Error::Readonly { .. })
    }

    pub fn is_interpolation(&self) -> bool {
        matches!(self, Error::Interpolation(_))
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
