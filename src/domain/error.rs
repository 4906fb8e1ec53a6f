//! Domain-level errors (no external dependencies)

use thiserror::Error;

/// Domain errors represent tree construction and validation violations.
/// These are independent of where the data came from.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("tag '{tag}' is not a valid child of '{scope}'; allowed: [{allowed}]")]
    InvalidChild {
        tag: String,
        scope: String,
        allowed: String,
    },

    #[error("tag '{0}' is not in the allowed tags")]
    TagNotAllowed(String),

    #[error("maximum {max} '{tag}' children allowed in '{scope}', already have {found}")]
    TooManyChildren {
        tag: String,
        scope: String,
        max: u32,
        found: u32,
    },

    #[error("mandatory child '{tag}' missing in '{scope}': required {required}, found {found}")]
    MissingMandatoryChild {
        tag: String,
        scope: String,
        required: u32,
        found: u32,
    },

    #[error("already at root level")]
    InvalidScopeTransition,

    #[error("invalid cardinality spec for '{tag}': {spec}")]
    MalformedCardinalitySpec { tag: String, spec: String },

    #[error("store not found in tree")]
    StoreNotFound,

    #[error("node not found in tree")]
    NodeNotFound,

    #[error("node '{0}' is a leaf, not a branch")]
    NotABranch(String),
}

/// Result type for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;
