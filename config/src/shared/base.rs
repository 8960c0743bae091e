use thiserror::Error;

/// Errors returned by the `validate` methods of configuration types.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// A field holds a value outside of its allowed domain.
    #[error("invalid value for `{field}`: {constraint}")]
    InvalidFieldValue { field: String, constraint: String },
    /// A list field that must contain at least one element is empty.
    #[error("`{0}` must contain at least one entry")]
    EmptyList(String),
    /// A column is listed both as an identifying column and as a change column.
    #[error("column `{0}` cannot be both a key column and a change column")]
    OverlappingColumn(String),
}
