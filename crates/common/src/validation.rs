//! Garde validation utilities.

use crate::domain::DomainError;
use garde::{Report, Validate};

/// Convert a garde validation report to DomainError
pub fn validate_struct<T>(value: &T) -> Result<(), DomainError>
where
    T: Validate,
    T::Context: Default,
{
    value
        .validate()
        .map_err(|report| DomainError::ValidationError(format_validation_errors(&report)))
}

/// Format validation errors from a garde Report into a human-readable string
fn format_validation_errors(report: &Report) -> String {
    report
        .iter()
        .map(|(path, error)| {
            if path.to_string().is_empty() {
                error.message().to_string()
            } else {
                format!("{}: {}", path, error.message())
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}
