//! Field validation shared by the checkout form and the order payload.

use std::borrow::Cow;
use thiserror::Error;
use validator::{ValidationError as RuleViolation, ValidationErrors};

/// A single invalid or missing input field.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field} {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: Cow<'static, str>,
}

impl ValidationError {
    pub fn new(field: &'static str, message: impl Into<Cow<'static, str>>) -> Self {
        Self { field, message: message.into() }
    }

    pub fn missing(field: &'static str) -> Self { Self::new(field, "is required") }
}

/// `validator` rule: non-empty after trimming.
pub fn not_blank(value: &str) -> Result<(), RuleViolation> {
    if value.trim().is_empty() { Err(RuleViolation::new("blank")) } else { Ok(()) }
}

fn describe(code: &str) -> &'static str {
    match code {
        "blank" => "is required",
        "email" => "is not a valid email address",
        _ => "is invalid",
    }
}

/// Reduce `validator`'s error map to the first failing field, in the caller's field order.
pub fn first_failure(errors: &ValidationErrors, field_order: &[&'static str]) -> ValidationError {
    let by_field = errors.field_errors();
    field_order
        .iter()
        .find_map(|&field| {
            by_field.get(field).map(|violations| {
                // blank beats any format complaint on the same field
                let code = violations
                    .iter()
                    .map(|v| v.code.as_ref())
                    .find(|c| *c == "blank")
                    .or_else(|| violations.first().map(|v| v.code.as_ref()))
                    .unwrap_or("invalid");
                ValidationError::new(field, describe(code))
            })
        })
        .unwrap_or_else(|| ValidationError::new("form", errors.to_string()))
}
