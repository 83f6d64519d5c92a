//! HTTP route handlers.

pub mod health;
pub mod inventory;
pub mod metrics;
pub mod orders;
pub mod restock;

use std::str::FromStr;

use crate::error::ApiError;

/// Parses a path or body identifier, naming the field on failure.
pub(crate) fn parse_id<T: FromStr>(field: &str, raw: &str) -> Result<T, ApiError>
where
    T::Err: std::fmt::Display,
{
    raw.parse()
        .map_err(|e| ApiError::BadRequest(format!("Invalid {field}: {e}")))
}
