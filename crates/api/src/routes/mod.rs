//! HTTP route handlers.

pub mod applications;
pub mod health;
pub mod metrics;
pub mod sagas;
pub mod statuses;

use std::str::FromStr;

use crate::error::ApiError;

/// Parses an identifier taken from the path or query string.
pub(crate) fn parse_id<T: FromStr>(name: &str, raw: &str) -> Result<T, ApiError>
where
    T::Err: std::fmt::Display,
{
    raw.parse()
        .map_err(|e| ApiError::BadRequest(format!("Invalid {name}: {e}")))
}
