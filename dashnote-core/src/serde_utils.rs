use serde_json::Value;

use crate::errors::{DashnoteError, Result};

/// Decodes an untyped JSON document, reporting failures as an invalid dashboard.
pub fn from_json_value<T: serde::de::DeserializeOwned>(value: &Value) -> Result<T> {
    T::deserialize(value).map_err(|err| DashnoteError::InvalidDashboard(err.to_string()))
}
