//! API request handlers

pub mod chunks;
pub mod health;

use crate::error::ApiError;

/// A parameter that must be present and non-empty.
pub(crate) fn required<'a>(
    value: &'a Option<String>,
    param: &'static str,
) -> Result<&'a str, ApiError> {
    match value.as_deref() {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(ApiError::missing(param)),
    }
}

/// A required unsigned integer parameter.
pub(crate) fn required_u64(value: &Option<String>, param: &'static str) -> Result<u64, ApiError> {
    required(value, param)?
        .parse::<u64>()
        .map_err(|e| ApiError::BadParameter {
            param,
            reason: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required() {
        assert_eq!(required(&Some("numbers".to_string()), "category").unwrap(), "numbers");
        assert!(matches!(
            required(&None, "category"),
            Err(ApiError::BadParameter { param: "category", .. })
        ));
        assert!(required(&Some(String::new()), "category").is_err());
    }

    #[test]
    fn test_required_u64() {
        assert_eq!(required_u64(&Some("42".to_string()), "off").unwrap(), 42);
        assert!(required_u64(&Some("-1".to_string()), "off").is_err());
        assert!(required_u64(&Some("abc".to_string()), "maxSize").is_err());
        assert!(required_u64(&None, "size").is_err());
    }
}
