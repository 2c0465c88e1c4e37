//! Validation helpers for DTOs.

use validator::ValidationError;

use crate::state::duel::DuelFormat;

/// Validates that a format is one of `1v1`, `2v2`, `3v3` or `4v4`.
///
/// # Examples
///
/// ```ignore
/// validate_duel_format("2v2") // Ok
/// validate_duel_format(" 3V3 ") // Ok - trimmed and case-insensitive
/// validate_duel_format("5v5") // Err
/// ```
pub fn validate_duel_format(format: &str) -> Result<(), ValidationError> {
    if format.parse::<DuelFormat>().is_ok() {
        return Ok(());
    }

    let mut err = ValidationError::new("duel_format");
    err.message = Some(
        format!(
            "Unknown duel format '{}'; expected one of {}",
            format.trim(),
            DuelFormat::ALL
                .iter()
                .map(|format| format.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        )
        .into(),
    );
    Err(err)
}

/// Validates that a display name has visible characters.
pub fn validate_display_name(name: &str) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        let mut err = ValidationError::new("display_name_blank");
        err.message = Some("Display name must not be blank".into());
        return Err(err);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_duel_format_valid() {
        assert!(validate_duel_format("1v1").is_ok());
        assert!(validate_duel_format("4v4").is_ok());
        assert!(validate_duel_format(" 2V2 ").is_ok());
    }

    #[test]
    fn test_validate_duel_format_invalid() {
        assert!(validate_duel_format("5v5").is_err());
        assert!(validate_duel_format("").is_err());
        assert!(validate_duel_format("duel").is_err());
    }

    #[test]
    fn test_validate_display_name() {
        assert!(validate_display_name("Ada").is_ok());
        assert!(validate_display_name("   ").is_err());
    }
}
