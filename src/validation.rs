// Validation utilities module
// Provides custom validation functions for reward-domain rules

use rust_decimal::Decimal;
use validator::ValidationError;

/// Validates that an item slug is non-empty and in canonical form:
/// lowercase ASCII alphanumerics separated by single hyphens, with no
/// leading or trailing hyphen. Slugs are normalized at the API boundary
/// before this check runs.
pub fn validate_slug(slug: &str) -> Result<(), ValidationError> {
    if slug.is_empty() {
        return Err(ValidationError::new("slug_empty"));
    }
    let well_formed = slug
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        && !slug.starts_with('-')
        && !slug.ends_with('-')
        && !slug.contains("--");
    if well_formed {
        Ok(())
    } else {
        Err(ValidationError::new("slug_not_normalized"))
    }
}

/// Validates that a discount percentage is within [0, 100]
pub fn validate_discount_percent(percent: &Decimal) -> Result<(), ValidationError> {
    if *percent < Decimal::ZERO || *percent > Decimal::from(100) {
        Err(ValidationError::new("discount_percent_out_of_range"))
    } else {
        Ok(())
    }
}

/// Validates that a monetary amount is non-negative
pub fn validate_non_negative_amount(amount: &Decimal) -> Result<(), ValidationError> {
    if *amount < Decimal::ZERO {
        Err(ValidationError::new("amount_must_be_non_negative"))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_validate_slug_accepts_canonical_form() {
        assert!(validate_slug("burger").is_ok());
        assert!(validate_slug("veg-burger").is_ok());
        assert!(validate_slug("idli-2-pc").is_ok());
    }

    #[test]
    fn test_validate_slug_rejects_empty() {
        assert!(validate_slug("").is_err());
    }

    #[test]
    fn test_validate_slug_rejects_unnormalized_input() {
        assert!(validate_slug("Veg Burger").is_err());
        assert!(validate_slug("-burger").is_err());
        assert!(validate_slug("burger-").is_err());
        assert!(validate_slug("veg--burger").is_err());
        assert!(validate_slug("café").is_err());
    }

    #[test]
    fn test_validate_discount_percent_bounds() {
        assert!(validate_discount_percent(&dec!(0)).is_ok());
        assert!(validate_discount_percent(&dec!(15.5)).is_ok());
        assert!(validate_discount_percent(&dec!(100)).is_ok());
        assert!(validate_discount_percent(&dec!(-0.01)).is_err());
        assert!(validate_discount_percent(&dec!(100.01)).is_err());
    }

    #[test]
    fn test_validate_non_negative_amount() {
        assert!(validate_non_negative_amount(&dec!(0)).is_ok());
        assert!(validate_non_negative_amount(&dec!(499.99)).is_ok());
        assert!(validate_non_negative_amount(&dec!(-1)).is_err());
    }
}
