// Validation utilities module
// Custom validator functions for decimal request fields

use rust_decimal::Decimal;
use validator::ValidationError;

/// Smallest volume a vendor may sell in one purchase, in ml
pub const MIN_VOLUME_ML: Decimal = Decimal::ONE;

/// Largest volume a vendor may sell in one purchase (10 litres)
pub const MAX_VOLUME_ML: Decimal = Decimal::from_parts(10_000, 0, 0, false, 0);

/// Validates that a purchase volume is between 1 ml and 10 litres
pub fn validate_volume_ml(volume: &Decimal) -> Result<(), ValidationError> {
    if *volume < MIN_VOLUME_ML {
        let mut error = ValidationError::new("volume_too_small");
        error.message = Some("Volume must be at least 1 ml".into());
        Err(error)
    } else if *volume > MAX_VOLUME_ML {
        let mut error = ValidationError::new("volume_too_large");
        error.message = Some("Volume must not exceed 10000 ml".into());
        Err(error)
    } else {
        Ok(())
    }
}

/// Validates that a daily limit is strictly positive
pub fn validate_daily_limit(limit: &Decimal) -> Result<(), ValidationError> {
    if *limit <= Decimal::ZERO {
        let mut error = ValidationError::new("limit_must_be_positive");
        error.message = Some("Daily limit must be a positive number of grams".into());
        Err(error)
    } else {
        Ok(())
    }
}
