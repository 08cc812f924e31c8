use rust_decimal::{Decimal, RoundingStrategy};

/// Density of ethanol at room temperature, g/ml
pub const ETHANOL_DENSITY_G_PER_ML: Decimal = Decimal::from_parts(789, 0, 0, false, 3);

/// Converts a serving into grams of pure alcohol
pub struct PureAlcoholCalculator;

impl PureAlcoholCalculator {
    /// Calculate pure alcohol in grams
    ///
    /// # Arguments
    /// * `volume_ml` - Serving volume in millilitres (caller guarantees > 0)
    /// * `strength_percent` - Alcohol by volume, 0 to 100 (caller guarantees range)
    ///
    /// # Returns
    /// `volume_ml * strength_percent / 100 * 0.789`, rounded to 2 decimal
    /// places with midpoints rounded away from zero
    pub fn compute(volume_ml: Decimal, strength_percent: Decimal) -> Decimal {
        let grams = volume_ml * (strength_percent / Decimal::ONE_HUNDRED) * ETHANOL_DENSITY_G_PER_ML;
        grams.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
    }

    /// Price of a serving, rounded to cents
    ///
    /// `None` when the product does not fit in a `Decimal`.
    pub fn total_price(volume_ml: Decimal, price_per_ml: Decimal) -> Option<Decimal> {
        volume_ml
            .checked_mul(price_per_ml)
            .map(|price| price.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero))
    }
}
