use rust_decimal::Decimal;
use serde::Serialize;

/// Result of checking one purchase against the allowance
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LimitDecision {
    pub allowed: bool,
    pub remaining_grams: Decimal,
    pub reason: Option<String>,
}

/// Pure approve/reject rule for the daily allowance
pub struct LimitDecisionEngine;

impl LimitDecisionEngine {
    /// Decide whether `incoming_grams` fits on top of `consumed_grams`.
    ///
    /// Rejection requires the projected total to be strictly greater than the
    /// limit; a purchase that lands exactly on the limit is approved.
    pub fn decide(
        consumed_grams: Decimal,
        incoming_grams: Decimal,
        limit_grams: Decimal,
    ) -> LimitDecision {
        let projected = consumed_grams + incoming_grams;

        if projected > limit_grams {
            let remaining = (limit_grams - consumed_grams).max(Decimal::ZERO);
            return LimitDecision {
                allowed: false,
                remaining_grams: remaining,
                reason: Some(format!(
                    "Purchase would exceed daily limit. You have {:.2}g remaining out of {}g daily limit.",
                    remaining,
                    limit_grams.normalize()
                )),
            };
        }

        LimitDecision {
            allowed: true,
            remaining_grams: limit_grams - projected,
            reason: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_exact_fit_is_allowed() {
        let decision = LimitDecisionEngine::decide(dec!(50), dec!(10), dec!(60));
        assert!(decision.allowed);
        assert_eq!(decision.remaining_grams, Decimal::ZERO);
        assert_eq!(decision.reason, None);
    }

    #[test]
    fn test_one_hundredth_over_is_rejected() {
        let decision = LimitDecisionEngine::decide(dec!(50), dec!(10.01), dec!(60));
        assert!(!decision.allowed);
        assert_eq!(decision.remaining_grams, dec!(10));
        assert_eq!(
            decision.reason.as_deref(),
            Some("Purchase would exceed daily limit. You have 10.00g remaining out of 60g daily limit.")
        );
    }

    #[test]
    fn test_fresh_account_beer_pint() {
        let decision = LimitDecisionEngine::decide(Decimal::ZERO, dec!(19.73), dec!(60));
        assert!(decision.allowed);
        assert_eq!(decision.remaining_grams, dec!(40.27));
    }

    #[test]
    fn test_zero_grams_always_fits_when_within_limit() {
        let decision = LimitDecisionEngine::decide(dec!(60), Decimal::ZERO, dec!(60));
        assert!(decision.allowed);
        assert_eq!(decision.remaining_grams, Decimal::ZERO);
    }

    #[test]
    fn test_remaining_clamped_when_already_over_limit() {
        // Limit lowered by an admin after the user consumed 55g
        let decision = LimitDecisionEngine::decide(dec!(55), dec!(1), dec!(40));
        assert!(!decision.allowed);
        assert_eq!(decision.remaining_grams, Decimal::ZERO);
        assert!(decision.reason.unwrap().contains("0.00g remaining out of 40g"));
    }

    #[test]
    fn test_fractional_limit_in_reason() {
        let decision = LimitDecisionEngine::decide(dec!(30), dec!(20), dec!(42.5));
        assert!(!decision.allowed);
        assert!(decision.reason.unwrap().contains("12.50g remaining out of 42.5g"));
    }
}
