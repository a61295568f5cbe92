// Coupon redemption surface consumed by checkout
//
// Listing and quoting are reads; redeem is the single state transition a
// coupon ever makes (active -> used). Eligibility is always re-validated
// here against the store; a stale client-side list is never trusted.

use chrono::Utc;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::rewards::error::RewardError;
use crate::rewards::models::{
    CouponStatus, DiscountCoupon, EligibleCoupon, QuoteResponse, RedeemResponse,
};
use crate::rewards::repository::CouponRepository;

/// Compute the discount a coupon takes off a cart subtotal.
///
/// `subtotal * discount_percent / 100`, rounded to 2 decimal places.
/// Pure computation; coupon state is untouched.
pub fn discount_amount(subtotal: Decimal, discount_percent: Decimal) -> Decimal {
    (subtotal * discount_percent / Decimal::from(100)).round_dp(2)
}

/// Service for coupon listing, quoting and redemption
#[derive(Clone)]
pub struct RedemptionService {
    coupons: CouponRepository,
}

impl RedemptionService {
    /// Create a new RedemptionService
    pub fn new(coupons: CouponRepository) -> Self {
        Self { coupons }
    }

    /// All of a user's active, unexpired coupons with their rule details
    pub async fn list_eligible(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<EligibleCoupon>, RewardError> {
        Ok(self.coupons.list_eligible(user_id).await?)
    }

    /// Quote a coupon against a cart subtotal without mutating anything
    pub async fn quote(
        &self,
        coupon_id: Uuid,
        user_id: Uuid,
        subtotal: Decimal,
    ) -> Result<QuoteResponse, RewardError> {
        let coupon = self.fetch_owned(coupon_id, user_id).await?;
        ensure_eligible(&coupon)?;

        let discount = discount_amount(subtotal, coupon.discount_percent);

        Ok(QuoteResponse {
            coupon_id: coupon.id,
            code: coupon.code,
            discount_percent: coupon.discount_percent,
            discount_amount: discount,
            payable: subtotal - discount,
        })
    }

    /// Redeem a coupon once order placement is confirmed.
    ///
    /// Expired coupons are rejected with a not-eligible error. An
    /// already-used coupon is a no-op success: checkout confirmation may be
    /// retried and must never be blocked by a repeated redemption call.
    pub async fn redeem(
        &self,
        coupon_id: Uuid,
        user_id: Uuid,
    ) -> Result<RedeemResponse, RewardError> {
        let coupon = self.fetch_owned(coupon_id, user_id).await?;

        match coupon.status {
            CouponStatus::Used => Ok(RedeemResponse {
                coupon_id,
                status: CouponStatus::Used,
                already_redeemed: true,
            }),
            CouponStatus::Expired => {
                Err(RewardError::NotEligible("coupon has expired".to_string()))
            }
            CouponStatus::Active => {
                if coupon.expires_at <= Utc::now() {
                    return Err(RewardError::NotEligible("coupon has expired".to_string()));
                }

                match self.coupons.mark_used(coupon_id).await? {
                    Some(updated) => {
                        tracing::info!("Coupon {} redeemed by user {}", updated.code, user_id);
                        Ok(RedeemResponse {
                            coupon_id,
                            status: updated.status,
                            already_redeemed: false,
                        })
                    }
                    // Lost a race with another confirmation of the same
                    // order; the coupon is used either way.
                    None => Ok(RedeemResponse {
                        coupon_id,
                        status: CouponStatus::Used,
                        already_redeemed: true,
                    }),
                }
            }
        }
    }

    async fn fetch_owned(
        &self,
        coupon_id: Uuid,
        user_id: Uuid,
    ) -> Result<DiscountCoupon, RewardError> {
        let coupon = self
            .coupons
            .find_by_id(coupon_id)
            .await?
            .ok_or(RewardError::CouponNotFound)?;

        if coupon.user_id != user_id {
            return Err(RewardError::Forbidden(
                "coupon belongs to another user".to_string(),
            ));
        }

        Ok(coupon)
    }
}

/// Check that a coupon can still be applied: stored status must be active
/// and the validity window must not have passed.
fn ensure_eligible(coupon: &DiscountCoupon) -> Result<(), RewardError> {
    match coupon.status {
        CouponStatus::Active if coupon.expires_at > Utc::now() => Ok(()),
        CouponStatus::Active | CouponStatus::Expired => {
            Err(RewardError::NotEligible("coupon has expired".to_string()))
        }
        CouponStatus::Used => Err(RewardError::NotEligible(
            "coupon has already been used".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rust_decimal_macros::dec;

    fn coupon_with(status: CouponStatus, expires_in_hours: i64) -> DiscountCoupon {
        DiscountCoupon {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            reward_rule_id: Uuid::new_v4(),
            code: "CANTEEN-TEST01-0".to_string(),
            discount_percent: dec!(15),
            status,
            expires_at: Utc::now() + Duration::hours(expires_in_hours),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_discount_amount_basic() {
        assert_eq!(discount_amount(dec!(1000), dec!(15)), dec!(150));
        assert_eq!(discount_amount(dec!(200), dec!(20)), dec!(40));
    }

    #[test]
    fn test_discount_amount_rounds_to_two_places() {
        // 99.99 * 33.33% = 33.326667
        assert_eq!(discount_amount(dec!(99.99), dec!(33.33)), dec!(33.33));
    }

    #[test]
    fn test_discount_amount_edges() {
        assert_eq!(discount_amount(dec!(1000), dec!(0)), dec!(0));
        assert_eq!(discount_amount(dec!(1000), dec!(100)), dec!(1000));
        assert_eq!(discount_amount(dec!(0), dec!(50)), dec!(0));
    }

    #[test]
    fn test_ensure_eligible_active_unexpired() {
        assert!(ensure_eligible(&coupon_with(CouponStatus::Active, 24)).is_ok());
    }

    #[test]
    fn test_ensure_eligible_rejects_expired_window() {
        // Stored status still active, but the window has passed.
        let result = ensure_eligible(&coupon_with(CouponStatus::Active, -1));
        assert!(matches!(result, Err(RewardError::NotEligible(_))));
    }

    #[test]
    fn test_ensure_eligible_rejects_used_and_expired_status() {
        assert!(matches!(
            ensure_eligible(&coupon_with(CouponStatus::Used, 24)),
            Err(RewardError::NotEligible(_))
        ));
        assert!(matches!(
            ensure_eligible(&coupon_with(CouponStatus::Expired, 24)),
            Err(RewardError::NotEligible(_))
        ));
    }
}

#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    // A discount never goes negative and never exceeds the subtotal for any
    // percentage within [0, 100].
    #[test]
    fn prop_discount_bounded_by_subtotal() {
        proptest!(|(
            subtotal_cents in 0u32..=10_000_000u32,
            percent_hundredths in 0u32..=10_000u32
        )| {
            let subtotal = Decimal::from(subtotal_cents) / Decimal::from(100);
            let percent = Decimal::from(percent_hundredths) / Decimal::from(100);

            let discount = discount_amount(subtotal, percent);

            prop_assert!(discount >= Decimal::ZERO);
            prop_assert!(discount <= subtotal);
        });
    }

    // Scaling the subtotal scales the discount proportionally at full
    // precision (rounding happens only at the final 2 decimal places).
    #[test]
    fn prop_discount_scales_linearly() {
        proptest!(|(
            subtotal_units in 1u32..=10_000u32,
            percent in 0u32..=100u32
        )| {
            let subtotal = Decimal::from(subtotal_units);
            let percent = Decimal::from(percent);

            let single = discount_amount(subtotal, percent);
            let double = discount_amount(subtotal * Decimal::from(2), percent);

            prop_assert_eq!(double, single * Decimal::from(2));
        });
    }
}
