// Loyalty rewards module
//
// The core of the canteen rewards service:
// - Rule catalog: admin-managed milestones (item, required count, discount)
// - Loyalty ledger: per-user per-item cumulative purchase counters
// - Reward engine: turns finalized orders into ledger updates and coupons
// - Redemption: checkout-facing coupon listing, quoting and spending

pub mod coupon_code;
pub mod engine;
pub mod error;
pub mod handlers;
pub mod models;
pub mod redemption;
pub mod repository;
pub mod slug;

pub use engine::{crosses_milestone, RewardEngine, COUPON_VALIDITY_DAYS};
pub use error::RewardError;
pub use models::*;
pub use redemption::{discount_amount, RedemptionService};
pub use repository::{CouponRepository, LedgerRepository, RuleRepository};
