use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Lifecycle state of a discount coupon
///
/// `Expired` is mostly a derived read-time state: readers treat an `Active`
/// row whose `expires_at` has passed as inactive, and the stored column may
/// remain `active` until a transition is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum CouponStatus {
    Active,
    Used,
    Expired,
}

impl CouponStatus {
    /// Convert status to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            CouponStatus::Active => "active",
            CouponStatus::Used => "used",
            CouponStatus::Expired => "expired",
        }
    }

    /// Parse status from string
    pub fn from_str(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "active" => Ok(CouponStatus::Active),
            "used" => Ok(CouponStatus::Used),
            "expired" => Ok(CouponStatus::Expired),
            _ => Err(format!("Invalid coupon status: {}", s)),
        }
    }
}

impl Default for CouponStatus {
    fn default() -> Self {
        CouponStatus::Active
    }
}

impl std::fmt::Display for CouponStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Admin-managed reward rule: buy `required_purchases` units of the item
/// identified by `item_slug`, earn a `discount_percent` coupon.
///
/// Inactive rules are ignored for new issuance but never invalidate coupons
/// that were already minted from them.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct RewardRule {
    pub id: Uuid,
    #[schema(example = "veg-burger")]
    pub item_slug: String,
    #[schema(example = 5, minimum = 1)]
    pub required_purchases: i32,
    #[schema(example = 20)]
    pub discount_percent: Decimal,
    #[schema(example = "Buy 5 veg burgers, get 20% off the next one")]
    pub description: Option<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Cumulative purchase counter: exactly one row per (user, item), ever.
///
/// `purchase_count` only increases, by the exact quantity of the item in
/// each processed order. `linked_rule_id` records the rule matched at the
/// last update for audit and display; it is not authoritative.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct LoyaltyLedgerEntry {
    pub id: Uuid,
    pub user_id: Uuid,
    pub item_slug: String,
    pub purchase_count: i32,
    pub linked_rule_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A minted discount grant: single-use, time-bounded, tied to one user and
/// one rule. `discount_percent` is copied from the rule at issuance time and
/// is immune to later rule edits.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct DiscountCoupon {
    pub id: Uuid,
    pub user_id: Uuid,
    pub reward_rule_id: Uuid,
    #[schema(example = "CANTEEN-4F7K2Q-LX3M9P")]
    pub code: String,
    pub discount_percent: Decimal,
    pub status: CouponStatus,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

fn default_true() -> bool {
    true
}

/// Request DTO for creating a reward rule
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateRewardRule {
    #[schema(example = "veg-burger")]
    #[validate(custom = "crate::validation::validate_slug")]
    pub item_slug: String,
    #[schema(example = 5, minimum = 1)]
    #[validate(range(min = 1, message = "required_purchases must be at least 1"))]
    pub required_purchases: i32,
    #[schema(example = 20)]
    #[validate(custom = "crate::validation::validate_discount_percent")]
    pub discount_percent: Decimal,
    pub description: Option<String>,
    #[serde(default = "default_true")]
    pub active: bool,
}

/// Request DTO for updating a reward rule; all fields optional for partial updates
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct UpdateRewardRule {
    #[validate(custom = "crate::validation::validate_slug")]
    pub item_slug: Option<String>,
    #[validate(range(min = 1, message = "required_purchases must be at least 1"))]
    pub required_purchases: Option<i32>,
    #[validate(custom = "crate::validation::validate_discount_percent")]
    pub discount_percent: Option<Decimal>,
    pub description: Option<String>,
    pub active: Option<bool>,
}

/// Filter for listing reward rules
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleFilter {
    All,
    Active,
}

impl Default for RuleFilter {
    fn default() -> Self {
        RuleFilter::All
    }
}

/// Query parameters for GET /api/rewards/rules
#[derive(Debug, Deserialize)]
pub struct ListRulesQuery {
    #[serde(default)]
    pub filter: RuleFilter,
}

/// One line of a finalized order, as handed over by order intake.
///
/// `slug` is preferred; `name` is a display-name fallback that gets
/// normalized into a slug.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct OrderLineItem {
    #[schema(example = "veg-burger")]
    pub slug: Option<String>,
    #[schema(example = "Veg Burger")]
    pub name: Option<String>,
    #[schema(example = 2, minimum = 1)]
    #[validate(range(min = 1, message = "quantity must be at least 1"))]
    pub quantity: i32,
}

/// Request DTO for processing a finalized order's rewards
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ProcessOrderRequest {
    #[validate(length(min = 1, message = "order must contain at least one item"))]
    pub items: Vec<OrderLineItem>,
}

/// Coupon details surfaced to the caller when a milestone was crossed
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CouponIssued {
    pub code: String,
    pub discount_percent: Decimal,
    pub expires_at: DateTime<Utc>,
}

/// Outcome of processing a single order line.
///
/// The counts are absent when the line failed before its ledger update
/// committed; `error` carries the reason in that case. A populated
/// `coupon_issued` is only ever emitted after the coupon row is durable.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LineOutcome {
    pub item_slug: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_count: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_count: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coupon_issued: Option<CouponIssued>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Response DTO for POST /api/rewards/process-order
#[derive(Debug, Serialize, ToSchema)]
pub struct ProcessOrderResponse {
    pub results: Vec<LineOutcome>,
}

/// An active, unexpired coupon joined with its rule for checkout display
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct EligibleCoupon {
    pub id: Uuid,
    pub code: String,
    pub discount_percent: Decimal,
    pub expires_at: DateTime<Utc>,
    pub item_slug: String,
    pub description: Option<String>,
}

/// Request DTO for quoting a coupon against a cart subtotal
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct QuoteRequest {
    #[schema(example = 1000)]
    #[validate(custom = "crate::validation::validate_non_negative_amount")]
    pub subtotal: Decimal,
}

/// Response DTO for a coupon quote; computed, nothing is mutated
#[derive(Debug, Serialize, ToSchema)]
pub struct QuoteResponse {
    pub coupon_id: Uuid,
    pub code: String,
    pub discount_percent: Decimal,
    pub discount_amount: Decimal,
    pub payable: Decimal,
}

/// Response DTO for a redemption attempt
#[derive(Debug, Serialize, ToSchema)]
pub struct RedeemResponse {
    pub coupon_id: Uuid,
    pub status: CouponStatus,
    /// True when the coupon was already used; repeated redemption of the
    /// same coupon is a no-op, not an error.
    pub already_redeemed: bool,
}

/// A ledger entry joined with the currently-active rule for that item,
/// for progress display ("3 of 5 towards 20% off")
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct LoyaltyProgressEntry {
    pub item_slug: String,
    pub purchase_count: i32,
    pub updated_at: DateTime<Utc>,
    pub required_purchases: Option<i32>,
    pub discount_percent: Option<Decimal>,
    pub description: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_coupon_status_round_trip() {
        for status in [CouponStatus::Active, CouponStatus::Used, CouponStatus::Expired] {
            assert_eq!(CouponStatus::from_str(status.as_str()), Ok(status));
        }
        assert!(CouponStatus::from_str("void").is_err());
    }

    #[test]
    fn test_coupon_status_serde_is_lowercase() {
        assert_eq!(
            serde_json::to_string(&CouponStatus::Active).unwrap(),
            "\"active\""
        );
        let parsed: CouponStatus = serde_json::from_str("\"used\"").unwrap();
        assert_eq!(parsed, CouponStatus::Used);
    }

    #[test]
    fn test_create_reward_rule_defaults_to_active() {
        let json = r#"{
            "item_slug": "veg-burger",
            "required_purchases": 5,
            "discount_percent": 20
        }"#;

        let payload: CreateRewardRule = serde_json::from_str(json).unwrap();
        assert!(payload.active);
        assert_eq!(payload.item_slug, "veg-burger");
        assert_eq!(payload.required_purchases, 5);
        assert_eq!(payload.discount_percent, dec!(20));
        assert_eq!(payload.description, None);
    }

    #[test]
    fn test_create_reward_rule_validation() {
        let valid = CreateRewardRule {
            item_slug: "veg-burger".to_string(),
            required_purchases: 5,
            discount_percent: dec!(20),
            description: None,
            active: true,
        };
        assert!(valid.validate().is_ok());

        let bad_count = CreateRewardRule {
            required_purchases: 0,
            ..valid.clone()
        };
        assert!(bad_count.validate().is_err());

        let bad_percent = CreateRewardRule {
            discount_percent: dec!(150),
            ..valid.clone()
        };
        assert!(bad_percent.validate().is_err());

        let bad_slug = CreateRewardRule {
            item_slug: "Veg Burger".to_string(),
            ..valid
        };
        assert!(bad_slug.validate().is_err());
    }

    #[test]
    fn test_line_outcome_omits_empty_fields() {
        let outcome = LineOutcome {
            item_slug: "veg-burger".to_string(),
            previous_count: Some(2),
            new_count: Some(4),
            coupon_issued: None,
            error: None,
        };

        let json = serde_json::to_string(&outcome).unwrap();
        assert!(json.contains("\"previous_count\":2"));
        assert!(json.contains("\"new_count\":4"));
        assert!(!json.contains("coupon_issued"));
        assert!(!json.contains("error"));
    }

    #[test]
    fn test_rule_filter_defaults_to_all() {
        let query: ListRulesQuery = serde_json::from_str("{}").unwrap();
        assert_eq!(query.filter, RuleFilter::All);

        let query: ListRulesQuery = serde_json::from_str(r#"{"filter":"active"}"#).unwrap();
        assert_eq!(query.filter, RuleFilter::Active);
    }

    #[test]
    fn test_order_line_item_deserialization() {
        let json = r#"{"name": "Veg Burger", "quantity": 2}"#;
        let line: OrderLineItem = serde_json::from_str(json).unwrap();
        assert_eq!(line.slug, None);
        assert_eq!(line.name, Some("Veg Burger".to_string()));
        assert_eq!(line.quantity, 2);
    }
}
