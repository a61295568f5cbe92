use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::rewards::models::{
    CreateRewardRule, DiscountCoupon, EligibleCoupon, LoyaltyProgressEntry, RewardRule,
    RuleFilter,
};

/// True when a sqlx error is a foreign-key violation (Postgres 23503).
/// Deleting a rule that already issued coupons trips this.
pub fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().as_deref() == Some("23503"),
        _ => false,
    }
}

/// Repository for reward rule catalog operations
#[derive(Clone)]
pub struct RuleRepository {
    pool: PgPool,
}

impl RuleRepository {
    /// Create a new RuleRepository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a new rule
    pub async fn create(&self, payload: &CreateRewardRule) -> Result<RewardRule, sqlx::Error> {
        let rule = sqlx::query_as::<_, RewardRule>(
            r#"
            INSERT INTO reward_rules (item_slug, required_purchases, discount_percent, description, active)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, item_slug, required_purchases, discount_percent, description, active, created_at, updated_at
            "#,
        )
        .bind(&payload.item_slug)
        .bind(payload.required_purchases)
        .bind(payload.discount_percent)
        .bind(&payload.description)
        .bind(payload.active)
        .fetch_one(&self.pool)
        .await?;

        Ok(rule)
    }

    /// Find a rule by ID
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<RewardRule>, sqlx::Error> {
        let rule = sqlx::query_as::<_, RewardRule>(
            r#"
            SELECT id, item_slug, required_purchases, discount_percent, description, active, created_at, updated_at
            FROM reward_rules
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(rule)
    }

    /// List rules, newest first, optionally restricted to active ones
    pub async fn list(&self, filter: RuleFilter) -> Result<Vec<RewardRule>, sqlx::Error> {
        let rules = match filter {
            RuleFilter::Active => self.list_active().await?,
            RuleFilter::All => {
                sqlx::query_as::<_, RewardRule>(
                    r#"
                    SELECT id, item_slug, required_purchases, discount_percent, description, active, created_at, updated_at
                    FROM reward_rules
                    ORDER BY created_at DESC
                    "#,
                )
                .fetch_all(&self.pool)
                .await?
            }
        };

        Ok(rules)
    }

    /// List all active rules.
    /// The engine fetches this once per processed order so the decision
    /// stays consistent across the whole order.
    pub async fn list_active(&self) -> Result<Vec<RewardRule>, sqlx::Error> {
        let rules = sqlx::query_as::<_, RewardRule>(
            r#"
            SELECT id, item_slug, required_purchases, discount_percent, description, active, created_at, updated_at
            FROM reward_rules
            WHERE active
            ORDER BY created_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rules)
    }

    /// Overwrite a rule with the given field set
    pub async fn update(
        &self,
        id: Uuid,
        item_slug: &str,
        required_purchases: i32,
        discount_percent: Decimal,
        description: Option<&str>,
        active: bool,
    ) -> Result<Option<RewardRule>, sqlx::Error> {
        let rule = sqlx::query_as::<_, RewardRule>(
            r#"
            UPDATE reward_rules
            SET item_slug = $1,
                required_purchases = $2,
                discount_percent = $3,
                description = $4,
                active = $5,
                updated_at = NOW()
            WHERE id = $6
            RETURNING id, item_slug, required_purchases, discount_percent, description, active, created_at, updated_at
            "#,
        )
        .bind(item_slug)
        .bind(required_purchases)
        .bind(discount_percent)
        .bind(description)
        .bind(active)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(rule)
    }

    /// Flip a rule's active flag
    pub async fn set_active(
        &self,
        id: Uuid,
        active: bool,
    ) -> Result<Option<RewardRule>, sqlx::Error> {
        let rule = sqlx::query_as::<_, RewardRule>(
            r#"
            UPDATE reward_rules
            SET active = $1, updated_at = NOW()
            WHERE id = $2
            RETURNING id, item_slug, required_purchases, discount_percent, description, active, created_at, updated_at
            "#,
        )
        .bind(active)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(rule)
    }

    /// Delete a rule, returning the number of rows removed
    pub async fn delete(&self, id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM reward_rules WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    /// Check whether another active rule already targets the given slug
    pub async fn active_slug_exists(
        &self,
        item_slug: &str,
        exclude_id: Option<Uuid>,
    ) -> Result<bool, sqlx::Error> {
        let exists: Option<bool> = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM reward_rules
                WHERE item_slug = $1 AND active AND ($2::uuid IS NULL OR id != $2)
            )
            "#,
        )
        .bind(item_slug)
        .bind(exclude_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists.unwrap_or(false))
    }
}

/// Repository for loyalty ledger reads
///
/// Ledger writes happen inside the reward engine's per-line transaction,
/// not here.
#[derive(Clone)]
pub struct LedgerRepository {
    pool: PgPool,
}

impl LedgerRepository {
    /// Create a new LedgerRepository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A user's ledger entries joined with the active rule for each item,
    /// most recently updated first
    pub async fn list_progress(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<LoyaltyProgressEntry>, sqlx::Error> {
        let entries = sqlx::query_as::<_, LoyaltyProgressEntry>(
            r#"
            SELECT l.item_slug, l.purchase_count, l.updated_at,
                   r.required_purchases, r.discount_percent, r.description
            FROM loyalty_ledger l
            LEFT JOIN reward_rules r ON r.item_slug = l.item_slug AND r.active
            WHERE l.user_id = $1
            ORDER BY l.updated_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }
}

/// Repository for discount coupon reads and the redemption transition
#[derive(Clone)]
pub struct CouponRepository {
    pool: PgPool,
}

impl CouponRepository {
    /// Create a new CouponRepository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Find a coupon by ID
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<DiscountCoupon>, sqlx::Error> {
        let coupon = sqlx::query_as::<_, DiscountCoupon>(
            r#"
            SELECT id, user_id, reward_rule_id, code, discount_percent, status, expires_at, created_at
            FROM discount_coupons
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(coupon)
    }

    /// A user's active, unexpired coupons joined with their rule,
    /// soonest expiry first. Expiry is evaluated at read time; rows whose
    /// stored status is still 'active' but whose window has passed are
    /// filtered out here.
    pub async fn list_eligible(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<EligibleCoupon>, sqlx::Error> {
        let coupons = sqlx::query_as::<_, EligibleCoupon>(
            r#"
            SELECT c.id, c.code, c.discount_percent, c.expires_at,
                   r.item_slug, r.description
            FROM discount_coupons c
            JOIN reward_rules r ON r.id = c.reward_rule_id
            WHERE c.user_id = $1 AND c.status = 'active' AND c.expires_at > NOW()
            ORDER BY c.expires_at
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(coupons)
    }

    /// Transition a coupon from active to used.
    /// Returns None when the coupon was not in active status, which lets the
    /// caller distinguish a lost redemption race from a fresh transition.
    pub async fn mark_used(&self, id: Uuid) -> Result<Option<DiscountCoupon>, sqlx::Error> {
        let coupon = sqlx::query_as::<_, DiscountCoupon>(
            r#"
            UPDATE discount_coupons
            SET status = 'used'
            WHERE id = $1 AND status = 'active'
            RETURNING id, user_id, reward_rule_id, code, discount_percent, status, expires_at, created_at
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(coupon)
    }
}
