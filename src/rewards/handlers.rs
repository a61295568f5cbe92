// HTTP handlers for the rewards API surface

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;
use validator::Validate;

use crate::auth::AuthenticatedUser;
use crate::error::ApiError;
use crate::rewards::models::{
    CreateRewardRule, EligibleCoupon, ListRulesQuery, LoyaltyProgressEntry,
    ProcessOrderRequest, ProcessOrderResponse, QuoteRequest, QuoteResponse, RedeemResponse,
    RewardRule, UpdateRewardRule,
};
use crate::rewards::repository::is_foreign_key_violation;
use crate::rewards::{slug, RewardError};

fn require_admin(user: &AuthenticatedUser) -> Result<(), ApiError> {
    if user.is_admin() {
        Ok(())
    } else {
        Err(ApiError::Forbidden("admin role required".to_string()))
    }
}

/// Handler for POST /api/rewards/process-order
/// Records a finalized order's purchases and mints any earned coupons.
/// Called by order intake once per successfully placed order; per-item
/// failures are reported inside the results, not as an HTTP error.
#[utoipa::path(
    post,
    path = "/api/rewards/process-order",
    request_body = ProcessOrderRequest,
    responses(
        (status = 200, description = "Per-item reward outcomes", body = ProcessOrderResponse),
        (status = 400, description = "Invalid request"),
        (status = 401, description = "Missing or invalid token")
    ),
    tag = "rewards"
)]
pub async fn process_order_handler(
    State(state): State<crate::AppState>,
    user: AuthenticatedUser,
    Json(request): Json<ProcessOrderRequest>,
) -> Result<Json<ProcessOrderResponse>, RewardError> {
    request
        .validate()
        .map_err(|e| RewardError::ValidationError(e.to_string()))?;

    let results = state.engine.process_order(user.user_id, &request.items).await?;

    Ok(Json(ProcessOrderResponse { results }))
}

/// Handler for GET /api/rewards/loyalty
/// Returns the caller's per-item purchase counters with rule progress
#[utoipa::path(
    get,
    path = "/api/rewards/loyalty",
    responses(
        (status = 200, description = "Loyalty progress entries", body = Vec<LoyaltyProgressEntry>),
        (status = 401, description = "Missing or invalid token")
    ),
    tag = "rewards"
)]
pub async fn loyalty_progress_handler(
    State(state): State<crate::AppState>,
    user: AuthenticatedUser,
) -> Result<Json<Vec<LoyaltyProgressEntry>>, RewardError> {
    let entries = state.ledger.list_progress(user.user_id).await?;
    Ok(Json(entries))
}

/// Handler for GET /api/rewards/coupons
/// Returns the caller's active, unexpired coupons for checkout display
#[utoipa::path(
    get,
    path = "/api/rewards/coupons",
    responses(
        (status = 200, description = "Eligible coupons", body = Vec<EligibleCoupon>),
        (status = 401, description = "Missing or invalid token")
    ),
    tag = "coupons"
)]
pub async fn list_coupons_handler(
    State(state): State<crate::AppState>,
    user: AuthenticatedUser,
) -> Result<Json<Vec<EligibleCoupon>>, RewardError> {
    let coupons = state.redemption.list_eligible(user.user_id).await?;
    Ok(Json(coupons))
}

/// Handler for POST /api/rewards/coupons/{id}/quote
/// Computes the discount a coupon would take off a subtotal; mutates nothing
#[utoipa::path(
    post,
    path = "/api/rewards/coupons/{id}/quote",
    params(
        ("id" = Uuid, Path, description = "Coupon ID")
    ),
    request_body = QuoteRequest,
    responses(
        (status = 200, description = "Quoted discount", body = QuoteResponse),
        (status = 404, description = "Coupon not found"),
        (status = 409, description = "Coupon not eligible")
    ),
    tag = "coupons"
)]
pub async fn quote_coupon_handler(
    State(state): State<crate::AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(request): Json<QuoteRequest>,
) -> Result<Json<QuoteResponse>, RewardError> {
    request
        .validate()
        .map_err(|e| RewardError::ValidationError(e.to_string()))?;

    let quote = state
        .redemption
        .quote(id, user.user_id, request.subtotal)
        .await?;

    Ok(Json(quote))
}

/// Handler for POST /api/rewards/coupons/{id}/redeem
/// Marks a coupon used once order placement is confirmed; repeating the
/// call on an already-used coupon succeeds as a no-op
#[utoipa::path(
    post,
    path = "/api/rewards/coupons/{id}/redeem",
    params(
        ("id" = Uuid, Path, description = "Coupon ID")
    ),
    responses(
        (status = 200, description = "Redemption outcome", body = RedeemResponse),
        (status = 404, description = "Coupon not found"),
        (status = 409, description = "Coupon not eligible")
    ),
    tag = "coupons"
)]
pub async fn redeem_coupon_handler(
    State(state): State<crate::AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<RedeemResponse>, RewardError> {
    let outcome = state.redemption.redeem(id, user.user_id).await?;
    Ok(Json(outcome))
}

/// Handler for POST /api/rewards/rules
/// Creates a new reward rule (admin only)
#[utoipa::path(
    post,
    path = "/api/rewards/rules",
    request_body = CreateRewardRule,
    responses(
        (status = 201, description = "Rule created", body = RewardRule),
        (status = 400, description = "Invalid input data"),
        (status = 403, description = "Admin role required"),
        (status = 409, description = "An active rule for this item already exists")
    ),
    tag = "rules"
)]
pub async fn create_rule_handler(
    State(state): State<crate::AppState>,
    user: AuthenticatedUser,
    Json(mut payload): Json<CreateRewardRule>,
) -> Result<(StatusCode, Json<RewardRule>), ApiError> {
    require_admin(&user)?;

    // Normalize at the boundary so the catalog and the ledger agree on keys.
    payload.item_slug = slug::normalize(&payload.item_slug);
    payload.validate()?;

    if payload.active && state.rules.active_slug_exists(&payload.item_slug, None).await? {
        tracing::warn!(
            "Attempt to create second active rule for item: {}",
            payload.item_slug
        );
        return Err(ApiError::Conflict {
            message: format!(
                "An active rule for item '{}' already exists",
                payload.item_slug
            ),
        });
    }

    let rule = state.rules.create(&payload).await?;

    tracing::info!("Created reward rule {} for item {}", rule.id, rule.item_slug);
    Ok((StatusCode::CREATED, Json(rule)))
}

/// Handler for GET /api/rewards/rules
/// Lists reward rules, optionally only the active ones (admin only)
#[utoipa::path(
    get,
    path = "/api/rewards/rules",
    params(
        ("filter" = Option<String>, Query, description = "all (default) or active")
    ),
    responses(
        (status = 200, description = "Reward rules", body = Vec<RewardRule>),
        (status = 403, description = "Admin role required")
    ),
    tag = "rules"
)]
pub async fn list_rules_handler(
    State(state): State<crate::AppState>,
    user: AuthenticatedUser,
    Query(query): Query<ListRulesQuery>,
) -> Result<Json<Vec<RewardRule>>, ApiError> {
    require_admin(&user)?;

    let rules = state.rules.list(query.filter).await?;
    Ok(Json(rules))
}

/// Handler for PUT /api/rewards/rules/{id}
/// Updates a reward rule, keeping existing values for omitted fields
/// (admin only)
#[utoipa::path(
    put,
    path = "/api/rewards/rules/{id}",
    params(
        ("id" = Uuid, Path, description = "Rule ID")
    ),
    request_body = UpdateRewardRule,
    responses(
        (status = 200, description = "Rule updated", body = RewardRule),
        (status = 400, description = "Invalid input data"),
        (status = 403, description = "Admin role required"),
        (status = 404, description = "Rule not found"),
        (status = 409, description = "An active rule for this item already exists")
    ),
    tag = "rules"
)]
pub async fn update_rule_handler(
    State(state): State<crate::AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(mut payload): Json<UpdateRewardRule>,
) -> Result<Json<RewardRule>, ApiError> {
    require_admin(&user)?;

    if let Some(ref mut item_slug) = payload.item_slug {
        *item_slug = slug::normalize(item_slug);
    }
    payload.validate()?;

    let existing = state.rules.find_by_id(id).await?.ok_or_else(|| ApiError::NotFound {
        resource: "RewardRule".to_string(),
        id: id.to_string(),
    })?;

    let item_slug = payload.item_slug.unwrap_or(existing.item_slug);
    let required_purchases = payload
        .required_purchases
        .unwrap_or(existing.required_purchases);
    let discount_percent = payload.discount_percent.unwrap_or(existing.discount_percent);
    let description = payload.description.or(existing.description);
    let active = payload.active.unwrap_or(existing.active);

    if active && state.rules.active_slug_exists(&item_slug, Some(id)).await? {
        return Err(ApiError::Conflict {
            message: format!("An active rule for item '{}' already exists", item_slug),
        });
    }

    let updated = state
        .rules
        .update(
            id,
            &item_slug,
            required_purchases,
            discount_percent,
            description.as_deref(),
            active,
        )
        .await?
        .ok_or_else(|| ApiError::NotFound {
            resource: "RewardRule".to_string(),
            id: id.to_string(),
        })?;

    tracing::info!("Updated reward rule {}", id);
    Ok(Json(updated))
}

/// Handler for PATCH /api/rewards/rules/{id}/toggle
/// Flips a rule's active flag (admin only). Deactivation stops new
/// issuance; already-minted coupons stay valid until their own expiry.
#[utoipa::path(
    patch,
    path = "/api/rewards/rules/{id}/toggle",
    params(
        ("id" = Uuid, Path, description = "Rule ID")
    ),
    responses(
        (status = 200, description = "Rule toggled", body = RewardRule),
        (status = 403, description = "Admin role required"),
        (status = 404, description = "Rule not found"),
        (status = 409, description = "An active rule for this item already exists")
    ),
    tag = "rules"
)]
pub async fn toggle_rule_handler(
    State(state): State<crate::AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<RewardRule>, ApiError> {
    require_admin(&user)?;

    let existing = state.rules.find_by_id(id).await?.ok_or_else(|| ApiError::NotFound {
        resource: "RewardRule".to_string(),
        id: id.to_string(),
    })?;

    let activating = !existing.active;
    if activating
        && state
            .rules
            .active_slug_exists(&existing.item_slug, Some(id))
            .await?
    {
        return Err(ApiError::Conflict {
            message: format!(
                "An active rule for item '{}' already exists",
                existing.item_slug
            ),
        });
    }

    let updated = state
        .rules
        .set_active(id, activating)
        .await?
        .ok_or_else(|| ApiError::NotFound {
            resource: "RewardRule".to_string(),
            id: id.to_string(),
        })?;

    tracing::info!(
        "Reward rule {} is now {}",
        id,
        if updated.active { "active" } else { "inactive" }
    );
    Ok(Json(updated))
}

/// Handler for DELETE /api/rewards/rules/{id}
/// Deletes a reward rule (admin only). Rules that already issued coupons
/// cannot be deleted because coupons hold a hard reference; deactivate
/// those instead.
#[utoipa::path(
    delete,
    path = "/api/rewards/rules/{id}",
    params(
        ("id" = Uuid, Path, description = "Rule ID")
    ),
    responses(
        (status = 204, description = "Rule deleted"),
        (status = 403, description = "Admin role required"),
        (status = 404, description = "Rule not found"),
        (status = 409, description = "Rule has issued coupons")
    ),
    tag = "rules"
)]
pub async fn delete_rule_handler(
    State(state): State<crate::AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    require_admin(&user)?;

    match state.rules.delete(id).await {
        Ok(0) => Err(ApiError::NotFound {
            resource: "RewardRule".to_string(),
            id: id.to_string(),
        }),
        Ok(_) => {
            tracing::info!("Deleted reward rule {}", id);
            Ok(StatusCode::NO_CONTENT)
        }
        Err(err) if is_foreign_key_violation(&err) => Err(ApiError::Conflict {
            message: "Rule has issued coupons and cannot be deleted; deactivate it instead"
                .to_string(),
        }),
        Err(err) => Err(err.into()),
    }
}
