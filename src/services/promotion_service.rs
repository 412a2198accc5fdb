use chrono::{DateTime, Utc};
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseTransaction, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set,
};
use uuid::Uuid;

use crate::{
    audit,
    dto::promotions::{
        CreatePromotionRequest, PromotionList, PromotionResponse, UpdatePromotionRequest,
        ValidatePromotionRequest, ValidatePromotionResponse,
    },
    entity::promotions::{ActiveModel, Column, Entity as Promotions, Model as PromotionModel},
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    pricing,
    response::{ApiResponse, Meta},
    routes::params::Pagination,
    state::AppState,
};

/// Why a promotion cannot be used right now. `None` means it is usable.
fn classify_unusable(promo: &PromotionModel, now: DateTime<Utc>) -> Option<AppError> {
    let start = promo.start_date.with_timezone(&Utc);
    let end = promo.end_date.with_timezone(&Utc);
    if !promo.is_active || now < start || now > end {
        return Some(AppError::BadRequest("Promotion code has expired".into()));
    }
    if promo.usage_count >= promo.max_usage {
        return Some(AppError::BadRequest("Promotion code is exhausted".into()));
    }
    None
}

fn normalized_code(code: &str) -> AppResult<String> {
    let code = code.trim().to_uppercase();
    if code.is_empty() {
        return Err(AppError::BadRequest("Promotion code is required".into()));
    }
    Ok(code)
}

/// Read-only preview of a code against a subtotal. Never touches
/// `usage_count`; redemption happens only inside checkout.
pub async fn validate(
    state: &AppState,
    payload: ValidatePromotionRequest,
) -> AppResult<ApiResponse<ValidatePromotionResponse>> {
    if payload.subtotal_cents < 0 {
        return Err(AppError::BadRequest("subtotal_cents cannot be negative".into()));
    }
    let code = normalized_code(&payload.code)?;

    let promo = Promotions::find()
        .filter(Column::Code.eq(code.clone()))
        .one(&state.orm)
        .await?;
    let promo = match promo {
        Some(p) => p,
        None => return Err(AppError::NotFound),
    };

    if let Some(reason) = classify_unusable(&promo, Utc::now()) {
        return Err(reason);
    }

    let discount_cents = pricing::promo_discount(payload.subtotal_cents, promo.discount_percent);
    let data = ValidatePromotionResponse {
        code,
        discount_percent: promo.discount_percent,
        discount_cents,
    };
    Ok(ApiResponse::success("Promotion is valid", data, None))
}

/// Atomically reserve one use of a code inside the checkout transaction.
/// The guards live in the UPDATE itself, so two racing checkouts cannot
/// both take the last slot, and a refused redemption mutates nothing.
pub async fn redeem(txn: &DatabaseTransaction, code: &str) -> AppResult<PromotionModel> {
    let code = normalized_code(code)?;
    let now = Utc::now();

    let promo = Promotions::find()
        .filter(Column::Code.eq(code))
        .one(txn)
        .await?;
    let promo = match promo {
        Some(p) => p,
        None => return Err(AppError::NotFound),
    };

    let result = Promotions::update_many()
        .col_expr(Column::UsageCount, Expr::col(Column::UsageCount).add(1))
        .filter(
            Condition::all()
                .add(Column::Id.eq(promo.id))
                .add(Column::IsActive.eq(true))
                .add(Column::StartDate.lte(now))
                .add(Column::EndDate.gte(now))
                .add(Expr::cust("usage_count < max_usage")),
        )
        .exec(txn)
        .await?;

    if result.rows_affected == 0 {
        // Re-read for an accurate reason; the row may have moved since the find.
        let current = Promotions::find_by_id(promo.id)
            .one(txn)
            .await?
            .unwrap_or(promo);
        return Err(classify_unusable(&current, now)
            .unwrap_or_else(|| AppError::BadRequest("Promotion cannot be applied".into())));
    }

    Ok(promo)
}

pub async fn list_promotions(
    state: &AppState,
    user: &AuthUser,
    pagination: Pagination,
) -> AppResult<ApiResponse<PromotionList>> {
    ensure_admin(user)?;
    let (page, limit, offset) = pagination.normalize();

    let finder = Promotions::find().order_by_desc(Column::CreatedAt);
    let total = finder.clone().count(&state.orm).await? as i64;
    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(PromotionResponse::from)
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success(
        "Promotions",
        PromotionList { items },
        Some(meta),
    ))
}

pub async fn create_promotion(
    state: &AppState,
    user: &AuthUser,
    payload: CreatePromotionRequest,
) -> AppResult<ApiResponse<PromotionResponse>> {
    ensure_admin(user)?;
    let code = normalized_code(&payload.code)?;
    validate_promotion_fields(
        Some(payload.discount_percent),
        Some(payload.max_usage),
        Some((payload.start_date, payload.end_date)),
    )?;

    let exists = Promotions::find()
        .filter(Column::Code.eq(code.clone()))
        .one(&state.orm)
        .await?;
    if exists.is_some() {
        return Err(AppError::Conflict("Promotion code already exists".into()));
    }

    let promo = ActiveModel {
        id: Set(Uuid::new_v4()),
        code: Set(code),
        description: Set(payload.description),
        discount_percent: Set(payload.discount_percent),
        start_date: Set(payload.start_date.into()),
        end_date: Set(payload.end_date.into()),
        max_usage: Set(payload.max_usage),
        usage_count: Set(0),
        is_active: Set(payload.is_active),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    audit::record(
        &state.pool,
        Some(user.user_id),
        "promotion_create",
        Some("promotions"),
        Some(serde_json::json!({ "promotion_id": promo.id, "code": promo.code })),
    )
    .await;

    Ok(ApiResponse::success(
        "Promotion created",
        promo.into(),
        Some(Meta::empty()),
    ))
}

pub async fn update_promotion(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdatePromotionRequest,
) -> AppResult<ApiResponse<PromotionResponse>> {
    ensure_admin(user)?;

    let existing = Promotions::find_by_id(id).one(&state.orm).await?;
    let existing = match existing {
        Some(p) => p,
        None => return Err(AppError::NotFound),
    };

    let start = payload
        .start_date
        .unwrap_or_else(|| existing.start_date.with_timezone(&Utc));
    let end = payload
        .end_date
        .unwrap_or_else(|| existing.end_date.with_timezone(&Utc));
    validate_promotion_fields(payload.discount_percent, payload.max_usage, Some((start, end)))?;

    let mut active: ActiveModel = existing.into();
    if let Some(description) = payload.description {
        active.description = Set(Some(description));
    }
    if let Some(discount_percent) = payload.discount_percent {
        active.discount_percent = Set(discount_percent);
    }
    if let Some(start_date) = payload.start_date {
        active.start_date = Set(start_date.into());
    }
    if let Some(end_date) = payload.end_date {
        active.end_date = Set(end_date.into());
    }
    if let Some(max_usage) = payload.max_usage {
        active.max_usage = Set(max_usage);
    }
    if let Some(is_active) = payload.is_active {
        active.is_active = Set(is_active);
    }
    let promo = active.update(&state.orm).await?;

    audit::record(
        &state.pool,
        Some(user.user_id),
        "promotion_update",
        Some("promotions"),
        Some(serde_json::json!({ "promotion_id": promo.id })),
    )
    .await;

    Ok(ApiResponse::success(
        "Updated",
        promo.into(),
        Some(Meta::empty()),
    ))
}

pub async fn delete_promotion(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    ensure_admin(user)?;
    let result = Promotions::delete_by_id(id).exec(&state.orm).await?;
    if result.rows_affected == 0 {
        return Err(AppError::NotFound);
    }

    audit::record(
        &state.pool,
        Some(user.user_id),
        "promotion_delete",
        Some("promotions"),
        Some(serde_json::json!({ "promotion_id": id })),
    )
    .await;

    Ok(ApiResponse::success(
        "Deleted",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

fn validate_promotion_fields(
    discount_percent: Option<i32>,
    max_usage: Option<i32>,
    window: Option<(DateTime<Utc>, DateTime<Utc>)>,
) -> AppResult<()> {
    if let Some(discount) = discount_percent {
        if !(0..=100).contains(&discount) {
            return Err(AppError::BadRequest(
                "discount_percent must be between 0 and 100".into(),
            ));
        }
    }
    if let Some(max) = max_usage {
        if max <= 0 {
            return Err(AppError::BadRequest("max_usage must be positive".into()));
        }
    }
    if let Some((start, end)) = window {
        if end <= start {
            return Err(AppError::BadRequest(
                "end_date must be after start_date".into(),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn promo(start_off: i64, end_off: i64, usage: i32, max: i32, active: bool) -> PromotionModel {
        let now = Utc::now();
        PromotionModel {
            id: Uuid::new_v4(),
            code: "SPRING10".into(),
            description: None,
            discount_percent: 10,
            start_date: (now + Duration::hours(start_off)).into(),
            end_date: (now + Duration::hours(end_off)).into(),
            max_usage: max,
            usage_count: usage,
            is_active: active,
            created_at: now.into(),
        }
    }

    #[test]
    fn usable_promotion_passes() {
        assert!(classify_unusable(&promo(-1, 1, 0, 5, true), Utc::now()).is_none());
    }

    #[test]
    fn window_and_flag_failures_read_as_expired() {
        for p in [
            promo(1, 2, 0, 5, true),   // not started
            promo(-2, -1, 0, 5, true), // ended
            promo(-1, 1, 0, 5, false), // switched off
        ] {
            match classify_unusable(&p, Utc::now()) {
                Some(AppError::BadRequest(msg)) => assert!(msg.contains("expired")),
                other => panic!("expected expired, got {other:?}"),
            }
        }
    }

    #[test]
    fn usage_cap_reads_as_exhausted() {
        match classify_unusable(&promo(-1, 1, 5, 5, true), Utc::now()) {
            Some(AppError::BadRequest(msg)) => assert!(msg.contains("exhausted")),
            other => panic!("expected exhausted, got {other:?}"),
        }
    }

    #[test]
    fn code_normalization_uppercases() {
        assert_eq!(normalized_code(" spring10 ").unwrap(), "SPRING10");
        assert!(normalized_code("   ").is_err());
    }

    #[test]
    fn field_validation() {
        assert!(validate_promotion_fields(Some(101), None, None).is_err());
        assert!(validate_promotion_fields(None, Some(0), None).is_err());
        let now = Utc::now();
        assert!(validate_promotion_fields(None, None, Some((now, now))).is_err());
        assert!(
            validate_promotion_fields(Some(10), Some(5), Some((now, now + Duration::days(1))))
                .is_ok()
        );
    }
}
