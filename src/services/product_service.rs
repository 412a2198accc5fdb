use chrono::Utc;
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::Expr;
use sea_orm::sea_query::extension::postgres::PgExpr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use uuid::Uuid;

use crate::{
    audit,
    dto::products::{CreateProductRequest, ProductList, ProductResponse, UpdateProductRequest},
    entity::{
        brands::Entity as Brands,
        categories::Entity as Categories,
        products::{ActiveModel, Column, Entity as Products},
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::is_valid_status_flag,
    response::{ApiResponse, Meta},
    routes::params::{ProductQuery, ProductSort},
    state::AppState,
};

pub async fn list_products(
    state: &AppState,
    query: ProductQuery,
) -> AppResult<ApiResponse<ProductList>> {
    let (page, limit, offset) = query.pagination.normalize();
    let mut condition = Condition::all();

    if let Some(search) = query.q.as_ref().filter(|s| !s.is_empty()) {
        let pattern = format!("%{}%", search);
        condition = condition.add(
            Condition::any()
                .add(Expr::col(Column::Name).ilike(pattern.clone()))
                .add(Expr::col(Column::Description).ilike(pattern)),
        );
    }

    if let Some(category_id) = query.category_id {
        condition = condition.add(Column::CategoryId.eq(category_id));
    }

    if let Some(brand_id) = query.brand_id {
        condition = condition.add(Column::BrandId.eq(brand_id));
    }

    if let Some(flag) = query.status.as_ref().filter(|s| !s.is_empty()) {
        if !is_valid_status_flag(flag) {
            return Err(AppError::BadRequest(format!("Unknown status flag: {flag}")));
        }
        condition = condition.add(Expr::cust_with_values("? = ANY(status)", [flag.clone()]));
    }

    let mut finder = Products::find().filter(condition);
    finder = match query.sort.unwrap_or(ProductSort::Newest) {
        ProductSort::Popularity => finder
            .order_by_desc(Column::SoldCount)
            .order_by_desc(Column::CreatedAt),
        ProductSort::Newest => finder.order_by_desc(Column::CreatedAt),
        ProductSort::PriceAsc => finder.order_by_asc(Column::PriceCents),
        ProductSort::PriceDesc => finder.order_by_desc(Column::PriceCents),
    };

    let total = finder.clone().count(&state.orm).await? as i64;

    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(ProductResponse::from)
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success("Products", ProductList { items }, Some(meta)))
}

pub async fn get_product(state: &AppState, id: Uuid) -> AppResult<ApiResponse<ProductResponse>> {
    let product = Products::find_by_id(id).one(&state.orm).await?;
    let product = match product {
        Some(p) => p,
        None => return Err(AppError::NotFound),
    };
    Ok(ApiResponse::success("Product", product.into(), None))
}

pub async fn create_product(
    state: &AppState,
    user: &AuthUser,
    payload: CreateProductRequest,
) -> AppResult<ApiResponse<ProductResponse>> {
    ensure_admin(user)?;
    validate_product_fields(
        Some(&payload.name),
        Some(payload.price_cents),
        Some(payload.discount_percent),
        Some(payload.stock_quantity),
        Some(&payload.status),
    )?;
    check_references(state, payload.category_id, payload.brand_id).await?;

    let id = Uuid::new_v4();
    let active = ActiveModel {
        id: Set(id),
        name: Set(payload.name),
        description: Set(payload.description),
        category_id: Set(payload.category_id),
        brand_id: Set(payload.brand_id),
        price_cents: Set(payload.price_cents),
        discount_percent: Set(payload.discount_percent),
        stock_quantity: Set(payload.stock_quantity),
        sold_count: Set(0),
        status: Set(payload.status),
        nft_token_id: Set(payload.nft_token_id),
        created_at: NotSet,
        updated_at: NotSet,
    };
    let product = active.insert(&state.orm).await?;

    audit::record(
        &state.pool,
        Some(user.user_id),
        "product_create",
        Some("products"),
        Some(serde_json::json!({ "product_id": product.id })),
    )
    .await;

    Ok(ApiResponse::success(
        "Product created",
        product.into(),
        Some(Meta::empty()),
    ))
}

pub async fn update_product(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateProductRequest,
) -> AppResult<ApiResponse<ProductResponse>> {
    ensure_admin(user)?;
    validate_product_fields(
        payload.name.as_deref(),
        payload.price_cents,
        payload.discount_percent,
        payload.stock_quantity,
        payload.status.as_deref(),
    )?;
    check_references(state, payload.category_id, payload.brand_id).await?;

    let existing = Products::find_by_id(id).one(&state.orm).await?;
    let existing = match existing {
        Some(p) => p,
        None => return Err(AppError::NotFound),
    };

    let mut active: ActiveModel = existing.into();
    if let Some(name) = payload.name {
        active.name = Set(name);
    }
    if let Some(description) = payload.description {
        active.description = Set(Some(description));
    }
    if let Some(category_id) = payload.category_id {
        active.category_id = Set(Some(category_id));
    }
    if let Some(brand_id) = payload.brand_id {
        active.brand_id = Set(Some(brand_id));
    }
    if let Some(price_cents) = payload.price_cents {
        active.price_cents = Set(price_cents);
    }
    if let Some(discount_percent) = payload.discount_percent {
        active.discount_percent = Set(discount_percent);
    }
    if let Some(stock_quantity) = payload.stock_quantity {
        active.stock_quantity = Set(stock_quantity);
    }
    if let Some(status) = payload.status {
        active.status = Set(status);
    }
    if let Some(nft_token_id) = payload.nft_token_id {
        active.nft_token_id = Set(Some(nft_token_id));
    }
    active.updated_at = Set(Utc::now().into());

    let product = active.update(&state.orm).await?;

    audit::record(
        &state.pool,
        Some(user.user_id),
        "product_update",
        Some("products"),
        Some(serde_json::json!({ "product_id": product.id })),
    )
    .await;

    Ok(ApiResponse::success(
        "Updated",
        product.into(),
        Some(Meta::empty()),
    ))
}

pub async fn delete_product(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    ensure_admin(user)?;
    let result = Products::delete_by_id(id).exec(&state.orm).await?;

    if result.rows_affected == 0 {
        return Err(AppError::NotFound);
    }

    audit::record(
        &state.pool,
        Some(user.user_id),
        "product_delete",
        Some("products"),
        Some(serde_json::json!({ "product_id": id })),
    )
    .await;

    Ok(ApiResponse::success(
        "Deleted",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

fn validate_product_fields(
    name: Option<&str>,
    price_cents: Option<i64>,
    discount_percent: Option<i32>,
    stock_quantity: Option<i32>,
    status: Option<&[String]>,
) -> AppResult<()> {
    if let Some(name) = name {
        if name.trim().is_empty() {
            return Err(AppError::BadRequest("Name is required".into()));
        }
    }
    if let Some(price) = price_cents {
        if price < 0 {
            return Err(AppError::BadRequest("Price cannot be negative".into()));
        }
    }
    if let Some(discount) = discount_percent {
        if !(0..=100).contains(&discount) {
            return Err(AppError::BadRequest(
                "discount_percent must be between 0 and 100".into(),
            ));
        }
    }
    if let Some(stock) = stock_quantity {
        if stock < 0 {
            return Err(AppError::BadRequest("Stock cannot be negative".into()));
        }
    }
    if let Some(flags) = status {
        for flag in flags {
            if !is_valid_status_flag(flag) {
                return Err(AppError::BadRequest(format!("Unknown status flag: {flag}")));
            }
        }
    }
    Ok(())
}

async fn check_references(
    state: &AppState,
    category_id: Option<Uuid>,
    brand_id: Option<Uuid>,
) -> AppResult<()> {
    if let Some(id) = category_id {
        if Categories::find_by_id(id).one(&state.orm).await?.is_none() {
            return Err(AppError::BadRequest("Category does not exist".into()));
        }
    }
    if let Some(id) = brand_id {
        if Brands::find_by_id(id).one(&state.orm).await?.is_none() {
            return Err(AppError::BadRequest("Brand does not exist".into()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_validation_bounds() {
        assert!(validate_product_fields(Some("Zaku II"), Some(0), Some(0), Some(0), None).is_ok());
        assert!(validate_product_fields(Some(" "), None, None, None, None).is_err());
        assert!(validate_product_fields(None, Some(-1), None, None, None).is_err());
        assert!(validate_product_fields(None, None, Some(101), None, None).is_err());
        assert!(validate_product_fields(None, None, None, Some(-5), None).is_err());

        let bad_flags = vec!["hot".to_string(), "shiny".to_string()];
        assert!(validate_product_fields(None, None, None, None, Some(&bad_flags)).is_err());
        let good_flags = vec!["hot".to_string(), "sale".to_string()];
        assert!(validate_product_fields(None, None, None, None, Some(&good_flags)).is_ok());
    }
}
