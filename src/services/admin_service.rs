use chrono::Utc;
use sea_orm::ActiveValue::Set;
use sea_orm::sea_query::{Expr, LockType};
use sea_orm::sea_query::extension::postgres::PgExpr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    audit,
    dto::{
        orders::{OrderDetailResponse, OrderList, OrderResponse, OrderWithDetails},
        products::ProductResponse,
        users::{UserList, UserProfile},
    },
    entity::{
        order_details::{Column as DetailCol, Entity as OrderDetails},
        orders::{ActiveModel as OrderActive, Column as OrderCol, Entity as Orders},
        products::{Column as ProdCol, Entity as Products},
        users::{ActiveModel as UserActive, Column as UserCol, Entity as Users, Model as UserModel},
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin, ensure_any_role},
    models::{is_valid_order_status, is_valid_role},
    response::{ApiResponse, Meta},
    routes::admin::{DashboardStats, UpdateActiveRequest, UpdateOrderStatusRequest, UpdateRoleRequest},
    routes::params::{OrderListQuery, UserListQuery},
    services::notification_service,
    state::AppState,
};

/// Products at or below this stock level surface on the dashboard.
const LOW_STOCK_THRESHOLD: i32 = 5;

pub async fn list_users(
    state: &AppState,
    auth: &AuthUser,
    query: UserListQuery,
) -> AppResult<ApiResponse<UserList>> {
    ensure_admin(auth)?;
    let (page, per_page, offset) = query.pagination.normalize();

    let mut condition = Condition::all();
    if let Some(search) = query.q.as_ref().filter(|s| !s.is_empty()) {
        let pattern = format!("%{}%", search);
        condition = condition.add(
            Condition::any()
                .add(Expr::col(UserCol::Email).ilike(pattern.clone()))
                .add(Expr::col(UserCol::FullName).ilike(pattern)),
        );
    }
    if let Some(role) = query.role.as_ref().filter(|r| !r.is_empty()) {
        if !is_valid_role(role) {
            return Err(AppError::BadRequest(format!("Unknown role: {role}")));
        }
        condition = condition.add(UserCol::Role.eq(role.clone()));
    }

    let finder = Users::find()
        .filter(condition)
        .order_by_desc(UserCol::CreatedAt);

    let total = finder.clone().count(&state.orm).await? as i64;

    let items = finder
        .limit(per_page as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(profile_from_entity)
        .collect();

    Ok(ApiResponse::success(
        "Users",
        UserList { items },
        Some(Meta::new(page, per_page, total)),
    ))
}

pub async fn update_user_role(
    state: &AppState,
    auth: &AuthUser,
    id: Uuid,
    payload: UpdateRoleRequest,
) -> AppResult<ApiResponse<UserProfile>> {
    ensure_admin(auth)?;
    if !is_valid_role(&payload.role) {
        return Err(AppError::BadRequest(format!("Unknown role: {}", payload.role)));
    }
    // Locking yourself out of the admin role takes a second admin.
    if id == auth.user_id {
        return Err(AppError::BadRequest(
            "You cannot change your own role".to_string(),
        ));
    }

    let user = Users::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let mut active: UserActive = user.into();
    active.role = Set(payload.role.clone());
    active.updated_at = Set(Utc::now().into());
    let user = active.update(&state.orm).await?;

    audit::record(
        &state.pool,
        Some(auth.user_id),
        "user_role_update",
        Some("users"),
        Some(serde_json::json!({ "user_id": user.id, "role": user.role })),
    )
    .await;

    Ok(ApiResponse::success(
        "Role updated",
        profile_from_entity(user),
        None,
    ))
}

pub async fn update_user_active(
    state: &AppState,
    auth: &AuthUser,
    id: Uuid,
    payload: UpdateActiveRequest,
) -> AppResult<ApiResponse<UserProfile>> {
    ensure_admin(auth)?;
    if id == auth.user_id && !payload.is_active {
        return Err(AppError::BadRequest(
            "You cannot deactivate your own account".to_string(),
        ));
    }

    let user = Users::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let mut active: UserActive = user.into();
    active.is_active = Set(payload.is_active);
    active.updated_at = Set(Utc::now().into());
    let user = active.update(&state.orm).await?;

    audit::record(
        &state.pool,
        Some(auth.user_id),
        "user_active_update",
        Some("users"),
        Some(serde_json::json!({ "user_id": user.id, "is_active": user.is_active })),
    )
    .await;

    Ok(ApiResponse::success(
        if payload.is_active {
            "Account activated"
        } else {
            "Account deactivated"
        },
        profile_from_entity(user),
        None,
    ))
}

pub async fn dashboard(
    state: &AppState,
    auth: &AuthUser,
) -> AppResult<ApiResponse<DashboardStats>> {
    ensure_admin(auth)?;

    let users: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
        .fetch_one(&state.pool)
        .await?;
    let products: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
        .fetch_one(&state.pool)
        .await?;
    let orders: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders")
        .fetch_one(&state.pool)
        .await?;
    let posts: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM posts")
        .fetch_one(&state.pool)
        .await?;
    let revenue_cents: i64 = sqlx::query_scalar(
        "SELECT COALESCE(SUM(total_cents), 0)::BIGINT FROM orders WHERE status <> 'cancelled'",
    )
    .fetch_one(&state.pool)
    .await?;

    let recent_orders: Vec<OrderResponse> = Orders::find()
        .order_by_desc(OrderCol::CreatedAt)
        .limit(5)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(OrderResponse::from)
        .collect();

    let low_stock: Vec<ProductResponse> = Products::find()
        .filter(ProdCol::StockQuantity.lte(LOW_STOCK_THRESHOLD))
        .order_by_asc(ProdCol::StockQuantity)
        .limit(5)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(ProductResponse::from)
        .collect();

    Ok(ApiResponse::success(
        "Dashboard",
        DashboardStats {
            users,
            products,
            orders,
            posts,
            revenue_cents,
            recent_orders,
            low_stock,
        },
        None,
    ))
}

pub async fn list_all_orders(
    state: &AppState,
    auth: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    ensure_any_role(auth, &["admin", "support"])?;
    let (page, per_page, offset) = query.pagination.normalize();

    let mut condition = Condition::all();
    if let Some(status) = query.status.as_ref().filter(|s| !s.is_empty()) {
        if !is_valid_order_status(status) {
            return Err(AppError::BadRequest(format!("Unknown order status: {status}")));
        }
        condition = condition.add(OrderCol::Status.eq(status.clone()));
    }

    let finder = Orders::find()
        .filter(condition)
        .order_by_desc(OrderCol::CreatedAt);

    let total = finder.clone().count(&state.orm).await? as i64;

    let items = finder
        .limit(per_page as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(OrderResponse::from)
        .collect();

    Ok(ApiResponse::success(
        "Orders",
        OrderList { items },
        Some(Meta::new(page, per_page, total)),
    ))
}

pub async fn get_order_admin(
    state: &AppState,
    auth: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<OrderWithDetails>> {
    ensure_any_role(auth, &["admin", "support"])?;

    let order = Orders::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let details = OrderDetails::find()
        .filter(DetailCol::OrderId.eq(order.id))
        .all(&state.orm)
        .await?
        .into_iter()
        .map(OrderDetailResponse::from)
        .collect();

    Ok(ApiResponse::success(
        "Order",
        OrderWithDetails {
            order: order.into(),
            details,
        },
        Some(Meta::empty()),
    ))
}

/// Move an order through its lifecycle. Entering `cancelled` rolls stock and
/// sold counters back; a cancelled order is terminal and cannot change again.
pub async fn update_order_status(
    state: &AppState,
    auth: &AuthUser,
    id: Uuid,
    payload: UpdateOrderStatusRequest,
) -> AppResult<ApiResponse<OrderResponse>> {
    ensure_any_role(auth, &["admin", "support"])?;
    if !is_valid_order_status(&payload.status) {
        return Err(AppError::BadRequest(format!(
            "Unknown order status: {}",
            payload.status
        )));
    }

    let txn = state.orm.begin().await?;

    let order = Orders::find_by_id(id)
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound)?;

    if order.status == "cancelled" {
        return Err(AppError::BadRequest(
            "Cancelled orders cannot change status".to_string(),
        ));
    }

    if payload.status == "cancelled" {
        let details = OrderDetails::find()
            .filter(DetailCol::OrderId.eq(order.id))
            .all(&txn)
            .await?;
        for detail in &details {
            Products::update_many()
                .col_expr(
                    ProdCol::StockQuantity,
                    Expr::col(ProdCol::StockQuantity).add(detail.quantity),
                )
                .col_expr(
                    ProdCol::SoldCount,
                    Expr::col(ProdCol::SoldCount).sub(detail.quantity),
                )
                .filter(ProdCol::Id.eq(detail.product_id))
                .exec(&txn)
                .await?;
        }
    }

    let mut active: OrderActive = order.into();
    active.status = Set(payload.status.clone());
    active.updated_at = Set(Utc::now().into());
    let order = active.update(&txn).await?;

    txn.commit().await?;

    audit::record(
        &state.pool,
        Some(auth.user_id),
        "order_status_update",
        Some("orders"),
        Some(serde_json::json!({ "order_id": order.id, "status": order.status })),
    )
    .await;

    if let Some(user_id) = order.user_id {
        let state2 = state.clone();
        let order_code = order.order_code.clone();
        let status = order.status.clone();
        tokio::spawn(async move {
            if let Err(err) =
                notification_service::notify_order_status(&state2, user_id, &order_code, &status)
                    .await
            {
                tracing::warn!(error = %err, "status notification failed");
            }
        });
    }

    Ok(ApiResponse::success(
        "Order updated",
        order.into(),
        Some(Meta::empty()),
    ))
}

fn profile_from_entity(model: UserModel) -> UserProfile {
    UserProfile {
        id: model.id,
        email: model.email,
        full_name: model.full_name,
        role: model.role,
        wallet_address: model.wallet_address,
        is_active: model.is_active,
        created_at: model.created_at.with_timezone(&Utc),
    }
}
