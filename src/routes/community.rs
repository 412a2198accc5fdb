use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{delete, get, post},
};
use uuid::Uuid;

use crate::{
    dto::community::{
        CommentResponse, CreateCommentRequest, CreatePostRequest, LikeResponse, PostList,
        PostResponse, PostWithComments,
    },
    error::AppResult,
    middleware::auth::AuthUser,
    response::ApiResponse,
    routes::params::Pagination,
    services::community_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/posts", get(list_posts).post(create_post))
        .route("/posts/{id}", get(get_post).delete(delete_post))
        .route("/posts/{id}/comments", post(add_comment))
        .route("/posts/{id}/like", post(toggle_like))
        .route("/comments/{id}", delete(delete_comment))
}

#[utoipa::path(
    get,
    path = "/api/community/posts",
    params(
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 20"),
    ),
    responses(
        (status = 200, description = "Public feed, newest first", body = ApiResponse<PostList>)
    ),
    tag = "Community"
)]
pub async fn list_posts(
    State(state): State<AppState>,
    Query(pagination): Query<Pagination>,
) -> AppResult<Json<ApiResponse<PostList>>> {
    let resp = community_service::list_posts(&state.pool, pagination).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/community/posts",
    request_body = CreatePostRequest,
    responses(
        (status = 200, description = "Create post", body = ApiResponse<PostResponse>),
        (status = 400, description = "Empty content or too many images"),
        (status = 401, description = "Unauthorized"),
    ),
    security(("bearer_auth" = [])),
    tag = "Community"
)]
pub async fn create_post(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreatePostRequest>,
) -> AppResult<Json<ApiResponse<PostResponse>>> {
    let resp = community_service::create_post(&state.pool, &user, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/community/posts/{id}",
    params(("id" = Uuid, Path, description = "Post ID")),
    responses(
        (status = 200, description = "Post with its comments", body = ApiResponse<PostWithComments>),
        (status = 404, description = "Post not found"),
    ),
    tag = "Community"
)]
pub async fn get_post(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<PostWithComments>>> {
    let resp = community_service::get_post(&state.pool, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    delete,
    path = "/api/community/posts/{id}",
    params(("id" = Uuid, Path, description = "Post ID")),
    responses(
        (status = 200, description = "Deleted post"),
        (status = 403, description = "Not the author or an admin"),
        (status = 404, description = "Post not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Community"
)]
pub async fn delete_post(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let resp = community_service::delete_post(&state.pool, &user, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/community/posts/{id}/comments",
    params(("id" = Uuid, Path, description = "Post ID")),
    request_body = CreateCommentRequest,
    responses(
        (status = 200, description = "Comment added", body = ApiResponse<CommentResponse>),
        (status = 400, description = "Empty content"),
        (status = 404, description = "Post not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Community"
)]
pub async fn add_comment(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<CreateCommentRequest>,
) -> AppResult<Json<ApiResponse<CommentResponse>>> {
    let resp = community_service::add_comment(&state.pool, &user, id, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    delete,
    path = "/api/community/comments/{id}",
    params(("id" = Uuid, Path, description = "Comment ID")),
    responses(
        (status = 200, description = "Deleted comment"),
        (status = 403, description = "Not the author or an admin"),
        (status = 404, description = "Comment not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Community"
)]
pub async fn delete_comment(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let resp = community_service::delete_comment(&state.pool, &user, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/community/posts/{id}/like",
    params(("id" = Uuid, Path, description = "Post ID")),
    responses(
        (status = 200, description = "Like toggled", body = ApiResponse<LikeResponse>),
        (status = 404, description = "Post not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Community"
)]
pub async fn toggle_like(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<LikeResponse>>> {
    let resp = community_service::toggle_like(&state.pool, &user, id).await?;
    Ok(Json(resp))
}
