use sqlx::FromRow;
use uuid::Uuid;

use crate::{
    audit,
    db::DbPool,
    dto::community::{
        CommentResponse, CreateCommentRequest, CreatePostRequest, LikeResponse, PostList,
        PostResponse, PostWithComments,
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    response::ApiResponse,
    routes::params::Pagination,
};

const MAX_POST_IMAGES: usize = 6;

/// Post row joined with its author's display name.
#[derive(FromRow)]
struct PostRow {
    id: Uuid,
    user_id: Uuid,
    author_name: String,
    content: String,
    images: Vec<String>,
    like_count: i32,
    comment_count: i32,
    created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(FromRow)]
struct CommentRow {
    id: Uuid,
    post_id: Uuid,
    user_id: Uuid,
    author_name: String,
    content: String,
    created_at: chrono::DateTime<chrono::Utc>,
}

impl From<PostRow> for PostResponse {
    fn from(row: PostRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            author_name: row.author_name,
            content: row.content,
            images: row.images,
            like_count: row.like_count,
            comment_count: row.comment_count,
            created_at: row.created_at,
        }
    }
}

impl From<CommentRow> for CommentResponse {
    fn from(row: CommentRow) -> Self {
        Self {
            id: row.id,
            post_id: row.post_id,
            user_id: row.user_id,
            author_name: row.author_name,
            content: row.content,
            created_at: row.created_at,
        }
    }
}

pub async fn list_posts(pool: &DbPool, query: Pagination) -> AppResult<ApiResponse<PostList>> {
    let (page, per_page, offset) = query.normalize();

    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM posts")
        .fetch_one(pool)
        .await?;

    let rows = sqlx::query_as::<_, PostRow>(
        r#"
        SELECT p.id, p.user_id, u.full_name AS author_name, p.content, p.images,
               p.like_count, p.comment_count, p.created_at
        FROM posts p
        JOIN users u ON u.id = p.user_id
        ORDER BY p.created_at DESC
        LIMIT $1 OFFSET $2
        "#,
    )
    .bind(per_page)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    Ok(ApiResponse::paginated(
        "Posts",
        PostList {
            items: rows.into_iter().map(PostResponse::from).collect(),
        },
        page,
        per_page,
        total,
    ))
}

pub async fn create_post(
    pool: &DbPool,
    auth: &AuthUser,
    payload: CreatePostRequest,
) -> AppResult<ApiResponse<PostResponse>> {
    let content = payload.content.trim().to_string();
    if content.is_empty() {
        return Err(AppError::BadRequest("content must not be empty".to_string()));
    }
    if payload.images.len() > MAX_POST_IMAGES {
        return Err(AppError::BadRequest(format!(
            "a post can carry at most {MAX_POST_IMAGES} images"
        )));
    }
    let images: Vec<String> = payload
        .images
        .iter()
        .map(|url| url.trim().to_string())
        .collect();
    if images.iter().any(|url| url.is_empty()) {
        return Err(AppError::BadRequest(
            "image URLs must not be empty".to_string(),
        ));
    }

    let id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO posts (id, user_id, content, images) VALUES ($1, $2, $3, $4)",
    )
    .bind(id)
    .bind(auth.user_id)
    .bind(&content)
    .bind(&images)
    .execute(pool)
    .await?;

    let post = fetch_post(pool, id).await?.ok_or(AppError::NotFound)?;

    audit::record(
        pool,
        Some(auth.user_id),
        "post_create",
        Some(&format!("posts/{id}")),
        None,
    )
    .await;

    Ok(ApiResponse::success(
        "Post created",
        PostResponse::from(post),
        None,
    ))
}

pub async fn get_post(pool: &DbPool, id: Uuid) -> AppResult<ApiResponse<PostWithComments>> {
    let post = fetch_post(pool, id).await?.ok_or(AppError::NotFound)?;

    let comments = sqlx::query_as::<_, CommentRow>(
        r#"
        SELECT c.id, c.post_id, c.user_id, u.full_name AS author_name, c.content, c.created_at
        FROM comments c
        JOIN users u ON u.id = c.user_id
        WHERE c.post_id = $1
        ORDER BY c.created_at ASC
        "#,
    )
    .bind(id)
    .fetch_all(pool)
    .await?;

    Ok(ApiResponse::success(
        "Post",
        PostWithComments {
            post: PostResponse::from(post),
            comments: comments.into_iter().map(CommentResponse::from).collect(),
        },
        None,
    ))
}

/// Deleting a post cascades to its comments and likes at the schema level.
pub async fn delete_post(
    pool: &DbPool,
    auth: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let owner: Option<Uuid> = sqlx::query_scalar("SELECT user_id FROM posts WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    let owner = owner.ok_or(AppError::NotFound)?;
    if owner != auth.user_id && !auth.is_admin() {
        return Err(AppError::Forbidden);
    }

    sqlx::query("DELETE FROM posts WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;

    audit::record(
        pool,
        Some(auth.user_id),
        "post_delete",
        Some(&format!("posts/{id}")),
        None,
    )
    .await;

    Ok(ApiResponse::success(
        "Post deleted",
        serde_json::json!({ "id": id }),
        None,
    ))
}

pub async fn add_comment(
    pool: &DbPool,
    auth: &AuthUser,
    post_id: Uuid,
    payload: CreateCommentRequest,
) -> AppResult<ApiResponse<CommentResponse>> {
    let content = payload.content.trim().to_string();
    if content.is_empty() {
        return Err(AppError::BadRequest("content must not be empty".to_string()));
    }

    let mut txn = pool.begin().await?;

    let exists: Option<Uuid> = sqlx::query_scalar("SELECT id FROM posts WHERE id = $1 FOR UPDATE")
        .bind(post_id)
        .fetch_optional(&mut *txn)
        .await?;
    if exists.is_none() {
        return Err(AppError::NotFound);
    }

    let id = Uuid::new_v4();
    sqlx::query("INSERT INTO comments (id, post_id, user_id, content) VALUES ($1, $2, $3, $4)")
        .bind(id)
        .bind(post_id)
        .bind(auth.user_id)
        .bind(&content)
        .execute(&mut *txn)
        .await?;

    sqlx::query("UPDATE posts SET comment_count = comment_count + 1 WHERE id = $1")
        .bind(post_id)
        .execute(&mut *txn)
        .await?;

    let comment = sqlx::query_as::<_, CommentRow>(
        r#"
        SELECT c.id, c.post_id, c.user_id, u.full_name AS author_name, c.content, c.created_at
        FROM comments c
        JOIN users u ON u.id = c.user_id
        WHERE c.id = $1
        "#,
    )
    .bind(id)
    .fetch_one(&mut *txn)
    .await?;

    txn.commit().await?;

    audit::record(
        pool,
        Some(auth.user_id),
        "comment_create",
        Some(&format!("posts/{post_id}")),
        None,
    )
    .await;

    Ok(ApiResponse::success(
        "Comment added",
        CommentResponse::from(comment),
        None,
    ))
}

pub async fn delete_comment(
    pool: &DbPool,
    auth: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let mut txn = pool.begin().await?;

    let row: Option<(Uuid, Uuid)> =
        sqlx::query_as("SELECT user_id, post_id FROM comments WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *txn)
            .await?;
    let (owner, post_id) = row.ok_or(AppError::NotFound)?;
    if owner != auth.user_id && !auth.is_admin() {
        return Err(AppError::Forbidden);
    }

    sqlx::query("DELETE FROM comments WHERE id = $1")
        .bind(id)
        .execute(&mut *txn)
        .await?;
    sqlx::query("UPDATE posts SET comment_count = comment_count - 1 WHERE id = $1")
        .bind(post_id)
        .execute(&mut *txn)
        .await?;

    txn.commit().await?;

    audit::record(
        pool,
        Some(auth.user_id),
        "comment_delete",
        Some(&format!("posts/{post_id}")),
        None,
    )
    .await;

    Ok(ApiResponse::success(
        "Comment deleted",
        serde_json::json!({ "id": id }),
        None,
    ))
}

/// One like per user per post. The likes row and the denormalized counter
/// move together inside a transaction; the post row is locked so concurrent
/// toggles serialize.
pub async fn toggle_like(
    pool: &DbPool,
    auth: &AuthUser,
    post_id: Uuid,
) -> AppResult<ApiResponse<LikeResponse>> {
    let mut txn = pool.begin().await?;

    let exists: Option<Uuid> = sqlx::query_scalar("SELECT id FROM posts WHERE id = $1 FOR UPDATE")
        .bind(post_id)
        .fetch_optional(&mut *txn)
        .await?;
    if exists.is_none() {
        return Err(AppError::NotFound);
    }

    let removed = sqlx::query("DELETE FROM likes WHERE post_id = $1 AND user_id = $2")
        .bind(post_id)
        .bind(auth.user_id)
        .execute(&mut *txn)
        .await?
        .rows_affected();

    let liked = removed == 0;
    if liked {
        sqlx::query("INSERT INTO likes (post_id, user_id) VALUES ($1, $2)")
            .bind(post_id)
            .bind(auth.user_id)
            .execute(&mut *txn)
            .await?;
    }

    let delta = if liked { 1 } else { -1 };
    let like_count: i32 = sqlx::query_scalar(
        "UPDATE posts SET like_count = like_count + $2 WHERE id = $1 RETURNING like_count",
    )
    .bind(post_id)
    .bind(delta)
    .fetch_one(&mut *txn)
    .await?;

    txn.commit().await?;

    audit::record(
        pool,
        Some(auth.user_id),
        "post_like",
        Some(&format!("posts/{post_id}")),
        Some(serde_json::json!({ "liked": liked })),
    )
    .await;

    Ok(ApiResponse::success(
        if liked { "Post liked" } else { "Like removed" },
        LikeResponse { liked, like_count },
        None,
    ))
}

async fn fetch_post(pool: &DbPool, id: Uuid) -> AppResult<Option<PostRow>> {
    let row = sqlx::query_as::<_, PostRow>(
        r#"
        SELECT p.id, p.user_id, u.full_name AS author_name, p.content, p.images,
               p.like_count, p.comment_count, p.created_at
        FROM posts p
        JOIN users u ON u.id = p.user_id
        WHERE p.id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}
