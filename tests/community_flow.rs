mod common;

use model_shop_api::{
    dto::community::{CreateCommentRequest, CreatePostRequest},
    error::AppError,
    routes::params::Pagination,
    services::community_service,
};

// Posts, comments and likes keep their denormalized counters in step, and
// only authors or admins may remove content.
#[tokio::test]
async fn post_comment_like_counters_and_permissions() -> anyhow::Result<()> {
    let Some(database_url) = common::test_database_url() else {
        return Ok(());
    };
    let state = common::setup_state(&database_url).await?;

    let author = common::create_user(&state, "user", "author@example.com").await?;
    let reader = common::create_user(&state, "user", "reader@example.com").await?;
    let admin = common::create_user(&state, "admin", "mod@example.com").await?;

    // Content is required and the image list is capped.
    assert!(matches!(
        community_service::create_post(
            &state.pool,
            &author,
            CreatePostRequest {
                content: "   ".into(),
                images: Vec::new(),
            }
        )
        .await,
        Err(AppError::BadRequest(_))
    ));
    assert!(matches!(
        community_service::create_post(
            &state.pool,
            &author,
            CreatePostRequest {
                content: "too many pictures".into(),
                images: vec!["https://img.example/x.jpg".into(); 7],
            }
        )
        .await,
        Err(AppError::BadRequest(_))
    ));

    let post = community_service::create_post(
        &state.pool,
        &author,
        CreatePostRequest {
            content: "Finished the HF-01, panel lining took a weekend".into(),
            images: vec![
                "https://img.example/front.jpg".into(),
                "https://img.example/back.jpg".into(),
            ],
        },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(post.author_name, "Test Account");
    assert_eq!(post.like_count, 0);
    assert_eq!(post.comment_count, 0);
    assert_eq!(post.images.len(), 2);

    // A comment bumps the counter and comes back joined with its author.
    let comment = community_service::add_comment(
        &state.pool,
        &reader,
        post.id,
        CreateCommentRequest {
            content: "Clean nub work!".into(),
        },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(comment.post_id, post.id);

    let detail = community_service::get_post(&state.pool, post.id)
        .await?
        .data
        .unwrap();
    assert_eq!(detail.post.comment_count, 1);
    assert_eq!(detail.comments.len(), 1);
    assert_eq!(detail.comments[0].content, "Clean nub work!");

    // Likes toggle per user: on, on from another user, then off again.
    let like = community_service::toggle_like(&state.pool, &reader, post.id)
        .await?
        .data
        .unwrap();
    assert!(like.liked);
    assert_eq!(like.like_count, 1);

    let like = community_service::toggle_like(&state.pool, &author, post.id)
        .await?
        .data
        .unwrap();
    assert!(like.liked);
    assert_eq!(like.like_count, 2);

    let like = community_service::toggle_like(&state.pool, &reader, post.id)
        .await?
        .data
        .unwrap();
    assert!(!like.liked);
    assert_eq!(like.like_count, 1);

    // Removing the comment walks the counter back down.
    community_service::delete_comment(&state.pool, &reader, comment.id).await?;
    let detail = community_service::get_post(&state.pool, post.id)
        .await?
        .data
        .unwrap();
    assert_eq!(detail.post.comment_count, 0);
    assert!(detail.comments.is_empty());

    // A bystander cannot delete someone else's post; an admin can.
    assert!(matches!(
        community_service::delete_post(&state.pool, &reader, post.id).await,
        Err(AppError::Forbidden)
    ));
    community_service::delete_post(&state.pool, &admin, post.id).await?;
    assert!(matches!(
        community_service::get_post(&state.pool, post.id).await,
        Err(AppError::NotFound)
    ));

    // The feed pages newest-first.
    for n in 1..=3 {
        community_service::create_post(
            &state.pool,
            &author,
            CreatePostRequest {
                content: format!("WIP update {n}"),
                images: Vec::new(),
            },
        )
        .await?;
    }
    let page = community_service::list_posts(
        &state.pool,
        Pagination {
            page: Some(1),
            per_page: Some(2),
        },
    )
    .await?;
    let meta = page.meta.unwrap();
    assert_eq!(meta.total, Some(3));
    assert_eq!(page.data.unwrap().items.len(), 2);

    Ok(())
}
