mod common;

use model_shop_api::{
    dto::notifications::CreateNotificationRequest,
    error::AppError,
    routes::params::{NotificationQuery, Pagination},
    services::notification_service,
};

// Targeted and global notifications, unread counting and read marks.
#[tokio::test]
async fn notification_delivery_and_read_marks() -> anyhow::Result<()> {
    let Some(database_url) = common::test_database_url() else {
        return Ok(());
    };
    let state = common::setup_state(&database_url).await?;

    let support = common::create_user(&state, "support", "desk@example.com").await?;
    let alice = common::create_user(&state, "user", "alice@example.com").await?;
    let bob = common::create_user(&state, "user", "bob@example.com").await?;

    // Regular accounts may not create notifications.
    assert!(matches!(
        notification_service::create_notification(
            &state,
            &alice,
            CreateNotificationRequest {
                user_id: None,
                title: "Hi".into(),
                message: "there".into(),
                kind: None,
            }
        )
        .await,
        Err(AppError::Forbidden)
    ));

    // One targeted at Alice, one global broadcast.
    let targeted = notification_service::create_notification(
        &state,
        &support,
        CreateNotificationRequest {
            user_id: Some(alice.user_id),
            title: "Restock".into(),
            message: "HF-01 Vanguard is back in stock".into(),
            kind: Some("promo".into()),
        },
    )
    .await?
    .data
    .unwrap();
    assert!(!targeted.is_global);

    let broadcast = notification_service::create_notification(
        &state,
        &support,
        CreateNotificationRequest {
            user_id: None,
            title: "Maintenance".into(),
            message: "The shop pauses Sunday 02:00 UTC".into(),
            kind: None,
        },
    )
    .await?
    .data
    .unwrap();
    assert!(broadcast.is_global);
    assert_eq!(broadcast.kind, "system");

    assert!(matches!(
        notification_service::create_notification(
            &state,
            &support,
            CreateNotificationRequest {
                user_id: None,
                title: "Bad".into(),
                message: "kind".into(),
                kind: Some("gossip".into()),
            }
        )
        .await,
        Err(AppError::BadRequest(_))
    ));

    // Alice sees both, Bob only the broadcast.
    let count = notification_service::unread_count(&state.pool, &alice)
        .await?
        .data
        .unwrap();
    assert_eq!(count.count, 2);
    let count = notification_service::unread_count(&state.pool, &bob)
        .await?
        .data
        .unwrap();
    assert_eq!(count.count, 1);

    // The kind filter narrows the list.
    let promos = notification_service::list_notifications(
        &state.pool,
        &alice,
        NotificationQuery {
            pagination: Pagination::default(),
            unread_only: Some(true),
            kind: Some("promo".into()),
        },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(promos.items.len(), 1);
    assert_eq!(promos.items[0].id, targeted.id);

    // Bob cannot read a notification addressed to Alice.
    assert!(matches!(
        notification_service::mark_read(&state, &bob, targeted.id).await,
        Err(AppError::NotFound)
    ));

    notification_service::mark_read(&state, &alice, targeted.id).await?;
    let count = notification_service::unread_count(&state.pool, &alice)
        .await?
        .data
        .unwrap();
    assert_eq!(count.count, 1);

    notification_service::mark_all_read(&state, &alice).await?;
    let count = notification_service::unread_count(&state.pool, &alice)
        .await?
        .data
        .unwrap();
    assert_eq!(count.count, 0);

    Ok(())
}
