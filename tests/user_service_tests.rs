//! 用户服务集成测试：权限门控、分页与审计

use site_auth::{
    error::AppError,
    models::{
        auth::LoginRequest,
        user::{ChangePasswordRequest, CreateUserRequest, ListUsersQuery, UpdateUserRequest},
    },
};

mod common;
use common::{
    auth_context, create_test_context, register_admin, register_user, test_meta, TEST_PASSWORD,
};

fn create_request(email: &str) -> CreateUserRequest {
    CreateUserRequest {
        email: email.to_string(),
        password: Some("Created123".to_string()),
        first_name: Some("Created".to_string()),
        last_name: None,
        is_active: None,
        metadata: None,
    }
}

#[tokio::test]
async fn test_anonymous_caller_is_rejected() {
    let ctx = create_test_context();
    let users = &ctx.state.user_service;
    let payload = register_user(&ctx, "alice@example.com").await;

    assert!(matches!(
        users.get_user(None, payload.user.id).await,
        Err(AppError::Unauthenticated)
    ));
    assert!(matches!(
        users.count_users(None).await,
        Err(AppError::Unauthenticated)
    ));
}

#[tokio::test]
async fn test_self_access_and_cross_user_denial() {
    let ctx = create_test_context();
    let users = &ctx.state.user_service;
    let alice = register_user(&ctx, "alice@example.com").await;
    let bob = register_user(&ctx, "bob@example.com").await;
    let alice_ctx = auth_context(&alice);

    let me = users.get_user(Some(&alice_ctx), alice.user.id).await.unwrap();
    assert_eq!(me.email, "alice@example.com");

    assert!(matches!(
        users.get_user(Some(&alice_ctx), bob.user.id).await,
        Err(AppError::Forbidden)
    ));
    assert!(matches!(
        users
            .list_users(Some(&alice_ctx), &ListUsersQuery::default())
            .await,
        Err(AppError::Forbidden)
    ));
}

#[tokio::test]
async fn test_admin_listing_is_clamped() {
    let ctx = create_test_context();
    let users = &ctx.state.user_service;
    let admin = register_admin(&ctx, "admin@example.com").await;
    register_user(&ctx, "a@example.com").await;
    register_user(&ctx, "b@example.com").await;
    let admin_ctx = auth_context(&admin);

    let all = users
        .list_users(Some(&admin_ctx), &ListUsersQuery::default())
        .await
        .unwrap();
    assert_eq!(all.len(), 3);

    let one = users
        .list_users(
            Some(&admin_ctx),
            &ListUsersQuery {
                skip: Some(-5),
                take: Some(0),
            },
        )
        .await
        .unwrap();
    assert_eq!(one.len(), 1);

    assert_eq!(users.count_users(Some(&admin_ctx)).await.unwrap(), 3);
}

#[tokio::test]
async fn test_admin_creates_user_with_audit() {
    let ctx = create_test_context();
    let users = &ctx.state.user_service;
    let admin = register_admin(&ctx, "admin@example.com").await;
    let admin_ctx = auth_context(&admin);

    let created = users
        .create_user(Some(&admin_ctx), create_request("new@example.com"), &test_meta())
        .await
        .unwrap();
    assert!(created.is_active);
    assert!(created.password_hash.is_some());

    // 新账户可以用密码登录
    ctx.state
        .auth_service
        .login(
            LoginRequest {
                email: "new@example.com".to_string(),
                password: "Created123".to_string(),
                site_domain: None,
                page_path: None,
            },
            &test_meta(),
        )
        .await
        .unwrap();

    let audit = ctx
        .store
        .audit_logs()
        .into_iter()
        .find(|l| l.action == "USER_CREATE")
        .unwrap();
    assert_eq!(audit.user_id, Some(admin.user.id));
    assert_eq!(audit.details["created_user_id"], created.id.to_string());

    assert!(matches!(
        users
            .create_user(Some(&admin_ctx), create_request("new@example.com"), &test_meta())
            .await,
        Err(AppError::AlreadyRegistered)
    ));
}

#[tokio::test]
async fn test_non_admin_cannot_create_user() {
    let ctx = create_test_context();
    let alice = register_user(&ctx, "alice@example.com").await;

    let result = ctx
        .state
        .user_service
        .create_user(
            Some(&auth_context(&alice)),
            create_request("new@example.com"),
            &test_meta(),
        )
        .await;
    assert!(matches!(result, Err(AppError::Forbidden)));
}

#[tokio::test]
async fn test_update_profile_keeps_absent_fields() {
    let ctx = create_test_context();
    let users = &ctx.state.user_service;
    let alice = register_user(&ctx, "alice@example.com").await;
    let alice_ctx = auth_context(&alice);

    let updated = users
        .update_user(
            Some(&alice_ctx),
            alice.user.id,
            UpdateUserRequest {
                first_name: Some("Alicia".to_string()),
                ..Default::default()
            },
            &test_meta(),
        )
        .await
        .unwrap();

    assert_eq!(updated.first_name.as_deref(), Some("Alicia"));
    assert_eq!(updated.last_name.as_deref(), Some("User"));
    assert!(ctx
        .store
        .audit_logs()
        .iter()
        .any(|l| l.action == "USER_UPDATE"));
}

#[tokio::test]
async fn test_change_password() {
    let ctx = create_test_context();
    let users = &ctx.state.user_service;
    let alice = register_user(&ctx, "alice@example.com").await;
    let alice_ctx = auth_context(&alice);

    let wrong = users
        .change_password(
            Some(&alice_ctx),
            ChangePasswordRequest {
                current_password: "NotMine123".to_string(),
                new_password: "Changed123".to_string(),
            },
            &test_meta(),
        )
        .await;
    assert!(matches!(wrong, Err(AppError::InvalidCredentials)));

    let weak = users
        .change_password(
            Some(&alice_ctx),
            ChangePasswordRequest {
                current_password: TEST_PASSWORD.to_string(),
                new_password: "weak".to_string(),
            },
            &test_meta(),
        )
        .await;
    assert!(matches!(weak, Err(AppError::BadRequest(_))));

    users
        .change_password(
            Some(&alice_ctx),
            ChangePasswordRequest {
                current_password: TEST_PASSWORD.to_string(),
                new_password: "Changed123".to_string(),
            },
            &test_meta(),
        )
        .await
        .unwrap();

    let login = |password: &str| LoginRequest {
        email: "alice@example.com".to_string(),
        password: password.to_string(),
        site_domain: None,
        page_path: None,
    };
    let auth = &ctx.state.auth_service;
    assert!(matches!(
        auth.login(login(TEST_PASSWORD), &test_meta()).await,
        Err(AppError::InvalidCredentials)
    ));
    assert!(auth.login(login("Changed123"), &test_meta()).await.is_ok());

    assert!(ctx
        .store
        .audit_logs()
        .iter()
        .any(|l| l.action == "PASSWORD_UPDATE" && l.user_id == Some(alice.user.id)));
}

#[tokio::test]
async fn test_admin_deletes_user_and_sessions() {
    let ctx = create_test_context();
    let users = &ctx.state.user_service;
    let admin = register_admin(&ctx, "admin@example.com").await;
    let alice = register_user(&ctx, "alice@example.com").await;

    assert_eq!(ctx.store.sessions_for(alice.user.id).len(), 1);

    users
        .delete_user(Some(&auth_context(&admin)), alice.user.id, &test_meta())
        .await
        .unwrap();

    assert!(ctx.store.sessions_for(alice.user.id).is_empty());
    assert!(ctx.store.roles_of(alice.user.id).is_empty());
    assert!(ctx
        .state
        .session_service
        .validate(&alice.token)
        .await
        .unwrap()
        .is_none());

    let audit = ctx
        .store
        .audit_logs()
        .into_iter()
        .find(|l| l.action == "USER_DELETE")
        .unwrap();
    assert_eq!(audit.details["deleted_user_id"], alice.user.id.to_string());

    assert!(matches!(
        users
            .delete_user(Some(&auth_context(&admin)), alice.user.id, &test_meta())
            .await,
        Err(AppError::NotFound)
    ));
}
