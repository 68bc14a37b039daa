mod common;

use axum::http::StatusCode;
use backoffice_auth::{
    config::BootstrapAdminConfig,
    models::Role,
    services::CredentialStore,
};
use common::{json_request, TestApp};
use serde_json::json;
use uuid::Uuid;

#[tokio::test]
async fn super_admin_provisions_and_deactivates_users() {
    let app = TestApp::spawn();
    let owner = app.seed_user("owner@shop.test", None, Role::SuperAdmin).await;
    let token = app.token_for(&owner);

    let (status, created) = app
        .send(json_request(
            "POST",
            "/admin/users",
            json!({
                "email": "cashier@shop.test",
                "phone": "+15551234567",
                "password": "initial-password",
                "role": "USER"
            }),
            Some(&token),
        ))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["role"], "USER");
    assert_eq!(created["is_active"], true);

    let user_id = created["user_id"].as_str().unwrap().to_string();
    let (status, updated) = app
        .send(json_request(
            "PATCH",
            &format!("/admin/users/{}/status", user_id),
            json!({ "active": false }),
            Some(&token),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["is_active"], false);

    let stored = app
        .store
        .find_user_by_id(Uuid::parse_str(&user_id).unwrap())
        .await
        .unwrap()
        .unwrap();
    assert!(!stored.is_active);
}

#[tokio::test]
async fn duplicate_email_is_409() {
    let app = TestApp::spawn();
    let owner = app.seed_user("owner@shop.test", None, Role::SuperAdmin).await;
    let token = app.token_for(&owner);

    let (status, body) = app
        .send(json_request(
            "POST",
            "/admin/users",
            json!({ "email": "OWNER@shop.test", "password": "initial-password", "role": "ADMIN" }),
            Some(&token),
        ))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "Email already registered");
}

#[tokio::test]
async fn provisioning_enforces_password_minimum() {
    let app = TestApp::spawn();
    let owner = app.seed_user("owner@shop.test", None, Role::SuperAdmin).await;
    let token = app.token_for(&owner);

    let (status, body) = app
        .send(json_request(
            "POST",
            "/admin/users",
            json!({ "email": "new@shop.test", "password": "123", "role": "USER" }),
            Some(&token),
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Password must be at least 6 characters");
}

#[tokio::test]
async fn status_change_for_unknown_user_is_404() {
    let app = TestApp::spawn();
    let owner = app.seed_user("owner@shop.test", None, Role::SuperAdmin).await;
    let token = app.token_for(&owner);

    let (status, _) = app
        .send(json_request(
            "PATCH",
            &format!("/admin/users/{}/status", Uuid::new_v4()),
            json!({ "active": true }),
            Some(&token),
        ))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn admin_cannot_change_status() {
    let app = TestApp::spawn();
    let admin = app.seed_user("admin@shop.test", None, Role::Admin).await;
    let target = app.seed_user("staff@shop.test", None, Role::User).await;
    let token = app.token_for(&admin);

    let (status, _) = app
        .send(json_request(
            "PATCH",
            &format!("/admin/users/{}/status", target.user_id),
            json!({ "active": false }),
            Some(&token),
        ))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(app.stored(&target).await.is_active);
}

#[tokio::test]
async fn bootstrap_creates_super_admin_who_can_log_in() {
    let app = TestApp::spawn();
    let config = BootstrapAdminConfig {
        email: "root@shop.test".to_string(),
        password: "bootstrap-password".to_string(),
    };

    assert!(app
        .state
        .accounts
        .bootstrap_super_admin(&config)
        .await
        .unwrap());

    let (status, body) = app
        .post_json(
            "/auth/login",
            json!({ "email": "root@shop.test", "password": "bootstrap-password" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["role"], "SUPER_ADMIN");
}
