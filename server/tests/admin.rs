mod common;

use axum::http::StatusCode;
use serde_json::json;

use common::app;

#[tokio::test]
async fn admin_routes_need_the_admin_role() {
    let app = app();
    let member = app.register("member@example.com", "Female").await;

    let (status, _) = app.get("/api/admin/users", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, body) = app.get("/api/admin/users", Some(&member.token)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "admin access required");
}

#[tokio::test]
async fn admins_list_and_deactivate_users() {
    let app = app();
    let admin = app.register("admin@example.com", "Male").await;
    let member = app.register("member@example.com", "Female").await;

    let (status, users) = app.get("/api/admin/users?limit=10", Some(&admin.token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(users.as_array().unwrap().len(), 2);

    let (status, _) = app
        .delete(&format!("/api/admin/users/{}", admin.id), Some(&admin.token))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .delete(&format!("/api/admin/users/{}", member.id), Some(&admin.token))
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    // A deactivated account loses its session and cannot log in.
    let (status, _) = app.get("/api/auth/me", Some(&member.token)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = app
        .post(
            "/api/auth/login",
            None,
            json!({ "email": "member@example.com", "password": "correct-horse" }),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn reports_can_be_filtered_and_resolved() {
    let app = app();
    let admin = app.register("admin@example.com", "Male").await;
    let alice = app.register("alice@example.com", "Female").await;
    let bob = app.register("bob@example.com", "Male").await;
    let (_, report) = app
        .post(
            "/api/moderation/report",
            Some(&alice.token),
            json!({ "userId": bob.id, "reason": "fake profile" }),
        )
        .await;

    let (status, open) = app
        .get("/api/admin/reports?status=open", Some(&admin.token))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(open.as_array().unwrap().len(), 1);

    let (status, resolved) = app
        .post(
            &format!("/api/admin/reports/{}/resolve", report["id"]),
            Some(&admin.token),
            json!({}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(resolved["status"], "resolved");

    let (_, open) = app
        .get("/api/admin/reports?status=open", Some(&admin.token))
        .await;
    assert!(open.as_array().unwrap().is_empty());

    let (status, _) = app
        .get("/api/admin/reports?status=bogus", Some(&admin.token))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn approved_stories_become_public() {
    let app = app();
    let admin = app.register("admin@example.com", "Male").await;
    let alice = app.register("alice@example.com", "Female").await;
    let (_, story) = app
        .post(
            "/api/moderation/success-story",
            Some(&alice.token),
            json!({ "partnerName": "Bob", "story": "A long and happy story to tell." }),
        )
        .await;

    let (status, _) = app
        .post(
            &format!("/api/admin/success-stories/{}/approve", story["id"]),
            Some(&admin.token),
            json!({}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, stories) = app.get("/api/moderation/success-stories", None).await;
    let stories = stories.as_array().unwrap();
    assert_eq!(stories.len(), 1);
    assert_eq!(stories[0]["partnerName"], "Bob");

    let (status, _) = app
        .post(
            "/api/admin/success-stories/999/approve",
            Some(&admin.token),
            json!({}),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
