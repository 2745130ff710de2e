mod common;

use axum::http::StatusCode;
use vivaha_server::domain::model::MasterKind;

use common::app;

#[tokio::test]
async fn lists_are_ordered_and_skip_inactive_rows() {
    let app = app();
    app.store.insert_master(MasterKind::Religions, "Sikh", None, 2, true);
    app.store.insert_master(MasterKind::Religions, "Hindu", None, 1, true);
    app.store.insert_master(MasterKind::Religions, "Retired", None, 0, false);

    let (status, body) = app.get("/api/master/religions", None).await;
    assert_eq!(status, StatusCode::OK);
    let names: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, ["Hindu", "Sikh"]);
}

#[tokio::test]
async fn child_lists_follow_their_parent() {
    let app = app();
    let india = app.store.insert_master(MasterKind::Countries, "India", None, 0, true);
    let nepal = app.store.insert_master(MasterKind::Countries, "Nepal", None, 1, true);
    app.store
        .insert_master(MasterKind::States, "Kerala", Some(india), 0, true);
    app.store
        .insert_master(MasterKind::States, "Bagmati", Some(nepal), 0, true);

    let (status, body) = app
        .get(&format!("/api/master/states?countryId={india}"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let states = body.as_array().unwrap();
    assert_eq!(states.len(), 1);
    assert_eq!(states[0]["name"], "Kerala");
    assert_eq!(states[0]["parentId"], india);

    let (_, body) = app.get("/api/master/states", None).await;
    assert_eq!(body.as_array().unwrap().len(), 2);

    let (status, body) = app.get("/api/master/states?countryId=abc", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid id");
}

#[tokio::test]
async fn unknown_kinds_are_not_found() {
    let app = app();
    let (status, _) = app.get("/api/master/planets", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = app.get("/api/master/mother-tongues", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, serde_json::json!([]));
}

#[tokio::test]
async fn references_resolve_to_labels_on_the_profile() {
    let app = app();
    let religion = app.store.insert_master(MasterKind::Religions, "Hindu", None, 0, true);
    let owner = app.register("owner@example.com", "Female").await;

    let (status, body) = app
        .patch(
            "/api/profile",
            Some(&owner.token),
            serde_json::json!({ "religionId": religion.to_string() }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["profile"]["religionId"], religion);
    assert_eq!(body["references"]["religion"], "Hindu");
}
