mod common;

use axum::http::StatusCode;
use vivaha_server::{domain::model::User, error::AppError, service::profile::Upload};

use common::{app, app_with};

const PNG: &[u8] = b"\x89PNG\r\n\x1a\nnot really a png";

#[tokio::test]
async fn first_upload_becomes_main_and_is_stored() {
    let app = app();
    let owner = app.register("owner@example.com", "Female").await;

    let (status, first) = app.upload(&owner.token, "me.png", "image/png", PNG).await;
    assert_eq!(status, StatusCode::CREATED, "{first}");
    assert_eq!(first["isMain"], true);
    let url = first["url"].as_str().unwrap();
    assert!(url.starts_with("/uploads/") && url.ends_with(".png"), "{url}");
    let name = url.trim_start_matches("/uploads/");
    assert!(app.uploads.path().join(name).exists());

    let (status, second) = app
        .upload(&owner.token, "me.jpg", "image/jpeg", b"jpeg bytes")
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(second["isMain"], false);

    let (_, profile) = app.get("/api/profile", Some(&owner.token)).await;
    assert_eq!(profile["photos"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn deleting_the_main_photo_promotes_the_next() {
    let app = app();
    let owner = app.register("owner@example.com", "Male").await;
    let (_, first) = app.upload(&owner.token, "a.png", "image/png", PNG).await;
    let (_, second) = app
        .upload(&owner.token, "b.webp", "image/webp", b"webp bytes")
        .await;

    let (status, _) = app
        .delete(
            &format!("/api/profile/photos/{}", first["id"]),
            Some(&owner.token),
        )
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let name = first["url"].as_str().unwrap().trim_start_matches("/uploads/");
    assert!(!app.uploads.path().join(name).exists());

    let (_, profile) = app.get("/api/profile", Some(&owner.token)).await;
    let photos = profile["photos"].as_array().unwrap();
    assert_eq!(photos.len(), 1);
    assert_eq!(photos[0]["id"], second["id"]);
    assert_eq!(photos[0]["isMain"], true);

    let (status, _) = app
        .delete(
            &format!("/api/profile/photos/{}", first["id"]),
            Some(&owner.token),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app.delete("/api/profile/photos/xyz", Some(&owner.token)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn other_members_cannot_delete_my_photos() {
    let app = app();
    let owner = app.register("owner@example.com", "Female").await;
    let stranger = app.register("stranger@example.com", "Male").await;
    let (_, photo) = app.upload(&owner.token, "a.png", "image/png", PNG).await;

    let (status, _) = app
        .delete(
            &format!("/api/profile/photos/{}", photo["id"]),
            Some(&stranger.token),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn unsupported_types_are_rejected() {
    let app = app();
    let owner = app.register("owner@example.com", "Female").await;
    let (status, body) = app
        .upload(&owner.token, "notes.txt", "text/plain", b"hello")
        .await;
    assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
    assert!(body["error"].as_str().unwrap().contains("text/plain"));

    // Falls back to the file name when the part is untyped.
    let (status, body) = app
        .upload(&owner.token, "me.jpeg", "application/octet-stream", b"bytes")
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert!(body["url"].as_str().unwrap().ends_with(".jpg"));
}

#[tokio::test]
async fn oversized_and_empty_files_are_rejected() {
    let app = app_with(&[("MAX_UPLOAD_BYTES", "16")]);
    let owner = app.register("owner@example.com", "Female").await;

    let (status, _) = app
        .upload(&owner.token, "big.png", "image/png", &[7u8; 64])
        .await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);

    let (status, _) = app.upload(&owner.token, "empty.png", "image/png", b"").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn failed_inserts_leave_no_file_behind() {
    let app = app();
    let owner = app.register("owner@example.com", "Female").await;
    let user = app.state.auth.authenticate(&owner.token).await.unwrap();
    let ghost = User { id: 424242, ..user };

    let err = app
        .state
        .profiles
        .add_photo(
            &ghost,
            Upload {
                file_name: Some("me.png".into()),
                content_type: Some("image/png".into()),
                bytes: PNG.to_vec(),
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)), "{err}");
    let leftovers = std::fs::read_dir(app.uploads.path())
        .map(|entries| entries.count())
        .unwrap_or(0);
    assert_eq!(leftovers, 0);
}

#[tokio::test]
async fn an_unbounded_upload_limit_still_serves() {
    let limit = usize::MAX.to_string();
    let app = app_with(&[("MAX_UPLOAD_BYTES", limit.as_str())]);
    let owner = app.register("owner@example.com", "Female").await;

    let (status, body) = app.upload(&owner.token, "me.png", "image/png", PNG).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
}
