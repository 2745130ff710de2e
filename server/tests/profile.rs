mod common;

use axum::http::StatusCode;
use serde_json::json;
use vivaha_server::domain::wizard::WriteTable;

use common::app;

#[tokio::test]
async fn malformed_target_ids_are_rejected_before_lookup() {
    let app = app();
    for raw in ["abc", "0", "-4", "1.5"] {
        let (status, body) = app.get(&format!("/api/profile/{raw}"), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{raw}");
        assert_eq!(body["error"], "invalid id");
    }
}

#[tokio::test]
async fn unknown_members_are_not_found() {
    let app = app();
    let viewer = app.register("viewer@example.com", "Male").await;

    let (status, _) = app.get("/api/profile/9999", Some(&viewer.token)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let bare = app.register("bare@example.com", "Female").await;
    let (status, body) = app
        .get(&format!("/api/profile/{}", bare.id), Some(&viewer.token))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "profile not found");
}

#[tokio::test]
async fn visibility_gates_the_public_read() {
    let app = app();
    let viewer = app.register("viewer@example.com", "Male").await;
    let public = app.member_with_profile("public@example.com", "Female", "Public").await;
    let members = app
        .member_with_profile("members@example.com", "Female", "Members Only")
        .await;
    let hidden = app.member_with_profile("hidden@example.com", "Female", "Hidden").await;

    let (status, _) = app.get(&format!("/api/profile/{}", public.id), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app.get(&format!("/api/profile/{}", members.id), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = app
        .get(&format!("/api/profile/{}", members.id), Some(&viewer.token))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .get(&format!("/api/profile/{}", hidden.id), Some(&viewer.token))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // The owner always sees their own profile, unredacted.
    let (status, body) = app
        .get(&format!("/api/profile/{}", hidden.id), Some(&hidden.token))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["email"], "hidden@example.com");
}

#[tokio::test]
async fn privacy_toggles_control_each_section() {
    let app = app();
    let viewer = app.register("viewer@example.com", "Male").await;
    let owner = app.member_with_profile("owner@example.com", "Female", "Public").await;
    let (status, _) = app
        .patch(
            "/api/profile",
            Some(&owner.token),
            json!({
                "fatherOccupation": "Teacher",
                "rashi": "Mesha",
                "birthTime": "06:30",
                "exactIncome": "1200000",
                "employer": "Acme",
                "instagram": "@owner",
                "hobbies": ["chess"],
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let uri = format!("/api/profile/{}", owner.id);
    let (_, body) = app.get(&uri, Some(&viewer.token)).await;
    assert!(body.get("family").is_none());
    assert!(body.get("horoscope").is_none());
    assert!(body["profile"].get("dateOfBirth").is_none());
    assert!(body["profile"]["age"].is_number());
    assert!(body["career"].get("exactIncome").is_none());
    assert_eq!(body["career"]["employer"], "Acme");
    assert!(body["lifestyle"].get("socialLinks").is_none());
    assert_eq!(body["privacy"]["showFamilyDetails"], false);

    let (status, body) = app
        .patch(
            "/api/profile/privacy",
            Some(&owner.token),
            json!({ "showFamilyDetails": true, "showHoroscope": true, "showExactIncome": true }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["privacy"]["showFamilyDetails"], true);
    assert_eq!(body["privacy"]["showSocialLinks"], false);

    let (_, body) = app.get(&uri, Some(&viewer.token)).await;
    assert_eq!(body["family"]["fatherOccupation"], "Teacher");
    assert_eq!(body["horoscope"]["rashi"], "Mesha");
    assert!(body["horoscope"].get("birthTime").is_none());
    assert_eq!(body["career"]["exactIncome"], 1200000);
    assert!(body["lifestyle"].get("socialLinks").is_none());
}

#[tokio::test]
async fn patch_coerces_loose_input() {
    let app = app();
    let owner = app.register("owner@example.com", "Female").await;
    let (status, body) = app
        .patch(
            "/api/profile",
            Some(&owner.token),
            json!({
                "heightCm": "165",
                "religionId": "",
                "brothers": "two",
                "maritalStatus": "divorced",
                "manglik": "yes",
                "firstName": "Asha",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["profile"]["heightCm"], 165);
    assert!(body["profile"]["religionId"].is_null());
    assert_eq!(body["profile"]["maritalStatus"], "Divorced");
    assert!(body["family"]["brothers"].is_null());
    assert_eq!(body["horoscope"]["manglik"], true);
    assert_eq!(body["user"]["firstName"], "Asha");
}

#[tokio::test]
async fn underage_birth_dates_are_rejected() {
    let app = app();
    let owner = app.register("young@example.com", "Male").await;
    let (status, body) = app
        .patch("/api/profile", Some(&owner.token), json!({ "dateOfBirth": "2020-01-01" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("dateOfBirth"));
}

#[tokio::test]
async fn profile_mobile_is_checked_like_registration() {
    let app = app();
    let owner = app.register("owner@example.com", "Female").await;
    let (status, body) = app
        .patch("/api/profile", Some(&owner.token), json!({ "mobile": "12ab" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("mobile"), "{body}");

    let (status, body) = app
        .post(
            "/api/profile/steps",
            Some(&owner.token),
            json!({ "step": "basic", "data": { "mobile": "+14155550123" } }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
}

#[tokio::test]
async fn a_failing_table_rolls_back_the_whole_write() {
    let app = app();
    let owner = app.member_with_profile("owner@example.com", "Female", "Public").await;

    app.store.fail_on(Some(WriteTable::EducationCareer));
    let (status, _) = app
        .patch(
            "/api/profile",
            Some(&owner.token),
            json!({ "firstName": "Changed", "bio": "changed", "employer": "Acme" }),
        )
        .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

    app.store.fail_on(None);
    let (_, body) = app.get("/api/profile", Some(&owner.token)).await;
    assert_eq!(body["user"]["firstName"], "Test");
    assert_eq!(body["profile"]["bio"], "hello");
    assert!(body["career"].is_null());
}

#[tokio::test]
async fn internal_details_are_hidden_unless_enabled() {
    for (expose, expect_details) in [("false", false), ("true", true)] {
        let app = common::app_with(&[("EXPOSE_ERROR_DETAILS", expose)]);
        let owner = app.member_with_profile("owner@example.com", "Female", "Public").await;
        app.store.fail_on(Some(WriteTable::Profiles));
        let (status, body) = app
            .patch("/api/profile", Some(&owner.token), json!({ "bio": "x" }))
            .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["error"].is_string());
        assert_eq!(body.get("details").is_some(), expect_details);
    }
}

#[tokio::test]
async fn draft_lifecycle_follows_the_wizard() {
    let app = app();
    let owner = app.register("owner@example.com", "Female").await;

    let (status, body) = app.get("/api/profile/draft", Some(&owner.token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "stepData": {}, "lastStep": 0 }));

    let (status, body) = app
        .post(
            "/api/profile/draft",
            Some(&owner.token),
            json!({ "stepData": { "bio": "half done" }, "lastStep": 3 }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["lastStep"], 3);

    let (status, _) = app
        .post(
            "/api/profile/draft",
            Some(&owner.token),
            json!({ "stepData": [1, 2], "lastStep": 1 }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // An intermediate step keeps the draft.
    let (status, _) = app
        .post(
            "/api/profile/steps",
            Some(&owner.token),
            json!({ "step": "career", "data": { "employer": "Acme" } }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let (_, body) = app.get("/api/profile/draft", Some(&owner.token)).await;
    assert_eq!(body["stepData"]["bio"], "half done");

    // The final step clears it.
    let (status, body) = app
        .post(
            "/api/profile/steps",
            Some(&owner.token),
            json!({ "step": "preferences", "data": { "minAge": "25", "maxAge": 32 } }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["preference"]["minAge"], 25);
    let (_, body) = app.get("/api/profile/draft", Some(&owner.token)).await;
    assert_eq!(body, json!({ "stepData": {}, "lastStep": 0 }));
}

#[tokio::test]
async fn saving_a_draft_replaces_the_previous_one() {
    let app = app();
    let owner = app.register("owner@example.com", "Female").await;

    app.post(
        "/api/profile/draft",
        Some(&owner.token),
        json!({ "stepData": { "a": 1, "nested": { "x": 1 } }, "lastStep": 0 }),
    )
    .await;
    let (status, _) = app
        .post(
            "/api/profile/draft",
            Some(&owner.token),
            json!({ "stepData": { "b": 2, "nested": { "y": 2 } }, "lastStep": 1 }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = app.get("/api/profile/draft", Some(&owner.token)).await;
    assert_eq!(body["stepData"], json!({ "b": 2, "nested": { "y": 2 } }));
    assert_eq!(body["lastStep"], 1);
}

#[tokio::test]
async fn horoscope_can_be_replaced_and_removed() {
    let app = app();
    let owner = app.member_with_profile("owner@example.com", "Male", "Public").await;

    let (status, body) = app
        .post(
            "/api/profile/horoscope",
            Some(&owner.token),
            json!({ "rashi": "Simha", "nakshatra": "Magha" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["horoscope"]["rashi"], "Simha");

    let (status, _) = app.delete("/api/profile/horoscope", Some(&owner.token)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = app.delete("/api/profile/horoscope", Some(&owner.token)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn own_profile_requires_a_token() {
    let app = app();
    let (status, body) = app.get("/api/profile", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["error"].is_string());

    let (status, _) = app.get("/api/profile", Some("not-a-token")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
