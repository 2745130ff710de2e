#![allow(dead_code)]

use std::{collections::HashMap, sync::Arc};

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode, header},
};
use serde_json::{Value, json};
use tempfile::TempDir;
use tower::ServiceExt;

use vivaha_server::{
    build_router,
    config::Config,
    db::{memory::MemoryStore, repo::Stores},
    state::AppState,
};

pub const BOUNDARY: &str = "vivaha-test-boundary";

pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryStore>,
    pub state: AppState,
    pub uploads: TempDir,
}

pub struct Member {
    pub id: i64,
    pub token: String,
}

pub fn config(uploads: &TempDir, extra: &[(&str, &str)]) -> Config {
    let mut vars: HashMap<String, String> = HashMap::from([
        ("JWT_SECRET".to_string(), "test-secret".to_string()),
        (
            "UPLOAD_DIR".to_string(),
            uploads.path().to_string_lossy().into_owned(),
        ),
        ("ADMIN_EMAILS".to_string(), "admin@example.com".to_string()),
    ]);
    for (k, v) in extra {
        vars.insert(k.to_string(), v.to_string());
    }
    Config::from_lookup(move |key| vars.get(key).cloned()).expect("test config")
}

pub fn app() -> TestApp {
    app_with(&[])
}

pub fn app_with(extra: &[(&str, &str)]) -> TestApp {
    let uploads = tempfile::tempdir().expect("temp dir");
    let store = Arc::new(MemoryStore::new());
    let state = AppState::new(config(&uploads, extra), Stores::from_backend(store.clone()));
    TestApp {
        router: build_router(state.clone()),
        store,
        state,
        uploads,
    }
}

impl TestApp {
    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };
        (status, body)
    }

    pub async fn call(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("request");
        self.send(request).await
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.call(Method::GET, uri, token, None).await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.call(Method::POST, uri, token, Some(body)).await
    }

    pub async fn patch(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.call(Method::PATCH, uri, token, Some(body)).await
    }

    pub async fn delete(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.call(Method::DELETE, uri, token, None).await
    }

    pub async fn register(&self, email: &str, gender: &str) -> Member {
        let (status, body) = self
            .post(
                "/api/auth/register",
                None,
                json!({
                    "email": email,
                    "password": "correct-horse",
                    "firstName": "Test",
                    "lastName": "Member",
                    "gender": gender,
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "register {email}: {body}");
        Member {
            id: body["user"]["id"].as_i64().expect("user id"),
            token: body["token"].as_str().expect("token").to_string(),
        }
    }

    /// Registers a member and gives them a profile with the given visibility.
    pub async fn member_with_profile(&self, email: &str, gender: &str, visibility: &str) -> Member {
        let member = self.register(email, gender).await;
        let (status, body) = self
            .patch(
                "/api/profile",
                Some(&member.token),
                json!({ "dateOfBirth": "1995-04-12", "bio": "hello", "visibility": visibility }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "profile for {email}: {body}");
        member
    }

    pub async fn upload(
        &self,
        token: &str,
        file_name: &str,
        content_type: &str,
        bytes: &[u8],
    ) -> (StatusCode, Value) {
        let mut body = Vec::new();
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"photo\"; filename=\"{file_name}\"\r\nContent-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/profile/photos")
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .expect("request");
        self.send(request).await
    }
}
