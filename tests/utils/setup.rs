use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use chrono::Duration;
use serde_json::{json, Value};
use tower::ServiceExt; // for `oneshot`

use taskdeck::auth::service::AuthService;
use taskdeck::auth::store::InMemorySessionStore;
use taskdeck::config::AuthConfig;
use taskdeck::shared::AppState;
use taskdeck::todo::repository::InMemoryTodoRepository;
use taskdeck::todo::service::TodoService;
use taskdeck::user::repository::InMemoryUserRepository;

// ============================================================================
// Test Setup Infrastructure
// ============================================================================

pub struct TestApp {
    pub router: Router,
    pub sessions: Arc<InMemorySessionStore>,
}

pub struct TestAppBuilder {
    config: AuthConfig,
}

impl TestAppBuilder {
    pub fn new() -> Self {
        Self {
            config: AuthConfig {
                secret: "integration-test-secret".to_string(),
                issuer: "taskdeck-test".to_string(),
                access_ttl: Duration::hours(1),
                refresh_ttl: Duration::hours(24),
                bcrypt_cost: 4,
            },
        }
    }

    pub fn build(self) -> TestApp {
        let users = Arc::new(InMemoryUserRepository::new());
        let sessions = Arc::new(InMemorySessionStore::new());
        let todos = Arc::new(InMemoryTodoRepository::new());

        let auth = Arc::new(AuthService::new(users, sessions.clone(), &self.config));
        let todo_service = Arc::new(TodoService::new(todos));
        let state = AppState::new(auth, todo_service);

        TestApp {
            router: taskdeck::router(state),
            sessions,
        }
    }
}

impl Default for TestAppBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TestApp {
    pub async fn request(
        &self,
        method: &str,
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
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };

        (status, value)
    }

    pub async fn post_json(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.request("POST", uri, None, Some(body)).await
    }

    pub async fn register(&self, username: &str, password: &str) -> (StatusCode, Value) {
        self.post_json(
            "/api/v1/auth/register",
            json!({ "username": username, "password": password }),
        )
        .await
    }

    /// Registers and logs in, returning (access token, refresh token)
    pub async fn register_and_login(&self, username: &str, password: &str) -> (String, String) {
        let (status, _) = self.register(username, password).await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = self
            .post_json(
                "/api/v1/auth/login",
                json!({ "username": username, "password": password }),
            )
            .await;
        assert_eq!(status, StatusCode::OK);

        (
            body["accessToken"].as_str().unwrap().to_string(),
            body["refreshToken"].as_str().unwrap().to_string(),
        )
    }
}
