//! Shared harness for router-level tests
#![allow(dead_code)]

use axum::{
    body::{to_bytes, Body},
    http::{header, HeaderMap, Method, Request, StatusCode},
    Router,
};
use license_panel::{
    account::CreateUserRequest,
    config::ServerConfig,
    db::{account::User, create_memory_pool},
    server::build_router,
    services::ServiceUpdate,
    AppContext,
};
use serde_json::Value;
use tower::ServiceExt;

pub const PASSWORD: &str = "correct-horse-battery";

pub struct TestApp {
    pub ctx: AppContext,
    pub router: Router,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

/// Services switched on for a test user
pub fn services(whatsapp: bool, license: bool, email: bool) -> ServiceUpdate {
    ServiceUpdate {
        whatsapp_service: Some(whatsapp),
        license_service: Some(license),
        email_service: Some(email),
    }
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_config(ServerConfig::for_tests()).await
    }

    pub async fn with_config(config: ServerConfig) -> Self {
        let pool = create_memory_pool().await.expect("in-memory database");
        let ctx = AppContext::for_pool(config, pool);
        let router = build_router(ctx.clone());
        Self { ctx, router }
    }

    /// Create a user and return it with a fresh session token
    pub async fn user(&self, username: &str, services: ServiceUpdate, is_staff: bool) -> (User, String) {
        let user = self
            .ctx
            .account_manager
            .create_user(CreateUserRequest {
                username: username.to_string(),
                password: PASSWORD.to_string(),
                first_name: String::new(),
                last_name: String::new(),
                email: None,
                is_staff,
                services,
            })
            .await
            .expect("create user");

        let (_, session) = self
            .ctx
            .account_manager
            .login(username, PASSWORD)
            .await
            .expect("login");

        (user, session.access_token)
    }

    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible");

        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read body");

        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };

        TestResponse { status, headers, body }
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }

        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("valid request");

        self.send(request).await
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> TestResponse {
        self.request(Method::GET, uri, token, None).await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: Option<Value>) -> TestResponse {
        self.request(Method::POST, uri, token, body).await
    }

    /// Create a license through the API and return its id and key
    pub async fn add_license(&self, token: &str) -> (i64, String) {
        let response = self.post("/licensing/add/", Some(token), None).await;
        assert_eq!(response.status, StatusCode::OK, "{}", response.body);

        let key = response.body["license_key"]
            .as_str()
            .expect("license_key")
            .to_string();
        let license = self
            .ctx
            .license_manager
            .get_by_key(&key)
            .await
            .unwrap()
            .expect("stored license");

        (license.id, key)
    }
}
