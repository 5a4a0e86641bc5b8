//! Integration test infrastructure.

#![allow(dead_code)]

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;
use tollgate_server::{
    auth::{encode_token, Claims, Gate, JwtStrategy, RoleRegistry, TokenVerifier},
    config::ServerBindConfig,
    directory::{MemoryDirectory, MemoryLedger, Profile, UserRecord},
    routes::create_router,
    AppState, Role,
};
use tower::ServiceExt;
use uuid::Uuid;

pub const SECRET: &str = "integration_secret_32_chars_long";

/// Router over a seeded directory with one admin and two plain users.
pub struct TestApp {
    pub router: Router,
    pub admin: Uuid,
    pub alice: Uuid,
    pub bob: Uuid,
}

fn record(id: Uuid, name: &str, role: Role) -> UserRecord {
    UserRecord {
        id,
        name: name.to_string(),
        email: format!("{}@example.com", name.to_lowercase()),
        role,
        profile: Profile::default(),
        created_at: Utc::now(),
    }
}

pub fn bind_config() -> ServerBindConfig {
    ServerBindConfig {
        host: "127.0.0.1".into(),
        port: 3000,
        request_timeout_secs: 5,
        body_limit_bytes: 64 * 1024,
    }
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_registry(RoleRegistry::global())
    }

    pub fn with_registry(registry: Arc<RoleRegistry>) -> Self {
        let (admin, alice, bob) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let directory = Arc::new(MemoryDirectory::with_users([
            record(admin, "Root", Role::Admin),
            record(alice, "Alice", Role::User),
            record(bob, "Bob", Role::User),
        ]));

        let verifier = TokenVerifier::new(JwtStrategy::new(SECRET, directory.clone()));
        let gate = Gate::new(verifier, registry);
        let state = AppState::from_parts(directory, Arc::new(MemoryLedger::new()), gate);

        Self {
            router: create_router(state, &bind_config()),
            admin,
            alice,
            bob,
        }
    }

    pub fn token_for(&self, id: Uuid) -> String {
        encode_token(&Claims::new_access(id, 300), SECRET).unwrap()
    }

    /// Send a request, optionally as `caller`, and decode the JSON body.
    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        caller: Option<Uuid>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let token = caller.map(|id| self.token_for(id));
        self.send_with_token(method, uri, token.as_deref(), body).await
    }

    pub async fn send_with_token(
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
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string())),
            None => builder.body(Body::empty()),
        }
        .unwrap();

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    pub async fn get(&self, uri: &str, caller: Option<Uuid>) -> (StatusCode, Value) {
        self.send(Method::GET, uri, caller, None).await
    }
}

pub fn error_code(body: &Value) -> &str {
    body["error"]["code"].as_str().unwrap_or_default()
}
