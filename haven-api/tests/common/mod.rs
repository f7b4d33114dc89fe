//! Common test utilities for API integration tests
//!
//! The router is driven in-process with `tower::ServiceExt::oneshot`.
//!
//! - [`TestApp::offline`] needs no database; the pool is lazy and never
//!   connected, which is enough for requests the auth middleware rejects.
//! - [`TestApp::connect`] reads `DATABASE_URL` (a superuser), migrates,
//!   ensures the `haven_app` role, and serves the app as that role so the
//!   row-level security policies apply. Returns `None` when unset.
#![allow(dead_code)]

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use haven_api::app::{build_router, AppState};
use haven_api::config::Config;
use haven_api::mailer::{MailerError, VerificationMail, VerificationMailer};
use haven_shared::db::migrations::run_migrations;
use haven_shared::db::TenantDb;
use serde_json::{json, Value};
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use sqlx::Executor;
use std::env;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use tower::ServiceExt;
use uuid::Uuid;

pub const JWT_SECRET: &str = "api-integration-test-secret-32-bytes!!";
pub const PASSWORD: &str = "SecureP@ss123";

const SETUP_LOCK_KEY: i64 = 0x4841_5645_4e;

const APP_ROLE_SETUP: &str = r#"
DO $$
BEGIN
    IF NOT EXISTS (SELECT FROM pg_roles WHERE rolname = 'haven_app') THEN
        CREATE ROLE haven_app LOGIN PASSWORD 'haven_app_test' NOSUPERUSER NOBYPASSRLS;
    END IF;
END
$$;
GRANT USAGE ON SCHEMA public TO haven_app;
GRANT SELECT, INSERT, UPDATE, DELETE ON tenants, users, todos TO haven_app;
GRANT SELECT ON tenant_todo_view TO haven_app;
"#;

/// Keeps every verification mail for inspection
#[derive(Debug, Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<VerificationMail>>,
}

impl RecordingMailer {
    /// Plaintext token of the latest mail to `recipient`
    pub fn token_for(&self, recipient: &str) -> Option<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|mail| mail.recipient == recipient)
            .map(|mail| mail.token.clone())
    }

    pub fn count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl VerificationMailer for RecordingMailer {
    async fn send(&self, mail: VerificationMail) -> Result<(), MailerError> {
        self.sent.lock().unwrap().push(mail);
        Ok(())
    }
}

pub fn test_config(database_url: &str) -> Config {
    let settings = Config::builder()
        .unwrap()
        .set_override("database_url", database_url)
        .unwrap()
        .set_override("jwt_secret", JWT_SECRET)
        .unwrap()
        .build()
        .unwrap();

    Config::from_settings(settings).unwrap()
}

pub struct TestApp {
    pub app: Router,
    pub state: AppState,
    pub mailer: Arc<RecordingMailer>,
    /// Superuser pool for setup and cleanup; `None` offline
    pub admin: Option<PgPool>,
    slugs: Mutex<Vec<String>>,
}

impl TestApp {
    pub fn offline() -> Self {
        let url = "postgresql://haven_app@127.0.0.1:1/unreachable";
        let pool = PgPoolOptions::new()
            .connect_lazy(url)
            .expect("lazy pool");

        Self::build(TenantDb::new(pool), test_config(url), None)
    }

    pub async fn connect() -> Option<Self> {
        let url = match env::var("DATABASE_URL") {
            Ok(url) if !url.is_empty() => url,
            _ => {
                eprintln!("DATABASE_URL not set; skipping API database test");
                return None;
            }
        };

        let admin = PgPoolOptions::new()
            .max_connections(2)
            .connect(&url)
            .await
            .expect("connect as superuser");
        run_migrations(&admin).await.expect("run migrations");
        ensure_app_role(&admin).await.expect("create application role");

        let options = PgConnectOptions::from_str(&url)
            .expect("parse DATABASE_URL")
            .username("haven_app")
            .password("haven_app_test");
        let app_pool = PgPoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .expect("connect as application role");

        Some(Self::build(TenantDb::new(app_pool), test_config(&url), Some(admin)))
    }

    fn build(db: TenantDb, config: Config, admin: Option<PgPool>) -> Self {
        let mailer = Arc::new(RecordingMailer::default());
        let state = AppState::new(db, config, mailer.clone());

        Self {
            app: build_router(state.clone()),
            state,
            mailer,
            admin,
            slugs: Mutex::new(Vec::new()),
        }
    }

    /// Sends one request and decodes the JSON body (`Null` when empty)
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }

        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .unwrap();

        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();

        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };

        (status, json)
    }

    /// A slug nobody else uses; removed again by [`TestApp::cleanup`]
    pub fn unique_slug(&self, label: &str) -> String {
        let suffix = Uuid::new_v4().simple().to_string();
        let slug = format!("{}-{}", label, &suffix[..12]);
        self.slugs.lock().unwrap().push(slug.clone());
        slug
    }

    /// Registers a tenant and returns the response body
    pub async fn register(&self, slug: &str, email: &str, name: &str) -> Value {
        let (status, body) = self
            .request(
                Method::POST,
                "/v1/auth/register",
                None,
                Some(json!({
                    "tenant_name": format!("Tenant {}", slug),
                    "tenant_slug": slug,
                    "email": email,
                    "password": PASSWORD,
                    "name": name,
                })),
            )
            .await;

        assert_eq!(status, StatusCode::CREATED, "register failed: {}", body);
        body
    }

    /// Access token of a freshly registered admin
    pub async fn register_token(&self, slug: &str, email: &str) -> String {
        let body = self.register(slug, email, "Admin").await;
        body["access_token"].as_str().unwrap().to_string()
    }

    pub async fn cleanup(&self) {
        let Some(admin) = &self.admin else { return };
        let slugs = self.slugs.lock().unwrap().clone();

        sqlx::query("DELETE FROM tenants WHERE slug = ANY($1)")
            .bind(slugs)
            .execute(admin)
            .await
            .expect("cleanup tenants");
    }
}

async fn ensure_app_role(admin: &PgPool) -> Result<(), sqlx::Error> {
    let mut tx = admin.begin().await?;
    sqlx::query("SELECT pg_advisory_xact_lock($1)")
        .bind(SETUP_LOCK_KEY)
        .execute(&mut *tx)
        .await?;
    (&mut *tx).execute(APP_ROLE_SETUP).await?;
    tx.commit().await
}
