//! Common test utilities for database integration tests
//!
//! `DATABASE_URL` must point at a superuser (e.g. `postgres`): it runs the
//! migrations, creates roles, and inspects rows across tenants, which the
//! forced policies deny to a plain table owner. Code under test connects as
//! `haven_app`, a login role
//! without superuser or BYPASSRLS, so the row-level security policies apply
//! exactly as in production. Without `DATABASE_URL` each test prints a
//! notice and returns early.
#![allow(dead_code)]

use haven_shared::auth::identity::{Identity, Role};
use haven_shared::db::migrations::run_migrations;
use haven_shared::db::TenantDb;
use haven_shared::models::tenant::{CreateTenant, Tenant};
use haven_shared::models::user::{CreateUser, User};
use haven_shared::tenant::TenantId;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use sqlx::Executor;
use std::env;
use std::str::FromStr;
use uuid::Uuid;

pub const APP_ROLE: &str = "haven_app";
pub const APP_PASSWORD: &str = "haven_app_test";

/// Serializes role setup across concurrently running test binaries
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

/// Placeholder hash for users whose password is never checked
pub const UNUSED_PASSWORD_HASH: &str = "$argon2id$v=19$m=19456,t=2,p=1$dW51c2Vk$dW51c2Vk";

pub fn database_url() -> Option<String> {
    match env::var("DATABASE_URL") {
        Ok(url) if !url.is_empty() => Some(url),
        _ => {
            eprintln!("DATABASE_URL not set; skipping database integration test");
            None
        }
    }
}

pub struct TestDb {
    /// Superuser connection; bypasses row-level security
    pub admin: PgPool,
    /// Raw pool connected as the application role
    pub app: PgPool,
    /// Scoping handle over `app`
    pub db: TenantDb,
    url: String,
}

impl TestDb {
    /// Migrates, ensures the application role, and connects as it
    ///
    /// Returns `None` when `DATABASE_URL` is unset.
    pub async fn connect() -> Option<Self> {
        let url = database_url()?;
        let admin = PgPoolOptions::new()
            .max_connections(2)
            .connect(&url)
            .await
            .expect("connect as owner");

        run_migrations(&admin).await.expect("run migrations");
        ensure_app_role(&admin).await.expect("create application role");

        let app = app_pool(&url, 8).await;
        let db = TenantDb::new(app.clone());

        Some(Self { admin, app, db, url })
    }

    /// A separate application-role pool of the given size
    pub async fn app_pool(&self, max_connections: u32) -> PgPool {
        app_pool(&self.url, max_connections).await
    }

    pub async fn create_tenant(&self, label: &str) -> Tenant {
        let suffix = Uuid::new_v4().simple().to_string();
        Tenant::create(
            &self.db,
            CreateTenant {
                name: format!("Tenant {}", label),
                slug: format!("{}-{}", label, &suffix[..12]),
            },
        )
        .await
        .expect("create tenant")
    }

    pub async fn create_user(&self, tenant: &Tenant, name: &str) -> Identity {
        let user = User::create(
            &self.db,
            tenant.tenant_id(),
            CreateUser {
                email: format!("{}@{}.example.com", name, tenant.slug),
                password_hash: UNUSED_PASSWORD_HASH.to_string(),
                name: name.to_string(),
                role: Role::Member,
                verification: None,
            },
        )
        .await
        .expect("create user");

        identity_of(&user)
    }

    /// Removes tenants and, by cascade, their users and todos
    pub async fn cleanup(&self, tenants: &[&Tenant]) {
        let ids: Vec<Uuid> = tenants.iter().map(|t| t.id).collect();
        sqlx::query("DELETE FROM tenants WHERE id = ANY($1)")
            .bind(ids)
            .execute(&self.admin)
            .await
            .expect("cleanup tenants");
    }
}

pub fn identity_of(user: &User) -> Identity {
    Identity {
        user_id: user.id,
        tenant_id: TenantId::new(user.tenant_id),
        email: user.email.clone(),
        role: user.role,
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

async fn app_pool(url: &str, max_connections: u32) -> PgPool {
    let options = PgConnectOptions::from_str(url)
        .expect("parse DATABASE_URL")
        .username(APP_ROLE)
        .password(APP_PASSWORD);

    PgPoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await
        .expect("connect as application role")
}
