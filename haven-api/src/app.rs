/// Application state and router builder
///
/// # Example
///
/// ```no_run
/// use haven_api::{app::{build_router, AppState}, config::Config, mailer::LogMailer};
/// use haven_shared::db::{pool::create_pool, TenantDb};
/// use std::sync::Arc;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let pool = create_pool(&config.database.pool_config()).await?;
/// let state = AppState::new(TenantDb::new(pool), config, Arc::new(LogMailer));
/// let app = build_router(state);
/// # Ok(())
/// # }
/// ```

use crate::{config::Config, mailer::VerificationMailer, middleware::security::SecurityHeadersLayer};
use axum::{
    http::{header, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use chrono::Duration;
use haven_shared::auth::{jwt::TokenService, middleware::require_identity};
use haven_shared::db::TenantDb;
use std::sync::Arc;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

/// Shared application state, cloned into every handler
#[derive(Clone)]
pub struct AppState {
    /// Tenant-scoping database handle
    pub db: TenantDb,

    pub tokens: TokenService,

    pub config: Arc<Config>,

    pub mailer: Arc<dyn VerificationMailer>,
}

impl AppState {
    pub fn new(db: TenantDb, config: Config, mailer: Arc<dyn VerificationMailer>) -> Self {
        let tokens = TokenService::new(
            &config.jwt.secret,
            Duration::seconds(config.jwt.access_ttl_seconds),
            Duration::seconds(config.jwt.refresh_ttl_seconds),
        );

        Self {
            db,
            tokens,
            config: Arc::new(config),
            mailer,
        }
    }
}

/// Builds the complete Axum router with all routes and middleware
///
/// ```text
/// /
/// ├── GET /health
/// └── /v1/
///     ├── /auth/                     (public)
///     │   ├── POST /register
///     │   ├── POST /login
///     │   ├── POST /refresh
///     │   └── POST /verify-email
///     ├── /users/                    (access token)
///     │   ├── GET   /me
///     │   ├── PATCH /me
///     │   └── POST  /me/verification
///     └── /todos/                    (access token)
///         ├── GET    /               own todos, paginated
///         ├── POST   /
///         ├── GET    /public         tenant-wide public todos
///         ├── GET    /:id
///         ├── PATCH  /:id
///         └── DELETE /:id
/// ```
///
/// Layers, outermost first: security headers, CORS, request tracing.
pub fn build_router(state: AppState) -> Router {
    use crate::routes;

    let health_routes = Router::new().route("/health", get(routes::health::health_check));

    let auth_routes = Router::new()
        .route("/register", post(routes::auth::register))
        .route("/login", post(routes::auth::login))
        .route("/refresh", post(routes::auth::refresh))
        .route("/verify-email", post(routes::auth::verify_email));

    let user_routes = Router::new()
        .route(
            "/me",
            get(routes::users::get_me).patch(routes::users::update_me),
        )
        .route("/me/verification", post(routes::users::resend_verification));

    let todo_routes = Router::new()
        .route(
            "/",
            get(routes::todos::list_todos).post(routes::todos::create_todo),
        )
        .route("/public", get(routes::todos::list_public_todos))
        .route(
            "/:id",
            get(routes::todos::get_todo)
                .patch(routes::todos::update_todo)
                .delete(routes::todos::delete_todo),
        );

    // Everything below here requires a valid access token
    let protected_routes = Router::new()
        .nest("/users", user_routes)
        .nest("/todos", todo_routes)
        .layer(axum::middleware::from_fn_with_state(
            state.tokens.clone(),
            require_identity,
        ));

    let v1_routes = Router::new()
        .nest("/auth", auth_routes)
        .merge(protected_routes);

    let cors = cors_layer(&state.config.api.cors_origins);
    let security = SecurityHeadersLayer::new(state.config.api.production);

    Router::new()
        .merge(health_routes)
        .nest("/v1", v1_routes)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors)
        .layer(security)
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|origin| origin == "*") {
        // Development mode: permissive CORS
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .max_age(std::time::Duration::from_secs(3600))
}
