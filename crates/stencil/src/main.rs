//! Stencil - template sharing backend

use anyhow::{Context, Result};
use axum::Router;
use axum::http::{HeaderValue, Method, header};
use clap::Parser;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod config;

use config::{Config, ServerConfig};
use stencil_api::{ApiSettings, AppState, MetricsHandle, create_router};
use stencil_auth::JwtManager;
use stencil_db::{Database, NewUser, UserRole};

/// Stencil - template sharing backend
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "config/default.toml")]
    config: String,

    /// Bind address
    #[arg(long, env = "STENCIL_BIND")]
    bind: Option<String>,

    /// Port
    #[arg(short, long, env = "STENCIL_PORT")]
    port: Option<u16>,

    /// Token signing secret
    #[arg(long, env = "STENCIL_JWT_SECRET", hide_env_values = true)]
    jwt_secret: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = Config::load(&args.config)?;
    if let Some(bind) = args.bind {
        config.server.bind_address = bind;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(secret) = args.jwt_secret {
        config.auth.jwt_secret = secret;
    }
    config.validate()?;

    init_logging(&config.logging.level, &config.logging.format);

    info!("Starting Stencil v{}", env!("CARGO_PKG_VERSION"));

    if config.auth.uses_default_secret() {
        warn!("Using the default JWT secret; set auth.jwt_secret or STENCIL_JWT_SECRET");
    }

    // Create data directories
    if let Some(parent) = std::path::Path::new(&config.database.path).parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    tokio::fs::create_dir_all(&config.storage.uploads_dir)
        .await
        .with_context(|| format!("Failed to create {}", config.storage.uploads_dir))?;

    // Initialize database
    let db_url = format!("sqlite:{}?mode=rwc", config.database.path);
    let db = Database::new(&db_url).await?;

    bootstrap_admin(&db, &config).await?;

    let metrics_handle = if config.metrics.enabled {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context("Failed to install Prometheus recorder")?;
        Some(Arc::new(handle))
    } else {
        None
    };

    let app = build_app(db, metrics_handle, &config);

    let addr: SocketAddr = format!("{}:{}", config.server.bind_address, config.server.port)
        .parse()
        .with_context(|| {
            format!(
                "Invalid bind address {}:{}",
                config.server.bind_address, config.server.port
            )
        })?;

    info!("Listening on {}", addr);
    info!("Public URL: {}", config.server.public_url);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

/// Assemble the API router with static uploads and the outer layers
fn build_app(db: Database, metrics_handle: Option<Arc<MetricsHandle>>, config: &Config) -> Router {
    let jwt = Arc::new(JwtManager::new(
        &config.auth.jwt_secret,
        chrono::Duration::minutes(config.auth.token_expiry_minutes),
    ));

    let settings = ApiSettings {
        public_url: config.server.public_url.clone(),
        allow_admin_registration: config.auth.allow_admin_registration,
        max_image_size: config.storage.max_image_size,
    };
    let state = AppState::new(db, jwt, settings);

    create_router(state, metrics_handle)
        .nest_service("/uploads", ServeDir::new(&config.storage.uploads_dir))
        .layer(cors_layer(&config.server))
        .layer(TraceLayer::new_for_http())
}

/// Initialize logging
fn init_logging(level: &str, format: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let registry = tracing_subscriber::registry().with(filter);
    if format == "json" {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }
}

/// Create the configured admin account on an empty user table
async fn bootstrap_admin(db: &Database, config: &Config) -> Result<()> {
    if db.has_users().await? {
        return Ok(());
    }

    let Some(admin) = &config.auth.bootstrap_admin else {
        warn!("No users exist and auth.bootstrap_admin is not configured");
        return Ok(());
    };

    let password = admin.password.clone();
    let password_hash =
        tokio::task::spawn_blocking(move || stencil_auth::hash_password(&password)).await??;

    let user = db
        .insert_user(NewUser {
            email: admin.email.trim().to_lowercase(),
            username: admin.username.clone(),
            password_hash,
            role: UserRole::Admin,
        })
        .await?;

    info!("Bootstrap admin created: {}", user.email);
    Ok(())
}

fn cors_layer(server: &ServerConfig) -> CorsLayer {
    let server = server.clone();
    CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(
            move |origin: &HeaderValue, _: &axum::http::request::Parts| {
                origin
                    .to_str()
                    .map(|origin| server.origin_allowed(origin))
                    .unwrap_or(false)
            },
        ))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
        .allow_credentials(true)
}

/// Wait for shutdown signal
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use crate::config::BootstrapAdmin;
    use tower::ServiceExt;

    fn config_with_admin() -> Config {
        let mut config = Config::default();
        config.auth.bootstrap_admin = Some(BootstrapAdmin {
            email: " Root@Example.com ".to_string(),
            username: "root".to_string(),
            password: "bootstrap-pass".to_string(),
        });
        config
    }

    #[tokio::test]
    async fn test_bootstrap_admin_on_empty_table() {
        let db = Database::in_memory().await.unwrap();
        bootstrap_admin(&db, &config_with_admin()).await.unwrap();

        let user = db
            .get_user_by_email("root@example.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(user.role, UserRole::Admin);
        assert!(stencil_auth::verify_password(
            "bootstrap-pass",
            &user.password_hash
        ));

        // Second run is a no-op
        bootstrap_admin(&db, &config_with_admin()).await.unwrap();
    }

    #[tokio::test]
    async fn test_bootstrap_skipped_without_config() {
        let db = Database::in_memory().await.unwrap();
        bootstrap_admin(&db, &Config::default()).await.unwrap();
        assert!(!db.has_users().await.unwrap());
    }

    #[tokio::test]
    async fn test_uploads_served_from_configured_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("banner.txt"), "static upload").unwrap();

        let mut config = Config::default();
        config.storage.uploads_dir = dir.path().to_string_lossy().into_owned();
        let db = Database::in_memory().await.unwrap();
        let app = build_app(db, None, &config);

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/uploads/banner.txt")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"static upload");

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/uploads/missing.txt")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        // API routes still answer next to the static mount
        let response = build_app(Database::in_memory().await.unwrap(), None, &config)
            .oneshot(
                Request::builder()
                    .uri("/api/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_cors_allows_configured_origins() {
        let app = axum::Router::new()
            .route("/", axum::routing::get(|| async { "ok" }))
            .layer(cors_layer(&ServerConfig::default()));

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/")
                    .header(header::ORIGIN, "https://preview-1.vercel.app")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "https://preview-1.vercel.app"
        );

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/")
                    .header(header::ORIGIN, "https://evil.example")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert!(
            !response
                .headers()
                .contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN)
        );
    }
}
