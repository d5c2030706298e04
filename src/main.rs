use std::sync::Arc;

use axum::middleware as axum_middleware;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use events_hub_rs::auth::{jwt::JwtKeys, password::PasswordPolicy};
use events_hub_rs::config::Config;
use events_hub_rs::db;
use events_hub_rs::mailer::{EmailDispatcher, SmtpMailer};
use events_hub_rs::middleware::trace_id_middleware;
use events_hub_rs::routes;
use events_hub_rs::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    let cfg = Config::from_env()?;

    let db = db::create_pool(&cfg.database_url).await?;
    db::run_migrations(&db).await?;
    tracing::info!("database ready");

    let jwt = JwtKeys::from_secret(&cfg.jwt_secret);
    let pwd = PasswordPolicy {
        memory_kb: cfg.argon_memory_kb,
        iterations: cfg.argon_iterations,
        parallelism: cfg.argon_parallelism,
    };

    let transport = Arc::new(SmtpMailer::from_config(&cfg)?);
    let mailer = EmailDispatcher::new(
        db.clone(),
        transport,
        cfg.default_from_email.clone(),
        cfg.site_url.clone(),
    );

    let cors = if cfg.allowed_origins.is_empty() {
        CorsLayer::permissive()
    } else {
        let origins: Vec<_> = cfg
            .allowed_origins
            .iter()
            .filter_map(|o| o.parse::<axum::http::HeaderValue>().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(tower_http::cors::Any)
            .allow_headers(tower_http::cors::Any)
    };

    let addr = format!("{}:{}", cfg.host, cfg.port);

    let state = Arc::new(AppState {
        db,
        cfg,
        jwt,
        pwd,
        mailer,
        http: reqwest::Client::new(),
    });

    let app = routes::api_router()
        .layer(axum_middleware::from_fn(trace_id_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(addr = %addr, "listening");
    axum::serve(listener, app).await?;

    Ok(())
}
