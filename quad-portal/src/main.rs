use std::sync::Arc;

use axum::routing::{get, patch, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

mod config;
mod models;
mod routes;
mod schema;
mod services;
mod store;

use config::AppConfig;
use quad_shared::clients::db::create_pool;
use quad_shared::clients::email::{EmailClient, Mailer};
use services::otp::OtpConfig;
use store::{DieselStore, PortalStore};

pub struct AppState {
    pub store: Arc<dyn PortalStore>,
    pub mailer: Arc<dyn Mailer>,
    pub config: AppConfig,
    pub otp: OtpConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    quad_shared::middleware::init_tracing("quad-portal");

    let config = AppConfig::load()?;
    let port = config.port;

    // The auth extractor reads the secret from the environment; seed it
    // from config when the deployment has not set it explicitly.
    if std::env::var("JWT_SECRET").is_err() {
        std::env::set_var("JWT_SECRET", &config.jwt_secret);
    }

    let pool = create_pool(&config.database_url)?;
    let store: Arc<dyn PortalStore> = Arc::new(DieselStore::new(pool));

    let mailer: Arc<dyn Mailer> = Arc::new(EmailClient::new(
        &config.resend_api_key,
        &config.mail_from_email,
        &config.mail_from_name,
    )?);

    let otp = OtpConfig {
        step_seconds: config.otp_step_seconds,
        digits: config.otp_digits,
        skew_steps: config.otp_skew_steps,
    };

    let state = Arc::new(AppState {
        store,
        mailer,
        config,
        otp,
    });

    let app = Router::new()
        .route("/health", get(routes::health::health_check))
        .route("/verification/send", post(routes::verification::send_code))
        .route(
            "/verification/validate",
            post(routes::verification::validate_code),
        )
        .route("/me", get(routes::profile::get_me))
        .route("/me/details", patch(routes::profile::update_details))
        .route("/me/image", patch(routes::profile::update_image))
        .route(
            "/follows/:username",
            post(routes::follows::create_follow).delete(routes::follows::remove_follow),
        )
        .route("/followers/:username", get(routes::follows::list_followers))
        .route("/following/:username", get(routes::follows::list_following))
        .route("/notifications", get(routes::notifications::list))
        .route(
            "/notifications/unread-count",
            get(routes::notifications::unread_count),
        )
        .route(
            "/notifications/:id/read",
            post(routes::notifications::mark_read),
        )
        // Internal service-to-service endpoints (no auth)
        .route("/internal/profiles", post(routes::internal::create_profile))
        .route(
            "/internal/notifications",
            post(routes::internal::emit_notification),
        )
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = format!("0.0.0.0:{port}");
    tracing::info!(addr = %addr, "quad-portal starting");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
