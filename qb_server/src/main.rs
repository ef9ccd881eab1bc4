//! QuizBanner backend server.
//!
//! Serves the REST API over PostgreSQL and runs the daily subscription sweep
//! in the same process.

use anyhow::{Context, Error};
use log::info;
use pico_args::Arguments;
use qb_server::{
    api::{self, AppState},
    config::ServerConfig,
    logging,
    metrics::{self, MetricsObserver},
};
use quiz_banner::{
    Services,
    auth::AuthSettings,
    clock::SystemClock,
    db::Database,
    mail::LogMailer,
    payment::{PaymentProvider, StripeClient, StripeConfig},
    subscription::SweepScheduler,
};
use std::{net::SocketAddr, sync::Arc};

const HELP: &str = "\
Run the QuizBanner backend server

USAGE:
  qb_server [OPTIONS]

OPTIONS:
  --bind       IP:PORT     Server socket bind address  [default: env SERVER_BIND or 127.0.0.1:5000]
  --db-url     URL         Database connection string  [default: env DATABASE_URL or postgres://postgres@localhost/quiz_banner]

FLAGS:
  --no-sweep               Do not run the daily subscription sweep in this process
  -h, --help               Print help information

ENVIRONMENT:
  JWT_SECRET               JWT signing secret (required, >= 32 chars)
  PASSWORD_PEPPER          Password hashing pepper (required, >= 16 chars)
  STRIPE_SECRET_KEY        Enables payments
  STRIPE_WEBHOOK_SECRET    Verifies webhook signatures
  METRICS_BIND             Prometheus listener, e.g. 127.0.0.1:9090
  (See .env.example for all configuration options)
";

#[tokio::main]
async fn main() -> Result<(), Error> {
    // Load .env file if it exists
    let _ = dotenvy::dotenv();

    let mut pargs = Arguments::from_env();

    // Help has a higher priority and should be handled separately.
    if pargs.contains(["-h", "--help"]) {
        print!("{HELP}");
        std::process::exit(0);
    }

    let bind: Option<SocketAddr> = pargs
        .opt_value_from_str("--bind")
        .context("--bind expects IP:PORT")?;
    let database_url: Option<String> = pargs.opt_value_from_str("--db-url")?;
    let no_sweep = pargs.contains("--no-sweep");

    let config = ServerConfig::from_env(bind, database_url, no_sweep)?;
    config.validate()?;

    logging::init();

    if let Some(addr) = config.metrics_bind {
        metrics::init_metrics(addr).map_err(Error::msg)?;
        info!("Prometheus metrics on http://{}/metrics", addr);
    }

    info!("Connecting to database...");
    let db = Database::new(&config.database)
        .await
        .context("Failed to connect to database")?;
    db.health_check().await.context("Database health check failed")?;
    info!("Database connected");

    let provider: Option<Arc<dyn PaymentProvider>> =
        config.payments.stripe_secret_key.as_ref().map(|key| {
            Arc::new(StripeClient::new(StripeConfig::new(
                key.clone(),
                config.payments.price_cents,
                config.payments.currency.clone(),
            ))) as Arc<dyn PaymentProvider>
        });
    if provider.is_none() {
        log::warn!("STRIPE_SECRET_KEY not set; payment endpoints will answer 500");
    }
    if config.is_production() && config.payments.webhook_secret.is_none() {
        log::warn!("STRIPE_WEBHOOK_SECRET not set in production; webhooks are unauthenticated");
    }

    let auth_settings = AuthSettings {
        access_token_ttl: chrono::Duration::days(config.security.jwt_expiry_days),
        app_base_url: config.app.base_url.clone(),
        ..AuthSettings::new(
            config.security.jwt_secret.clone(),
            config.security.password_pepper.clone(),
        )
    };
    let services = Services::new(
        Arc::new(db.store()),
        Arc::new(SystemClock),
        auth_settings,
        Arc::new(LogMailer),
        config.app.support_email.clone(),
        provider,
    );

    let sweep = config.sweep_enabled.then(|| {
        SweepScheduler::new(
            services.subscriptions.clone(),
            services.mailer.clone(),
            services.clock.clone(),
        )
        .with_observer(Arc::new(MetricsObserver))
        .spawn()
    });
    if sweep.is_none() {
        info!("Daily sweep disabled");
    }

    let state = AppState {
        services,
        webhook_secret: config.payments.webhook_secret.clone(),
        environment: config.app.environment.clone(),
    };
    let app = api::create_router(state);

    info!("Starting server at http://{}", config.bind);
    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| anyhow::anyhow!("Server error: {}", e))?;

    info!("Shutting down server...");
    if let Some(sweep) = sweep {
        sweep.stop().await;
    }
    db.close().await;

    Ok(())
}

/// Graceful shutdown signal
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("Failed to listen for CTRL+C: {}", e);
        std::future::pending::<()>().await;
    }
}
