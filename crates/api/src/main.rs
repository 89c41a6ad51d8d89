//! API server entry point.

use std::sync::Arc;
use std::time::Duration;

use api::AppState;
use api::config::{Config, LogFormat};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use notify::{Dispatcher, LogNotifier, Notifier, SmtpNotifier};
use payments::{PaymentGateways, PaystackGateway, StripeGateway};
use sqlx::postgres::PgPoolOptions;
use store::{InMemoryStore, PostgresStore, Store};
use tokio::signal;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// How long queued notifications may keep the process alive after the
/// server stops.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    match config.log_format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

fn build_gateways(config: &Config) -> PaymentGateways {
    let mut gateways = PaymentGateways::new();
    if let Some(paystack) = &config.paystack {
        let gateway =
            PaystackGateway::new(paystack.clone()).expect("failed to build Paystack client");
        gateways.register(Arc::new(gateway));
    }
    if let Some(stripe) = &config.stripe {
        let gateway = StripeGateway::new(stripe.clone()).expect("failed to build Stripe client");
        gateways.register(Arc::new(gateway));
    }
    if gateways.is_empty() {
        tracing::warn!("no payment processor configured, checkout is disabled");
    }
    gateways
}

fn build_notifier(config: &Config) -> Arc<dyn Notifier> {
    match &config.smtp {
        Some(smtp) => {
            tracing::info!(host = %smtp.host, port = smtp.port, "sending email over SMTP");
            Arc::new(SmtpNotifier::new(smtp).expect("invalid SMTP configuration"))
        }
        None => {
            tracing::warn!("SMTP_HOST not set, emails will be logged");
            Arc::new(LogNotifier)
        }
    }
}

async fn serve<S: Store + Clone + 'static>(
    config: &Config,
    store: S,
    gateways: PaymentGateways,
    dispatcher: Dispatcher,
    metrics_handle: PrometheusHandle,
) {
    let state = Arc::new(AppState::new(store, gateways, dispatcher));
    let app = api::create_app(state, metrics_handle);

    let addr = config.addr();
    tracing::info!(%addr, "starting API server");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind address");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");
}

#[tokio::main]
async fn main() {
    // 1. Configuration and tracing
    let config = Config::from_env();
    init_tracing(&config);

    // 2. Install Prometheus metrics recorder
    let metrics_handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    // 3. Outbound integrations
    let gateways = build_gateways(&config);
    let (dispatcher, worker) = Dispatcher::spawn(build_notifier(&config), config.dispatcher());

    // 4. Store and server
    match &config.database_url {
        Some(url) => {
            let pool = PgPoolOptions::new()
                .max_connections(config.database_max_connections)
                .connect(url)
                .await
                .expect("failed to connect to database");
            let store = PostgresStore::with_lock_timeout(pool, config.lock_timeout);
            store
                .run_migrations()
                .await
                .expect("failed to run migrations");
            tracing::info!("connected to PostgreSQL");
            serve(&config, store, gateways, dispatcher, metrics_handle).await;
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using the in-memory store");
            let store = InMemoryStore::with_lock_timeout(config.lock_timeout);
            serve(&config, store, gateways, dispatcher, metrics_handle).await;
        }
    }

    // 5. Every dispatcher handle is gone with the router; let the worker
    //    finish what is queued.
    match tokio::time::timeout(DRAIN_TIMEOUT, worker).await {
        Ok(Ok(report)) => tracing::info!(
            sent = report.sent,
            failed = report.failed,
            "server shut down gracefully"
        ),
        Ok(Err(e)) => tracing::error!(error = %e, "notification worker failed"),
        Err(_) => tracing::warn!("shut down with notifications still queued"),
    }
}
