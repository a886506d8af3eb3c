mod args;
mod bank;
mod db;
mod domain;
mod error;
mod handlers;
mod jobs;
mod logging;
mod notify;
mod sync;
mod transform;

use std::sync::Arc;

use args::parse_args;
use axum::{routing::get, Router};
use bank::BankClient;
use db::create_pool;
use error::Error;
use handlers::{delete_purchase, get_purchase, get_purchases, home};
use logging::setup_logging;
use notify::Notifier;
use sqlx::SqlitePool;
use tokio::sync::watch;
use tokio::task::JoinSet;

pub struct AppState {
    pool: SqlitePool,
    sync_interval: u64,
    notify_hour: u32,
    report_categories: Vec<String>,
}

#[tokio::main]
async fn main() {
    let args = parse_args();

    setup_logging(&args.base_log_dir);

    let pool = create_pool(&args.database_url)
        .await
        .expect("Failed to create SQLite pool");

    let client = BankClient::new(
        args.bank_api_url,
        args.token_url,
        args.customer_id,
        args.client_id,
        args.client_secret,
    );
    let notifier = Notifier::new(args.pushover_user, args.pushover_token);

    let app_state = Arc::new(AppState {
        pool,
        sync_interval: args.sync_interval,
        notify_hour: args.notify_hour,
        report_categories: args.report_categories,
    });

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    tracing::info!("Spawning background tasks...");
    let mut tasks = JoinSet::new();
    tasks.spawn(jobs::sync_task(app_state.clone(), client, shutdown_rx.clone()));
    tasks.spawn(jobs::notify_task(
        app_state.clone(),
        notifier,
        shutdown_rx.clone(),
    ));
    tasks.spawn(serve(app_state.clone(), args.port, shutdown_rx));

    // The first task to finish, for any reason, takes the others down with
    // it; its result decides the exit status.
    let first_exit = tokio::select! {
        res = tasks.join_next() => res,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received interrupt, shutting down...");
            None
        }
    };

    let _ = shutdown_tx.send(true);
    while tasks.join_next().await.is_some() {}

    match first_exit {
        Some(Ok(Err(err))) => {
            tracing::error!("task failed: {}", err);
            std::process::exit(1);
        }
        Some(Err(err)) => {
            tracing::error!("task panicked: {}", err);
            std::process::exit(1);
        }
        _ => {}
    }
}

async fn serve(
    state: Arc<AppState>,
    port: u32,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), Error> {
    let app = Router::new()
        .route("/", get(home))
        .route("/api/purchases/{year}/{month}", get(get_purchases))
        .route(
            "/api/purchase/{id}",
            get(get_purchase).delete(delete_purchase),
        )
        .with_state(state);

    let bind_address = format!("0.0.0.0:{}", port);
    tracing::info!("Server listening on {}...", bind_address);

    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .map_err(|err| Error::Unavailable(format!("binding {}: {}", bind_address, err)))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.changed().await;
        })
        .await
        .map_err(|err| Error::Unavailable(format!("http server: {}", err)))?;
    Ok(())
}
