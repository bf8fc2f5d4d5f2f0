use std::{
    fs::{self, OpenOptions},
    net::SocketAddr,
    sync::Arc,
};

use axum::{
    Router,
    extract::{MatchedPath, Request},
    middleware,
};
use axum_server::Handle;
use clap::Parser;
use rusqlite::Connection;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{Layer, filter, layer::SubscriberExt, util::SubscriberInitExt};

use finova_rs::{
    AppState, ServerConfig, SmtpMailer, build_router, graceful_shutdown, logging_middleware,
};

#[tokio::main]
async fn main() {
    setup_logging();

    let args = ServerConfig::parse();

    let addr = SocketAddr::from((args.address, args.port));

    let app_config = args.app_config();
    fs::create_dir_all(&app_config.media_dir).unwrap_or_else(|error| {
        panic!(
            "Could not create the media directory at {:?}: {error}",
            app_config.media_dir
        )
    });

    let conn = Connection::open(&args.db_path)
        .unwrap_or_else(|_| panic!("Could not open the database at {}", args.db_path));
    let mut state = AppState::new(conn, app_config).expect("Could not create the app state.");

    match args.smtp_settings() {
        Some(settings) => {
            let mailer = SmtpMailer::new(&settings).expect("Could not create the SMTP mailer.");
            state = state.with_mailer(Arc::new(mailer));
        }
        None => tracing::warn!("No SMTP host configured, emails will only be logged."),
    }

    let handle = Handle::new();
    tokio::spawn(graceful_shutdown(handle.clone()));

    let router = build_router(state).layer(middleware::from_fn(logging_middleware));
    let router = add_tracing_layer(router);

    tracing::info!("HTTP server listening on {}", addr);
    axum_server::bind(addr)
        .handle(handle)
        .serve(router.into_make_service())
        .await
        .unwrap();
}

fn setup_logging() {
    let stdout_log = tracing_subscriber::fmt::layer().pretty();

    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open("debug.log")
        .expect("Could not create log file");

    let debug_log = tracing_subscriber::fmt::layer()
        .pretty()
        .with_writer(Arc::new(log_file));

    tracing_subscriber::registry()
        .with(
            stdout_log
                .with_filter(filter::LevelFilter::INFO)
                .and_then(debug_log)
                .with_filter(filter::LevelFilter::DEBUG),
        )
        .init();
}

fn add_tracing_layer(router: Router) -> Router {
    let tracing_layer = TraceLayer::new_for_http()
        .make_span_with(|req: &Request| {
            let method = req.method();
            let uri = req.uri();

            let matched_path = req
                .extensions()
                .get::<MatchedPath>()
                .map(|matched_path| matched_path.as_str());

            tracing::debug_span!("request", %method, %uri, matched_path)
        })
        // Errors are logged when they are turned into responses.
        .on_failure(());

    router.layer(tracing_layer)
}
