use clap::Parser;
use directory_upload::config::StagingConfig;
use directory_upload::infrastructure::database;
use directory_upload::services::attachment_store::{AttachmentStore, DatabaseAttachmentStore};
use directory_upload::services::entry_catalog::DatabaseEntryCatalog;
use directory_upload::services::blob_store::{BlobStoreClient, HttpBlobStoreClient};
use directory_upload::services::staging::{StagingRegistry, UploadStagingService};
use directory_upload::services::worker::BackgroundWorker;
use directory_upload::{AppState, create_app};
use dotenvy::dotenv;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Services to run (api, all); `all` also sweeps idle sessions
    #[arg(short, long, default_value = "all")]
    mode: String,

    /// Port for the API server
    #[arg(short, long, default_value_t = 3000)]
    port: u16,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "directory_upload=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("🚀 Starting directory upload staging [Mode: {}]...", args.mode);

    let db = database::setup_database().await?;
    let config = StagingConfig::from_env();
    info!(
        "⚙️  Staging Config: Max Request={}MB, Idle Timeout={}s, Blob Store={}",
        config.max_request_size / 1024 / 1024,
        config.session_idle_timeout_secs,
        config.blob_store_url.as_deref().unwrap_or("disabled")
    );

    let registry = StagingRegistry::new();
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

    if args.mode == "all" {
        let worker = BackgroundWorker::new(
            registry.clone(),
            config.session_idle_timeout(),
            config.sweep_interval(),
            shutdown_rx.clone(),
        );
        tokio::spawn(worker.run());
        info!("👷 Idle session sweeper initialized.");
    }

    let blob_store: Option<Arc<dyn BlobStoreClient>> = match config.blob_store_url.as_deref() {
        Some(url) => match HttpBlobStoreClient::new(
            url,
            &config.blob_store_name,
            config.blob_store_timeout(),
        ) {
            Ok(client) => Some(Arc::new(client) as Arc<dyn BlobStoreClient>),
            Err(e) => {
                warn!("External-reference fields disabled, blob store client failed: {}", e);
                None
            }
        },
        None => None,
    };

    let catalog = Arc::new(DatabaseEntryCatalog::new(db.clone()));
    let mut attachment_store = DatabaseAttachmentStore::new(db.clone());
    if let Some(client) = &blob_store {
        attachment_store = attachment_store.with_blob_store(client.clone());
    }
    let store: Arc<dyn AttachmentStore> = Arc::new(attachment_store);

    let state = AppState {
        db: db.clone(),
        staging: Arc::new(UploadStagingService::new(registry, catalog)),
        store,
        blob_store,
        config: config.clone(),
    };

    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(|request: &axum::http::Request<_>| {
            let request_id = request
                .headers()
                .get("x-request-id")
                .and_then(|v| v.to_str().ok())
                .unwrap_or("unknown");
            tracing::info_span!(
                "http_request",
                method = %request.method(),
                uri = %request.uri(),
                request_id = %request_id,
            )
        })
        .on_request(|request: &axum::http::Request<_>, _span: &tracing::Span| {
            info!("📥 {} {}", request.method(), request.uri());
        })
        .on_response(
            |response: &axum::http::Response<_>,
             latency: std::time::Duration,
             _span: &tracing::Span| {
                info!(
                    "📤 Finished in {:?} with status {}",
                    latency,
                    response.status()
                );
            },
        );

    let app = create_app(state).layer(trace_layer);
    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!("✅ API Server listening on: http://0.0.0.0:{}", args.port);
    info!("📖 Swagger UI documentation: http://localhost:{}/swagger-ui", args.port);

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!("❌ Server runtime error: {}", e);
    }

    let _ = shutdown_tx.send(true);
    info!("👋 Staging service exited cleanly.");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("⌨️  Ctrl+C received, initiating graceful shutdown...");
        },
        _ = terminate => {
            info!("💤 SIGTERM received, initiating graceful shutdown...");
        },
    }
}
