mod common;
mod database;
mod models;
mod routes;
mod services;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::extract::DefaultBodyLimit;
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use common::config::{AppConfig, StorageBackend};
use database::connection::{establish_connection, run_migrations};
use database::repository::{CertificateRepository, MemoryCertificateRepository, PgCertificateRepository};
use routes::web::{create_router, AppState, AppStateData};
use services::certificate::CertificateService;
use services::conversion::CertificateConverter;
use services::crypto::CryptoService;
use services::file_store::TempFileStore;
use services::sign::SignService;
use services::sign_queue::{log_job_events, SignQueue};
use services::toolchain::{locate_binary, CommandRunner, ProcessRunner};

#[derive(OpenApi)]
#[openapi(
    paths(
        routes::certificates::create_certificate,
        routes::certificates::get_certificates,
        routes::certificates::get_certificate,
        routes::certificates::update_certificate,
        routes::certificates::delete_certificate,
        routes::sign::create_sign_job,
        routes::sign::get_sign_job,
        routes::sign::download_signed_document,
    ),
    components(
        schemas(
            models::certificate::Certificate,
            models::certificate::CertificateList,
            models::certificate::CertificateRequest,
            models::sign::SignRequest,
            models::sign::SignAccepted,
            models::sign::SignJob,
            models::sign::JobStatus,
            common::responses::CertificateResponse,
            common::responses::CertificateListResponse,
            common::responses::SignAcceptedResponse,
            common::responses::SignJobResponse,
        )
    ),
    tags(
        (name = "certificates", description = "PKCS#12 certificate management endpoints"),
        (name = "sign", description = "Asynchronous PDF signing endpoints")
    ),
)]
struct ApiDoc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    if let Err(e) = dotenvy::dotenv() {
        eprintln!("No .env file loaded: {}", e);
    }

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = AppConfig::from_env()?;

    let repo: Arc<dyn CertificateRepository> = match config.storage_backend {
        StorageBackend::Postgres => {
            let url = config
                .database_url
                .as_deref()
                .context("DATABASE_URL is not set")?;
            let pool = establish_connection(url)
                .await
                .context("Failed to connect to database")?;
            info!("Running database migrations...");
            run_migrations(&pool)
                .await
                .context("Database migration failed")?;
            Arc::new(PgCertificateRepository::new(pool))
        }
        StorageBackend::Memory => {
            warn!("Using the in-memory certificate store; records are lost on restart");
            Arc::new(MemoryCertificateRepository::new())
        }
    };

    let store = TempFileStore::open(&config.temp_dir)
        .with_context(|| format!("Failed to open temp dir {}", config.temp_dir.display()))?;

    // Missing tools are reported per request; only warn here
    for tool in [&config.tools.openssl_bin, &config.tools.java_bin] {
        if let Err(e) = locate_binary(tool) {
            warn!("{}", e);
        }
    }
    if !config.tools.open_pdf_sign_jar.is_file() {
        warn!(
            "open-pdf-sign not found at {}",
            config.tools.open_pdf_sign_jar.display()
        );
    }

    let runner: Arc<dyn CommandRunner> = Arc::new(ProcessRunner::new(config.tools.timeout));
    let crypto = CryptoService::new(&config.crypto);
    let converter = CertificateConverter::new(
        store.clone(),
        Arc::clone(&runner),
        config.tools.openssl_bin.clone(),
    );
    let certificates = CertificateService::new(repo, store.clone(), converter, crypto.clone());
    let signer = SignService::new(
        certificates.clone(),
        store.clone(),
        runner,
        crypto,
        config.tools.java_bin.clone(),
        config.tools.open_pdf_sign_jar.clone(),
    );

    let sign_queue = SignQueue::start(Arc::new(signer), store.clone(), &config.queue);
    tokio::spawn(log_job_events(sign_queue.subscribe()));

    let app_state: AppState = Arc::new(AppStateData {
        certificates,
        sign_queue,
        store,
    });

    let swagger_routes = SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi());

    let app = Router::new()
        .merge(create_router())
        .merge(swagger_routes)
        .layer(DefaultBodyLimit::max(100 * 1024 * 1024)) // base64 PDFs and bundles
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("Server running on http://{}", addr);
    info!("Swagger UI: http://{}/swagger-ui", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app).await?;

    Ok(())
}
