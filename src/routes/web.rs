use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};

use crate::routes::{certificates, sign};
use crate::services::certificate::CertificateService;
use crate::services::file_store::TempFileStore;
use crate::services::sign_queue::SignQueue;

pub struct AppStateData {
    pub certificates: CertificateService,
    pub sign_queue: SignQueue,
    pub store: TempFileStore,
}

pub type AppState = Arc<AppStateData>;

pub fn create_router() -> Router<AppState> {
    let api_routes = Router::new()
        .route(
            "/certificate",
            post(certificates::create_certificate).get(certificates::get_certificates),
        )
        .route(
            "/certificate/:id",
            get(certificates::get_certificate)
                .put(certificates::update_certificate)
                .delete(certificates::delete_certificate),
        )
        .route("/sign", post(sign::create_sign_job))
        .route("/sign/jobs/:id", get(sign::get_sign_job))
        .route("/sign/jobs/:id/document", get(sign::download_signed_document));

    Router::new()
        .nest("/api", api_routes)
        .route("/health", get(health_check))
}

async fn health_check() -> &'static str {
    "OK"
}
