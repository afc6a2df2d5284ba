use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use uuid::Uuid;

use crate::common::error::AppError;
use crate::common::responses::ApiResponse;
use crate::models::certificate::{Certificate, CertificateList, CertificateRequest};
use crate::routes::web::AppState;

type Reply<T> = Result<(StatusCode, Json<ApiResponse<T>>), AppError>;

#[utoipa::path(
    post,
    path = "/api/certificate",
    request_body = CertificateRequest,
    responses(
        (status = 201, description = "Certificate stored and converted", body = CertificateResponse),
        (status = 400, description = "Invalid key name or payload", body = CertificateResponse),
        (status = 409, description = "Certificate key already exists", body = CertificateResponse),
        (status = 500, description = "Conversion failed or tool missing", body = CertificateResponse)
    ),
    tag = "certificates"
)]
pub async fn create_certificate(
    State(state): State<AppState>,
    Json(payload): Json<CertificateRequest>,
) -> Reply<Certificate> {
    let upload = payload.into_upload()?;
    let certificate = state.certificates.add(upload).await?;
    Ok(ApiResponse::created(
        certificate,
        "Certificate created successfully".to_string(),
    ))
}

#[utoipa::path(
    get,
    path = "/api/certificate",
    responses(
        (status = 200, description = "All certificates with their count", body = CertificateListResponse)
    ),
    tag = "certificates"
)]
pub async fn get_certificates(State(state): State<AppState>) -> Reply<CertificateList> {
    let list = state.certificates.find_all().await?;
    Ok(ApiResponse::success(
        list,
        "Certificates retrieved successfully".to_string(),
    ))
}

#[utoipa::path(
    get,
    path = "/api/certificate/{id}",
    params(
        ("id" = Uuid, Path, description = "Certificate ID")
    ),
    responses(
        (status = 200, description = "Certificate found", body = CertificateResponse),
        (status = 404, description = "Certificate not found", body = CertificateResponse)
    ),
    tag = "certificates"
)]
pub async fn get_certificate(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Reply<Certificate> {
    let certificate = state.certificates.find_one(id).await?;
    Ok(ApiResponse::success(
        certificate,
        "Certificate retrieved successfully".to_string(),
    ))
}

#[utoipa::path(
    put,
    path = "/api/certificate/{id}",
    request_body = CertificateRequest,
    params(
        ("id" = Uuid, Path, description = "Certificate ID")
    ),
    responses(
        (status = 200, description = "Certificate replaced", body = CertificateResponse),
        (status = 404, description = "Certificate not found", body = CertificateResponse),
        (status = 409, description = "Key belongs to another certificate", body = CertificateResponse),
        (status = 500, description = "Conversion failed or tool missing", body = CertificateResponse)
    ),
    tag = "certificates"
)]
pub async fn update_certificate(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<CertificateRequest>,
) -> Reply<Certificate> {
    let upload = payload.into_upload()?;
    let certificate = state.certificates.update(id, upload).await?;
    Ok(ApiResponse::success(
        certificate,
        "Certificate updated successfully".to_string(),
    ))
}

#[utoipa::path(
    delete,
    path = "/api/certificate/{id}",
    params(
        ("id" = Uuid, Path, description = "Certificate ID")
    ),
    responses(
        (status = 200, description = "Certificate and its artifacts removed"),
        (status = 404, description = "Certificate not found")
    ),
    tag = "certificates"
)]
pub async fn delete_certificate(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Reply<()> {
    state.certificates.remove(id).await?;
    Ok(ApiResponse::<()>::ok(
        "Certificate deleted successfully".to_string(),
    ))
}
