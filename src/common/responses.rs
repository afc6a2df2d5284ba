use axum::{http::StatusCode, response::Json};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// JSON envelope returned by every API endpoint
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[aliases(
    CertificateResponse = ApiResponse<crate::models::certificate::Certificate>,
    CertificateListResponse = ApiResponse<crate::models::certificate::CertificateList>,
    SignAcceptedResponse = ApiResponse<crate::models::sign::SignAccepted>,
    SignJobResponse = ApiResponse<crate::models::sign::SignJob>,
)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub status_code: u16,
    pub message: String,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T, message: String) -> (StatusCode, Json<ApiResponse<T>>) {
        Self::with_status(StatusCode::OK, data, message)
    }

    pub fn created(data: T, message: String) -> (StatusCode, Json<ApiResponse<T>>) {
        Self::with_status(StatusCode::CREATED, data, message)
    }

    pub fn accepted(data: T, message: String) -> (StatusCode, Json<ApiResponse<T>>) {
        Self::with_status(StatusCode::ACCEPTED, data, message)
    }

    fn with_status(status: StatusCode, data: T, message: String) -> (StatusCode, Json<ApiResponse<T>>) {
        (
            status,
            Json(ApiResponse {
                success: true,
                status_code: status.as_u16(),
                message,
                data: Some(data),
                error: None,
            }),
        )
    }

    pub fn error(status: StatusCode, message: String) -> (StatusCode, Json<ApiResponse<T>>) {
        (
            status,
            Json(ApiResponse {
                success: false,
                status_code: status.as_u16(),
                message: message.clone(),
                data: None,
                error: Some(message),
            }),
        )
    }
}

impl ApiResponse<()> {
    /// Success envelope without a payload
    pub fn ok(message: String) -> (StatusCode, Json<ApiResponse<()>>) {
        (
            StatusCode::OK,
            Json(ApiResponse {
                success: true,
                status_code: StatusCode::OK.as_u16(),
                message,
                data: None,
                error: None,
            }),
        )
    }
}
