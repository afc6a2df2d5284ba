use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
};
use uuid::Uuid;

use crate::common::error::AppError;
use crate::common::responses::ApiResponse;
use crate::models::sign::{JobStatus, SignAccepted, SignJob, SignRequest};
use crate::routes::web::AppState;

#[utoipa::path(
    post,
    path = "/api/sign",
    request_body = SignRequest,
    responses(
        (status = 202, description = "Sign job queued", body = SignAcceptedResponse),
        (status = 400, description = "No certificates or invalid document", body = SignAcceptedResponse),
        (status = 503, description = "Sign queue is full", body = SignAcceptedResponse)
    ),
    tag = "sign"
)]
pub async fn create_sign_job(
    State(state): State<AppState>,
    Json(payload): Json<SignRequest>,
) -> Result<(StatusCode, Json<ApiResponse<SignAccepted>>), AppError> {
    let payload = payload.into_payload()?;
    let job_id = state.sign_queue.enqueue(payload).await?;
    Ok(ApiResponse::accepted(
        SignAccepted { job_id },
        "Sign job queued".to_string(),
    ))
}

#[utoipa::path(
    get,
    path = "/api/sign/jobs/{id}",
    params(
        ("id" = Uuid, Path, description = "Sign job ID")
    ),
    responses(
        (status = 200, description = "Current job state", body = SignJobResponse),
        (status = 404, description = "Unknown or evicted job", body = SignJobResponse)
    ),
    tag = "sign"
)]
pub async fn get_sign_job(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<(StatusCode, Json<ApiResponse<SignJob>>), AppError> {
    let job = state
        .sign_queue
        .job(id)
        .await
        .ok_or_else(|| AppError::NotFound("Sign job".to_string()))?;
    let message = format!("Sign job is {}", job.status);
    Ok(ApiResponse::success(job, message))
}

#[utoipa::path(
    get,
    path = "/api/sign/jobs/{id}/document",
    params(
        ("id" = Uuid, Path, description = "Sign job ID")
    ),
    responses(
        (status = 200, description = "Signed PDF", content_type = "application/pdf"),
        (status = 404, description = "Unknown or evicted job"),
        (status = 409, description = "Job has not completed")
    ),
    tag = "sign"
)]
pub async fn download_signed_document(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let job = state
        .sign_queue
        .job(id)
        .await
        .ok_or_else(|| AppError::NotFound("Sign job".to_string()))?;

    let document = match (job.status, job.document) {
        (JobStatus::Completed, Some(document)) => document,
        _ => return Err(AppError::JobNotReady(id)),
    };

    let bytes = state.store.read(&document).await?;
    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", document),
            ),
        ],
        bytes,
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use crate::routes::web::tests::test_app;
    use crate::services::certificate::tests::upload;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use serde_json::{json, Value};
    use std::time::Duration;
    use tower::ServiceExt;

    async fn call(app: &axum::Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, bytes.to_vec())
    }

    fn post_sign(body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/sign")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn wait_for(app: &axum::Router, job_id: &str, status: &str) -> Value {
        for _ in 0..200 {
            let (_, bytes) = call(app, get(&format!("/api/sign/jobs/{}", job_id))).await;
            let body: Value = serde_json::from_slice(&bytes).unwrap();
            if body["data"]["status"] == status {
                return body;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("job {} never reached {}", job_id, status);
    }

    #[tokio::test]
    async fn test_sign_job_completes_and_serves_document() {
        let (app, f) = test_app();
        let k1 = f.service.add(upload("k1.pfx", "one")).await.unwrap();

        // "%PDF" in base64
        let (status, bytes) = call(&app, post_sign(json!({ "certificates": ["k1"], "data": "JVBERg==" }))).await;
        assert_eq!(status, StatusCode::ACCEPTED);
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        let job_id = body["data"]["job_id"].as_str().unwrap().to_string();

        wait_for(&app, &job_id, "completed").await;

        let response = app
            .clone()
            .oneshot(get(&format!("/api/sign/jobs/{}/document", job_id)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/pdf");
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(
            String::from_utf8(bytes.to_vec()).unwrap(),
            format!("%PDF|signed-by:{}.pem", k1.id)
        );
    }

    #[tokio::test]
    async fn test_unknown_certificate_fails_job() {
        let (app, _f) = test_app();

        let (status, bytes) = call(&app, post_sign(json!({ "certificates": ["ghost"], "data": "JVBERg==" }))).await;
        assert_eq!(status, StatusCode::ACCEPTED);
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        let job_id = body["data"]["job_id"].as_str().unwrap().to_string();

        let job = wait_for(&app, &job_id, "failed").await;
        assert_eq!(job["data"]["error"], "Certificates: ghost, do not exist");

        let (status, _) = call(&app, get(&format!("/api/sign/jobs/{}/document", job_id))).await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_empty_certificate_list_is_rejected() {
        let (app, _f) = test_app();
        let (status, _) = call(&app, post_sign(json!({ "certificates": [], "data": "JVBERg==" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_unknown_job_is_not_found() {
        let (app, _f) = test_app();
        let (status, _) = call(&app, get(&format!("/api/sign/jobs/{}", uuid::Uuid::new_v4()))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
