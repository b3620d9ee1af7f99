use crate::errors::MiningEngineError;
use crate::metrics;
use crate::models::{CompleteTaskRequest, MineRequest};
use crate::services::MiningService;
use actix_web::{web, HttpResponse};
use serde_json::json;
use std::sync::Arc;
use validator::Validate;

/// Health check endpoint
pub async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "status": "healthy",
        "service": "mining-engine",
        "version": "1.0.0"
    }))
}

/// Get user stats endpoint
pub async fn get_user(
    service: web::Data<Arc<MiningService>>,
    user_id: web::Path<i64>,
) -> Result<HttpResponse, MiningEngineError> {
    let stats = service.stats(*user_id).await?;
    Ok(HttpResponse::Ok().json(stats))
}

/// Mine tokens endpoint
pub async fn mine(
    service: web::Data<Arc<MiningService>>,
    request: web::Json<MineRequest>,
) -> Result<HttpResponse, MiningEngineError> {
    request
        .validate()
        .map_err(|e| MiningEngineError::Validation(e.to_string()))?;

    let receipt = service.mine(request.user_id).await?;

    Ok(HttpResponse::Ok().json(json!({
        "accepted": true,
        "amount": receipt.amount,
        "balance": receipt.balance,
        "mined_at": receipt.mined_at
    })))
}

/// List available tasks endpoint
pub async fn available_tasks(
    service: web::Data<Arc<MiningService>>,
    user_id: web::Path<i64>,
) -> Result<HttpResponse, MiningEngineError> {
    let tasks = service.available_tasks(*user_id).await?;
    Ok(HttpResponse::Ok().json(tasks))
}

/// Complete task endpoint
pub async fn complete_task(
    service: web::Data<Arc<MiningService>>,
    request: web::Json<CompleteTaskRequest>,
) -> Result<HttpResponse, MiningEngineError> {
    request
        .validate()
        .map_err(|e| MiningEngineError::Validation(e.to_string()))?;

    let receipt = service
        .complete_task(request.user_id, request.task_id)
        .await?;

    Ok(HttpResponse::Ok().json(json!({
        "accepted": true,
        "task_id": receipt.task_id,
        "title": receipt.title,
        "reward": receipt.reward,
        "balance": receipt.balance,
        "mining_rate": receipt.mining_rate
    })))
}

/// List referrals endpoint
pub async fn referrals(
    service: web::Data<Arc<MiningService>>,
    user_id: web::Path<i64>,
) -> Result<HttpResponse, MiningEngineError> {
    let referrals = service.referrals_of(*user_id).await?;
    Ok(HttpResponse::Ok().json(referrals))
}

/// Prometheus metrics endpoint
pub async fn metrics_endpoint() -> HttpResponse {
    match metrics::metrics_handler() {
        Ok(body) => HttpResponse::Ok()
            .content_type("text/plain; version=0.0.4")
            .body(body),
        Err(e) => HttpResponse::InternalServerError().json(json!({
            "error": "Failed to gather metrics",
            "details": e.to_string()
        })),
    }
}

/// Configure routes
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .route("/user/{user_id}", web::get().to(get_user))
            .route("/mine", web::post().to(mine))
            .route("/tasks/{user_id}", web::get().to(available_tasks))
            .route("/complete-task", web::post().to(complete_task))
            .route("/referrals/{user_id}", web::get().to(referrals)),
    )
    .route("/metrics", web::get().to(metrics_endpoint))
    .route("/health", web::get().to(health_check));
}
