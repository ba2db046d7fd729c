use crate::errors::LedgerError;
use crate::identity;
use crate::metrics;
use crate::models::{
    DeleteAccountRequest, DismissWarningRequest, LockRequest, MineRequest, TransferRequest,
    UpdateProfileRequest, VerifyRequest, WarnRequest,
};
use crate::services::LedgerService;
use actix_web::{web, HttpRequest, HttpResponse};
use serde_json::json;
use std::sync::Arc;

fn raw_client_address(req: &HttpRequest) -> Option<String> {
    req.connection_info()
        .realip_remote_addr()
        .map(|addr| addr.to_string())
}

/// Health check endpoint
pub async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "status": "healthy",
        "service": "currency-engine",
        "version": "1.0.0"
    }))
}

/// Verify a user against the comment feed; registers on first success.
pub async fn verify_user(
    service: web::Data<Arc<LedgerService>>,
    request: web::Json<VerifyRequest>,
    req: HttpRequest,
) -> Result<HttpResponse, LedgerError> {
    let raw_address = raw_client_address(&req);
    let response = service
        .register_or_login(request.into_inner(), raw_address.as_deref())
        .await?;
    Ok(HttpResponse::Ok().json(response))
}

#[derive(serde::Deserialize)]
pub struct UserQuery {
    username: String,
}

/// Account snapshot endpoint
pub async fn get_user_data(
    service: web::Data<Arc<LedgerService>>,
    query: web::Query<UserQuery>,
) -> Result<HttpResponse, LedgerError> {
    let account = service.get_account(&query.username).await?;
    Ok(HttpResponse::Ok().json(account))
}

/// Funds transfer endpoint
pub async fn send_currency(
    service: web::Data<Arc<LedgerService>>,
    request: web::Json<TransferRequest>,
) -> Result<HttpResponse, LedgerError> {
    let response = service.transfer(request.into_inner()).await?;
    Ok(HttpResponse::Ok().json(response))
}

/// Mining credit endpoint. The fingerprint is derived from the connection,
/// never taken from the request body.
pub async fn mine_currency(
    service: web::Data<Arc<LedgerService>>,
    request: web::Json<MineRequest>,
    req: HttpRequest,
) -> Result<HttpResponse, LedgerError> {
    let raw_address = raw_client_address(&req);
    let fingerprint = identity::hash_address(raw_address.as_deref());
    let response = service.mine(request.into_inner(), &fingerprint).await?;
    Ok(HttpResponse::Ok().json(response))
}

/// Administrative warning endpoint
pub async fn warn_user(
    service: web::Data<Arc<LedgerService>>,
    request: web::Json<WarnRequest>,
) -> Result<HttpResponse, LedgerError> {
    let target = request.target.clone();
    service.set_warning(request.into_inner()).await?;
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": format!("Warning set for {}", target)
    })))
}

/// Administrative global-lock endpoint
pub async fn set_lock(
    service: web::Data<Arc<LedgerService>>,
    request: web::Json<LockRequest>,
) -> Result<HttpResponse, LedgerError> {
    let lock = service.set_global_lock(request.into_inner()).await?;
    Ok(HttpResponse::Ok().json(lock))
}

/// Holder dismisses their active warning.
pub async fn dismiss_warning(
    service: web::Data<Arc<LedgerService>>,
    request: web::Json<DismissWarningRequest>,
) -> Result<HttpResponse, LedgerError> {
    service.dismiss_warning(request.into_inner()).await?;
    Ok(HttpResponse::Ok().json(json!({ "success": true })))
}

/// Holder edits bio / country.
pub async fn update_profile(
    service: web::Data<Arc<LedgerService>>,
    request: web::Json<UpdateProfileRequest>,
) -> Result<HttpResponse, LedgerError> {
    let account = service.update_profile(request.into_inner()).await?;
    Ok(HttpResponse::Ok().json(account))
}

/// Holder deletes their account.
pub async fn delete_account(
    service: web::Data<Arc<LedgerService>>,
    request: web::Json<DeleteAccountRequest>,
) -> Result<HttpResponse, LedgerError> {
    service.delete_account(request.into_inner()).await?;
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Account deleted."
    })))
}

/// Leaderboard endpoint, ordered by balance descending.
pub async fn leaderboard(
    service: web::Data<Arc<LedgerService>>,
) -> Result<HttpResponse, LedgerError> {
    let entries = service.leaderboard().await?;
    Ok(HttpResponse::Ok().json(entries))
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
    cfg.service(web::scope("/auth").route("/verify", web::post().to(verify_user)))
        .service(
            web::scope("/user")
                .route("/data", web::get().to(get_user_data))
                .route("/update_profile", web::post().to(update_profile))
                .route("/dismiss_warning", web::post().to(dismiss_warning))
                .route("/delete", web::post().to(delete_account)),
        )
        .service(
            web::scope("/transaction")
                .route("/send", web::post().to(send_currency))
                .route("/mine", web::post().to(mine_currency)),
        )
        .service(
            web::scope("/admin")
                .route("/warn", web::post().to(warn_user))
                .route("/lock", web::post().to(set_lock)),
        )
        .route("/leaderboard", web::get().to(leaderboard))
        .route("/health", web::get().to(health_check))
        .route("/metrics", web::get().to(metrics_endpoint));
}
