use actix_web::{web, HttpRequest, HttpResponse};
use serde::Deserialize;

use crate::app_state::AppState;
use crate::auth::{current_claims, require_superadmin, Claims};
use crate::error::ServiceError;
use crate::models::Role;
use crate::services::moderation::EntityKind;

#[derive(Debug, Deserialize)]
pub struct StatusUpdate {
    pub status: String,
}

fn require_self_or_superadmin(claims: &Claims, user_id: &str) -> Result<(), ServiceError> {
    match claims.role {
        Role::Superadmin => Ok(()),
        Role::Regular | Role::MosqueAdmin if claims.sub == user_id => Ok(()),
        Role::Regular | Role::MosqueAdmin => {
            Err(ServiceError::Forbidden("cannot manage another user's favorites"))
        }
    }
}

// GET /api/users/pending
pub async fn get_pending_users(
    req: HttpRequest,
    data: web::Data<AppState>,
) -> Result<HttpResponse, ServiceError> {
    require_superadmin(&req)?;
    let pending = data.identity.list_pending_admins().await?;
    Ok(HttpResponse::Ok().json(pending))
}

// GET /api/users/{user_id}/id-proof
pub async fn get_user_id_proof(
    req: HttpRequest,
    data: web::Data<AppState>,
    user_id: web::Path<String>,
) -> Result<HttpResponse, ServiceError> {
    require_superadmin(&req)?;
    let id_proof = data.identity.id_proof(&user_id).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "id_proof": id_proof })))
}

// PATCH /api/users/{user_id}/status
pub async fn update_user_status(
    req: HttpRequest,
    data: web::Data<AppState>,
    user_id: web::Path<String>,
    update: web::Json<StatusUpdate>,
) -> Result<HttpResponse, ServiceError> {
    require_superadmin(&req)?;
    let status = data
        .moderation
        .set_approval_status(EntityKind::Account, &user_id, &update.status)
        .await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "Status updated successfully",
        "status": status,
    })))
}

// POST /api/users/{user_id}/favorites/{mosque_id}
pub async fn add_favorite_mosque(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<(String, String)>, // (user_id, mosque_id)
) -> Result<HttpResponse, ServiceError> {
    let (user_id, mosque_id) = path.into_inner();
    require_self_or_superadmin(&current_claims(&req)?, &user_id)?;
    data.identity.add_favorite(&user_id, &mosque_id).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "message": "Mosque added to favorites" })))
}

// DELETE /api/users/{user_id}/favorites/{mosque_id}
pub async fn remove_favorite_mosque(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<(String, String)>, // (user_id, mosque_id)
) -> Result<HttpResponse, ServiceError> {
    let (user_id, mosque_id) = path.into_inner();
    require_self_or_superadmin(&current_claims(&req)?, &user_id)?;
    data.identity.remove_favorite(&user_id, &mosque_id).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "message": "Mosque removed from favorites" })))
}

// GET /api/users/{user_id}/favorites
pub async fn get_favorite_mosques(
    req: HttpRequest,
    data: web::Data<AppState>,
    user_id: web::Path<String>,
) -> Result<HttpResponse, ServiceError> {
    require_self_or_superadmin(&current_claims(&req)?, &user_id)?;
    let mosques = data.identity.favorites(&user_id).await?;
    Ok(HttpResponse::Ok().json(mosques))
}
