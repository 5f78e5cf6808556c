use actix_web::{web, HttpRequest, HttpResponse};

use crate::app_state::AppState;
use crate::auth::{current_claims, require_superadmin, Claims};
use crate::error::ServiceError;
use crate::models::{ApprovalStatus, Post, Role};
use crate::services::moderation::EntityKind;
use crate::services::posts::{FeedQuery, PostDraft, PostEdit};
use crate::user_management::StatusUpdate;

/// Authors edit their own posts; superadmins edit any.
fn require_author(claims: &Claims, post: &Post) -> Result<(), ServiceError> {
    match claims.role {
        Role::Superadmin => Ok(()),
        Role::MosqueAdmin if post.admin_id == claims.sub => Ok(()),
        Role::MosqueAdmin | Role::Regular => Err(ServiceError::Forbidden("not the author of this post")),
    }
}

// GET /api/posts
// Defaults to the approved feed; other statuses are for superadmins.
pub async fn list_posts(
    req: HttpRequest,
    data: web::Data<AppState>,
    query: web::Query<FeedQuery>,
) -> Result<HttpResponse, ServiceError> {
    let mut query = query.into_inner();
    match query.status {
        None => query.status = Some(ApprovalStatus::Approved),
        Some(ApprovalStatus::Approved) => {}
        Some(ApprovalStatus::Pending | ApprovalStatus::Rejected) => {
            require_superadmin(&req)?;
        }
    }
    let posts = data.posts.feed(&query).await?;
    Ok(HttpResponse::Ok().json(posts))
}

// GET /api/posts/pending
pub async fn get_pending_posts(
    req: HttpRequest,
    data: web::Data<AppState>,
) -> Result<HttpResponse, ServiceError> {
    require_superadmin(&req)?;
    let posts = data.posts.pending().await?;
    Ok(HttpResponse::Ok().json(posts))
}

// POST /api/posts
pub async fn create_post(
    req: HttpRequest,
    data: web::Data<AppState>,
    payload: web::Json<PostDraft>,
) -> Result<HttpResponse, ServiceError> {
    let claims = current_claims(&req)?;
    let author = data.identity.account(&claims.sub).await?;
    let post = data.posts.create(&author, payload.into_inner()).await?;
    Ok(HttpResponse::Ok().json(post))
}

// PATCH /api/posts/{post_id}/status
pub async fn update_post_status(
    req: HttpRequest,
    data: web::Data<AppState>,
    post_id: web::Path<String>,
    update: web::Json<StatusUpdate>,
) -> Result<HttpResponse, ServiceError> {
    require_superadmin(&req)?;
    let status = data
        .moderation
        .set_approval_status(EntityKind::Post, &post_id, &update.status)
        .await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "Post status updated successfully",
        "status": status,
    })))
}

// PATCH /api/posts/{post_id}
pub async fn update_post(
    req: HttpRequest,
    data: web::Data<AppState>,
    post_id: web::Path<String>,
    edit: web::Json<PostEdit>,
) -> Result<HttpResponse, ServiceError> {
    let claims = current_claims(&req)?;
    let post = data.posts.get(&post_id).await?;
    require_author(&claims, &post)?;
    let updated = data.posts.update(&post_id, edit.into_inner()).await?;
    Ok(HttpResponse::Ok().json(updated))
}

// DELETE /api/posts/{post_id}
pub async fn delete_post(
    req: HttpRequest,
    data: web::Data<AppState>,
    post_id: web::Path<String>,
) -> Result<HttpResponse, ServiceError> {
    let claims = current_claims(&req)?;
    let post = data.posts.get(&post_id).await?;
    require_author(&claims, &post)?;
    data.posts.delete(&post_id).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "message": "Post deleted successfully" })))
}
