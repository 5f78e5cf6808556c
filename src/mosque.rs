use actix_web::{web, HttpRequest, HttpResponse};
use serde::Deserialize;

use crate::app_state::AppState;
use crate::auth::{current_claims, require_mosque_authority, require_superadmin};
use crate::error::ServiceError;
use crate::models::NewMosque;
use crate::services::mosques::MosqueQuery;

#[derive(Debug, Deserialize)]
pub struct DonationQrUpload {
    /// Base64 image bytes.
    pub file: String,
}

// GET /api/mosques
pub async fn list_mosques(
    data: web::Data<AppState>,
    query: web::Query<MosqueQuery>,
) -> Result<HttpResponse, ServiceError> {
    let mosques = data.mosques.list(&query).await?;
    Ok(HttpResponse::Ok().json(mosques))
}

// GET /api/mosques/{mosque_id}
pub async fn get_mosque(
    data: web::Data<AppState>,
    mosque_id: web::Path<String>,
) -> Result<HttpResponse, ServiceError> {
    let mosque = data.mosques.require(&mosque_id).await?;
    Ok(HttpResponse::Ok().json(mosque))
}

// POST /api/mosques
pub async fn create_mosque(
    req: HttpRequest,
    data: web::Data<AppState>,
    payload: web::Json<NewMosque>,
) -> Result<HttpResponse, ServiceError> {
    require_superadmin(&req)?;
    let mosque = data.mosques.create(payload.into_inner()).await?;
    Ok(HttpResponse::Ok().json(mosque))
}

// POST /api/mosques/{mosque_id}/donation-qr
pub async fn upload_donation_qr(
    req: HttpRequest,
    data: web::Data<AppState>,
    mosque_id: web::Path<String>,
    upload: web::Json<DonationQrUpload>,
) -> Result<HttpResponse, ServiceError> {
    let claims = current_claims(&req)?;
    require_mosque_authority(&data, &claims, &mosque_id).await?;
    data.mosques.set_donation_qr(&mosque_id, &upload.file).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "Donation QR code uploaded successfully"
    })))
}
