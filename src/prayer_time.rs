use actix_web::{web, HttpRequest, HttpResponse};
use serde::Deserialize;

use crate::app_state::AppState;
use crate::auth::{current_claims, require_mosque_authority};
use crate::error::ServiceError;
use crate::services::prayer_times::ManualTimes;

#[derive(Debug, Deserialize)]
pub struct PrayerTimeQuery {
    pub date: String,
}

// GET /api/prayer-times/{mosque_id}?date=YYYY-MM-DD
pub async fn get_prayer_times(
    data: web::Data<AppState>,
    mosque_id: web::Path<String>,
    query: web::Query<PrayerTimeQuery>,
) -> Result<HttpResponse, ServiceError> {
    let record = data.prayer_times.resolve(&mosque_id, &query.date).await?;
    Ok(HttpResponse::Ok().json(record))
}

// POST /api/prayer-times
pub async fn set_manual_prayer_times(
    req: HttpRequest,
    data: web::Data<AppState>,
    payload: web::Json<ManualTimes>,
) -> Result<HttpResponse, ServiceError> {
    let claims = current_claims(&req)?;
    require_mosque_authority(&data, &claims, &payload.mosque_id).await?;
    let record = data.prayer_times.set_manual(payload.into_inner()).await?;
    Ok(HttpResponse::Ok().json(record))
}
