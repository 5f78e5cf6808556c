use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use actix_web::{
    body::{BoxBody, MessageBody},
    dev::{Service, ServiceRequest, ServiceResponse, Transform},
    http, web, Error, HttpMessage, HttpRequest, HttpResponse, ResponseError,
};
use chrono::{Duration, Utc};
use futures::future::{ok, Ready};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use log::info;
use serde::{Deserialize, Serialize};

use crate::app_state::AppState;
use crate::error::ServiceError;
use crate::models::Role;
use crate::services::identity::Registration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub role: Role,
    pub exp: usize,
}

#[derive(Deserialize)]
pub struct LoginInfo {
    pub email: String,
    pub password: String,
}

// JWT Creation
pub fn create_jwt(user_id: &str, role: Role, secret: &str) -> Result<String, ServiceError> {
    let expiration = Utc::now() + Duration::hours(24);
    let claims = Claims {
        sub: user_id.to_string(),
        role,
        exp: expiration.timestamp() as usize,
    };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_ref()))
        .map_err(|e| ServiceError::Internal(format!("token encoding failed: {}", e)))
}

// JWT Validation
pub fn validate_jwt(token: &str, secret: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_ref()),
        &Validation::default(),
    )?;
    Ok(token_data.claims)
}

/// Decodes `Authorization: Bearer` tokens into request `Claims`.
/// Requests without a token pass through; handlers decide whether they need one.
#[derive(Debug, Clone)]
pub struct Authentication {
    secret: String,
}

impl Authentication {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for Authentication
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type Transform = AuthMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(AuthMiddleware {
            service,
            secret: self.secret.clone(),
        })
    }
}

pub struct AuthMiddleware<S> {
    service: S,
    secret: String,
}

impl<S, B> Service<ServiceRequest> for AuthMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    fn poll_ready(&self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.service.poll_ready(cx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let bearer = req
            .headers()
            .get(http::header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(|token| token.trim().to_string());

        if let Some(token) = bearer {
            match validate_jwt(&token, &self.secret) {
                Ok(claims) => {
                    req.extensions_mut().insert(claims);
                }
                Err(_) => {
                    let (req_parts, _payload) = req.into_parts();
                    let resp = ServiceError::Unauthorized.error_response();
                    let srv_resp = ServiceResponse::new(req_parts, resp);
                    return Box::pin(async move { Ok(srv_resp) });
                }
            }
        }

        let fut = self.service.call(req);
        Box::pin(async move {
            let res = fut.await?;
            Ok(res.map_into_boxed_body())
        })
    }
}

pub fn current_claims(req: &HttpRequest) -> Result<Claims, ServiceError> {
    req.extensions()
        .get::<Claims>()
        .cloned()
        .ok_or(ServiceError::Unauthorized)
}

pub fn require_superadmin(req: &HttpRequest) -> Result<Claims, ServiceError> {
    let claims = current_claims(req)?;
    match claims.role {
        Role::Superadmin => Ok(claims),
        Role::Regular | Role::MosqueAdmin => Err(ServiceError::Forbidden("superadmin only")),
    }
}

/// Superadmins act on any mosque; a mosque admin only on their own, and only once approved.
pub async fn require_mosque_authority(
    data: &AppState,
    claims: &Claims,
    mosque_id: &str,
) -> Result<(), ServiceError> {
    match claims.role {
        Role::Superadmin => Ok(()),
        Role::MosqueAdmin => {
            let account = data.identity.account(&claims.sub).await?;
            if account.is_approved_admin() && account.mosque_id.as_deref() == Some(mosque_id) {
                Ok(())
            } else {
                Err(ServiceError::Forbidden("not an admin of this mosque"))
            }
        }
        Role::Regular => Err(ServiceError::Forbidden("not an admin of this mosque")),
    }
}

// POST /api/auth/register
pub async fn register(
    data: web::Data<AppState>,
    registration: web::Json<Registration>,
) -> Result<HttpResponse, ServiceError> {
    let account = data.identity.register(registration.into_inner()).await?;
    Ok(HttpResponse::Ok().json(account))
}

// POST /api/auth/login
pub async fn login(
    data: web::Data<AppState>,
    login_info: web::Json<LoginInfo>,
) -> Result<HttpResponse, ServiceError> {
    let account = data
        .identity
        .login(&login_info.email, &login_info.password)
        .await?;
    let token = create_jwt(&account.id, account.role, &data.config.jwt_secret)?;
    info!("Account {} logged in", account.id);
    Ok(HttpResponse::Ok().json(serde_json::json!({ "token": token, "user": account })))
}
