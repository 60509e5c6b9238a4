use axum::{extract::FromRequestParts, http::header};
use jsonwebtoken::{DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};

use crate::{error::AppError, models::Customer};

pub const ROLE_CUSTOMER: &str = "customer";

/// Bearer token payload. `sub` carries the numeric customer id.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub role: String,
    #[serde(default)]
    pub segment_id: Option<i64>,
    pub exp: usize,
}

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub customer_id: i64,
    pub role: String,
    pub segment_id: Option<i64>,
}

impl AuthUser {
    pub fn customer(&self) -> Customer {
        Customer {
            id: self.customer_id,
            segment_id: self.segment_id,
        }
    }
}

pub fn ensure_customer(user: &AuthUser) -> Result<Customer, AppError> {
    if user.role != ROLE_CUSTOMER {
        return Err(AppError::Forbidden);
    }
    Ok(user.customer())
}

impl TryFrom<Claims> for AuthUser {
    type Error = AppError;

    fn try_from(claims: Claims) -> Result<Self, Self::Error> {
        let customer_id = claims
            .sub
            .parse::<i64>()
            .map_err(|_| AppError::BadRequest("Invalid customer id in token".into()))?;
        Ok(AuthUser {
            customer_id,
            role: claims.role,
            segment_id: claims.segment_id,
        })
    }
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;
    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        _state: &S,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(header::AUTHORIZATION)
            .ok_or_else(|| AppError::BadRequest("Missing Authorization header".into()))?;

        let auth_str = auth_header
            .to_str()
            .map_err(|_| AppError::BadRequest("Invalid Authorization header".into()))?;

        let token = auth_str
            .strip_prefix("Bearer ")
            .ok_or_else(|| AppError::BadRequest("Invalid Authorization scheme".into()))?
            .trim();

        let secret = std::env::var("JWT_SECRET")
            .map_err(|_| AppError::Internal(anyhow::anyhow!("JWT_SECRET is not set")))?;

        let decoded = decode::<Claims>(
            token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &Validation::default(),
        )
        .map_err(|_| AppError::BadRequest("Invalid or expired token".into()))?;

        AuthUser::try_from(decoded.claims)
    }
}
