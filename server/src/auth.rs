use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::errors::ApiMessage;
use crate::models::{Account, Role};
use crate::state::{AppState, AuthConfig};

/// Claim set carried by every issued token. Produced only at login; the
/// account manager itself never inspects tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Account id.
    pub sub: Uuid,
    /// Username at issuance time.
    pub name: String,
    pub email: String,
    pub role: Role,
    /// Fresh per-token identifier.
    pub jti: Uuid,
    pub iss: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
}

/// Sign a claim set for an authenticated account.
pub fn issue_token(
    config: &AuthConfig,
    account: &Account,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = Utc::now();
    let claims = Claims {
        sub: account.id,
        name: account.username.clone(),
        email: account.email.clone(),
        role: account.role,
        jti: Uuid::new_v4(),
        iss: config.issuer.clone(),
        aud: config.audience.clone(),
        iat: now.timestamp(),
        exp: (now + config.lifetime).timestamp(),
    };
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(config.key.as_bytes()),
    )
}

/// Verify signature, issuer, audience, and lifetime, returning the claims.
pub fn verify_token(
    config: &AuthConfig,
    token: &str,
) -> Result<Claims, jsonwebtoken::errors::Error> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[&config.issuer]);
    validation.set_audience(&[&config.audience]);
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.key.as_bytes()),
        &validation,
    )?;
    Ok(data.claims)
}

/// Extract the verified caller from the `Authorization: Bearer` header.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub claims: Claims,
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header_value = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok());

        let token = match header_value.and_then(|v| v.strip_prefix("Bearer ")) {
            Some(token) => token,
            None => {
                info!("request without bearer token");
                return Err(unauthorized("missing bearer token"));
            }
        };

        match verify_token(&state.auth, token) {
            Ok(claims) => Ok(AuthUser { claims }),
            Err(err) => {
                info!(error = %err, "rejected bearer token");
                Err(unauthorized("invalid or expired token"))
            }
        }
    }
}

fn unauthorized(message: &str) -> Response {
    (StatusCode::UNAUTHORIZED, Json(ApiMessage::new(message))).into_response()
}
