use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts},
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use hearth_core::error::AppError;

use crate::startup::AppState;

/// Verifies bearer tokens minted by the identity service. HS256 with a
/// shared secret; this service never issues tokens itself.
#[derive(Clone)]
pub struct JwtVerifier {
    decoding_key: DecodingKey,
}

/// Claims carried by an access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,
    /// Organization the token is scoped to
    pub org: Option<Uuid>,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at (Unix timestamp)
    pub iat: i64,
}

impl JwtVerifier {
    pub fn new(secret: &str) -> Self {
        Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    /// Validate and decode an access token.
    pub fn verify(&self, token: &str) -> Result<Claims, AppError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;

        let token_data = decode::<Claims>(token, &self.decoding_key, &validation)?;

        Ok(token_data.claims)
    }
}

/// Organization context for authenticated requests. Every data access is
/// scoped by `organization_id`; handlers take this instead of reading any
/// identifier from the request body.
#[derive(Debug, Clone)]
pub struct OrgContext {
    pub organization_id: Uuid,
    pub user_id: String,
}

/// Middleware to require authentication with an organization-scoped token.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or_else(|| {
            AppError::Unauthorized(anyhow::anyhow!("Missing or invalid Authorization header"))
        })?;

    let claims = state.jwt.verify(token)?;

    let organization_id = claims.org.ok_or_else(|| {
        AppError::Forbidden(anyhow::anyhow!("Token carries no organization claim"))
    })?;

    // Store the context in request extensions so handlers can extract it
    req.extensions_mut().insert(OrgContext {
        organization_id,
        user_id: claims.sub,
    });

    Ok(next.run(req).await)
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for OrgContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<OrgContext>()
            .cloned()
            .ok_or_else(|| {
                AppError::InternalError(anyhow::anyhow!(
                    "Organization context missing from request extensions"
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use jsonwebtoken::{encode, EncodingKey, Header};

    fn mint(secret: &str, org: Option<Uuid>, offset_secs: i64) -> String {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: "user-1".to_string(),
            org,
            exp: now + offset_secs,
            iat: now,
        };
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn verifies_a_valid_token() {
        let org = Uuid::new_v4();
        let verifier = JwtVerifier::new("test-secret");
        let token = mint("test-secret", Some(org), 600);

        let claims = verifier.verify(&token).unwrap();
        assert_eq!(claims.sub, "user-1");
        assert_eq!(claims.org, Some(org));
    }

    #[test]
    fn rejects_an_expired_token() {
        let verifier = JwtVerifier::new("test-secret");
        let token = mint("test-secret", Some(Uuid::new_v4()), -600);

        assert!(verifier.verify(&token).is_err());
    }

    #[test]
    fn rejects_a_token_signed_with_another_secret() {
        let verifier = JwtVerifier::new("test-secret");
        let token = mint("other-secret", Some(Uuid::new_v4()), 600);

        assert!(verifier.verify(&token).is_err());
    }

    #[test]
    fn accepts_a_token_without_an_org_claim() {
        // The middleware turns a missing org into 403; the verifier itself
        // only checks signature and expiry.
        let verifier = JwtVerifier::new("test-secret");
        let token = mint("test-secret", None, 600);

        let claims = verifier.verify(&token).unwrap();
        assert!(claims.org.is_none());
    }
}
