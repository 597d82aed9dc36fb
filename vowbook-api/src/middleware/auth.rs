use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use vowbook_core::{Caller, CoreError, Role};

use crate::error::AppError;
use crate::state::AppState;

/// Claims issued by the identity provider. Vendor tokens carry the vendor
/// id as `sub`.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String,
    pub role: String,
    pub exp: usize,
}

pub fn authenticate(token: &str, secret: &str) -> Result<Caller, CoreError> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| CoreError::Auth(e.to_string()))?;

    let claims = token_data.claims;
    let role: Role = claims.role.parse()?;
    if role == Role::Vendor && Uuid::parse_str(&claims.sub).is_err() {
        return Err(CoreError::Auth("vendor subject must be a vendor id".to_string()));
    }
    Ok(Caller::new(claims.sub, role))
}

/// Rejects requests without a valid bearer token and puts the `Caller` in
/// the request extensions.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let caller = {
        let token = req
            .headers()
            .get(AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .and_then(|h| h.strip_prefix("Bearer "))
            .ok_or_else(|| CoreError::Auth("missing bearer token".to_string()))?;
        authenticate(token, &state.auth.secret)?
    };

    req.extensions_mut().insert(caller);
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    fn token(sub: &str, role: &str, exp: usize) -> String {
        let claims = Claims { sub: sub.to_string(), role: role.to_string(), exp };
        encode(&Header::default(), &claims, &EncodingKey::from_secret(b"secret")).unwrap()
    }

    fn later() -> usize {
        (chrono::Utc::now().timestamp() + 3600) as usize
    }

    #[test]
    fn test_valid_token_yields_caller() {
        let caller = authenticate(&token("user-1", "CUSTOMER", later()), "secret").unwrap();
        assert_eq!(caller, Caller::customer("user-1"));
    }

    #[test]
    fn test_rejects_bad_tokens() {
        assert!(matches!(authenticate(&token("u", "CUSTOMER", later()), "other"), Err(CoreError::Auth(_))));
        assert!(matches!(authenticate(&token("u", "CUSTOMER", 1), "secret"), Err(CoreError::Auth(_))));
        assert!(matches!(authenticate(&token("u", "PLANNER", later()), "secret"), Err(CoreError::Auth(_))));
        assert!(matches!(authenticate(&token("not-a-uuid", "VENDOR", later()), "secret"), Err(CoreError::Auth(_))));
    }
}
