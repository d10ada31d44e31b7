//! Password hashing, JWT issuing and the `AuthUser` extractor.

use actix_web::{dev::Payload, http::header, web, FromRequest, HttpRequest};
use futures::future::LocalBoxFuture;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use log::debug;
use mongodb::bson::oid::ObjectId;

use crate::{
    error::{AppError, AppResult},
    models::{Claims, Role, User},
    state::AppState,
};

pub fn hash_password(password: &str) -> AppResult<String> {
    Ok(bcrypt::hash(password, bcrypt::DEFAULT_COST)?)
}

/// Empty or malformed hashes never verify.
pub fn verify_password(password: &str, hash: &str) -> bool {
    if hash.is_empty() {
        return false;
    }
    bcrypt::verify(password, hash).unwrap_or(false)
}

pub fn issue_token(user_id: &ObjectId, role: Role, secret: &str, ttl_hours: i64) -> AppResult<String> {
    let now = chrono::Utc::now();
    let claims = Claims {
        sub: user_id.to_hex(),
        role,
        iat: now.timestamp() as usize,
        exp: (now + chrono::Duration::hours(ttl_hours)).timestamp() as usize,
    };
    Ok(encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?)
}

pub fn decode_token(token: &str, secret: &str) -> AppResult<Claims> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::new(Algorithm::HS256),
    )
    .map(|data| data.claims)
    .map_err(|e| {
        debug!("Token decoding failed: {:?}", e);
        AppError::Unauthorized
    })
}

/// The caller identified by the `Authorization: Bearer <jwt>` header.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: ObjectId,
    pub role: Role,
}

impl AuthUser {
    pub fn require_role(&self, allowed: &[Role]) -> AppResult<()> {
        if allowed.contains(&self.role) {
            Ok(())
        } else {
            Err(AppError::Forbidden)
        }
    }

    pub fn require_admin(&self) -> AppResult<()> {
        self.require_role(&[Role::Admin])
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Staff and admin tokens are checked against the stored account, so a
    /// deleted account or a changed role takes effect before the token expires.
    pub fn needs_account_check(&self) -> bool {
        self.role != Role::Customer
    }

    /// The caller as the stored account sees them. A missing account is unauthorized.
    pub fn with_account(self, account: Option<&User>) -> AppResult<Self> {
        let account = account.ok_or_else(|| {
            debug!("Token subject {} has no account", self.user_id.to_hex());
            AppError::Unauthorized
        })?;
        if account.role != self.role {
            debug!(
                "Token for {} claims {} but the account is {}",
                self.user_id.to_hex(),
                self.role,
                account.role
            );
        }
        Ok(AuthUser {
            user_id: self.user_id,
            role: account.role,
        })
    }

    fn from_http_request(req: &HttpRequest) -> AppResult<(Self, web::Data<AppState>)> {
        let state = req
            .app_data::<web::Data<AppState>>()
            .ok_or_else(|| AppError::Internal("application state not configured".into()))?;

        let token = req
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                debug!("Missing or malformed Authorization header");
                AppError::Unauthorized
            })?;

        let claims = decode_token(token, &state.config.jwt_secret)?;
        let user_id = ObjectId::parse_str(&claims.sub).map_err(|_| AppError::Unauthorized)?;
        Ok((
            AuthUser {
                user_id,
                role: claims.role,
            },
            state.clone(),
        ))
    }
}

impl FromRequest for AuthUser {
    type Error = AppError;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let claimed = Self::from_http_request(req);
        Box::pin(async move {
            let (user, state) = claimed?;
            if !user.needs_account_check() {
                return Ok(user);
            }
            let account = state.db.find_user(&user.user_id).await?;
            user.with_account(account.as_ref())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_round_trip_claims() {
        let user_id = ObjectId::new();
        let token = issue_token(&user_id, Role::Driver, "test-secret", 1).unwrap();
        let claims = decode_token(&token, "test-secret").unwrap();
        assert_eq!(claims.sub, user_id.to_hex());
        assert_eq!(claims.role, Role::Driver);
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn wrong_secret_is_unauthorized() {
        let token = issue_token(&ObjectId::new(), Role::Customer, "a", 1).unwrap();
        assert!(matches!(decode_token(&token, "b"), Err(AppError::Unauthorized)));
    }

    #[test]
    fn expired_token_is_unauthorized() {
        let token = issue_token(&ObjectId::new(), Role::Customer, "secret", -2).unwrap();
        assert!(matches!(decode_token(&token, "secret"), Err(AppError::Unauthorized)));
    }

    #[test]
    fn password_hashes_verify() {
        let hash = bcrypt::hash("hunter22!", 4).unwrap();
        assert!(verify_password("hunter22!", &hash));
        assert!(!verify_password("hunter23!", &hash));
        assert!(!verify_password("anything", ""));
    }

    #[test]
    fn role_gate() {
        let user = AuthUser {
            user_id: ObjectId::new(),
            role: Role::Guide,
        };
        assert!(user.require_role(&[Role::Driver, Role::Guide]).is_ok());
        assert!(matches!(user.require_admin(), Err(AppError::Forbidden)));
    }

    fn account(role: Role) -> User {
        User {
            id: Some(ObjectId::new()),
            name: "Kasun".into(),
            email: "kasun@example.com".into(),
            password: String::new(),
            role,
            phone: None,
            created_at: mongodb::bson::DateTime::now(),
            updated_at: mongodb::bson::DateTime::now(),
        }
    }

    #[test]
    fn privileged_tokens_follow_the_stored_account() {
        let claimed = AuthUser {
            user_id: ObjectId::new(),
            role: Role::Admin,
        };
        assert!(claimed.needs_account_check());

        let demoted = claimed.clone().with_account(Some(&account(Role::Customer))).unwrap();
        assert_eq!(demoted.role, Role::Customer);
        assert_eq!(demoted.user_id, claimed.user_id);
        assert!(matches!(demoted.require_admin(), Err(AppError::Forbidden)));

        assert!(matches!(claimed.with_account(None), Err(AppError::Unauthorized)));
    }

    #[test]
    fn customer_tokens_skip_the_account_lookup() {
        let user = AuthUser {
            user_id: ObjectId::new(),
            role: Role::Customer,
        };
        assert!(!user.needs_account_check());
    }
}
