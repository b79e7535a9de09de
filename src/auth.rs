//! Session tokens, password hashing and the authenticated-user extractor.

use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use axum::{extract::FromRequestParts, http::header::AUTHORIZATION, http::request::Parts};
use chrono::{Duration, Utc};
use jsonwebtoken::{
    Algorithm as JwtAlgorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode,
};
use model::entities::user::{self, Role};
use sea_orm::EntityTrait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::ApiError;
use crate::schemas::AppState;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Claims {
    pub sub: Uuid,
    pub email: String,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
}

/// Issues and checks HS256 tokens.
#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl: Duration,
}

impl TokenService {
    pub fn new(secret: &str, hours: i64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            ttl: Duration::hours(hours),
        }
    }

    pub fn issue(&self, user: &user::Model) -> Result<String, ApiError> {
        let now = Utc::now();
        let claims = Claims {
            sub: user.id,
            email: user.email.clone(),
            role: user.role,
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };
        encode(&Header::new(JwtAlgorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| ApiError::internal(format!("Failed to encode token: {e}")))
    }

    pub fn verify(&self, token: &str) -> Result<Claims, ApiError> {
        let validation = Validation::new(JwtAlgorithm::HS256);
        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| {
                debug!("Rejected token: {e}");
                ApiError::Unauthorized("Token inválido o expirado".to_string())
            })
    }
}

/// Argon2id hashing with configurable cost.
#[derive(Clone)]
pub struct PasswordService {
    argon2: Argon2<'static>,
}

impl PasswordService {
    pub fn new(memory_kib: u32, iterations: u32) -> anyhow::Result<Self> {
        let params = Params::new(memory_kib, iterations, 1, None)
            .map_err(|e| anyhow::anyhow!("Invalid Argon2 parameters: {e}"))?;
        Ok(Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        })
    }

    pub fn hash(&self, password: &str) -> Result<String, ApiError> {
        let salt = SaltString::generate(&mut OsRng);
        self.argon2
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| ApiError::internal(format!("Failed to hash password: {e}")))
    }

    pub fn verify(&self, password: &str, hash: &str) -> Result<bool, ApiError> {
        let parsed = PasswordHash::new(hash)
            .map_err(|e| ApiError::internal(format!("Invalid password hash format: {e}")))?;
        match self.argon2.verify_password(password.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(ApiError::internal(format!("Password verification failed: {e}"))),
        }
    }
}

pub fn extract_bearer_token(header: &str) -> Option<&str> {
    header
        .strip_prefix("Bearer ")
        .or_else(|| header.strip_prefix("bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// The caller, as currently stored.
///
/// The token only identifies the user: the row is read again on every
/// request so role changes and deactivation take effect immediately.
#[derive(Debug, Clone)]
pub struct AuthUser(pub user::Model);

#[axum::async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| ApiError::Unauthorized("Token requerido".to_string()))?;
        let token = extract_bearer_token(header)
            .ok_or_else(|| ApiError::Unauthorized("Token requerido".to_string()))?;
        let claims = state.tokens.verify(token)?;

        let user = user::Entity::find_by_id(claims.sub)
            .one(&state.db)
            .await?
            .ok_or_else(|| {
                warn!(user_id = %claims.sub, "Token of a deleted user");
                ApiError::Unauthorized("Usuario no encontrado".to_string())
            })?;

        if !user.is_active() {
            return Err(ApiError::Forbidden("Usuario inactivo".to_string()));
        }
        Ok(Self(user))
    }
}

impl AuthUser {
    /// The caller, provided they currently hold one of `roles`.
    pub fn require(&self, roles: &[Role]) -> Result<&user::Model, ApiError> {
        if roles.contains(&self.0.role) {
            Ok(&self.0)
        } else {
            Err(ApiError::Forbidden(
                "No tienes permisos para realizar esta acción".to_string(),
            ))
        }
    }

    pub fn id(&self) -> Uuid {
        self.0.id
    }

    pub fn is(&self, role: Role) -> bool {
        self.0.role == role
    }
}
