use axum::{extract::State, response::Json};
use model::entities::user;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use validator::Validate;

use super::users::UserResponse;
use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::extract::ValidatedJson;
use crate::schemas::{ApiResponse, AppState, ErrorResponse, ok};

#[derive(Debug, Deserialize, Serialize, ToSchema, Validate)]
pub struct LoginRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1))]
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LoginResponse {
    /// Bearer token for the `Authorization` header
    pub token: String,
    pub user: UserResponse,
}

/// Exchange credentials for a session token
#[utoipa::path(
    post,
    path = "/api/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Authenticated", body = ApiResponse<LoginResponse>),
        (status = 401, description = "Wrong password", body = ErrorResponse),
        (status = 403, description = "Inactive account or pending approval", body = ErrorResponse),
        (status = 404, description = "Unknown email", body = ErrorResponse)
    )
)]
#[instrument(skip(state, request), fields(email = %request.email))]
pub async fn login(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<LoginRequest>,
) -> ApiResult<Json<ApiResponse<LoginResponse>>> {
    let email = request.email.trim().to_lowercase();
    let found = user::Entity::find()
        .filter(user::Column::Email.eq(email))
        .one(&state.db)
        .await?
        .ok_or_else(|| ApiError::NotFound("Usuario no encontrado".to_string()))?;

    if !state.passwords.verify(&request.password, &found.password)? {
        warn!(user_id = %found.id, "Wrong password");
        return Err(ApiError::Unauthorized("Contraseña incorrecta".to_string()));
    }
    if !found.is_active() {
        return Err(ApiError::Forbidden("Usuario inactivo".to_string()));
    }
    if found.pending_admin {
        return Err(ApiError::Forbidden(
            "Tu solicitud de administrador está pendiente de aprobación".to_string(),
        ));
    }

    let token = state.tokens.issue(&found)?;
    info!(user_id = %found.id, "User logged in");
    Ok(ok(
        LoginResponse {
            token,
            user: UserResponse::from(found),
        },
        "Inicio de sesión exitoso",
    ))
}

/// Validate the token and return the caller's profile
#[utoipa::path(
    get,
    path = "/api/auth/me",
    tag = "auth",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Token is valid", body = ApiResponse<UserResponse>),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse)
    )
)]
#[instrument(skip(auth))]
pub async fn me(auth: AuthUser) -> ApiResult<Json<ApiResponse<UserResponse>>> {
    Ok(ok(UserResponse::from(auth.0), "Token válido"))
}
