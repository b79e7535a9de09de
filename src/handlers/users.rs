use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use axum_valid::Valid;
use chrono::{DateTime, NaiveDate, Utc};
use compute::notify::{Notification, Recipient};
use model::entities::user::{self, Role, UserState};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, IntoActiveModel, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument, warn};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use super::rules::{digits_only, document_type, letters_only};
use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::extract::ValidatedJson;
use crate::schemas::{ApiResponse, AppState, ErrorResponse, ok};

/// Request body for self-registration
#[derive(Debug, Deserialize, Serialize, ToSchema, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 1, max = 100), custom(function = "letters_only"))]
    pub name: String,
    #[validate(length(min = 1, max = 100), custom(function = "letters_only"))]
    pub lastname: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 8, message = "la contraseña debe tener al menos 8 caracteres"))]
    pub password: String,
    #[validate(length(max = 20), custom(function = "digits_only"))]
    pub phone: String,
    /// One of `CC`, `TI`, `CE`, `PP`, `NIT`
    #[validate(custom(function = "document_type"))]
    pub document_type: String,
    #[validate(length(max = 20), custom(function = "digits_only"))]
    pub document: String,
    pub birth_date: NaiveDate,
    /// Requested role. `admin` is recorded as a pending request.
    pub role: Option<Role>,
}

/// Request body for updating a user. Absent fields are left unchanged.
#[derive(Debug, Default, Deserialize, Serialize, ToSchema, Validate)]
pub struct UpdateUserRequest {
    #[validate(length(min = 1, max = 100), custom(function = "letters_only"))]
    pub name: Option<String>,
    #[validate(length(min = 1, max = 100), custom(function = "letters_only"))]
    pub lastname: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(min = 8, message = "la contraseña debe tener al menos 8 caracteres"))]
    pub password: Option<String>,
    #[validate(length(max = 20), custom(function = "digits_only"))]
    pub phone: Option<String>,
    pub birth_date: Option<NaiveDate>,
    /// Only administrators may change roles.
    pub role: Option<Role>,
}

#[derive(Debug, Deserialize, ToSchema, IntoParams, Validate)]
pub struct PageQuery {
    /// Page number (default: 1)
    #[validate(range(min = 1, max = 10000))]
    pub page: Option<u64>,
    /// Page size (default: 50)
    #[validate(range(min = 1, max = 1000))]
    pub limit: Option<u64>,
    /// Filter by role
    pub role: Option<Role>,
}

/// User response model. Never carries the password hash.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UserResponse {
    pub id: Uuid,
    pub name: String,
    pub lastname: String,
    pub email: String,
    pub phone: String,
    pub document_type: String,
    pub document: String,
    pub birth_date: NaiveDate,
    pub role: Role,
    pub state: UserState,
    pub pending_admin: bool,
    pub created_at: DateTime<Utc>,
}

impl From<user::Model> for UserResponse {
    fn from(model: user::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            lastname: model.lastname,
            email: model.email,
            phone: model.phone,
            document_type: model.document_type,
            document: model.document,
            birth_date: model.birth_date,
            role: model.role,
            state: model.state,
            pending_admin: model.pending_admin,
            created_at: model.created_at,
        }
    }
}

async fn find_user(state: &AppState, user_id: Uuid) -> ApiResult<user::Model> {
    user::Entity::find_by_id(user_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| ApiError::NotFound("Usuario no encontrado".to_string()))
}

async fn ensure_email_free(state: &AppState, email: &str, except: Option<Uuid>) -> ApiResult<()> {
    let mut query = user::Entity::find().filter(user::Column::Email.eq(email));
    if let Some(id) = except {
        query = query.filter(user::Column::Id.ne(id));
    }
    if query.one(&state.db).await?.is_some() {
        return Err(ApiError::rule("EMAIL_ALREADY_EXISTS", "El correo ya está registrado"));
    }
    Ok(())
}

/// Register a new user
#[utoipa::path(
    post,
    path = "/api/users",
    tag = "users",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User created successfully", body = ApiResponse<UserResponse>),
        (status = 400, description = "Invalid request or duplicate user", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state, request), fields(email = %request.email))]
pub async fn register(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<ApiResponse<UserResponse>>)> {
    let email = request.email.trim().to_lowercase();
    ensure_email_free(&state, &email, None).await?;

    let document_taken = user::Entity::find()
        .filter(user::Column::DocumentType.eq(request.document_type.as_str()))
        .filter(user::Column::Document.eq(request.document.as_str()))
        .one(&state.db)
        .await?
        .is_some();
    if document_taken {
        return Err(ApiError::rule(
            "DOCUMENT_ALREADY_EXISTS",
            "El documento ya está registrado",
        ));
    }

    let requested = request.role.unwrap_or(Role::Student);
    let (role, pending_admin) = match requested {
        Role::Admin => (Role::Student, true),
        other => (other, false),
    };
    if pending_admin {
        info!("Administrator role requested, stored as pending");
    }

    let now = Utc::now();
    let created = user::ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(request.name.trim().to_string()),
        lastname: Set(request.lastname.trim().to_string()),
        email: Set(email),
        password: Set(state.passwords.hash(&request.password)?),
        phone: Set(request.phone),
        document_type: Set(request.document_type),
        document: Set(request.document),
        birth_date: Set(request.birth_date),
        role: Set(role),
        state: Set(UserState::Active),
        pending_admin: Set(pending_admin),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(&state.db)
    .await?;

    info!(user_id = %created.id, role = role.as_str(), "User registered");
    let message = if pending_admin {
        "Usuario creado, la solicitud de administrador está pendiente de aprobación"
    } else {
        "Usuario creado exitosamente"
    };
    Ok((StatusCode::CREATED, ok(UserResponse::from(created), message)))
}

/// Get all users
#[utoipa::path(
    get,
    path = "/api/users",
    tag = "users",
    params(PageQuery),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Users retrieved successfully", body = ApiResponse<Vec<UserResponse>>),
        (status = 403, description = "Not an administrator", body = ErrorResponse)
    )
)]
#[instrument(skip(state, auth))]
pub async fn get_users(
    State(state): State<AppState>,
    auth: AuthUser,
    Valid(Query(query)): Valid<Query<PageQuery>>,
) -> ApiResult<Json<ApiResponse<Vec<UserResponse>>>> {
    auth.require(&[Role::Admin])?;

    let page = query.page.unwrap_or(1);
    let limit = query.limit.unwrap_or(50);
    debug!("Fetching users - page: {}, limit: {}", page, limit);

    let mut select = user::Entity::find();
    if let Some(role) = query.role {
        select = select.filter(user::Column::Role.eq(role));
    }
    let users = select
        .order_by_asc(user::Column::Lastname)
        .order_by_asc(user::Column::Name)
        .paginate(&state.db, limit)
        .fetch_page(page - 1)
        .await?;

    let data: Vec<UserResponse> = users.into_iter().map(UserResponse::from).collect();
    info!("Retrieved {} users", data.len());
    Ok(ok(data, "Usuarios obtenidos exitosamente"))
}

/// Get a user by ID
#[utoipa::path(
    get,
    path = "/api/users/{user_id}",
    tag = "users",
    params(("user_id" = Uuid, Path, description = "User ID")),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "User retrieved successfully", body = ApiResponse<UserResponse>),
        (status = 403, description = "Neither the user nor an administrator", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state, auth))]
pub async fn get_user(
    Path(user_id): Path<Uuid>,
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<Json<ApiResponse<UserResponse>>> {
    if auth.id() != user_id {
        auth.require(&[Role::Admin])?;
    }
    let found = find_user(&state, user_id).await?;
    Ok(ok(UserResponse::from(found), "Usuario obtenido exitosamente"))
}

/// Update a user
#[utoipa::path(
    put,
    path = "/api/users/{user_id}",
    tag = "users",
    params(("user_id" = Uuid, Path, description = "User ID")),
    request_body = UpdateUserRequest,
    security(("bearer" = [])),
    responses(
        (status = 200, description = "User updated successfully", body = ApiResponse<UserResponse>),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 403, description = "Neither the user nor an administrator", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state, auth, request))]
pub async fn update_user(
    Path(user_id): Path<Uuid>,
    State(state): State<AppState>,
    auth: AuthUser,
    ValidatedJson(request): ValidatedJson<UpdateUserRequest>,
) -> ApiResult<Json<ApiResponse<UserResponse>>> {
    let is_admin = auth.is(Role::Admin);
    if auth.id() != user_id && !is_admin {
        return Err(ApiError::Forbidden(
            "Solo puedes editar tu propio perfil".to_string(),
        ));
    }
    if request.role.is_some() && !is_admin {
        return Err(ApiError::Forbidden(
            "Solo un administrador puede cambiar roles".to_string(),
        ));
    }

    let existing = find_user(&state, user_id).await?;
    let mut active = existing.into_active_model();

    if let Some(email) = request.email {
        let email = email.trim().to_lowercase();
        ensure_email_free(&state, &email, Some(user_id)).await?;
        active.email = Set(email);
    }
    if let Some(name) = request.name {
        active.name = Set(name.trim().to_string());
    }
    if let Some(lastname) = request.lastname {
        active.lastname = Set(lastname.trim().to_string());
    }
    if let Some(password) = request.password {
        active.password = Set(state.passwords.hash(&password)?);
    }
    if let Some(phone) = request.phone {
        active.phone = Set(phone);
    }
    if let Some(birth_date) = request.birth_date {
        active.birth_date = Set(birth_date);
    }
    if let Some(role) = request.role {
        active.role = Set(role);
        if role == Role::Admin {
            active.pending_admin = Set(false);
        }
    }
    active.updated_at = Set(Utc::now());

    let updated = active.update(&state.db).await?;
    info!(user_id = %updated.id, "User updated");
    Ok(ok(UserResponse::from(updated), "Usuario actualizado exitosamente"))
}

/// Toggle a user between active and inactive
#[utoipa::path(
    patch,
    path = "/api/users/{user_id}/state",
    tag = "users",
    params(("user_id" = Uuid, Path, description = "User ID")),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "State toggled", body = ApiResponse<UserResponse>),
        (status = 403, description = "Not an administrator", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state, auth))]
pub async fn toggle_user_state(
    Path(user_id): Path<Uuid>,
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<Json<ApiResponse<UserResponse>>> {
    auth.require(&[Role::Admin])?;
    if auth.id() == user_id {
        return Err(ApiError::rule(
            "CANNOT_CHANGE_OWN_STATE",
            "No puedes desactivar tu propia cuenta",
        ));
    }

    let existing = find_user(&state, user_id).await?;
    let next = existing.state.toggled();
    let mut active = existing.into_active_model();
    active.state = Set(next);
    active.updated_at = Set(Utc::now());
    let updated = active.update(&state.db).await?;

    info!(user_id = %updated.id, state = ?updated.state, "User state changed");
    Ok(ok(UserResponse::from(updated), "Estado del usuario actualizado"))
}

/// Delete a user
#[utoipa::path(
    delete,
    path = "/api/users/{user_id}",
    tag = "users",
    params(("user_id" = Uuid, Path, description = "User ID")),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "User deleted successfully"),
        (status = 400, description = "User still referenced", body = ErrorResponse),
        (status = 403, description = "Not an administrator", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state, auth))]
pub async fn delete_user(
    Path(user_id): Path<Uuid>,
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<Json<ApiResponse<()>>> {
    auth.require(&[Role::Admin])?;
    if auth.id() == user_id {
        return Err(ApiError::rule(
            "CANNOT_DELETE_SELF",
            "No puedes eliminar tu propia cuenta",
        ));
    }

    let result = user::Entity::delete_by_id(user_id).exec(&state.db).await?;
    if result.rows_affected == 0 {
        warn!("User with ID {} not found for deletion", user_id);
        return Err(ApiError::NotFound("Usuario no encontrado".to_string()));
    }

    info!("User with ID {} deleted", user_id);
    Ok(ok((), "Usuario eliminado exitosamente"))
}

/// List pending administrator requests
#[utoipa::path(
    get,
    path = "/api/users/pending-admins",
    tag = "users",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Pending requests", body = ApiResponse<Vec<UserResponse>>),
        (status = 403, description = "Not an administrator", body = ErrorResponse)
    )
)]
#[instrument(skip(state, auth))]
pub async fn get_pending_admins(
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<Json<ApiResponse<Vec<UserResponse>>>> {
    auth.require(&[Role::Admin])?;

    let pending = user::Entity::find()
        .filter(user::Column::PendingAdmin.eq(true))
        .order_by_asc(user::Column::CreatedAt)
        .all(&state.db)
        .await?;

    let data: Vec<UserResponse> = pending.into_iter().map(UserResponse::from).collect();
    Ok(ok(data, "Solicitudes pendientes obtenidas"))
}

async fn pending_request(state: &AppState, user_id: Uuid) -> ApiResult<user::Model> {
    let found = find_user(state, user_id).await?;
    if !found.pending_admin {
        return Err(ApiError::rule(
            "NO_PENDING_REQUEST",
            "El usuario no tiene una solicitud de administrador pendiente",
        ));
    }
    Ok(found)
}

/// Approve an administrator request
#[utoipa::path(
    post,
    path = "/api/users/{user_id}/approve-admin",
    tag = "users",
    params(("user_id" = Uuid, Path, description = "User ID")),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Request approved", body = ApiResponse<UserResponse>),
        (status = 400, description = "No pending request", body = ErrorResponse),
        (status = 403, description = "Not an administrator", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state, auth))]
pub async fn approve_admin(
    Path(user_id): Path<Uuid>,
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<Json<ApiResponse<UserResponse>>> {
    auth.require(&[Role::Admin])?;
    let candidate = pending_request(&state, user_id).await?;

    let mut active = candidate.into_active_model();
    active.role = Set(Role::Admin);
    active.pending_admin = Set(false);
    active.updated_at = Set(Utc::now());
    let approved = active.update(&state.db).await?;
    info!(user_id = %approved.id, "Administrator request approved");

    let recipient = Recipient::from(&approved);
    if let Err(e) = state
        .notifier
        .notify(&recipient, &Notification::AdminApproved)
        .await
    {
        error!(email = %recipient.email, "Could not send approval email: {e}");
    }

    Ok(ok(UserResponse::from(approved), "Solicitud de administrador aprobada"))
}

/// Reject an administrator request
#[utoipa::path(
    post,
    path = "/api/users/{user_id}/reject-admin",
    tag = "users",
    params(("user_id" = Uuid, Path, description = "User ID")),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Request rejected", body = ApiResponse<UserResponse>),
        (status = 400, description = "No pending request", body = ErrorResponse),
        (status = 403, description = "Not an administrator", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state, auth))]
pub async fn reject_admin(
    Path(user_id): Path<Uuid>,
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<Json<ApiResponse<UserResponse>>> {
    auth.require(&[Role::Admin])?;
    let candidate = pending_request(&state, user_id).await?;

    let mut active = candidate.into_active_model();
    active.pending_admin = Set(false);
    active.updated_at = Set(Utc::now());
    let rejected = active.update(&state.db).await?;
    info!(user_id = %rejected.id, "Administrator request rejected");

    Ok(ok(UserResponse::from(rejected), "Solicitud de administrador rechazada"))
}
