use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use chrono::{DateTime, Utc};
use model::entities::{
    course, school,
    school_member::{self, MembershipRole},
    user::{self, Role},
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, IntoActiveModel, PaginatorTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use super::rules::digits_only;
use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::extract::ValidatedJson;
use crate::schemas::{ApiResponse, AppState, ErrorResponse, ok};

#[derive(Debug, Deserialize, Serialize, ToSchema, Validate)]
pub struct SchoolRequest {
    #[validate(length(min = 1, max = 150))]
    pub name: String,
    #[validate(length(min = 1))]
    pub description: String,
    #[validate(length(max = 20), custom(function = "digits_only"))]
    pub phone: String,
    #[validate(length(min = 1, max = 200))]
    pub address: String,
    #[validate(email)]
    pub email: String,
    /// Path of an already uploaded image
    pub image: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SchoolResponse {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub phone: String,
    pub address: String,
    pub email: String,
    pub image: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<school::Model> for SchoolResponse {
    fn from(model: school::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            description: model.description,
            phone: model.phone,
            address: model.address,
            email: model.email,
            image: model.image,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, ToSchema, Validate)]
pub struct AddMemberRequest {
    pub user_id: Uuid,
    pub role: MembershipRole,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MemberResponse {
    pub user_id: Uuid,
    pub name: String,
    pub email: String,
    pub role: MembershipRole,
}

pub(crate) async fn find_school(state: &AppState, school_id: Uuid) -> ApiResult<school::Model> {
    school::Entity::find_by_id(school_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| ApiError::NotFound("Escuela no encontrada".to_string()))
}

/// Administrators manage every school, coordinators only their own.
pub(crate) async fn ensure_school_manager(
    state: &AppState,
    auth: &AuthUser,
    school_id: Uuid,
) -> ApiResult<()> {
    let caller = auth.require(&[Role::Admin, Role::Coordinator])?;
    if caller.role == Role::Admin {
        return Ok(());
    }
    if school_member::holds_role(&state.db, school_id, caller.id, MembershipRole::Coordinator)
        .await?
    {
        Ok(())
    } else {
        Err(ApiError::Forbidden(
            "No eres coordinador de esta escuela".to_string(),
        ))
    }
}

/// List schools
#[utoipa::path(
    get,
    path = "/api/schools",
    tag = "schools",
    responses(
        (status = 200, description = "Schools retrieved successfully", body = ApiResponse<Vec<SchoolResponse>>)
    )
)]
#[instrument(skip(state))]
pub async fn get_schools(
    State(state): State<AppState>,
) -> ApiResult<Json<ApiResponse<Vec<SchoolResponse>>>> {
    let schools = school::Entity::find()
        .order_by_asc(school::Column::Name)
        .all(&state.db)
        .await?;
    let data: Vec<SchoolResponse> = schools.into_iter().map(SchoolResponse::from).collect();
    Ok(ok(data, "Escuelas obtenidas exitosamente"))
}

/// Get a school
#[utoipa::path(
    get,
    path = "/api/schools/{school_id}",
    tag = "schools",
    params(("school_id" = Uuid, Path, description = "School ID")),
    responses(
        (status = 200, description = "School retrieved successfully", body = ApiResponse<SchoolResponse>),
        (status = 404, description = "School not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_school(
    Path(school_id): Path<Uuid>,
    State(state): State<AppState>,
) -> ApiResult<Json<ApiResponse<SchoolResponse>>> {
    let found = find_school(&state, school_id).await?;
    Ok(ok(SchoolResponse::from(found), "Escuela obtenida exitosamente"))
}

/// Create a school
///
/// The creator becomes a member of the new school with the role matching
/// their own (admin or coordinator).
#[utoipa::path(
    post,
    path = "/api/schools",
    tag = "schools",
    request_body = SchoolRequest,
    security(("bearer" = [])),
    responses(
        (status = 201, description = "School created", body = ApiResponse<SchoolResponse>),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 403, description = "Not an administrator or coordinator", body = ErrorResponse)
    )
)]
#[instrument(skip(state, auth, request))]
pub async fn create_school(
    State(state): State<AppState>,
    auth: AuthUser,
    ValidatedJson(request): ValidatedJson<SchoolRequest>,
) -> ApiResult<(StatusCode, Json<ApiResponse<SchoolResponse>>)> {
    let creator = auth.require(&[Role::Admin, Role::Coordinator])?;
    let membership = if creator.role == Role::Admin {
        MembershipRole::Admin
    } else {
        MembershipRole::Coordinator
    };

    let now = Utc::now();
    let txn = state.db.begin().await?;
    let created = school::ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(request.name.trim().to_string()),
        description: Set(request.description),
        phone: Set(request.phone),
        address: Set(request.address),
        email: Set(request.email.trim().to_lowercase()),
        image: Set(request.image),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(&txn)
    .await?;
    school_member::ActiveModel {
        school_id: Set(created.id),
        user_id: Set(creator.id),
        role: Set(membership),
    }
    .insert(&txn)
    .await?;
    txn.commit().await?;

    info!(school_id = %created.id, "School created");
    Ok((
        StatusCode::CREATED,
        ok(SchoolResponse::from(created), "Escuela creada exitosamente"),
    ))
}

/// Update a school
#[utoipa::path(
    put,
    path = "/api/schools/{school_id}",
    tag = "schools",
    params(("school_id" = Uuid, Path, description = "School ID")),
    request_body = SchoolRequest,
    security(("bearer" = [])),
    responses(
        (status = 200, description = "School updated", body = ApiResponse<SchoolResponse>),
        (status = 403, description = "Not allowed to manage this school", body = ErrorResponse),
        (status = 404, description = "School not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state, auth, request))]
pub async fn update_school(
    Path(school_id): Path<Uuid>,
    State(state): State<AppState>,
    auth: AuthUser,
    ValidatedJson(request): ValidatedJson<SchoolRequest>,
) -> ApiResult<Json<ApiResponse<SchoolResponse>>> {
    let existing = find_school(&state, school_id).await?;
    ensure_school_manager(&state, &auth, school_id).await?;

    let mut active = existing.into_active_model();
    active.name = Set(request.name.trim().to_string());
    active.description = Set(request.description);
    active.phone = Set(request.phone);
    active.address = Set(request.address);
    active.email = Set(request.email.trim().to_lowercase());
    if request.image.is_some() {
        active.image = Set(request.image);
    }
    active.updated_at = Set(Utc::now());
    let updated = active.update(&state.db).await?;

    info!(school_id = %updated.id, "School updated");
    Ok(ok(SchoolResponse::from(updated), "Escuela actualizada exitosamente"))
}

/// Delete a school without courses
#[utoipa::path(
    delete,
    path = "/api/schools/{school_id}",
    tag = "schools",
    params(("school_id" = Uuid, Path, description = "School ID")),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "School deleted"),
        (status = 400, description = "School still has courses", body = ErrorResponse),
        (status = 403, description = "Not an administrator", body = ErrorResponse),
        (status = 404, description = "School not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state, auth))]
pub async fn delete_school(
    Path(school_id): Path<Uuid>,
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<Json<ApiResponse<()>>> {
    auth.require(&[Role::Admin])?;
    let existing = find_school(&state, school_id).await?;

    let courses = course::Entity::find()
        .filter(course::Column::SchoolId.eq(school_id))
        .count(&state.db)
        .await?;
    if courses > 0 {
        warn!(courses, "Refusing to delete a school with courses");
        return Err(ApiError::rule(
            "SCHOOL_HAS_COURSES",
            "No se puede eliminar una escuela con cursos",
        ));
    }

    school::Entity::delete_by_id(existing.id)
        .exec(&state.db)
        .await?;
    if let Some(image) = existing.image.as_deref() {
        crate::uploads::remove_image(&state.config.uploads.dir, image).await;
    }

    info!("School with ID {} deleted", school_id);
    Ok(ok((), "Escuela eliminada exitosamente"))
}

/// List the members of a school
#[utoipa::path(
    get,
    path = "/api/schools/{school_id}/members",
    tag = "schools",
    params(("school_id" = Uuid, Path, description = "School ID")),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Members", body = ApiResponse<Vec<MemberResponse>>),
        (status = 403, description = "Not an administrator", body = ErrorResponse),
        (status = 404, description = "School not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state, auth))]
pub async fn get_members(
    Path(school_id): Path<Uuid>,
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<Json<ApiResponse<Vec<MemberResponse>>>> {
    auth.require(&[Role::Admin])?;
    find_school(&state, school_id).await?;

    let members = school_member::Entity::find()
        .filter(school_member::Column::SchoolId.eq(school_id))
        .find_also_related(user::Entity)
        .all(&state.db)
        .await?;

    let data = members
        .into_iter()
        .filter_map(|(membership, member)| {
            member.map(|m| MemberResponse {
                user_id: m.id,
                name: m.full_name(),
                email: m.email,
                role: membership.role,
            })
        })
        .collect();
    Ok(ok(data, "Miembros obtenidos exitosamente"))
}

/// Add a member to a school
#[utoipa::path(
    post,
    path = "/api/schools/{school_id}/members",
    tag = "schools",
    params(("school_id" = Uuid, Path, description = "School ID")),
    request_body = AddMemberRequest,
    security(("bearer" = [])),
    responses(
        (status = 201, description = "Member added", body = ApiResponse<MemberResponse>),
        (status = 400, description = "Already a member", body = ErrorResponse),
        (status = 403, description = "Not an administrator", body = ErrorResponse),
        (status = 404, description = "School or user not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state, auth, request))]
pub async fn add_member(
    Path(school_id): Path<Uuid>,
    State(state): State<AppState>,
    auth: AuthUser,
    ValidatedJson(request): ValidatedJson<AddMemberRequest>,
) -> ApiResult<(StatusCode, Json<ApiResponse<MemberResponse>>)> {
    auth.require(&[Role::Admin])?;
    find_school(&state, school_id).await?;
    let member = user::Entity::find_by_id(request.user_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| ApiError::NotFound("Usuario no encontrado".to_string()))?;

    let existing = school_member::Entity::find_by_id((school_id, member.id))
        .one(&state.db)
        .await?;
    if existing.is_some() {
        return Err(ApiError::rule(
            "ALREADY_MEMBER",
            "El usuario ya pertenece a esta escuela",
        ));
    }

    school_member::ActiveModel {
        school_id: Set(school_id),
        user_id: Set(member.id),
        role: Set(request.role),
    }
    .insert(&state.db)
    .await?;

    info!(%school_id, user_id = %member.id, role = ?request.role, "Member added");
    Ok((
        StatusCode::CREATED,
        ok(
            MemberResponse {
                user_id: member.id,
                name: member.full_name(),
                email: member.email,
                role: request.role,
            },
            "Miembro agregado exitosamente",
        ),
    ))
}

/// Remove a member from a school
#[utoipa::path(
    delete,
    path = "/api/schools/{school_id}/members/{user_id}",
    tag = "schools",
    params(
        ("school_id" = Uuid, Path, description = "School ID"),
        ("user_id" = Uuid, Path, description = "User ID"),
    ),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Member removed"),
        (status = 403, description = "Not an administrator", body = ErrorResponse),
        (status = 404, description = "Membership not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state, auth))]
pub async fn remove_member(
    Path((school_id, user_id)): Path<(Uuid, Uuid)>,
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<Json<ApiResponse<()>>> {
    auth.require(&[Role::Admin])?;

    let result = school_member::Entity::delete_by_id((school_id, user_id))
        .exec(&state.db)
        .await?;
    if result.rows_affected == 0 {
        return Err(ApiError::NotFound("Membresía no encontrada".to_string()));
    }

    info!(%school_id, %user_id, "Member removed");
    Ok(ok((), "Miembro eliminado exitosamente"))
}
