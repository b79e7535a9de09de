use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use chrono::{DateTime, Utc};
use compute::attendance::owned_class;
use model::entities::{
    class, course, course_teacher,
    user::Role,
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, IntoActiveModel, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::extract::ValidatedJson;
use crate::schemas::{ApiResponse, AppState, ErrorResponse, ok};

#[derive(Debug, Deserialize, Serialize, ToSchema, Validate)]
pub struct CreateClassRequest {
    pub course_id: Uuid,
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    pub class_date: DateTime<Utc>,
    /// Duration in minutes
    #[validate(range(min = 1, max = 1440))]
    pub duration: i32,
}

#[derive(Debug, Default, Deserialize, Serialize, ToSchema, Validate)]
pub struct UpdateClassRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    pub class_date: Option<DateTime<Utc>>,
    #[validate(range(min = 1, max = 1440))]
    pub duration: Option<i32>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ClassResponse {
    pub id: Uuid,
    pub course_id: Uuid,
    pub teacher_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub class_date: DateTime<Utc>,
    pub duration: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<class::Model> for ClassResponse {
    fn from(model: class::Model) -> Self {
        Self {
            id: model.id,
            course_id: model.course_id,
            teacher_id: model.teacher_id,
            title: model.title,
            description: model.description,
            class_date: model.class_date,
            duration: model.duration,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

/// Schedule a class
#[utoipa::path(
    post,
    path = "/api/class",
    tag = "classes",
    request_body = CreateClassRequest,
    security(("bearer" = [])),
    responses(
        (status = 201, description = "Class created", body = ApiResponse<ClassResponse>),
        (status = 400, description = "Invalid input", body = ErrorResponse),
        (status = 403, description = "Not a teacher of the course", body = ErrorResponse),
        (status = 404, description = "Course not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state, auth, request), fields(course_id = %request.course_id))]
pub async fn create_class(
    State(state): State<AppState>,
    auth: AuthUser,
    ValidatedJson(request): ValidatedJson<CreateClassRequest>,
) -> ApiResult<(StatusCode, Json<ApiResponse<ClassResponse>>)> {
    let teacher = auth.require(&[Role::Teacher])?;
    let found = course::Entity::find_by_id(request.course_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| ApiError::NotFound("Curso no encontrado".to_string()))?;
    if !course_teacher::is_assigned(&state.db, found.id, teacher.id).await? {
        return Err(ApiError::Forbidden(
            "No eres profesor de este curso".to_string(),
        ));
    }

    let now = Utc::now();
    let created = class::ActiveModel {
        id: Set(Uuid::new_v4()),
        course_id: Set(found.id),
        teacher_id: Set(teacher.id),
        title: Set(request.title),
        description: Set(request.description),
        class_date: Set(request.class_date),
        duration: Set(request.duration),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(&state.db)
    .await?;

    info!(class_id = %created.id, "Class created");
    Ok((
        StatusCode::CREATED,
        ok(ClassResponse::from(created), "Clase creada exitosamente"),
    ))
}

/// Get a class
#[utoipa::path(
    get,
    path = "/api/class/{class_id}",
    tag = "classes",
    params(("class_id" = Uuid, Path, description = "Class ID")),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Class", body = ApiResponse<ClassResponse>),
        (status = 404, description = "Class not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state, _auth))]
pub async fn get_class(
    Path(class_id): Path<Uuid>,
    State(state): State<AppState>,
    _auth: AuthUser,
) -> ApiResult<Json<ApiResponse<ClassResponse>>> {
    let found = class::Entity::find_by_id(class_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| ApiError::NotFound("Clase no encontrada".to_string()))?;
    Ok(ok(ClassResponse::from(found), "Clase obtenida exitosamente"))
}

/// Update a class owned by the caller
#[utoipa::path(
    put,
    path = "/api/class/{class_id}",
    tag = "classes",
    params(("class_id" = Uuid, Path, description = "Class ID")),
    request_body = UpdateClassRequest,
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Class updated", body = ApiResponse<ClassResponse>),
        (status = 403, description = "Not a teacher or the class belongs to another teacher", body = ErrorResponse),
        (status = 404, description = "Class not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state, auth, request))]
pub async fn update_class(
    Path(class_id): Path<Uuid>,
    State(state): State<AppState>,
    auth: AuthUser,
    ValidatedJson(request): ValidatedJson<UpdateClassRequest>,
) -> ApiResult<Json<ApiResponse<ClassResponse>>> {
    let teacher = auth.require(&[Role::Teacher])?;
    let existing = owned_class(&state.db, class_id, teacher.id).await?;

    let mut active = existing.into_active_model();
    if let Some(title) = request.title {
        active.title = Set(title);
    }
    if let Some(description) = request.description {
        active.description = Set(Some(description));
    }
    if let Some(class_date) = request.class_date {
        active.class_date = Set(class_date);
    }
    if let Some(duration) = request.duration {
        active.duration = Set(duration);
    }
    active.updated_at = Set(Utc::now());

    let updated = active.update(&state.db).await?;
    info!(class_id = %updated.id, "Class updated");
    Ok(ok(ClassResponse::from(updated), "Clase actualizada exitosamente"))
}

/// Delete a class owned by the caller
#[utoipa::path(
    delete,
    path = "/api/class/{class_id}",
    tag = "classes",
    params(("class_id" = Uuid, Path, description = "Class ID")),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Class deleted"),
        (status = 403, description = "The class belongs to another teacher", body = ErrorResponse),
        (status = 404, description = "Class not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state, auth))]
pub async fn delete_class(
    Path(class_id): Path<Uuid>,
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<Json<ApiResponse<()>>> {
    let teacher = auth.require(&[Role::Teacher])?;
    let existing = owned_class(&state.db, class_id, teacher.id).await?;
    class::Entity::delete_by_id(existing.id)
        .exec(&state.db)
        .await?;
    info!("Class with ID {} deleted", class_id);
    Ok(ok((), "Clase eliminada exitosamente"))
}

/// Classes of a course ordered by date
#[utoipa::path(
    get,
    path = "/api/class/course/{course_id}",
    tag = "classes",
    params(("course_id" = Uuid, Path, description = "Course ID")),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Classes of the course", body = ApiResponse<Vec<ClassResponse>>),
        (status = 404, description = "Course not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state, _auth))]
pub async fn get_course_classes(
    Path(course_id): Path<Uuid>,
    State(state): State<AppState>,
    _auth: AuthUser,
) -> ApiResult<Json<ApiResponse<Vec<ClassResponse>>>> {
    if course::Entity::find_by_id(course_id)
        .one(&state.db)
        .await?
        .is_none()
    {
        return Err(ApiError::NotFound("Curso no encontrado".to_string()));
    }

    let classes = class::Entity::find()
        .filter(class::Column::CourseId.eq(course_id))
        .order_by_asc(class::Column::ClassDate)
        .all(&state.db)
        .await?;
    let data = classes.into_iter().map(ClassResponse::from).collect();
    Ok(ok(data, "Clases obtenidas exitosamente"))
}
