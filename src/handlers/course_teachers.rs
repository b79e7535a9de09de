use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use model::entities::{
    course, course_teacher,
    school_member::{self, MembershipRole},
    user::{self, Role},
};
use sea_orm::{
    ColumnTrait, EntityTrait, JoinType, ModelTrait, QueryFilter, QueryOrder, QuerySelect,
    RelationTrait, Set,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use super::courses::CourseResponse;
use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::extract::ValidatedJson;
use crate::schemas::{ApiResponse, AppState, ErrorResponse, ok};

#[derive(Debug, Deserialize, Serialize, ToSchema, Validate)]
pub struct AssignmentRequest {
    pub course_id: Uuid,
    /// The teacher
    pub user_id: Uuid,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TeacherResponse {
    pub user_id: Uuid,
    pub name: String,
    pub lastname: String,
    pub email: String,
    pub phone: String,
}

impl From<user::Model> for TeacherResponse {
    fn from(model: user::Model) -> Self {
        Self {
            user_id: model.id,
            name: model.name,
            lastname: model.lastname,
            email: model.email,
            phone: model.phone,
        }
    }
}

/// Only an administrator who is a member of the course's school may
/// change its teachers.
async fn ensure_course_admin(
    state: &AppState,
    auth: &AuthUser,
    course_id: Uuid,
) -> ApiResult<course::Model> {
    let caller = auth.require(&[Role::Admin])?;
    let found = course::Entity::find_by_id(course_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| ApiError::NotFound("Curso no encontrado".to_string()))?;

    if !school_member::holds_role(&state.db, found.school_id, caller.id, MembershipRole::Admin)
        .await?
    {
        return Err(ApiError::Forbidden(
            "No eres administrador de la escuela de este curso".to_string(),
        ));
    }
    Ok(found)
}

/// Assign a teacher to a course
#[utoipa::path(
    post,
    path = "/api/courseteacher/assign",
    tag = "course-teachers",
    request_body = AssignmentRequest,
    security(("bearer" = [])),
    responses(
        (status = 201, description = "Teacher assigned", body = ApiResponse<TeacherResponse>),
        (status = 400, description = "Not a teacher or already assigned", body = ErrorResponse),
        (status = 403, description = "Not an administrator of the school", body = ErrorResponse),
        (status = 404, description = "Course or user not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state, auth, request))]
pub async fn assign_teacher(
    State(state): State<AppState>,
    auth: AuthUser,
    ValidatedJson(request): ValidatedJson<AssignmentRequest>,
) -> ApiResult<(StatusCode, Json<ApiResponse<TeacherResponse>>)> {
    let found = ensure_course_admin(&state, &auth, request.course_id).await?;

    let teacher = user::Entity::find_by_id(request.user_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| ApiError::NotFound("Usuario no encontrado".to_string()))?;
    if teacher.role != Role::Teacher {
        return Err(ApiError::rule(
            "NOT_A_TEACHER",
            "El usuario no tiene el rol de profesor",
        ));
    }
    if course_teacher::is_assigned(&state.db, found.id, teacher.id).await? {
        return Err(ApiError::rule(
            "ALREADY_ASSIGNED",
            "El profesor ya está asignado a este curso",
        ));
    }

    course_teacher::Entity::insert(course_teacher::ActiveModel {
        course_id: Set(found.id),
        user_id: Set(teacher.id),
    })
    .exec_without_returning(&state.db)
    .await?;

    info!(course_id = %found.id, teacher_id = %teacher.id, "Teacher assigned");
    Ok((
        StatusCode::CREATED,
        ok(TeacherResponse::from(teacher), "Profesor asignado exitosamente"),
    ))
}

/// Remove a teacher from a course
#[utoipa::path(
    delete,
    path = "/api/courseteacher/remove",
    tag = "course-teachers",
    request_body = AssignmentRequest,
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Teacher removed"),
        (status = 403, description = "Not an administrator of the school", body = ErrorResponse),
        (status = 404, description = "Assignment not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state, auth, request))]
pub async fn remove_teacher(
    State(state): State<AppState>,
    auth: AuthUser,
    ValidatedJson(request): ValidatedJson<AssignmentRequest>,
) -> ApiResult<Json<ApiResponse<()>>> {
    let found = ensure_course_admin(&state, &auth, request.course_id).await?;

    let removed = course_teacher::Entity::delete_by_id((found.id, request.user_id))
        .exec(&state.db)
        .await?;
    if removed.rows_affected == 0 {
        return Err(ApiError::NotFound(
            "El profesor no está asignado a este curso".to_string(),
        ));
    }

    info!(course_id = %found.id, teacher_id = %request.user_id, "Teacher removed");
    Ok(ok((), "Profesor removido exitosamente"))
}

/// List the teachers of a course
#[utoipa::path(
    get,
    path = "/api/courseteacher/course/{course_id}",
    tag = "course-teachers",
    params(("course_id" = Uuid, Path, description = "Course ID")),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Teachers of the course", body = ApiResponse<Vec<TeacherResponse>>),
        (status = 404, description = "Course not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state, _auth))]
pub async fn get_course_teachers(
    Path(course_id): Path<Uuid>,
    State(state): State<AppState>,
    _auth: AuthUser,
) -> ApiResult<Json<ApiResponse<Vec<TeacherResponse>>>> {
    let found = course::Entity::find_by_id(course_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| ApiError::NotFound("Curso no encontrado".to_string()))?;

    let teachers = found
        .find_related(user::Entity)
        .order_by_asc(user::Column::Lastname)
        .all(&state.db)
        .await?;
    let data = teachers.into_iter().map(TeacherResponse::from).collect();
    Ok(ok(data, "Profesores obtenidos exitosamente"))
}

/// Courses taught by the caller
#[utoipa::path(
    get,
    path = "/api/courseteacher/me",
    tag = "course-teachers",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Courses of the teacher", body = ApiResponse<Vec<CourseResponse>>),
        (status = 403, description = "Not a teacher", body = ErrorResponse)
    )
)]
#[instrument(skip(state, auth))]
pub async fn get_my_courses(
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<Json<ApiResponse<Vec<CourseResponse>>>> {
    let teacher = auth.require(&[Role::Teacher])?;

    let courses = course::Entity::find()
        .join(JoinType::InnerJoin, course::Relation::CourseTeacher.def())
        .filter(course_teacher::Column::UserId.eq(teacher.id))
        .order_by_asc(course::Column::Name)
        .all(&state.db)
        .await?;
    let data = courses.into_iter().map(CourseResponse::from).collect();
    Ok(ok(data, "Cursos del profesor obtenidos exitosamente"))
}
