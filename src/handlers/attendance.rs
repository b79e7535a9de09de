use axum::{
    extract::{Path, State},
    response::Json,
};
use chrono::{DateTime, Utc};
use common::{AttendanceStats, StudentProgress};
use compute::{ComputeError, attendance};
use model::entities::{
    attendance::{self as attendance_row, AttendanceStatus},
    course, course_teacher, enrollment,
    user::Role,
};
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use super::classes::ClassResponse;
use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::extract::ValidatedJson;
use crate::schemas::{ApiResponse, AppState, ErrorResponse, ok};

#[derive(Debug, Deserialize, Serialize, ToSchema, Validate)]
pub struct RecordAttendanceRequest {
    pub class_id: Uuid,
    /// The student
    pub user_id: Uuid,
    pub status: AttendanceStatus,
    #[validate(length(max = 500))]
    pub notes: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AttendanceResponse {
    pub id: Uuid,
    pub class_id: Uuid,
    pub user_id: Uuid,
    pub status: AttendanceStatus,
    pub notes: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl From<attendance_row::Model> for AttendanceResponse {
    fn from(model: attendance_row::Model) -> Self {
        Self {
            id: model.id,
            class_id: model.class_id,
            user_id: model.user_id,
            status: model.status,
            notes: model.notes,
            updated_at: model.updated_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SheetRow {
    pub user_id: Uuid,
    pub name: String,
    pub lastname: String,
    pub email: String,
    /// `present`, `absent`, `late`, or `pending` when nothing was recorded
    pub status: String,
    pub notes: Option<String>,
}

impl From<attendance::SheetEntry> for SheetRow {
    fn from(entry: attendance::SheetEntry) -> Self {
        let status = match entry.status {
            Some(AttendanceStatus::Present) => "present",
            Some(AttendanceStatus::Absent) => "absent",
            Some(AttendanceStatus::Late) => "late",
            None => "pending",
        };
        Self {
            user_id: entry.student.id,
            name: entry.student.name,
            lastname: entry.student.lastname,
            email: entry.student.email,
            status: status.to_string(),
            notes: entry.notes,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AttendanceSheetResponse {
    pub class: ClassResponse,
    pub students: Vec<SheetRow>,
}

/// Record the attendance of a student
///
/// Recording again for the same class and student overwrites the previous
/// status and notes.
#[utoipa::path(
    post,
    path = "/api/attendance",
    tag = "attendance",
    request_body = RecordAttendanceRequest,
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Attendance recorded", body = ApiResponse<AttendanceResponse>),
        (status = 400, description = "Student not enrolled in the course", body = ErrorResponse),
        (status = 403, description = "The class belongs to another teacher", body = ErrorResponse),
        (status = 404, description = "Class not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state, auth, request), fields(class_id = %request.class_id))]
pub async fn record_attendance(
    State(state): State<AppState>,
    auth: AuthUser,
    ValidatedJson(request): ValidatedJson<RecordAttendanceRequest>,
) -> ApiResult<Json<ApiResponse<AttendanceResponse>>> {
    let teacher = auth.require(&[Role::Teacher])?;
    let stored = attendance::record_attendance(
        &state.db,
        teacher.id,
        request.class_id,
        request.user_id,
        request.status,
        request.notes,
    )
    .await?;
    Ok(ok(
        AttendanceResponse::from(stored),
        "Asistencia registrada exitosamente",
    ))
}

/// Attendance sheet of a class
#[utoipa::path(
    get,
    path = "/api/attendance/class/{class_id}",
    tag = "attendance",
    params(("class_id" = Uuid, Path, description = "Class ID")),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Attendance sheet", body = ApiResponse<AttendanceSheetResponse>),
        (status = 403, description = "The class belongs to another teacher", body = ErrorResponse),
        (status = 404, description = "Class not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state, auth))]
pub async fn get_class_attendance(
    Path(class_id): Path<Uuid>,
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<Json<ApiResponse<AttendanceSheetResponse>>> {
    let teacher = auth.require(&[Role::Teacher])?;
    let (class, sheet) = attendance::attendance_sheet(&state.db, teacher.id, class_id).await?;
    let data = AttendanceSheetResponse {
        class: ClassResponse::from(class),
        students: sheet.into_iter().map(SheetRow::from).collect(),
    };
    Ok(ok(data, "Asistencia de la clase obtenida exitosamente"))
}

/// Attendance statistics of every student of a course
#[utoipa::path(
    get,
    path = "/api/attendance/course/{course_id}/stats",
    tag = "attendance",
    params(("course_id" = Uuid, Path, description = "Course ID")),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Statistics per student", body = ApiResponse<Vec<StudentProgress>>),
        (status = 403, description = "Not a teacher of the course nor an administrator", body = ErrorResponse),
        (status = 404, description = "Course not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state, auth))]
pub async fn get_course_stats(
    Path(course_id): Path<Uuid>,
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<Json<ApiResponse<Vec<StudentProgress>>>> {
    let caller = auth.require(&[Role::Teacher, Role::Admin])?;
    let found = course::Entity::find_by_id(course_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| ApiError::NotFound("Curso no encontrado".to_string()))?;
    if caller.role == Role::Teacher
        && !course_teacher::is_assigned(&state.db, found.id, caller.id).await?
    {
        return Err(ApiError::Forbidden(
            "No eres profesor de este curso".to_string(),
        ));
    }

    let progress = attendance::course_progress(&state.db, found.id).await?;
    debug!(students = progress.len(), "Course statistics computed");
    Ok(ok(progress, "Estadísticas del curso obtenidas exitosamente"))
}

/// Attendance statistics of the caller in a course
#[utoipa::path(
    get,
    path = "/api/attendance/course/{course_id}/me",
    tag = "attendance",
    params(("course_id" = Uuid, Path, description = "Course ID")),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Statistics of the caller", body = ApiResponse<AttendanceStats>),
        (status = 400, description = "Not enrolled in the course", body = ErrorResponse),
        (status = 403, description = "Not a student", body = ErrorResponse)
    )
)]
#[instrument(skip(state, auth))]
pub async fn get_my_stats(
    Path(course_id): Path<Uuid>,
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<Json<ApiResponse<AttendanceStats>>> {
    let student = auth.require(&[Role::Student])?;

    let enrollments = enrollment::Entity::find()
        .filter(enrollment::Column::CourseId.eq(course_id))
        .filter(enrollment::Column::UserId.eq(student.id))
        .count(&state.db)
        .await?;
    if enrollments == 0 {
        return Err(ComputeError::NotEnrolled.into());
    }

    let stats = attendance::student_stats(&state.db, course_id, student.id).await?;
    Ok(ok(stats, "Estadísticas obtenidas exitosamente"))
}
