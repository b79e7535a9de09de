use std::collections::HashMap;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use chrono::{NaiveDate, Utc};
use common::EnrollmentSummary;
use compute::enrollment::{self as enrolling, EnrollRequest, summarize};
use model::entities::{
    course, course_teacher,
    enrollment::{self, EnrollmentStatus, PlanType},
    school,
    user::{self, Role},
};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QueryOrder};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::extract::OptionalJson;
use crate::schemas::{ApiResponse, AppState, ErrorResponse, ok};

/// Every field is optional: the plan defaults to `mensual`, the start date to
/// today and the end date to the start plus the plan length.
#[derive(Debug, Default, Deserialize, Serialize, ToSchema, Validate)]
#[validate(schema(function = "dates_in_order"))]
pub struct EnrollBody {
    pub plan_type: Option<PlanType>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

fn dates_in_order(body: &EnrollBody) -> Result<(), ValidationError> {
    match (body.start_date, body.end_date) {
        (Some(start), Some(end)) if end < start => {
            Err(ValidationError::new("end_date_before_start_date"))
        }
        _ => Ok(()),
    }
}

impl From<EnrollBody> for EnrollRequest {
    fn from(body: EnrollBody) -> Self {
        Self {
            plan_type: body.plan_type,
            start_date: body.start_date,
            end_date: body.end_date,
        }
    }
}

/// One student of a course roster.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RosterEntry {
    pub enrollment_id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub lastname: String,
    pub email: String,
    pub plan_type: PlanType,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub status: EnrollmentStatus,
    pub progress: i32,
}

/// Enroll the caller in a course
#[utoipa::path(
    post,
    path = "/api/enrollments/courses/{course_id}/enroll",
    tag = "enrollments",
    params(("course_id" = Uuid, Path, description = "Course ID")),
    request_body = EnrollBody,
    security(("bearer" = [])),
    responses(
        (status = 201, description = "Enrolled", body = ApiResponse<EnrollmentSummary>),
        (status = 400, description = "No places, under age or already enrolled", body = ErrorResponse),
        (status = 403, description = "Not a student", body = ErrorResponse),
        (status = 404, description = "Course not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state, auth, body), fields(user_id = %auth.id()))]
pub async fn enroll(
    Path(course_id): Path<Uuid>,
    State(state): State<AppState>,
    auth: AuthUser,
    OptionalJson(body): OptionalJson<EnrollBody>,
) -> ApiResult<(StatusCode, Json<ApiResponse<EnrollmentSummary>>)> {
    let today = Utc::now().date_naive();
    let outcome = enrolling::enroll(&state.db, &auth.0, course_id, body.into(), today).await?;
    Ok((
        StatusCode::CREATED,
        ok(outcome.summary(), "Inscripción realizada exitosamente"),
    ))
}

/// Enrollments of the caller
#[utoipa::path(
    get,
    path = "/api/enrollments/me",
    tag = "enrollments",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Enrollments of the caller", body = ApiResponse<Vec<EnrollmentSummary>>),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse)
    )
)]
#[instrument(skip(state, auth), fields(user_id = %auth.id()))]
pub async fn get_my_enrollments(
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<Json<ApiResponse<Vec<EnrollmentSummary>>>> {
    let rows = enrollment::Entity::find()
        .filter(enrollment::Column::UserId.eq(auth.id()))
        .order_by_desc(enrollment::Column::CreatedAt)
        .find_also_related(course::Entity)
        .all(&state.db)
        .await?;

    let school_ids: Vec<Uuid> = rows
        .iter()
        .filter_map(|(_, c)| c.as_ref().map(|c| c.school_id))
        .collect();
    let schools: HashMap<Uuid, school::Model> = school::Entity::find()
        .filter(school::Column::Id.is_in(school_ids))
        .all(&state.db)
        .await?
        .into_iter()
        .map(|s| (s.id, s))
        .collect();

    let data: Vec<EnrollmentSummary> = rows
        .iter()
        .filter_map(|(enr, c)| {
            let c = c.as_ref()?;
            let s = schools.get(&c.school_id)?;
            Some(summarize(enr, c, s))
        })
        .collect();
    debug!("Found {} enrollments", data.len());
    Ok(ok(data, "Inscripciones obtenidas exitosamente"))
}

/// Students enrolled in a course
#[utoipa::path(
    get,
    path = "/api/enrollments/courses/{course_id}",
    tag = "enrollments",
    params(("course_id" = Uuid, Path, description = "Course ID")),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Course roster", body = ApiResponse<Vec<RosterEntry>>),
        (status = 403, description = "Not a teacher of the course nor an administrator", body = ErrorResponse),
        (status = 404, description = "Course not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state, auth))]
pub async fn get_course_roster(
    Path(course_id): Path<Uuid>,
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<Json<ApiResponse<Vec<RosterEntry>>>> {
    let caller = auth.require(&[Role::Teacher, Role::Admin, Role::Coordinator])?;
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

    let rows = enrollment::Entity::find()
        .filter(enrollment::Column::CourseId.eq(found.id))
        .find_also_related(user::Entity)
        .order_by_asc(user::Column::Lastname)
        .order_by_asc(user::Column::Name)
        .all(&state.db)
        .await?;

    let data = rows
        .into_iter()
        .filter_map(|(enr, student)| {
            student.map(|s| RosterEntry {
                enrollment_id: enr.id,
                user_id: s.id,
                name: s.name,
                lastname: s.lastname,
                email: s.email,
                plan_type: enr.plan_type,
                start_date: enr.start_date,
                end_date: enr.end_date,
                status: enr.status,
                progress: enr.progress,
            })
        })
        .collect();
    Ok(ok(data, "Estudiantes del curso obtenidos exitosamente"))
}
