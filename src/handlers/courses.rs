use std::str::FromStr;

use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::Json,
};
use axum_valid::Valid;
use chrono::{DateTime, Utc};
use compute::lifecycle;
use model::entities::{
    course::{self, CourseState},
    enrollment,
    user::Role,
};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, IntoActiveModel, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use super::schools::{ensure_school_manager, find_school};
use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::schemas::{ApiResponse, AppState, ErrorResponse, ok};
use crate::uploads::{UploadedImage, remove_image, store_image};

/// Multipart form accepted when creating or updating a course.
/// Every field is required on creation and optional on update.
#[allow(dead_code)]
#[derive(ToSchema)]
pub struct CourseForm {
    pub school_id: Uuid,
    pub name: String,
    pub description: String,
    /// Decimal price, e.g. `100` or `99.90`
    pub price: String,
    pub places: i32,
    /// Minimum age of the students
    pub age: i32,
    #[schema(value_type = String, format = Binary)]
    pub image: Vec<u8>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CourseResponse {
    pub id: Uuid,
    pub school_id: Uuid,
    pub name: String,
    pub description: String,
    pub price: Decimal,
    pub places: i32,
    pub age: i32,
    pub image: Option<String>,
    pub course_state: CourseState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<course::Model> for CourseResponse {
    fn from(model: course::Model) -> Self {
        Self {
            id: model.id,
            school_id: model.school_id,
            name: model.name,
            description: model.description,
            price: model.price,
            places: model.places,
            age: model.age,
            image: model.image,
            course_state: model.course_state,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CourseStateResponse {
    pub course_id: Uuid,
    pub course_state: CourseState,
    /// Enrollments completed by this change
    pub finalized_enrollments: usize,
    /// Students who were sent the completion email
    pub notified: usize,
}

#[derive(Debug, Deserialize, ToSchema, IntoParams, Validate)]
pub struct CourseListQuery {
    /// Filter by state
    pub state: Option<CourseState>,
    /// Page number (default: 1)
    #[validate(range(min = 1, max = 10000))]
    pub page: Option<u64>,
    /// Page size (default: 100)
    #[validate(range(min = 1, max = 1000))]
    pub limit: Option<u64>,
}

#[derive(Debug, Default)]
struct CourseFields {
    school_id: Option<Uuid>,
    name: Option<String>,
    description: Option<String>,
    price: Option<Decimal>,
    places: Option<i32>,
    age: Option<i32>,
    image: Option<UploadedImage>,
}

fn parse_field<T: FromStr>(field: &str, value: &str) -> ApiResult<T> {
    value
        .parse()
        .map_err(|_| ApiError::Validation(format!("{field}: valor no válido '{value}'")))
}

fn required<T>(value: Option<T>, field: &str) -> ApiResult<T> {
    value.ok_or_else(|| ApiError::Validation(format!("{field}: campo requerido")))
}

impl CourseFields {
    async fn read(mut multipart: Multipart) -> ApiResult<Self> {
        let mut fields = Self::default();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ApiError::Validation(e.body_text()))?
        {
            let name = field.name().unwrap_or_default().to_string();
            if name == "image" {
                let file_name = field.file_name().map(str::to_string);
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::Validation(e.body_text()))?;
                if !bytes.is_empty() {
                    fields.image = Some(UploadedImage {
                        file_name,
                        bytes: bytes.to_vec(),
                    });
                }
                continue;
            }

            let text = field
                .text()
                .await
                .map_err(|e| ApiError::Validation(e.body_text()))?;
            let text = text.trim();
            match name.as_str() {
                "school_id" => fields.school_id = Some(parse_field(&name, text)?),
                "name" => fields.name = Some(text.to_string()).filter(|t| !t.is_empty()),
                "description" => {
                    fields.description = Some(text.to_string()).filter(|t| !t.is_empty())
                }
                "price" => fields.price = Some(parse_field(&name, text)?),
                "places" => fields.places = Some(parse_field(&name, text)?),
                "age" => fields.age = Some(parse_field(&name, text)?),
                other => debug!("Ignoring unknown form field '{}'", other),
            }
        }
        fields.check()?;
        Ok(fields)
    }

    fn check(&self) -> ApiResult<()> {
        if self.price.is_some_and(|p| p < Decimal::ZERO) {
            return Err(ApiError::Validation("price: no puede ser negativo".to_string()));
        }
        if self.places.is_some_and(|p| p < 1) {
            return Err(ApiError::Validation("places: debe ser al menos 1".to_string()));
        }
        if self.age.is_some_and(|a| a < 0) {
            return Err(ApiError::Validation("age: no puede ser negativa".to_string()));
        }
        Ok(())
    }
}

async fn find_course(state: &AppState, course_id: Uuid) -> ApiResult<course::Model> {
    course::Entity::find_by_id(course_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| ApiError::NotFound("Curso no encontrado".to_string()))
}

/// List courses
#[utoipa::path(
    get,
    path = "/api/courses",
    tag = "courses",
    params(CourseListQuery),
    responses(
        (status = 200, description = "Courses retrieved successfully", body = ApiResponse<Vec<CourseResponse>>)
    )
)]
#[instrument(skip(state))]
pub async fn get_courses(
    State(state): State<AppState>,
    Valid(Query(query)): Valid<Query<CourseListQuery>>,
) -> ApiResult<Json<ApiResponse<Vec<CourseResponse>>>> {
    let page = query.page.unwrap_or(1);
    let limit = query.limit.unwrap_or(100);

    let mut select = course::Entity::find();
    if let Some(course_state) = query.state {
        select = select.filter(course::Column::CourseState.eq(course_state));
    }
    let courses = select
        .order_by_asc(course::Column::Name)
        .paginate(&state.db, limit)
        .fetch_page(page - 1)
        .await?;

    let data: Vec<CourseResponse> = courses.into_iter().map(CourseResponse::from).collect();
    debug!("Retrieved {} courses", data.len());
    Ok(ok(data, "Cursos obtenidos exitosamente"))
}

/// Get a course
#[utoipa::path(
    get,
    path = "/api/courses/{course_id}",
    tag = "courses",
    params(("course_id" = Uuid, Path, description = "Course ID")),
    responses(
        (status = 200, description = "Course retrieved successfully", body = ApiResponse<CourseResponse>),
        (status = 404, description = "Course not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_course(
    Path(course_id): Path<Uuid>,
    State(state): State<AppState>,
) -> ApiResult<Json<ApiResponse<CourseResponse>>> {
    let found = find_course(&state, course_id).await?;
    Ok(ok(CourseResponse::from(found), "Curso obtenido exitosamente"))
}

/// List the courses of a school
#[utoipa::path(
    get,
    path = "/api/courses/school/{school_id}",
    tag = "courses",
    params(("school_id" = Uuid, Path, description = "School ID")),
    responses(
        (status = 200, description = "Courses of the school", body = ApiResponse<Vec<CourseResponse>>),
        (status = 404, description = "School not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_school_courses(
    Path(school_id): Path<Uuid>,
    State(state): State<AppState>,
) -> ApiResult<Json<ApiResponse<Vec<CourseResponse>>>> {
    find_school(&state, school_id).await?;
    let courses = course::Entity::find()
        .filter(course::Column::SchoolId.eq(school_id))
        .order_by_asc(course::Column::Name)
        .all(&state.db)
        .await?;
    let data: Vec<CourseResponse> = courses.into_iter().map(CourseResponse::from).collect();
    Ok(ok(data, "Cursos de la escuela obtenidos exitosamente"))
}

/// Create a course
#[utoipa::path(
    post,
    path = "/api/courses",
    tag = "courses",
    request_body(content = CourseForm, content_type = "multipart/form-data"),
    security(("bearer" = [])),
    responses(
        (status = 201, description = "Course created", body = ApiResponse<CourseResponse>),
        (status = 400, description = "Missing or malformed field", body = ErrorResponse),
        (status = 403, description = "Not allowed to manage the school", body = ErrorResponse),
        (status = 404, description = "School not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state, auth, multipart))]
pub async fn create_course(
    State(state): State<AppState>,
    auth: AuthUser,
    multipart: Multipart,
) -> ApiResult<(StatusCode, Json<ApiResponse<CourseResponse>>)> {
    auth.require(&[Role::Admin, Role::Coordinator])?;
    let fields = CourseFields::read(multipart).await?;

    let school_id = required(fields.school_id, "school_id")?;
    let name = required(fields.name, "name")?;
    let description = required(fields.description, "description")?;
    let price = required(fields.price, "price")?;
    let places = required(fields.places, "places")?;
    let age = required(fields.age, "age")?;
    let image = required(fields.image, "image")?;

    find_school(&state, school_id).await?;
    ensure_school_manager(&state, &auth, school_id).await?;

    let image_path = store_image(&state.config.uploads.dir, "courses", &image).await?;
    let now = Utc::now();
    let inserted = course::ActiveModel {
        id: Set(Uuid::new_v4()),
        school_id: Set(school_id),
        name: Set(name),
        description: Set(description),
        price: Set(price),
        places: Set(places),
        age: Set(age),
        image: Set(Some(image_path.clone())),
        course_state: Set(CourseState::Active),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(&state.db)
    .await;

    let created = match inserted {
        Ok(created) => created,
        Err(e) => {
            remove_image(&state.config.uploads.dir, &image_path).await;
            return Err(e.into());
        }
    };

    info!(course_id = %created.id, %school_id, "Course created");
    Ok((
        StatusCode::CREATED,
        ok(CourseResponse::from(created), "Curso creado exitosamente"),
    ))
}

/// Update a course
#[utoipa::path(
    put,
    path = "/api/courses/{course_id}",
    tag = "courses",
    params(("course_id" = Uuid, Path, description = "Course ID")),
    request_body(content = CourseForm, content_type = "multipart/form-data"),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Course updated", body = ApiResponse<CourseResponse>),
        (status = 400, description = "Missing or malformed field", body = ErrorResponse),
        (status = 403, description = "Not allowed to manage the school", body = ErrorResponse),
        (status = 404, description = "Course not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state, auth, multipart))]
pub async fn update_course(
    Path(course_id): Path<Uuid>,
    State(state): State<AppState>,
    auth: AuthUser,
    multipart: Multipart,
) -> ApiResult<Json<ApiResponse<CourseResponse>>> {
    let existing = find_course(&state, course_id).await?;
    ensure_school_manager(&state, &auth, existing.school_id).await?;
    let fields = CourseFields::read(multipart).await?;

    let name = required(fields.name, "name")?;
    let description = required(fields.description, "description")?;
    let price = required(fields.price, "price")?;
    let places = required(fields.places, "places")?;
    let age = required(fields.age, "age")?;

    if let Some(target) = fields.school_id.filter(|id| *id != existing.school_id) {
        find_school(&state, target).await?;
        ensure_school_manager(&state, &auth, target).await?;
    }

    let previous_image = existing.image.clone();
    let mut active = existing.into_active_model();
    if let Some(school_id) = fields.school_id {
        active.school_id = Set(school_id);
    }
    active.name = Set(name);
    active.description = Set(description);
    active.price = Set(price);
    active.places = Set(places);
    active.age = Set(age);
    let mut replaced_image = None;
    if let Some(image) = fields.image {
        let path = store_image(&state.config.uploads.dir, "courses", &image).await?;
        active.image = Set(Some(path));
        replaced_image = previous_image;
    }
    active.updated_at = Set(Utc::now());

    let updated = active.update(&state.db).await?;
    if let Some(old) = replaced_image {
        remove_image(&state.config.uploads.dir, &old).await;
    }

    info!(course_id = %updated.id, "Course updated");
    Ok(ok(CourseResponse::from(updated), "Curso actualizado exitosamente"))
}

/// Delete a course without enrollments
#[utoipa::path(
    delete,
    path = "/api/courses/{course_id}",
    tag = "courses",
    params(("course_id" = Uuid, Path, description = "Course ID")),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Course deleted"),
        (status = 400, description = "Course has enrollments", body = ErrorResponse),
        (status = 403, description = "Not allowed to manage the school", body = ErrorResponse),
        (status = 404, description = "Course not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state, auth))]
pub async fn delete_course(
    Path(course_id): Path<Uuid>,
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<Json<ApiResponse<()>>> {
    let existing = find_course(&state, course_id).await?;
    ensure_school_manager(&state, &auth, existing.school_id).await?;

    let enrollments = enrollment::Entity::find()
        .filter(enrollment::Column::CourseId.eq(course_id))
        .count(&state.db)
        .await?;
    if enrollments > 0 {
        warn!(enrollments, "Refusing to delete a course with enrollments");
        return Err(ApiError::rule(
            "COURSE_HAS_ENROLLMENTS",
            "No se puede eliminar un curso con inscripciones",
        ));
    }

    course::Entity::delete_by_id(course_id)
        .exec(&state.db)
        .await?;
    if let Some(image) = existing.image.as_deref() {
        remove_image(&state.config.uploads.dir, image).await;
    }

    info!("Course with ID {} deleted", course_id);
    Ok(ok((), "Curso eliminado exitosamente"))
}

/// Open or close a course
///
/// Closing completes every active enrollment with the progress computed from
/// attendance and emails each student.
#[utoipa::path(
    patch,
    path = "/api/courses/{course_id}/state",
    tag = "courses",
    params(("course_id" = Uuid, Path, description = "Course ID")),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "State toggled", body = ApiResponse<CourseStateResponse>),
        (status = 403, description = "Neither a teacher of the course nor an administrator of its school", body = ErrorResponse),
        (status = 404, description = "Course not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state, auth))]
pub async fn toggle_course_state(
    Path(course_id): Path<Uuid>,
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<Json<ApiResponse<CourseStateResponse>>> {
    let outcome =
        lifecycle::toggle_course_state(&state.db, state.notifier.as_ref(), course_id, &auth.0)
            .await?;

    let data = CourseStateResponse {
        course_id: outcome.course.id,
        course_state: outcome.course.course_state,
        finalized_enrollments: outcome.finalized.len(),
        notified: outcome.finalized.iter().filter(|f| f.notified).count(),
    };
    let message = match data.course_state {
        CourseState::Active => "Curso activado",
        CourseState::Inactive => "Curso desactivado",
    };
    Ok(ok(data, message))
}
