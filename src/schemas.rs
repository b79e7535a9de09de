use std::sync::Arc;

use axum::Json;
use common::{AttendanceStats, CourseSummary, EnrollmentSummary, StudentProgress};
use compute::{notify::Notifier, payment::PaymentGateway};
use model::entities::{
    attendance::AttendanceStatus,
    course::CourseState,
    enrollment::PlanType,
    payment::PaymentStatus,
    school_member::MembershipRole,
    user::{Role, UserState},
};
use sea_orm::DatabaseConnection;
use serde::Serialize;
use utoipa::{
    Modify, OpenApi, ToSchema,
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
};

use crate::auth::{PasswordService, TokenService};
use crate::config::AppConfig;
use crate::handlers::{
    attendance::{AttendanceResponse, AttendanceSheetResponse, RecordAttendanceRequest, SheetRow},
    auth::{LoginRequest, LoginResponse},
    classes::{ClassResponse, CreateClassRequest, UpdateClassRequest},
    course_teachers::{AssignmentRequest, TeacherResponse},
    courses::{CourseForm, CourseResponse, CourseStateResponse},
    enrollments::{EnrollBody, RosterEntry},
    payments::{CreatePaymentRequest, CreatePaymentResponse, PaymentResponse, PaymentStatusResponse},
    schools::{AddMemberRequest, MemberResponse, SchoolRequest, SchoolResponse},
    users::{RegisterRequest, UpdateUserRequest, UserResponse},
};

pub use common::ApiResponse;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection
    pub db: DatabaseConnection,
    pub config: Arc<AppConfig>,
    pub tokens: TokenService,
    pub passwords: PasswordService,
    pub notifier: Arc<dyn Notifier>,
    pub gateway: Arc<dyn PaymentGateway>,
}

/// Wraps `data` in the success envelope.
pub fn ok<T>(data: T, message: impl Into<String>) -> Json<ApiResponse<T>> {
    Json(ApiResponse {
        data,
        message: message.into(),
        success: true,
    })
}

/// Error response
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Success status (always false for errors)
    pub success: bool,
    /// Human readable error message
    pub message: String,
    /// Error code
    pub error: String,
}

/// Health check response
#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    /// Service status
    pub status: String,
    /// Service version
    pub version: String,
    /// Database connection status
    pub database: String,
}

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::health::health_check,
        crate::handlers::auth::login,
        crate::handlers::auth::me,
        crate::handlers::users::register,
        crate::handlers::users::get_users,
        crate::handlers::users::get_user,
        crate::handlers::users::update_user,
        crate::handlers::users::toggle_user_state,
        crate::handlers::users::delete_user,
        crate::handlers::users::get_pending_admins,
        crate::handlers::users::approve_admin,
        crate::handlers::users::reject_admin,
        crate::handlers::schools::get_schools,
        crate::handlers::schools::get_school,
        crate::handlers::schools::create_school,
        crate::handlers::schools::update_school,
        crate::handlers::schools::delete_school,
        crate::handlers::schools::get_members,
        crate::handlers::schools::add_member,
        crate::handlers::schools::remove_member,
        crate::handlers::courses::get_courses,
        crate::handlers::courses::get_course,
        crate::handlers::courses::get_school_courses,
        crate::handlers::courses::create_course,
        crate::handlers::courses::update_course,
        crate::handlers::courses::delete_course,
        crate::handlers::courses::toggle_course_state,
        crate::handlers::course_teachers::assign_teacher,
        crate::handlers::course_teachers::remove_teacher,
        crate::handlers::course_teachers::get_course_teachers,
        crate::handlers::course_teachers::get_my_courses,
        crate::handlers::enrollments::enroll,
        crate::handlers::enrollments::get_my_enrollments,
        crate::handlers::enrollments::get_course_roster,
        crate::handlers::classes::create_class,
        crate::handlers::classes::get_class,
        crate::handlers::classes::update_class,
        crate::handlers::classes::delete_class,
        crate::handlers::classes::get_course_classes,
        crate::handlers::attendance::record_attendance,
        crate::handlers::attendance::get_class_attendance,
        crate::handlers::attendance::get_course_stats,
        crate::handlers::attendance::get_my_stats,
        crate::handlers::payments::create_payment,
        crate::handlers::payments::payment_webhook,
        crate::handlers::payments::get_payment_status,
        crate::handlers::payments::get_my_payments,
    ),
    components(
        schemas(
            ErrorResponse,
            HealthResponse,
            Role,
            UserState,
            MembershipRole,
            CourseState,
            PlanType,
            AttendanceStatus,
            PaymentStatus,
            AttendanceStats,
            StudentProgress,
            CourseSummary,
            EnrollmentSummary,
            LoginRequest,
            LoginResponse,
            RegisterRequest,
            UpdateUserRequest,
            UserResponse,
            SchoolRequest,
            SchoolResponse,
            AddMemberRequest,
            MemberResponse,
            CourseForm,
            CourseResponse,
            CourseStateResponse,
            AssignmentRequest,
            TeacherResponse,
            EnrollBody,
            RosterEntry,
            CreateClassRequest,
            UpdateClassRequest,
            ClassResponse,
            RecordAttendanceRequest,
            AttendanceResponse,
            AttendanceSheetResponse,
            SheetRow,
            CreatePaymentRequest,
            CreatePaymentResponse,
            PaymentResponse,
            PaymentStatusResponse,
        )
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "auth", description = "Login and token validation"),
        (name = "users", description = "User accounts and administrator requests"),
        (name = "schools", description = "Schools and their memberships"),
        (name = "courses", description = "Courses and their lifecycle"),
        (name = "course-teachers", description = "Teacher assignment"),
        (name = "enrollments", description = "Student enrollments"),
        (name = "classes", description = "Class scheduling"),
        (name = "attendance", description = "Attendance and progress"),
        (name = "payments", description = "Checkout and payment reconciliation"),
    ),
    info(
        title = "Campus API",
        description = "Multi-school course management: enrollments, classes, attendance and payments",
        version = "0.1.0",
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    )
)]
pub struct ApiDoc;
