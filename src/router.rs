use crate::handlers::{
    attendance::{get_class_attendance, get_course_stats, get_my_stats, record_attendance},
    auth::{login, me},
    classes::{create_class, delete_class, get_class, get_course_classes, update_class},
    course_teachers::{assign_teacher, get_course_teachers, get_my_courses, remove_teacher},
    courses::{
        create_course, delete_course, get_course, get_courses, get_school_courses,
        toggle_course_state, update_course,
    },
    enrollments::{enroll, get_course_roster, get_my_enrollments},
    health::health_check,
    payments::{create_payment, get_my_payments, get_payment_status, payment_webhook},
    schools::{
        add_member, create_school, delete_school, get_members, get_school, get_schools,
        remove_member, update_school,
    },
    users::{
        approve_admin, delete_user, get_pending_admins, get_user, get_users, register,
        reject_admin, toggle_user_state, update_user,
    },
};
use crate::schemas::{ApiDoc, AppState};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{delete, get, patch, post},
};
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, services::ServeDir, timeout::TimeoutLayer,
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Create application router with all routes and middleware
pub fn create_router(state: AppState) -> Router {
    let timeout = Duration::from_secs(state.config.server.request_timeout_secs);
    let body_limit = state.config.server.max_body_bytes;
    let uploads = ServeDir::new(&state.config.uploads.dir);

    Router::new()
        // Health check
        .route("/health", get(health_check))
        // Identity
        .route("/api/login", post(login))
        .route("/api/auth/me", get(me))
        .route("/api/users", post(register).get(get_users))
        .route("/api/users/pending-admins", get(get_pending_admins))
        .route(
            "/api/users/:user_id",
            get(get_user).put(update_user).delete(delete_user),
        )
        .route("/api/users/:user_id/state", patch(toggle_user_state))
        .route("/api/users/:user_id/approve-admin", post(approve_admin))
        .route("/api/users/:user_id/reject-admin", post(reject_admin))
        // Schools
        .route("/api/schools", get(get_schools).post(create_school))
        .route(
            "/api/schools/:school_id",
            get(get_school).put(update_school).delete(delete_school),
        )
        .route(
            "/api/schools/:school_id/members",
            get(get_members).post(add_member),
        )
        .route(
            "/api/schools/:school_id/members/:user_id",
            delete(remove_member),
        )
        // Courses
        .route("/api/courses", get(get_courses).post(create_course))
        .route(
            "/api/courses/:course_id",
            get(get_course).put(update_course).delete(delete_course),
        )
        .route("/api/courses/:course_id/state", patch(toggle_course_state))
        .route("/api/courses/school/:school_id", get(get_school_courses))
        // Teacher assignment
        .route("/api/courseteacher/assign", post(assign_teacher))
        .route("/api/courseteacher/remove", delete(remove_teacher))
        .route(
            "/api/courseteacher/course/:course_id",
            get(get_course_teachers),
        )
        .route("/api/courseteacher/me", get(get_my_courses))
        // Enrollments
        .route(
            "/api/enrollments/courses/:course_id/enroll",
            post(enroll),
        )
        .route("/api/enrollments/courses/:course_id", get(get_course_roster))
        .route("/api/enrollments/me", get(get_my_enrollments))
        // Classes
        .route("/api/class", post(create_class))
        .route(
            "/api/class/:class_id",
            get(get_class).put(update_class).delete(delete_class),
        )
        .route("/api/class/course/:course_id", get(get_course_classes))
        // Attendance
        .route("/api/attendance", post(record_attendance))
        .route("/api/attendance/class/:class_id", get(get_class_attendance))
        .route(
            "/api/attendance/course/:course_id/stats",
            get(get_course_stats),
        )
        .route("/api/attendance/course/:course_id/me", get(get_my_stats))
        // Payments
        .route("/api/payments/create", post(create_payment))
        .route("/api/payments/webhook", post(payment_webhook))
        .route("/api/payments/status/:payment_id", get(get_payment_status))
        .route("/api/payments/me", get(get_my_payments))
        // Stored images
        .nest_service("/uploads", uploads)
        // Swagger UI
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        // Add middleware
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new())
                .layer(TimeoutLayer::new(timeout))
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}
