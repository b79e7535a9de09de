//! Common transport-layer types shared between the backend and its clients.
//! These structs mirror the backend handlers' response payloads so that a
//! client can deserialize API responses without duplicating shapes.

mod money;
mod stats;

pub use money::format_amount;
pub use stats::{AttendanceStats, StudentProgress};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Generic API response wrapper used by the backend.
/// The backend serializes the same field names from its own schemas module.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiResponse<T> {
    /// Response data
    pub data: T,
    /// Response message
    pub message: String,
    /// Success flag
    pub success: bool,
}

/// Short description of a course, embedded in enrollment and payment payloads.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct CourseSummary {
    pub id: Uuid,
    pub name: String,
    pub school_id: Uuid,
    pub school_name: String,
}

/// Enrollment as returned to clients.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct EnrollmentSummary {
    pub id: Uuid,
    pub course: CourseSummary,
    /// One of `mensual`, `trimestral`, `semestral`, `anual`.
    pub plan_type: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// `active` or `completed`.
    pub status: String,
    pub progress: i32,
}
