use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Attendance counters of one student in one course.
///
/// Only `present` counts towards `progress`; `late` and `absent` are
/// reported for information.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct AttendanceStats {
    pub total_classes: u64,
    pub present: u64,
    pub late: u64,
    pub absent: u64,
    /// Rounded percentage of classes attended, 0..=100.
    pub progress: i32,
}

impl AttendanceStats {
    pub fn new(total_classes: u64, present: u64, late: u64, absent: u64) -> Self {
        Self {
            total_classes,
            present,
            late,
            absent,
            progress: progress_percentage(present, total_classes),
        }
    }

    /// Classes with no recorded attendance for the student.
    pub fn unrecorded(&self) -> u64 {
        self.total_classes
            .saturating_sub(self.present + self.late + self.absent)
    }
}

/// Progress of one student, as listed for a course.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct StudentProgress {
    pub user_id: Uuid,
    pub name: String,
    pub email: String,
    pub stats: AttendanceStats,
}

fn progress_percentage(present: u64, total_classes: u64) -> i32 {
    if total_classes == 0 {
        return 0;
    }
    let ratio = present as f64 / total_classes as f64;
    (ratio * 100.0).round().clamp(0.0, 100.0) as i32
}
