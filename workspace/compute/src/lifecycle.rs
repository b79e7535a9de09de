use chrono::Utc;
use common::AttendanceStats;
use model::entities::{
    course::{self, CourseState},
    course_teacher, enrollment,
    enrollment::EnrollmentStatus,
    school,
    school_member::{self, MembershipRole},
    user::{self, Role},
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, IntoActiveModel, QueryFilter,
    Set, TransactionTrait,
};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::attendance::CourseAttendance;
use crate::error::{ComputeError, Result};
use crate::notify::{Notification, Notifier, Recipient};

/// An enrollment closed because its course was deactivated.
#[derive(Debug, Clone)]
pub struct FinalizedEnrollment {
    pub enrollment_id: Uuid,
    pub user_id: Uuid,
    pub stats: AttendanceStats,
    pub notified: bool,
}

#[derive(Debug, Clone)]
pub struct ToggleOutcome {
    pub course: course::Model,
    pub finalized: Vec<FinalizedEnrollment>,
}

/// Teachers of the course and administrators of its school may open or close it.
async fn may_toggle(
    db: &DatabaseConnection,
    course: &course::Model,
    requester: &user::Model,
) -> Result<bool> {
    if requester.role == Role::Teacher
        && course_teacher::is_assigned(db, course.id, requester.id).await?
    {
        return Ok(true);
    }
    if requester.role == Role::Admin
        && school_member::holds_role(db, course.school_id, requester.id, MembershipRole::Admin)
            .await?
    {
        return Ok(true);
    }
    Ok(false)
}

/// Flips a course between active and inactive.
///
/// Closing a course completes every active enrollment with the progress
/// earned from attendance, then tells each student. A failed notification is
/// logged and does not undo anything.
#[instrument(skip(db, notifier, requester), fields(requester_id = %requester.id))]
pub async fn toggle_course_state(
    db: &DatabaseConnection,
    notifier: &dyn Notifier,
    course_id: Uuid,
    requester: &user::Model,
) -> Result<ToggleOutcome> {
    let course = course::Entity::find_by_id(course_id)
        .one(db)
        .await?
        .ok_or(ComputeError::NotFound("Course"))?;

    if !may_toggle(db, &course, requester).await? {
        warn!(course_id = %course.id, "Requester may not change the course state");
        return Err(ComputeError::Forbidden(
            "Solo un profesor del curso o un administrador de la escuela puede cambiar su estado"
                .to_string(),
        ));
    }

    let new_state = course.course_state.toggled();
    let txn = db.begin().await?;

    let mut active = course.clone().into_active_model();
    active.course_state = Set(new_state);
    active.updated_at = Set(Utc::now());
    let course = active.update(&txn).await?;

    let mut finalized = Vec::new();
    let mut recipients = Vec::new();
    if new_state == CourseState::Inactive {
        let attendance = CourseAttendance::load(&txn, course.id).await?;
        let enrollments = enrollment::Entity::find()
            .filter(enrollment::Column::CourseId.eq(course.id))
            .filter(enrollment::Column::Status.eq(EnrollmentStatus::Active))
            .find_also_related(user::Entity)
            .all(&txn)
            .await?;

        for (row, student) in enrollments {
            let stats = attendance.stats_for(row.user_id);
            let enrollment_id = row.id;
            let user_id = row.user_id;

            let mut active = row.into_active_model();
            active.status = Set(EnrollmentStatus::Completed);
            active.progress = Set(stats.progress);
            active.updated_at = Set(Utc::now());
            active.update(&txn).await?;

            finalized.push(FinalizedEnrollment {
                enrollment_id,
                user_id,
                stats,
                notified: false,
            });
            recipients.push(student.as_ref().map(Recipient::from));
        }
    }

    txn.commit().await?;
    info!(
        course_id = %course.id,
        state = ?course.course_state,
        finalized = finalized.len(),
        "Course state changed"
    );

    if !finalized.is_empty() {
        let school_name = school::Entity::find_by_id(course.school_id)
            .one(db)
            .await?
            .map(|s| s.name)
            .unwrap_or_default();

        for (entry, recipient) in finalized.iter_mut().zip(recipients) {
            let Some(recipient) = recipient else {
                warn!(user_id = %entry.user_id, "Enrolled user vanished, skipping notification");
                continue;
            };
            let notification = Notification::CourseCompleted {
                course_name: course.name.clone(),
                school_name: school_name.clone(),
                stats: entry.stats,
            };
            match notifier.notify(&recipient, &notification).await {
                Ok(()) => entry.notified = true,
                Err(e) => error!(email = %recipient.email, "Could not send completion notice: {e}"),
            }
        }
    }

    Ok(ToggleOutcome { course, finalized })
}
