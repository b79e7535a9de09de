use std::collections::HashMap;

use chrono::Utc;
use common::{AttendanceStats, StudentProgress};
use model::entities::{
    attendance::{self, AttendanceStatus},
    class, enrollment,
    enrollment::EnrollmentStatus,
    user,
};
use sea_orm::{
    ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect,
    Set, sea_query::OnConflict,
};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::error::{ComputeError, Result};

/// One line of a class attendance sheet. `status` is `None` while nothing was
/// recorded for the student.
#[derive(Debug, Clone)]
pub struct SheetEntry {
    pub student: user::Model,
    pub status: Option<AttendanceStatus>,
    pub notes: Option<String>,
}

/// Loads a class and checks that `teacher_id` owns it.
pub async fn owned_class<C: ConnectionTrait>(
    db: &C,
    class_id: Uuid,
    teacher_id: Uuid,
) -> Result<class::Model> {
    let class = class::Entity::find_by_id(class_id)
        .one(db)
        .await?
        .ok_or(ComputeError::NotFound("Class"))?;
    if class.teacher_id != teacher_id {
        return Err(ComputeError::Forbidden(
            "La clase pertenece a otro profesor".to_string(),
        ));
    }
    Ok(class)
}

/// Records the attendance of one student to one class.
///
/// Recording twice overwrites the status and notes of the existing row; the
/// unique `(class_id, user_id)` index makes this a single upsert statement.
#[instrument(skip(db, notes))]
pub async fn record_attendance<C: ConnectionTrait>(
    db: &C,
    teacher_id: Uuid,
    class_id: Uuid,
    student_id: Uuid,
    status: AttendanceStatus,
    notes: Option<String>,
) -> Result<attendance::Model> {
    let class = owned_class(db, class_id, teacher_id).await?;

    if enrollment::find_active(db, student_id, class.course_id)
        .await?
        .is_none()
    {
        return Err(ComputeError::NotEnrolled);
    }

    let now = Utc::now();
    let row = attendance::ActiveModel {
        id: Set(Uuid::new_v4()),
        class_id: Set(class.id),
        user_id: Set(student_id),
        status: Set(status),
        notes: Set(notes),
        created_at: Set(now),
        updated_at: Set(now),
    };

    attendance::Entity::insert(row)
        .on_conflict(
            OnConflict::columns([attendance::Column::ClassId, attendance::Column::UserId])
                .update_columns([
                    attendance::Column::Status,
                    attendance::Column::Notes,
                    attendance::Column::UpdatedAt,
                ])
                .to_owned(),
        )
        .exec_without_returning(db)
        .await?;

    let stored = attendance::Entity::find()
        .filter(attendance::Column::ClassId.eq(class.id))
        .filter(attendance::Column::UserId.eq(student_id))
        .one(db)
        .await?
        .ok_or(ComputeError::NotFound("Attendance"))?;

    info!(attendance_id = %stored.id, status = ?stored.status, "Attendance recorded");
    Ok(stored)
}

/// Every actively enrolled student of the class' course with what was recorded.
#[instrument(skip(db))]
pub async fn attendance_sheet<C: ConnectionTrait>(
    db: &C,
    teacher_id: Uuid,
    class_id: Uuid,
) -> Result<(class::Model, Vec<SheetEntry>)> {
    let class = owned_class(db, class_id, teacher_id).await?;

    let students = enrollment::Entity::find()
        .filter(enrollment::Column::CourseId.eq(class.course_id))
        .filter(enrollment::Column::Status.eq(EnrollmentStatus::Active))
        .find_also_related(user::Entity)
        .all(db)
        .await?;

    let mut recorded: HashMap<Uuid, attendance::Model> = attendance::Entity::find()
        .filter(attendance::Column::ClassId.eq(class.id))
        .all(db)
        .await?
        .into_iter()
        .map(|row| (row.user_id, row))
        .collect();

    let mut sheet: Vec<SheetEntry> = students
        .into_iter()
        .filter_map(|(_, student)| student)
        .map(|student| {
            let row = recorded.remove(&student.id);
            SheetEntry {
                status: row.as_ref().map(|r| r.status),
                notes: row.and_then(|r| r.notes),
                student,
            }
        })
        .collect();
    sheet.sort_by(|a, b| {
        (a.student.lastname.as_str(), a.student.name.as_str())
            .cmp(&(b.student.lastname.as_str(), b.student.name.as_str()))
    });

    debug!(students = sheet.len(), "Attendance sheet built");
    Ok((class, sheet))
}

/// Attendance counters of every student of a course, keyed by user id.
///
/// Students with no recorded attendance are absent from the map; use
/// [`CourseAttendance::stats_for`] to get their zeroed statistics.
pub struct CourseAttendance {
    total_classes: u64,
    counters: HashMap<Uuid, (u64, u64, u64)>,
}

impl CourseAttendance {
    pub async fn load<C: ConnectionTrait>(db: &C, course_id: Uuid) -> Result<Self> {
        let class_ids: Vec<Uuid> = class::Entity::find()
            .select_only()
            .column(class::Column::Id)
            .filter(class::Column::CourseId.eq(course_id))
            .into_tuple()
            .all(db)
            .await?;

        let mut counters: HashMap<Uuid, (u64, u64, u64)> = HashMap::new();
        if !class_ids.is_empty() {
            let rows = attendance::Entity::find()
                .filter(attendance::Column::ClassId.is_in(class_ids.clone()))
                .all(db)
                .await?;
            for row in rows {
                let entry = counters.entry(row.user_id).or_default();
                match row.status {
                    AttendanceStatus::Present => entry.0 += 1,
                    AttendanceStatus::Late => entry.1 += 1,
                    AttendanceStatus::Absent => entry.2 += 1,
                }
            }
        }

        Ok(Self {
            total_classes: class_ids.len() as u64,
            counters,
        })
    }

    pub fn total_classes(&self) -> u64 {
        self.total_classes
    }

    pub fn stats_for(&self, user_id: Uuid) -> AttendanceStats {
        let (present, late, absent) = self.counters.get(&user_id).copied().unwrap_or_default();
        AttendanceStats::new(self.total_classes, present, late, absent)
    }
}

/// Statistics of one student in one course.
#[instrument(skip(db))]
pub async fn student_stats<C: ConnectionTrait>(
    db: &C,
    course_id: Uuid,
    user_id: Uuid,
) -> Result<AttendanceStats> {
    let total_classes = class::Entity::find()
        .filter(class::Column::CourseId.eq(course_id))
        .count(db)
        .await?;

    let rows = attendance::Entity::find()
        .inner_join(class::Entity)
        .filter(class::Column::CourseId.eq(course_id))
        .filter(attendance::Column::UserId.eq(user_id))
        .all(db)
        .await?;

    let count = |status| rows.iter().filter(|r| r.status == status).count() as u64;
    Ok(AttendanceStats::new(
        total_classes,
        count(AttendanceStatus::Present),
        count(AttendanceStatus::Late),
        count(AttendanceStatus::Absent),
    ))
}

/// Statistics of every student ever enrolled in a course, ordered by name.
#[instrument(skip(db))]
pub async fn course_progress<C: ConnectionTrait>(
    db: &C,
    course_id: Uuid,
) -> Result<Vec<StudentProgress>> {
    let attendance = CourseAttendance::load(db, course_id).await?;

    let students = user::Entity::find()
        .inner_join(enrollment::Entity)
        .filter(enrollment::Column::CourseId.eq(course_id))
        .distinct()
        .order_by_asc(user::Column::Lastname)
        .order_by_asc(user::Column::Name)
        .all(db)
        .await?;

    Ok(students
        .into_iter()
        .map(|student| StudentProgress {
            user_id: student.id,
            name: student.full_name(),
            email: student.email,
            stats: attendance.stats_for(student.id),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrollment::{EnrollRequest, enroll};
    use crate::testing::{
        assign_teacher, mark, new_class, new_course, new_school, new_user, setup_db,
    };
    use chrono::NaiveDate;
    use model::entities::user::Role;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[tokio::test]
    async fn test_recording_twice_keeps_one_row() {
        let db = setup_db().await;
        let school = new_school(&db).await;
        let course = new_course(&db, &school, 5, 0).await;
        let teacher = new_user(&db, Role::Teacher, date(1980, 1, 1)).await;
        assign_teacher(&db, &course, &teacher).await;
        let class = new_class(&db, &course, &teacher, 1).await;
        let student = new_user(&db, Role::Student, date(2000, 1, 1)).await;
        enroll(&db, &student, course.id, EnrollRequest::default(), date(2024, 1, 1))
            .await
            .unwrap();

        let first = record_attendance(
            &db,
            teacher.id,
            class.id,
            student.id,
            AttendanceStatus::Absent,
            None,
        )
        .await
        .unwrap();
        let second = record_attendance(
            &db,
            teacher.id,
            class.id,
            student.id,
            AttendanceStatus::Present,
            Some("llegó a tiempo".to_string()),
        )
        .await
        .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.status, AttendanceStatus::Present);
        assert_eq!(second.notes.as_deref(), Some("llegó a tiempo"));
        let rows = attendance::Entity::find()
            .filter(attendance::Column::ClassId.eq(class.id))
            .count(&db)
            .await
            .unwrap();
        assert_eq!(rows, 1);
    }

    #[tokio::test]
    async fn test_record_requires_owner_and_enrollment() {
        let db = setup_db().await;
        let school = new_school(&db).await;
        let course = new_course(&db, &school, 5, 0).await;
        let owner = new_user(&db, Role::Teacher, date(1980, 1, 1)).await;
        let other = new_user(&db, Role::Teacher, date(1980, 1, 1)).await;
        let class = new_class(&db, &course, &owner, 1).await;
        let student = new_user(&db, Role::Student, date(2000, 1, 1)).await;

        let err = record_attendance(
            &db,
            other.id,
            class.id,
            student.id,
            AttendanceStatus::Present,
            None,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ComputeError::Forbidden(_)));

        let err = record_attendance(
            &db,
            owner.id,
            class.id,
            student.id,
            AttendanceStatus::Present,
            None,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ComputeError::NotEnrolled));

        let err = record_attendance(
            &db,
            owner.id,
            Uuid::new_v4(),
            student.id,
            AttendanceStatus::Present,
            None,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ComputeError::NotFound("Class")));
    }

    #[tokio::test]
    async fn test_sheet_leaves_unrecorded_students_open() {
        let db = setup_db().await;
        let school = new_school(&db).await;
        let course = new_course(&db, &school, 5, 0).await;
        let teacher = new_user(&db, Role::Teacher, date(1980, 1, 1)).await;
        let class = new_class(&db, &course, &teacher, 1).await;
        let marked = new_user(&db, Role::Student, date(2000, 1, 1)).await;
        let open = new_user(&db, Role::Student, date(2000, 1, 1)).await;
        for student in [&marked, &open] {
            enroll(&db, student, course.id, EnrollRequest::default(), date(2024, 1, 1))
                .await
                .unwrap();
        }
        mark(&db, &class, &marked, AttendanceStatus::Late).await;

        let (_, sheet) = attendance_sheet(&db, teacher.id, class.id).await.unwrap();

        assert_eq!(sheet.len(), 2);
        let status_of = |id| sheet.iter().find(|e| e.student.id == id).unwrap().status;
        assert_eq!(status_of(marked.id), Some(AttendanceStatus::Late));
        assert_eq!(status_of(open.id), None);
    }

    #[tokio::test]
    async fn test_stats_count_only_present_towards_progress() {
        let db = setup_db().await;
        let school = new_school(&db).await;
        let course = new_course(&db, &school, 5, 0).await;
        let teacher = new_user(&db, Role::Teacher, date(1980, 1, 1)).await;
        let student = new_user(&db, Role::Student, date(2000, 1, 1)).await;
        enroll(&db, &student, course.id, EnrollRequest::default(), date(2024, 1, 1))
            .await
            .unwrap();

        let mut classes = Vec::new();
        for day in 1..=4 {
            classes.push(new_class(&db, &course, &teacher, day).await);
        }
        mark(&db, &classes[0], &student, AttendanceStatus::Present).await;
        mark(&db, &classes[1], &student, AttendanceStatus::Late).await;
        mark(&db, &classes[2], &student, AttendanceStatus::Absent).await;

        let stats = student_stats(&db, course.id, student.id).await.unwrap();
        assert_eq!(stats, AttendanceStats::new(4, 1, 1, 1));
        assert_eq!(stats.progress, 25);
        assert_eq!(stats.unrecorded(), 1);

        let listed = course_progress(&db, course.id).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].stats, stats);
    }

    #[tokio::test]
    async fn test_stats_without_classes() {
        let db = setup_db().await;
        let school = new_school(&db).await;
        let course = new_course(&db, &school, 5, 0).await;
        let student = new_user(&db, Role::Student, date(2000, 1, 1)).await;

        let stats = student_stats(&db, course.id, student.id).await.unwrap();
        assert_eq!(stats.total_classes, 0);
        assert_eq!(stats.progress, 0);
    }
}
