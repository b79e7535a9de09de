use chrono::{Months, NaiveDate, Utc};
use common::{CourseSummary, EnrollmentSummary};
use model::entities::{
    course, enrollment,
    enrollment::{EnrollmentStatus, PlanType},
    school,
    user::{self, Role},
};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QuerySelect, Set,
    TransactionTrait,
};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::error::{ComputeError, Result};

/// Optional overrides of a direct enrollment.
#[derive(Debug, Clone, Default)]
pub struct EnrollRequest {
    pub plan_type: Option<PlanType>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

/// A created enrollment together with the records it refers to.
#[derive(Debug, Clone)]
pub struct EnrollmentOutcome {
    pub enrollment: enrollment::Model,
    pub course: course::Model,
    pub school: school::Model,
}

impl EnrollmentOutcome {
    pub fn summary(&self) -> EnrollmentSummary {
        summarize(&self.enrollment, &self.course, &self.school)
    }
}

/// End date of a plan started on `start`.
///
/// Month arithmetic clamps to the last day of a shorter month, so a monthly
/// plan started on January 31st ends on the last day of February.
pub fn plan_end_date(plan: PlanType, start: NaiveDate) -> Result<NaiveDate> {
    start
        .checked_add_months(Months::new(plan.months()))
        .ok_or_else(|| ComputeError::Date(format!("{start} + {} months", plan.months())))
}

pub fn course_summary(course: &course::Model, school: &school::Model) -> CourseSummary {
    CourseSummary {
        id: course.id,
        name: course.name.clone(),
        school_id: school.id,
        school_name: school.name.clone(),
    }
}

pub fn summarize(
    enrollment: &enrollment::Model,
    course: &course::Model,
    school: &school::Model,
) -> EnrollmentSummary {
    EnrollmentSummary {
        id: enrollment.id,
        course: course_summary(course, school),
        plan_type: plan_label(enrollment.plan_type).to_string(),
        start_date: enrollment.start_date,
        end_date: enrollment.end_date,
        status: match enrollment.status {
            EnrollmentStatus::Active => "active",
            EnrollmentStatus::Completed => "completed",
        }
        .to_string(),
        progress: enrollment.progress,
    }
}

fn plan_label(plan: PlanType) -> &'static str {
    match plan {
        PlanType::Mensual => "mensual",
        PlanType::Trimestral => "trimestral",
        PlanType::Semestral => "semestral",
        PlanType::Anual => "anual",
    }
}

/// Enrolls a student directly, without payment.
///
/// The capacity, age and duplicate checks and the insert share one
/// transaction in which the course row is locked, so two concurrent requests
/// can never both take the last seat.
#[instrument(skip(db, student, request), fields(student_id = %student.id))]
pub async fn enroll(
    db: &DatabaseConnection,
    student: &user::Model,
    course_id: Uuid,
    request: EnrollRequest,
    today: NaiveDate,
) -> Result<EnrollmentOutcome> {
    let txn = db.begin().await?;

    let course = course::Entity::find_by_id(course_id)
        .lock_exclusive()
        .one(&txn)
        .await?
        .ok_or(ComputeError::NotFound("Course"))?;

    if student.role != Role::Student {
        return Err(ComputeError::Forbidden(
            "Solo los estudiantes pueden inscribirse".to_string(),
        ));
    }

    let taken = enrollment::count_active(&txn, course.id).await?;
    debug!(taken, places = course.places, "Checking course capacity");
    if taken >= u64::try_from(course.places).unwrap_or(0) {
        warn!(course_id = %course.id, "Course is full");
        return Err(ComputeError::NoPlacesAvailable);
    }

    let age = student.age_on(today);
    if age < course.age {
        return Err(ComputeError::UnderAge {
            required: course.age,
            actual: age,
        });
    }

    if enrollment::find_active(&txn, student.id, course.id)
        .await?
        .is_some()
    {
        return Err(ComputeError::AlreadyEnrolled);
    }

    let plan = request.plan_type.unwrap_or_default();
    let start_date = request.start_date.unwrap_or(today);
    let end_date = match request.end_date {
        Some(end) => end,
        None => plan_end_date(plan, start_date)?,
    };

    let now = Utc::now();
    let created = enrollment::ActiveModel {
        id: Set(Uuid::new_v4()),
        user_id: Set(student.id),
        course_id: Set(course.id),
        plan_type: Set(plan),
        start_date: Set(start_date),
        end_date: Set(end_date),
        status: Set(EnrollmentStatus::Active),
        progress: Set(0),
        price: Set(Some(course.price)),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(&txn)
    .await?;

    txn.commit().await?;
    info!(enrollment_id = %created.id, course_id = %course.id, "Student enrolled");

    let school = school::Entity::find_by_id(course.school_id)
        .one(db)
        .await?
        .ok_or(ComputeError::NotFound("School"))?;

    Ok(EnrollmentOutcome {
        enrollment: created,
        course,
        school,
    })
}

/// Creates the enrollment bought by a completed payment.
///
/// Capacity and age were the buyer's concern at checkout time and are not
/// re-checked, but an existing active enrollment is left alone and `None` is
/// returned.
#[instrument(skip(db))]
pub async fn create_paid_enrollment<C: ConnectionTrait>(
    db: &C,
    user_id: Uuid,
    course_id: Uuid,
    price: Decimal,
    today: NaiveDate,
) -> Result<Option<enrollment::Model>> {
    if enrollment::find_active(db, user_id, course_id)
        .await?
        .is_some()
    {
        info!("Active enrollment already exists, nothing to create");
        return Ok(None);
    }

    let plan = PlanType::Mensual;
    let now = Utc::now();
    let created = enrollment::ActiveModel {
        id: Set(Uuid::new_v4()),
        user_id: Set(user_id),
        course_id: Set(course_id),
        plan_type: Set(plan),
        start_date: Set(today),
        end_date: Set(plan_end_date(plan, today)?),
        status: Set(EnrollmentStatus::Active),
        progress: Set(0),
        price: Set(Some(price)),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(db)
    .await?;

    info!(enrollment_id = %created.id, "Enrollment created from payment");
    Ok(Some(created))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{new_course, new_school, new_user, setup_db};
    use model::entities::prelude::Enrollment;
    use sea_orm::{ColumnTrait, PaginatorTrait, QueryFilter};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_plan_end_dates() {
        let start = date(2024, 1, 15);
        assert_eq!(plan_end_date(PlanType::Mensual, start).unwrap(), date(2024, 2, 15));
        assert_eq!(plan_end_date(PlanType::Trimestral, start).unwrap(), date(2024, 4, 15));
        assert_eq!(plan_end_date(PlanType::Semestral, start).unwrap(), date(2024, 7, 15));
        assert_eq!(plan_end_date(PlanType::Anual, start).unwrap(), date(2025, 1, 15));
    }

    #[test]
    fn test_plan_end_date_clamps_to_month_end() {
        let start = date(2024, 1, 31);
        assert_eq!(plan_end_date(PlanType::Mensual, start).unwrap(), date(2024, 2, 29));
    }

    #[tokio::test]
    async fn test_enroll_uses_plan_and_course_price() {
        let db = setup_db().await;
        let school = new_school(&db).await;
        let course = new_course(&db, &school, 5, 10).await;
        let student = new_user(&db, Role::Student, date(2000, 5, 5)).await;

        let outcome = enroll(
            &db,
            &student,
            course.id,
            EnrollRequest {
                plan_type: Some(PlanType::Trimestral),
                start_date: Some(date(2024, 1, 15)),
                end_date: None,
            },
            date(2024, 1, 10),
        )
        .await
        .unwrap();

        assert_eq!(outcome.enrollment.end_date, date(2024, 4, 15));
        assert_eq!(outcome.enrollment.price, Some(course.price));
        assert_eq!(outcome.enrollment.progress, 0);
        assert_eq!(outcome.school.id, school.id);

        let summary = outcome.summary();
        assert_eq!(summary.plan_type, "trimestral");
        assert_eq!(summary.status, "active");
        assert_eq!(summary.course.school_name, school.name);
    }

    #[tokio::test]
    async fn test_enroll_defaults_to_monthly_from_today() {
        let db = setup_db().await;
        let school = new_school(&db).await;
        let course = new_course(&db, &school, 5, 0).await;
        let student = new_user(&db, Role::Student, date(2000, 5, 5)).await;
        let today = date(2024, 3, 1);

        let outcome = enroll(&db, &student, course.id, EnrollRequest::default(), today)
            .await
            .unwrap();

        assert_eq!(outcome.enrollment.plan_type, PlanType::Mensual);
        assert_eq!(outcome.enrollment.start_date, today);
        assert_eq!(outcome.enrollment.end_date, date(2024, 4, 1));
    }

    #[tokio::test]
    async fn test_capacity_is_never_exceeded() {
        let db = setup_db().await;
        let school = new_school(&db).await;
        let course = new_course(&db, &school, 2, 0).await;
        let today = date(2024, 1, 1);

        for _ in 0..2 {
            let student = new_user(&db, Role::Student, date(2000, 1, 1)).await;
            enroll(&db, &student, course.id, EnrollRequest::default(), today)
                .await
                .unwrap();
        }

        let late_student = new_user(&db, Role::Student, date(2000, 1, 1)).await;
        let err = enroll(&db, &late_student, course.id, EnrollRequest::default(), today)
            .await
            .unwrap_err();
        assert!(matches!(err, ComputeError::NoPlacesAvailable));
        assert_eq!(enrollment::count_active(&db, course.id).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_under_age_student_is_rejected() {
        let db = setup_db().await;
        let school = new_school(&db).await;
        let course = new_course(&db, &school, 5, 18).await;
        let student = new_user(&db, Role::Student, date(2010, 1, 1)).await;

        let err = enroll(&db, &student, course.id, EnrollRequest::default(), date(2024, 6, 1))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ComputeError::UnderAge {
                required: 18,
                actual: 14
            }
        ));
        assert_eq!(Enrollment::find().count(&db).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_duplicate_enrollment_is_rejected() {
        let db = setup_db().await;
        let school = new_school(&db).await;
        let course = new_course(&db, &school, 5, 0).await;
        let student = new_user(&db, Role::Student, date(2000, 1, 1)).await;
        let today = date(2024, 1, 1);

        enroll(&db, &student, course.id, EnrollRequest::default(), today)
            .await
            .unwrap();
        let err = enroll(&db, &student, course.id, EnrollRequest::default(), today)
            .await
            .unwrap_err();

        assert!(matches!(err, ComputeError::AlreadyEnrolled));
        assert_eq!(err.to_string(), "ya estás inscrito en este curso");
        let rows = Enrollment::find()
            .filter(enrollment::Column::UserId.eq(student.id))
            .count(&db)
            .await
            .unwrap();
        assert_eq!(rows, 1);
    }

    #[tokio::test]
    async fn test_only_students_enroll() {
        let db = setup_db().await;
        let school = new_school(&db).await;
        let course = new_course(&db, &school, 5, 0).await;
        let teacher = new_user(&db, Role::Teacher, date(1980, 1, 1)).await;

        let err = enroll(&db, &teacher, course.id, EnrollRequest::default(), date(2024, 1, 1))
            .await
            .unwrap_err();
        assert!(matches!(err, ComputeError::Forbidden(_)));
    }

    #[tokio::test]
    async fn test_missing_course() {
        let db = setup_db().await;
        let student = new_user(&db, Role::Student, date(2000, 1, 1)).await;

        let err = enroll(&db, &student, Uuid::new_v4(), EnrollRequest::default(), date(2024, 1, 1))
            .await
            .unwrap_err();
        assert!(matches!(err, ComputeError::NotFound("Course")));
    }

    #[tokio::test]
    async fn test_paid_enrollment_skips_existing() {
        let db = setup_db().await;
        let school = new_school(&db).await;
        let course = new_course(&db, &school, 1, 0).await;
        let student = new_user(&db, Role::Student, date(2000, 1, 1)).await;
        let today = date(2024, 1, 1);

        let first = create_paid_enrollment(&db, student.id, course.id, Decimal::new(100, 0), today)
            .await
            .unwrap();
        assert!(first.is_some());

        let second = create_paid_enrollment(&db, student.id, course.id, Decimal::new(100, 0), today)
            .await
            .unwrap();
        assert!(second.is_none());
        assert_eq!(enrollment::count_active(&db, course.id).await.unwrap(), 1);
    }
}
