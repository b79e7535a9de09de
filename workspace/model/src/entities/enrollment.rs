use super::{course, user};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Billing/duration tier of an enrollment.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "lowercase")]
pub enum PlanType {
    #[default]
    #[sea_orm(string_value = "mensual")]
    Mensual,
    #[sea_orm(string_value = "trimestral")]
    Trimestral,
    #[sea_orm(string_value = "semestral")]
    Semestral,
    #[sea_orm(string_value = "anual")]
    Anual,
}

impl PlanType {
    /// Length of the plan in calendar months.
    pub fn months(&self) -> u32 {
        match self {
            Self::Mensual => 1,
            Self::Trimestral => 3,
            Self::Semestral => 6,
            Self::Anual => 12,
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(10))")]
#[serde(rename_all = "lowercase")]
pub enum EnrollmentStatus {
    #[sea_orm(string_value = "active")]
    Active,
    #[sea_orm(string_value = "completed")]
    Completed,
}

/// A student registered in a course.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "enrollments")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub user_id: Uuid,
    pub course_id: Uuid,
    pub plan_type: PlanType,
    pub start_date: Date,
    pub end_date: Date,
    pub status: EnrollmentStatus,
    /// Attendance progress in percent, 0..=100.
    pub progress: i32,
    #[sea_orm(column_type = "Decimal(Some((12, 2)))", nullable)]
    pub price: Option<Decimal>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "user::Entity",
        from = "Column::UserId",
        to = "user::Column::Id",
        on_delete = "Cascade"
    )]
    User,
    #[sea_orm(
        belongs_to = "course::Entity",
        from = "Column::CourseId",
        to = "course::Column::Id"
    )]
    Course,
}

impl Related<user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl Related<course::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Course.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Active enrollment of a user in a course, if any.
pub async fn find_active<C: ConnectionTrait>(
    db: &C,
    user_id: Uuid,
    course_id: Uuid,
) -> Result<Option<Model>, DbErr> {
    Entity::find()
        .filter(Column::UserId.eq(user_id))
        .filter(Column::CourseId.eq(course_id))
        .filter(Column::Status.eq(EnrollmentStatus::Active))
        .one(db)
        .await
}

/// Number of active enrollments in a course.
pub async fn count_active<C: ConnectionTrait>(db: &C, course_id: Uuid) -> Result<u64, DbErr> {
    Entity::find()
        .filter(Column::CourseId.eq(course_id))
        .filter(Column::Status.eq(EnrollmentStatus::Active))
        .count(db)
        .await
}
