use super::{course, user};
use sea_orm::entity::prelude::*;

/// Assignment of a teacher to a course.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "course_teachers")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub course_id: Uuid,
    #[sea_orm(primary_key, auto_increment = false)]
    pub user_id: Uuid,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "course::Entity",
        from = "Column::CourseId",
        to = "course::Column::Id",
        on_delete = "Cascade"
    )]
    Course,
    #[sea_orm(
        belongs_to = "user::Entity",
        from = "Column::UserId",
        to = "user::Column::Id",
        on_delete = "Cascade"
    )]
    User,
}

impl Related<course::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Course.def()
    }
}

impl Related<user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Returns true when the user is assigned to teach the course.
pub async fn is_assigned<C: ConnectionTrait>(
    db: &C,
    course_id: Uuid,
    user_id: Uuid,
) -> Result<bool, DbErr> {
    Ok(Entity::find_by_id((course_id, user_id))
        .one(db)
        .await?
        .is_some())
}
