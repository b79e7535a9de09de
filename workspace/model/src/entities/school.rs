use sea_orm::entity::prelude::*;

/// An institution offering courses.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "schools")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub phone: String,
    pub address: String,
    pub email: String,
    /// Path relative to the upload directory.
    pub image: Option<String>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::course::Entity")]
    Course,
    #[sea_orm(has_many = "super::school_member::Entity")]
    SchoolMember,
}

impl Related<super::course::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Course.def()
    }
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        super::school_member::Relation::User.def()
    }
    fn via() -> Option<RelationDef> {
        Some(super::school_member::Relation::School.def().rev())
    }
}

impl ActiveModelBehavior for ActiveModel {}
